//! Destinations and their per-write recovery policy.

use std::io;
use std::os::fd::{AsRawFd, RawFd};

use nix::libc;
use tracing::{debug, trace, warn};

use crate::CHUNK_SIZE;
use crate::endpoint::Endpoint;
use crate::error::{FanoutError, Result};
use crate::hex;
use crate::mode::{self, TerminalGuard};
use crate::names::NameReporter;
use crate::pty::PtyAllocator;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SinkKind {
    Console,
    PtyMaster,
}

/// What happened to one chunk offered to one sink.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The whole chunk was accepted.
    Complete,
    /// Only this many bytes were accepted; the rest is dropped.
    Partial(usize),
    /// The destination buffer is full; the chunk is dropped for this sink.
    WouldBlock,
    /// The consumer is gone; the sink must be recreated.
    BrokenPipe,
}

/// One destination in the registry.
#[derive(Debug)]
pub struct Sink {
    kind: SinkKind,
    endpoint: Endpoint,
    hex: bool,
    scratch: Vec<u8>,
    guard: Option<TerminalGuard>,
}

impl Sink {
    /// A sink writing to the process's standard output. Its status flags are
    /// restored when the sink is dropped.
    pub fn console(hex: bool) -> Result<Self> {
        let endpoint = Endpoint::stdout()?;
        let guard = TerminalGuard::new(&endpoint)?.save_flags()?;
        mode::set_non_blocking(&endpoint)?;

        let mut sink = Self::from_endpoint(SinkKind::Console, endpoint, hex);
        sink.guard = Some(guard);
        Ok(sink)
    }

    /// A sink on a freshly allocated pty, whose name is published.
    pub fn pty<A, R>(allocator: &mut A, reporter: &mut R) -> Result<Self>
    where
        A: PtyAllocator + ?Sized,
        R: NameReporter + ?Sized,
    {
        let endpoint = open_pty(allocator, reporter)?;
        Ok(Self::from_endpoint(SinkKind::PtyMaster, endpoint, false))
    }

    /// Wrap an already prepared endpoint.
    pub fn from_endpoint(kind: SinkKind, endpoint: Endpoint, hex: bool) -> Self {
        Self {
            kind,
            endpoint,
            hex,
            scratch: Vec::with_capacity(CHUNK_SIZE),
            guard: None,
        }
    }

    pub fn kind(&self) -> SinkKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        self.endpoint.name()
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn is_hex(&self) -> bool {
        self.hex
    }

    /// Offer one chunk. Nothing is retried or queued.
    ///
    /// Only errors that are neither "would block" nor "broken pipe" are
    /// returned as `Err`; those are fatal.
    pub fn write(&mut self, chunk: &[u8]) -> Result<WriteOutcome> {
        let payload: &[u8] = if self.hex {
            self.scratch.clear();
            hex::render(chunk, &mut self.scratch);
            &self.scratch
        } else {
            chunk
        };

        let outcome = match self.endpoint.write(payload) {
            Ok(written) if written == payload.len() => WriteOutcome::Complete,
            Ok(written) => {
                warn!(
                    sink = %self.endpoint.name(),
                    len = payload.len(),
                    wlen = written,
                    "partial write, dropping remainder"
                );
                WriteOutcome::Partial(written)
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                debug!(sink = %self.endpoint.name(), "write would block, dropping chunk");
                WriteOutcome::WouldBlock
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {
                debug!(sink = %self.endpoint.name(), "write interrupted, dropping chunk");
                WriteOutcome::WouldBlock
            }
            Err(e) if is_broken(&e) => WriteOutcome::BrokenPipe,
            Err(source) => {
                return Err(FanoutError::SinkWrite {
                    name: self.endpoint.name().to_string(),
                    source,
                });
            }
        };

        trace!(sink = %self.endpoint.name(), len = payload.len(), ?outcome, "write");
        Ok(outcome)
    }

    /// Rebuild this sink on a brand new pty.
    ///
    /// The new pair is allocated and prepared first, then swapped in while
    /// the old master and slave are closed together, then its name is
    /// published. Console sinks cannot be rebuilt.
    pub fn recreate<A, R>(&mut self, allocator: &mut A, reporter: &mut R) -> Result<()>
    where
        A: PtyAllocator + ?Sized,
        R: NameReporter + ?Sized,
    {
        if self.kind == SinkKind::Console {
            return Err(FanoutError::RecreateUnsupported {
                name: self.endpoint.name().to_string(),
            });
        }

        let pair = allocator.allocate()?;
        let fresh = Endpoint::from_pty(pair);
        mode::prepare(&fresh)?;

        let old_name = self.endpoint.name().to_string();
        self.endpoint.replace(fresh)?;
        reporter.publish(self.endpoint.name())?;

        debug!(old = %old_name, new = %self.endpoint.name(), "pty sink recreated");
        Ok(())
    }
}

impl AsRawFd for Sink {
    fn as_raw_fd(&self) -> RawFd {
        self.endpoint.as_raw_fd()
    }
}

fn open_pty<A, R>(allocator: &mut A, reporter: &mut R) -> Result<Endpoint>
where
    A: PtyAllocator + ?Sized,
    R: NameReporter + ?Sized,
{
    let endpoint = Endpoint::from_pty(allocator.allocate()?);
    reporter.publish(endpoint.name())?;
    mode::prepare(&endpoint)?;
    Ok(endpoint)
}

/// The conditions that mean "nobody is on the other end any more".
fn is_broken(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::BrokenPipe
        || matches!(err.raw_os_error(), Some(code) if code == libc::EIO || code == libc::EPIPE)
}
