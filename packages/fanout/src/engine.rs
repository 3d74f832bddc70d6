//! The readiness loop: wait for the source, read one chunk, broadcast it.

use std::io;
use std::os::fd::AsFd;
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::Duration;

use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use tracing::{debug, info, trace};

use crate::CHUNK_SIZE;
use crate::error::{FanoutError, Result};
use crate::mode;
use crate::names::NameReporter;
use crate::pty::PtyAllocator;
use crate::registry::{SinkId, SinkRegistry};
use crate::sink::{SinkKind, WriteOutcome};
use crate::source::Source;

pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Clone, Debug)]
pub struct LoopOptions {
    /// Upper bound on one readiness wait. An expiry does no forwarding.
    pub poll_timeout: Duration,
    /// Log descriptor status flags whenever a wait expires.
    pub diagnostics: bool,
}

impl Default for LoopOptions {
    fn default() -> Self {
        Self {
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            diagnostics: false,
        }
    }
}

/// Why [`Forwarder::run`] returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopExit {
    /// The source reported end of stream.
    SourceClosed,
    /// A watched signal was delivered.
    Signalled(i32),
}

/// Per-sink outcomes of one broadcast, in registry order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub outcomes: Vec<(SinkId, WriteOutcome)>,
}

impl BroadcastReport {
    pub fn outcome(&self, id: SinkId) -> Option<WriteOutcome> {
        self.outcomes
            .iter()
            .find(|(sink, _)| *sink == id)
            .map(|(_, outcome)| *outcome)
    }

    /// Sinks that were rebuilt during this broadcast.
    pub fn recreated(&self) -> impl Iterator<Item = SinkId> + '_ {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| *outcome == WriteOutcome::BrokenPipe)
            .map(|(id, _)| *id)
    }
}

/// Result of one pass through the loop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Step {
    /// The wait expired with nothing to read.
    Idle,
    /// The wait or the read was interrupted by a signal.
    Interrupted,
    /// Readiness was reported but the read would block.
    Spurious,
    /// A chunk of this many bytes was read and broadcast.
    Forwarded { len: usize, report: BroadcastReport },
    /// The source reached end of stream.
    Closed,
    /// A watched signal is pending.
    Stopped(i32),
}

/// Owns the source, the sinks, and the collaborators needed to rebuild sinks.
///
/// Everything runs on the calling thread. The only place it sleeps is the
/// readiness wait on the source.
pub struct Forwarder<A, R> {
    // Sinks are set up after the source, so they drop first. When stdin and
    // stdout share one description the source's saved flags win.
    registry: SinkRegistry,
    source: Source,
    allocator: A,
    reporter: R,
    options: LoopOptions,
    timeout: PollTimeout,
    stop: Option<&'static AtomicI32>,
}

impl<A, R> Forwarder<A, R>
where
    A: PtyAllocator,
    R: NameReporter,
{
    pub fn new(
        source: Source,
        registry: SinkRegistry,
        allocator: A,
        reporter: R,
        options: LoopOptions,
    ) -> Self {
        let millis = u16::try_from(options.poll_timeout.as_millis()).unwrap_or(u16::MAX);
        Self {
            source,
            registry,
            allocator,
            reporter,
            timeout: PollTimeout::from(millis),
            options,
            stop: None,
        }
    }

    /// Stop the loop when `flag` holds a non-zero signal number. The flag is
    /// checked before every wait and whenever a wait is interrupted.
    pub fn watch_signals(mut self, flag: &'static AtomicI32) -> Self {
        self.stop = Some(flag);
        self
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn registry(&self) -> &SinkRegistry {
        &self.registry
    }

    pub fn reporter(&self) -> &R {
        &self.reporter
    }

    pub fn allocator(&self) -> &A {
        &self.allocator
    }

    /// Loop until the source closes, a watched signal arrives, or something
    /// fatal happens.
    pub fn run(&mut self) -> Result<LoopExit> {
        info!(
            source = %self.source.name(),
            sinks = self.registry.len(),
            "forwarding started"
        );
        loop {
            match self.step()? {
                Step::Closed => return Ok(LoopExit::SourceClosed),
                Step::Stopped(signal) => return Ok(LoopExit::Signalled(signal)),
                Step::Idle | Step::Interrupted | Step::Spurious | Step::Forwarded { .. } => {}
            }
        }
    }

    /// One pass: wait, read at most one chunk, broadcast it.
    pub fn step(&mut self) -> Result<Step> {
        if let Some(signal) = self.pending_signal() {
            return Ok(Step::Stopped(signal));
        }

        let ready = {
            let mut fds = [PollFd::new(self.source.endpoint().as_fd(), PollFlags::POLLIN)];
            match poll(&mut fds, self.timeout) {
                Ok(0) => None,
                Ok(_) => fds[0].revents(),
                Err(Errno::EINTR) => {
                    debug!("readiness wait interrupted");
                    return Ok(self.interrupted());
                }
                Err(e) => return Err(FanoutError::Poll(e)),
            }
        };

        match ready {
            Some(events) if !events.is_empty() => self.read_and_broadcast(),
            _ => {
                if self.options.diagnostics {
                    self.log_descriptor_flags()?;
                }
                Ok(Step::Idle)
            }
        }
    }

    fn read_and_broadcast(&mut self) -> Result<Step> {
        let mut buf = [0u8; CHUNK_SIZE];
        match self.source.endpoint().read(&mut buf) {
            Ok(0) => {
                info!(source = %self.source.name(), "source has been closed");
                Ok(Step::Closed)
            }
            Ok(len) => {
                trace!(len, "read");
                let report = self.broadcast(&buf[..len])?;
                Ok(Step::Forwarded { len, report })
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                debug!(source = %self.source.name(), "read would block after readiness");
                Ok(Step::Spurious)
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(self.interrupted()),
            Err(source) => Err(FanoutError::SourceRead {
                name: self.source.name().to_string(),
                source,
            }),
        }
    }

    /// Offer `chunk` to every sink in registry order. A sink whose consumer
    /// is gone is rebuilt before the next sink is written; failing to
    /// rebuild it is fatal.
    pub fn broadcast(&mut self, chunk: &[u8]) -> Result<BroadcastReport> {
        let mut report = BroadcastReport {
            outcomes: Vec::with_capacity(self.registry.len()),
        };

        for (id, sink) in self.registry.iter_mut() {
            let outcome = sink.write(chunk)?;
            if outcome == WriteOutcome::BrokenPipe {
                debug!(%id, sink = %sink.name(), "consumer gone, recreating sink");
                sink.recreate(&mut self.allocator, &mut self.reporter)?;
            }
            report.outcomes.push((id, outcome));
        }

        Ok(report)
    }

    fn pending_signal(&self) -> Option<i32> {
        self.stop
            .map(|flag| flag.load(Ordering::SeqCst))
            .filter(|&signal| signal != 0)
    }

    fn interrupted(&self) -> Step {
        match self.pending_signal() {
            Some(signal) => Step::Stopped(signal),
            None => Step::Interrupted,
        }
    }

    fn log_descriptor_flags(&self) -> Result<()> {
        let flags = mode::status_flags(self.source.endpoint())?;
        debug!(endpoint = %self.source.name(), ?flags, "source flags");
        for (id, sink) in self.registry.iter() {
            let flags = mode::status_flags(sink.endpoint())?;
            let console = sink.kind() == SinkKind::Console;
            debug!(%id, endpoint = %sink.name(), console, ?flags, "sink flags");
        }
        Ok(())
    }
}
