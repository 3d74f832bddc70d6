//! Owned descriptors with a display name.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, IntoRawFd, OwnedFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use nix::errno::Errno;
use nix::libc;

use crate::error::{FanoutError, Result};
use crate::pty::PtyPair;

/// What an endpoint is for. Doubles as the capability tag: `Stdin` and
/// `Device` are readable sources, `Stdout` is a writable sink, `PtyMaster`
/// is the master half of a pty pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EndpointKind {
    Stdin,
    Device,
    Stdout,
    PtyMaster,
}

/// An open descriptor, its name, and for pty masters the paired slave.
///
/// The slave is held open for the lifetime of the master so the pty
/// survives consumers attaching and detaching.
#[derive(Debug)]
pub struct Endpoint {
    file: File,
    name: String,
    kind: EndpointKind,
    slave: Option<OwnedFd>,
}

impl Endpoint {
    /// Open a character device read-write, without making it the
    /// controlling terminal, in non-blocking mode.
    pub fn open_device(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NOCTTY | libc::O_NONBLOCK)
            .open(path)
            .map_err(|source| FanoutError::Open {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(Self {
            file,
            name: path.display().to_string(),
            kind: EndpointKind::Device,
            slave: None,
        })
    }

    /// Wrap a duplicate of the process's standard input.
    pub fn stdin() -> Result<Self> {
        Self::duplicate(io::stdin().as_fd(), "stdin", EndpointKind::Stdin)
    }

    /// Wrap a duplicate of the process's standard output.
    pub fn stdout() -> Result<Self> {
        Self::duplicate(io::stdout().as_fd(), "stdout", EndpointKind::Stdout)
    }

    fn duplicate(fd: BorrowedFd<'_>, name: &str, kind: EndpointKind) -> Result<Self> {
        let owned = fd
            .try_clone_to_owned()
            .map_err(|source| FanoutError::Duplicate {
                name: name.to_string(),
                source,
            })?;
        Ok(Self::from_parts(owned, name, kind, None))
    }

    /// Take ownership of a freshly allocated pty pair.
    pub fn from_pty(pair: PtyPair) -> Self {
        Self::from_parts(pair.master, &pair.name, EndpointKind::PtyMaster, Some(pair.slave))
    }

    pub fn from_parts(
        fd: OwnedFd,
        name: &str,
        kind: EndpointKind,
        slave: Option<OwnedFd>,
    ) -> Self {
        Self {
            file: File::from(fd),
            name: name.to_string(),
            kind,
            slave,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> EndpointKind {
        self.kind
    }

    pub fn slave(&self) -> Option<BorrowedFd<'_>> {
        self.slave.as_ref().map(|fd| fd.as_fd())
    }

    pub fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        (&self.file).read(buf)
    }

    pub fn write(&self, buf: &[u8]) -> io::Result<usize> {
        (&self.file).write(buf)
    }

    /// Install `fresh` in place of this endpoint and close the descriptors it
    /// replaces. The handle never holds a closed descriptor: the swap happens
    /// first, then the old master and slave are released together.
    pub fn replace(&mut self, fresh: Endpoint) -> Result<()> {
        let old = std::mem::replace(self, fresh);
        old.close()
    }

    /// Close the master and the paired slave, if any.
    ///
    /// Consumes the endpoint, so a descriptor can never be closed twice. Both
    /// descriptors are always released; the first failure is reported.
    pub fn close(self) -> Result<()> {
        let Endpoint {
            file, name, slave, ..
        } = self;

        let master = close_fd(OwnedFd::from(file));
        let slave = slave.map(close_fd).unwrap_or(Ok(()));

        master
            .and(slave)
            .map_err(|source| FanoutError::Close { name, source })
    }
}

impl AsFd for Endpoint {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.file.as_fd()
    }
}

impl AsRawFd for Endpoint {
    fn as_raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}

fn close_fd(fd: OwnedFd) -> nix::Result<()> {
    // Linux releases the descriptor even when close reports EINTR.
    match nix::unistd::close(fd.into_raw_fd()) {
        Err(Errno::EINTR) => Ok(()),
        other => other,
    }
}
