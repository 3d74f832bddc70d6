//! Device-mode helpers: non-blocking, non-canonical, raw, line speed, and a
//! guard that puts a terminal back the way it was found.

use std::os::fd::{AsFd, AsRawFd, OwnedFd};

use nix::errno::Errno;
use nix::fcntl::{FcntlArg, OFlag, fcntl};
use nix::sys::termios::{
    self, BaudRate, LocalFlags, SetArg, SpecialCharacterIndices, Termios,
};
use tracing::{debug, warn};

use crate::endpoint::{Endpoint, EndpointKind};
use crate::error::{FanoutError, Result};

/// Current `O_*` status flags of an endpoint.
pub fn status_flags(endpoint: &Endpoint) -> Result<OFlag> {
    let bits = fcntl(endpoint.as_raw_fd(), FcntlArg::F_GETFL)
        .map_err(|e| FanoutError::fcntl("F_GETFL", endpoint.name(), e))?;
    Ok(OFlag::from_bits_truncate(bits))
}

fn set_status_flags(endpoint: &Endpoint, flags: OFlag) -> Result<()> {
    fcntl(endpoint.as_raw_fd(), FcntlArg::F_SETFL(flags))
        .map_err(|e| FanoutError::fcntl("F_SETFL", endpoint.name(), e))?;
    Ok(())
}

/// Add `O_NONBLOCK`. Idempotent.
pub fn set_non_blocking(endpoint: &Endpoint) -> Result<()> {
    let flags = status_flags(endpoint)?;
    if !flags.contains(OFlag::O_NONBLOCK) {
        set_status_flags(endpoint, flags | OFlag::O_NONBLOCK)?;
    }
    Ok(())
}

/// Clear `ICANON` and make reads return immediately (VMIN=0, VTIME=0).
///
/// Standard input is left alone. Descriptors that are not terminals at all
/// (a pipe, a socket) are skipped.
pub fn set_non_canonical(endpoint: &Endpoint) -> Result<()> {
    if endpoint.kind() == EndpointKind::Stdin {
        debug!(endpoint = %endpoint.name(), "leaving stdin in its current line mode");
        return Ok(());
    }

    let mut tty = match termios::tcgetattr(endpoint.as_fd()) {
        Ok(tty) => tty,
        Err(Errno::ENOTTY | Errno::EINVAL) => {
            debug!(endpoint = %endpoint.name(), "not a terminal, skipping non-canonical mode");
            return Ok(());
        }
        Err(e) => return Err(FanoutError::termios("tcgetattr", endpoint.name(), e)),
    };

    tty.local_flags.remove(LocalFlags::ICANON);
    tty.control_chars[SpecialCharacterIndices::VMIN as usize] = 0;
    tty.control_chars[SpecialCharacterIndices::VTIME as usize] = 0;

    apply(endpoint, &tty)
}

/// The setup every endpoint gets before it joins the readiness loop.
pub fn prepare(endpoint: &Endpoint) -> Result<()> {
    set_non_canonical(endpoint)?;
    set_non_blocking(endpoint)
}

pub fn set_raw(endpoint: &Endpoint) -> Result<()> {
    let mut tty = attributes(endpoint)?;
    termios::cfmakeraw(&mut tty);
    apply(endpoint, &tty)
}

/// Set input and output speed.
pub fn set_speed(endpoint: &Endpoint, rate: BaudRate) -> Result<()> {
    let mut tty = attributes(endpoint)?;
    termios::cfsetspeed(&mut tty, rate)
        .map_err(|e| FanoutError::termios("cfsetspeed", endpoint.name(), e))?;
    apply(endpoint, &tty)
}

fn attributes(endpoint: &Endpoint) -> Result<Termios> {
    termios::tcgetattr(endpoint.as_fd())
        .map_err(|e| FanoutError::termios("tcgetattr", endpoint.name(), e))
}

fn apply(endpoint: &Endpoint, tty: &Termios) -> Result<()> {
    termios::tcsetattr(endpoint.as_fd(), SetArg::TCSANOW, tty)
        .map_err(|e| FanoutError::termios("tcsetattr", endpoint.name(), e))
}

/// RAII guard that restores saved terminal attributes and status flags.
///
/// Holds its own duplicate of the descriptor so it stays valid no matter
/// when the endpoint itself is closed.
#[derive(Debug)]
pub struct TerminalGuard {
    fd: OwnedFd,
    name: String,
    termios: Option<Termios>,
    flags: Option<OFlag>,
}

impl TerminalGuard {
    pub fn new(endpoint: &Endpoint) -> Result<Self> {
        let fd = endpoint
            .as_fd()
            .try_clone_to_owned()
            .map_err(|source| FanoutError::Duplicate {
                name: endpoint.name().to_string(),
                source,
            })?;
        Ok(Self {
            fd,
            name: endpoint.name().to_string(),
            termios: None,
            flags: None,
        })
    }

    /// Record the current terminal attributes.
    pub fn save_termios(mut self) -> Result<Self> {
        let saved = termios::tcgetattr(self.fd.as_fd())
            .map_err(|e| FanoutError::termios("tcgetattr", &self.name, e))?;
        self.termios = Some(saved);
        Ok(self)
    }

    /// Record the current `O_*` status flags.
    pub fn save_flags(mut self) -> Result<Self> {
        let bits = fcntl(self.fd.as_raw_fd(), FcntlArg::F_GETFL)
            .map_err(|e| FanoutError::fcntl("F_GETFL", &self.name, e))?;
        self.flags = Some(OFlag::from_bits_truncate(bits));
        Ok(self)
    }

    pub fn has_termios(&self) -> bool {
        self.termios.is_some()
    }

    /// Put back whatever was saved. Each setting is restored at most once.
    pub fn restore(&mut self) -> Result<()> {
        if let Some(saved) = self.termios.take() {
            termios::tcsetattr(self.fd.as_fd(), SetArg::TCSANOW, &saved)
                .map_err(|e| FanoutError::termios("tcsetattr", &self.name, e))?;
            debug!(endpoint = %self.name, "terminal attributes restored");
        }
        if let Some(flags) = self.flags.take() {
            fcntl(self.fd.as_raw_fd(), FcntlArg::F_SETFL(flags))
                .map_err(|e| FanoutError::fcntl("F_SETFL", &self.name, e))?;
        }
        Ok(())
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        if let Err(e) = self.restore() {
            warn!(endpoint = %self.name, "failed to restore terminal: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::net::UnixStream;

    fn socket_endpoint(kind: EndpointKind) -> (Endpoint, UnixStream) {
        let (ours, theirs) = UnixStream::pair().unwrap();
        (
            Endpoint::from_parts(OwnedFd::from(ours), "sock", kind, None),
            theirs,
        )
    }

    #[test]
    fn non_blocking_is_idempotent() {
        let (endpoint, _peer) = socket_endpoint(EndpointKind::Device);
        assert!(!status_flags(&endpoint).unwrap().contains(OFlag::O_NONBLOCK));

        set_non_blocking(&endpoint).unwrap();
        set_non_blocking(&endpoint).unwrap();
        assert!(status_flags(&endpoint).unwrap().contains(OFlag::O_NONBLOCK));
    }

    #[test]
    fn non_canonical_skips_non_terminals() {
        let (endpoint, _peer) = socket_endpoint(EndpointKind::Device);
        set_non_canonical(&endpoint).unwrap();
    }

    #[test]
    fn raw_fails_on_non_terminal() {
        let (endpoint, _peer) = socket_endpoint(EndpointKind::Device);
        let err = set_raw(&endpoint).unwrap_err();
        assert!(matches!(err, FanoutError::Termios { op: "tcgetattr", .. }));
    }

    #[test]
    fn guard_restores_flags() {
        let (endpoint, _peer) = socket_endpoint(EndpointKind::Stdout);
        let guard = TerminalGuard::new(&endpoint).unwrap().save_flags().unwrap();
        assert!(!guard.has_termios());

        set_non_blocking(&endpoint).unwrap();
        drop(guard);

        assert!(!status_flags(&endpoint).unwrap().contains(OFlag::O_NONBLOCK));
    }
}
