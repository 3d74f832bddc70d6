//! Pseudo-terminal allocation.

use std::os::fd::{AsFd, OwnedFd};

use nix::pty::{OpenptyResult, Winsize, openpty};
use nix::sys::termios::{self, BaudRate, SetArg, Termios};
use tracing::debug;

use crate::baud;
use crate::error::{FanoutError, Result};

/// A new pseudo-terminal: master, slave, and the slave's device path.
#[derive(Debug)]
pub struct PtyPair {
    pub master: OwnedFd,
    pub slave: OwnedFd,
    pub name: String,
}

/// Source of fresh pty pairs, consulted at startup and whenever a sink has
/// to be rebuilt.
pub trait PtyAllocator {
    fn allocate(&mut self) -> Result<PtyPair>;
}

/// Allocates real pseudo terminals with `openpty(3)`, raw and at a fixed speed.
#[derive(Debug, Clone, Copy)]
pub struct OpenPty {
    baud: BaudRate,
}

impl OpenPty {
    pub fn new(baud: BaudRate) -> Self {
        Self { baud }
    }

    pub fn with_baud(speed: u32) -> Result<Self> {
        Ok(Self::new(baud::lookup(speed)?))
    }

    fn configure(&self, pair: &PtyPair) -> Result<()> {
        let mut tty = termios::tcgetattr(pair.slave.as_fd())
            .map_err(|e| FanoutError::termios("tcgetattr", &pair.name, e))?;
        termios::cfmakeraw(&mut tty);
        termios::cfsetspeed(&mut tty, self.baud)
            .map_err(|e| FanoutError::termios("cfsetspeed", &pair.name, e))?;
        termios::tcsetattr(pair.slave.as_fd(), SetArg::TCSANOW, &tty)
            .map_err(|e| FanoutError::termios("tcsetattr", &pair.name, e))
    }
}

impl PtyAllocator for OpenPty {
    fn allocate(&mut self) -> Result<PtyPair> {
        let OpenptyResult { master, slave } =
            openpty(None::<&Winsize>, None::<&Termios>).map_err(FanoutError::PtyAllocation)?;

        let name = nix::unistd::ttyname(slave.as_fd())
            .map_err(FanoutError::PtyName)?
            .display()
            .to_string();

        let pair = PtyPair {
            master,
            slave,
            name,
        };
        self.configure(&pair)?;

        debug!(pty = %pair.name, baud = ?self.baud, "allocated pty");
        Ok(pair)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::sys::termios::{LocalFlags, cfgetospeed};

    #[test]
    fn allocates_raw_pty_with_speed() {
        let mut allocator = OpenPty::with_baud(9600).unwrap();
        let pair = allocator.allocate().unwrap();

        assert!(pair.name.starts_with("/dev/"), "unexpected name {}", pair.name);

        let tty = termios::tcgetattr(pair.slave.as_fd()).unwrap();
        assert!(!tty.local_flags.contains(LocalFlags::ICANON));
        assert_eq!(cfgetospeed(&tty), BaudRate::B9600);
    }

    #[test]
    fn each_allocation_is_distinct() {
        let mut allocator = OpenPty::new(BaudRate::B115200);
        let a = allocator.allocate().unwrap();
        let b = allocator.allocate().unwrap();
        assert_ne!(a.name, b.name);
    }
}
