//! SIGHUP / SIGINT handling.
//!
//! The handler only records which signal arrived. The readiness wait returns
//! `EINTR`, the forwarder sees the recorded signal and stops, and terminal
//! settings are put back by the guards as everything is dropped.

use std::sync::atomic::{AtomicI32, Ordering};

use anyhow::{Context, Result};
use nix::libc;
use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};

static PENDING: AtomicI32 = AtomicI32::new(0);

extern "C" fn record(signal: libc::c_int) {
    PENDING.store(signal, Ordering::SeqCst);
}

/// Signals that end the forwarder cleanly.
pub const WATCHED: [Signal; 2] = [Signal::SIGHUP, Signal::SIGINT];

/// Install the handlers and return the flag they set.
pub fn install() -> Result<&'static AtomicI32> {
    let action = SigAction::new(SigHandler::Handler(record), SaFlags::empty(), SigSet::empty());
    for signal in WATCHED {
        // SAFETY: the handler only performs an atomic store.
        unsafe { sigaction(signal, &action) }
            .with_context(|| format!("Failed to install {} handler", signal))?;
    }
    Ok(&PENDING)
}

/// Human-readable name for a recorded signal number.
pub fn describe(signal: i32) -> String {
    Signal::try_from(signal)
        .map(|s| s.to_string())
        .unwrap_or_else(|_| format!("signal {}", signal))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_known_and_unknown() {
        assert_eq!(describe(libc::SIGINT), "SIGINT");
        assert_eq!(describe(libc::SIGHUP), "SIGHUP");
        assert_eq!(describe(9999), "signal 9999");
    }

    #[test]
    fn handler_records_signal() {
        let flag = install().unwrap();
        nix::sys::signal::raise(Signal::SIGHUP).unwrap();
        assert_eq!(flag.swap(0, Ordering::SeqCst), libc::SIGHUP);
    }
}
