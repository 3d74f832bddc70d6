use std::io;
use std::path::PathBuf;

use nix::errno::Errno;

pub type Result<T, E = FanoutError> = std::result::Result<T, E>;

/// Errors that stop the forwarder.
///
/// Sink-scoped conditions (a full pty buffer, a vanished consumer) are not
/// errors; they surface as [`crate::WriteOutcome`] values instead.
#[derive(Debug, thiserror::Error)]
pub enum FanoutError {
    /// Opening a named device failed
    #[error("failed to open {}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Duplicating a standard stream descriptor failed
    #[error("failed to duplicate descriptor for {name}")]
    Duplicate {
        name: String,
        #[source]
        source: io::Error,
    },

    /// Querying or setting descriptor status flags failed
    #[error("fcntl({op}) failed on {name}")]
    Fcntl {
        op: &'static str,
        name: String,
        #[source]
        source: Errno,
    },

    /// Querying or setting terminal attributes failed
    #[error("{op} failed on {name}")]
    Termios {
        op: &'static str,
        name: String,
        #[source]
        source: Errno,
    },

    #[error("unsupported baud rate {0}")]
    UnsupportedBaudRate(u32),

    /// The OS refused to hand out a new pseudo-terminal pair
    #[error("failed to allocate a pseudo terminal")]
    PtyAllocation(#[source] Errno),

    #[error("failed to resolve the name of a new pseudo terminal")]
    PtyName(#[source] Errno),

    /// The readiness wait itself failed
    #[error("readiness wait failed")]
    Poll(#[source] Errno),

    #[error("read from source {name} failed")]
    SourceRead {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("write to {name} failed")]
    SinkWrite {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to close {name}")]
    Close {
        name: String,
        #[source]
        source: Errno,
    },

    /// Only pty sinks can be rebuilt after their consumer disappears
    #[error("sink {name} cannot be recreated")]
    RecreateUnsupported { name: String },

    #[error("failed to publish pty name to {target}")]
    NameReport {
        target: String,
        #[source]
        source: io::Error,
    },

    #[error("no destinations configured")]
    NoDestinations,

    #[error("hex output requires a console sink")]
    HexWithoutConsole,
}

impl FanoutError {
    pub(crate) fn fcntl(op: &'static str, name: &str, source: Errno) -> Self {
        Self::Fcntl {
            op,
            name: name.to_string(),
            source,
        }
    }

    pub(crate) fn termios(op: &'static str, name: &str, source: Errno) -> Self {
        Self::Termios {
            op,
            name: name.to_string(),
            source,
        }
    }

    /// Configuration mistakes detected before any descriptor is touched.
    pub fn is_usage(&self) -> bool {
        matches!(self, Self::NoDestinations | Self::HexWithoutConsole)
    }

    /// Everything that is not a usage mistake stops the forwarder. Conditions
    /// a sink recovers from are [`WriteOutcome`](crate::WriteOutcome) values,
    /// never errors.
    pub fn is_fatal(&self) -> bool {
        !self.is_usage()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn display_names_operation_and_endpoint() {
        let err = FanoutError::termios("tcsetattr", "/dev/ttyUSB0", Errno::EIO);
        assert_eq!(err.to_string(), "tcsetattr failed on /dev/ttyUSB0");
        assert_eq!(err.source().map(|s| s.to_string()), Some(Errno::EIO.to_string()));
    }

    #[test]
    fn open_error_shows_path() {
        let err = FanoutError::Open {
            path: PathBuf::from("/dev/ttyS9"),
            source: io::Error::from(io::ErrorKind::NotFound),
        };
        assert_eq!(err.to_string(), "failed to open /dev/ttyS9");
    }

    #[test]
    fn usage_errors() {
        assert!(FanoutError::NoDestinations.is_usage());
        assert!(FanoutError::HexWithoutConsole.is_usage());
        assert!(!FanoutError::PtyAllocation(Errno::EMFILE).is_usage());
    }

    #[test]
    fn runtime_errors_are_fatal() {
        let fatal = [
            FanoutError::PtyAllocation(Errno::EMFILE),
            FanoutError::Poll(Errno::EBADF),
            FanoutError::UnsupportedBaudRate(12345),
            FanoutError::RecreateUnsupported {
                name: "stdout".to_string(),
            },
            FanoutError::SinkWrite {
                name: "/dev/pts/3".to_string(),
                source: io::Error::from(io::ErrorKind::PermissionDenied),
            },
            FanoutError::NameReport {
                target: "stdout".to_string(),
                source: io::Error::from(io::ErrorKind::WriteZero),
            },
        ];
        for err in &fatal {
            assert!(err.is_fatal(), "{err} should be fatal");
        }
        assert!(!FanoutError::NoDestinations.is_fatal());
        assert!(!FanoutError::HexWithoutConsole.is_fatal());
    }
}
