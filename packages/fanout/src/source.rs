//! The single input the forwarder reads from.

use std::fmt;
use std::path::PathBuf;

use tracing::info;

use crate::baud;
use crate::endpoint::Endpoint;
use crate::error::Result;
use crate::mode::{self, TerminalGuard};

/// Positional words that select standard input instead of a device.
pub const STDIN_TOKENS: [&str; 3] = ["con", "stdin", "-"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceTarget {
    Stdin,
    Device(PathBuf),
}

impl SourceTarget {
    pub fn parse(arg: &str) -> Self {
        if STDIN_TOKENS.contains(&arg) {
            Self::Stdin
        } else {
            Self::Device(PathBuf::from(arg))
        }
    }
}

impl fmt::Display for SourceTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdin => write!(f, "stdin"),
            Self::Device(path) => write!(f, "{}", path.display()),
        }
    }
}

/// The source endpoint plus whatever is needed to undo its setup.
#[derive(Debug)]
pub struct Source {
    endpoint: Endpoint,
    guard: Option<TerminalGuard>,
}

impl Source {
    /// Open and configure the source.
    ///
    /// A device is opened non-blocking, its terminal attributes are saved,
    /// then it gets the requested speed, raw mode, and non-canonical reads.
    /// Standard input only becomes non-blocking; its original flags are
    /// saved. Everything saved is restored when the source is dropped.
    pub fn open(target: &SourceTarget, speed: u32) -> Result<Self> {
        let source = match target {
            SourceTarget::Stdin => {
                let endpoint = Endpoint::stdin()?;
                let guard = TerminalGuard::new(&endpoint)?.save_flags()?;
                mode::prepare(&endpoint)?;
                Self {
                    endpoint,
                    guard: Some(guard),
                }
            }
            SourceTarget::Device(path) => {
                let rate = baud::lookup(speed)?;
                let endpoint = Endpoint::open_device(path)?;
                let guard = TerminalGuard::new(&endpoint)?.save_termios()?;
                mode::set_speed(&endpoint, rate)?;
                mode::set_raw(&endpoint)?;
                mode::prepare(&endpoint)?;
                Self {
                    endpoint,
                    guard: Some(guard),
                }
            }
        };

        info!(source = %source.endpoint.name(), "source opened");
        Ok(source)
    }

    /// Use an endpoint that is already open and prepared.
    pub fn from_endpoint(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            guard: None,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn name(&self) -> &str {
        self.endpoint.name()
    }

    /// Whether terminal attributes were captured at open time.
    pub fn has_saved_terminal(&self) -> bool {
        self.guard.as_ref().is_some_and(TerminalGuard::has_termios)
    }

    /// Restore the source's original settings now rather than on drop.
    pub fn restore(&mut self) -> Result<()> {
        match self.guard.as_mut() {
            Some(guard) => guard.restore(),
            None => Ok(()),
        }
    }
}
