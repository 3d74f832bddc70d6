//! The fixed, ordered set of sinks.

use std::fmt;

use tracing::info;

use crate::error::{FanoutError, Result};
use crate::names::NameReporter;
use crate::pty::PtyAllocator;
use crate::sink::Sink;

/// How many sinks of each kind to create at startup.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Number of pty sinks.
    pub pty_count: usize,
    /// Add a sink on standard output.
    pub console: bool,
    /// Render the console sink as hex.
    pub hex: bool,
}

impl RegistryConfig {
    pub fn destinations(&self) -> usize {
        self.pty_count + usize::from(self.console)
    }

    pub fn validate(&self) -> Result<()> {
        if self.destinations() == 0 {
            return Err(FanoutError::NoDestinations);
        }
        if self.hex && !self.console {
            return Err(FanoutError::HexWithoutConsole);
        }
        Ok(())
    }
}

/// Position of a sink in the registry. Stable for the life of the process.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct SinkId(pub usize);

impl fmt::Display for SinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sink-{}", self.0)
    }
}

/// Sinks in broadcast order. Membership never changes after construction;
/// only the sinks themselves are mutated.
#[derive(Debug)]
pub struct SinkRegistry {
    sinks: Vec<Sink>,
}

impl SinkRegistry {
    /// Create the console sink (if requested) followed by `pty_count` pty sinks.
    pub fn build<A, R>(config: &RegistryConfig, allocator: &mut A, reporter: &mut R) -> Result<Self>
    where
        A: PtyAllocator + ?Sized,
        R: NameReporter + ?Sized,
    {
        config.validate()?;

        let mut sinks = Vec::with_capacity(config.destinations());
        if config.console {
            sinks.push(Sink::console(config.hex)?);
        }
        for _ in 0..config.pty_count {
            sinks.push(Sink::pty(allocator, reporter)?);
        }

        info!(
            sinks = sinks.len(),
            console = config.console,
            hex = config.hex,
            "sink registry ready"
        );
        Self::from_sinks(sinks)
    }

    /// Use sinks created elsewhere, in the given order.
    pub fn from_sinks(sinks: Vec<Sink>) -> Result<Self> {
        if sinks.is_empty() {
            return Err(FanoutError::NoDestinations);
        }
        Ok(Self { sinks })
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    pub fn get(&self, id: SinkId) -> Option<&Sink> {
        self.sinks.get(id.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (SinkId, &Sink)> {
        self.sinks
            .iter()
            .enumerate()
            .map(|(index, sink)| (SinkId(index), sink))
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (SinkId, &mut Sink)> {
        self.sinks
            .iter_mut()
            .enumerate()
            .map(|(index, sink)| (SinkId(index), sink))
    }
}
