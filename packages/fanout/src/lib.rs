//! Fanout - single-threaded serial fan-out engine
//!
//! This crate copies every byte read from one source descriptor (a serial
//! line or standard input) to an ordered set of sinks: freshly allocated
//! pseudo-terminal masters and, optionally, standard output. A sink whose
//! consumer has gone away is transparently rebuilt on a new pseudo-terminal
//! while the other sinks and the source keep running.
//!
//! It has no CLI and never exits the process; every fatal condition is
//! returned as a [`FanoutError`].
//!
//! # Example
//!
//! ```no_run
//! use fanout::{Forwarder, LoopOptions, NameReport, OpenPty, RegistryConfig, Source, SourceTarget};
//!
//! fn main() -> fanout::Result<()> {
//!     let source = Source::open(&SourceTarget::parse("/dev/ttyUSB0"), 115200)?;
//!     let mut allocator = OpenPty::with_baud(115200)?;
//!     let mut reporter = NameReport::stdout();
//!
//!     let config = RegistryConfig {
//!         pty_count: 2,
//!         console: false,
//!         hex: false,
//!     };
//!     let registry = fanout::SinkRegistry::build(&config, &mut allocator, &mut reporter)?;
//!
//!     let mut forwarder = Forwarder::new(source, registry, allocator, reporter, LoopOptions::default());
//!     let exit = forwarder.run()?;
//!     println!("forwarder stopped: {:?}", exit);
//!     Ok(())
//! }
//! ```

pub mod baud;
pub mod endpoint;
pub mod engine;
mod error;
pub mod hex;
pub mod mode;
pub mod names;
pub mod pty;
pub mod registry;
pub mod sink;
pub mod source;

/// Largest number of bytes moved from the source in one read.
pub const CHUNK_SIZE: usize = 1024;

pub use endpoint::{Endpoint, EndpointKind};
pub use engine::{BroadcastReport, Forwarder, LoopExit, LoopOptions, Step};
pub use error::{FanoutError, Result};
pub use names::{NameReport, NameReporter};
pub use pty::{OpenPty, PtyAllocator, PtyPair};
pub use registry::{RegistryConfig, SinkId, SinkRegistry};
pub use sink::{Sink, SinkKind, WriteOutcome};
pub use source::{Source, SourceTarget};
