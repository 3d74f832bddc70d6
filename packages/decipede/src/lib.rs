// Library side of the decipede binary: argument parsing, layered
// configuration, logging and signal setup. The forwarding engine itself
// lives in the `fanout` crate.

pub mod cli;
pub mod config;
pub mod logging;
pub mod signals;

pub use cli::{Cli, UsageError};
pub use config::{FileConfig, ForwarderConfig, load_config};
