use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use fanout::{LoopOptions, RegistryConfig, SourceTarget};
use serde::{Deserialize, Serialize};

use crate::cli::Cli;

// =============================================================================
// Tunables (figment-deserialized from defaults / --config file / env vars)
// =============================================================================
//
//   decipede.toml:   source_baud = 9600
//   env var:         DECIPEDE_SOURCE_BAUD=9600
//
// Flags given on the command line win over both.

/// Settings that can come from a file or the environment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default = "default_baud")]
    pub source_baud: u32,
    #[serde(default = "default_baud")]
    pub sink_baud: u32,
    /// Upper bound on one readiness wait, in milliseconds.
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,
    /// Log descriptor flags whenever the readiness wait times out.
    #[serde(default)]
    pub diagnostics: bool,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            source_baud: default_baud(),
            sink_baud: default_baud(),
            poll_timeout_ms: default_poll_timeout_ms(),
            diagnostics: false,
        }
    }
}

fn default_baud() -> u32 {
    fanout::baud::DEFAULT_BAUD
}

fn default_poll_timeout_ms() -> u64 {
    500
}

/// Build a figment that layers: defaults → config file → DECIPEDE_* env vars.
pub fn load_config(file: Option<&Path>) -> figment::Figment {
    use figment::{
        Figment,
        providers::{Env, Format, Serialized, Toml},
    };

    let mut figment = Figment::from(Serialized::defaults(FileConfig::default()));
    if let Some(path) = file {
        figment = figment.merge(Toml::file(path));
    }
    figment.merge(Env::prefixed("DECIPEDE_"))
}

/// Everything the forwarder needs, resolved once at startup.
#[derive(Clone, Debug)]
pub struct ForwarderConfig {
    pub source: SourceTarget,
    pub source_baud: u32,
    pub sink_baud: u32,
    pub pty_count: usize,
    pub console: bool,
    pub hex: bool,
    /// Where pty names go; `None` means stdout.
    pub names_file: Option<PathBuf>,
    pub poll_timeout: Duration,
    pub verbosity: u8,
    pub diagnostics: bool,
}

impl ForwarderConfig {
    /// Layer the command line over the figment-loaded file config.
    pub fn resolve(cli: &Cli) -> Result<Self> {
        if let Some(path) = &cli.config {
            anyhow::ensure!(path.exists(), "config file {} does not exist", path.display());
        }
        let file: FileConfig = load_config(cli.config.as_deref())
            .extract()
            .context("Failed to load configuration")?;
        Ok(Self::from_parts(cli, &file))
    }

    pub fn from_parts(cli: &Cli, file: &FileConfig) -> Self {
        Self {
            source: SourceTarget::parse(&cli.device),
            source_baud: cli.baud.unwrap_or(file.source_baud),
            sink_baud: cli.sink_baud.unwrap_or(file.sink_baud),
            pty_count: cli.count,
            console: cli.console,
            hex: cli.hex,
            names_file: cli.output.clone(),
            poll_timeout: Duration::from_millis(file.poll_timeout_ms),
            verbosity: cli.debug,
            diagnostics: file.diagnostics || cli.debug > 0,
        }
    }

    pub fn registry(&self) -> RegistryConfig {
        RegistryConfig {
            pty_count: self.pty_count,
            console: self.console,
            hex: self.hex,
        }
    }

    pub fn loop_options(&self) -> LoopOptions {
        LoopOptions {
            poll_timeout: self.poll_timeout,
            diagnostics: self.diagnostics,
        }
    }
}
