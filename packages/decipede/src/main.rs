use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use fanout::{Forwarder, LoopExit, NameReport, OpenPty, Source, SinkRegistry};
use tracing::info;

use decipede::{Cli, ForwarderConfig, logging, signals};

fn main() -> Result<ExitCode> {
    // Usage problems of any kind print help and exit successfully.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return Ok(ExitCode::SUCCESS);
        }
    };
    if let Err(e) = cli.validate() {
        eprintln!("error: {}\n", e);
        let _ = Cli::command().print_help();
        return Ok(ExitCode::SUCCESS);
    }

    let config = ForwarderConfig::resolve(&cli)?;
    logging::init(config.verbosity);

    info!(source = %config.source, ptys = config.pty_count, console = config.console, "Starting decipede");

    let mut reporter = match &config.names_file {
        Some(path) => NameReport::file(path).context("Failed to prepare the names file")?,
        None => NameReport::stdout(),
    };

    let source = Source::open(&config.source, config.source_baud)
        .with_context(|| format!("Failed to open source {}", config.source))?;

    let stop = signals::install()?;

    let mut allocator = OpenPty::with_baud(config.sink_baud).context("Invalid sink baud rate")?;
    let registry = SinkRegistry::build(&config.registry(), &mut allocator, &mut reporter)
        .context("Failed to create destinations")?;

    let mut forwarder = Forwarder::new(source, registry, allocator, reporter, config.loop_options())
        .watch_signals(stop);

    match forwarder.run().context("Forwarding failed")? {
        LoopExit::SourceClosed => info!("Source closed, shutting down"),
        LoopExit::Signalled(signal) => {
            info!("{} received, restoring terminal settings", signals::describe(signal));
        }
    }

    // Dropping the forwarder restores the source and console settings.
    drop(forwarder);
    Ok(ExitCode::SUCCESS)
}
