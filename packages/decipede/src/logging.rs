use tracing_subscriber::prelude::*;

/// Filter used when `RUST_LOG` is not set.
pub fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "decipede=info,fanout=info,warn",
        1 => "decipede=debug,fanout=debug,info",
        _ => "decipede=trace,fanout=trace,info",
    }
}

/// Install the global subscriber. Logs go to stderr; stdout may be carrying
/// data or pty names.
pub fn init(verbosity: u8) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive(verbosity)));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}
