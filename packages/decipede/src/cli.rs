use std::path::PathBuf;

use clap::{ArgAction, Parser};

#[derive(Parser, Debug)]
#[command(name = "decipede")]
#[command(about = "Copy one serial device to many pseudo terminals")]
#[command(long_about = "\
Reads data from the device given as the last argument and writes it into \
pseudo terminals created at startup. A pseudo terminal whose reader goes \
away is replaced by a new one and its name is reported again.

Use \"con\", \"stdin\" or \"-\" as the device to read from standard input.")]
pub struct Cli {
    /// Number of pseudo terminals to create
    #[arg(short = 'n', long = "count", default_value_t = 1)]
    pub count: usize,

    /// Baud rate of the source device [default: 115200]
    #[arg(short = 'b', long = "baud")]
    pub baud: Option<u32>,

    /// Baud rate of the created pseudo terminals [default: 115200]
    #[arg(short = 'B', long = "sink-baud")]
    pub sink_baud: Option<u32>,

    /// File receiving the created device names, one per line (default: stdout)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Also write data to the console
    #[arg(short = 'C', long)]
    pub console: bool,

    /// Write console data as a hex dump (requires -C)
    #[arg(short = 'x', long)]
    pub hex: bool,

    /// Increase log verbosity (repeatable)
    #[arg(short = 'd', long = "debug", action = ArgAction::Count)]
    pub debug: u8,

    /// Optional TOML file with default settings
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Source device, or "con" / "stdin" / "-" for standard input
    pub device: String,
}

/// Argument combinations clap accepts but the forwarder cannot run with.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UsageError {
    #[error("at least one destination is required (-n > 0 or -C)")]
    NoDestinations,
    #[error("-x requires -C")]
    HexWithoutConsole,
}

impl Cli {
    pub fn validate(&self) -> Result<(), UsageError> {
        if self.count == 0 && !self.console {
            return Err(UsageError::NoDestinations);
        }
        if self.hex && !self.console {
            return Err(UsageError::HexWithoutConsole);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("decipede").chain(args.iter().copied()))
    }

    #[test]
    fn defaults() {
        let cli = parse(&["/dev/ttyUSB0"]).unwrap();
        assert_eq!(cli.count, 1);
        assert_eq!(cli.baud, None);
        assert_eq!(cli.sink_baud, None);
        assert!(!cli.console);
        assert!(!cli.hex);
        assert_eq!(cli.debug, 0);
        assert_eq!(cli.device, "/dev/ttyUSB0");
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn short_flags() {
        let cli = parse(&[
            "-n", "3", "-b", "9600", "-B", "38400", "-o", "/tmp/ptys", "-C", "-x", "-dd", "con",
        ])
        .unwrap();
        assert_eq!(cli.count, 3);
        assert_eq!(cli.baud, Some(9600));
        assert_eq!(cli.sink_baud, Some(38400));
        assert_eq!(cli.output, Some(PathBuf::from("/tmp/ptys")));
        assert!(cli.console);
        assert!(cli.hex);
        assert_eq!(cli.debug, 2);
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn zero_destinations() {
        let cli = parse(&["-n", "0", "/dev/ttyS0"]).unwrap();
        assert_eq!(cli.validate(), Err(UsageError::NoDestinations));

        let cli = parse(&["-n", "0", "-C", "/dev/ttyS0"]).unwrap();
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn hex_without_console() {
        let cli = parse(&["-x", "/dev/ttyS0"]).unwrap();
        assert_eq!(cli.validate(), Err(UsageError::HexWithoutConsole));
    }

    #[test]
    fn exactly_one_device() {
        assert!(parse(&[]).is_err());
        assert!(parse(&["/dev/ttyS0", "/dev/ttyS1"]).is_err());
    }

    #[test]
    fn help_is_a_display_request() {
        let err = parse(&["-h"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }
}
