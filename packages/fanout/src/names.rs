//! Publishing pty names so consumers know where to attach.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::fd::AsFd;
use std::path::{Path, PathBuf};

use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};

use crate::error::{FanoutError, Result};

/// Receives the device path of every pty sink, at startup and after each
/// recreation.
pub trait NameReporter {
    fn publish(&mut self, name: &str) -> Result<()>;
}

/// Collects names in memory.
impl NameReporter for Vec<String> {
    fn publish(&mut self, name: &str) -> Result<()> {
        self.push(name.to_string());
        Ok(())
    }
}

/// Writes one name per line to a file or to standard output.
#[derive(Debug, Clone)]
pub enum NameReport {
    Stdout,
    File(PathBuf),
}

impl NameReport {
    pub fn stdout() -> Self {
        Self::Stdout
    }

    /// Report into `path`, truncating whatever it held before.
    pub fn file(path: &Path) -> Result<Self> {
        File::create(path).map_err(|source| FanoutError::NameReport {
            target: path.display().to_string(),
            source,
        })?;
        Ok(Self::File(path.to_path_buf()))
    }

    fn target(&self) -> String {
        match self {
            Self::Stdout => "stdout".to_string(),
            Self::File(path) => path.display().to_string(),
        }
    }

    fn append(&self, name: &str) -> io::Result<()> {
        match self {
            Self::Stdout => {
                // A console sink may have made this description non-blocking.
                let mut out = File::from(io::stdout().as_fd().try_clone_to_owned()?);
                write_all_waiting(&mut out, format!("{}\n", name).as_bytes())
            }
            Self::File(path) => {
                let mut file = OpenOptions::new().append(true).create(true).open(path)?;
                writeln!(file, "{}", name)
            }
        }
    }
}

/// Write all of `bytes`, waiting for room whenever the descriptor is
/// non-blocking and full.
fn write_all_waiting<W: Write + AsFd>(out: &mut W, mut bytes: &[u8]) -> io::Result<()> {
    while !bytes.is_empty() {
        match out.write(bytes) {
            Ok(0) => return Err(io::Error::from(io::ErrorKind::WriteZero)),
            Ok(n) => bytes = &bytes[n..],
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                let mut fds = [PollFd::new(out.as_fd(), PollFlags::POLLOUT)];
                match poll(&mut fds, PollTimeout::NONE) {
                    Ok(_) | Err(Errno::EINTR) => {}
                    Err(e) => return Err(io::Error::from(e)),
                }
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

impl NameReporter for NameReport {
    fn publish(&mut self, name: &str) -> Result<()> {
        self.append(name).map_err(|source| FanoutError::NameReport {
            target: self.target(),
            source,
        })
    }
}
