//! Numeric line speeds to platform `BaudRate` values.

use nix::sys::termios::BaudRate;

use crate::error::{FanoutError, Result};

pub const DEFAULT_BAUD: u32 = 115200;

/// Look up the platform constant for a numeric baud rate.
pub fn lookup(speed: u32) -> Result<BaudRate> {
    let rate = match speed {
        0 => BaudRate::B0,
        50 => BaudRate::B50,
        75 => BaudRate::B75,
        110 => BaudRate::B110,
        134 => BaudRate::B134,
        150 => BaudRate::B150,
        200 => BaudRate::B200,
        300 => BaudRate::B300,
        600 => BaudRate::B600,
        1200 => BaudRate::B1200,
        1800 => BaudRate::B1800,
        2400 => BaudRate::B2400,
        4800 => BaudRate::B4800,
        #[cfg(any(
            target_os = "macos",
            target_os = "ios",
            target_os = "freebsd",
            target_os = "dragonfly",
            target_os = "netbsd",
            target_os = "openbsd"
        ))]
        7200 => BaudRate::B7200,
        9600 => BaudRate::B9600,
        #[cfg(any(
            target_os = "macos",
            target_os = "ios",
            target_os = "freebsd",
            target_os = "dragonfly",
            target_os = "netbsd",
            target_os = "openbsd"
        ))]
        14400 => BaudRate::B14400,
        19200 => BaudRate::B19200,
        #[cfg(any(
            target_os = "macos",
            target_os = "ios",
            target_os = "freebsd",
            target_os = "dragonfly",
            target_os = "netbsd",
            target_os = "openbsd"
        ))]
        28800 => BaudRate::B28800,
        38400 => BaudRate::B38400,
        57600 => BaudRate::B57600,
        #[cfg(any(
            target_os = "macos",
            target_os = "ios",
            target_os = "freebsd",
            target_os = "dragonfly",
            target_os = "netbsd",
            target_os = "openbsd"
        ))]
        76800 => BaudRate::B76800,
        115200 => BaudRate::B115200,
        230400 => BaudRate::B230400,
        #[cfg(any(target_os = "linux", target_os = "android"))]
        460800 => BaudRate::B460800,
        #[cfg(any(target_os = "linux", target_os = "android"))]
        500000 => BaudRate::B500000,
        #[cfg(any(target_os = "linux", target_os = "android"))]
        576000 => BaudRate::B576000,
        #[cfg(any(target_os = "linux", target_os = "android"))]
        921600 => BaudRate::B921600,
        #[cfg(any(target_os = "linux", target_os = "android"))]
        1000000 => BaudRate::B1000000,
        #[cfg(any(target_os = "linux", target_os = "android"))]
        1152000 => BaudRate::B1152000,
        #[cfg(any(target_os = "linux", target_os = "android"))]
        1500000 => BaudRate::B1500000,
        #[cfg(any(target_os = "linux", target_os = "android"))]
        2000000 => BaudRate::B2000000,
        other => return Err(FanoutError::UnsupportedBaudRate(other)),
    };
    Ok(rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn common_rates() {
        assert_eq!(lookup(9600).unwrap(), BaudRate::B9600);
        assert_eq!(lookup(DEFAULT_BAUD).unwrap(), BaudRate::B115200);
        assert_eq!(lookup(0).unwrap(), BaudRate::B0);
    }

    #[test]
    fn unknown_rate_is_rejected() {
        let err = lookup(12345).unwrap_err();
        assert!(matches!(err, FanoutError::UnsupportedBaudRate(12345)));
        assert_eq!(err.to_string(), "unsupported baud rate 12345");
    }
}
