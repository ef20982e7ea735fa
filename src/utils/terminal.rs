//! # Terminal Echo
//!
//! Local echo control for interactive password entry.

use std::mem::MaybeUninit;
use std::os::fd::RawFd;

use crate::error::{ProtocolError, Result};

/// Turn terminal echo on or off for `fd`.
///
/// Descriptors that are not terminals (pipes, files) are left alone.
pub fn set_echo(fd: RawFd, enabled: bool) -> Result<()> {
    // SAFETY: isatty only inspects the descriptor
    if unsafe { libc::isatty(fd) } != 1 {
        return Ok(());
    }

    let mut attrs = MaybeUninit::<libc::termios>::zeroed();
    // SAFETY: tcgetattr fills the zeroed termios on success
    if unsafe { libc::tcgetattr(fd, attrs.as_mut_ptr()) } != 0 {
        return Err(ProtocolError::TerminalError(format!(
            "tcgetattr failed: {}",
            std::io::Error::last_os_error()
        )));
    }
    // SAFETY: initialised by the successful tcgetattr above
    let mut attrs = unsafe { attrs.assume_init() };

    if enabled {
        attrs.c_lflag |= libc::ECHO;
    } else {
        attrs.c_lflag &= !libc::ECHO;
    }

    // SAFETY: attrs is a valid termios for this descriptor
    if unsafe { libc::tcsetattr(fd, libc::TCSANOW, &attrs) } != 0 {
        return Err(ProtocolError::TerminalError(format!(
            "tcsetattr failed: {}",
            std::io::Error::last_os_error()
        )));
    }
    Ok(())
}

/// Restores echo on drop
pub struct EchoGuard {
    fd: RawFd,
}

impl EchoGuard {
    /// Disable echo until the guard is dropped
    pub fn disable(fd: RawFd) -> Result<Self> {
        set_echo(fd, false)?;
        Ok(Self { fd })
    }
}

impl Drop for EchoGuard {
    fn drop(&mut self) {
        let _ = set_echo(self.fd, true);
    }
}
