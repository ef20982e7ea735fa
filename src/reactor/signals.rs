//! # Signal Mask
//!
//! Keeps `SIGINT`/`SIGTERM` blocked everywhere except inside the readiness wait.
//!
//! The loop checks its stop flag and then enters `ppoll` with a mask that
//! unblocks the termination signals atomically. A signal arriving between the
//! check and the wait stays pending and makes the wait return `EINTR`
//! immediately instead of being lost.

use std::io;
use std::mem::MaybeUninit;
use std::ptr;
use std::time::Duration;

use libc::c_int;

const TERMINATION_SIGNALS: [c_int; 2] = [libc::SIGINT, libc::SIGTERM];

extern "C" fn interrupt_wait(_signal: c_int) {}

/// Installed handlers plus the masks to restore on drop
pub struct SignalMask {
    previous_mask: libc::sigset_t,
    wait_mask: libc::sigset_t,
    previous_actions: Vec<(c_int, libc::sigaction)>,
}

impl SignalMask {
    /// Install interrupting handlers and block the termination signals for this thread
    pub fn install() -> io::Result<Self> {
        let mut previous_actions = Vec::with_capacity(TERMINATION_SIGNALS.len());

        // SAFETY: sigaction/sigset calls only write into locally owned, properly
        // sized structures; the handler is async-signal-safe (it does nothing).
        unsafe {
            let mut action: libc::sigaction = std::mem::zeroed();
            action.sa_sigaction = interrupt_wait as extern "C" fn(c_int) as libc::sighandler_t;
            libc::sigemptyset(&mut action.sa_mask);
            // No SA_RESTART: the wait must return EINTR
            action.sa_flags = 0;

            for signal in TERMINATION_SIGNALS {
                let mut previous = MaybeUninit::<libc::sigaction>::zeroed();
                if libc::sigaction(signal, &action, previous.as_mut_ptr()) != 0 {
                    return Err(io::Error::last_os_error());
                }
                previous_actions.push((signal, previous.assume_init()));
            }

            let mut block = empty_set();
            for signal in TERMINATION_SIGNALS {
                libc::sigaddset(&mut block, signal);
            }

            let mut previous_mask = empty_set();
            let rc = libc::pthread_sigmask(libc::SIG_BLOCK, &block, &mut previous_mask);
            if rc != 0 {
                return Err(io::Error::from_raw_os_error(rc));
            }

            let mut wait_mask = previous_mask;
            for signal in TERMINATION_SIGNALS {
                libc::sigdelset(&mut wait_mask, signal);
            }

            Ok(Self {
                previous_mask,
                wait_mask,
                previous_actions,
            })
        }
    }

    /// Mask to apply for the duration of the wait
    pub fn wait_mask(&self) -> &libc::sigset_t {
        &self.wait_mask
    }
}

impl Drop for SignalMask {
    fn drop(&mut self) {
        // SAFETY: restores state captured in `install`
        unsafe {
            libc::pthread_sigmask(libc::SIG_SETMASK, &self.previous_mask, ptr::null_mut());
            for (signal, action) in &self.previous_actions {
                libc::sigaction(*signal, action, ptr::null_mut());
            }
        }
    }
}

fn empty_set() -> libc::sigset_t {
    let mut set = MaybeUninit::<libc::sigset_t>::zeroed();
    // SAFETY: sigemptyset initialises the set
    unsafe {
        libc::sigemptyset(set.as_mut_ptr());
        set.assume_init()
    }
}

/// Block until a descriptor in `fds` is ready, the timeout elapses, or a signal
/// unblocked by `mask` arrives.
///
/// `None` for `timeout` blocks indefinitely; `None` for `mask` keeps the
/// caller's mask. Returns the number of ready descriptors.
pub fn wait_ready(
    fds: &mut [libc::pollfd],
    timeout: Option<Duration>,
    mask: Option<&libc::sigset_t>,
) -> io::Result<usize> {
    let spec = timeout.map(|d| libc::timespec {
        tv_sec: d.as_secs() as libc::time_t,
        tv_nsec: d.subsec_nanos() as libc::c_long,
    });
    let spec_ptr = spec.as_ref().map_or(ptr::null(), |t| t as *const libc::timespec);
    let mask_ptr = mask.map_or(ptr::null(), |m| m as *const libc::sigset_t);

    // SAFETY: `fds` is a valid, exclusively borrowed slice for the call duration
    let rc = unsafe {
        libc::ppoll(
            fds.as_mut_ptr(),
            fds.len() as libc::nfds_t,
            spec_ptr,
            mask_ptr,
        )
    };
    if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(rc as usize)
    }
}

/// Serialises tests that install or restore the process-wide signal handlers
#[cfg(test)]
pub(crate) fn test_lock() -> std::sync::MutexGuard<'static, ()> {
    static LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
    LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
