//! Scoped SIGPIPE suppression around socket writes.

use std::mem::MaybeUninit;
use std::ptr;

/// Ignores SIGPIPE until dropped, then restores the previous disposition.
pub(crate) struct SigpipeGuard {
    previous: Option<libc::sigaction>,
}

impl SigpipeGuard {
    pub(crate) fn ignore() -> Self {
        // SAFETY: `ignore` is fully initialized before use, `previous` is
        // written by sigaction and only read back when the call succeeded.
        unsafe {
            let mut ignore: libc::sigaction = MaybeUninit::zeroed().assume_init();
            ignore.sa_sigaction = libc::SIG_IGN;
            libc::sigemptyset(&mut ignore.sa_mask);

            let mut previous = MaybeUninit::<libc::sigaction>::zeroed();
            if libc::sigaction(libc::SIGPIPE, &ignore, previous.as_mut_ptr()) == 0 {
                Self {
                    previous: Some(previous.assume_init()),
                }
            } else {
                tracing::trace!(target: "async_dmconfig::transport", "could not ignore SIGPIPE");
                Self { previous: None }
            }
        }
    }
}

impl Drop for SigpipeGuard {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.as_ref() {
            // SAFETY: restores a disposition previously returned by sigaction.
            unsafe {
                libc::sigaction(libc::SIGPIPE, previous, ptr::null_mut());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn current_handler() -> libc::sighandler_t {
        unsafe {
            let mut cur = MaybeUninit::<libc::sigaction>::zeroed();
            libc::sigaction(libc::SIGPIPE, ptr::null(), cur.as_mut_ptr());
            cur.assume_init().sa_sigaction
        }
    }

    #[test]
    fn test_guard_restores_disposition() {
        let before = current_handler();
        {
            let _guard = SigpipeGuard::ignore();
            assert_eq!(current_handler(), libc::SIG_IGN);
        }
        assert_eq!(current_handler(), before);
    }
}
