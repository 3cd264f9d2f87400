//! State shared between the supervisor loop and the signal router.
//!
//! Two fields, both atomics: the pid of the live child (0 = none) and the
//! one-shot termination flag. The supervisor writes the child on launch, the
//! router clears it on reap and sets the flag on SIGINT/SIGTERM/SIGHUP.

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

use nix::unistd::Pid;

const NO_CHILD: i32 = 0;

#[derive(Debug, Default)]
pub struct SupervisorContext {
    child: AtomicI32,
    terminating: AtomicBool,
}

impl SupervisorContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// The currently tracked child, if one is live.
    pub fn child(&self) -> Option<Pid> {
        match self.child.load(Ordering::SeqCst) {
            NO_CHILD => None,
            raw => Some(Pid::from_raw(raw)),
        }
    }

    /// Start tracking a freshly launched child.
    pub fn set_child(&self, pid: Pid) {
        let previous = self.child.swap(pid.as_raw(), Ordering::SeqCst);
        debug_assert_eq!(previous, NO_CHILD, "a child is already tracked");
    }

    /// Stop tracking `pid`. Returns `false` if `pid` is not the tracked child,
    /// which makes a repeated or stale reap a no-op.
    pub fn clear_child(&self, pid: Pid) -> bool {
        self.child
            .compare_exchange(pid.as_raw(), NO_CHILD, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Record termination intent. Returns `true` only for the first request.
    pub fn request_termination(&self) -> bool {
        !self.terminating.swap(true, Ordering::SeqCst)
    }

    pub fn is_terminating(&self) -> bool {
        self.terminating.load(Ordering::SeqCst)
    }
}
