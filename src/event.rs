//! Events fed into the supervisor state machine.
//!
//! The signal layer translates SIGCHLD / SIGINT / SIGTERM / SIGHUP into these;
//! the state machine never sees a signal number.

use std::fmt;

use nix::sys::wait::WaitStatus;
use nix::unistd::Pid;

/// How a reaped child finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// Exited normally with this code.
    Code(i32),
    /// Killed by this signal number.
    Signaled(i32),
}

impl ExitStatus {
    pub fn success(self) -> bool {
        matches!(self, ExitStatus::Code(0))
    }

    /// Decode a terminal `waitpid` result. Stop/continue reports yield `None`.
    pub fn from_wait_status(status: WaitStatus) -> Option<(Pid, Self)> {
        match status {
            WaitStatus::Exited(pid, code) => Some((pid, ExitStatus::Code(code))),
            WaitStatus::Signaled(pid, sig, _) => Some((pid, ExitStatus::Signaled(sig as i32))),
            _ => None,
        }
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitStatus::Code(c) => write!(f, "exit code {c}"),
            ExitStatus::Signaled(s) => write!(f, "killed by signal {s}"),
        }
    }
}

/// Something the supervisor has to react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// The tracked child was reaped. The context's child handle is already cleared.
    ChildExited { pid: Pid, status: ExitStatus },
    /// A termination signal arrived. Termination intent is already set.
    TerminationRequested,
}
