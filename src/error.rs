//! Fatal supervisor errors.
//!
//! Everything in here ends the process with a non-zero status. Recoverable
//! conditions (PID-file I/O, a child failing to exec) never become an
//! [`Error`]; they are logged where they happen and the loop carries on.

use std::io;

/// Errors that terminate the supervisor.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The program token could not be resolved to an executable.
    #[error("program {0} not found in PATH")]
    ProgramNotFound(String),

    /// A path or argument cannot be passed to exec (interior NUL byte).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A configuration value from the command line or environment is unusable.
    #[error("configuration error: {0}")]
    Config(String),

    /// Installing a signal handler failed.
    #[error("failed to install {signal} handler: {source}")]
    SignalSetup {
        signal: &'static str,
        #[source]
        source: io::Error,
    },

    /// `fork()` failed; no new process could be created.
    #[error("fork failed: {0}")]
    Fork(#[source] nix::Error),

    /// The signal router stopped delivering events.
    #[error("signal router stopped unexpectedly")]
    EventsClosed,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
