#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::redundant_closure_for_method_calls)]

//! respawn library — the pieces behind the `supervisor` binary.
//!
//! - `config` — CLI flags and environment fallbacks
//! - `resolve` — program name → executable path (`PATH` search)
//! - `pidfile` — best-effort PID file write/remove
//! - `launcher` — `fork` + `execv` child creation
//! - `context` — child handle and termination flag shared with the router
//! - `event` — events consumed by the state machine
//! - `signals` — SIGCHLD/SIGINT/SIGTERM/SIGHUP → events
//! - `supervisor` — restart-or-exit state machine and respawn policy

pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod launcher;
pub mod pidfile;
pub mod resolve;
pub mod signals;
pub mod supervisor;

// Re-export key types at crate root for convenience.
pub use config::{Cli, Config};
pub use context::SupervisorContext;
pub use error::{Error, Result};
pub use event::{Event, ExitStatus};
pub use launcher::{ForkExec, Launch, ProgramSpec};
pub use pidfile::PidFile;
pub use signals::SignalRouter;
pub use supervisor::{RespawnPolicy, Supervisor};
