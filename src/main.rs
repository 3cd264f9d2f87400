#![deny(clippy::all)]
#![warn(clippy::pedantic)]

//! # supervisor
//!
//! Keeps a single program alive. The child is restarted every time it exits;
//! SIGINT, SIGTERM and SIGHUP are forwarded to it and, once it has exited,
//! the supervisor removes its PID file and exits 0.
//!
//! ```text
//! supervisor [--pidfile <path>] [--delay <ms>] -- <program> [args...]
//! ```
//!
//! ## Startup order
//!
//! 1. resolve `<program>` against `PATH` (fatal if not found, no PID file yet)
//! 2. write the PID file (best-effort)
//! 3. install signal handlers (fatal, PID file removed)
//! 4. launch the child and run the supervision loop
//!
//! Everything runs on one thread: the signal router is a task on the same
//! current-thread runtime as the supervisor loop.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use respawn::{
    resolve, Cli, Config, ForkExec, PidFile, ProgramSpec, SignalRouter, Supervisor,
    SupervisorContext,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let config = match Config::load(Cli::parse()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("supervisor: {e}");
            return ExitCode::FAILURE;
        }
    };

    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone());
    tracing_subscriber::fmt()
        .with_env_filter(log_filter)
        .with_writer(std::io::stderr)
        .init();

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> respawn::Result<()> {
    let path = resolve::resolve(config.program())?;
    let spec = ProgramSpec::new(path, &config.command)?;
    info!(
        "supervisor v{} (pid {}) supervising {}",
        env!("CARGO_PKG_VERSION"),
        std::process::id(),
        spec.path().display()
    );

    let pidfile = PidFile::create(config.pidfile.clone());

    let router = match SignalRouter::install() {
        Ok(router) => router,
        Err(e) => {
            pidfile.remove();
            return Err(e);
        }
    };

    let ctx = Arc::new(SupervisorContext::new());
    let mut events = router.spawn(ctx.clone());

    Supervisor::new(spec, config.respawn_policy(), ctx, ForkExec, pidfile)
        .run(&mut events)
        .await
}
