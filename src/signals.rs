//! Signal router: SIGCHLD and termination signals → [`Event`]s.
//!
//! tokio's signal driver installs the real handlers, which only note that a
//! signal arrived. Reaping, forwarding and bookkeeping run here in ordinary
//! task context, so nothing in this module has to be async-signal-safe.
//!
//! - **SIGCHLD** drains `waitpid(-1, WNOHANG)`. Exits of the tracked child
//!   clear the child handle and become [`Event::ChildExited`]; anything else
//!   is dropped.
//! - **SIGINT / SIGTERM / SIGHUP** set termination intent, forward the same
//!   signal to the live child (if any) and emit [`Event::TerminationRequested`].

use std::sync::Arc;

use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::context::SupervisorContext;
use crate::error::{Error, Result};
use crate::event::{Event, ExitStatus};

/// What woke the router up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    ChildStateChanged,
    Terminate(Signal),
}

/// Installed signal streams. Create before the first launch so no SIGCHLD is missed.
pub struct SignalRouter {
    sigchld: tokio::signal::unix::Signal,
    sigint: tokio::signal::unix::Signal,
    sigterm: tokio::signal::unix::Signal,
    sighup: tokio::signal::unix::Signal,
}

fn install(kind: SignalKind, name: &'static str) -> Result<tokio::signal::unix::Signal> {
    signal(kind).map_err(|source| Error::SignalSetup {
        signal: name,
        source,
    })
}

impl SignalRouter {
    /// Register handlers for SIGCHLD, SIGINT, SIGTERM and SIGHUP.
    ///
    /// Must be called from within a tokio runtime.
    pub fn install() -> Result<Self> {
        Ok(Self {
            sigchld: install(SignalKind::child(), "SIGCHLD")?,
            sigint: install(SignalKind::interrupt(), "SIGINT")?,
            sigterm: install(SignalKind::terminate(), "SIGTERM")?,
            sighup: install(SignalKind::hangup(), "SIGHUP")?,
        })
    }

    /// Wait for the next signal. `None` once the signal driver is gone.
    async fn wait(&mut self) -> Option<Trigger> {
        tokio::select! {
            r = self.sigchld.recv() => r.map(|()| Trigger::ChildStateChanged),
            r = self.sigint.recv() => r.map(|()| Trigger::Terminate(Signal::SIGINT)),
            r = self.sigterm.recv() => r.map(|()| Trigger::Terminate(Signal::SIGTERM)),
            r = self.sighup.recv() => r.map(|()| Trigger::Terminate(Signal::SIGHUP)),
        }
    }

    /// Run the router on its own task, returning the event stream.
    ///
    /// The task ends when the receiver is dropped.
    pub fn spawn(mut self, ctx: Arc<SupervisorContext>) -> mpsc::UnboundedReceiver<Event> {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while let Some(trigger) = self.wait().await {
                let events = match trigger {
                    Trigger::ChildStateChanged => reap(&ctx),
                    Trigger::Terminate(sig) => vec![forward_termination(&ctx, sig)],
                };
                for event in events {
                    if tx.send(event).is_err() {
                        return;
                    }
                }
            }
            warn!("signal driver shut down, router exiting");
        });
        rx
    }
}

/// Drain every pending child state change.
fn reap(ctx: &SupervisorContext) -> Vec<Event> {
    let mut events = Vec::new();
    loop {
        match waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) | Err(Errno::ECHILD) => break,
            Ok(status) => {
                if let Some((pid, exit)) = ExitStatus::from_wait_status(status) {
                    if let Some(event) = child_reaped(ctx, pid, exit) {
                        events.push(event);
                    }
                }
            }
            Err(Errno::EINTR) => {}
            Err(e) => {
                warn!("waitpid failed: {e}");
                break;
            }
        }
    }
    events
}

/// Turn a reaped pid into an event if it is the tracked child.
fn child_reaped(ctx: &SupervisorContext, pid: Pid, status: ExitStatus) -> Option<Event> {
    if ctx.clear_child(pid) {
        Some(Event::ChildExited { pid, status })
    } else {
        debug!("reaped untracked pid {pid} ({status})");
        None
    }
}

/// Record termination intent and pass `sig` on to the live child.
fn forward_termination(ctx: &SupervisorContext, sig: Signal) -> Event {
    if ctx.request_termination() {
        info!("received {sig}, shutting down after the child exits");
    } else {
        debug!("received {sig} again");
    }
    if let Some(pid) = ctx.child() {
        match kill(pid, sig) {
            Ok(()) => info!("forwarded {sig} to child {pid}"),
            // Already exited; the pending SIGCHLD drives shutdown.
            Err(Errno::ESRCH) => debug!("child {pid} already gone"),
            Err(e) => warn!("failed to forward {sig} to child {pid}: {e}"),
        }
    }
    Event::TerminationRequested
}
