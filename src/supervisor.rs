//! The supervision loop.
//!
//! Launches the child, and on every [`Event::ChildExited`] either restarts it
//! (after the respawn delay) or shuts down, depending on termination intent.
//! SIGINT/SIGTERM/SIGHUP never stop the loop directly: the router forwards the
//! signal to the child and the child's exit drives shutdown.
//!
//! ```text
//! Starting ──launch──▶ Running ──exit, no intent──▶ AwaitingRestart ──delay──▶ Starting
//!                         │                               │
//!                         └──exit, intent──▶ ShuttingDown ◀┘ termination during delay
//!                                                │
//!                                                ▼
//!                                             Stopped
//! ```

use std::sync::Arc;
use std::time::Duration;

use nix::unistd::Pid;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::context::SupervisorContext;
use crate::error::{Error, Result};
use crate::event::{Event, ExitStatus};
use crate::launcher::{Launch, ProgramSpec};
use crate::pidfile::PidFile;

/// First backoff step when the base delay is zero.
const MIN_BACKOFF: Duration = Duration::from_millis(100);

/// Delay between a child's exit and the next launch.
///
/// With `max_delay` unset (or not above `delay`) every restart waits exactly
/// `delay`. Otherwise quick exits double the wait up to `max_delay`, and a
/// child that stayed up for `stable_after` resets it.
#[derive(Debug, Clone)]
pub struct RespawnPolicy {
    delay: Duration,
    max_delay: Option<Duration>,
    stable_after: Duration,
    current: Duration,
}

impl RespawnPolicy {
    pub fn new(delay: Duration, max_delay: Option<Duration>, stable_after: Duration) -> Self {
        Self {
            delay,
            max_delay,
            stable_after,
            current: delay,
        }
    }

    /// Fixed delay, no backoff.
    pub fn fixed(delay: Duration) -> Self {
        Self::new(delay, None, Duration::ZERO)
    }

    fn backoff_cap(&self) -> Option<Duration> {
        self.max_delay.filter(|max| *max > self.delay)
    }

    /// Delay to apply after a child that ran for `uptime`.
    pub fn next_delay(&mut self, uptime: Duration) -> Duration {
        let Some(cap) = self.backoff_cap() else {
            return self.delay;
        };
        if uptime >= self.stable_after {
            self.current = self.delay;
        }
        let delay = self.current;
        let doubled = if delay.is_zero() {
            MIN_BACKOFF
        } else {
            delay.saturating_mul(2)
        };
        self.current = doubled.min(cap);
        delay
    }
}

impl Default for RespawnPolicy {
    fn default() -> Self {
        Self::fixed(Duration::ZERO)
    }
}

/// Supervisor lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Starting,
    Running,
    AwaitingRestart,
    ShuttingDown,
    Stopped,
}

/// Owns the program, the respawn policy and the PID file for the process lifetime.
pub struct Supervisor<L> {
    spec: ProgramSpec,
    policy: RespawnPolicy,
    ctx: Arc<SupervisorContext>,
    launcher: L,
    pidfile: PidFile,
    state: State,
    /// Last launched child and when it started.
    current: Option<(Pid, Instant)>,
    /// Uptime of the child that exited most recently.
    last_uptime: Duration,
    launches: u64,
}

impl<L: Launch> Supervisor<L> {
    pub fn new(
        spec: ProgramSpec,
        policy: RespawnPolicy,
        ctx: Arc<SupervisorContext>,
        launcher: L,
        pidfile: PidFile,
    ) -> Self {
        Self {
            spec,
            policy,
            ctx,
            launcher,
            pidfile,
            state: State::Starting,
            current: None,
            last_uptime: Duration::ZERO,
            launches: 0,
        }
    }

    /// Drive the state machine until shutdown.
    ///
    /// Returns `Ok(())` after a termination-driven shutdown. A launch failure
    /// or a closed event stream is fatal; the PID file is removed either way.
    pub async fn run(mut self, events: &mut mpsc::UnboundedReceiver<Event>) -> Result<()> {
        loop {
            let next = match self.state {
                State::Starting => self.start(),
                State::Running => self.wait_for_exit(events).await,
                State::AwaitingRestart => self.await_restart(events).await,
                State::ShuttingDown => {
                    self.shutdown();
                    Ok(State::Stopped)
                }
                State::Stopped => return Ok(()),
            };
            match next {
                Ok(state) => {
                    debug!("state {:?} -> {state:?}", self.state);
                    self.state = state;
                }
                Err(e) => {
                    self.pidfile.remove();
                    return Err(e);
                }
            }
        }
    }

    fn start(&mut self) -> Result<State> {
        // A termination that raced the restart delay wins.
        if self.ctx.is_terminating() {
            return Ok(State::ShuttingDown);
        }
        info!("starting: {}", self.spec.args().join(" "));
        let pid = self.launcher.launch(&self.spec)?;
        // Published before the next await so a reap always sees the new pid.
        self.ctx.set_child(pid);
        self.current = Some((pid, Instant::now()));
        self.launches += 1;
        info!("child {pid} started (launch #{})", self.launches);
        Ok(State::Running)
    }

    async fn wait_for_exit(
        &mut self,
        events: &mut mpsc::UnboundedReceiver<Event>,
    ) -> Result<State> {
        loop {
            match events.recv().await.ok_or(Error::EventsClosed)? {
                Event::ChildExited { pid, status } => {
                    if let Some(state) = self.on_child_exit(pid, status) {
                        return Ok(state);
                    }
                }
                Event::TerminationRequested => {
                    debug!("termination requested while child is running");
                }
            }
        }
    }

    /// Exit decision for a reaped child. `None` if `pid` is not the current child.
    fn on_child_exit(&mut self, pid: Pid, status: ExitStatus) -> Option<State> {
        match self.current {
            Some((current, started)) if current == pid => {
                self.current = None;
                self.last_uptime = started.elapsed();
            }
            _ => {
                debug!("ignoring exit of stale child {pid}");
                return None;
            }
        }

        if self.ctx.is_terminating() {
            info!("child {pid} terminated ({status}), exiting");
            Some(State::ShuttingDown)
        } else {
            info!(
                "child {pid} terminated ({status}, uptime {:.1}s), restarting",
                self.last_uptime.as_secs_f64()
            );
            Some(State::AwaitingRestart)
        }
    }

    async fn await_restart(
        &mut self,
        events: &mut mpsc::UnboundedReceiver<Event>,
    ) -> Result<State> {
        if self.ctx.is_terminating() {
            return Ok(State::ShuttingDown);
        }
        let delay = self.policy.next_delay(self.last_uptime);
        if delay.is_zero() {
            return Ok(State::Starting);
        }
        debug!("waiting {}ms before restart", delay.as_millis());

        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                () = &mut sleep => return Ok(State::Starting),
                event = events.recv() => match event.ok_or(Error::EventsClosed)? {
                    Event::TerminationRequested => {
                        info!("termination requested during restart delay, exiting");
                        return Ok(State::ShuttingDown);
                    }
                    Event::ChildExited { pid, .. } => {
                        warn!("unexpected exit of child {pid} while no child is running");
                    }
                },
            }
        }
    }

    fn shutdown(&mut self) {
        self.pidfile.remove();
        info!("supervisor stopped after {} launch(es)", self.launches);
    }
}
