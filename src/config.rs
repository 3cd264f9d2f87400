//! Command line and environment configuration.
//!
//! Each setting is resolved in order of precedence (highest wins):
//!
//! 1. **Command-line flag**
//! 2. **Environment variable** — `SUPERVISOR_PIDFILE`, `SUPERVISOR_DELAY_MS`,
//!    `SUPERVISOR_MAX_DELAY_MS`
//! 3. **Compiled default** — no PID file, no delay, no backoff
//!
//! ```text
//! supervisor [--pidfile <path>] [--delay <ms>] [--max-delay <ms>] \
//!            [--stable-after <secs>] -- <program> [args...]
//! ```

use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::error::{Error, Result};
use crate::supervisor::RespawnPolicy;

/// Keep a program running: restart it whenever it exits, stop on SIGINT/SIGTERM/SIGHUP.
#[derive(Parser, Debug)]
#[command(name = "supervisor", version)]
pub struct Cli {
    /// Write the supervisor's pid to this file while it runs.
    #[arg(long, value_name = "PATH")]
    pub pidfile: Option<PathBuf>,

    /// Milliseconds to wait before restarting an exited child (default 0).
    #[arg(long, value_name = "MILLISECONDS")]
    pub delay: Option<u64>,

    /// Enable exponential backoff on quick exits, capped at this many milliseconds.
    #[arg(long, value_name = "MILLISECONDS")]
    pub max_delay: Option<u64>,

    /// Seconds of child uptime after which the backoff resets (default 60).
    #[arg(long, value_name = "SECONDS", default_value_t = 60)]
    pub stable_after: u64,

    /// tracing filter used when `RUST_LOG` is unset.
    #[arg(long, value_name = "FILTER", default_value = "info")]
    pub log_level: String,

    /// Program to supervise and its arguments, after `--`.
    #[arg(last = true, required = true, value_name = "PROGRAM")]
    pub command: Vec<OsString>,
}

/// Validated settings for one supervisor run.
#[derive(Debug, Clone)]
pub struct Config {
    /// `command[0]` is the program token, the rest its arguments.
    pub command: Vec<OsString>,
    pub pidfile: Option<PathBuf>,
    pub delay: Duration,
    pub max_delay: Option<Duration>,
    pub stable_after: Duration,
    pub log_level: String,
}

impl Config {
    /// Merge CLI flags with environment fallbacks from the process environment.
    pub fn load(cli: Cli) -> Result<Self> {
        Self::load_with(cli, |key| std::env::var_os(key))
    }

    /// Like [`Config::load`] with an explicit environment lookup.
    pub fn load_with<F>(cli: Cli, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<OsString>,
    {
        if cli.command.is_empty() {
            return Err(Error::Config("no program given after `--`".into()));
        }

        let pidfile = cli
            .pidfile
            .or_else(|| env("SUPERVISOR_PIDFILE").map(PathBuf::from));

        let delay_ms = match cli.delay {
            Some(ms) => ms,
            None => env_millis(&env, "SUPERVISOR_DELAY_MS")?.unwrap_or(0),
        };
        let max_delay_ms = match cli.max_delay {
            Some(ms) => Some(ms),
            None => env_millis(&env, "SUPERVISOR_MAX_DELAY_MS")?,
        };

        Ok(Self {
            command: cli.command,
            pidfile,
            delay: Duration::from_millis(delay_ms),
            max_delay: max_delay_ms.map(Duration::from_millis),
            stable_after: Duration::from_secs(cli.stable_after),
            log_level: cli.log_level,
        })
    }

    /// The program token as typed by the user.
    pub fn program(&self) -> &OsString {
        &self.command[0]
    }

    pub fn respawn_policy(&self) -> RespawnPolicy {
        RespawnPolicy::new(self.delay, self.max_delay, self.stable_after)
    }
}

fn env_millis<F>(env: &F, key: &str) -> Result<Option<u64>>
where
    F: Fn(&str) -> Option<OsString>,
{
    let Some(raw) = env(key) else {
        return Ok(None);
    };
    let text = raw.to_string_lossy();
    text.trim()
        .parse()
        .map(Some)
        .map_err(|e| Error::Config(format!("{key}={text}: {e}")))
}
