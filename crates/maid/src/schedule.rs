use std::fmt;
use std::future::Future;
use std::time::Duration;

use chrono::{Local, NaiveDateTime, NaiveTime, TimeDelta};
use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ConfigError;

static RUN_TIME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([01]\d|2[0-3]):[0-5]\d(:[0-5]\d)?$").expect("valid run time pattern"));

/// Wall-clock time of day at which the daily audit runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunTime(NaiveTime);

impl RunTime {
    /// Parse `HH:MM` or `HH:MM:SS` in 24-hour notation.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let s = s.trim();
        if !RUN_TIME_PATTERN.is_match(s) {
            return Err(ConfigError::InvalidRunTime(s.to_string()));
        }
        let format = if s.len() == 5 { "%H:%M" } else { "%H:%M:%S" };
        NaiveTime::parse_from_str(s, format)
            .map(RunTime)
            .map_err(|_| ConfigError::InvalidRunTime(s.to_string()))
    }

    pub fn time(&self) -> NaiveTime {
        self.0
    }
}

impl fmt::Display for RunTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%H:%M:%S"))
    }
}

/// The first occurrence of `at` strictly after `now`.
pub fn next_run_after(now: NaiveDateTime, at: NaiveTime) -> NaiveDateTime {
    let today = now.date().and_time(at);
    if today > now {
        today
    } else {
        today + TimeDelta::days(1)
    }
}

/// Drive `pass` to completion unless `shutdown` resolves first.
///
/// Returns `None` when the pass was abandoned. The pass future is dropped at
/// its current await point, so an in-flight request is simply cancelled.
pub async fn until_shutdown<P, S>(shutdown: S, pass: P) -> Option<P::Output>
where
    P: Future,
    S: Future<Output = ()>,
{
    tokio::select! {
        biased;
        _ = shutdown => {
            info!("Shutdown requested, abandoning the current run");
            None
        }
        out = pass => Some(out),
    }
}

/// Run `job` every day at `at` until `shutdown` resolves.
///
/// The idle loop wakes every `poll` to see whether the next run is due. Runs
/// never overlap: the next check only happens after `job` has returned.
/// `shutdown` is observed both while idle and while a run is in progress.
pub async fn run_daily<F, Fut, S>(at: RunTime, poll: Duration, shutdown: S, mut job: F)
where
    F: FnMut() -> Fut,
    Fut: Future,
    S: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    let mut next = next_run_after(Local::now().naive_local(), at.time());
    info!("Next run scheduled for {}", next);

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                info!("Shutdown requested, exiting scheduler");
                return;
            }
            _ = tokio::time::sleep(poll) => {}
        }

        let now = Local::now().naive_local();
        if now < next {
            continue;
        }

        debug!("Run due (scheduled {}, now {})", next, now);
        if until_shutdown(&mut shutdown, job()).await.is_none() {
            return;
        }
        next = next_run_after(Local::now().naive_local(), at.time());
        info!("Next run scheduled for {}", next);
    }
}

/// Listener for termination signals, installed once at start-up.
pub struct Shutdown {
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
}

impl Shutdown {
    /// Register signal handlers. From now on SIGTERM and SIGINT no longer
    /// kill the process; callers must keep [`Shutdown::recv`] in play, both
    /// while idle and while a run is in progress.
    #[cfg(unix)]
    pub fn install() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};
        Ok(Self {
            terminate: signal(SignalKind::terminate())?,
            interrupt: signal(SignalKind::interrupt())?,
        })
    }

    #[cfg(not(unix))]
    pub fn install() -> std::io::Result<Self> {
        Ok(Self {})
    }

    /// Resolves when SIGTERM or SIGINT arrives.
    #[cfg(unix)]
    pub async fn recv(&mut self) {
        tokio::select! {
            _ = self.terminate.recv() => info!("Received SIGTERM"),
            _ = self.interrupt.recv() => info!("Received SIGINT"),
        }
    }

    #[cfg(not(unix))]
    pub async fn recv(&mut self) {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl-C");
        }
    }
}
