//! Recovery poller: samples production after a swap until it is healthy.
//!
//! ```text
//! Polling ──estimate < threshold──▶ Recovered
//!    │ ───max_attempts reached────▶ TimedOut
//!    └───cancelled at a tick───────▶ Aborted
//! ```
//!
//! The first tick runs immediately; each later tick waits `poll_interval`.
//! Cancellation is honoured between ticks, never in the middle of a sample
//! cycle. An absent estimate (every probe failed) keeps the session polling.

use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use slotguard_core::RecoveryConfig;
use slotguard_probe::{LatencyEstimate, Prober, Sampler};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryStatus {
    Polling,
    Recovered,
    TimedOut,
    Aborted,
}

impl RecoveryStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Polling)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Polling => "polling",
            Self::Recovered => "recovered",
            Self::TimedOut => "timed_out",
            Self::Aborted => "aborted",
        }
    }
}

/// Budget and threshold for one polling run.
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryPolicy {
    pub healthy_threshold_ms: f64,
    pub poll_interval: Duration,
    pub max_attempts: u32,
}

impl From<&RecoveryConfig> for RecoveryPolicy {
    fn from(cfg: &RecoveryConfig) -> Self {
        Self {
            healthy_threshold_ms: cfg.healthy_threshold_ms,
            poll_interval: cfg.poll_interval,
            max_attempts: cfg.max_attempts,
        }
    }
}

/// State of one polling run.
#[derive(Debug, Clone)]
pub struct RecoverySession {
    status: RecoveryStatus,
    attempts: u32,
    started_at: Instant,
    finished_at: Option<Instant>,
    last_estimate: Option<LatencyEstimate>,
}

impl RecoverySession {
    pub fn start() -> Self {
        Self {
            status: RecoveryStatus::Polling,
            attempts: 0,
            started_at: Instant::now(),
            finished_at: None,
            last_estimate: None,
        }
    }

    pub fn status(&self) -> RecoveryStatus {
        self.status
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn last_estimate(&self) -> Option<&LatencyEstimate> {
        self.last_estimate.as_ref()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Time spent polling; frozen once the session is terminal.
    pub fn elapsed(&self) -> Duration {
        self.finished_at
            .unwrap_or_else(Instant::now)
            .duration_since(self.started_at)
    }

    /// Record one tick's estimate. Ignored once terminal.
    pub fn record(&mut self, estimate: LatencyEstimate) {
        if self.is_terminal() {
            return;
        }
        self.attempts += 1;
        self.last_estimate = Some(estimate);
    }

    /// Move to a terminal status.
    ///
    /// Returns `false` without changing anything if the session already
    /// finished or `status` is `Polling`.
    pub fn finish(&mut self, status: RecoveryStatus) -> bool {
        if self.is_terminal() || !status.is_terminal() {
            return false;
        }
        self.status = status;
        self.finished_at = Some(Instant::now());
        true
    }
}

/// Poll `url` until it is healthy, the attempt budget runs out, or `cancel`
/// flips to `true`.
pub async fn poll_for_recovery<P: Prober>(
    sampler: &Sampler<P>,
    url: &str,
    policy: &RecoveryPolicy,
    mut cancel: watch::Receiver<bool>,
) -> RecoverySession {
    let mut session = RecoverySession::start();
    info!(
        %url,
        threshold_ms = policy.healthy_threshold_ms,
        max_attempts = policy.max_attempts,
        interval_ms = policy.poll_interval.as_millis() as u64,
        "recovery polling started"
    );

    loop {
        if session.attempts() > 0 {
            tokio::select! {
                _ = tokio::time::sleep(policy.poll_interval) => {}
                _ = cancelled(&mut cancel) => {}
            }
        }

        let cancel_requested = *cancel.borrow();
        if cancel_requested {
            session.finish(RecoveryStatus::Aborted);
            warn!(attempts = session.attempts(), "recovery polling cancelled");
            break;
        }

        let estimate = sampler.estimate("production", url).await;
        session.record(estimate);
        let attempt = session.attempts();

        match estimate.median_ms {
            Some(median_ms) if median_ms < policy.healthy_threshold_ms => {
                session.finish(RecoveryStatus::Recovered);
                info!(
                    attempt,
                    median_ms,
                    elapsed_ms = session.elapsed().as_millis() as u64,
                    "production recovered"
                );
                break;
            }
            Some(median_ms) => {
                debug!(
                    attempt,
                    median_ms,
                    threshold_ms = policy.healthy_threshold_ms,
                    "production still above threshold"
                );
            }
            None => {
                warn!(attempt, "no successful probes this tick, still polling");
            }
        }

        if attempt >= policy.max_attempts {
            session.finish(RecoveryStatus::TimedOut);
            warn!(
                attempts = attempt,
                elapsed_ms = session.elapsed().as_millis() as u64,
                "production did not recover within the attempt budget"
            );
            break;
        }
    }

    session
}

/// Resolves once the cancel flag is set. Never resolves if the sender is
/// dropped without cancelling.
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    let closed = rx.wait_for(|c| *c).await.is_err();
    if closed {
        std::future::pending::<()>().await;
    }
}
