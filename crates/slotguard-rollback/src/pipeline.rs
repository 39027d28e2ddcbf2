//! One canary run: sample → decide → swap → poll for recovery.

use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, warn};

use slotguard_core::SlotguardConfig;
use slotguard_probe::{LatencyEstimate, Prober, Sampler, SamplerConfig};

use crate::decision::{decide, DecisionOutcome, DecisionThresholds};
use crate::error::RunResult;
use crate::recovery::{poll_for_recovery, RecoveryPolicy, RecoverySession, RecoveryStatus};
use crate::swap::{SlotSwapper, SwapOrchestrator, SwapResult, SwapTarget};

/// Recovery outcome as reported at the end of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecoveryReport {
    pub status: RecoveryStatus,
    pub attempts: u32,
    pub elapsed_ms: u64,
    pub last_median_ms: Option<f64>,
}

impl From<&RecoverySession> for RecoveryReport {
    fn from(session: &RecoverySession) -> Self {
        Self {
            status: session.status(),
            attempts: session.attempts(),
            elapsed_ms: session.elapsed().as_millis() as u64,
            last_median_ms: session.last_estimate().and_then(|e| e.median_ms),
        }
    }
}

/// Everything a run measured and did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub production: LatencyEstimate,
    pub staging: LatencyEstimate,
    pub decision: DecisionOutcome,
    /// Present whenever a swap was recommended, including dry runs.
    pub swap: Option<SwapResult>,
    /// Present only when a swap was actually performed.
    pub recovery: Option<RecoveryReport>,
    /// Cancellation arrived before the swap, so slots were left alone.
    pub cancelled: bool,
}

impl RunSummary {
    pub fn swap_performed(&self) -> bool {
        self.swap.as_ref().is_some_and(|s| s.performed)
    }
}

/// Run the whole canary pipeline against the targets in `config`.
///
/// Only configuration and swap failures are returned as errors; probe
/// failures show up as absent estimates and a recovery timeout is a
/// reported status.
///
/// `cancel` is checked once before the swap and then at every recovery
/// tick. A run cancelled before the swap never touches the slots.
pub async fn run_pipeline<P: Prober, S: SlotSwapper>(
    config: &SlotguardConfig,
    prober: P,
    orchestrator: &SwapOrchestrator<S>,
    cancel: watch::Receiver<bool>,
) -> RunResult<RunSummary> {
    config.validate()?;

    let sampler = Sampler::new(prober, SamplerConfig::from(&config.sampling));
    let production_url = config.targets.production_probe_url();
    let staging_url = config.targets.staging_probe_url();

    let (production, staging) = if config.sampling.concurrent {
        tokio::join!(
            sampler.estimate("production", &production_url),
            sampler.estimate("staging", &staging_url),
        )
    } else {
        let production = sampler.estimate("production", &production_url).await;
        let staging = sampler.estimate("staging", &staging_url).await;
        (production, staging)
    };

    let decision = decide(
        &production,
        &staging,
        &DecisionThresholds::from(&config.decision),
        config.decision.force,
    );
    info!(
        decision = decision.label(),
        production_ms = production.median_ms,
        staging_ms = staging.median_ms,
        "{decision}"
    );

    let mut summary = RunSummary {
        production,
        staging,
        decision,
        swap: None,
        recovery: None,
        cancelled: false,
    };

    if !decision.swap_recommended() {
        if matches!(decision, DecisionOutcome::Inconclusive { .. }) {
            warn!("not enough data to decide; leaving slots as they are");
        }
        return Ok(summary);
    }

    let cancel_requested = *cancel.borrow();
    if cancel_requested {
        warn!(
            decision = decision.label(),
            "run cancelled before the slot swap; leaving slots as they are"
        );
        summary.cancelled = true;
        return Ok(summary);
    }

    let target = SwapTarget::from(&config.swap);
    let swap = orchestrator.swap(&target, config.swap.dry_run).await?;
    let performed = swap.performed;
    summary.swap = Some(swap);

    if performed {
        let session = poll_for_recovery(
            &sampler,
            &production_url,
            &RecoveryPolicy::from(&config.recovery),
            cancel,
        )
        .await;
        summary.recovery = Some(RecoveryReport::from(&session));
    }

    Ok(summary)
}
