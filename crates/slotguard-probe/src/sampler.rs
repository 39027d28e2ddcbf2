//! Sampler: repeated probes against one target, reduced to a median.
//!
//! A sample cycle sends one discarded warm-up probe, then fills `count`
//! slots sequentially. A slot whose probe does not succeed is re-probed up
//! to `retries` more times; the slot keeps its last result. Every network
//! attempt after the first is preceded by the inter-attempt delay.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use slotguard_core::SamplingConfig;

use crate::prober::{ProbeResult, Prober};

/// Per-cycle sampling parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerConfig {
    pub count: u32,
    pub timeout: Duration,
    pub delay: Duration,
    pub retries: u32,
    pub warmup: bool,
    pub slow_threshold_ms: f64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self::from(&SamplingConfig::default())
    }
}

impl From<&SamplingConfig> for SamplerConfig {
    fn from(cfg: &SamplingConfig) -> Self {
        Self {
            count: cfg.count,
            timeout: cfg.timeout,
            delay: cfg.delay,
            retries: cfg.retries,
            warmup: cfg.warmup,
            slow_threshold_ms: cfg.slow_threshold_ms,
        }
    }
}

/// Probe results for one target, one entry per sample slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleSet {
    role: String,
    results: Vec<ProbeResult>,
}

impl SampleSet {
    pub fn new(role: impl Into<String>, results: Vec<ProbeResult>) -> Self {
        Self {
            role: role.into(),
            results,
        }
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn results(&self) -> &[ProbeResult] {
        &self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn success_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }
}

/// Robust latency estimate for one target.
///
/// `median_ms` is `None` when no probe in the set succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatencyEstimate {
    pub median_ms: Option<f64>,
    pub successes: usize,
    pub samples: usize,
}

impl LatencyEstimate {
    /// An estimate for a median computed elsewhere from `successes` out of
    /// `samples` probes.
    pub fn from_median(median_ms: f64, successes: usize, samples: usize) -> Self {
        Self {
            median_ms: Some(median_ms),
            successes,
            samples,
        }
    }

    /// An estimate for a target that never answered successfully.
    pub fn absent(samples: usize) -> Self {
        Self {
            median_ms: None,
            successes: 0,
            samples,
        }
    }

    pub fn is_present(&self) -> bool {
        self.median_ms.is_some()
    }
}

/// Reduce a sample set to the median of its successful latencies.
///
/// HTTP and transport errors are ignored; they only matter when nothing
/// succeeded, in which case the estimate is absent.
pub fn reduce(set: &SampleSet) -> LatencyEstimate {
    let mut latencies: Vec<f64> = set
        .results()
        .iter()
        .filter_map(ProbeResult::success_latency)
        .map(duration_ms)
        .collect();

    LatencyEstimate {
        successes: latencies.len(),
        samples: set.len(),
        median_ms: median(&mut latencies),
    }
}

/// Median of `values`; the mean of the two middle values for even lengths.
pub fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

pub fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Runs sample cycles with a [`Prober`].
pub struct Sampler<P> {
    prober: P,
    config: SamplerConfig,
}

impl<P: Prober> Sampler<P> {
    pub fn new(prober: P, config: SamplerConfig) -> Self {
        Self { prober, config }
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    pub fn prober(&self) -> &P {
        &self.prober
    }

    /// Run one sample cycle against `url`. `role` (production, staging) labels log lines.
    pub async fn sample(&self, role: &str, url: &str) -> SampleSet {
        let cfg = &self.config;
        let mut results = Vec::new();
        let mut attempts_made = 0u32;

        if cfg.warmup {
            let warmup = self.prober.probe(url, cfg.timeout).await;
            attempts_made += 1;
            debug!(
                role,
                outcome = warmup.kind(),
                latency_ms = warmup.latency().map(duration_ms),
                "warm-up probe discarded"
            );
        }

        for slot in 1..=cfg.count {
            let mut retry = 0u32;
            loop {
                if attempts_made > 0 && !cfg.delay.is_zero() {
                    tokio::time::sleep(cfg.delay).await;
                }
                let result = self.prober.probe(url, cfg.timeout).await;
                attempts_made += 1;
                self.log_probe(role, slot, retry, &result);

                if result.is_success() || retry >= cfg.retries {
                    results.push(result);
                    break;
                }
                retry += 1;
            }
        }

        SampleSet::new(role, results)
    }

    /// Sample `url` and reduce the set in one step.
    pub async fn estimate(&self, role: &str, url: &str) -> LatencyEstimate {
        let set = self.sample(role, url).await;
        let estimate = reduce(&set);
        info!(
            role,
            samples = estimate.samples,
            successes = estimate.successes,
            median_ms = estimate.median_ms,
            "sample cycle complete"
        );
        estimate
    }

    fn log_probe(&self, role: &str, attempt: u32, retry: u32, result: &ProbeResult) {
        match result {
            ProbeResult::Success { latency, status } => {
                let latency_ms = duration_ms(*latency);
                if latency_ms > self.config.slow_threshold_ms {
                    warn!(role, attempt, retry, outcome = "slow", latency_ms, status, "probe");
                } else {
                    info!(role, attempt, retry, outcome = "success", latency_ms, status, "probe");
                }
            }
            ProbeResult::HttpError {
                latency,
                status,
                body_snippet,
            } => {
                warn!(
                    role,
                    attempt,
                    retry,
                    outcome = "http_error",
                    latency_ms = duration_ms(*latency),
                    status,
                    body = %body_snippet,
                    "probe"
                );
            }
            ProbeResult::TransportError { error } => {
                warn!(role, attempt, retry, outcome = "transport_error", %error, "probe");
            }
        }
    }
}
