//! slotguard-probe: canary probes and latency estimates.
//!
//! # Architecture
//!
//! ```text
//! Sampler
//!   ├── warm-up probe (discarded)
//!   ├── count × Prober::probe() → ProbeResult   (retry on failure)
//!   └── reduce(SampleSet) → LatencyEstimate     (median of successes)
//! ```
//!
//! [`HttpProber`] issues one GET per call over a fresh TCP or TLS
//! connection and never returns an error: DNS, connect, TLS, and timeout
//! failures all become [`ProbeResult::TransportError`]. Non-2xx answers keep
//! their latency and a short body snippet.
//!
//! The median is used rather than the mean so that a single slow probe
//! cannot decide a slot swap on its own.

pub mod prober;
pub mod sampler;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod tls;

pub use prober::{HttpProber, ProbeFuture, ProbeResult, Prober, SNIPPET_LIMIT, truncate_snippet};
pub use sampler::{
    LatencyEstimate, SampleSet, Sampler, SamplerConfig, duration_ms, median, reduce,
};
pub use tls::TlsConfig;
