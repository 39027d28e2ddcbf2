//! slotguard-core: configuration shared by every slotguard crate.
//!
//! The whole run is described by a single [`SlotguardConfig`]. Nothing below
//! the binary reads the environment or the filesystem on its own; components
//! receive the pieces of the config they need as plain values.

pub mod config;
pub mod error;

pub use config::{
    format_duration, join_probe_path, parse_duration, DecisionConfig, RecoveryConfig,
    SamplingConfig, SlotguardConfig, SwapConfig, TargetsConfig, MAX_RETRIES, MAX_SAMPLE_COUNT,
};
pub use error::{ConfigError, ConfigResult};
