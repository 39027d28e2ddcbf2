//! slotguard.toml configuration parser.
//!
//! A run is driven by one [`SlotguardConfig`], built once (defaults, then an
//! optional TOML file, then command-line overrides), validated once, and then
//! passed by reference to every component.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Largest accepted `sampling.count`.
pub const MAX_SAMPLE_COUNT: u32 = 100;
/// Largest accepted `sampling.retries`.
pub const MAX_RETRIES: u32 = 10;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlotguardConfig {
    pub targets: TargetsConfig,
    pub sampling: SamplingConfig,
    pub decision: DecisionConfig,
    pub recovery: RecoveryConfig,
    pub swap: SwapConfig,
}

/// The two deployment targets being compared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetsConfig {
    /// Base URL of the production slot.
    pub production_url: String,
    /// Base URL of the staging (baseline) slot.
    pub staging_url: String,
    /// Path appended to both base URLs when probing.
    pub probe_path: String,
}

impl Default for TargetsConfig {
    fn default() -> Self {
        Self {
            production_url: String::new(),
            staging_url: String::new(),
            probe_path: "/".to_string(),
        }
    }
}

impl TargetsConfig {
    pub fn production_probe_url(&self) -> String {
        join_probe_path(&self.production_url, &self.probe_path)
    }

    pub fn staging_probe_url(&self) -> String {
        join_probe_path(&self.staging_url, &self.probe_path)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Measured probes per sample set.
    pub count: u32,
    /// Timeout for a single probe attempt.
    #[serde(with = "duration_str")]
    pub timeout: Duration,
    /// Pause between consecutive attempts.
    #[serde(with = "duration_str")]
    pub delay: Duration,
    /// Extra attempts per sample slot when a probe does not succeed.
    pub retries: u32,
    /// Send one discarded probe before measuring.
    pub warmup: bool,
    /// Successful probes slower than this are logged as slow.
    pub slow_threshold_ms: f64,
    /// Sample production and staging at the same time.
    pub concurrent: bool,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            count: 5,
            timeout: Duration::from_secs(10),
            delay: Duration::from_millis(500),
            retries: 1,
            warmup: true,
            slow_threshold_ms: 1000.0,
            concurrent: false,
        }
    }
}

impl SamplingConfig {
    /// Check the sampling section on its own.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.count == 0 || self.count > MAX_SAMPLE_COUNT {
            return Err(invalid(
                "sampling.count",
                format!("must be between 1 and {MAX_SAMPLE_COUNT}, got {}", self.count),
            ));
        }
        if self.retries > MAX_RETRIES {
            return Err(invalid(
                "sampling.retries",
                format!("must be at most {MAX_RETRIES}, got {}", self.retries),
            ));
        }
        if self.timeout.is_zero() {
            return Err(invalid("sampling.timeout", "must be greater than zero"));
        }
        non_negative("sampling.slow_threshold_ms", self.slow_threshold_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionConfig {
    /// Swap when production exceeds staging by more than this many ms.
    pub absolute_delta_ms: f64,
    /// Swap when production / staging reaches this ratio.
    pub relative_ratio: f64,
    /// Recommend a swap without looking at the estimates.
    pub force: bool,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            absolute_delta_ms: 500.0,
            relative_ratio: 1.3,
            force: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Production is recovered once its median drops below this.
    pub healthy_threshold_ms: f64,
    #[serde(with = "duration_str")]
    pub poll_interval: Duration,
    pub max_attempts: u32,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            healthy_threshold_ms: 1000.0,
            poll_interval: Duration::from_secs(15),
            max_attempts: 20,
        }
    }
}

/// The external slot-swap operation.
///
/// `command` is an argv template; `{resource_group}`, `{app}`,
/// `{source_slot}` and `{target_slot}` are substituted before it runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwapConfig {
    pub dry_run: bool,
    pub resource_group: String,
    pub app_name: String,
    pub source_slot: String,
    pub target_slot: String,
    pub command: Vec<String>,
}

impl Default for SwapConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            resource_group: String::new(),
            app_name: String::new(),
            source_slot: "staging".to_string(),
            target_slot: "production".to_string(),
            command: Vec::new(),
        }
    }
}

impl SlotguardConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Scaffold a starter config for an App Service style slot pair.
    ///
    /// The scaffold is dry-run so that it can be tried before any real
    /// infrastructure is touched.
    pub fn scaffold(app_name: &str, resource_group: &str) -> Self {
        Self {
            targets: TargetsConfig {
                production_url: format!("https://{app_name}.azurewebsites.net"),
                staging_url: format!("https://{app_name}-staging.azurewebsites.net"),
                probe_path: "/health".to_string(),
            },
            swap: SwapConfig {
                dry_run: true,
                resource_group: resource_group.to_string(),
                app_name: app_name.to_string(),
                command: [
                    "az",
                    "webapp",
                    "deployment",
                    "slot",
                    "swap",
                    "--resource-group",
                    "{resource_group}",
                    "--name",
                    "{app}",
                    "--slot",
                    "{source_slot}",
                    "--target-slot",
                    "{target_slot}",
                ]
                .into_iter()
                .map(String::from)
                .collect(),
                ..SwapConfig::default()
            },
            ..Self::default()
        }
    }

    /// Check every value a run depends on.
    ///
    /// Called once after all layers have been merged.
    pub fn validate(&self) -> ConfigResult<()> {
        validate_base_url("targets.production_url", &self.targets.production_url)?;
        validate_base_url("targets.staging_url", &self.targets.staging_url)?;

        self.sampling.validate()?;

        let decision = &self.decision;
        non_negative("decision.absolute_delta_ms", decision.absolute_delta_ms)?;
        if !decision.relative_ratio.is_finite() || decision.relative_ratio <= 0.0 {
            return Err(invalid(
                "decision.relative_ratio",
                format!("must be a positive number, got {}", decision.relative_ratio),
            ));
        }

        let recovery = &self.recovery;
        if !recovery.healthy_threshold_ms.is_finite() || recovery.healthy_threshold_ms <= 0.0 {
            return Err(invalid(
                "recovery.healthy_threshold_ms",
                format!("must be a positive number, got {}", recovery.healthy_threshold_ms),
            ));
        }
        if recovery.max_attempts == 0 {
            return Err(invalid("recovery.max_attempts", "must be at least 1"));
        }

        if !self.swap.dry_run && self.swap.command.is_empty() {
            return Err(invalid(
                "swap.command",
                "a swap command is required unless dry_run is set",
            ));
        }

        Ok(())
    }
}

/// Join a base URL and a probe path with exactly one slash between them.
pub fn join_probe_path(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        format!("{base}/")
    } else {
        format!("{base}/{path}")
    }
}

fn validate_base_url(field: &'static str, url: &str) -> ConfigResult<()> {
    let rest = url
        .strip_prefix("http://")
        .or_else(|| url.strip_prefix("https://"));
    match rest {
        None if url.is_empty() => Err(invalid(field, "is required")),
        None => Err(invalid(field, format!("must be an http(s) URL, got {url:?}"))),
        Some(rest) if rest.is_empty() || rest.starts_with('/') => {
            Err(invalid(field, format!("has no host: {url:?}")))
        }
        Some(_) => Ok(()),
    }
}

fn non_negative(field: &'static str, value: f64) -> ConfigResult<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(invalid(field, format!("must be zero or positive, got {value}")))
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

/// Parse a duration string like "5s", "500ms", "2m".
///
/// A bare number is read as seconds.
pub fn parse_duration(s: &str) -> ConfigResult<Duration> {
    let s = s.trim();
    let parsed = if let Some(secs) = s.strip_suffix('s') {
        if let Some(ms) = secs.strip_suffix('m') {
            ms.trim().parse::<u64>().ok().map(Duration::from_millis)
        } else {
            secs.trim().parse::<u64>().ok().map(Duration::from_secs)
        }
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.trim()
            .parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    };
    parsed.ok_or_else(|| ConfigError::InvalidDuration(s.to_string()))
}

/// Render a duration in the shortest unit `parse_duration` reads back.
pub fn format_duration(d: Duration) -> String {
    if d.subsec_nanos() != 0 || d.is_zero() {
        format!("{}ms", d.as_millis())
    } else if d.as_secs() % 60 == 0 {
        format!("{}m", d.as_secs() / 60)
    } else {
        format!("{}s", d.as_secs())
    }
}

mod duration_str {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_duration(*d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}
