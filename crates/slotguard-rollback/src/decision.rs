//! Swap decision: compares production against the staging baseline.
//!
//! Rules, first match wins:
//!
//! 1. force override → swap
//! 2. either estimate absent → inconclusive
//! 3. `prod - staging > absolute_delta_ms` → swap
//! 4. `staging > 0 && prod / staging >= relative_ratio` → swap
//! 5. otherwise → no action
//!
//! The absolute rule catches a badly slow production when the baseline is
//! already elevated; the ratio rule catches a proportionally slow production
//! when both are fast. The ratio is skipped when staging is zero.

use std::fmt;

use serde::{Deserialize, Serialize};

use slotguard_core::DecisionConfig;
use slotguard_probe::LatencyEstimate;

/// The two thresholds the heuristic compares against.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecisionThresholds {
    pub absolute_delta_ms: f64,
    pub relative_ratio: f64,
}

impl Default for DecisionThresholds {
    fn default() -> Self {
        Self::from(&DecisionConfig::default())
    }
}

impl From<&DecisionConfig> for DecisionThresholds {
    fn from(cfg: &DecisionConfig) -> Self {
        Self {
            absolute_delta_ms: cfg.absolute_delta_ms,
            relative_ratio: cfg.relative_ratio,
        }
    }
}

/// Which rule recommended the swap.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum SwapReason {
    ForceOverride,
    AbsoluteDelta { delta_ms: f64 },
    RelativeRatio { ratio: f64 },
}

/// Which estimate was missing for an inconclusive decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingEstimate {
    Production,
    Staging,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DecisionOutcome {
    SwapRecommended { reason: SwapReason },
    NoActionNeeded,
    Inconclusive { missing: MissingEstimate },
}

impl DecisionOutcome {
    pub fn swap_recommended(&self) -> bool {
        matches!(self, Self::SwapRecommended { .. })
    }

    /// Short label used in log lines and summaries.
    pub fn label(&self) -> &'static str {
        match self {
            Self::SwapRecommended { .. } => "swap_recommended",
            Self::NoActionNeeded => "no_action_needed",
            Self::Inconclusive { .. } => "inconclusive",
        }
    }
}

impl fmt::Display for DecisionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SwapRecommended { reason } => match reason {
                SwapReason::ForceOverride => write!(f, "swap recommended (forced)"),
                SwapReason::AbsoluteDelta { delta_ms } => {
                    write!(f, "swap recommended (production slower by {delta_ms:.1}ms)")
                }
                SwapReason::RelativeRatio { ratio } => {
                    write!(f, "swap recommended (production {ratio:.2}x staging)")
                }
            },
            Self::NoActionNeeded => write!(f, "no action needed"),
            Self::Inconclusive { missing } => {
                let which = match missing {
                    MissingEstimate::Production => "production",
                    MissingEstimate::Staging => "staging",
                    MissingEstimate::Both => "production and staging",
                };
                write!(f, "inconclusive (no successful probes for {which})")
            }
        }
    }
}

/// Decide whether production should be swapped out.
pub fn decide(
    production: &LatencyEstimate,
    staging: &LatencyEstimate,
    thresholds: &DecisionThresholds,
    force: bool,
) -> DecisionOutcome {
    if force {
        return DecisionOutcome::SwapRecommended {
            reason: SwapReason::ForceOverride,
        };
    }

    let (prod, base) = match (production.median_ms, staging.median_ms) {
        (Some(prod), Some(base)) => (prod, base),
        (None, Some(_)) => {
            return DecisionOutcome::Inconclusive {
                missing: MissingEstimate::Production,
            };
        }
        (Some(_), None) => {
            return DecisionOutcome::Inconclusive {
                missing: MissingEstimate::Staging,
            };
        }
        (None, None) => {
            return DecisionOutcome::Inconclusive {
                missing: MissingEstimate::Both,
            };
        }
    };

    let delta_ms = prod - base;
    if delta_ms > thresholds.absolute_delta_ms {
        return DecisionOutcome::SwapRecommended {
            reason: SwapReason::AbsoluteDelta { delta_ms },
        };
    }

    if base > 0.0 {
        let ratio = prod / base;
        if ratio >= thresholds.relative_ratio {
            return DecisionOutcome::SwapRecommended {
                reason: SwapReason::RelativeRatio { ratio },
            };
        }
    }

    DecisionOutcome::NoActionNeeded
}

#[cfg(test)]
mod tests {
    use super::*;

    fn est(ms: f64) -> LatencyEstimate {
        LatencyEstimate::from_median(ms, 5, 5)
    }

    fn defaults() -> DecisionThresholds {
        DecisionThresholds {
            absolute_delta_ms: 500.0,
            relative_ratio: 1.3,
        }
    }

    #[test]
    fn absolute_rule_fires() {
        let outcome = decide(&est(2000.0), &est(100.0), &defaults(), false);
        assert_eq!(
            outcome,
            DecisionOutcome::SwapRecommended {
                reason: SwapReason::AbsoluteDelta { delta_ms: 1900.0 }
            }
        );
    }

    #[test]
    fn small_regression_needs_no_action() {
        let outcome = decide(&est(120.0), &est(100.0), &defaults(), false);
        assert_eq!(outcome, DecisionOutcome::NoActionNeeded);
    }

    #[test]
    fn ratio_rule_fires() {
        let outcome = decide(&est(140.0), &est(100.0), &defaults(), false);
        match outcome {
            DecisionOutcome::SwapRecommended {
                reason: SwapReason::RelativeRatio { ratio },
            } => assert!((ratio - 1.4).abs() < 1e-9),
            other => panic!("expected ratio swap, got {other:?}"),
        }
    }

    #[test]
    fn ratio_rule_is_inclusive() {
        let outcome = decide(&est(130.0), &est(100.0), &defaults(), false);
        assert!(outcome.swap_recommended());
    }

    #[test]
    fn absolute_rule_is_exclusive() {
        // delta == threshold does not fire; ratio 1.25 stays under 1.3.
        let outcome = decide(&est(2500.0), &est(2000.0), &defaults(), false);
        assert_eq!(outcome, DecisionOutcome::NoActionNeeded);
    }

    #[test]
    fn zero_staging_skips_ratio() {
        let outcome = decide(&est(50.0), &est(0.0), &defaults(), false);
        assert_eq!(outcome, DecisionOutcome::NoActionNeeded);

        let outcome = decide(&est(600.0), &est(0.0), &defaults(), false);
        assert!(matches!(
            outcome,
            DecisionOutcome::SwapRecommended {
                reason: SwapReason::AbsoluteDelta { .. }
            }
        ));
    }

    #[test]
    fn faster_production_needs_no_action() {
        let outcome = decide(&est(80.0), &est(400.0), &defaults(), false);
        assert_eq!(outcome, DecisionOutcome::NoActionNeeded);
    }

    #[test]
    fn missing_estimates_are_inconclusive() {
        let absent = LatencyEstimate::absent(5);

        assert_eq!(
            decide(&absent, &est(100.0), &defaults(), false),
            DecisionOutcome::Inconclusive {
                missing: MissingEstimate::Production
            }
        );
        assert_eq!(
            decide(&est(100.0), &absent, &defaults(), false),
            DecisionOutcome::Inconclusive {
                missing: MissingEstimate::Staging
            }
        );
        assert_eq!(
            decide(&absent, &absent, &defaults(), false),
            DecisionOutcome::Inconclusive {
                missing: MissingEstimate::Both
            }
        );
    }

    #[test]
    fn missing_estimate_never_swaps_or_passes() {
        let absent = LatencyEstimate::absent(3);
        for present in [0.0, 1.0, 100.0, 10_000.0] {
            for (prod, staging) in [(absent, est(present)), (est(present), absent)] {
                let outcome = decide(&prod, &staging, &defaults(), false);
                assert!(matches!(outcome, DecisionOutcome::Inconclusive { .. }));
            }
        }
    }

    #[test]
    fn force_override_wins() {
        let absent = LatencyEstimate::absent(3);
        let forced = DecisionOutcome::SwapRecommended {
            reason: SwapReason::ForceOverride,
        };
        assert_eq!(decide(&absent, &absent, &defaults(), true), forced);
        assert_eq!(decide(&est(10.0), &est(100.0), &defaults(), true), forced);
    }

    #[test]
    fn thresholds_follow_config() {
        let cfg = DecisionConfig {
            absolute_delta_ms: 50.0,
            relative_ratio: 2.0,
            force: false,
        };
        let thresholds = DecisionThresholds::from(&cfg);
        // delta 60 > 50 fires even though the ratio (1.6) does not.
        assert!(decide(&est(160.0), &est(100.0), &thresholds, false).swap_recommended());
        assert_eq!(thresholds, DecisionThresholds::from(&cfg));
    }

    #[test]
    fn display_and_serialization() {
        let outcome = decide(&est(2000.0), &est(100.0), &defaults(), false);
        assert_eq!(
            outcome.to_string(),
            "swap recommended (production slower by 1900.0ms)"
        );
        assert_eq!(outcome.label(), "swap_recommended");

        let json = serde_json::to_value(outcome).unwrap();
        assert_eq!(json["outcome"], "swap_recommended");
        assert_eq!(json["reason"]["rule"], "absolute_delta");

        let json = serde_json::to_value(DecisionOutcome::Inconclusive {
            missing: MissingEstimate::Staging,
        })
        .unwrap();
        assert_eq!(json["outcome"], "inconclusive");
        assert_eq!(json["missing"], "staging");
    }
}
