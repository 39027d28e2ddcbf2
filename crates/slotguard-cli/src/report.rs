//! Human-readable run summaries.

use slotguard_probe::LatencyEstimate;
use slotguard_rollback::{RecoveryReport, RecoveryStatus, RunSummary};

pub fn format_estimate(estimate: &LatencyEstimate) -> String {
    match estimate.median_ms {
        Some(ms) => format!(
            "median {ms:>8.1} ms  ({}/{} successful)",
            estimate.successes, estimate.samples
        ),
        None => format!("no successful probes (0/{})", estimate.samples),
    }
}

fn format_recovery(report: &RecoveryReport) -> String {
    let secs = report.elapsed_ms as f64 / 1000.0;
    let last = report
        .last_median_ms
        .map(|ms| format!("last median {ms:.1} ms"))
        .unwrap_or_else(|| "no successful probes".to_string());
    match report.status {
        RecoveryStatus::Recovered => {
            format!("recovered after {} checks ({secs:.1}s, {last})", report.attempts)
        }
        RecoveryStatus::TimedOut => {
            format!("NOT recovered after {} checks ({secs:.1}s, {last})", report.attempts)
        }
        RecoveryStatus::Aborted => {
            format!("interrupted after {} checks ({secs:.1}s)", report.attempts)
        }
        RecoveryStatus::Polling => format!("still polling ({} checks)", report.attempts),
    }
}

pub fn format_summary(summary: &RunSummary) -> String {
    let mut out = String::new();

    out.push_str("slotguard run\n");
    out.push_str(&format!("  production  {}\n", format_estimate(&summary.production)));
    out.push_str(&format!("  staging     {}\n", format_estimate(&summary.staging)));
    out.push_str(&format!("  decision    {}\n", summary.decision));

    match &summary.swap {
        Some(swap) if swap.performed => {
            out.push_str(&format!("  swap        {} (at {})\n", swap.description, swap.timestamp));
        }
        Some(swap) => out.push_str(&format!("  swap        {}\n", swap.description)),
        None if summary.cancelled => out.push_str("  swap        skipped (run cancelled)\n"),
        None => out.push_str("  swap        not attempted\n"),
    }

    if let Some(recovery) = &summary.recovery {
        out.push_str(&format!("  recovery    {}\n", format_recovery(recovery)));
    }

    out
}
