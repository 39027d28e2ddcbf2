pub mod init;
pub mod probe;
pub mod run;

use std::time::Duration;

/// clap value parser for `500ms` / `10s` / `2m` style durations.
pub fn duration_arg(s: &str) -> Result<Duration, String> {
    slotguard_core::parse_duration(s).map_err(|e| e.to_string())
}
