//! Swap orchestrator: drives the external slot-swap operation.
//!
//! The orchestrator calls the swap backend at most once per invocation and
//! never retries. Callers serialize swaps; there is no internal locking or
//! deduplication. In dry-run mode neither the backend nor the hooks run.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tracing::{error, info, warn};

use slotguard_core::SwapConfig;
use slotguard_probe::truncate_snippet;

use crate::error::SwapError;

/// The slot pair a swap exchanges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwapTarget {
    pub resource_group: String,
    pub app: String,
    pub source_slot: String,
    pub target_slot: String,
}

impl SwapTarget {
    pub fn describe(&self) -> String {
        let mut text = format!(
            "swap slot {} into {} for app {}",
            self.source_slot,
            self.target_slot,
            if self.app.is_empty() { "<unnamed>" } else { self.app.as_str() }
        );
        if !self.resource_group.is_empty() {
            text.push_str(&format!(" (resource group {})", self.resource_group));
        }
        text
    }
}

impl From<&SwapConfig> for SwapTarget {
    fn from(cfg: &SwapConfig) -> Self {
        Self {
            resource_group: cfg.resource_group.clone(),
            app: cfg.app_name.clone(),
            source_slot: cfg.source_slot.clone(),
            target_slot: cfg.target_slot.clone(),
        }
    }
}

/// What a swap invocation did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwapResult {
    /// Whether the external operation actually ran.
    pub performed: bool,
    /// Completion time, seconds since the Unix epoch.
    pub timestamp: u64,
    pub description: String,
}

/// Boxed future returned by [`SlotSwapper::swap`].
pub type SwapFuture<'a> = Pin<Box<dyn Future<Output = Result<(), SwapError>> + Send + 'a>>;

/// The external slot-swap operation.
pub trait SlotSwapper: Send + Sync {
    fn swap<'a>(&'a self, target: &'a SwapTarget) -> SwapFuture<'a>;
}

/// Future returned by a verification hook.
pub type HookFuture = Pin<Box<dyn Future<Output = Result<(), String>> + Send>>;

/// Verification hook run before or after a real swap.
pub type SwapHook = Arc<dyn Fn(SwapTarget) -> HookFuture + Send + Sync>;

pub struct SwapOrchestrator<S> {
    swapper: S,
    pre_check: Option<SwapHook>,
    post_check: Option<SwapHook>,
}

impl<S: SlotSwapper> SwapOrchestrator<S> {
    pub fn new(swapper: S) -> Self {
        Self {
            swapper,
            pre_check: None,
            post_check: None,
        }
    }

    /// Run `hook` before the swap; an error aborts without swapping.
    pub fn with_pre_check(mut self, hook: SwapHook) -> Self {
        self.pre_check = Some(hook);
        self
    }

    /// Run `hook` after a successful swap; an error is reported as
    /// [`SwapError::PostCheck`] even though the swap happened.
    pub fn with_post_check(mut self, hook: SwapHook) -> Self {
        self.post_check = Some(hook);
        self
    }

    pub fn swapper(&self) -> &S {
        &self.swapper
    }

    /// Swap `target`, or only describe the swap when `dry_run` is set.
    pub async fn swap(&self, target: &SwapTarget, dry_run: bool) -> Result<SwapResult, SwapError> {
        let action = target.describe();

        if dry_run {
            info!(%action, "dry run, slot swap skipped");
            return Ok(SwapResult {
                performed: false,
                timestamp: epoch_secs(),
                description: format!("dry run: would {action}"),
            });
        }

        if let Some(hook) = &self.pre_check {
            hook(target.clone()).await.map_err(|e| {
                warn!(%action, error = %e, "pre-swap check failed, not swapping");
                SwapError::PreCheck(e)
            })?;
        }

        info!(%action, "swapping slots");
        if let Err(e) = self.swapper.swap(target).await {
            error!(%action, error = %e, "slot swap failed");
            return Err(e);
        }
        let timestamp = epoch_secs();
        info!(%action, timestamp, "slot swap completed");

        if let Some(hook) = &self.post_check {
            hook(target.clone()).await.map_err(|e| {
                warn!(%action, error = %e, "post-swap check failed");
                SwapError::PostCheck(e)
            })?;
        }

        Ok(SwapResult {
            performed: true,
            timestamp,
            description: action,
        })
    }
}

/// Runs an external command, such as the Azure CLI, to perform the swap.
///
/// Each argument of the template may contain `{resource_group}`, `{app}`,
/// `{source_slot}` and `{target_slot}`.
#[derive(Debug, Clone)]
pub struct CommandSwapper {
    template: Vec<String>,
}

impl CommandSwapper {
    pub fn new(template: Vec<String>) -> Self {
        Self { template }
    }

    /// The argv that would run for `target`.
    pub fn render(&self, target: &SwapTarget) -> Vec<String> {
        self.template
            .iter()
            .map(|arg| {
                arg.replace("{resource_group}", &target.resource_group)
                    .replace("{app}", &target.app)
                    .replace("{source_slot}", &target.source_slot)
                    .replace("{target_slot}", &target.target_slot)
            })
            .collect()
    }

    async fn run(&self, target: &SwapTarget) -> Result<(), SwapError> {
        let argv = self.render(target);
        let (program, args) = argv.split_first().ok_or(SwapError::EmptyCommand)?;

        let output = tokio::process::Command::new(program)
            .args(args)
            .stdin(std::process::Stdio::null())
            .output()
            .await
            .map_err(|source| SwapError::Spawn {
                program: program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(SwapError::Command {
                status: output.status,
                stderr: truncate_snippet(&String::from_utf8_lossy(&output.stderr)),
            });
        }
        Ok(())
    }
}

impl SlotSwapper for CommandSwapper {
    fn swap<'a>(&'a self, target: &'a SwapTarget) -> SwapFuture<'a> {
        Box::pin(self.run(target))
    }
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Counts calls and fails on demand.
    #[derive(Default)]
    struct RecordingSwapper {
        calls: AtomicU32,
        fail: bool,
    }

    impl SlotSwapper for RecordingSwapper {
        fn swap<'a>(&'a self, _target: &'a SwapTarget) -> SwapFuture<'a> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let fail = self.fail;
            Box::pin(async move {
                if fail {
                    Err(SwapError::Backend("conflict: slot busy".to_string()))
                } else {
                    Ok(())
                }
            })
        }
    }

    fn target() -> SwapTarget {
        SwapTarget {
            resource_group: "rg-sre-demo".to_string(),
            app: "grocery-api".to_string(),
            source_slot: "staging".to_string(),
            target_slot: "production".to_string(),
        }
    }

    fn hook(result: Result<(), String>, calls: Arc<AtomicU32>) -> SwapHook {
        Arc::new(move |_target: SwapTarget| -> HookFuture {
            calls.fetch_add(1, Ordering::SeqCst);
            let result = result.clone();
            Box::pin(async move { result })
        })
    }

    #[tokio::test]
    async fn dry_run_never_calls_backend() {
        let hook_calls = Arc::new(AtomicU32::new(0));
        let orchestrator = SwapOrchestrator::new(RecordingSwapper::default())
            .with_pre_check(hook(Ok(()), hook_calls.clone()));

        let result = orchestrator.swap(&target(), true).await.unwrap();

        assert!(!result.performed);
        assert!(result.description.starts_with("dry run: would swap slot staging"));
        assert_eq!(orchestrator.swapper().calls.load(Ordering::SeqCst), 0);
        assert_eq!(hook_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn real_swap_calls_backend_once() {
        let orchestrator = SwapOrchestrator::new(RecordingSwapper::default());

        let result = orchestrator.swap(&target(), false).await.unwrap();

        assert!(result.performed);
        assert!(result.timestamp > 0);
        assert_eq!(orchestrator.swapper().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn backend_failure_is_fatal_and_not_retried() {
        let orchestrator = SwapOrchestrator::new(RecordingSwapper {
            fail: true,
            ..Default::default()
        });

        let err = orchestrator.swap(&target(), false).await.unwrap_err();

        assert!(matches!(err, SwapError::Backend(_)));
        assert_eq!(orchestrator.swapper().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failing_pre_check_blocks_swap() {
        let calls = Arc::new(AtomicU32::new(0));
        let orchestrator = SwapOrchestrator::new(RecordingSwapper::default())
            .with_pre_check(hook(Err("staging is down".to_string()), calls.clone()));

        let err = orchestrator.swap(&target(), false).await.unwrap_err();

        assert!(matches!(err, SwapError::PreCheck(ref msg) if msg == "staging is down"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(orchestrator.swapper().calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failing_post_check_reports_after_swap() {
        let pre = Arc::new(AtomicU32::new(0));
        let post = Arc::new(AtomicU32::new(0));
        let orchestrator = SwapOrchestrator::new(RecordingSwapper::default())
            .with_pre_check(hook(Ok(()), pre.clone()))
            .with_post_check(hook(Err("still slow".to_string()), post.clone()));

        let err = orchestrator.swap(&target(), false).await.unwrap_err();

        assert!(matches!(err, SwapError::PostCheck(_)));
        assert_eq!(pre.load(Ordering::SeqCst), 1);
        assert_eq!(post.load(Ordering::SeqCst), 1);
        assert_eq!(orchestrator.swapper().calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn describe_mentions_slots_and_group() {
        assert_eq!(
            target().describe(),
            "swap slot staging into production for app grocery-api (resource group rg-sre-demo)"
        );

        let bare = SwapTarget::from(&SwapConfig::default());
        assert_eq!(
            bare.describe(),
            "swap slot staging into production for app <unnamed>"
        );
    }

    #[test]
    fn command_template_substitution() {
        let swapper = CommandSwapper::new(
            [
                "az", "webapp", "deployment", "slot", "swap", "-g", "{resource_group}", "-n",
                "{app}", "--slot", "{source_slot}", "--target-slot", "{target_slot}",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        );

        let argv = swapper.render(&target());
        assert_eq!(argv[6], "rg-sre-demo");
        assert_eq!(argv[8], "grocery-api");
        assert_eq!(argv[10], "staging");
        assert_eq!(argv[12], "production");
    }

    #[tokio::test]
    async fn empty_command_is_rejected() {
        let err = CommandSwapper::new(Vec::new())
            .swap(&target())
            .await
            .unwrap_err();
        assert!(matches!(err, SwapError::EmptyCommand));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_success_and_failure() {
        let ok = CommandSwapper::new(vec!["true".to_string()]);
        ok.swap(&target()).await.unwrap();

        let failing = CommandSwapper::new(
            ["sh", "-c", "echo 'slot {source_slot} is locked' >&2; exit 3"]
                .into_iter()
                .map(String::from)
                .collect(),
        );
        match failing.swap(&target()).await.unwrap_err() {
            SwapError::Command { status, stderr } => {
                assert_eq!(status.code(), Some(3));
                assert_eq!(stderr, "slot staging is locked");
            }
            other => panic!("expected command error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let swapper = CommandSwapper::new(vec!["slotguard-no-such-binary".to_string()]);
        let err = swapper.swap(&target()).await.unwrap_err();
        assert!(matches!(err, SwapError::Spawn { .. }));
    }
}
