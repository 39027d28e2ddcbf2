use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Args;
use tokio::sync::watch;
use tracing::info;

use slotguard_core::SlotguardConfig;
use slotguard_probe::{HttpProber, Prober, TlsConfig};
use slotguard_rollback::{
    run_pipeline, CommandSwapper, HookFuture, RecoveryStatus, SwapHook, SwapOrchestrator,
    SwapTarget,
};

use super::duration_arg;
use crate::report;
use crate::OutputFormat;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to slotguard.toml
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Production base URL
    #[arg(long)]
    pub production_url: Option<String>,
    /// Staging (baseline) base URL
    #[arg(long)]
    pub staging_url: Option<String>,
    /// Path appended to both base URLs
    #[arg(long)]
    pub probe_path: Option<String>,

    /// Probes per sample cycle
    #[arg(long)]
    pub count: Option<u32>,
    /// Per-probe timeout (e.g. 10s)
    #[arg(long, value_parser = duration_arg)]
    pub timeout: Option<Duration>,
    /// Pause between consecutive probes (e.g. 500ms)
    #[arg(long, value_parser = duration_arg)]
    pub delay: Option<Duration>,
    /// Extra attempts per failed sample
    #[arg(long)]
    pub retries: Option<u32>,
    /// Skip the discarded warm-up probe
    #[arg(long)]
    pub no_warmup: bool,
    /// Sample production and staging at the same time
    #[arg(long)]
    pub concurrent: bool,

    /// Swap when production is slower than staging by more than this
    #[arg(long)]
    pub absolute_delta_ms: Option<f64>,
    /// Swap when production / staging reaches this ratio
    #[arg(long)]
    pub relative_ratio: Option<f64>,
    /// Recommend a swap regardless of measurements
    #[arg(long)]
    pub force: bool,

    /// Median below which production counts as recovered
    #[arg(long)]
    pub healthy_threshold_ms: Option<f64>,
    /// Wait between recovery checks (e.g. 15s)
    #[arg(long, value_parser = duration_arg)]
    pub poll_interval: Option<Duration>,
    /// Recovery checks before giving up
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Report the swap without performing it
    #[arg(long)]
    pub dry_run: bool,
    /// Resource group holding the app
    #[arg(long)]
    pub resource_group: Option<String>,
    /// App Service name
    #[arg(long)]
    pub app_name: Option<String>,

    /// Summary format: text or json
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

impl RunArgs {
    /// Defaults, then the config file, then flags. Validation happens in
    /// the pipeline.
    pub fn load_config(&self) -> anyhow::Result<SlotguardConfig> {
        let mut config = match &self.config {
            Some(path) => SlotguardConfig::from_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => SlotguardConfig::default(),
        };
        self.apply(&mut config);
        Ok(config)
    }

    fn apply(&self, config: &mut SlotguardConfig) {
        let targets = &mut config.targets;
        override_with(&mut targets.production_url, &self.production_url);
        override_with(&mut targets.staging_url, &self.staging_url);
        override_with(&mut targets.probe_path, &self.probe_path);

        let sampling = &mut config.sampling;
        override_with(&mut sampling.count, &self.count);
        override_with(&mut sampling.timeout, &self.timeout);
        override_with(&mut sampling.delay, &self.delay);
        override_with(&mut sampling.retries, &self.retries);
        if self.no_warmup {
            sampling.warmup = false;
        }
        if self.concurrent {
            sampling.concurrent = true;
        }

        let decision = &mut config.decision;
        override_with(&mut decision.absolute_delta_ms, &self.absolute_delta_ms);
        override_with(&mut decision.relative_ratio, &self.relative_ratio);
        if self.force {
            decision.force = true;
        }

        let recovery = &mut config.recovery;
        override_with(&mut recovery.healthy_threshold_ms, &self.healthy_threshold_ms);
        override_with(&mut recovery.poll_interval, &self.poll_interval);
        override_with(&mut recovery.max_attempts, &self.max_attempts);

        let swap = &mut config.swap;
        if self.dry_run {
            swap.dry_run = true;
        }
        override_with(&mut swap.resource_group, &self.resource_group);
        override_with(&mut swap.app_name, &self.app_name);
    }
}

fn override_with<T: Clone>(slot: &mut T, value: &Option<T>) {
    if let Some(v) = value {
        *slot = v.clone();
    }
}

pub async fn run(args: RunArgs) -> anyhow::Result<()> {
    let config = args.load_config()?;

    let tls = TlsConfig::with_webpki_roots().map_err(anyhow::Error::msg)?;
    let prober = Arc::new(HttpProber::new(tls));

    let mut orchestrator = SwapOrchestrator::new(CommandSwapper::new(config.swap.command.clone()));
    if !config.decision.force {
        orchestrator = orchestrator.with_pre_check(staging_pre_check(
            prober.clone(),
            config.targets.staging_probe_url(),
            config.sampling.timeout,
        ));
    }

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, no slot swap will start and recovery polling stops at the next tick");
            let _ = cancel_tx.send(true);
        }
    });

    let summary = run_pipeline(&config, prober, &orchestrator, cancel_rx).await?;

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        OutputFormat::Text => print!("{}", report::format_summary(&summary)),
    }

    if summary.cancelled {
        anyhow::bail!("interrupted before the slot swap; slots were left unchanged");
    }
    match summary.recovery.as_ref().map(|r| r.status) {
        Some(RecoveryStatus::TimedOut) => {
            anyhow::bail!("production did not recover after the slot swap")
        }
        Some(RecoveryStatus::Aborted) => anyhow::bail!("recovery polling was interrupted"),
        _ => Ok(()),
    }
}

/// Refuses the swap when staging does not answer a single probe with 2xx.
fn staging_pre_check(prober: Arc<HttpProber>, url: String, timeout: Duration) -> SwapHook {
    Arc::new(move |_target: SwapTarget| -> HookFuture {
        let prober = prober.clone();
        let url = url.clone();
        Box::pin(async move {
            let result = prober.probe(&url, timeout).await;
            if result.is_success() {
                Ok(())
            } else {
                Err(format!("staging probe of {url} ended in {}", result.kind()))
            }
        })
    })
}
