use std::time::Duration;

use clap::Args;

use slotguard_core::SamplingConfig;
use slotguard_probe::{HttpProber, Sampler, SamplerConfig, TlsConfig};

use super::duration_arg;
use crate::report;
use crate::OutputFormat;

#[derive(Args, Debug)]
pub struct ProbeArgs {
    /// Full URL to probe
    pub url: String,
    /// Probes in the sample cycle
    #[arg(long, default_value_t = 5)]
    pub count: u32,
    /// Per-probe timeout
    #[arg(long, default_value = "10s", value_parser = duration_arg)]
    pub timeout: Duration,
    /// Pause between consecutive probes
    #[arg(long, default_value = "500ms", value_parser = duration_arg)]
    pub delay: Duration,
    /// Extra attempts per failed sample
    #[arg(long, default_value_t = 1)]
    pub retries: u32,
    /// Skip the discarded warm-up probe
    #[arg(long)]
    pub no_warmup: bool,
    /// Output format: text or json
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

impl ProbeArgs {
    /// Sampling settings for this URL, checked with the same rules as a
    /// config file's `[sampling]` section.
    fn sampler_config(&self) -> anyhow::Result<SamplerConfig> {
        let sampling = SamplingConfig {
            count: self.count,
            timeout: self.timeout,
            delay: self.delay,
            retries: self.retries,
            warmup: !self.no_warmup,
            ..SamplingConfig::default()
        };
        sampling.validate()?;
        Ok(SamplerConfig::from(&sampling))
    }
}

pub async fn probe(args: ProbeArgs) -> anyhow::Result<()> {
    let sampler_config = args.sampler_config()?;
    let tls = TlsConfig::with_webpki_roots().map_err(anyhow::Error::msg)?;
    let sampler = Sampler::new(HttpProber::new(tls), sampler_config);

    let estimate = sampler.estimate("probe", &args.url).await;

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&estimate)?),
        OutputFormat::Text => println!("{}  {}", args.url, report::format_estimate(&estimate)),
    }

    if !estimate.is_present() {
        anyhow::bail!("no successful probes for {}", args.url);
    }
    Ok(())
}
