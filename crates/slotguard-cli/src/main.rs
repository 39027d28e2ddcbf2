//! slotguard: canary latency probes with automatic slot-swap rollback.
//!
//! # Usage
//!
//! ```text
//! slotguard init --app grocery-api --resource-group rg-sre-demo
//! slotguard run --config slotguard.toml
//! slotguard probe https://grocery-api.azurewebsites.net/health --count 3
//! ```

use clap::{Parser, Subcommand, ValueEnum};

mod commands;
mod report;

#[derive(Parser)]
#[command(
    name = "slotguard",
    about = "Canary latency probes with automatic slot-swap rollback",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Log line format on stderr.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare production against staging and swap slots if production regressed.
    ///
    /// Flags override values read from --config, which override the defaults.
    Run(commands::run::RunArgs),
    /// Sample one URL and print its median latency.
    Probe(commands::probe::ProbeArgs),
    /// Write a slotguard.toml scaffold.
    Init {
        /// Directory to write slotguard.toml into
        #[arg(short, long, default_value = ".")]
        path: String,
        /// App Service name
        #[arg(long, default_value = "my-app")]
        app: String,
        /// Resource group holding the app
        #[arg(long, default_value = "my-resource-group")]
        resource_group: String,
        /// Overwrite an existing slotguard.toml
        #[arg(long)]
        force: bool,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

/// Summary output format on stdout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

fn init_tracing(format: LogFormat) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new("info,slotguard=debug"))?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format)?;

    match cli.command {
        Commands::Run(args) => commands::run::run(args).await,
        Commands::Probe(args) => commands::probe::probe(args).await,
        Commands::Init {
            path,
            app,
            resource_group,
            force,
        } => commands::init::init(&path, &app, &resource_group, force),
    }
}
