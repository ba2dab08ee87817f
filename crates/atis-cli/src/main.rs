use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use atis_adapters::adapter_for;
use atis_pipeline::{http_session_provider, run_pipeline, RunConfig};

#[derive(Debug, Parser)]
#[command(name = "atis-cli")]
#[command(about = "Automated tender identification across German procurement portals")]
struct Cli {
    /// YAML run configuration; defaults cover all ten portals.
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the full scrape → consolidate → snapshot pipeline once.
    Scrape {
        /// Override the snapshot output directory.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// List the configured portal table.
    Portals,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => RunConfig::load(path)?,
        None => RunConfig::default(),
    };

    match cli.command.unwrap_or(Commands::Scrape { output: None }) {
        Commands::Scrape { output } => {
            if let Some(output) = output {
                config.output_dir = output;
            }
            let provider = http_session_provider(&config)?;
            let summary = run_pipeline(&config, provider).await?;
            println!(
                "scrape complete: run_id={} portals={} raw={} unique={} snapshot={}",
                summary.run_id,
                summary.portals_attempted,
                summary.raw_records,
                summary.unique_records,
                summary.snapshot_path.display()
            );
        }
        Commands::Portals => {
            for entry in &config.portals {
                let adapter = adapter_for(entry.portal);
                let default_state = entry
                    .default_state
                    .map(|state| state.to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{:<20} {:<16} enabled={} default_state={} {}",
                    entry.portal.to_string(),
                    format!("{:?}", adapter.interaction()),
                    entry.enabled,
                    default_state,
                    entry.source_url
                );
            }
        }
    }

    Ok(())
}
