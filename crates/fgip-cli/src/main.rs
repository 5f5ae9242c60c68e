use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

use fgip_pipeline::{maybe_build_scheduler, Pipeline, PipelineConfig};

#[derive(Debug, Parser)]
#[command(name = "fgip")]
#[command(about = "Federal grant intake pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one intake cycle and print the summary.
    Cycle,
    /// Run an immediate cycle, then keep polling on the configured cron.
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = PipelineConfig::from_env();
    let pipeline = Arc::new(Pipeline::from_config(&config)?);

    match cli.command.unwrap_or(Commands::Cycle) {
        Commands::Cycle => {
            let summary = pipeline.run_once().await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::Watch => {
            let summary = pipeline.run_once().await?;
            info!(
                run_id = %summary.run_id,
                assessed = summary.assessed,
                "initial cycle complete; waiting on scheduler"
            );

            let mut watch_config = config.clone();
            watch_config.scheduler_enabled = true;
            if let Some(sched) = maybe_build_scheduler(Arc::clone(&pipeline), &watch_config).await?
            {
                sched.start().await?;
                tokio::signal::ctrl_c().await?;
                info!("shutdown signal received");
            }
        }
    }

    Ok(())
}
