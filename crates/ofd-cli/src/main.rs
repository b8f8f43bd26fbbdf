use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use ofd_sync::{AppConfig, Service};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "ofd-cli")]
#[command(about = "Teaching-offer sync & notify command-line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one reconciliation pass against the offer feed.
    Sync,
    /// Run one notification pass for eligible recipients.
    Notify,
    /// Run the cron scheduler until interrupted.
    Schedule,
    /// Apply pending database migrations.
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ofd_cli=info,ofd_sync=info,ofd_store=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env();
    let service = Arc::new(Service::connect(config).await?);

    match cli.command.unwrap_or(Commands::Sync) {
        Commands::Sync => {
            service.startup_sweep().await?;
            let summary = service.sync_pipeline()?.run_once().await?;
            println!(
                "sync complete: run_id={} seen={} inserted={} updated={} deactivated={} associated={}",
                summary.run_id,
                summary.offers_seen,
                summary.offers_inserted,
                summary.offers_updated,
                summary.offers_deactivated,
                summary.offers_associated
            );
        }
        Commands::Notify => {
            let reports = service.notify_pipeline()?.run_once().await?;
            for report in &reports {
                println!(
                    "notify wave: transport={} success={} failure={} sanitized={}",
                    report.transport.as_str(),
                    report.success,
                    report.failure,
                    report.sanitized
                );
            }
            if reports.is_empty() {
                println!("notify complete: no eligible recipients");
            }
        }
        Commands::Schedule => {
            service.startup_sweep().await?;
            match service.build_scheduler().await? {
                Some(scheduler) => {
                    scheduler.start().await?;
                    info!("scheduler started; waiting for interrupt");
                    tokio::signal::ctrl_c().await?;
                    info!("interrupt received; shutting down");
                }
                None => {
                    eprintln!("scheduler disabled; set OFD_SCHEDULER_ENABLED=1 to enable");
                }
            }
        }
        Commands::Migrate => {
            service.store().run_migrations().await?;
            println!("migrations applied");
        }
    }

    Ok(())
}
