use anyhow::Result;
use clap::{Parser, Subcommand};
use sorter_core::config::{self, AppConfig};
use sorter_core::pipeline::Pipeline;
use tracing::info;

mod watch;

#[derive(Parser)]
#[command(name = "file-sorter")]
#[command(about = "Content-aware drop-folder organizer", long_about = None)]
struct Cli {
    /// Path to config TOML
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch the intake directory and organize files as they arrive
    Run,
    /// Organize everything currently in the intake directory, then exit
    Once,
    /// Apply pending feedback corrections once, then exit
    Feedback,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let cfg = config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Run => run(cfg).await,
        Commands::Once => once(cfg).await,
        Commands::Feedback => feedback(cfg),
    }
}

async fn run(cfg: AppConfig) -> Result<()> {
    let pipeline = Pipeline::new(cfg)?;

    let backlog = pipeline.enqueue_backlog()?;
    if backlog > 0 {
        info!(queued = backlog, "queued files already waiting in intake");
    }

    // Must stay alive for its callbacks to keep firing.
    let _watcher = watch::spawn_watcher(pipeline.clone())?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let worker = {
        let pipeline = pipeline.clone();
        tokio::spawn(async move { pipeline.worker().await })
    };
    let feedback_task = {
        let pipeline = pipeline.clone();
        tokio::spawn(async move { pipeline.run_feedback(shutdown_rx).await })
    };

    info!(dir = %pipeline.config().drop_dir().display(), "watching intake directory");
    tokio::signal::ctrl_c().await?;
    info!("shutting down");

    let _ = shutdown_tx.send(true);
    pipeline.close();
    worker.await?;
    feedback_task.await?;
    Ok(())
}

/// One pass over the intake directory, no watcher. Convenient for cron jobs
/// and scripted runs.
async fn once(cfg: AppConfig) -> Result<()> {
    let pipeline = Pipeline::new(cfg)?;
    let queued = pipeline.enqueue_backlog()?;
    pipeline.close();
    pipeline.worker().await;
    info!(processed = queued, "single pass complete");
    Ok(())
}

fn feedback(cfg: AppConfig) -> Result<()> {
    let pipeline = Pipeline::new(cfg)?;
    let applied = pipeline.feedback_sweep()?;
    info!(corrections = applied, "feedback sweep complete");
    Ok(())
}
