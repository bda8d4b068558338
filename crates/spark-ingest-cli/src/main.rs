//! Spark Ingest CLI - enqueue model references and run the download queue.
//!
//! Boots the queue from `SPARKUI_CORE_*` environment variables (overridable by
//! flags), enqueues every reference given on the command line, and runs until
//! nothing is pending or downloading. Ctrl-C snapshots the queue and exits
//! without waiting for in-flight downloads.

use anyhow::{Context, Result};
use clap::Parser;
use spark_ingest::{DownloadQueue, DownloadStatus, IngestConfig, QueueItemView};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "spark-ingest")]
#[command(about = "Download and ingest models from the model registry")]
struct Args {
    /// Model URLs, download URLs or numeric model ids
    references: Vec<String>,

    /// Data directory holding the queue snapshot and the models tree
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Registry API root, e.g. https://civitai.com/api/v1
    #[arg(long)]
    registry_base: Option<String>,

    /// Maximum number of concurrent downloads
    #[arg(short = 'j', long)]
    concurrency: Option<usize>,

    /// Owner recorded on every enqueued item
    #[arg(long, default_value = "local")]
    creator: String,

    /// Seconds between progress reports
    #[arg(long, default_value = "2")]
    report_interval: u64,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.debug);

    let mut config = IngestConfig::from_env().context("Invalid environment configuration")?;
    if let Some(dir) = args.data_dir {
        config.data_dir = dir;
    }
    if let Some(base) = args.registry_base {
        config = config.with_registry_base_url(base);
    }
    if let Some(limit) = args.concurrency {
        config = config.with_max_concurrent_downloads(limit);
    }

    info!("Data directory: {}", config.data_dir.display());
    let queue = DownloadQueue::start(config)
        .await
        .context("Failed to start download queue")?;

    for reference in &args.references {
        match queue.enqueue(&args.creator, reference).await {
            Ok(items) => info!("Queued {} file(s) for {}", items.len(), reference),
            Err(e) => error!("Could not enqueue {}: {}", reference, e),
        }
    }

    print_queue(&queue.list_queue(None));

    let mut ticker = tokio::time::interval(Duration::from_secs(args.report_interval.max(1)));
    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal?;
                info!("Shutdown signal received");
                break;
            }
            _ = ticker.tick() => {
                let items = queue.list_queue(None);
                if items.iter().all(|item| item.status.is_terminal()) {
                    info!("Queue is idle");
                    break;
                }
                print_progress(&items);
            }
        }
    }

    queue.shutdown().await?;
    print_queue(&queue.list_queue(None));
    Ok(())
}

fn init_logging(debug: bool) {
    let builder = FmtSubscriber::builder()
        .with_target(false)
        .with_thread_ids(false)
        .compact();

    if std::env::var_os("RUST_LOG").is_some() {
        builder.with_env_filter(EnvFilter::from_default_env()).init();
    } else {
        let level = if debug { Level::DEBUG } else { Level::INFO };
        builder.with_max_level(level).init();
    }
}

fn print_queue(items: &[QueueItemView]) {
    if items.is_empty() {
        println!("Queue is empty");
        return;
    }
    println!("{:<36}  {:<11}  {:>6}  {:>9}  NAME", "ID", "STATUS", "DONE", "SIZE MB");
    for item in items {
        println!(
            "{:<36}  {:<11}  {:>5.1}%  {:>9.1}  {}",
            item.id,
            item.status.to_string(),
            item.progress * 100.0,
            item.size_mb,
            item.model_name
        );
    }
}

fn print_progress(items: &[QueueItemView]) {
    for item in items
        .iter()
        .filter(|item| item.status == DownloadStatus::Downloading)
    {
        println!("{:>5.1}%  {}", item.progress * 100.0, item.model_name);
    }
}
