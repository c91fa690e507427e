//! connthreshd - Connection Threshold Replay Daemon
//!
//! Entry point for the connthreshd daemon.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tokio::io::AsyncWriteExt;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use connthreshd::{DaemonConfig, NotificationRecord, ReplayStats, Replayer};

/// Replays a packet trace and prints threshold crossings as JSON lines.
#[derive(Debug, Parser)]
#[command(name = "connthreshd", version, about)]
struct Args {
    /// Configuration file (YAML, or JSON with a .json extension)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Trace file to replay; reads stdin when omitted
    #[arg(short, long)]
    trace: Option<PathBuf>,

    /// Log level filter, overridden by RUST_LOG
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

/// Initializes tracing/logging subsystem
fn init_logging(args: &Args) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr);

    if args.json_logs {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(args: Args) -> anyhow::Result<ReplayStats> {
    let config = match &args.config {
        Some(path) => DaemonConfig::load(path)?,
        None => DaemonConfig::default(),
    };
    info!(
        defaults = config.default_thresholds.len(),
        "Loaded configuration"
    );

    let reader: Box<dyn BufRead + Send> = match &args.trace {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Failed to open trace {}", path.display()))?,
        )),
        None => Box::new(BufReader::new(io::stdin())),
    };

    let mut replayer = Replayer::new(config);
    let mut crossings = replayer.subscribe();

    let printer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(crossed) = crossings.recv().await {
            let mut line = serde_json::to_vec(&NotificationRecord::from(crossed))?;
            line.push(b'\n');
            stdout.write_all(&line).await?;
        }
        stdout.flush().await?;
        Ok::<_, anyhow::Error>(())
    });

    // The replayer is dropped with the blocking task, which closes the
    // notification channel and lets the printer finish.
    let stats = tokio::task::spawn_blocking(move || replayer.run(reader))
        .await
        .context("Replay task panicked")??;

    printer.await.context("Printer task panicked")??;
    Ok(stats)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args);

    info!("--- Starting connthreshd ---");

    match run(args).await {
        Ok(stats) => {
            info!(
                records = stats.records,
                connections = stats.connections_opened,
                notifications = stats.notifications,
                api_errors = stats.api_errors,
                "connthreshd finished"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("connthreshd failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
