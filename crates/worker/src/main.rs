// ghsync-worker: sync stored user content into GitHub repositories.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use ghsync_common::protocol::push::decode_inbound;
use ghsync_worker::{logging, server, JobPipeline, WorkerConfig};
use tokio::io::AsyncReadExt;
use tracing::info;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "ghsync-worker", about = "Commit stored user content to GitHub repositories")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Accept push deliveries over HTTP.
    Serve,
    /// Run a single job and exit.
    Run {
        /// Job document or push envelope; `-` reads stdin.
        #[arg(long, value_name = "PATH")]
        job: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = WorkerConfig::from_env();
    logging::init(&config);

    let pipeline = Arc::new(JobPipeline::from_config(&config));
    match cli.command {
        Command::Serve => server::serve(pipeline, config.listen_addr).await,
        Command::Run { job } => run_once(&pipeline, &job).await,
    }
}

async fn run_once(pipeline: &JobPipeline, source: &Path) -> anyhow::Result<()> {
    let payload = if source.as_os_str() == "-" {
        let mut buffer = Vec::new();
        tokio::io::stdin().read_to_end(&mut buffer).await.context("failed to read job from stdin")?;
        buffer
    } else {
        tokio::fs::read(source)
            .await
            .with_context(|| format!("failed to read job from {}", source.display()))?
    };

    let inbound = decode_inbound(&payload).context("failed to decode job")?;
    let job_id = inbound.message_id.unwrap_or_else(|| Uuid::new_v4().to_string());
    let report = pipeline
        .run(&inbound.job, &job_id)
        .await
        .with_context(|| format!("job {job_id} failed"))?;

    info!(job_id = %report.job_id, files = report.materialized.files.len(), "job finished");
    Ok(())
}
