//! src/bin/worker.rs
use anyhow::Context;
use clap::Parser;
use mapred::configuration::get_configuration;
use mapred::mappers::WordCounter;
use mapred::master::WorkerAddr;
use mapred::reducers::Counter;
use mapred::telemetry::init_tracing;
use mapred::worker::{run_worker, RpcBudget};
use std::sync::Arc;

/// MapReduce worker node: registers with the master and serves map and
/// reduce tasks until told to stop.
#[derive(Parser)]
struct Args {
    /// Worker number, kept in the endpoint path so several workers can run
    /// from one shell.
    worker_number: u32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("mapred-worker")?;
    let args = Args::parse();
    let configuration = get_configuration().context("Failed to read configuration.")?;
    let paths = configuration.paths;

    let endpoint = paths.socket_base.join(format!(
        "worker-{}-{}.sock",
        std::process::id(),
        args.worker_number
    ));
    run_worker(
        &paths.master_socket,
        WorkerAddr::new(endpoint),
        Arc::new(WordCounter),
        Arc::new(Counter),
        paths.output.clone(),
        RpcBudget::Unlimited,
    )
    .await
}
