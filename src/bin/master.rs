//! src/bin/master.rs
use anyhow::Context;
use mapred::configuration::get_configuration;
use mapred::master::Master;
use mapred::telemetry::init_tracing;
use mapred::worker::JobName;
use std::path::{Path, PathBuf};
use uuid::Uuid;

const N_REDUCE: usize = 3;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("mapred-master")?;
    let configuration = get_configuration().context("Failed to read configuration.")?;
    let paths = configuration.paths;

    std::fs::create_dir_all(&paths.input).context("Failed to create input directory")?;
    std::fs::create_dir_all(&paths.result).context("Failed to create result directory")?;

    let input_files = write_sample_input(&paths.input)?;
    let job_name = JobName::from(format!("wc-{}", Uuid::new_v4().simple()));

    let master = Master::distributed(job_name, input_files, N_REDUCE, paths.clone()).await?;
    tracing::info!(address = %master.address().display(), "master up, waiting for workers");
    master.wait().await;

    tracing::info!(
        counts = ?master.completed_task_counts().await,
        result = %mapred::storage::result_path(&paths.result).display(),
        "job finished",
    );
    Ok(())
}

fn write_sample_input(input_dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let samples = [
        (
            "sample1.txt",
            "the quick brown fox jumps over the lazy dog\n\
             a quick brown dog jumps over the lazy fox\n",
        ),
        (
            "sample2.txt",
            "brown foxes and dogs are quick and lazy\n\
             the quick brown fox likes to jump\n",
        ),
    ];
    let mut files = Vec::with_capacity(samples.len());
    for (name, contents) in samples {
        let path = input_dir.join(name);
        std::fs::write(&path, contents)
            .with_context(|| format!("Failed to write sample input {}", path.display()))?;
        files.push(path);
    }
    Ok(files)
}
