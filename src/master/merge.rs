//! src/master/merge.rs
use crate::record::read_records;
use crate::storage;
use crate::worker::JobName;
use anyhow::Context;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;

/// Joins the reduce outputs of a finished job into the single final result:
/// one `key: [v1 v2 …]` line per distinct key, ascending key order. A reduce
/// output that cannot be opened is logged and skipped.
pub struct ResultMerger {
    job_name: JobName,
    n_reduce: usize,
    output_dir: PathBuf,
    result_dir: PathBuf,
}

impl ResultMerger {
    pub fn new(
        job_name: JobName,
        n_reduce: usize,
        output_dir: PathBuf,
        result_dir: PathBuf,
    ) -> Self {
        Self {
            job_name,
            n_reduce,
            output_dir,
            result_dir,
        }
    }

    #[tracing::instrument("Merge reduce outputs", skip_all, fields(job = %self.job_name))]
    pub fn execute(&self) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.result_dir)
            .context("Failed to create result directory")?;
        let results = self.collect_reduce_outputs()?;
        self.write_results(&results)
    }

    fn collect_reduce_outputs(&self) -> anyhow::Result<BTreeMap<String, Vec<String>>> {
        let mut results: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for reduce_task in 0..self.n_reduce {
            let path =
                storage::reduce_output_path(&self.output_dir, &self.job_name, reduce_task);
            tracing::debug!(path = %path.display(), "merging reduce output");
            let file = match File::open(&path) {
                Ok(file) => file,
                Err(error) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %error,
                        "skipping unreadable reduce output",
                    );
                    continue;
                }
            };
            for record in read_records(BufReader::new(file)) {
                let record = record
                    .with_context(|| format!("Failed to decode record in {}", path.display()))?;
                results.entry(record.key).or_default().push(record.value);
            }
        }
        Ok(results)
    }

    fn write_results(&self, results: &BTreeMap<String, Vec<String>>) -> anyhow::Result<()> {
        let path = storage::result_path(&self.result_dir);
        let file = File::create(&path)
            .with_context(|| format!("Failed to create result file {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        for (key, values) in results {
            writeln!(writer, "{}: [{}]", key, values.join(" "))
                .context("Failed to write result line")?;
        }
        writer.flush().context("Failed to flush result file")?;
        tracing::info!(keys = results.len(), path = %path.display(), "merge complete");
        Ok(())
    }
}
