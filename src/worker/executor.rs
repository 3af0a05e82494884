//! src/worker/executor.rs
use crate::functions::{Mapper, Reducer};
use crate::record::{ihash, read_records, KeyValue, RecordWriter};
use crate::storage;
use crate::worker::JobName;
use anyhow::Context;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

/// Runs one map task: reads the whole input file, applies the map function,
/// and partitions the emitted records across `partitions` intermediate files
/// by key hash. Re-execution truncates the partition files, so a retried map
/// task leaves no stale records behind.
pub struct MapExecutor {
    job_name: JobName,
    task_number: usize,
    input_file: PathBuf,
    partitions: usize,
    output_dir: PathBuf,
}

impl MapExecutor {
    pub fn new(
        job_name: JobName,
        task_number: usize,
        input_file: PathBuf,
        partitions: usize,
        output_dir: PathBuf,
    ) -> Self {
        Self {
            job_name,
            task_number,
            input_file,
            partitions,
            output_dir,
        }
    }

    #[tracing::instrument("Map task", skip_all, fields(
        job = %self.job_name,
        task = self.task_number,
        input = %self.input_file.display(),
    ))]
    pub fn execute(&self, mapper: &dyn Mapper) -> anyhow::Result<()> {
        let contents = std::fs::read_to_string(&self.input_file)
            .with_context(|| format!("Failed to read input file {}", self.input_file.display()))?;

        let records = mapper
            .map(&self.input_file.to_string_lossy(), &contents)
            .context("Map function failed")?;

        let mut writers = Vec::with_capacity(self.partitions);
        for reduce_task in 0..self.partitions {
            let path = storage::partition_path(
                &self.output_dir,
                &self.job_name,
                self.task_number,
                reduce_task,
            );
            let file = File::create(&path)
                .with_context(|| format!("Failed to create partition file {}", path.display()))?;
            writers.push(RecordWriter::new(file));
        }

        for record in records {
            let partition = ihash(&record.key) as usize % self.partitions;
            writers[partition]
                .write(&record)
                .context("Failed to append record to partition file")?;
        }

        for writer in writers {
            writer.finish().context("Failed to flush partition file")?;
        }
        tracing::debug!("map task finished");
        Ok(())
    }
}

/// Runs one reduce task: reads its partition file from every map task in
/// order, groups values by key, applies the reduce function per key, and
/// writes one output record per distinct key.
pub struct ReduceExecutor {
    job_name: JobName,
    task_number: usize,
    output_path: PathBuf,
    map_task_count: usize,
    output_dir: PathBuf,
}

impl ReduceExecutor {
    pub fn new(
        job_name: JobName,
        task_number: usize,
        output_path: PathBuf,
        map_task_count: usize,
        output_dir: PathBuf,
    ) -> Self {
        Self {
            job_name,
            task_number,
            output_path,
            map_task_count,
            output_dir,
        }
    }

    #[tracing::instrument("Reduce task", skip_all, fields(
        job = %self.job_name,
        task = self.task_number,
    ))]
    pub fn execute(&self, reducer: &dyn Reducer) -> anyhow::Result<()> {
        // Values accumulate in map-task order; within one map task they keep
        // the mapper's emission order.
        let mut grouped: HashMap<String, Vec<String>> = HashMap::new();
        for map_task in 0..self.map_task_count {
            let path = storage::partition_path(
                &self.output_dir,
                &self.job_name,
                map_task,
                self.task_number,
            );
            let file = File::open(&path)
                .with_context(|| format!("Failed to open partition file {}", path.display()))?;
            for record in read_records(BufReader::new(file)) {
                let record = record
                    .with_context(|| format!("Failed to decode record in {}", path.display()))?;
                grouped.entry(record.key).or_default().push(record.value);
            }
        }

        let file = File::create(&self.output_path).with_context(|| {
            format!(
                "Failed to create reduce output {}",
                self.output_path.display()
            )
        })?;
        let mut writer = RecordWriter::new(file);
        for (key, values) in &grouped {
            let reduced = reducer.reduce(key, values).context("Reduce function failed")?;
            writer
                .write(&KeyValue::new(key.clone(), reduced))
                .context("Failed to write reduce output record")?;
        }
        writer.finish().context("Failed to flush reduce output")?;
        tracing::debug!(keys = grouped.len(), "reduce task finished");
        Ok(())
    }
}
