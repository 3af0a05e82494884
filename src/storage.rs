//! src/storage.rs
//!
//! Deterministic naming for everything the engine puts on the shared
//! filesystem. Map task `m` writes one partition file per reduce task `r`;
//! reduce task `r` reads its column of partition files and writes one output;
//! the merge joins the reduce outputs into the final result.
use crate::worker::JobName;
use std::path::{Path, PathBuf};

pub const RESULT_FILE: &str = "mrt.result.txt";

/// Intermediate file holding the records of map task `map_task` whose keys
/// hash to partition `reduce_task`.
pub fn partition_path(
    output_dir: &Path,
    job: &JobName,
    map_task: usize,
    reduce_task: usize,
) -> PathBuf {
    output_dir.join(format!("mrtmp.{job}-{map_task}-{reduce_task}"))
}

/// Output file of reduce task `reduce_task`.
pub fn reduce_output_path(output_dir: &Path, job: &JobName, reduce_task: usize) -> PathBuf {
    output_dir.join(format!("mrtmp.{job}-{reduce_task}"))
}

/// The single merged result of a job.
pub fn result_path(result_dir: &Path) -> PathBuf {
    result_dir.join(RESULT_FILE)
}
