//! src/worker/service.rs
use crate::error::error_chain_fmt;
use std::fmt::Formatter;
use std::path::PathBuf;

/// Opaque job identifier, stable for the life of a job. Only used as a
/// filename prefix.
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct JobName(String);

impl JobName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for JobName {
    fn from(name: &str) -> Self {
        JobName(name.to_string())
    }
}

impl From<String> for JobName {
    fn from(name: String) -> Self {
        JobName(name)
    }
}

impl std::fmt::Display for JobName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The two serial stages of a job. The scheduler runs one phase at a time;
/// reduce only starts once every map task has succeeded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Phase {
    Map,
    Reduce,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Map => write!(f, "Map"),
            Phase::Reduce => write!(f, "Reduce"),
        }
    }
}

/// Everything a worker needs to execute one task.
///
/// `other_phase_count` is the fan-out of the opposite phase: the number of
/// reduce partitions for a map task, the number of map tasks for a reduce
/// task. `input_file` is set for map tasks only.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct TaskDescriptor {
    pub job_name: JobName,
    pub phase: Phase,
    pub task_number: usize,
    pub other_phase_count: usize,
    pub input_file: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ShutdownReply {
    pub completed_tasks: usize,
}

#[derive(thiserror::Error, serde::Serialize, serde::Deserialize)]
pub enum WorkerServiceError {
    #[error("task execution failed: {0}")]
    TaskFailed(String),
    #[error("Unexpected error: {0}")]
    UnexpectedError(String),
}

impl From<anyhow::Error> for WorkerServiceError {
    fn from(err: anyhow::Error) -> Self {
        WorkerServiceError::TaskFailed(format!("{err:#}"))
    }
}

impl std::fmt::Debug for WorkerServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(f, self)
    }
}

#[tarpc::service]
pub trait WorkerService {
    /// Executes one map or reduce task synchronously; the call returns only
    /// when the task has finished. An `Err` reply is a failed attempt and the
    /// scheduler retries it.
    async fn do_task(task: TaskDescriptor) -> Result<(), WorkerServiceError>;

    /// Reports the cumulative completed-task count and stops the worker from
    /// accepting further work.
    async fn shutdown() -> ShutdownReply;
}
