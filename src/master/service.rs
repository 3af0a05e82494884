//! src/master/service.rs
use crate::error::error_chain_fmt;
use std::fmt::Formatter;
use std::path::{Path, PathBuf};

/// A worker's RPC endpoint, used both as its identity and as the address the
/// scheduler dials. Workers are fungible beyond this.
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct WorkerAddr(PathBuf);

impl WorkerAddr {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        WorkerAddr(path.into())
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }
}

impl std::fmt::Display for WorkerAddr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

#[derive(thiserror::Error, serde::Serialize, serde::Deserialize)]
pub enum MasterServiceError {
    #[error("invalid worker registration: {0}")]
    InvalidRegistration(String),
    #[error("Unexpected error: {0}")]
    UnexpectedError(String),
}

impl From<anyhow::Error> for MasterServiceError {
    fn from(err: anyhow::Error) -> Self {
        MasterServiceError::UnexpectedError(err.to_string())
    }
}

impl std::fmt::Debug for MasterServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(f, self)
    }
}

#[tarpc::service]
pub trait MasterService {
    /// Called by a worker once, as soon as its own listener is up. The worker
    /// becomes eligible for task dispatch in the current and later phases.
    async fn register(worker: WorkerAddr) -> Result<(), MasterServiceError>;
}
