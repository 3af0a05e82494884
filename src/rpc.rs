//! src/rpc.rs
//!
//! Client plumbing shared by the master and the scheduler: dialing a node's
//! Unix-domain endpoint and stamping every call with a deadline so a hung
//! peer cannot stall its caller. Dial errors and method errors stay distinct;
//! the scheduler treats both as a failed attempt.
use crate::master::MasterServiceClient;
use crate::worker::WorkerServiceClient;
use anyhow::{bail, Context};
use std::future::Future;
use std::path::Path;
use tarpc::client::Config;
use tarpc::context;
use tarpc::tokio_serde::formats::Json;

/// Context for one outbound call. tarpc stamps it with its default deadline
/// of 10 seconds; when the deadline passes, the in-flight call is dropped and
/// surfaces as a transport error.
pub fn call_context() -> context::Context {
    context::current()
}

fn validate_endpoint(addr: &Path) -> anyhow::Result<()> {
    if addr.as_os_str().is_empty() {
        bail!("rpc endpoint path cannot be empty");
    }
    Ok(())
}

pub async fn worker_client(addr: &Path) -> anyhow::Result<WorkerServiceClient> {
    validate_endpoint(addr)?;
    let mut transport = tarpc::serde_transport::unix::connect(addr, Json::default);
    transport.config_mut().max_frame_length(usize::MAX);
    let transport = transport
        .await
        .with_context(|| format!("Failed to connect to worker at {}", addr.display()))?;
    Ok(WorkerServiceClient::new(Config::default(), transport).spawn())
}

pub async fn master_client(addr: &Path) -> anyhow::Result<MasterServiceClient> {
    validate_endpoint(addr)?;
    let mut transport = tarpc::serde_transport::unix::connect(addr, Json::default);
    transport.config_mut().max_frame_length(usize::MAX);
    let transport = transport
        .await
        .with_context(|| format!("Failed to connect to master at {}", addr.display()))?;
    Ok(MasterServiceClient::new(Config::default(), transport).spawn())
}

/// Detaches one in-flight request so a slow handler never blocks the accept
/// loop it came from.
pub(crate) async fn spawn(fut: impl Future<Output = ()> + Send + 'static) {
    tokio::spawn(fut);
}
