//! src/worker/mod.rs
mod executor;
mod service;

pub use executor::{MapExecutor, ReduceExecutor};
pub use service::{
    JobName, Phase, ShutdownReply, TaskDescriptor, WorkerService, WorkerServiceClient,
    WorkerServiceError,
};

use crate::functions::{Mapper, Reducer};
use crate::master::WorkerAddr;
use crate::{rpc, storage};
use anyhow::Context;
use futures::{future, prelude::*};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tarpc::{
    context,
    server::{self, Channel},
    tokio_serde::formats::Json,
};
use tokio::sync::{broadcast, Mutex};

/// How long a worker keeps serving after acknowledging Shutdown, so the
/// reply reaches the master before the listener goes away.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(100);

/// How many calls a worker serves before it stops accepting connections.
/// A finite budget is used by tests to retire a worker mid-job.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RpcBudget {
    Unlimited,
    Calls(usize),
}

impl RpcBudget {
    fn connection_limit(self) -> usize {
        match self {
            RpcBudget::Unlimited => usize::MAX,
            RpcBudget::Calls(calls) => calls,
        }
    }
}

#[derive(Clone)]
struct Worker {
    name: WorkerAddr,
    mapper: Arc<dyn Mapper>,
    reducer: Arc<dyn Reducer>,
    output_dir: PathBuf,
    completed_tasks: Arc<Mutex<usize>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Worker {
    fn execute(&self, task: &TaskDescriptor) -> anyhow::Result<()> {
        match task.phase {
            Phase::Map => {
                let input_file = task
                    .input_file
                    .clone()
                    .context("Map task is missing its input file")?;
                MapExecutor::new(
                    task.job_name.clone(),
                    task.task_number,
                    input_file,
                    task.other_phase_count,
                    self.output_dir.clone(),
                )
                .execute(self.mapper.as_ref())
            }
            Phase::Reduce => {
                let output_path = storage::reduce_output_path(
                    &self.output_dir,
                    &task.job_name,
                    task.task_number,
                );
                ReduceExecutor::new(
                    task.job_name.clone(),
                    task.task_number,
                    output_path,
                    task.other_phase_count,
                    self.output_dir.clone(),
                )
                .execute(self.reducer.as_ref())
            }
        }
    }
}

#[derive(Clone)]
struct WorkerServer {
    worker: Worker,
}

impl WorkerService for WorkerServer {
    #[tracing::instrument("Execute task", skip_all, fields(
        worker = %self.worker.name,
        phase = %task.phase,
        task = task.task_number,
    ))]
    async fn do_task(
        self,
        _: context::Context,
        task: TaskDescriptor,
    ) -> Result<(), WorkerServiceError> {
        {
            let mut completed = self.worker.completed_tasks.lock().await;
            *completed += 1;
        }
        let worker = self.worker.clone();
        let outcome = tokio::task::spawn_blocking(move || worker.execute(&task))
            .await
            .map_err(|e| WorkerServiceError::UnexpectedError(format!("task panicked: {e}")))?;
        outcome.map_err(WorkerServiceError::from)
    }

    #[tracing::instrument("Shutdown worker", skip_all, fields(worker = %self.worker.name))]
    async fn shutdown(self, _: context::Context) -> ShutdownReply {
        let completed_tasks = *self.worker.completed_tasks.lock().await;
        let shutdown_tx = self.worker.shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(SHUTDOWN_GRACE).await;
            shutdown_tx.send(()).ok();
        });
        ShutdownReply { completed_tasks }
    }
}

/// Brings up a worker node and serves it to completion: bind the RPC
/// listener, register with the master, then answer DoTask and Shutdown calls
/// until the budget runs out or the master says stop. Registration failure is
/// fatal to the worker.
pub async fn run_worker(
    master_addr: &Path,
    me: WorkerAddr,
    mapper: Arc<dyn Mapper>,
    reducer: Arc<dyn Reducer>,
    output_dir: PathBuf,
    budget: RpcBudget,
) -> anyhow::Result<()> {
    if let Some(parent) = me.as_path().parent() {
        std::fs::create_dir_all(parent).context("Failed to create socket directory")?;
    }
    // A previous worker may have left its endpoint behind.
    let _ = std::fs::remove_file(me.as_path());

    let mut listener = tarpc::serde_transport::unix::listen(me.as_path(), Json::default)
        .await
        .with_context(|| format!("Failed to bind worker listener at {me}"))?;
    listener.config_mut().max_frame_length(usize::MAX);

    let (shutdown_tx, mut shutdown_rx) = broadcast::channel::<()>(1);
    let worker = Worker {
        name: me.clone(),
        mapper,
        reducer,
        output_dir,
        completed_tasks: Arc::new(Mutex::new(0)),
        shutdown_tx,
    };

    register(master_addr, &me).await?;

    let server = WorkerServer { worker };
    let serve = listener
        .filter_map(|connection| future::ready(connection.ok()))
        .map(server::BaseChannel::with_defaults)
        .take(budget.connection_limit())
        .map(|channel| channel.execute(server.clone().serve()).for_each(rpc::spawn))
        .buffer_unordered(10)
        .for_each(|_| async {});

    tokio::select! {
        _ = serve => {
            tracing::info!(worker = %me, "rpc budget exhausted");
        }
        _ = shutdown_rx.recv() => {
            tracing::info!(worker = %me, "worker shutting down");
        }
    }

    let _ = std::fs::remove_file(me.as_path());
    Ok(())
}

#[tracing::instrument("Register with master", skip_all, fields(worker = %me))]
async fn register(master_addr: &Path, me: &WorkerAddr) -> anyhow::Result<()> {
    let client = rpc::master_client(master_addr)
        .await
        .context("Failed to reach master for registration")?;
    client
        .register(rpc::call_context(), me.clone())
        .await
        .context("Registration call failed")?
        .context("Master rejected registration")?;
    Ok(())
}
