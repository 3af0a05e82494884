//! src/master/mod.rs
mod merge;
mod service;

pub use merge::ResultMerger;
pub use service::{MasterService, MasterServiceClient, MasterServiceError, WorkerAddr};

use crate::configuration::PathSettings;
use crate::functions::{Mapper, Reducer};
use crate::scheduler::schedule;
use crate::worker::{JobName, MapExecutor, Phase, ReduceExecutor};
use crate::{rpc, storage};
use anyhow::{bail, Context};
use futures::{future, prelude::*};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tarpc::{
    context,
    server::{self, Channel},
    tokio_serde::formats::Json,
};
use tokio::sync::{broadcast, mpsc, watch, Notify, RwLock};

/// Registration state shared between the RPC handler and the forwarder. The
/// workers list only ever grows during a job.
struct MasterInner {
    workers: RwLock<Vec<WorkerAddr>>,
    registered: Notify,
}

#[derive(Clone)]
struct MasterServer {
    inner: Arc<MasterInner>,
}

impl MasterService for MasterServer {
    #[tracing::instrument("Register worker", skip_all, fields(worker = %worker))]
    async fn register(
        self,
        _: context::Context,
        worker: WorkerAddr,
    ) -> Result<(), MasterServiceError> {
        if worker.as_path().as_os_str().is_empty() {
            return Err(MasterServiceError::InvalidRegistration(
                "worker address cannot be empty".into(),
            ));
        }
        let mut workers = self.inner.workers.write().await;
        workers.push(worker);
        tracing::info!(registered = workers.len(), "worker registered");
        // notify_one stores a permit, so a registration that lands while the
        // forwarder is mid-drain is never lost.
        self.inner.registered.notify_one();
        Ok(())
    }
}

/// Handle to a running distributed job. Construction starts the RPC server
/// and the orchestrator; [`Master::wait`] blocks until the merged result has
/// been written.
pub struct Master {
    job_name: JobName,
    input_files: Vec<PathBuf>,
    n_reduce: usize,
    address: PathBuf,
    inner: Arc<MasterInner>,
    shutdown_tx: broadcast::Sender<()>,
    stats: Arc<RwLock<Option<Vec<usize>>>>,
    done_rx: watch::Receiver<bool>,
}

impl Master {
    /// Runs a job across a dynamic pool of workers. Workers register against
    /// `paths.master_socket` at their own pace; the map phase starts
    /// dispatching as soon as the first one shows up.
    #[tracing::instrument("Start distributed job", skip_all, fields(job = %job_name))]
    pub async fn distributed(
        job_name: JobName,
        input_files: Vec<PathBuf>,
        n_reduce: usize,
        paths: PathSettings,
    ) -> anyhow::Result<Master> {
        validate_job(&input_files, n_reduce)?;
        std::fs::create_dir_all(&paths.output).context("Failed to create output directory")?;
        if let Some(parent) = paths.master_socket.parent() {
            std::fs::create_dir_all(parent).context("Failed to create socket directory")?;
        }
        // A previous master may have left its endpoint behind.
        let _ = std::fs::remove_file(&paths.master_socket);

        let mut listener =
            tarpc::serde_transport::unix::listen(&paths.master_socket, Json::default)
                .await
                .with_context(|| {
                    format!(
                        "Failed to bind master listener at {}",
                        paths.master_socket.display()
                    )
                })?;
        listener.config_mut().max_frame_length(usize::MAX);
        tracing::info!(address = %paths.master_socket.display(), "master rpc server up");

        let inner = Arc::new(MasterInner {
            workers: RwLock::new(Vec::new()),
            registered: Notify::new(),
        });
        let (shutdown_tx, mut shutdown_rx) = broadcast::channel::<()>(1);
        let (done_tx, done_rx) = watch::channel(false);
        let stats = Arc::new(RwLock::new(None));

        let server = MasterServer {
            inner: inner.clone(),
        };
        let socket_path = paths.master_socket.clone();
        tokio::spawn(async move {
            let serve = listener
                .filter_map(|connection| future::ready(connection.ok()))
                .map(server::BaseChannel::with_defaults)
                .map(move |channel| channel.execute(server.clone().serve()).for_each(rpc::spawn))
                .buffer_unordered(16)
                .for_each(|_| async {});
            tokio::select! {
                _ = serve => {}
                _ = shutdown_rx.recv() => {
                    tracing::info!("master rpc server shutting down");
                }
            }
            let _ = std::fs::remove_file(&socket_path);
        });

        let master = Master {
            job_name: job_name.clone(),
            input_files: input_files.clone(),
            n_reduce,
            address: paths.master_socket.clone(),
            inner: inner.clone(),
            shutdown_tx: shutdown_tx.clone(),
            stats: stats.clone(),
            done_rx,
        };

        let orchestrator = Orchestrator {
            inner,
            job_name,
            input_files,
            n_reduce,
            paths,
            shutdown_tx,
            stats,
            done_tx,
        };
        tokio::spawn(orchestrator.run());

        Ok(master)
    }

    /// Runs the whole job on the current thread: every map task in order,
    /// then every reduce task, then the merge. No RPC and no workers; used
    /// for testing and single-host debugging.
    #[tracing::instrument("Run sequential job", skip_all, fields(job = %job_name))]
    pub fn sequential(
        job_name: JobName,
        input_files: Vec<PathBuf>,
        n_reduce: usize,
        mapper: &dyn Mapper,
        reducer: &dyn Reducer,
        paths: &PathSettings,
    ) -> anyhow::Result<()> {
        validate_job(&input_files, n_reduce)?;
        std::fs::create_dir_all(&paths.output).context("Failed to create output directory")?;

        for (map_task, input_file) in input_files.iter().enumerate() {
            MapExecutor::new(
                job_name.clone(),
                map_task,
                input_file.clone(),
                n_reduce,
                paths.output.clone(),
            )
            .execute(mapper)?;
        }
        for reduce_task in 0..n_reduce {
            let output_path =
                storage::reduce_output_path(&paths.output, &job_name, reduce_task);
            ReduceExecutor::new(
                job_name.clone(),
                reduce_task,
                output_path,
                input_files.len(),
                paths.output.clone(),
            )
            .execute(reducer)?;
        }
        ResultMerger::new(
            job_name,
            n_reduce,
            paths.output.clone(),
            paths.result.clone(),
        )
        .execute()
    }

    /// Blocks until orchestration has completed: both phases finished,
    /// workers shut down, and the merged result written.
    pub async fn wait(&self) {
        let mut done_rx = self.done_rx.clone();
        let _ = done_rx.wait_for(|done| *done).await;
    }

    /// Per-worker completed-task counts collected at teardown, in
    /// registration order. Empty until [`Master::wait`] returns.
    pub async fn completed_task_counts(&self) -> Vec<usize> {
        self.stats.read().await.clone().unwrap_or_default()
    }

    pub async fn registered_workers(&self) -> Vec<WorkerAddr> {
        self.inner.workers.read().await.clone()
    }

    /// Stops the RPC listener without waiting for the job. Normal teardown
    /// happens on its own once both phases complete.
    pub fn shutdown(&self) {
        self.shutdown_tx.send(()).ok();
    }

    pub fn job_name(&self) -> &JobName {
        &self.job_name
    }

    pub fn address(&self) -> &Path {
        &self.address
    }

    pub fn input_files(&self) -> &[PathBuf] {
        &self.input_files
    }

    pub fn n_reduce(&self) -> usize {
        self.n_reduce
    }
}

fn validate_job(input_files: &[PathBuf], n_reduce: usize) -> anyhow::Result<()> {
    if input_files.is_empty() {
        bail!("no input files provided");
    }
    if n_reduce == 0 {
        bail!("a job needs at least one reduce partition");
    }
    Ok(())
}

struct Orchestrator {
    inner: Arc<MasterInner>,
    job_name: JobName,
    input_files: Vec<PathBuf>,
    n_reduce: usize,
    paths: PathSettings,
    shutdown_tx: broadcast::Sender<()>,
    stats: Arc<RwLock<Option<Vec<usize>>>>,
    done_tx: watch::Sender<bool>,
}

impl Orchestrator {
    #[tracing::instrument("Orchestrate job", skip_all, fields(job = %self.job_name))]
    async fn run(self) {
        for phase in [Phase::Map, Phase::Reduce] {
            let (worker_tx, mut worker_rx) = mpsc::unbounded_channel();
            let forwarder = tokio::spawn(forward_registrations(
                self.inner.clone(),
                worker_tx.clone(),
            ));
            schedule(
                &self.job_name,
                &self.input_files,
                self.n_reduce,
                phase,
                &mut worker_rx,
                worker_tx,
            )
            .await;
            forwarder.abort();
        }

        let counts = self.kill_workers().await;
        *self.stats.write().await = Some(counts);
        let _ = self.shutdown_tx.send(());

        let merger = ResultMerger::new(
            self.job_name.clone(),
            self.n_reduce,
            self.paths.output.clone(),
            self.paths.result.clone(),
        );
        match tokio::task::spawn_blocking(move || merger.execute()).await {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                tracing::error!(error = %format!("{error:#}"), "Merge failed");
            }
            Err(error) => tracing::error!(error = %error, "Merge task panicked"),
        }
        let _ = self.done_tx.send(true);
    }

    /// Issues Shutdown to every registered worker and records the returned
    /// completed-task counts. A worker that cannot be reached is logged and
    /// skipped.
    #[tracing::instrument("Shut down workers", skip_all)]
    async fn kill_workers(&self) -> Vec<usize> {
        let workers = self.inner.workers.read().await.clone();
        let mut counts = Vec::with_capacity(workers.len());
        for worker in &workers {
            match shutdown_worker(worker).await {
                Ok(completed) => {
                    tracing::info!(worker = %worker, completed, "worker shut down");
                    counts.push(completed);
                }
                Err(error) => {
                    tracing::error!(
                        worker = %worker,
                        error = %format!("{error:#}"),
                        "Failed to shut down worker",
                    );
                }
            }
        }
        counts
    }
}

async fn shutdown_worker(worker: &WorkerAddr) -> anyhow::Result<usize> {
    let client = rpc::worker_client(worker.as_path()).await?;
    let reply = client
        .shutdown(rpc::call_context())
        .await
        .context("Shutdown call failed")?;
    Ok(reply.completed_tasks)
}

/// Feeds registered workers to the scheduler's stream in registration order,
/// waking on the registration signal when it has caught up. Each phase runs
/// its own forwarder over the full list, so workers registered during the map
/// phase stay eligible for reduce.
async fn forward_registrations(
    inner: Arc<MasterInner>,
    stream: mpsc::UnboundedSender<WorkerAddr>,
) {
    let mut cursor = 0;
    loop {
        let next = {
            let workers = inner.workers.read().await;
            workers.get(cursor).cloned()
        };
        match next {
            Some(worker) => {
                cursor += 1;
                if stream.send(worker).is_err() {
                    // The phase is over and the stream is gone.
                    break;
                }
            }
            None => inner.registered.notified().await,
        }
    }
}
