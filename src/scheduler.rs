//! src/scheduler.rs
//!
//! Runs exactly one phase to completion. Tasks wait in a work queue; idle
//! workers arrive on the worker stream (fed by the registration forwarder and
//! by workers handed back after a dispatch). A dispatch retries on the same
//! worker with exponential backoff; a permanently failing attempt series puts
//! the task on the failed queue, which drains back onto the work queue so the
//! task reaches a different worker. The phase is done when every task has
//! succeeded at least once.
use crate::master::WorkerAddr;
use crate::rpc;
use crate::worker::{JobName, Phase, TaskDescriptor};
use anyhow::Context;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

const MAX_ATTEMPTS: u32 = 5;
const BACKOFF_BASE: Duration = Duration::from_millis(100);

#[derive(Clone)]
struct TaskContext {
    job_name: JobName,
    phase: Phase,
    task_number: usize,
    other_phase_count: usize,
    input_file: Option<PathBuf>,
}

#[tracing::instrument("Schedule phase", skip_all, fields(job = %job_name, phase = %phase))]
pub async fn schedule(
    job_name: &JobName,
    input_files: &[PathBuf],
    n_reduce: usize,
    phase: Phase,
    workers: &mut mpsc::UnboundedReceiver<WorkerAddr>,
    worker_pool: mpsc::UnboundedSender<WorkerAddr>,
) {
    let (n_tasks, other_phase_count) = match phase {
        Phase::Map => (input_files.len(), n_reduce),
        Phase::Reduce => (n_reduce, input_files.len()),
    };
    tracing::info!(n_tasks, other_phase_count, "phase starting");

    let (task_tx, mut task_rx) = mpsc::unbounded_channel();
    let (failed_tx, mut failed_rx) = mpsc::unbounded_channel();
    for task_number in 0..n_tasks {
        task_tx
            .send(task_number)
            .expect("task queue receiver is held");
    }

    let mut in_flight = JoinSet::new();
    let mut remaining = n_tasks;
    while remaining > 0 {
        tokio::select! {
            Some(task_number) = task_rx.recv() => {
                let Some(worker) = workers.recv().await else {
                    tracing::error!("worker stream closed before the phase completed");
                    return;
                };
                let ctx = TaskContext {
                    job_name: job_name.clone(),
                    phase,
                    task_number,
                    other_phase_count,
                    input_file: match phase {
                        Phase::Map => Some(input_files[task_number].clone()),
                        Phase::Reduce => None,
                    },
                };
                in_flight.spawn(run_task(ctx, worker, worker_pool.clone(), failed_tx.clone()));
            }
            Some(task_number) = failed_rx.recv() => {
                task_tx
                    .send(task_number)
                    .expect("task queue receiver is held");
            }
            Some(result) = in_flight.join_next() => {
                match result {
                    Ok(true) => remaining -= 1,
                    Ok(false) => {}
                    Err(error) => tracing::error!(error = %error, "task dispatch panicked"),
                }
            }
        }
    }
    tracing::info!("phase complete");
}

/// One dispatch series: up to [`MAX_ATTEMPTS`] calls against the same worker
/// with `100ms · 2^k` backoff between them. The worker goes back into the
/// pool either way; the task number goes to the failed queue if every attempt
/// failed. Returns whether the task completed.
async fn run_task(
    ctx: TaskContext,
    worker: WorkerAddr,
    worker_pool: mpsc::UnboundedSender<WorkerAddr>,
    failed: mpsc::UnboundedSender<usize>,
) -> bool {
    let mut succeeded = false;
    for attempt in 0..MAX_ATTEMPTS {
        match dispatch(&ctx, &worker).await {
            Ok(()) => {
                succeeded = true;
                break;
            }
            Err(error) => {
                tracing::warn!(
                    worker = %worker,
                    task = ctx.task_number,
                    attempt,
                    error = %format!("{error:#}"),
                    "task attempt failed",
                );
                if attempt + 1 < MAX_ATTEMPTS {
                    tokio::time::sleep(BACKOFF_BASE * 2u32.pow(attempt)).await;
                }
            }
        }
    }
    if !succeeded {
        let _ = failed.send(ctx.task_number);
    }
    let _ = worker_pool.send(worker);
    succeeded
}

async fn dispatch(ctx: &TaskContext, worker: &WorkerAddr) -> anyhow::Result<()> {
    let client = rpc::worker_client(worker.as_path()).await?;
    let task = TaskDescriptor {
        job_name: ctx.job_name.clone(),
        phase: ctx.phase,
        task_number: ctx.task_number,
        other_phase_count: ctx.other_phase_count,
        input_file: ctx.input_file.clone(),
    };
    client
        .do_task(rpc::call_context(), task)
        .await
        .context("DoTask transport failed")?
        .context("DoTask returned an error")?;
    Ok(())
}
