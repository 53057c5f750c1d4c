use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc::{self, error::TrySendError, Receiver};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::WorkerConfig;
use crate::error::JobError;
use crate::jobs::JobStore;
use crate::pipeline::{Pipeline, RunOutcome};

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Processor tasks, and the depth of the hand-off channel.
    pub concurrency: usize,
    pub poll_interval: Duration,
    /// Lease after which a `running` job is considered abandoned.
    pub abandoned_after: chrono::Duration,
}

impl SchedulerConfig {
    pub fn from_worker_config(config: &WorkerConfig) -> Self {
        Self {
            concurrency: config.concurrency.max(1),
            poll_interval: Duration::from_secs(config.poll_interval_secs.max(1)),
            abandoned_after: chrono::Duration::seconds(
                i64::try_from(config.abandoned_after_secs).unwrap_or(i64::MAX / 1000),
            ),
        }
    }
}

/// One poller feeding `concurrency` processor tasks through a bounded
/// channel of job ids.
pub struct Scheduler {
    jobs: JobStore,
    pipeline: Arc<Pipeline>,
    config: SchedulerConfig,
}

type Queued = Arc<Mutex<HashSet<i64>>>;

impl Scheduler {
    pub fn new(jobs: JobStore, pipeline: Arc<Pipeline>, config: SchedulerConfig) -> Self {
        Self {
            jobs,
            pipeline,
            config,
        }
    }

    /// Runs until `cancel` fires, then closes the channel and waits for
    /// every processor to drain. Fails only if the startup sweep fails.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), JobError> {
        self.jobs.fail_abandoned(self.config.abandoned_after)?;

        let concurrency = self.config.concurrency.max(1);
        let (job_sender, job_receiver) = mpsc::channel::<i64>(concurrency);
        let job_receiver = Arc::new(tokio::sync::Mutex::new(job_receiver));
        let queued: Queued = Arc::new(Mutex::new(HashSet::new()));

        let mut processors: Vec<JoinHandle<()>> = Vec::with_capacity(concurrency);
        for worker_id in 0..concurrency {
            processors.push(tokio::spawn(run_processor(
                worker_id,
                Arc::clone(&job_receiver),
                Arc::clone(&self.pipeline),
                cancel.clone(),
                Arc::clone(&queued),
            )));
        }

        info!(
            workers = concurrency,
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "scheduler started"
        );

        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let job = match self.jobs.claim_next_pending() {
                Ok(Some(job)) => job,
                Ok(None) => continue,
                Err(e) => {
                    error!(error = %e, "failed to poll pending jobs");
                    continue;
                }
            };

            if !mark_queued(&queued, job.id) {
                continue;
            }
            match job_sender.try_send(job.id) {
                Ok(()) => debug!(job_id = job.id, "job handed to processors"),
                Err(TrySendError::Full(id)) => {
                    // Left pending; picked up again on a later tick.
                    unmark_queued(&queued, id);
                    debug!(job_id = id, "all processors busy");
                }
                Err(TrySendError::Closed(id)) => {
                    unmark_queued(&queued, id);
                    warn!("processor channel closed");
                    break;
                }
            }
        }

        info!("scheduler stopping; draining processors");
        drop(job_sender);

        for (i, processor) in processors.into_iter().enumerate() {
            if let Err(e) = processor.await {
                error!(worker_id = i, error = %e, "processor task failed");
            }
        }

        info!("scheduler stopped");
        Ok(())
    }
}

async fn run_processor(
    worker_id: usize,
    job_receiver: Arc<tokio::sync::Mutex<Receiver<i64>>>,
    pipeline: Arc<Pipeline>,
    cancel: CancellationToken,
    queued: Queued,
) {
    debug!(worker_id, "processor started");

    loop {
        let next = job_receiver.lock().await.recv().await;
        let Some(job_id) = next else {
            break;
        };

        if cancel.is_cancelled() {
            debug!(worker_id, job_id, "shutting down; job left pending");
        } else {
            match pipeline.run(job_id, &cancel).await {
                Ok(RunOutcome::Completed(status)) => {
                    debug!(worker_id, job_id, status = %status, "job finished")
                }
                Ok(RunOutcome::AlreadyClaimed) => {
                    debug!(worker_id, job_id, "job claimed elsewhere")
                }
                Ok(RunOutcome::Cancelled) => {
                    debug!(worker_id, job_id, "job interrupted by shutdown")
                }
                Err(e) => error!(worker_id, job_id, error = %e, "job could not be processed"),
            }
        }

        unmark_queued(&queued, job_id);
    }

    debug!(worker_id, "processor stopped");
}

/// Returns `false` if the id is already in the channel or being processed.
fn mark_queued(queued: &Queued, id: i64) -> bool {
    match queued.lock() {
        Ok(mut set) => set.insert(id),
        Err(poisoned) => poisoned.into_inner().insert(id),
    }
}

fn unmark_queued(queued: &Queued, id: i64) {
    match queued.lock() {
        Ok(mut set) => set.remove(&id),
        Err(poisoned) => poisoned.into_inner().remove(&id),
    };
}
