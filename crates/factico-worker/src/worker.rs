//! The worker pool: pulls from the task bus and runs handlers.
//!
//! A single loop dequeues up to the free slot count, spawns each task
//! under a semaphore permit, and enforces the overall task deadline.
//! A timed-out or failed task is Nacked; the bus retry policy decides
//! between redelivery and the dead-letter stream. Cancellation via the
//! deadline drops all in-flight sub-operations; committed source state
//! survives, uncommitted work is discarded.

use std::sync::Arc;
use std::time::Duration;

use factico_db::TaskQueue;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::context::AppContext;
use crate::handlers::handle;

/// Sleep between polls when the bus is empty.
const IDLE_POLL: Duration = Duration::from_secs(2);

/// Sleep when every worker slot is busy.
const BUSY_POLL: Duration = Duration::from_millis(250);

/// The worker pool.
pub struct WorkerPool {
    ctx: Arc<AppContext>,
    worker_id: String,
}

impl WorkerPool {
    /// Create a pool identified by `worker_id` (unique per process).
    pub const fn new(ctx: Arc<AppContext>, worker_id: String) -> Self {
        Self { ctx, worker_id }
    }

    /// Run the dequeue loop until the process stops.
    pub async fn run(&self) {
        let concurrency = self.ctx.config.pipeline.worker_concurrency.max(1);
        let deadline = Duration::from_secs(self.ctx.config.pipeline.task_deadline_secs);
        let visibility = Duration::from_secs(self.ctx.config.pipeline.visibility_timeout_secs);
        let slots = Arc::new(Semaphore::new(concurrency));

        info!(
            worker_id = self.worker_id,
            concurrency = concurrency,
            deadline_secs = deadline.as_secs(),
            "worker pool started"
        );

        loop {
            let free = slots.available_permits();
            if free == 0 {
                tokio::time::sleep(BUSY_POLL).await;
                continue;
            }

            let queue = TaskQueue::new(self.ctx.pool.pool());
            let batch = match queue
                .dequeue(&self.worker_id, i64::try_from(free).unwrap_or(1), visibility)
                .await
            {
                Ok(batch) => batch,
                Err(e) => {
                    warn!(error = %e, "dequeue failed");
                    tokio::time::sleep(IDLE_POLL).await;
                    continue;
                }
            };

            if batch.is_empty() {
                tokio::time::sleep(IDLE_POLL).await;
                continue;
            }

            for task in batch {
                let Ok(permit) = Arc::clone(&slots).acquire_owned().await else {
                    return;
                };
                let ctx = Arc::clone(&self.ctx);

                tokio::spawn(async move {
                    let _permit = permit;
                    let task_id = task.id;
                    let kind = task.kind;
                    debug!(task_id = %task_id, kind = kind.as_str(), attempt = task.attempt, "task started");

                    let queue = TaskQueue::new(ctx.pool.pool());
                    let outcome = timeout(deadline, handle(&ctx, &task)).await;
                    let result = match outcome {
                        Ok(Ok(())) => queue.ack(task_id).await,
                        Ok(Err(e)) => {
                            warn!(task_id = %task_id, kind = kind.as_str(), error = %e, "task failed");
                            queue.nack(task_id, &e.to_string()).await
                        }
                        Err(_) => {
                            warn!(task_id = %task_id, kind = kind.as_str(), "task deadline exceeded");
                            // The cancelled handler never reached its own
                            // failure path; advance source state here so an
                            // exhausted task cannot strand a pending source.
                            crate::handlers::record_deadline_failure(&ctx, &task).await;
                            queue.nack(task_id, "task deadline exceeded").await
                        }
                    };
                    if let Err(e) = result {
                        error!(task_id = %task_id, error = %e, "ack/nack failed");
                    }
                });
            }
        }
    }
}
