//! Bounded worker pool for assessment jobs.
//!
//! A fixed set of worker tasks drains one bounded FIFO queue; each worker
//! owns a job end-to-end and runs the CPU-bound assessment on the blocking
//! thread pool. Backpressure is the queue bound itself: `submit` waits for
//! a slot when the queue is full. Workers share no mutable state except the
//! audit store, which serializes its own appends. The pool never retries a
//! failed job; the caller decides.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;

use super::{Assessor, CancelToken};
use crate::error::ErrorKind;
use crate::model::{CalculationResult, Job};

struct PoolRequest {
    job: Job,
    cancel: CancelToken,
    reply: oneshot::Sender<Result<CalculationResult, ErrorKind>>,
}

/// A pool of assessment workers over one shared [`Assessor`].
pub struct AssessmentPool {
    tx: mpsc::Sender<PoolRequest>,
    workers: Vec<JoinHandle<()>>,
}

impl AssessmentPool {
    /// Spawns the pool. Worker count and queue depth come from the
    /// assessor's policy. Must be called within a tokio runtime.
    #[must_use]
    pub fn new(assessor: Arc<Assessor>) -> Self {
        let workers = assessor.policy().pool_workers.max(1);
        let depth = assessor.policy().pool_queue_depth.max(1);

        let (tx, rx) = mpsc::channel::<PoolRequest>(depth);
        let rx = Arc::new(Mutex::new(rx));

        let handles = (0..workers)
            .map(|worker| {
                let rx = Arc::clone(&rx);
                let assessor = Arc::clone(&assessor);
                tokio::spawn(async move {
                    loop {
                        // Holding the lock only while dequeuing keeps the
                        // queue FIFO across workers.
                        let request = { rx.lock().await.recv().await };
                        let Some(request) = request else {
                            tracing::debug!(worker, "assessment worker stopping");
                            break;
                        };

                        let PoolRequest { job, cancel, reply } = request;
                        let task_assessor = Arc::clone(&assessor);
                        let outcome = tokio::task::spawn_blocking(move || {
                            task_assessor.assess_cancellable(&job, &cancel)
                        })
                        .await
                        .unwrap_or_else(|join_err| {
                            Err(ErrorKind::Internal {
                                detail: format!("assessment task failed: {join_err}"),
                            })
                        });

                        // The submitter may have gone away; that is not the
                        // worker's problem.
                        let _ = reply.send(outcome);
                    }
                })
            })
            .collect();

        Self {
            tx,
            workers: handles,
        }
    }

    /// Submits a job and waits for its result. Waits for queue capacity
    /// first when the pool is saturated.
    ///
    /// # Errors
    ///
    /// Any [`ErrorKind`] from the assessment, or [`ErrorKind::Internal`] if
    /// the pool has shut down.
    pub async fn submit(&self, job: Job) -> Result<CalculationResult, ErrorKind> {
        self.submit_cancellable(job, CancelToken::new()).await
    }

    /// Submits a job with a caller-held cancellation token.
    ///
    /// # Errors
    ///
    /// As [`AssessmentPool::submit`], plus [`ErrorKind::Cancelled`] when
    /// the token fires at a component boundary.
    pub async fn submit_cancellable(
        &self,
        job: Job,
        cancel: CancelToken,
    ) -> Result<CalculationResult, ErrorKind> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(PoolRequest { job, cancel, reply })
            .await
            .map_err(|_| ErrorKind::Internal {
                detail: "assessment pool is shut down".to_string(),
            })?;
        response.await.map_err(|_| ErrorKind::Internal {
            detail: "assessment worker dropped the job".to_string(),
        })?
    }

    /// Drains the queue and stops every worker.
    pub async fn shutdown(self) {
        drop(self.tx);
        for handle in self.workers {
            let _ = handle.await;
        }
    }
}
