//! Bulk task submission.
//!
//! The add-collection endpoint accepts at most 100 tasks per request and can
//! still reject a batch for sheer payload size, fail individual tasks, or
//! fail the whole request transiently. The workflow manager here feeds tasks
//! from a shared queue to one or more workers, shrinks the chunk size when
//! the service reports an oversized body, and requeues tasks whose failure
//! is worth retrying.

use crate::common::errors::{AzureError, AzureResult};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::client::BatchClient;
use super::models::{
    TaskAddCollectionResult, TaskAddResult, TaskAddStatus, TaskCreateParameters,
};

/// Starting chunk size, the service's hard cap per request.
pub const MAX_TASKS_PER_REQUEST: usize = 100;

/// Submits one chunk of tasks. The workflow manager is generic over this so
/// tests can script service behavior without a live account.
#[async_trait]
pub trait TaskSubmitter: Send + Sync {
    async fn submit(
        &self,
        job_id: &str,
        tasks: &[TaskCreateParameters],
    ) -> AzureResult<TaskAddCollectionResult>;
}

#[async_trait]
impl TaskSubmitter for BatchClient {
    async fn submit(
        &self,
        job_id: &str,
        tasks: &[TaskCreateParameters],
    ) -> AzureResult<TaskAddCollectionResult> {
        self.add_task_collection(job_id, tasks).await
    }
}

/// Outcome of a bulk submission that could not complete cleanly.
#[derive(Debug)]
pub struct CreateTasksError {
    /// Tasks still queued when the workflow stopped.
    pub pending: Vec<TaskCreateParameters>,
    /// Per-task rejections the service marked as non-retryable.
    pub failures: Vec<TaskAddResult>,
    /// Request-level errors recorded by the workers.
    pub errors: Vec<AzureError>,
}

impl std::fmt::Display for CreateTasksError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Task submission stopped with {} failed tasks and {} errors; {} tasks were never submitted",
            self.failures.len(),
            self.errors.len(),
            self.pending.len()
        )
    }
}

impl std::error::Error for CreateTasksError {}

#[derive(Debug, Clone, Default)]
pub struct AddTasksOptions {
    /// Number of worker tasks submitting chunks in parallel. Zero runs the
    /// whole workflow inline on the calling task.
    pub concurrency: usize,
}

/// Shared state for one bulk submission: the pending queue, the adaptive
/// chunk ceiling, and the collected outcomes.
///
/// The chunk ceiling only ever shrinks. Once any worker learns that some
/// size is too large for the service, no other worker should try a bigger
/// one.
pub struct TaskWorkflowManager<S: ?Sized> {
    submitter: Arc<S>,
    job_id: String,
    tasks_to_add: Mutex<VecDeque<TaskCreateParameters>>,
    max_tasks_per_request: Mutex<usize>,
    failure_tasks: Mutex<Vec<TaskAddResult>>,
    errors: Mutex<Vec<AzureError>>,
    results_tx: flume::Sender<TaskAddResult>,
    results_rx: flume::Receiver<TaskAddResult>,
}

impl<S: TaskSubmitter + ?Sized + 'static> TaskWorkflowManager<S> {
    pub fn new(submitter: Arc<S>, job_id: impl Into<String>) -> Arc<Self> {
        let (results_tx, results_rx) = flume::unbounded();
        Arc::new(Self {
            submitter,
            job_id: job_id.into(),
            tasks_to_add: Mutex::new(VecDeque::new()),
            max_tasks_per_request: Mutex::new(MAX_TASKS_PER_REQUEST),
            failure_tasks: Mutex::new(Vec::new()),
            errors: Mutex::new(Vec::new()),
            results_tx,
            results_rx,
        })
    }

    /// Runs the workflow to completion over the given tasks.
    ///
    /// Workers stop as soon as the queue drains or any request-level error
    /// has been recorded; whatever is still queued at that point comes back
    /// in [`CreateTasksError::pending`].
    pub async fn add_tasks(
        self: &Arc<Self>,
        tasks: Vec<TaskCreateParameters>,
        concurrency: usize,
    ) -> Result<TaskAddCollectionResult, CreateTasksError> {
        self.tasks_to_add.lock().await.extend(tasks);

        if concurrency == 0 {
            self.run_worker().await;
        } else {
            let mut workers = Vec::with_capacity(concurrency);
            for _ in 0..concurrency {
                let manager = Arc::clone(self);
                workers.push(tokio::spawn(async move { manager.run_worker().await }));
            }
            for worker in workers {
                if let Err(err) = worker.await {
                    self.errors.lock().await.push(AzureError::InternalError(
                        format!("Task submission worker panicked: {err}"),
                    ));
                }
            }
        }

        self.finish().await
    }

    async fn run_worker(&self) {
        loop {
            if !self.errors.lock().await.is_empty() {
                break;
            }
            let chunk: Vec<TaskCreateParameters> = {
                let max = *self.max_tasks_per_request.lock().await;
                let mut pending = self.tasks_to_add.lock().await;
                let take = max.min(pending.len());
                pending.drain(..take).collect()
            };
            if chunk.is_empty() {
                break;
            }
            self.submit_chunk(chunk).await;
        }
    }

    async fn submit_chunk(&self, mut chunk: Vec<TaskCreateParameters>) {
        loop {
            match self.submitter.submit(&self.job_id, &chunk).await {
                Ok(result) => {
                    self.record_results(result, &chunk).await;
                    return;
                }
                Err(err) => match err.status_code() {
                    Some(413) => {
                        if chunk.len() == 1 {
                            // Nothing left to split. The task itself is too
                            // big and will never fit.
                            log::error!(
                                "Task {} exceeds the maximum request body size and was not submitted",
                                chunk[0].id
                            );
                            self.errors.lock().await.push(err);
                            return;
                        }
                        let midpoint = chunk.len() / 2;
                        {
                            let mut max = self.max_tasks_per_request.lock().await;
                            if midpoint < *max {
                                log::debug!(
                                    "Lowered the task chunk ceiling to {midpoint} after an oversized request"
                                );
                                *max = midpoint;
                            }
                        }
                        let tail = chunk.split_off(midpoint);
                        self.requeue_front(tail).await;
                        // Loop around and retry the head half immediately.
                    }
                    Some(status) if status >= 500 => {
                        log::warn!(
                            "Requeueing {} tasks after a server error: {err}",
                            chunk.len()
                        );
                        self.requeue_front(chunk).await;
                        return;
                    }
                    _ => {
                        self.requeue_front(chunk).await;
                        self.errors.lock().await.push(err);
                        return;
                    }
                },
            }
        }
    }

    /// Per-task outcomes from a chunk the service accepted.
    ///
    /// `servererror` tasks go back on the queue for another attempt. A
    /// `clienterror` is final, except `TaskExists`, which means an earlier
    /// attempt already landed the task and counts as success.
    async fn record_results(
        &self,
        result: TaskAddCollectionResult,
        chunk: &[TaskCreateParameters],
    ) {
        for task_result in result.value {
            match task_result.status {
                TaskAddStatus::ServerError => {
                    if let Some(task) = chunk.iter().find(|t| t.id == task_result.task_id) {
                        self.tasks_to_add.lock().await.push_front(task.clone());
                    }
                }
                TaskAddStatus::ClientError
                    if task_result.error.as_ref().and_then(|e| e.code.as_deref())
                        != Some("TaskExists") =>
                {
                    self.failure_tasks.lock().await.push(task_result);
                }
                _ => {
                    // The manager holds the receiver, so the channel cannot
                    // be closed here.
                    let _ = self.results_tx.send(task_result);
                }
            }
        }
    }

    /// Returns tasks to the head of the queue, keeping their order.
    async fn requeue_front(&self, tasks: Vec<TaskCreateParameters>) {
        let mut pending = self.tasks_to_add.lock().await;
        for task in tasks.into_iter().rev() {
            pending.push_front(task);
        }
    }

    async fn finish(&self) -> Result<TaskAddCollectionResult, CreateTasksError> {
        let pending: Vec<TaskCreateParameters> =
            self.tasks_to_add.lock().await.drain(..).collect();
        let failures = std::mem::take(&mut *self.failure_tasks.lock().await);
        let errors = std::mem::take(&mut *self.errors.lock().await);
        let value: Vec<TaskAddResult> = self.results_rx.drain().collect();

        if failures.is_empty() && errors.is_empty() {
            Ok(TaskAddCollectionResult { value })
        } else {
            Err(CreateTasksError {
                pending,
                failures,
                errors,
            })
        }
    }
}

impl BatchClient {
    /// Submits an arbitrarily large set of tasks to a job, chunking requests
    /// and retrying per-task server errors until every task lands or an
    /// unrecoverable failure is recorded.
    pub async fn add_tasks(
        &self,
        job_id: &str,
        tasks: Vec<TaskCreateParameters>,
        options: AddTasksOptions,
    ) -> Result<TaskAddCollectionResult, CreateTasksError> {
        let manager = TaskWorkflowManager::new(Arc::new(self.clone()), job_id);
        manager.add_tasks(tasks, options.concurrency).await
    }
}
