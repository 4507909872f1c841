use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use stratus::batch::models::BatchErrorDetail;
use stratus::batch::{
    MAX_TASKS_PER_REQUEST, TaskAddCollectionResult, TaskAddResult, TaskAddStatus,
    TaskCreateParameters, TaskSubmitter, TaskWorkflowManager,
};
use stratus::common::errors::{AzureError, AzureResult};

mod submission_helpers {
    use super::*;

    pub fn create_tasks(count: usize) -> Vec<TaskCreateParameters> {
        (0..count)
            .map(|i| TaskCreateParameters::new(format!("task-{i}"), "cmd /c echo hello"))
            .collect()
    }

    pub fn success(task_id: &str) -> TaskAddResult {
        TaskAddResult {
            status: TaskAddStatus::Success,
            task_id: task_id.to_string(),
            etag: None,
            location: None,
            error: None,
        }
    }

    pub fn success_result(tasks: &[TaskCreateParameters]) -> TaskAddCollectionResult {
        TaskAddCollectionResult {
            value: tasks.iter().map(|t| success(&t.id)).collect(),
        }
    }

    pub fn request_too_large() -> AzureError {
        AzureError::api_error(
            "add_task_collection",
            "RequestBodyTooLarge",
            413,
            "The request body is too large and exceeds the maximum permissible limit.",
        )
    }

    pub fn server_busy() -> AzureError {
        AzureError::api_error(
            "add_task_collection",
            "ServerBusy",
            503,
            "The server is busy. Retry the request.",
        )
    }
}

use submission_helpers::*;

/// Accepts chunks up to a fixed size and rejects bigger ones with HTTP 413.
struct SizeCappedSubmitter {
    max_accepted: usize,
    attempt_sizes: StdMutex<Vec<usize>>,
    accepted_ids: StdMutex<Vec<String>>,
}

impl SizeCappedSubmitter {
    fn new(max_accepted: usize) -> Arc<Self> {
        Arc::new(Self {
            max_accepted,
            attempt_sizes: StdMutex::new(Vec::new()),
            accepted_ids: StdMutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl TaskSubmitter for SizeCappedSubmitter {
    async fn submit(
        &self,
        _job_id: &str,
        tasks: &[TaskCreateParameters],
    ) -> AzureResult<TaskAddCollectionResult> {
        self.attempt_sizes.lock().unwrap().push(tasks.len());
        if tasks.len() > self.max_accepted {
            return Err(request_too_large());
        }
        self.accepted_ids
            .lock()
            .unwrap()
            .extend(tasks.iter().map(|t| t.id.clone()));
        Ok(success_result(tasks))
    }
}

/// Fails the first few requests with HTTP 503, then accepts everything.
struct FlakySubmitter {
    failures_remaining: StdMutex<usize>,
    attempts: AtomicUsize,
}

#[async_trait]
impl TaskSubmitter for FlakySubmitter {
    async fn submit(
        &self,
        _job_id: &str,
        tasks: &[TaskCreateParameters],
    ) -> AzureResult<TaskAddCollectionResult> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        {
            let mut remaining = self.failures_remaining.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(server_busy());
            }
        }
        Ok(success_result(tasks))
    }
}

/// Always fails with HTTP 401, a status the workflow treats as unknown.
struct RejectingSubmitter;

#[async_trait]
impl TaskSubmitter for RejectingSubmitter {
    async fn submit(
        &self,
        _job_id: &str,
        _tasks: &[TaskCreateParameters],
    ) -> AzureResult<TaskAddCollectionResult> {
        Err(AzureError::api_error(
            "add_task_collection",
            "AuthenticationFailed",
            401,
            "Server failed to authenticate the request.",
        ))
    }
}

/// First request: task-0 comes back as a server error and task-1 as a
/// client error; everything else, and every later request, succeeds.
struct ScriptedOutcomeSubmitter {
    calls: AtomicUsize,
}

#[async_trait]
impl TaskSubmitter for ScriptedOutcomeSubmitter {
    async fn submit(
        &self,
        _job_id: &str,
        tasks: &[TaskCreateParameters],
    ) -> AzureResult<TaskAddCollectionResult> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let value = tasks
            .iter()
            .map(|t| match (call, t.id.as_str()) {
                (0, "task-0") => TaskAddResult {
                    status: TaskAddStatus::ServerError,
                    task_id: t.id.clone(),
                    etag: None,
                    location: None,
                    error: None,
                },
                (0, "task-1") => TaskAddResult {
                    status: TaskAddStatus::ClientError,
                    task_id: t.id.clone(),
                    etag: None,
                    location: None,
                    error: Some(BatchErrorDetail {
                        code: Some("InvalidPropertyValue".to_string()),
                        message: None,
                    }),
                },
                _ => success(&t.id),
            })
            .collect();
        Ok(TaskAddCollectionResult { value })
    }
}

/// Records every accepted chunk, for asserting on parallel submissions.
struct ChunkRecorder {
    chunks: StdMutex<Vec<Vec<String>>>,
}

#[async_trait]
impl TaskSubmitter for ChunkRecorder {
    async fn submit(
        &self,
        _job_id: &str,
        tasks: &[TaskCreateParameters],
    ) -> AzureResult<TaskAddCollectionResult> {
        self.chunks
            .lock()
            .unwrap()
            .push(tasks.iter().map(|t| t.id.clone()).collect());
        Ok(success_result(tasks))
    }
}

#[cfg(test)]
mod chunk_splitting_tests {
    use super::*;

    #[tokio::test]
    async fn test_oversized_chunks_are_halved_until_the_service_accepts() {
        let submitter = SizeCappedSubmitter::new(30);
        let manager = TaskWorkflowManager::new(Arc::clone(&submitter), "render-job");

        let result = manager.add_tasks(create_tasks(100), 0).await.unwrap();

        assert_eq!(result.value.len(), 100);
        // 100 and 50 bounce off the cap; the ceiling settles at 25.
        assert_eq!(
            *submitter.attempt_sizes.lock().unwrap(),
            vec![100, 50, 25, 25, 25, 25]
        );
    }

    #[tokio::test]
    async fn test_split_and_requeue_preserve_task_order() {
        let submitter = SizeCappedSubmitter::new(30);
        let manager = TaskWorkflowManager::new(Arc::clone(&submitter), "render-job");

        let tasks = create_tasks(100);
        let expected_order: Vec<String> = tasks.iter().map(|t| t.id.clone()).collect();
        manager.add_tasks(tasks, 0).await.unwrap();

        assert_eq!(*submitter.accepted_ids.lock().unwrap(), expected_order);
    }

    #[tokio::test]
    async fn test_a_task_too_large_to_ever_fit_stops_the_workflow() {
        let submitter = SizeCappedSubmitter::new(0);
        let manager = TaskWorkflowManager::new(Arc::clone(&submitter), "render-job");

        let err = manager.add_tasks(create_tasks(3), 0).await.unwrap_err();

        // The chunk of one is dropped; the two requeued tasks stay pending.
        assert_eq!(err.errors.len(), 1);
        assert_eq!(err.errors[0].status_code(), Some(413));
        assert!(err.failures.is_empty());
        let pending_ids: Vec<&str> = err.pending.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(pending_ids, ["task-1", "task-2"]);
    }
}

#[cfg(test)]
mod request_error_tests {
    use super::*;

    #[tokio::test]
    async fn test_transient_server_errors_requeue_the_whole_chunk() {
        let submitter = Arc::new(FlakySubmitter {
            failures_remaining: StdMutex::new(2),
            attempts: AtomicUsize::new(0),
        });
        let manager = TaskWorkflowManager::new(Arc::clone(&submitter), "render-job");

        let result = manager.add_tasks(create_tasks(150), 0).await.unwrap();

        assert_eq!(result.value.len(), 150);
        // Two 503s on the first chunk, then 100 + 50 accepted.
        assert_eq!(submitter.attempts.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_unknown_request_errors_stop_the_workflow_with_pending_tasks() {
        let manager = TaskWorkflowManager::new(Arc::new(RejectingSubmitter), "render-job");

        let err = manager.add_tasks(create_tasks(42), 0).await.unwrap_err();

        assert_eq!(err.errors.len(), 1);
        assert_eq!(err.errors[0].status_code(), Some(401));
        // The chunk outcome is unknown, so every task stays pending.
        assert_eq!(err.pending.len(), 42);
        assert!(err.failures.is_empty());
    }
}

#[cfg(test)]
mod per_task_outcome_tests {
    use super::*;

    #[tokio::test]
    async fn test_server_error_tasks_are_resubmitted_and_client_errors_are_final() {
        let submitter = Arc::new(ScriptedOutcomeSubmitter {
            calls: AtomicUsize::new(0),
        });
        let manager = TaskWorkflowManager::new(Arc::clone(&submitter), "render-job");

        let err = manager.add_tasks(create_tasks(5), 0).await.unwrap_err();

        assert_eq!(err.failures.len(), 1);
        assert_eq!(err.failures[0].task_id, "task-1");
        assert_eq!(
            err.failures[0]
                .error
                .as_ref()
                .and_then(|e| e.code.as_deref()),
            Some("InvalidPropertyValue")
        );
        assert!(err.errors.is_empty());
        assert!(err.pending.is_empty());
        // task-0 went back on the queue and landed on the second request.
        assert_eq!(submitter.calls.load(Ordering::SeqCst), 2);
    }
}

#[cfg(test)]
mod concurrent_submission_tests {
    use super::*;

    #[tokio::test]
    async fn test_parallel_workers_submit_every_task_exactly_once() {
        let submitter = Arc::new(ChunkRecorder {
            chunks: StdMutex::new(Vec::new()),
        });
        let manager = TaskWorkflowManager::new(Arc::clone(&submitter), "render-job");

        let result = manager.add_tasks(create_tasks(450), 4).await.unwrap();

        assert_eq!(result.value.len(), 450);
        let chunks = submitter.chunks.lock().unwrap();
        assert!(chunks.iter().all(|c| c.len() <= MAX_TASKS_PER_REQUEST));
        let mut seen = HashSet::new();
        for id in chunks.iter().flatten() {
            assert!(seen.insert(id.clone()), "{id} was submitted twice");
        }
        assert_eq!(seen.len(), 450);
    }

    #[tokio::test]
    async fn test_an_empty_task_list_completes_without_requests() {
        let submitter = SizeCappedSubmitter::new(100);
        let manager = TaskWorkflowManager::new(Arc::clone(&submitter), "render-job");

        let result = manager.add_tasks(Vec::new(), 4).await.unwrap();

        assert!(result.value.is_empty());
        assert!(submitter.attempt_sizes.lock().unwrap().is_empty());
    }
}
