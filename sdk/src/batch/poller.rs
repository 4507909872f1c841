use crate::common::errors::AzureResult;
use crate::common::lro::{LroStatus, Poller, StatusMonitor};
use async_trait::async_trait;

use super::client::BatchClient;
use super::models::{
    AllocationState, CertificateState, DisableJobOption, JobScheduleState, JobState, NodeState,
    NodeRemoveParameters, PoolResizeParameters,
};

/// One pollable Batch operation: which resource to fetch, which state means
/// the service is still working, and what a missing resource means.
///
/// The not-found disposition is the subtle part. A delete that finishes
/// removes its resource, so `404` is the success signal. Every other
/// operation needs its resource to exist, so `404` means the operation can
/// never complete.
#[derive(Debug)]
pub(crate) enum PollTarget {
    DeleteJob { job_id: String },
    DisableJob { job_id: String },
    EnableJob { job_id: String },
    TerminateJob { job_id: String },
    DeleteJobSchedule { schedule_id: String },
    TerminateJobSchedule { schedule_id: String },
    DeletePool { pool_id: String },
    PoolAllocation { pool_id: String },
    DeleteCertificate {
        thumbprint_algorithm: String,
        thumbprint: String,
    },
    RebootNode { pool_id: String, node_id: String },
    ReimageNode { pool_id: String, node_id: String },
    StartNode { pool_id: String, node_id: String },
    DeallocateNode { pool_id: String, node_id: String },
}

pub(crate) struct BatchOperationMonitor {
    client: BatchClient,
    target: PollTarget,
}

impl BatchOperationMonitor {
    pub(crate) fn new(client: BatchClient, target: PollTarget) -> Self {
        Self { client, target }
    }
}

/// Delete polls tolerate fetch errors: the resource draining away can
/// produce transient failures, and the `404` that ends the wait is only
/// observable by polling again.
async fn delete_status<T, F>(
    fetch: impl std::future::Future<Output = AzureResult<T>>,
    still_deleting: F,
) -> AzureResult<LroStatus>
where
    F: FnOnce(&T) -> bool,
{
    match fetch.await {
        Ok(resource) if still_deleting(&resource) => Ok(LroStatus::InProgress),
        Ok(_) => Ok(LroStatus::Succeeded),
        Err(err) if BatchClient::is_not_found(&err) => Ok(LroStatus::Succeeded),
        Err(err) => {
            log::debug!("Delete poll continuing through error: {err}");
            Ok(LroStatus::InProgress)
        }
    }
}

/// State-change polls require the resource to exist; its disappearance
/// fails the operation.
async fn transition_status<T, F>(
    fetch: impl std::future::Future<Output = AzureResult<T>>,
    transitioning: F,
) -> AzureResult<LroStatus>
where
    F: FnOnce(&T) -> bool,
{
    match fetch.await {
        Ok(resource) if transitioning(&resource) => Ok(LroStatus::InProgress),
        Ok(_) => Ok(LroStatus::Succeeded),
        Err(err) if BatchClient::is_not_found(&err) => Ok(LroStatus::Failed),
        Err(err) => Err(err),
    }
}

#[async_trait]
impl StatusMonitor for BatchOperationMonitor {
    async fn update_status(&self) -> AzureResult<LroStatus> {
        match &self.target {
            PollTarget::DeleteJob { job_id } => {
                delete_status(self.client.get_job(job_id), |job| {
                    job.state == JobState::Deleting
                })
                .await
            }
            PollTarget::DisableJob { job_id } => {
                transition_status(self.client.get_job(job_id), |job| {
                    job.state == JobState::Disabling
                })
                .await
            }
            PollTarget::EnableJob { job_id } => {
                transition_status(self.client.get_job(job_id), |job| {
                    job.state == JobState::Enabling
                })
                .await
            }
            PollTarget::TerminateJob { job_id } => {
                transition_status(self.client.get_job(job_id), |job| {
                    job.state == JobState::Terminating
                })
                .await
            }
            PollTarget::DeleteJobSchedule { schedule_id } => {
                delete_status(self.client.get_job_schedule(schedule_id), |schedule| {
                    schedule.state == JobScheduleState::Deleting
                })
                .await
            }
            PollTarget::TerminateJobSchedule { schedule_id } => {
                transition_status(self.client.get_job_schedule(schedule_id), |schedule| {
                    schedule.state == JobScheduleState::Terminating
                })
                .await
            }
            PollTarget::DeletePool { pool_id } => {
                delete_status(self.client.get_pool(pool_id), |pool| {
                    pool.state == super::models::PoolState::Deleting
                })
                .await
            }
            PollTarget::PoolAllocation { pool_id } => {
                transition_status(self.client.get_pool(pool_id), |pool| {
                    pool.allocation_state != Some(AllocationState::Steady)
                })
                .await
            }
            PollTarget::DeleteCertificate {
                thumbprint_algorithm,
                thumbprint,
            } => {
                match self
                    .client
                    .get_certificate(thumbprint_algorithm, thumbprint)
                    .await
                {
                    Ok(certificate) => Ok(match certificate.state {
                        Some(CertificateState::Deleting) => LroStatus::InProgress,
                        Some(CertificateState::DeleteFailed) => LroStatus::Failed,
                        _ => LroStatus::Succeeded,
                    }),
                    Err(err) if BatchClient::is_not_found(&err) => Ok(LroStatus::Succeeded),
                    Err(err) => {
                        log::debug!("Delete poll continuing through error: {err}");
                        Ok(LroStatus::InProgress)
                    }
                }
            }
            PollTarget::RebootNode { pool_id, node_id } => {
                transition_status(self.client.get_node(pool_id, node_id), |node| {
                    node.state == NodeState::Rebooting
                })
                .await
            }
            PollTarget::ReimageNode { pool_id, node_id } => {
                transition_status(self.client.get_node(pool_id, node_id), |node| {
                    node.state == NodeState::Reimaging
                })
                .await
            }
            PollTarget::StartNode { pool_id, node_id } => {
                transition_status(self.client.get_node(pool_id, node_id), |node| {
                    node.state == NodeState::Starting
                })
                .await
            }
            PollTarget::DeallocateNode { pool_id, node_id } => {
                // A deallocated node may drop out of the pool entirely, so
                // unlike the other node operations a 404 here is success.
                match self.client.get_node(pool_id, node_id).await {
                    Ok(node) if node.state == NodeState::Deallocating => Ok(LroStatus::InProgress),
                    Ok(_) => Ok(LroStatus::Succeeded),
                    Err(err) if BatchClient::is_not_found(&err) => Ok(LroStatus::Succeeded),
                    Err(err) => Err(err),
                }
            }
        }
    }
}

/// `begin_*` variants issue the operation and hand back a [`Poller`] that
/// tracks it to completion.
impl BatchClient {
    fn poller(&self, target: PollTarget, operation: &'static str) -> Poller {
        Poller::new(
            Box::new(BatchOperationMonitor::new(self.clone(), target)),
            operation,
        )
    }

    pub async fn begin_delete_job(&self, job_id: &str) -> AzureResult<Poller> {
        self.delete_job(job_id).await?;
        Ok(self.poller(
            PollTarget::DeleteJob {
                job_id: job_id.to_string(),
            },
            "delete_job",
        ))
    }

    pub async fn begin_disable_job(
        &self,
        job_id: &str,
        disable_tasks: DisableJobOption,
    ) -> AzureResult<Poller> {
        self.disable_job(job_id, disable_tasks).await?;
        Ok(self.poller(
            PollTarget::DisableJob {
                job_id: job_id.to_string(),
            },
            "disable_job",
        ))
    }

    pub async fn begin_enable_job(&self, job_id: &str) -> AzureResult<Poller> {
        self.enable_job(job_id).await?;
        Ok(self.poller(
            PollTarget::EnableJob {
                job_id: job_id.to_string(),
            },
            "enable_job",
        ))
    }

    pub async fn begin_terminate_job(
        &self,
        job_id: &str,
        terminate_reason: Option<String>,
    ) -> AzureResult<Poller> {
        self.terminate_job(job_id, terminate_reason).await?;
        Ok(self.poller(
            PollTarget::TerminateJob {
                job_id: job_id.to_string(),
            },
            "terminate_job",
        ))
    }

    pub async fn begin_delete_job_schedule(&self, schedule_id: &str) -> AzureResult<Poller> {
        self.delete_job_schedule(schedule_id).await?;
        Ok(self.poller(
            PollTarget::DeleteJobSchedule {
                schedule_id: schedule_id.to_string(),
            },
            "delete_job_schedule",
        ))
    }

    pub async fn begin_terminate_job_schedule(&self, schedule_id: &str) -> AzureResult<Poller> {
        self.terminate_job_schedule(schedule_id).await?;
        Ok(self.poller(
            PollTarget::TerminateJobSchedule {
                schedule_id: schedule_id.to_string(),
            },
            "terminate_job_schedule",
        ))
    }

    pub async fn begin_delete_pool(&self, pool_id: &str) -> AzureResult<Poller> {
        self.delete_pool(pool_id).await?;
        Ok(self.poller(
            PollTarget::DeletePool {
                pool_id: pool_id.to_string(),
            },
            "delete_pool",
        ))
    }

    pub async fn begin_resize_pool(
        &self,
        pool_id: &str,
        parameters: PoolResizeParameters,
    ) -> AzureResult<Poller> {
        self.resize_pool(pool_id, parameters).await?;
        Ok(self.poller(
            PollTarget::PoolAllocation {
                pool_id: pool_id.to_string(),
            },
            "resize_pool",
        ))
    }

    pub async fn begin_stop_resize_pool(&self, pool_id: &str) -> AzureResult<Poller> {
        self.stop_resize_pool(pool_id).await?;
        Ok(self.poller(
            PollTarget::PoolAllocation {
                pool_id: pool_id.to_string(),
            },
            "stop_resize_pool",
        ))
    }

    pub async fn begin_remove_nodes(
        &self,
        pool_id: &str,
        parameters: NodeRemoveParameters,
    ) -> AzureResult<Poller> {
        self.remove_nodes(pool_id, parameters).await?;
        Ok(self.poller(
            PollTarget::PoolAllocation {
                pool_id: pool_id.to_string(),
            },
            "remove_nodes",
        ))
    }

    pub async fn begin_delete_certificate(
        &self,
        thumbprint_algorithm: &str,
        thumbprint: &str,
    ) -> AzureResult<Poller> {
        self.delete_certificate(thumbprint_algorithm, thumbprint)
            .await?;
        Ok(self.poller(
            PollTarget::DeleteCertificate {
                thumbprint_algorithm: thumbprint_algorithm.to_string(),
                thumbprint: thumbprint.to_string(),
            },
            "delete_certificate",
        ))
    }

    pub async fn begin_reboot_node(&self, pool_id: &str, node_id: &str) -> AzureResult<Poller> {
        self.reboot_node(pool_id, node_id).await?;
        Ok(self.poller(
            PollTarget::RebootNode {
                pool_id: pool_id.to_string(),
                node_id: node_id.to_string(),
            },
            "reboot_node",
        ))
    }

    pub async fn begin_reimage_node(&self, pool_id: &str, node_id: &str) -> AzureResult<Poller> {
        self.reimage_node(pool_id, node_id).await?;
        Ok(self.poller(
            PollTarget::ReimageNode {
                pool_id: pool_id.to_string(),
                node_id: node_id.to_string(),
            },
            "reimage_node",
        ))
    }

    pub async fn begin_start_node(&self, pool_id: &str, node_id: &str) -> AzureResult<Poller> {
        self.start_node(pool_id, node_id).await?;
        Ok(self.poller(
            PollTarget::StartNode {
                pool_id: pool_id.to_string(),
                node_id: node_id.to_string(),
            },
            "start_node",
        ))
    }

    pub async fn begin_deallocate_node(&self, pool_id: &str, node_id: &str) -> AzureResult<Poller> {
        self.deallocate_node(pool_id, node_id).await?;
        Ok(self.poller(
            PollTarget::DeallocateNode {
                pool_id: pool_id.to_string(),
                node_id: node_id.to_string(),
            },
            "deallocate_node",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::errors::AzureError;

    async fn fetch_ok<T>(value: T) -> AzureResult<T> {
        Ok(value)
    }

    async fn fetch_err<T>(err: AzureError) -> AzureResult<T> {
        Err(err)
    }

    fn gone() -> AzureError {
        AzureError::api_error(
            "get_job",
            "JobNotFound",
            404,
            "The specified job does not exist.",
        )
    }

    #[tokio::test]
    async fn delete_poll_waits_while_resource_drains() {
        let status = delete_status(fetch_ok(JobState::Deleting), |state| {
            *state == JobState::Deleting
        })
        .await
        .unwrap();
        assert_eq!(status, LroStatus::InProgress);
    }

    #[tokio::test]
    async fn delete_poll_treats_missing_resource_as_complete() {
        let status = delete_status(fetch_err::<JobState>(gone()), |state| {
            *state == JobState::Deleting
        })
        .await
        .unwrap();
        assert_eq!(status, LroStatus::Succeeded);
    }

    #[tokio::test]
    async fn delete_poll_continues_through_transient_errors() {
        let err = AzureError::api_error("get_job", "ServerBusy", 503, "The server is busy.");
        let status = delete_status(fetch_err::<JobState>(err), |state| {
            *state == JobState::Deleting
        })
        .await
        .unwrap();
        assert_eq!(status, LroStatus::InProgress);
    }

    #[tokio::test]
    async fn transition_poll_reports_progress_then_completion() {
        let waiting = transition_status(fetch_ok(JobState::Disabling), |state| {
            *state == JobState::Disabling
        })
        .await
        .unwrap();
        assert_eq!(waiting, LroStatus::InProgress);

        let settled = transition_status(fetch_ok(JobState::Disabled), |state| {
            *state == JobState::Disabling
        })
        .await
        .unwrap();
        assert_eq!(settled, LroStatus::Succeeded);
    }

    #[tokio::test]
    async fn transition_poll_fails_when_resource_disappears() {
        let err = AzureError::ResourceNotFound("job data-prep not found".to_string());
        let status = transition_status(fetch_err::<JobState>(err), |state| {
            *state == JobState::Disabling
        })
        .await
        .unwrap();
        assert_eq!(status, LroStatus::Failed);
    }

    #[tokio::test]
    async fn transition_poll_propagates_other_errors() {
        let err = AzureError::api_error("get_job", "InternalError", 500, "Server error.");
        let result = transition_status(fetch_err::<JobState>(err), |state| {
            *state == JobState::Disabling
        })
        .await;
        assert!(matches!(
            result,
            Err(AzureError::ApiError {
                status_code: 500,
                ..
            })
        ));
    }
}
