use crate::auth::TokenCredential;
use crate::common::errors::{AzureError, AzureResult, HttpError};
use crate::common::http::{ClientOptions, build_http_client, client_request_id, parse_json};
use crate::common::paging::{PageFlavor, Pager};
use crate::common::retry::RetryPolicy;
use reqwest::Method;
use reqwest::header::AUTHORIZATION;
use serde::de::DeserializeOwned;
use std::sync::Arc;

use super::models::{
    BatchJob, BatchJobSchedule, BatchPool, BatchTask, Certificate, ComputeNode, DisableJobOption,
    JobDisableParameters, JobTerminateParameters, NodeRemoveParameters, PoolResizeParameters,
    TaskAddCollectionParameters, TaskAddCollectionResult, TaskCreateParameters,
};

const API_VERSION: &str = "2024-02-01";
const BATCH_SCOPE: &str = "https://batch.core.windows.net/.default";

/// Client for a Batch account's data plane: jobs, job schedules, pools,
/// compute nodes, certificates, and tasks.
#[derive(Clone)]
pub struct BatchClient {
    base_url: String,
    api_version: String,
    http_client: reqwest::Client,
    credential: Arc<dyn TokenCredential>,
    retry: RetryPolicy,
}

impl BatchClient {
    pub fn new(batch_url: &str, credential: Arc<dyn TokenCredential>) -> AzureResult<Self> {
        Self::with_options(batch_url, credential, ClientOptions::default())
    }

    pub fn with_options(
        batch_url: &str,
        credential: Arc<dyn TokenCredential>,
        options: ClientOptions,
    ) -> AzureResult<Self> {
        if batch_url.trim().is_empty() {
            return Err(AzureError::InvalidConfiguration(
                "Batch account URL cannot be empty".to_string(),
            ));
        }
        Ok(Self {
            base_url: batch_url.trim_end_matches('/').to_string(),
            api_version: options
                .api_version
                .unwrap_or_else(|| API_VERSION.to_string()),
            http_client: build_http_client(options.timeout_secs)?,
            credential,
            retry: options.retry,
        })
    }

    /// Endpoint of a Batch account, e.g. `https://render.westus2.batch.azure.com`.
    pub fn account_endpoint(account: &str, region: &str) -> String {
        format!("https://{account}.{region}.batch.azure.com")
    }

    fn operation_url(&self, path: &str) -> String {
        format!("{}/{}?api-version={}", self.base_url, path, self.api_version)
    }

    async fn bearer_token(&self) -> AzureResult<String> {
        Ok(self.credential.get_token(BATCH_SCOPE).await?.token)
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<&serde_json::Value>,
    ) -> AzureResult<reqwest::Response> {
        let token = self.bearer_token().await?;
        let mut request = self
            .http_client
            .request(method, url)
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .header("x-ms-client-request-id", client_request_id());
        if let Some(body) = body {
            request = request.json(body);
        }
        request.send().await.map_err(|e| {
            AzureError::from(HttpError::RequestFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })
        })
    }

    async fn execute_json<T: DeserializeOwned>(
        &self,
        method: Method,
        url: String,
        body: Option<serde_json::Value>,
        operation: &'static str,
        expected: &'static str,
    ) -> AzureResult<T> {
        let url_ref = url.as_str();
        let body_ref = body.as_ref();
        self.retry
            .run(operation, || {
                let method = method.clone();
                async move {
                    let response = self.send(method, url_ref, body_ref).await?;
                    if !response.status().is_success() {
                        return Err(AzureError::from_azure_response(response, operation).await);
                    }
                    parse_json(response, expected).await
                }
            })
            .await
    }

    /// Runs an operation whose success responses carry no useful body,
    /// such as `202 Accepted` from deletes and state changes.
    async fn execute_empty(
        &self,
        method: Method,
        url: String,
        body: Option<serde_json::Value>,
        operation: &'static str,
    ) -> AzureResult<()> {
        let url_ref = url.as_str();
        let body_ref = body.as_ref();
        self.retry
            .run(operation, || {
                let method = method.clone();
                async move {
                    let response = self.send(method, url_ref, body_ref).await?;
                    if !response.status().is_success() {
                        return Err(AzureError::from_azure_response(response, operation).await);
                    }
                    Ok(())
                }
            })
            .await
    }

    // Jobs

    pub async fn get_job(&self, job_id: &str) -> AzureResult<BatchJob> {
        self.execute_json(
            Method::GET,
            self.operation_url(&job_path(job_id)),
            None,
            "get_job",
            "job",
        )
        .await
    }

    pub async fn delete_job(&self, job_id: &str) -> AzureResult<()> {
        self.execute_empty(
            Method::DELETE,
            self.operation_url(&job_path(job_id)),
            None,
            "delete_job",
        )
        .await
    }

    pub async fn disable_job(
        &self,
        job_id: &str,
        disable_tasks: DisableJobOption,
    ) -> AzureResult<()> {
        let body = serde_json::to_value(JobDisableParameters { disable_tasks })?;
        self.execute_empty(
            Method::POST,
            self.operation_url(&format!("{}/disable", job_path(job_id))),
            Some(body),
            "disable_job",
        )
        .await
    }

    pub async fn enable_job(&self, job_id: &str) -> AzureResult<()> {
        self.execute_empty(
            Method::POST,
            self.operation_url(&format!("{}/enable", job_path(job_id))),
            None,
            "enable_job",
        )
        .await
    }

    pub async fn terminate_job(
        &self,
        job_id: &str,
        terminate_reason: Option<String>,
    ) -> AzureResult<()> {
        let body = serde_json::to_value(JobTerminateParameters { terminate_reason })?;
        self.execute_empty(
            Method::POST,
            self.operation_url(&format!("{}/terminate", job_path(job_id))),
            Some(body),
            "terminate_job",
        )
        .await
    }

    // Job schedules

    pub async fn get_job_schedule(&self, schedule_id: &str) -> AzureResult<BatchJobSchedule> {
        self.execute_json(
            Method::GET,
            self.operation_url(&schedule_path(schedule_id)),
            None,
            "get_job_schedule",
            "job schedule",
        )
        .await
    }

    pub async fn delete_job_schedule(&self, schedule_id: &str) -> AzureResult<()> {
        self.execute_empty(
            Method::DELETE,
            self.operation_url(&schedule_path(schedule_id)),
            None,
            "delete_job_schedule",
        )
        .await
    }

    pub async fn terminate_job_schedule(&self, schedule_id: &str) -> AzureResult<()> {
        self.execute_empty(
            Method::POST,
            self.operation_url(&format!("{}/terminate", schedule_path(schedule_id))),
            None,
            "terminate_job_schedule",
        )
        .await
    }

    // Pools

    pub async fn get_pool(&self, pool_id: &str) -> AzureResult<BatchPool> {
        self.execute_json(
            Method::GET,
            self.operation_url(&pool_path(pool_id)),
            None,
            "get_pool",
            "pool",
        )
        .await
    }

    pub async fn delete_pool(&self, pool_id: &str) -> AzureResult<()> {
        self.execute_empty(
            Method::DELETE,
            self.operation_url(&pool_path(pool_id)),
            None,
            "delete_pool",
        )
        .await
    }

    pub async fn resize_pool(
        &self,
        pool_id: &str,
        parameters: PoolResizeParameters,
    ) -> AzureResult<()> {
        let body = serde_json::to_value(parameters)?;
        self.execute_empty(
            Method::POST,
            self.operation_url(&format!("{}/resize", pool_path(pool_id))),
            Some(body),
            "resize_pool",
        )
        .await
    }

    pub async fn stop_resize_pool(&self, pool_id: &str) -> AzureResult<()> {
        self.execute_empty(
            Method::POST,
            self.operation_url(&format!("{}/stopresize", pool_path(pool_id))),
            None,
            "stop_resize_pool",
        )
        .await
    }

    pub async fn remove_nodes(
        &self,
        pool_id: &str,
        parameters: NodeRemoveParameters,
    ) -> AzureResult<()> {
        let body = serde_json::to_value(parameters)?;
        self.execute_empty(
            Method::POST,
            self.operation_url(&format!("{}/removenodes", pool_path(pool_id))),
            Some(body),
            "remove_nodes",
        )
        .await
    }

    // Compute nodes

    pub async fn get_node(&self, pool_id: &str, node_id: &str) -> AzureResult<ComputeNode> {
        self.execute_json(
            Method::GET,
            self.operation_url(&node_path(pool_id, node_id)),
            None,
            "get_node",
            "compute node",
        )
        .await
    }

    pub async fn reboot_node(&self, pool_id: &str, node_id: &str) -> AzureResult<()> {
        self.node_action(pool_id, node_id, "reboot", "reboot_node")
            .await
    }

    pub async fn reimage_node(&self, pool_id: &str, node_id: &str) -> AzureResult<()> {
        self.node_action(pool_id, node_id, "reimage", "reimage_node")
            .await
    }

    pub async fn start_node(&self, pool_id: &str, node_id: &str) -> AzureResult<()> {
        self.node_action(pool_id, node_id, "start", "start_node")
            .await
    }

    pub async fn deallocate_node(&self, pool_id: &str, node_id: &str) -> AzureResult<()> {
        self.node_action(pool_id, node_id, "deallocate", "deallocate_node")
            .await
    }

    async fn node_action(
        &self,
        pool_id: &str,
        node_id: &str,
        action: &str,
        operation: &'static str,
    ) -> AzureResult<()> {
        self.execute_empty(
            Method::POST,
            self.operation_url(&format!("{}/{}", node_path(pool_id, node_id), action)),
            None,
            operation,
        )
        .await
    }

    // Certificates

    pub async fn get_certificate(
        &self,
        thumbprint_algorithm: &str,
        thumbprint: &str,
    ) -> AzureResult<Certificate> {
        self.execute_json(
            Method::GET,
            self.operation_url(&certificate_path(thumbprint_algorithm, thumbprint)),
            None,
            "get_certificate",
            "certificate",
        )
        .await
    }

    pub async fn delete_certificate(
        &self,
        thumbprint_algorithm: &str,
        thumbprint: &str,
    ) -> AzureResult<()> {
        self.execute_empty(
            Method::DELETE,
            self.operation_url(&certificate_path(thumbprint_algorithm, thumbprint)),
            None,
            "delete_certificate",
        )
        .await
    }

    // Tasks

    pub async fn add_task(&self, job_id: &str, task: TaskCreateParameters) -> AzureResult<()> {
        let body = serde_json::to_value(task)?;
        self.execute_empty(
            Method::POST,
            self.operation_url(&format!("{}/tasks", job_path(job_id))),
            Some(body),
            "add_task",
        )
        .await
    }

    /// Submits up to 100 tasks in one request. No retry wrapper here: the
    /// bulk workflow owns requeue and chunk-splitting decisions, and a blind
    /// replay could double-submit tasks the service already accepted.
    pub async fn add_task_collection(
        &self,
        job_id: &str,
        tasks: &[TaskCreateParameters],
    ) -> AzureResult<TaskAddCollectionResult> {
        let operation = "add_task_collection";
        let url = self.operation_url(&format!("{}/addtaskcollection", job_path(job_id)));
        let body = serde_json::to_value(TaskAddCollectionParameters { value: tasks })?;
        let response = self.send(Method::POST, &url, Some(&body)).await?;
        if !response.status().is_success() {
            return Err(AzureError::from_azure_response(response, operation).await);
        }
        parse_json(response, "task add collection result").await
    }

    pub async fn list_tasks(&self, job_id: &str) -> AzureResult<Pager<BatchTask>> {
        let url = self.operation_url(&format!("{}/tasks", job_path(job_id)));
        let token = self.bearer_token().await?;
        Ok(Pager::new(
            self.http_client.clone(),
            token,
            url,
            "list_tasks",
            PageFlavor::ODataNextLink,
        ))
    }

    /// Whether an error is the service saying the resource no longer exists.
    /// The pollers lean on this to tell "gone because the delete finished"
    /// apart from other failures.
    pub(crate) fn is_not_found(err: &AzureError) -> bool {
        matches!(err, AzureError::ResourceNotFound(_)) || err.status_code() == Some(404)
    }
}

fn job_path(job_id: &str) -> String {
    format!("jobs/{}", urlencoding::encode(job_id))
}

fn schedule_path(schedule_id: &str) -> String {
    format!("jobschedules/{}", urlencoding::encode(schedule_id))
}

fn pool_path(pool_id: &str) -> String {
    format!("pools/{}", urlencoding::encode(pool_id))
}

fn node_path(pool_id: &str, node_id: &str) -> String {
    format!("{}/nodes/{}", pool_path(pool_id), urlencoding::encode(node_id))
}

// Certificates are addressed by a parenthesized key pair rather than a
// path segment.
fn certificate_path(thumbprint_algorithm: &str, thumbprint: &str) -> String {
    format!(
        "certificates(thumbprintAlgorithm={},thumbprint={})",
        urlencoding::encode(thumbprint_algorithm),
        urlencoding::encode(thumbprint)
    )
}
