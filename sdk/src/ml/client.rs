use crate::auth::TokenCredential;
use crate::common::errors::{AzureError, AzureResult, HttpError, not_found};
use crate::common::http::{ClientOptions, build_http_client, client_request_id, parse_json};
use crate::common::lro::{LroStatus, Poller, StatusMonitor};
use crate::common::paging::{PageFlavor, Pager};
use crate::common::retry::RetryPolicy;
use async_trait::async_trait;
use reqwest::Method;
use reqwest::header::AUTHORIZATION;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;

use super::entities::{
    CommandJob, CommandJobProperties, Datastore, DatastoreProperties, JobStatus, ModelVersion,
    ModelVersionProperties,
};

const AZURE_MANAGEMENT_URL: &str = "https://management.azure.com";
const ARM_SCOPE: &str = "https://management.azure.com/.default";
const API_VERSION: &str = "2023-04-01";

/// Addresses one Azure ML workspace inside a subscription and resource
/// group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceScope {
    pub subscription_id: String,
    pub resource_group: String,
    pub workspace: String,
}

impl WorkspaceScope {
    pub fn new(
        subscription_id: impl Into<String>,
        resource_group: impl Into<String>,
        workspace: impl Into<String>,
    ) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            resource_group: resource_group.into(),
            workspace: workspace.into(),
        }
    }

    /// Parses an ARM resource ID of the form
    /// `/subscriptions/{id}/resourceGroups/{rg}/providers/Microsoft.MachineLearningServices/workspaces/{ws}`.
    pub fn from_resource_id(resource_id: &str) -> AzureResult<Self> {
        let parts: Vec<&str> = resource_id.split('/').collect();

        if parts.len() < 9 {
            return Err(AzureError::ConfigurationError(
                "Invalid resource ID format".to_string(),
            ));
        }

        Ok(Self::new(parts[2], parts[4], parts[8]))
    }

    fn base_url(&self) -> String {
        format!(
            "{}/subscriptions/{}/resourceGroups/{}/providers/Microsoft.MachineLearningServices/workspaces/{}",
            AZURE_MANAGEMENT_URL, self.subscription_id, self.resource_group, self.workspace
        )
    }
}

#[derive(Serialize)]
struct PropertiesEnvelope<T> {
    properties: T,
}

/// ARM client for Azure ML workspace entities: datastores, model versions,
/// and command jobs.
#[derive(Clone)]
pub struct MlClient {
    http_client: reqwest::Client,
    credential: Arc<dyn TokenCredential>,
    retry: RetryPolicy,
}

impl MlClient {
    pub fn new(credential: Arc<dyn TokenCredential>) -> AzureResult<Self> {
        Self::with_options(credential, ClientOptions::default())
    }

    pub fn with_options(
        credential: Arc<dyn TokenCredential>,
        options: ClientOptions,
    ) -> AzureResult<Self> {
        Ok(Self {
            http_client: build_http_client(options.timeout_secs)?,
            credential,
            retry: options.retry,
        })
    }

    async fn bearer_token(&self) -> AzureResult<String> {
        Ok(self.credential.get_token(ARM_SCOPE).await?.token)
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

    async fn execute_empty(
        &self,
        method: Method,
        url: String,
        operation: &'static str,
    ) -> AzureResult<()> {
        let url_ref = url.as_str();
        self.retry
            .run(operation, || {
                let method = method.clone();
                async move {
                    let response = self.send(method, url_ref, None).await?;
                    if !response.status().is_success() {
                        return Err(AzureError::from_azure_response(response, operation).await);
                    }
                    Ok(())
                }
            })
            .await
    }

    async fn collect_paged<T: DeserializeOwned>(
        &self,
        url: String,
        operation: &'static str,
    ) -> AzureResult<Vec<T>> {
        let token = self.bearer_token().await?;
        Pager::new(
            self.http_client.clone(),
            token,
            url,
            operation,
            PageFlavor::NextLink,
        )
        .collect()
        .await
    }

    // Datastores

    pub async fn list_datastores(&self, scope: &WorkspaceScope) -> AzureResult<Vec<Datastore>> {
        self.collect_paged(collection_url(scope, "datastores"), "list_datastores")
            .await
    }

    pub async fn get_datastore(
        &self,
        scope: &WorkspaceScope,
        name: &str,
    ) -> AzureResult<Datastore> {
        self.execute_json(
            Method::GET,
            entity_url(scope, "datastores", name),
            None,
            "get_datastore",
            "datastore",
        )
        .await
        .map_err(not_found("datastore", name))
    }

    pub async fn create_or_update_datastore(
        &self,
        scope: &WorkspaceScope,
        name: &str,
        properties: DatastoreProperties,
    ) -> AzureResult<Datastore> {
        let body = serde_json::to_value(PropertiesEnvelope { properties })?;
        self.execute_json(
            Method::PUT,
            entity_url(scope, "datastores", name),
            Some(body),
            "create_or_update_datastore",
            "datastore",
        )
        .await
    }

    pub async fn delete_datastore(&self, scope: &WorkspaceScope, name: &str) -> AzureResult<()> {
        self.execute_empty(
            Method::DELETE,
            entity_url(scope, "datastores", name),
            "delete_datastore",
        )
        .await
    }

    // Model versions

    pub async fn list_model_versions(
        &self,
        scope: &WorkspaceScope,
        model_name: &str,
    ) -> AzureResult<Vec<ModelVersion>> {
        let url = format!(
            "{}/models/{}/versions?api-version={}",
            scope.base_url(),
            urlencoding::encode(model_name),
            API_VERSION
        );
        self.collect_paged(url, "list_model_versions").await
    }

    pub async fn get_model_version(
        &self,
        scope: &WorkspaceScope,
        model_name: &str,
        version: &str,
    ) -> AzureResult<ModelVersion> {
        self.execute_json(
            Method::GET,
            model_version_url(scope, model_name, version),
            None,
            "get_model_version",
            "model version",
        )
        .await
        .map_err(not_found("model version", version))
    }

    pub async fn create_or_update_model_version(
        &self,
        scope: &WorkspaceScope,
        model_name: &str,
        version: &str,
        properties: ModelVersionProperties,
    ) -> AzureResult<ModelVersion> {
        let body = serde_json::to_value(PropertiesEnvelope { properties })?;
        self.execute_json(
            Method::PUT,
            model_version_url(scope, model_name, version),
            Some(body),
            "create_or_update_model_version",
            "model version",
        )
        .await
    }

    pub async fn delete_model_version(
        &self,
        scope: &WorkspaceScope,
        model_name: &str,
        version: &str,
    ) -> AzureResult<()> {
        self.execute_empty(
            Method::DELETE,
            model_version_url(scope, model_name, version),
            "delete_model_version",
        )
        .await
    }

    // Jobs

    pub async fn list_jobs(&self, scope: &WorkspaceScope) -> AzureResult<Vec<CommandJob>> {
        self.collect_paged(collection_url(scope, "jobs"), "list_jobs")
            .await
    }

    pub async fn get_job(&self, scope: &WorkspaceScope, name: &str) -> AzureResult<CommandJob> {
        self.execute_json(
            Method::GET,
            entity_url(scope, "jobs", name),
            None,
            "get_job",
            "job",
        )
        .await
        .map_err(not_found("job", name))
    }

    pub async fn create_or_update_job(
        &self,
        scope: &WorkspaceScope,
        name: &str,
        properties: CommandJobProperties,
    ) -> AzureResult<CommandJob> {
        let body = serde_json::to_value(PropertiesEnvelope { properties })?;
        self.execute_json(
            Method::PUT,
            entity_url(scope, "jobs", name),
            Some(body),
            "create_or_update_job",
            "job",
        )
        .await
    }

    pub async fn delete_job(&self, scope: &WorkspaceScope, name: &str) -> AzureResult<()> {
        self.execute_empty(
            Method::DELETE,
            entity_url(scope, "jobs", name),
            "delete_job",
        )
        .await
    }

    pub async fn cancel_job(&self, scope: &WorkspaceScope, name: &str) -> AzureResult<()> {
        let url = format!(
            "{}/jobs/{}/cancel?api-version={}",
            scope.base_url(),
            urlencoding::encode(name),
            API_VERSION
        );
        self.execute_empty(Method::POST, url, "cancel_job").await
    }

    /// Poller tracking a submitted job to a terminal status.
    pub fn job_poller(&self, scope: &WorkspaceScope, name: &str) -> Poller {
        Poller::new(
            Box::new(JobStatusMonitor {
                client: self.clone(),
                scope: scope.clone(),
                job_name: name.to_string(),
            }),
            "run_job",
        )
    }

    /// Submits a job and returns a poller that completes when the run does.
    pub async fn begin_create_or_update_job(
        &self,
        scope: &WorkspaceScope,
        name: &str,
        properties: CommandJobProperties,
    ) -> AzureResult<Poller> {
        self.create_or_update_job(scope, name, properties).await?;
        Ok(self.job_poller(scope, name))
    }
}

fn collection_url(scope: &WorkspaceScope, collection: &str) -> String {
    format!(
        "{}/{}?api-version={}",
        scope.base_url(),
        collection,
        API_VERSION
    )
}

fn entity_url(scope: &WorkspaceScope, collection: &str, name: &str) -> String {
    format!(
        "{}/{}/{}?api-version={}",
        scope.base_url(),
        collection,
        urlencoding::encode(name),
        API_VERSION
    )
}

fn model_version_url(scope: &WorkspaceScope, model_name: &str, version: &str) -> String {
    format!(
        "{}/models/{}/versions/{}?api-version={}",
        scope.base_url(),
        urlencoding::encode(model_name),
        urlencoding::encode(version),
        API_VERSION
    )
}

/// A run is "done" from the poller's view only on Completed; Failed and
/// Canceled both end the wait with an error.
fn job_lro_status(status: Option<JobStatus>) -> LroStatus {
    match status {
        Some(JobStatus::Completed) => LroStatus::Succeeded,
        Some(status) if status.is_terminal() => LroStatus::Failed,
        _ => LroStatus::InProgress,
    }
}

struct JobStatusMonitor {
    client: MlClient,
    scope: WorkspaceScope,
    job_name: String,
}

#[async_trait]
impl StatusMonitor for JobStatusMonitor {
    async fn update_status(&self) -> AzureResult<LroStatus> {
        let job = self.client.get_job(&self.scope, &self.job_name).await?;
        Ok(job_lro_status(job.properties.status))
    }
}
