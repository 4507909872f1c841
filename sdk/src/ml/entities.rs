use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// ARM resource envelope shared by every workspace entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource<T> {
    pub id: Option<String>,
    pub name: String,
    #[serde(rename = "type")]
    pub resource_type: Option<String>,
    pub properties: T,
}

pub type Datastore = Resource<DatastoreProperties>;
pub type ModelVersion = Resource<ModelVersionProperties>;
pub type CommandJob = Resource<CommandJobProperties>;

/// Kind of storage a datastore attaches to the workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatastoreType {
    AzureBlob,
    AzureFile,
    AzureDataLakeGen2,
}

/// Credential stanza of a datastore. Secrets are write-only on the service
/// side, so only the discriminator round-trips.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatastoreCredentials {
    #[serde(rename = "credentialsType")]
    pub credentials_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatastoreProperties {
    #[serde(rename = "datastoreType")]
    pub datastore_type: DatastoreType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials: Option<DatastoreCredentials>,
    #[serde(rename = "accountName", skip_serializing_if = "Option::is_none")]
    pub account_name: Option<String>,
    #[serde(rename = "containerName", skip_serializing_if = "Option::is_none")]
    pub container_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(rename = "isDefault", skip_serializing_if = "Option::is_none")]
    pub is_default: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub tags: HashMap<String, String>,
}

impl DatastoreProperties {
    /// Blob-container datastore with the service-managed credential stanza.
    pub fn azure_blob(account_name: impl Into<String>, container_name: impl Into<String>) -> Self {
        Self {
            datastore_type: DatastoreType::AzureBlob,
            credentials: Some(DatastoreCredentials {
                credentials_type: "None".to_string(),
            }),
            account_name: Some(account_name.into()),
            container_name: Some(container_name.into()),
            endpoint: None,
            protocol: None,
            is_default: None,
            description: None,
            tags: HashMap::new(),
        }
    }
}

/// One registered version of a model asset. `model_uri` points at the
/// artifact location, typically `azureml://datastores/{ds}/paths/{path}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelVersionProperties {
    #[serde(rename = "modelType", skip_serializing_if = "Option::is_none")]
    pub model_type: Option<String>,
    #[serde(rename = "modelUri", skip_serializing_if = "Option::is_none")]
    pub model_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub tags: HashMap<String, String>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub properties: HashMap<String, String>,
    #[serde(rename = "isAnonymous", skip_serializing_if = "Option::is_none")]
    pub is_anonymous: Option<bool>,
    #[serde(rename = "isArchived", skip_serializing_if = "Option::is_none")]
    pub is_archived: Option<bool>,
}

/// Lifecycle states of a job run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    NotStarted,
    Starting,
    Running,
    Completed,
    Failed,
    Canceled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Canceled
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobInput {
    #[serde(rename = "jobInputType")]
    pub job_input_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
}

impl JobInput {
    pub fn uri_file(uri: impl Into<String>) -> Self {
        Self {
            job_input_type: "uri_file".to_string(),
            uri: Some(uri.into()),
            value: None,
            mode: None,
        }
    }

    pub fn literal(value: impl Into<String>) -> Self {
        Self {
            job_input_type: "literal".to_string(),
            uri: None,
            value: Some(value.into()),
            mode: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobOutput {
    #[serde(rename = "jobOutputType")]
    pub job_output_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
}

impl JobOutput {
    pub fn uri_folder() -> Self {
        Self {
            job_output_type: "uri_folder".to_string(),
            uri: None,
            mode: None,
        }
    }
}

/// A command job: one shell command run against an environment on a
/// compute target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandJobProperties {
    #[serde(rename = "jobType")]
    pub job_type: String,
    pub command: String,
    #[serde(rename = "environmentId", skip_serializing_if = "Option::is_none")]
    pub environment_id: Option<String>,
    #[serde(rename = "computeId", skip_serializing_if = "Option::is_none")]
    pub compute_id: Option<String>,
    #[serde(rename = "experimentName", skip_serializing_if = "Option::is_none")]
    pub experiment_name: Option<String>,
    #[serde(rename = "displayName", skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub inputs: HashMap<String, JobInput>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub outputs: HashMap<String, JobOutput>,
    #[serde(
        rename = "environmentVariables",
        default,
        skip_serializing_if = "HashMap::is_empty"
    )]
    pub environment_variables: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub tags: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub properties: HashMap<String, String>,
}

impl CommandJobProperties {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            job_type: "Command".to_string(),
            command: command.into(),
            environment_id: None,
            compute_id: None,
            experiment_name: None,
            display_name: None,
            status: None,
            inputs: HashMap::new(),
            outputs: HashMap::new(),
            environment_variables: HashMap::new(),
            description: None,
            tags: HashMap::new(),
            properties: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_command_job_resource() {
        let body = r#"{
            "id": "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.MachineLearningServices/workspaces/ws/jobs/train-42",
            "name": "train-42",
            "type": "Microsoft.MachineLearningServices/workspaces/jobs",
            "properties": {
                "jobType": "Command",
                "command": "python train.py --epochs 10",
                "environmentId": "azureml:pytorch-env:3",
                "computeId": "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.MachineLearningServices/workspaces/ws/computes/gpu-cluster",
                "experimentName": "churn-model",
                "status": "Running",
                "inputs": {
                    "training_data": {"jobInputType": "uri_file", "uri": "azureml://datastores/workspaceblobstore/paths/data/train.csv"}
                },
                "outputs": {
                    "model_output": {"jobOutputType": "uri_folder"}
                },
                "tags": {"team": "forecasting"}
            }
        }"#;

        let job: CommandJob = serde_json::from_str(body).unwrap();
        assert_eq!(job.name, "train-42");
        assert_eq!(job.properties.command, "python train.py --epochs 10");
        assert_eq!(job.properties.status, Some(JobStatus::Running));
        assert_eq!(
            job.properties.inputs["training_data"].job_input_type,
            "uri_file"
        );
        assert_eq!(job.properties.tags["team"], "forecasting");
    }

    #[test]
    fn terminal_statuses() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Canceled.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(!JobStatus::NotStarted.is_terminal());
    }

    #[test]
    fn new_command_job_serializes_sparsely() {
        let mut properties = CommandJobProperties::new("python score.py");
        properties.experiment_name = Some("scoring".to_string());

        let value = serde_json::to_value(&properties).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.len(), 3);
        assert_eq!(object["jobType"], "Command");
        assert_eq!(object["command"], "python score.py");
        assert_eq!(object["experimentName"], "scoring");
    }

    #[test]
    fn parses_blob_datastore() {
        let body = r#"{
            "id": "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.MachineLearningServices/workspaces/ws/datastores/workspaceblobstore",
            "name": "workspaceblobstore",
            "type": "Microsoft.MachineLearningServices/workspaces/datastores",
            "properties": {
                "datastoreType": "AzureBlob",
                "credentials": {"credentialsType": "AccountKey"},
                "accountName": "mlstorageacct",
                "containerName": "azureml-blobstore",
                "endpoint": "core.windows.net",
                "protocol": "https",
                "isDefault": true
            }
        }"#;

        let datastore: Datastore = serde_json::from_str(body).unwrap();
        assert_eq!(datastore.properties.datastore_type, DatastoreType::AzureBlob);
        assert_eq!(
            datastore.properties.account_name.as_deref(),
            Some("mlstorageacct")
        );
        assert_eq!(datastore.properties.is_default, Some(true));
    }

    #[test]
    fn parses_model_version_with_asset_uri() {
        let body = r#"{
            "name": "3",
            "properties": {
                "modelType": "mlflow_model",
                "modelUri": "azureml://datastores/workspaceblobstore/paths/models/churn/3",
                "tags": {"stage": "production"}
            }
        }"#;

        let version: ModelVersion = serde_json::from_str(body).unwrap();
        assert_eq!(version.name, "3");
        assert_eq!(
            version.properties.model_uri.as_deref(),
            Some("azureml://datastores/workspaceblobstore/paths/models/churn/3")
        );
        assert_eq!(version.properties.tags["stage"], "production");
    }

    #[test]
    fn job_input_helpers_set_discriminators() {
        let file = JobInput::uri_file("azureml://datastores/ds/paths/a.csv");
        assert_eq!(file.job_input_type, "uri_file");
        assert!(file.value.is_none());

        let literal = JobInput::literal("10");
        assert_eq!(literal.job_input_type, "literal");
        assert_eq!(literal.value.as_deref(), Some("10"));
    }
}
