use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle states of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Active,
    Disabling,
    Disabled,
    Enabling,
    Terminating,
    Completed,
    Deleting,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchJob {
    pub id: String,
    #[serde(rename = "displayName", skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub state: JobState,
    #[serde(rename = "previousState", skip_serializing_if = "Option::is_none")]
    pub previous_state: Option<JobState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    #[serde(rename = "creationTime", skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobScheduleState {
    Active,
    Completed,
    Disabled,
    Terminating,
    Deleting,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchJobSchedule {
    pub id: String,
    pub state: JobScheduleState,
    #[serde(rename = "previousState", skip_serializing_if = "Option::is_none")]
    pub previous_state: Option<JobScheduleState>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolState {
    Active,
    Deleting,
}

/// Whether the pool's node count is settled or changing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AllocationState {
    Steady,
    Resizing,
    Stopping,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchPool {
    pub id: String,
    pub state: PoolState,
    #[serde(rename = "allocationState", skip_serializing_if = "Option::is_none")]
    pub allocation_state: Option<AllocationState>,
    #[serde(rename = "vmSize", skip_serializing_if = "Option::is_none")]
    pub vm_size: Option<String>,
    #[serde(
        rename = "currentDedicatedNodes",
        skip_serializing_if = "Option::is_none"
    )]
    pub current_dedicated_nodes: Option<i32>,
    #[serde(
        rename = "targetDedicatedNodes",
        skip_serializing_if = "Option::is_none"
    )]
    pub target_dedicated_nodes: Option<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeState {
    Idle,
    Rebooting,
    Reimaging,
    Running,
    Unusable,
    Creating,
    Starting,
    WaitingForStartTask,
    LeavingPool,
    Offline,
    Preempted,
    UpgradingOs,
    Deallocating,
    Deallocated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputeNode {
    pub id: String,
    pub state: NodeState,
    #[serde(
        rename = "stateTransitionTime",
        skip_serializing_if = "Option::is_none"
    )]
    pub state_transition_time: Option<DateTime<Utc>>,
    #[serde(rename = "ipAddress", skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CertificateState {
    Active,
    Deleting,
    DeleteFailed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Certificate {
    pub thumbprint: String,
    #[serde(rename = "thumbprintAlgorithm")]
    pub thumbprint_algorithm: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<CertificateState>,
}

/// How running tasks are handled when a job is disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisableJobOption {
    Requeue,
    Terminate,
    Wait,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobDisableParameters {
    #[serde(rename = "disableTasks")]
    pub disable_tasks: DisableJobOption,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct JobTerminateParameters {
    #[serde(rename = "terminateReason", skip_serializing_if = "Option::is_none")]
    pub terminate_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PoolResizeParameters {
    #[serde(
        rename = "targetDedicatedNodes",
        skip_serializing_if = "Option::is_none"
    )]
    pub target_dedicated_nodes: Option<i32>,
    #[serde(
        rename = "targetLowPriorityNodes",
        skip_serializing_if = "Option::is_none"
    )]
    pub target_low_priority_nodes: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeRemoveParameters {
    #[serde(rename = "nodeList")]
    pub node_list: Vec<String>,
    #[serde(
        rename = "nodeDeallocationOption",
        skip_serializing_if = "Option::is_none"
    )]
    pub node_deallocation_option: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Active,
    Preparing,
    Running,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchTask {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<TaskState>,
    #[serde(rename = "commandLine", skip_serializing_if = "Option::is_none")]
    pub command_line: Option<String>,
}

/// A task to create. `id` must be unique within the job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCreateParameters {
    pub id: String,
    #[serde(rename = "commandLine")]
    pub command_line: String,
    #[serde(rename = "displayName", skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl TaskCreateParameters {
    pub fn new(id: impl Into<String>, command_line: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            command_line: command_line.into(),
            display_name: None,
        }
    }
}

/// Disposition of one task within an add-collection response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskAddStatus {
    Success,
    ClientError,
    ServerError,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchErrorMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchErrorDetail {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<BatchErrorMessage>,
}

/// Per-task outcome of an add-collection request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskAddResult {
    pub status: TaskAddStatus,
    #[serde(rename = "taskId")]
    pub task_id: String,
    #[serde(rename = "eTag", skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<BatchErrorDetail>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskAddCollectionResult {
    pub value: Vec<TaskAddResult>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct TaskAddCollectionParameters<'a> {
    pub value: &'a [TaskCreateParameters],
}
