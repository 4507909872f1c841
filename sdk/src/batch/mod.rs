//! Batch account data plane: jobs, job schedules, pools, compute nodes,
//! certificates, long-running operation polling, and bulk task submission.

pub mod bulk;
pub mod client;
pub mod models;
pub mod poller;

pub use bulk::{
    AddTasksOptions, CreateTasksError, MAX_TASKS_PER_REQUEST, TaskSubmitter, TaskWorkflowManager,
};
pub use client::BatchClient;
pub use models::{
    AllocationState, BatchJob, BatchJobSchedule, BatchPool, BatchTask, Certificate, ComputeNode,
    DisableJobOption, JobState, NodeRemoveParameters, PoolResizeParameters,
    TaskAddCollectionResult, TaskAddResult, TaskAddStatus, TaskCreateParameters,
};
