//! Azure ML workspace entities over ARM: datastores, versioned model
//! assets, and command jobs with run tracking.

pub mod client;
pub mod entities;

pub use client::{MlClient, WorkspaceScope};
pub use entities::{
    CommandJob, CommandJobProperties, Datastore, DatastoreCredentials, DatastoreProperties,
    DatastoreType, JobInput, JobOutput, JobStatus, ModelVersion, ModelVersionProperties, Resource,
};
