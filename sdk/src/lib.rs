//! # Stratus SDK
//!
//! Client libraries for Azure REST services: typed request construction,
//! auth header injection, retries, pagination, and long-running-operation
//! polling over plain HTTP.
//!
//! ## Modules
//!
//! - [`auth`] - Token credentials, caching, and request signing
//! - [`batch`] - Azure Batch jobs, pools, nodes, and bulk task submission
//! - [`checkpoint`] - Event Hub checkpoint store over Table storage
//! - [`common`] - Errors, retry, pagination, rate limiting, and LRO polling
//! - [`keyvault`] - Key Vault secrets, keys, and message security (JOSE)
//! - [`ml`] - Azure ML workspace entities: datastores, models, jobs
//! - [`servicebus`] - Service Bus management plane and queue statistics

pub mod auth;
pub mod batch;
pub mod checkpoint;
pub mod common;
pub mod keyvault;
pub mod ml;
pub mod servicebus;

pub use common::{AzureError, AzureResult, ClientOptions, RetryPolicy};
