//! Event Hub checkpoint store over Azure Table storage: partition
//! ownership arbitration and checkpoint persistence for processors sharing
//! a consumer group.

pub mod store;
pub mod table;

pub use store::{Checkpoint, CheckpointStore, Ownership, TableCheckpointStore};
pub use table::{TableClient, TableEntity, TableOps};
