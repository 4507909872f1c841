use crate::auth::TableCredential;
use crate::common::errors::AzureResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use std::sync::Arc;

use super::table::{TableClient, TableEntity, TableOps, escape_odata};

/// A processor's claim on one Event Hub partition.
#[derive(Debug, Clone, PartialEq)]
pub struct Ownership {
    pub fully_qualified_namespace: String,
    pub eventhub_name: String,
    pub consumer_group: String,
    pub partition_id: String,
    pub owner_id: String,
    pub last_modified_time: Option<DateTime<Utc>>,
    pub etag: Option<String>,
}

/// Read position in one partition, as the processor last recorded it.
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    pub fully_qualified_namespace: String,
    pub eventhub_name: String,
    pub consumer_group: String,
    pub partition_id: String,
    /// Opaque service-issued position marker.
    pub offset: Option<String>,
    pub sequence_number: Option<i64>,
}

/// Durable store for partition ownership and checkpoints, shared by all
/// processors of one consumer group.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn list_ownership(
        &self,
        fully_qualified_namespace: &str,
        eventhub_name: &str,
        consumer_group: &str,
    ) -> AzureResult<Vec<Ownership>>;

    /// Tries to claim the given partitions, returning only the claims that
    /// won. Losing a claim to another processor is not an error.
    async fn claim_ownership(&self, ownership_list: Vec<Ownership>)
    -> AzureResult<Vec<Ownership>>;

    async fn update_checkpoint(&self, checkpoint: Checkpoint) -> AzureResult<()>;

    async fn list_checkpoints(
        &self,
        fully_qualified_namespace: &str,
        eventhub_name: &str,
        consumer_group: &str,
    ) -> AzureResult<Vec<Checkpoint>>;
}

/// Checkpoint store backed by one Azure Storage table.
///
/// Rows are grouped with a partition key of
/// `"{namespace} {eventhub} {consumer_group} ownership"` (checkpoints use
/// the `checkpoint` suffix) and a row key of the partition id. Claim
/// arbitration rides on the table's optimistic concurrency: an insert
/// loses to HTTP 409, a conditional update loses to HTTP 412.
pub struct TableCheckpointStore {
    table: Arc<dyn TableOps>,
}

impl TableCheckpointStore {
    pub fn new(
        endpoint: &str,
        table_name: &str,
        credential: TableCredential,
    ) -> AzureResult<Self> {
        Ok(Self {
            table: Arc::new(TableClient::new(endpoint, table_name, credential)?),
        })
    }

    /// Builds the store over any table implementation.
    pub fn with_table(table: Arc<dyn TableOps>) -> Self {
        Self { table }
    }

    async fn claim_one(&self, mut ownership: Ownership) -> AzureResult<Option<Ownership>> {
        let entity = ownership_entity(&ownership);
        let current_etag = ownership.etag.as_deref().filter(|etag| !etag.is_empty());

        let outcome = match current_etag {
            None => self.table.insert_entity(&entity).await,
            Some(etag) => {
                self.table
                    .update_entity(
                        &ownership_partition_key(
                            &ownership.fully_qualified_namespace,
                            &ownership.eventhub_name,
                            &ownership.consumer_group,
                        ),
                        &ownership.partition_id,
                        &entity,
                        etag,
                    )
                    .await
            }
        };

        match outcome {
            Ok(new_etag) => {
                ownership.etag = Some(new_etag);
                ownership.last_modified_time = Some(Utc::now());
                Ok(Some(ownership))
            }
            // A fresh claim losing to 409 or a renewal losing to 412 means
            // another processor holds the partition now.
            Err(err)
                if (current_etag.is_none() && err.status_code() == Some(409))
                    || (current_etag.is_some() && err.status_code() == Some(412)) =>
            {
                log::info!(
                    "Partition {} is owned by another processor",
                    ownership.partition_id
                );
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}

#[async_trait]
impl CheckpointStore for TableCheckpointStore {
    async fn list_ownership(
        &self,
        fully_qualified_namespace: &str,
        eventhub_name: &str,
        consumer_group: &str,
    ) -> AzureResult<Vec<Ownership>> {
        let partition_key =
            ownership_partition_key(fully_qualified_namespace, eventhub_name, consumer_group);
        let filter = partition_key_filter(&partition_key);
        let entities = self.table.query_entities(&filter).await?;
        Ok(entities
            .iter()
            .filter_map(|entity| {
                ownership_from_entity(
                    fully_qualified_namespace,
                    eventhub_name,
                    consumer_group,
                    entity,
                )
            })
            .collect())
    }

    async fn claim_ownership(
        &self,
        ownership_list: Vec<Ownership>,
    ) -> AzureResult<Vec<Ownership>> {
        let mut claimed = Vec::with_capacity(ownership_list.len());
        for ownership in ownership_list {
            if let Some(won) = self.claim_one(ownership).await? {
                claimed.push(won);
            }
        }
        Ok(claimed)
    }

    async fn update_checkpoint(&self, checkpoint: Checkpoint) -> AzureResult<()> {
        let entity = checkpoint_entity(&checkpoint);
        let partition_key = checkpoint_partition_key(
            &checkpoint.fully_qualified_namespace,
            &checkpoint.eventhub_name,
            &checkpoint.consumer_group,
        );

        match self
            .table
            .merge_entity(&partition_key, &checkpoint.partition_id, &entity, "*")
            .await
        {
            Ok(_) => Ok(()),
            Err(err) if err.error_code() == Some("TableNotFound") => {
                log::debug!("Checkpoint table does not exist yet, creating it");
                self.table.create_table().await?;
                self.table.insert_entity(&entity).await?;
                Ok(())
            }
            Err(err) if err.status_code() == Some(404) => {
                // First checkpoint for this partition.
                self.table.insert_entity(&entity).await?;
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    async fn list_checkpoints(
        &self,
        fully_qualified_namespace: &str,
        eventhub_name: &str,
        consumer_group: &str,
    ) -> AzureResult<Vec<Checkpoint>> {
        let partition_key =
            checkpoint_partition_key(fully_qualified_namespace, eventhub_name, consumer_group);
        let filter = partition_key_filter(&partition_key);
        let entities = self.table.query_entities(&filter).await?;
        Ok(entities
            .iter()
            .filter_map(|entity| {
                checkpoint_from_entity(
                    fully_qualified_namespace,
                    eventhub_name,
                    consumer_group,
                    entity,
                )
            })
            .collect())
    }
}

fn ownership_partition_key(
    fully_qualified_namespace: &str,
    eventhub_name: &str,
    consumer_group: &str,
) -> String {
    format!("{fully_qualified_namespace} {eventhub_name} {consumer_group} ownership")
}

fn checkpoint_partition_key(
    fully_qualified_namespace: &str,
    eventhub_name: &str,
    consumer_group: &str,
) -> String {
    format!("{fully_qualified_namespace} {eventhub_name} {consumer_group} checkpoint")
}

fn partition_key_filter(partition_key: &str) -> String {
    format!("PartitionKey eq '{}'", escape_odata(partition_key))
}

fn ownership_entity(ownership: &Ownership) -> TableEntity {
    let mut entity = TableEntity::new();
    entity.insert(
        "PartitionKey".to_string(),
        json!(ownership_partition_key(
            &ownership.fully_qualified_namespace,
            &ownership.eventhub_name,
            &ownership.consumer_group,
        )),
    );
    entity.insert("RowKey".to_string(), json!(ownership.partition_id));
    entity.insert("ownerid".to_string(), json!(ownership.owner_id));
    entity
}

fn checkpoint_entity(checkpoint: &Checkpoint) -> TableEntity {
    let mut entity = TableEntity::new();
    entity.insert(
        "PartitionKey".to_string(),
        json!(checkpoint_partition_key(
            &checkpoint.fully_qualified_namespace,
            &checkpoint.eventhub_name,
            &checkpoint.consumer_group,
        )),
    );
    entity.insert("RowKey".to_string(), json!(checkpoint.partition_id));
    if let Some(offset) = &checkpoint.offset {
        entity.insert("offset".to_string(), json!(offset));
    }
    if let Some(sequence_number) = checkpoint.sequence_number {
        // Sent as an annotated string so values past 2^31 survive the
        // service's default Int32 typing.
        entity.insert(
            "sequencenumber".to_string(),
            json!(sequence_number.to_string()),
        );
        entity.insert(
            "sequencenumber@odata.type".to_string(),
            json!("Edm.Int64"),
        );
    }
    entity
}

fn ownership_from_entity(
    fully_qualified_namespace: &str,
    eventhub_name: &str,
    consumer_group: &str,
    entity: &TableEntity,
) -> Option<Ownership> {
    Some(Ownership {
        fully_qualified_namespace: fully_qualified_namespace.to_string(),
        eventhub_name: eventhub_name.to_string(),
        consumer_group: consumer_group.to_string(),
        partition_id: entity.get("RowKey")?.as_str()?.to_string(),
        owner_id: entity
            .get("ownerid")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        last_modified_time: entity
            .get("Timestamp")
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc)),
        etag: entity
            .get("odata.etag")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

fn checkpoint_from_entity(
    fully_qualified_namespace: &str,
    eventhub_name: &str,
    consumer_group: &str,
    entity: &TableEntity,
) -> Option<Checkpoint> {
    Some(Checkpoint {
        fully_qualified_namespace: fully_qualified_namespace.to_string(),
        eventhub_name: eventhub_name.to_string(),
        consumer_group: consumer_group.to_string(),
        partition_id: entity.get("RowKey")?.as_str()?.to_string(),
        offset: entity
            .get("offset")
            .and_then(Value::as_str)
            .map(str::to_string),
        sequence_number: entity.get("sequencenumber").and_then(int64_value),
    })
}

// Int64 properties round-trip as annotated strings; small values may come
// back as plain JSON numbers.
fn int64_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
