use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use stratus::checkpoint::{
    Checkpoint, CheckpointStore, Ownership, TableCheckpointStore, TableEntity, TableOps,
};
use stratus::common::errors::{AzureError, AzureResult};

const NAMESPACE: &str = "ns.servicebus.windows.net";
const EVENTHUB: &str = "telemetry";
const CONSUMER_GROUP: &str = "$Default";

mod store_helpers {
    use super::*;

    pub fn new_store(table_exists: bool) -> TableCheckpointStore {
        TableCheckpointStore::with_table(Arc::new(InMemoryTable::new(table_exists)))
    }

    pub fn ownership(partition_id: &str, owner_id: &str, etag: Option<String>) -> Ownership {
        Ownership {
            fully_qualified_namespace: NAMESPACE.to_string(),
            eventhub_name: EVENTHUB.to_string(),
            consumer_group: CONSUMER_GROUP.to_string(),
            partition_id: partition_id.to_string(),
            owner_id: owner_id.to_string(),
            last_modified_time: None,
            etag,
        }
    }

    pub fn checkpoint(
        partition_id: &str,
        offset: Option<&str>,
        sequence_number: Option<i64>,
    ) -> Checkpoint {
        Checkpoint {
            fully_qualified_namespace: NAMESPACE.to_string(),
            eventhub_name: EVENTHUB.to_string(),
            consumer_group: CONSUMER_GROUP.to_string(),
            partition_id: partition_id.to_string(),
            offset: offset.map(str::to_string),
            sequence_number,
        }
    }
}

use store_helpers::*;

struct StoredRow {
    entity: TableEntity,
    etag: String,
}

/// Storage table double with the same concurrency contract as the real
/// service: inserts fail with 409 on existing rows, conditional updates
/// fail with 412 on etag mismatch, and everything 404s until the table
/// has been created.
struct InMemoryTable {
    rows: StdMutex<HashMap<(String, String), StoredRow>>,
    table_exists: StdMutex<bool>,
    etag_counter: AtomicU64,
}

impl InMemoryTable {
    fn new(table_exists: bool) -> Self {
        Self {
            rows: StdMutex::new(HashMap::new()),
            table_exists: StdMutex::new(table_exists),
            etag_counter: AtomicU64::new(0),
        }
    }

    fn next_etag(&self) -> String {
        let n = self.etag_counter.fetch_add(1, Ordering::SeqCst) + 1;
        format!("W/\"{n}\"")
    }

    fn entity_keys(entity: &TableEntity) -> (String, String) {
        (
            entity["PartitionKey"].as_str().unwrap().to_string(),
            entity["RowKey"].as_str().unwrap().to_string(),
        )
    }

    fn partition_from_filter(filter: &str) -> String {
        filter
            .strip_prefix("PartitionKey eq '")
            .and_then(|rest| rest.strip_suffix('\''))
            .unwrap_or_default()
            .replace("''", "'")
    }
}

#[async_trait]
impl TableOps for InMemoryTable {
    async fn create_table(&self) -> AzureResult<()> {
        *self.table_exists.lock().unwrap() = true;
        Ok(())
    }

    async fn insert_entity(&self, entity: &TableEntity) -> AzureResult<String> {
        if !*self.table_exists.lock().unwrap() {
            return Err(AzureError::api_error(
                "insert_entity",
                "TableNotFound",
                404,
                "The table specified does not exist.",
            ));
        }
        let mut rows = self.rows.lock().unwrap();
        let key = Self::entity_keys(entity);
        if rows.contains_key(&key) {
            return Err(AzureError::api_error(
                "insert_entity",
                "EntityAlreadyExists",
                409,
                "The specified entity already exists.",
            ));
        }
        let etag = self.next_etag();
        rows.insert(
            key,
            StoredRow {
                entity: entity.clone(),
                etag: etag.clone(),
            },
        );
        Ok(etag)
    }

    async fn update_entity(
        &self,
        partition_key: &str,
        row_key: &str,
        entity: &TableEntity,
        if_match: &str,
    ) -> AzureResult<String> {
        let mut rows = self.rows.lock().unwrap();
        let key = (partition_key.to_string(), row_key.to_string());
        let row = rows.get_mut(&key).ok_or_else(|| {
            AzureError::api_error(
                "update_entity",
                "ResourceNotFound",
                404,
                "The specified resource does not exist.",
            )
        })?;
        if if_match != "*" && if_match != row.etag {
            return Err(AzureError::api_error(
                "update_entity",
                "UpdateConditionNotSatisfied",
                412,
                "The update condition specified in the request was not satisfied.",
            ));
        }
        row.entity = entity.clone();
        row.etag = self.next_etag();
        Ok(row.etag.clone())
    }

    async fn merge_entity(
        &self,
        partition_key: &str,
        row_key: &str,
        entity: &TableEntity,
        if_match: &str,
    ) -> AzureResult<String> {
        if !*self.table_exists.lock().unwrap() {
            return Err(AzureError::api_error(
                "merge_entity",
                "TableNotFound",
                404,
                "The table specified does not exist.",
            ));
        }
        let mut rows = self.rows.lock().unwrap();
        let key = (partition_key.to_string(), row_key.to_string());
        let row = rows.get_mut(&key).ok_or_else(|| {
            AzureError::api_error(
                "merge_entity",
                "ResourceNotFound",
                404,
                "The specified resource does not exist.",
            )
        })?;
        if if_match != "*" && if_match != row.etag {
            return Err(AzureError::api_error(
                "merge_entity",
                "UpdateConditionNotSatisfied",
                412,
                "The update condition specified in the request was not satisfied.",
            ));
        }
        for (name, value) in entity {
            row.entity.insert(name.clone(), value.clone());
        }
        row.etag = self.next_etag();
        Ok(row.etag.clone())
    }

    async fn delete_entity(
        &self,
        partition_key: &str,
        row_key: &str,
        _if_match: &str,
    ) -> AzureResult<()> {
        let mut rows = self.rows.lock().unwrap();
        let key = (partition_key.to_string(), row_key.to_string());
        rows.remove(&key).map(|_| ()).ok_or_else(|| {
            AzureError::api_error(
                "delete_entity",
                "ResourceNotFound",
                404,
                "The specified resource does not exist.",
            )
        })
    }

    async fn query_entities(&self, filter: &str) -> AzureResult<Vec<TableEntity>> {
        let wanted = Self::partition_from_filter(filter);
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .values()
            .filter(|row| row.entity["PartitionKey"].as_str() == Some(wanted.as_str()))
            .map(|row| {
                let mut entity = row.entity.clone();
                entity.insert("odata.etag".to_string(), row.etag.clone().into());
                entity.insert("Timestamp".to_string(), Utc::now().to_rfc3339().into());
                entity
            })
            .collect())
    }
}

#[cfg(test)]
mod claim_arbitration_tests {
    use super::*;

    #[tokio::test]
    async fn test_a_fresh_claim_inserts_and_returns_a_live_etag() {
        let store = new_store(true);

        let claimed = store
            .claim_ownership(vec![ownership("0", "processor-a", None)])
            .await
            .unwrap();

        assert_eq!(claimed.len(), 1);
        assert!(claimed[0].etag.as_deref().is_some_and(|e| !e.is_empty()));
        assert!(claimed[0].last_modified_time.is_some());

        let listed = store
            .list_ownership(NAMESPACE, EVENTHUB, CONSUMER_GROUP)
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].owner_id, "processor-a");
    }

    #[tokio::test]
    async fn test_losing_a_fresh_claim_to_another_owner_is_silent() {
        let store = new_store(true);
        store
            .claim_ownership(vec![ownership("0", "processor-a", None)])
            .await
            .unwrap();

        let contested = store
            .claim_ownership(vec![ownership("0", "processor-b", None)])
            .await
            .unwrap();

        assert!(contested.is_empty());
        let listed = store
            .list_ownership(NAMESPACE, EVENTHUB, CONSUMER_GROUP)
            .await
            .unwrap();
        assert_eq!(listed[0].owner_id, "processor-a");
    }

    #[tokio::test]
    async fn test_renewals_with_stale_etags_lose_the_partition() {
        let store = new_store(true);
        let first = store
            .claim_ownership(vec![ownership("0", "processor-a", None)])
            .await
            .unwrap();
        let original_etag = first[0].etag.clone();

        // processor-b reads the current state and takes the partition over.
        let listed = store
            .list_ownership(NAMESPACE, EVENTHUB, CONSUMER_GROUP)
            .await
            .unwrap();
        let mut takeover = listed[0].clone();
        takeover.owner_id = "processor-b".to_string();
        let won = store.claim_ownership(vec![takeover]).await.unwrap();
        assert_eq!(won.len(), 1);

        // processor-a renews with the etag from its original claim.
        let renewed = store
            .claim_ownership(vec![ownership("0", "processor-a", original_etag)])
            .await
            .unwrap();
        assert!(renewed.is_empty());

        let final_state = store
            .list_ownership(NAMESPACE, EVENTHUB, CONSUMER_GROUP)
            .await
            .unwrap();
        assert_eq!(final_state[0].owner_id, "processor-b");
    }

    #[tokio::test]
    async fn test_a_claim_batch_reports_only_the_partitions_won() {
        let store = new_store(true);
        store
            .claim_ownership(vec![ownership("1", "processor-b", None)])
            .await
            .unwrap();

        let claimed = store
            .claim_ownership(vec![
                ownership("0", "processor-a", None),
                ownership("1", "processor-a", None),
            ])
            .await
            .unwrap();

        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].partition_id, "0");
    }

    #[tokio::test]
    async fn test_concurrent_claimants_never_double_own_a_partition() {
        let table = Arc::new(InMemoryTable::new(true));
        let store_a = TableCheckpointStore::with_table(table.clone());
        let store_b = TableCheckpointStore::with_table(table);

        let partitions = ["0", "1", "2", "3"];
        let a_claims: Vec<Ownership> = partitions
            .iter()
            .map(|&p| ownership(p, "processor-a", None))
            .collect();
        let b_claims: Vec<Ownership> = partitions
            .iter()
            .map(|&p| ownership(p, "processor-b", None))
            .collect();

        // Both processors race the same fresh insert per partition; the
        // 409 loser drops the partition silently.
        let (a_won, b_won) = futures::future::join(
            store_a.claim_ownership(a_claims),
            store_b.claim_ownership(b_claims),
        )
        .await;
        let a_won = a_won.unwrap();
        let b_won = b_won.unwrap();

        assert_eq!(a_won.len() + b_won.len(), partitions.len());
        for won in a_won.iter().chain(b_won.iter()) {
            assert!(won.etag.as_deref().is_some_and(|e| !e.is_empty()));
        }

        let final_state = store_a
            .list_ownership(NAMESPACE, EVENTHUB, CONSUMER_GROUP)
            .await
            .unwrap();
        assert_eq!(final_state.len(), partitions.len());
        for record in &final_state {
            let won_by_a = a_won.iter().any(|o| o.partition_id == record.partition_id);
            let won_by_b = b_won.iter().any(|o| o.partition_id == record.partition_id);
            assert!(won_by_a != won_by_b);
            let expected = if won_by_a { "processor-a" } else { "processor-b" };
            assert_eq!(record.owner_id, expected);
        }
    }
}

#[cfg(test)]
mod checkpoint_persistence_tests {
    use super::*;

    #[tokio::test]
    async fn test_the_first_checkpoint_creates_the_table_on_demand() {
        let store = new_store(false);

        store
            .update_checkpoint(checkpoint("3", Some("12345@100"), Some(10_000_000_000)))
            .await
            .unwrap();

        let listed = store
            .list_checkpoints(NAMESPACE, EVENTHUB, CONSUMER_GROUP)
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].offset.as_deref(), Some("12345@100"));
        assert_eq!(listed[0].sequence_number, Some(10_000_000_000));
    }

    #[tokio::test]
    async fn test_checkpoints_fall_back_to_insert_for_new_partitions() {
        let store = new_store(true);

        store
            .update_checkpoint(checkpoint("0", Some("500@7"), Some(7)))
            .await
            .unwrap();

        let listed = store
            .list_checkpoints(NAMESPACE, EVENTHUB, CONSUMER_GROUP)
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].partition_id, "0");
    }

    #[tokio::test]
    async fn test_checkpoint_updates_replace_the_previous_position() {
        let store = new_store(true);
        store
            .update_checkpoint(checkpoint("2", Some("100@1"), Some(5)))
            .await
            .unwrap();

        store
            .update_checkpoint(checkpoint("2", Some("200@2"), Some(6)))
            .await
            .unwrap();

        let listed = store
            .list_checkpoints(NAMESPACE, EVENTHUB, CONSUMER_GROUP)
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].offset.as_deref(), Some("200@2"));
        assert_eq!(listed[0].sequence_number, Some(6));
    }

    #[tokio::test]
    async fn test_checkpoints_without_position_fields_round_trip() {
        let store = new_store(true);

        store.update_checkpoint(checkpoint("4", None, None)).await.unwrap();

        let listed = store
            .list_checkpoints(NAMESPACE, EVENTHUB, CONSUMER_GROUP)
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].offset, None);
        assert_eq!(listed[0].sequence_number, None);
    }

    #[tokio::test]
    async fn test_ownership_and_checkpoint_rows_never_collide() {
        let store = new_store(true);
        store
            .claim_ownership(vec![ownership("0", "processor-a", None)])
            .await
            .unwrap();
        store
            .update_checkpoint(checkpoint("0", Some("900@3"), Some(3)))
            .await
            .unwrap();

        let ownerships = store
            .list_ownership(NAMESPACE, EVENTHUB, CONSUMER_GROUP)
            .await
            .unwrap();
        let checkpoints = store
            .list_checkpoints(NAMESPACE, EVENTHUB, CONSUMER_GROUP)
            .await
            .unwrap();
        assert_eq!(ownerships.len(), 1);
        assert_eq!(checkpoints.len(), 1);

        // A different consumer group shares the table but sees nothing.
        let other_group = store
            .list_checkpoints(NAMESPACE, EVENTHUB, "analytics")
            .await
            .unwrap();
        assert!(other_group.is_empty());
    }
}
