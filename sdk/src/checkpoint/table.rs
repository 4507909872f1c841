use crate::auth::TableCredential;
use crate::common::errors::{AzureError, AzureResult, HttpError};
use crate::common::http::{ClientOptions, build_http_client, client_request_id, parse_json};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{ACCEPT, AUTHORIZATION, ETAG};
use reqwest::{Method, StatusCode};
use serde::Deserialize;

const API_VERSION: &str = "2019-02-02";
const DATA_SERVICE_VERSION: &str = "3.0;NetFx";
const ACCEPT_NO_METADATA: &str = "application/json;odata=nometadata";
// Queries ask for minimal metadata so each entity carries its `odata.etag`.
const ACCEPT_MINIMAL_METADATA: &str = "application/json;odata=minimalmetadata";

/// One storage table row as raw JSON properties, `PartitionKey` and
/// `RowKey` included.
pub type TableEntity = serde_json::Map<String, serde_json::Value>;

/// Table operations the checkpoint store builds on. Split out as a trait so
/// arbitration logic can be tested against an in-memory table.
#[async_trait]
pub trait TableOps: Send + Sync {
    async fn create_table(&self) -> AzureResult<()>;

    /// Inserts a new entity, returning its etag. Fails with HTTP 409 if the
    /// entity already exists.
    async fn insert_entity(&self, entity: &TableEntity) -> AzureResult<String>;

    /// Replaces an existing entity, returning the new etag. Fails with
    /// HTTP 412 when `if_match` no longer matches and HTTP 404 when the
    /// entity is gone.
    async fn update_entity(
        &self,
        partition_key: &str,
        row_key: &str,
        entity: &TableEntity,
        if_match: &str,
    ) -> AzureResult<String>;

    /// Merges properties into an existing entity. `if_match` may be `*`.
    async fn merge_entity(
        &self,
        partition_key: &str,
        row_key: &str,
        entity: &TableEntity,
        if_match: &str,
    ) -> AzureResult<String>;

    async fn delete_entity(
        &self,
        partition_key: &str,
        row_key: &str,
        if_match: &str,
    ) -> AzureResult<()>;

    /// Runs an OData `$filter` query, following continuation headers until
    /// the result set is complete.
    async fn query_entities(&self, filter: &str) -> AzureResult<Vec<TableEntity>>;
}

/// Minimal client for one Azure Storage table.
#[derive(Clone)]
pub struct TableClient {
    endpoint: String,
    table_name: String,
    credential: TableCredential,
    http_client: reqwest::Client,
}

impl TableClient {
    pub fn new(
        endpoint: &str,
        table_name: &str,
        credential: TableCredential,
    ) -> AzureResult<Self> {
        Self::with_options(endpoint, table_name, credential, ClientOptions::default())
    }

    pub fn with_options(
        endpoint: &str,
        table_name: &str,
        credential: TableCredential,
        options: ClientOptions,
    ) -> AzureResult<Self> {
        if table_name.trim().is_empty() {
            return Err(AzureError::InvalidConfiguration(
                "Table name cannot be empty".to_string(),
            ));
        }
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            table_name: table_name.to_string(),
            credential,
            http_client: build_http_client(options.timeout_secs)?,
        })
    }

    /// Table endpoint of a storage account.
    pub fn account_endpoint(account: &str) -> String {
        format!("https://{account}.table.core.windows.net")
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    fn entity_path(&self, partition_key: &str, row_key: &str) -> String {
        format!(
            "{}(PartitionKey='{}',RowKey='{}')",
            self.table_name,
            encode_key(partition_key),
            encode_key(row_key)
        )
    }

    fn build_url(&self, path: &str, query: &[(String, String)]) -> String {
        let mut pairs: Vec<String> = query
            .iter()
            .map(|(name, value)| format!("{name}={}", urlencoding::encode(value)))
            .collect();
        if let TableCredential::Sas(sas) = &self.credential {
            pairs.push(sas.query().to_string());
        }
        if pairs.is_empty() {
            format!("{}/{}", self.endpoint, path)
        } else {
            format!("{}/{}?{}", self.endpoint, path, pairs.join("&"))
        }
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: Option<&serde_json::Value>,
        extra_headers: &[(&str, &str)],
        accept: &str,
    ) -> AzureResult<reqwest::Response> {
        let date = rfc1123_now();
        let url = self.build_url(path, query);

        let mut request = self
            .http_client
            .request(method, &url)
            .header("x-ms-date", &date)
            .header("x-ms-version", API_VERSION)
            .header("DataServiceVersion", DATA_SERVICE_VERSION)
            .header(ACCEPT, accept)
            .header("x-ms-client-request-id", client_request_id());

        if let TableCredential::SharedKey(key) = &self.credential {
            let canonicalized_resource = format!("/{}/{}", key.account_name(), path);
            request = request.header(AUTHORIZATION, key.sign_table_lite(&date, &canonicalized_resource)?);
        }
        for (name, value) in extra_headers {
            request = request.header(*name, *value);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        request.send().await.map_err(|e| {
            AzureError::from(HttpError::RequestFailed {
                url,
                reason: e.to_string(),
            })
        })
    }

    async fn write_entity(
        &self,
        method: Method,
        path: String,
        entity: &TableEntity,
        extra_headers: &[(&str, &str)],
        operation: &'static str,
    ) -> AzureResult<String> {
        let body = serde_json::Value::Object(entity.clone());
        let response = self
            .send(
                method,
                &path,
                &[],
                Some(&body),
                extra_headers,
                ACCEPT_NO_METADATA,
            )
            .await?;
        if !response.status().is_success() {
            return Err(AzureError::from_azure_response(response, operation).await);
        }
        Ok(etag_header(&response))
    }
}

#[async_trait]
impl TableOps for TableClient {
    async fn create_table(&self) -> AzureResult<()> {
        let body = serde_json::json!({ "TableName": self.table_name });
        let response = self
            .send(
                Method::POST,
                "Tables",
                &[],
                Some(&body),
                &[("Prefer", "return-no-content")],
                ACCEPT_NO_METADATA,
            )
            .await?;
        // An existing table serves just as well as a fresh one.
        if response.status() == StatusCode::CONFLICT {
            return Ok(());
        }
        if !response.status().is_success() {
            return Err(AzureError::from_azure_response(response, "create_table").await);
        }
        Ok(())
    }

    async fn insert_entity(&self, entity: &TableEntity) -> AzureResult<String> {
        self.write_entity(
            Method::POST,
            self.table_name.clone(),
            entity,
            &[("Prefer", "return-no-content")],
            "insert_entity",
        )
        .await
    }

    async fn update_entity(
        &self,
        partition_key: &str,
        row_key: &str,
        entity: &TableEntity,
        if_match: &str,
    ) -> AzureResult<String> {
        self.write_entity(
            Method::PUT,
            self.entity_path(partition_key, row_key),
            entity,
            &[("If-Match", if_match)],
            "update_entity",
        )
        .await
    }

    async fn merge_entity(
        &self,
        partition_key: &str,
        row_key: &str,
        entity: &TableEntity,
        if_match: &str,
    ) -> AzureResult<String> {
        self.write_entity(
            merge_method(),
            self.entity_path(partition_key, row_key),
            entity,
            &[("If-Match", if_match)],
            "merge_entity",
        )
        .await
    }

    async fn delete_entity(
        &self,
        partition_key: &str,
        row_key: &str,
        if_match: &str,
    ) -> AzureResult<()> {
        let path = self.entity_path(partition_key, row_key);
        let response = self
            .send(
                Method::DELETE,
                &path,
                &[],
                None,
                &[("If-Match", if_match)],
                ACCEPT_NO_METADATA,
            )
            .await?;
        if !response.status().is_success() {
            return Err(AzureError::from_azure_response(response, "delete_entity").await);
        }
        Ok(())
    }

    async fn query_entities(&self, filter: &str) -> AzureResult<Vec<TableEntity>> {
        let path = format!("{}()", self.table_name);
        let mut entities = Vec::new();
        let mut continuation: Option<(String, String)> = None;

        loop {
            let mut query = vec![("$filter".to_string(), filter.to_string())];
            if let Some((next_partition_key, next_row_key)) = &continuation {
                query.push(("NextPartitionKey".to_string(), next_partition_key.clone()));
                if !next_row_key.is_empty() {
                    query.push(("NextRowKey".to_string(), next_row_key.clone()));
                }
            }

            let response = self
                .send(
                    Method::GET,
                    &path,
                    &query,
                    None,
                    &[],
                    ACCEPT_MINIMAL_METADATA,
                )
                .await?;
            if !response.status().is_success() {
                return Err(AzureError::from_azure_response(response, "query_entities").await);
            }

            continuation = continuation_from(&response);
            let page: EntityPage = parse_json(response, "table entity page").await?;
            entities.extend(page.value);

            if continuation.is_none() {
                return Ok(entities);
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct EntityPage {
    value: Vec<TableEntity>,
}

/// Doubles single quotes per OData string-literal escaping.
pub(crate) fn escape_odata(value: &str) -> String {
    value.replace('\'', "''")
}

// Percent-encodes a key for an entity address. Embedded quotes are doubled
// and stay literal so the OData parser sees them as escapes.
fn encode_key(value: &str) -> String {
    value
        .split('\'')
        .map(|part| urlencoding::encode(part).into_owned())
        .collect::<Vec<_>>()
        .join("''")
}

fn merge_method() -> Method {
    // Not one of reqwest's predefined methods.
    Method::from_bytes(b"MERGE").expect("MERGE is a valid method token")
}

fn rfc1123_now() -> String {
    Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn etag_header(response: &reqwest::Response) -> String {
    response
        .headers()
        .get(ETAG)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn continuation_from(response: &reqwest::Response) -> Option<(String, String)> {
    let next_partition_key = response
        .headers()
        .get("x-ms-continuation-NextPartitionKey")
        .and_then(|v| v.to_str().ok())?
        .to_string();
    let next_row_key = response
        .headers()
        .get("x-ms-continuation-NextRowKey")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    Some((next_partition_key, next_row_key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{SasCredential, SharedKeyCredential};

    fn create_shared_key_client() -> TableClient {
        TableClient::new(
            &TableClient::account_endpoint("myaccount"),
            "checkpoints",
            TableCredential::SharedKey(SharedKeyCredential::new("myaccount", "a2V5")),
        )
        .unwrap()
    }

    #[test]
    fn entity_path_encodes_keys() {
        let client = create_shared_key_client();
        assert_eq!(
            client.entity_path("ns.servicebus.windows.net hub $Default ownership", "0"),
            "checkpoints(PartitionKey='ns.servicebus.windows.net%20hub%20%24Default%20ownership',RowKey='0')"
        );
    }

    #[test]
    fn entity_path_doubles_embedded_quotes() {
        let client = create_shared_key_client();
        assert_eq!(
            client.entity_path("it's", "1"),
            "checkpoints(PartitionKey='it''s',RowKey='1')"
        );
    }

    #[test]
    fn escape_odata_doubles_quotes() {
        assert_eq!(escape_odata("o'brien's"), "o''brien''s");
        assert_eq!(escape_odata("plain"), "plain");
    }

    #[test]
    fn sas_query_is_appended_to_urls() {
        let client = TableClient::new(
            "https://myaccount.table.core.windows.net",
            "checkpoints",
            TableCredential::Sas(SasCredential::new("?sv=2019-02-02&sig=abc")),
        )
        .unwrap();

        let url = client.build_url(
            "checkpoints()",
            &[("$filter".to_string(), "PartitionKey eq 'x'".to_string())],
        );
        assert_eq!(
            url,
            "https://myaccount.table.core.windows.net/checkpoints()?$filter=PartitionKey%20eq%20%27x%27&sv=2019-02-02&sig=abc"
        );
    }

    #[test]
    fn date_header_is_rfc1123() {
        let date = rfc1123_now();
        assert!(date.ends_with(" GMT"));
        assert!(chrono::DateTime::parse_from_rfc2822(&date).is_ok());
    }

    #[test]
    fn empty_table_name_is_rejected() {
        let result = TableClient::new(
            "https://myaccount.table.core.windows.net",
            " ",
            TableCredential::Sas(SasCredential::new("sv=2019-02-02")),
        );
        assert!(matches!(
            result,
            Err(AzureError::InvalidConfiguration(_))
        ));
    }
}
