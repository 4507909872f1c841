use super::errors::{AzureError, AzureResult};
use super::http::client_request_id;
use reqwest::header::AUTHORIZATION;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;

/// Management-plane list envelope: `{"value": [...], "nextLink": "..."}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResponse<T> {
    pub value: Vec<T>,
    #[serde(rename = "nextLink", skip_serializing_if = "Option::is_none", default)]
    pub next_link: Option<String>,
}

/// Batch data-plane list envelope: `{"value": [...], "odata.nextLink": "..."}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ODataListResponse<T> {
    pub value: Vec<T>,
    #[serde(
        rename = "odata.nextLink",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub next_link: Option<String>,
}

/// Which continuation field a paged endpoint uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageFlavor {
    /// `nextLink` (Azure Resource Manager, Key Vault)
    NextLink,
    /// `odata.nextLink` (Azure Batch)
    ODataNextLink,
}

/// Follows a paged Azure listing one continuation link at a time.
///
/// A page whose continuation link equals the page's own URL would loop
/// forever; the pager treats that as the end of the listing.
pub struct Pager<T> {
    http_client: reqwest::Client,
    bearer_token: String,
    next_url: Option<String>,
    operation: String,
    flavor: PageFlavor,
    _marker: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> Pager<T> {
    pub(crate) fn new(
        http_client: reqwest::Client,
        bearer_token: String,
        first_url: String,
        operation: impl Into<String>,
        flavor: PageFlavor,
    ) -> Self {
        Self {
            http_client,
            bearer_token,
            next_url: Some(first_url),
            operation: operation.into(),
            flavor,
            _marker: PhantomData,
        }
    }

    /// Fetch the next page, or `None` when the listing is exhausted.
    pub async fn next_page(&mut self) -> Option<AzureResult<Vec<T>>> {
        let url = self.next_url.take()?;
        Some(self.fetch_page(url).await)
    }

    /// Drain every remaining page into one vector.
    pub async fn collect(mut self) -> AzureResult<Vec<T>> {
        let mut items = Vec::new();
        while let Some(page) = self.next_page().await {
            items.extend(page?);
        }
        Ok(items)
    }

    /// Adapt the pager into a stream of pages.
    pub fn into_stream(self) -> impl futures_util::Stream<Item = AzureResult<Vec<T>>> {
        futures_util::stream::unfold(self, |mut pager| async move {
            match pager.next_page().await {
                Some(page) => Some((page, pager)),
                None => None,
            }
        })
    }

    async fn fetch_page(&mut self, url: String) -> AzureResult<Vec<T>> {
        let response = self
            .http_client
            .get(&url)
            .header(AUTHORIZATION, format!("Bearer {}", self.bearer_token))
            .header("x-ms-client-request-id", client_request_id())
            .send()
            .await
            .map_err(|e| AzureError::InternalError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AzureError::from_azure_response(response, self.operation.as_str()).await);
        }

        let body = response
            .text()
            .await
            .map_err(|e| AzureError::InternalError(e.to_string()))?;

        let (value, next_link) = match self.flavor {
            PageFlavor::NextLink => {
                let page: ListResponse<T> = serde_json::from_str(&body)?;
                (page.value, page.next_link)
            }
            PageFlavor::ODataNextLink => {
                let page: ODataListResponse<T> = serde_json::from_str(&body)?;
                (page.value, page.next_link)
            }
        };

        self.next_url = match next_link {
            Some(next) if next != url => Some(next),
            _ => None,
        };

        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Item {
        name: String,
    }

    #[test]
    fn deserializes_arm_envelope() {
        let body = r#"{"value":[{"name":"a"},{"name":"b"}],"nextLink":"https://example/next"}"#;
        let page: ListResponse<Item> = serde_json::from_str(body).unwrap();
        assert_eq!(page.value.len(), 2);
        assert_eq!(page.next_link.as_deref(), Some("https://example/next"));
    }

    #[test]
    fn deserializes_odata_envelope() {
        let body = r#"{"odata.nextLink":"https://acct.batch/jobs/j/tasks?$skiptoken=x","value":[{"name":"t1"}]}"#;
        let page: ODataListResponse<Item> = serde_json::from_str(body).unwrap();
        assert_eq!(page.value.len(), 1);
        assert!(page.next_link.as_deref().unwrap().contains("$skiptoken"));
    }

    #[test]
    fn missing_next_link_means_last_page() {
        let body = r#"{"value":[]}"#;
        let page: ListResponse<Item> = serde_json::from_str(body).unwrap();
        assert!(page.next_link.is_none());
    }
}
