// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Transport layer for the search backend's bulk-indexing API.

use crate::errors::ShipError;
use crate::parse::Record;
use core::time::Duration;
use serde::Deserialize;
use serde_json::json;
use tracing::error;

/// Client for the backend `_bulk` endpoint. Cheap to clone; the underlying
/// connection pool is shared across all sends for the process lifetime.
#[derive(Clone)]
pub struct OpenSearchApi {
    endpoint: String,
    client: reqwest::Client,
}

/// Aggregate reply for one bulk request, one item per submitted operation.
#[derive(Debug, Default, Deserialize)]
pub struct BulkResponse {
    #[serde(default)]
    pub took: u64,
    #[serde(default)]
    pub errors: bool,
    #[serde(default)]
    pub items: Vec<BulkItem>,
}

#[derive(Debug, Deserialize)]
pub struct BulkItem {
    #[serde(rename = "index")]
    pub index: BulkOutcome,
}

/// Per-document outcome as reported by the backend.
#[derive(Debug, Deserialize)]
pub struct BulkOutcome {
    pub status: u16,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

impl OpenSearchApi {
    pub fn new(endpoint: String, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                error!(
                    "Unable to build backend HTTP client: {}, using defaults",
                    e
                );
                reqwest::Client::new()
            });

        OpenSearchApi {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Submits one batch to `<endpoint>/_bulk`, one index operation per
    /// document, all targeting `index`.
    pub async fn bulk(&self, index: &str, batch: &[Record]) -> Result<BulkResponse, ShipError> {
        let body = ndjson_body(index, batch)?;
        let url = format!("{}/_bulk", self.endpoint);

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/x-ndjson")
            .body(body)
            .send()
            .await
            .map_err(|e| ShipError::Destination {
                status: e.status(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ShipError::Destination {
                status: Some(status),
                message,
            });
        }

        response
            .json::<BulkResponse>()
            .await
            .map_err(|e| ShipError::Destination {
                status: Some(status),
                message: format!("undecodable bulk reply: {e}"),
            })
    }
}

// The bulk wire format: an action line naming the target index, then the
// document itself, newline-delimited.
fn ndjson_body(index: &str, batch: &[Record]) -> Result<String, ShipError> {
    let action = json!({ "index": { "_index": index } }).to_string();

    let mut body = String::new();
    for document in batch {
        let line =
            serde_json::to_string(document).map_err(|e| ShipError::Payload(e.to_string()))?;
        body.push_str(&action);
        body.push('\n');
        body.push_str(&line);
        body.push('\n');
    }
    Ok(body)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::parse::raw_record;
    use mockito::{Matcher, Server};

    #[test]
    fn test_ndjson_body_interleaves_actions_and_documents() {
        let batch = vec![raw_record("one"), raw_record("two")];
        let body = ndjson_body("web", &batch).unwrap();

        assert_eq!(
            body,
            "{\"index\":{\"_index\":\"web\"}}\n{\"raw\":\"one\"}\n\
             {\"index\":{\"_index\":\"web\"}}\n{\"raw\":\"two\"}\n"
        );
    }

    #[tokio::test]
    async fn test_bulk_posts_and_decodes_reply() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/_bulk")
            .match_header("content-type", "application/x-ndjson")
            .match_body(Matcher::Exact(
                "{\"index\":{\"_index\":\"web\"}}\n{\"raw\":\"hello\"}\n".to_string(),
            ))
            .with_status(200)
            .with_body(
                r#"{"took":7,"errors":false,"items":[{"index":{"status":201}}]}"#,
            )
            .create_async()
            .await;

        let api = OpenSearchApi::new(server.url(), Duration::from_secs(1));
        let response = api.bulk("web", &[raw_record("hello")]).await.unwrap();

        assert_eq!(response.took, 7);
        assert!(!response.errors);
        assert_eq!(response.items.len(), 1);
        assert_eq!(response.items[0].index.status, 201);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_bulk_server_error_maps_to_destination() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/_bulk")
            .with_status(500)
            .with_body("Internal Server Error")
            .create_async()
            .await;

        let api = OpenSearchApi::new(server.url(), Duration::from_secs(1));
        let result = api.bulk("web", &[raw_record("hello")]).await;

        match result {
            Err(ShipError::Destination {
                status: Some(status),
                message,
            }) => {
                assert_eq!(status, reqwest::StatusCode::INTERNAL_SERVER_ERROR);
                assert_eq!(message, "Internal Server Error");
            }
            other => panic!("expected destination error, got {:?}", other.map(|_| ())),
        }
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_trailing_slash_in_endpoint_is_normalized() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/_bulk")
            .with_status(200)
            .with_body(r#"{"took":1,"errors":false,"items":[]}"#)
            .create_async()
            .await;

        let api = OpenSearchApi::new(format!("{}/", server.url()), Duration::from_secs(1));
        api.bulk("web", &[raw_record("hello")]).await.unwrap();
        mock.assert_async().await;
    }
}
