// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Ships document batches and accounts for their outcomes.
//!
//! Delivery is best-effort. A rejected document is logged and skipped without
//! aborting the rest of its batch; a failed request drops the whole batch
//! with a single diagnostic. Nothing is retried or persisted.

use crate::opensearch::{BulkResponse, OpenSearchApi};
use crate::parse::Record;
use std::time::Instant;
use tracing::{debug, error, info};

/// Per-batch outcome counters.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SendStats {
    pub successful: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct BulkSender {
    api: OpenSearchApi,
    show_send_stat: bool,
}

impl BulkSender {
    pub fn new(api: OpenSearchApi, show_send_stat: bool) -> Self {
        BulkSender {
            api,
            show_send_stat,
        }
    }

    /// Ships one batch to the index named after the process.
    ///
    /// Callers spawn this so event dispatch never waits on the backend.
    pub async fn send(&self, index: &str, batch: Vec<Record>) {
        let started = Instant::now();
        debug!(index, documents = batch.len(), "shipping batch");

        match self.api.bulk(index, &batch).await {
            Ok(response) => {
                let stats = account_drops(index, &batch, &response);
                if self.show_send_stat {
                    info!(
                        index,
                        successful = stats.successful,
                        failed = stats.failed,
                        took_ms = response.took,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "send"
                    );
                }
            }
            Err(err) => {
                // Batch is lost; operators watch the log stream for this.
                error!(index, %err, "send");
            }
        }
    }
}

/// One `drop` diagnostic per rejected document; the rest of the batch counts
/// as sent.
fn account_drops(index: &str, batch: &[Record], response: &BulkResponse) -> SendStats {
    let mut stats = SendStats::default();
    for (document, item) in batch.iter().zip(&response.items) {
        if item.index.status >= 300 {
            stats.failed += 1;
            error!(
                index,
                status = item.index.status,
                doc = %serde_json::Value::Object(document.clone()),
                backend_error = ?item.index.error,
                "drop"
            );
        } else {
            stats.successful += 1;
        }
    }
    stats
}
