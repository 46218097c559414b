// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Merges parsed records with event metadata into final documents.

use crate::parse::Record;
use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde_json::Value;

const TIME_FIELD: &str = "time";
const STREAM_FIELD: &str = "stream";

/// Finalizes a record for indexing.
///
/// Every document leaves with a `time` and a `stream` field; the synthesized
/// values overwrite any same-named fields the record carried. A `time` the
/// record supplied itself (RFC 3339 string or epoch milliseconds) wins over
/// the event timestamp when it parses; otherwise `emitted_at` is used.
pub fn build_document(mut record: Record, emitted_at: DateTime<Utc>, stream: &str) -> Record {
    let time = record
        .get(TIME_FIELD)
        .and_then(record_time)
        .unwrap_or(emitted_at);

    record.insert(
        TIME_FIELD.to_string(),
        Value::String(time.to_rfc3339_opts(SecondsFormat::Millis, true)),
    );
    record.insert(
        STREAM_FIELD.to_string(),
        Value::String(stream.to_string()),
    );
    record
}

fn record_time(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(text) => DateTime::parse_from_rfc3339(text)
            .ok()
            .map(|time| time.with_timezone(&Utc)),
        Value::Number(number) => number
            .as_i64()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
        _ => None,
    }
}
