// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Converts raw log payloads into structured records.
//!
//! Stdout payloads may contain multiple newline-separated lines; each
//! non-empty line is decoded as JSON when possible and wrapped as
//! `{"raw": line}` otherwise. Parse failures never propagate: they are logged
//! and absorbed into the fallback record. Stderr chunks skip JSON entirely,
//! see [`raw_record`].

use serde_json::{Map, Value};
use tracing::error;

/// A schema-less document: arbitrary string keys with loosely-typed values.
/// Inbound JSON shape is caller-controlled, so no fixed struct applies.
pub type Record = Map<String, Value>;

const RAW_FIELD: &str = "raw";

/// Wraps unstructured text as a `{"raw": text}` record.
pub fn raw_record(text: &str) -> Record {
    let mut record = Map::with_capacity(1);
    record.insert(RAW_FIELD.to_string(), Value::String(text.to_string()));
    record
}

/// One record per non-empty input line, in input order.
///
/// A line that decodes to a JSON object becomes that object. Anything else
/// (a decode error, or valid JSON that is not an object) takes the raw
/// fallback path; only actual decode errors log a diagnostic. Stateless, so
/// re-parsing the same payload yields identical records.
pub fn parse_lines<'a>(
    process_name: &'a str,
    raw: &'a str,
) -> impl Iterator<Item = Record> + 'a {
    raw.split('\n')
        .filter(|line| !line.is_empty())
        .map(move |line| match serde_json::from_str::<Value>(line) {
            Ok(Value::Object(record)) => record,
            Ok(_) => raw_record(line),
            Err(err) => {
                error!(process = process_name, line, %err, "parse");
                raw_record(line)
            }
        })
}
