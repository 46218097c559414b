// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Log forwarding pipeline for supervisor-managed processes.
//!
//! Subscribes to a process supervisor's event bus, filters which processes'
//! logs are eligible with glob patterns, normalizes each log line into a
//! structured document, and ships documents in per-process batches to a
//! search backend's bulk-indexing endpoint. Delivery is best-effort: failed
//! batches are logged and dropped, never retried or persisted.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod bulk;
pub mod bus;
pub mod config;
pub mod document;
pub mod errors;
pub mod event_loop;
pub mod filter;
pub mod opensearch;
pub mod parse;
