// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The dispatcher at the center of the pipeline.
//!
//! Consumes bus events serially: gate on the pattern filter, parse the
//! payload, finalize documents, hand the batch to the sender. Sends are
//! spawned so a slow backend never stalls dispatch; within one event,
//! document order is line order.

use crate::bulk::BulkSender;
use crate::bus::{BusEvent, LogMessage};
use crate::document::build_document;
use crate::filter::PatternSet;
use crate::parse::{parse_lines, raw_record, Record};
use tokio::sync::mpsc;
use tracing::{debug, info};

pub const STREAM_STDOUT: &str = "stdout";
pub const STREAM_STDERR: &str = "stderr";

#[derive(Clone)]
pub struct EventLoopHandle {
    tx: mpsc::UnboundedSender<BusEvent>,
}

impl EventLoopHandle {
    pub fn dispatch(&self, event: BusEvent) -> Result<(), mpsc::error::SendError<BusEvent>> {
        self.tx.send(event)
    }

    pub fn sender(&self) -> mpsc::UnboundedSender<BusEvent> {
        self.tx.clone()
    }
}

pub struct EventLoop {
    rx: mpsc::UnboundedReceiver<BusEvent>,
    patterns: PatternSet,
    sender: BulkSender,
}

impl EventLoop {
    pub fn new(patterns: PatternSet, sender: BulkSender) -> (Self, EventLoopHandle) {
        let (tx, rx) = mpsc::unbounded_channel();

        let event_loop = EventLoop {
            rx,
            patterns,
            sender,
        };
        let handle = EventLoopHandle { tx };

        (event_loop, handle)
    }

    /// Dispatches events until the bus closes.
    pub async fn run(mut self) {
        debug!("event loop listening");

        while let Some(event) = self.rx.recv().await {
            match event {
                BusEvent::LogOut(msg) => self.handle_stdout(msg),
                BusEvent::LogErr(msg) => self.handle_stderr(msg),
                BusEvent::ReconnectAttempt => info!("bus reconnecting"),
                BusEvent::Close => {
                    info!("bus closed");
                    break;
                }
            }
        }

        debug!("event loop stopped");
    }

    // Stdout payloads fan out into one document per parsed line.
    fn handle_stdout(&self, msg: LogMessage) {
        if !self.patterns.should_forward(&msg.process.name) {
            return;
        }

        let batch: Vec<Record> = parse_lines(&msg.process.name, &msg.data)
            .map(|record| build_document(record, msg.at, STREAM_STDOUT))
            .collect();

        if !batch.is_empty() {
            self.ship(msg.process.name, batch);
        }
    }

    // Stderr is treated as one unstructured chunk; whitespace-only chunks
    // produce nothing.
    fn handle_stderr(&self, msg: LogMessage) {
        if !self.patterns.should_forward(&msg.process.name) {
            return;
        }

        let chunk = msg.data.trim();
        if chunk.is_empty() {
            return;
        }

        let document = build_document(raw_record(chunk), msg.at, STREAM_STDERR);
        self.ship(msg.process.name, vec![document]);
    }

    fn ship(&self, index: String, batch: Vec<Record>) {
        let sender = self.sender.clone();
        tokio::spawn(async move {
            sender.send(&index, batch).await;
        });
    }
}
