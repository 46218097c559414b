// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Supervisor event bus subscription.
//!
//! The supervisor publishes newline-delimited JSON frames over a unix socket:
//! `{"event": "log:out", "msg": {...}}`. This module decodes frames into
//! [`BusEvent`]s and forwards them to the event loop. Reconnection is the
//! supervisor client's responsibility; a connect failure here is terminal for
//! the startup attempt.

use crate::errors::{BusError, FrameError};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::VecDeque;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::UnixStream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

pub const EVENT_LOG_OUT: &str = "log:out";
pub const EVENT_LOG_ERR: &str = "log:err";
pub const EVENT_RECONNECT: &str = "reconnect attempt";
pub const EVENT_CLOSE: &str = "close";

#[derive(Debug, Clone, Deserialize)]
pub struct ProcessInfo {
    pub name: String,
}

/// One log emission from a supervised process. `data` may span multiple
/// lines for stdout; `at` arrives as epoch milliseconds on the wire.
#[derive(Debug, Clone, Deserialize)]
pub struct LogMessage {
    pub process: ProcessInfo,
    pub data: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub at: DateTime<Utc>,
}

/// The closed set of bus notifications the pipeline reacts to.
#[derive(Debug, Clone)]
pub enum BusEvent {
    LogOut(LogMessage),
    LogErr(LogMessage),
    ReconnectAttempt,
    Close,
}

#[derive(Deserialize)]
struct Frame {
    event: String,
    #[serde(default)]
    msg: Option<LogMessage>,
}

/// Decodes one NDJSON bus frame.
pub fn decode_frame(line: &str) -> Result<BusEvent, FrameError> {
    let frame: Frame = serde_json::from_str(line)?;
    match frame.event.as_str() {
        EVENT_LOG_OUT => match frame.msg {
            Some(msg) => Ok(BusEvent::LogOut(msg)),
            None => Err(FrameError::MissingPayload(frame.event)),
        },
        EVENT_LOG_ERR => match frame.msg {
            Some(msg) => Ok(BusEvent::LogErr(msg)),
            None => Err(FrameError::MissingPayload(frame.event)),
        },
        EVENT_RECONNECT => Ok(BusEvent::ReconnectAttempt),
        EVENT_CLOSE => Ok(BusEvent::Close),
        _ => Err(FrameError::UnknownEvent(frame.event)),
    }
}

// BusReader abstracts the frame transport.
enum BusReader {
    /// Live unix-socket connection to the supervisor
    UnixSocket(BufReader<UnixStream>),

    /// Mirror reader for testing - replays fixed frames
    #[allow(dead_code)]
    MirrorTest(VecDeque<String>),
}

impl BusReader {
    async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        match self {
            BusReader::UnixSocket(reader) => {
                let mut line = String::new();
                let read = reader.read_line(&mut line).await?;
                if read == 0 {
                    Ok(None)
                } else {
                    Ok(Some(line))
                }
            }
            BusReader::MirrorTest(frames) => Ok(frames.pop_front()),
        }
    }
}

/// An acquired subscription to the supervisor bus. Decoded events flow out
/// through the mpsc sender until the bus closes or the token is cancelled.
pub struct BusSubscription {
    reader: BusReader,
    tx: mpsc::UnboundedSender<BusEvent>,
    cancel: CancellationToken,
}

impl BusSubscription {
    /// Connects to the supervisor's event socket.
    pub async fn launch(
        path: &str,
        tx: mpsc::UnboundedSender<BusEvent>,
        cancel: CancellationToken,
    ) -> Result<Self, BusError> {
        let stream = UnixStream::connect(path)
            .await
            .map_err(|source| BusError::Connect {
                path: path.to_string(),
                source,
            })?;
        debug!(path, "bus connected");
        Ok(Self::from_stream(stream, tx, cancel))
    }

    /// Wraps an already-established bus connection.
    pub fn from_stream(
        stream: UnixStream,
        tx: mpsc::UnboundedSender<BusEvent>,
        cancel: CancellationToken,
    ) -> Self {
        BusSubscription {
            reader: BusReader::UnixSocket(BufReader::new(stream)),
            tx,
            cancel,
        }
    }

    /// Reads frames until the bus closes, the peer disappears, or the token
    /// is cancelled. EOF and read errors surface as a `Close` so the event
    /// loop always observes a clean shutdown.
    pub async fn spin(mut self) {
        loop {
            let line = tokio::select! {
                result = self.reader.next_line() => result,
                _ = self.cancel.cancelled() => break,
            };

            match line {
                Ok(Some(line)) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    match decode_frame(line) {
                        Ok(event) => {
                            let closing = matches!(event, BusEvent::Close);
                            if self.tx.send(event).is_err() {
                                debug!("event loop gone, stopping bus reader");
                                break;
                            }
                            if closing {
                                break;
                            }
                        }
                        Err(err) => error!(%err, line, "bus frame decode"),
                    }
                }
                Ok(None) => {
                    debug!("bus stream ended");
                    let _ = self.tx.send(BusEvent::Close);
                    break;
                }
                Err(err) => {
                    error!(%err, "bus read");
                    let _ = self.tx.send(BusEvent::Close);
                    break;
                }
            }
        }
    }
}
