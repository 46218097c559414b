// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use reqwest::StatusCode;

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    InvalidValue(String),

    #[error("invalid process name pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        source: glob::PatternError,
    },
}

/// Errors raised by the supervisor bus subscription.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("failed to connect to supervisor bus at {path}: {source}")]
    Connect {
        path: String,
        source: std::io::Error,
    },

    #[error("bus read failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised when decoding one bus frame.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("malformed bus frame: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unknown bus event '{0}'")]
    UnknownEvent(String),

    #[error("missing payload for bus event '{0}'")]
    MissingPayload(String),
}

/// Errors raised while shipping one batch to the backend.
///
/// `Payload` means the batch itself could not be encoded; `Destination`
/// covers transport failures and non-success backend statuses.
#[derive(Debug, thiserror::Error)]
pub enum ShipError {
    #[error("failed to encode bulk payload: {0}")]
    Payload(String),

    #[error("bulk request failed ({status:?}): {message}")]
    Destination {
        status: Option<StatusCode>,
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let error = ConfigError::InvalidValue("missing endpoint".to_string());
        assert_eq!(
            error.to_string(),
            "invalid configuration: missing endpoint"
        );
    }

    #[test]
    fn test_frame_error_display() {
        let error = FrameError::UnknownEvent("log:misc".to_string());
        assert_eq!(error.to_string(), "unknown bus event 'log:misc'");

        let error = FrameError::MissingPayload("log:out".to_string());
        assert_eq!(error.to_string(), "missing payload for bus event 'log:out'");
    }

    #[test]
    fn test_ship_error_display() {
        let error = ShipError::Payload("bad document".to_string());
        assert_eq!(
            error.to_string(),
            "failed to encode bulk payload: bad document"
        );

        let error = ShipError::Destination {
            status: Some(StatusCode::INTERNAL_SERVER_ERROR),
            message: "boom".to_string(),
        };
        assert!(error.to_string().contains("500"));
        assert!(error.to_string().contains("boom"));
    }
}
