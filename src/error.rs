// WHY: Remote failures are classified by a small tag, never by inspecting
// message text, so policy stays decoupled from wording on the service side

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::session::ScanStatus;

/// Discriminator returned by the scanning service for failed requests
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScanErrorKind {
    LimitReached,
    Maintenance,
    Generic,
}

impl fmt::Display for ScanErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            ScanErrorKind::LimitReached => "limit_reached",
            ScanErrorKind::Maintenance => "maintenance",
            ScanErrorKind::Generic => "generic",
        };
        f.write_str(tag)
    }
}

/// Failure of a remote scan request
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScanError {
    /// Usage or plan limit exhausted; the user must upgrade or top up
    #[error("Scan limit reached: {message}")]
    LimitReached { message: String },

    /// Service temporarily degraded
    #[error("Scanning service under maintenance: {message}")]
    Maintenance { message: String },

    /// Any other failure, including transport errors and malformed responses
    #[error("Scan failed: {message}")]
    Generic { message: String },
}

impl ScanError {
    pub fn new(kind: ScanErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        match kind {
            ScanErrorKind::LimitReached => ScanError::LimitReached { message },
            ScanErrorKind::Maintenance => ScanError::Maintenance { message },
            ScanErrorKind::Generic => ScanError::Generic { message },
        }
    }

    pub fn generic(message: impl Into<String>) -> Self {
        ScanError::Generic {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ScanErrorKind {
        match self {
            ScanError::LimitReached { .. } => ScanErrorKind::LimitReached,
            ScanError::Maintenance { .. } => ScanErrorKind::Maintenance,
            ScanError::Generic { .. } => ScanErrorKind::Generic,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ScanError::LimitReached { message }
            | ScanError::Maintenance { message }
            | ScanError::Generic { message } => message,
        }
    }
}

/// Rejected session state transition
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Invalid scan transition from {from} to {to}")]
    InvalidTransition { from: ScanStatus, to: ScanStatus },

    #[error("No scan result cached for the current content")]
    NothingCached,
}

/// Scan result inconsistent with the content it was produced for
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ResultError {
    #[error("overall score {score} outside 0..=100")]
    ScoreOutOfRange { score: f64 },

    #[error("match {id} spans {start}..{end} outside content of {len} UTF-16 units")]
    MatchOutOfBounds {
        id: String,
        start: usize,
        end: usize,
        len: usize,
    },

    #[error("match {id} similarity {score} outside 0..=100")]
    MatchScoreOutOfRange { id: String, score: f64 },
}

/// The scheduler behind a handle has shut down
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("Scan session has been torn down")]
pub struct SessionClosed;

/// Unreadable or invalid configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trips_through_constructor() {
        for kind in [
            ScanErrorKind::LimitReached,
            ScanErrorKind::Maintenance,
            ScanErrorKind::Generic,
        ] {
            let err = ScanError::new(kind, "boom");
            assert_eq!(err.kind(), kind);
            assert_eq!(err.message(), "boom");
        }
    }

    #[test]
    fn test_kind_wire_tags() {
        let kind: ScanErrorKind = serde_json::from_str("\"limit_reached\"").unwrap();
        assert_eq!(kind, ScanErrorKind::LimitReached);
        assert_eq!(ScanErrorKind::Maintenance.to_string(), "maintenance");
        assert_eq!(
            serde_json::to_string(&ScanErrorKind::Generic).unwrap(),
            "\"generic\""
        );
    }

    #[test]
    fn test_display_includes_message() {
        let err = ScanError::generic("connection reset");
        assert_eq!(err.to_string(), "Scan failed: connection reset");
    }
}
