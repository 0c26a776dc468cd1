//! Error types for the simulator bridge.
//!
//! Every fallible operation in the crate returns [`BridgeError`]. Errors carry
//! structured context and classify themselves by [`Severity`], which is how
//! the dispatch loop and the binary decide between "log and keep going" and
//! "stop the run".
//!
//! ## Error Categories
//!
//! - **Connection Errors**: the simulator link failed; there is no recovery path
//! - **Schema Errors**: a record layout was rejected at registration
//! - **Buffer / Parse Errors**: a delivered payload could not be decoded
//! - **HTTP Errors**: the ingestion service was unreachable or answered non-2xx
//! - **Auth Errors**: no validated bearer token could be obtained
//!
//! ## Severity
//!
//! ```rust
//! use skybridge::{BridgeError, Severity};
//!
//! let error = BridgeError::connection_failed("simulator closed the pipe");
//! assert_eq!(error.severity(), Severity::Fatal);
//! for suggestion in error.recovery_suggestions() {
//!     println!("  - {}", suggestion);
//! }
//! ```

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for bridge operations.
pub type Result<T, E = BridgeError> = std::result::Result<T, E>;

/// How the caller should react to an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Log it and continue; the unit of work it belonged to is dropped.
    Soft,
    /// Stop the run.
    Fatal,
}

/// Main error type for bridge operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum BridgeError {
    #[error("Simulator connection failed: {reason}")]
    Connection {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Record schema rejected: {reason}")]
    Schema { reason: String },

    #[error("Buffer too short at offset {offset}: need {needed} bytes, have {available}")]
    Buffer { offset: usize, needed: usize, available: usize },

    #[error("Parse error in {context}: {details}")]
    Parse { context: String, details: String },

    #[error("Field '{field}' not found in record")]
    FieldNotFound { field: String },

    #[error("Type conversion error: {details}")]
    TypeConversion { details: String },

    #[error("HTTP request to {endpoint} failed")]
    Http {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{endpoint} answered with status {status}")]
    Status { endpoint: String, status: u16 },

    #[error("Authentication failed: {reason}")]
    Auth { reason: String },

    #[error("Aircraft '{name}' could not be registered")]
    AircraftUnresolved { name: String },

    #[error("{operation} timed out after {duration:?}")]
    Timeout { operation: String, duration: Duration },

    #[error("Token file error: {path}")]
    TokenFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {reason}")]
    Config { reason: String },

    #[error("Loopback listener error: {context}")]
    Listener {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl BridgeError {
    /// Classify the error for the caller.
    pub fn severity(&self) -> Severity {
        match self {
            BridgeError::Connection { .. } => Severity::Fatal,
            BridgeError::Schema { .. } => Severity::Fatal,
            BridgeError::Buffer { .. } => Severity::Soft,
            BridgeError::Parse { .. } => Severity::Soft,
            BridgeError::FieldNotFound { .. } => Severity::Soft,
            BridgeError::TypeConversion { .. } => Severity::Soft,
            BridgeError::Http { .. } => Severity::Soft,
            BridgeError::Status { .. } => Severity::Soft,
            BridgeError::Auth { .. } => Severity::Fatal,
            BridgeError::AircraftUnresolved { .. } => Severity::Fatal,
            BridgeError::Timeout { .. } => Severity::Fatal,
            BridgeError::TokenFile { .. } => Severity::Soft,
            BridgeError::Config { .. } => Severity::Fatal,
            BridgeError::Listener { .. } => Severity::Fatal,
        }
    }

    /// Returns true when the run cannot continue past this error.
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            BridgeError::Connection { .. } => vec![
                "Ensure the flight simulator is running",
                "Restart the bridge after the simulator has loaded a flight",
            ],
            BridgeError::Schema { .. } => vec![
                "Check field names and types in the record definition",
                "Use a distinct name for each record layout",
            ],
            BridgeError::Buffer { .. } | BridgeError::Parse { .. } => vec![
                "Verify the record definition matches the registered layout",
                "Check the simulator build for data format changes",
            ],
            BridgeError::FieldNotFound { .. } | BridgeError::TypeConversion { .. } => {
                vec!["Check field name spelling", "Verify the declared field type"]
            }
            BridgeError::Http { .. } => vec![
                "Check that the ingestion service is reachable",
                "Verify the configured API base URL",
            ],
            BridgeError::Status { .. } => vec![
                "Check the service logs for the rejected request",
                "Re-authenticate if the token has expired",
            ],
            BridgeError::Auth { .. } => vec![
                "Delete the cached token file and log in again",
                "Check that the identity provider login page is reachable",
            ],
            BridgeError::AircraftUnresolved { .. } => vec![
                "Check that the aircraft registration endpoint is available",
                "Verify the account is allowed to register aircraft",
            ],
            BridgeError::Timeout { .. } => {
                vec!["Increase the configured timeout", "Check system load"]
            }
            BridgeError::TokenFile { .. } => {
                vec!["Check token file permissions", "Ensure the parent directory exists"]
            }
            BridgeError::Config { .. } => {
                vec!["Fix the configuration file", "Check SKYBRIDGE_* environment variables"]
            }
            BridgeError::Listener { .. } => vec![
                "Make sure the callback port is free",
                "Configure a different callback port",
            ],
        }
    }

    /// Helper constructor for connection errors.
    pub fn connection_failed(reason: impl Into<String>) -> Self {
        BridgeError::Connection { reason: reason.into(), source: None }
    }

    /// Helper constructor for connection errors with source.
    pub fn connection_failed_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        BridgeError::Connection { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for schema errors.
    pub fn schema_error(reason: impl Into<String>) -> Self {
        BridgeError::Schema { reason: reason.into() }
    }

    /// Helper constructor for parse errors.
    pub fn parse_error(context: impl Into<String>, details: impl Into<String>) -> Self {
        BridgeError::Parse { context: context.into(), details: details.into() }
    }

    /// Helper constructor for transport errors.
    pub fn http_error(endpoint: impl Into<String>, source: reqwest::Error) -> Self {
        BridgeError::Http { endpoint: endpoint.into(), source }
    }

    /// Helper constructor for auth errors.
    pub fn auth_failed(reason: impl Into<String>) -> Self {
        BridgeError::Auth { reason: reason.into() }
    }

    /// Helper constructor for timeouts.
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        BridgeError::Timeout { operation: operation.into(), duration }
    }

    /// Helper constructor for token file errors with path context.
    pub fn token_file_error(path: PathBuf, source: std::io::Error) -> Self {
        BridgeError::TokenFile { path, source }
    }

    /// Helper constructor for configuration errors.
    pub fn config_error(reason: impl Into<String>) -> Self {
        BridgeError::Config { reason: reason.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn error_messages_carry_their_context(
            reason in ".*",
            field_name in "\\w+",
            offset in 0usize..0x10000usize,
            needed in 1usize..512usize,
            status in 100u16..600u16,
        ) {
            let connection_msg = BridgeError::connection_failed(reason.clone()).to_string();
            prop_assert!(connection_msg.contains(&reason));

            let field_msg = BridgeError::FieldNotFound { field: field_name.clone() }.to_string();
            prop_assert!(field_msg.contains(&field_name));

            let buffer_msg = BridgeError::Buffer { offset, needed, available: 0 }.to_string();
            prop_assert!(buffer_msg.contains(&offset.to_string()));
            prop_assert!(buffer_msg.contains(&needed.to_string()));

            let status_msg =
                BridgeError::Status { endpoint: "/api/position".into(), status }.to_string();
            prop_assert!(status_msg.contains(&status.to_string()));
        }

        #[test]
        fn source_chain_is_preserved(base_message in ".+") {
            let inner: Box<dyn std::error::Error + Send + Sync> =
                Box::new(std::io::Error::other(base_message.clone()));
            let error = BridgeError::connection_failed_with_source("pipe closed", inner);

            let source = std::error::Error::source(&error);
            prop_assert!(source.is_some());
            prop_assert_eq!(source.map(|s| s.to_string()), Some(base_message));
        }
    }

    #[test]
    fn severity_follows_error_taxonomy() {
        assert!(BridgeError::connection_failed("gone").is_fatal());
        assert!(BridgeError::auth_failed("rejected").is_fatal());
        assert!(BridgeError::AircraftUnresolved { name: "C172".into() }.is_fatal());
        assert!(
            BridgeError::timeout("listener shutdown", Duration::from_secs(60)).is_fatal()
        );

        let status = BridgeError::Status { endpoint: "/api/position".into(), status: 502 };
        assert_eq!(status.severity(), Severity::Soft);
        let buffer = BridgeError::Buffer { offset: 8, needed: 8, available: 4 };
        assert_eq!(buffer.severity(), Severity::Soft);
    }

    #[test]
    fn every_variant_has_suggestions() {
        let errors = [
            BridgeError::connection_failed("x"),
            BridgeError::schema_error("x"),
            BridgeError::parse_error("ctx", "x"),
            BridgeError::auth_failed("x"),
            BridgeError::config_error("x"),
            BridgeError::token_file_error(PathBuf::from("token.jwt"), std::io::Error::other("x")),
        ];

        for error in &errors {
            let suggestions = error.recovery_suggestions();
            assert!(!suggestions.is_empty());
            assert!(suggestions.iter().all(|s| s.len() > 5));
        }
    }

    #[test]
    fn error_traits_validation() {
        fn assert_send_sync_static<T: Send + Sync + 'static>() {}
        assert_send_sync_static::<BridgeError>();
    }
}
