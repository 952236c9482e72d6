//! # Cart Error Types
//!
//! Error types for the cart synchronization engine and its collaborators.
//!
//! ## Error Taxonomy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Cart Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Precondition   │  │   Transport     │  │     Backend             │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  CartNotFound   │  │  Connection     │  │  UserError (verbatim)   │ │
//! │  │  "cart not      │  │  "connection    │  │  "Quantity must be ..." │ │
//! │  │   found"        │  │   error"        │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  TransportError folds into CartError::Connection. StorageError and     │
//! │  TelemetryError are logged and never leave the engine.                 │
//! │  ConfigError surfaces only from StorefrontConfig::load/save.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `Display` of a [`CartError`] is exactly what lands in
//! `CartState::action_error` / `CartState::error`.

use thiserror::Error;

/// Result type alias for engine operations.
pub type CartResult<T> = Result<T, CartError>;

/// Result type alias for transport calls.
pub type TransportResult<T> = Result<T, TransportError>;

/// Result type alias for durable store access.
pub type StorageResult<T> = Result<T, StorageError>;

/// User-facing message for a missing cart identifier.
pub const CART_NOT_FOUND_MESSAGE: &str = "cart not found";

/// User-facing message for any transport failure.
pub const CONNECTION_ERROR_MESSAGE: &str = "connection error";

// =============================================================================
// Cart Error
// =============================================================================

/// Failure of a cart operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    /// An action that needs an existing cart was called without one.
    #[error("cart not found")]
    CartNotFound,

    /// The backend could not be reached or answered with something unusable.
    ///
    /// The detail is for logs only; users see the generic message.
    #[error("connection error")]
    Connection(String),

    /// Backend validation message, passed through verbatim.
    #[error("{0}")]
    UserError(String),
}

impl CartError {
    /// Returns true if retrying the same call could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CartError::Connection(_))
    }

    /// Returns true if the backend rejected the input.
    pub fn is_user_error(&self) -> bool {
        matches!(self, CartError::UserError(_))
    }

    /// Diagnostic detail for logs (the display text for non-connection errors).
    pub fn detail(&self) -> String {
        match self {
            CartError::Connection(detail) => detail.clone(),
            other => other.to_string(),
        }
    }
}

// =============================================================================
// Transport Error
// =============================================================================

/// Failure to complete a request against the commerce backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Request could not be sent or the connection dropped.
    #[error("Request failed: {0}")]
    Http(String),

    /// Backend answered with a non-success status.
    #[error("Backend returned HTTP {status}")]
    Status { status: u16 },

    /// Request exceeded the configured timeout.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Response body could not be decoded.
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// The transport was asked for a document it cannot serve.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            TransportError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            TransportError::Status {
                status: status.as_u16(),
            }
        } else {
            TransportError::Http(err.to_string())
        }
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        TransportError::Decode(err.to_string())
    }
}

impl From<TransportError> for CartError {
    fn from(err: TransportError) -> Self {
        CartError::Connection(err.to_string())
    }
}

// =============================================================================
// Storage Error
// =============================================================================

/// Failure of the durable client store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Underlying file could not be read or written.
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Stored data is not valid JSON.
    #[error("Storage is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    /// No storage directory could be determined.
    #[error("No storage location available")]
    NoLocation,
}

// =============================================================================
// Telemetry Error
// =============================================================================

/// Failure of a telemetry sink. Swallowed by the engine.
#[derive(Debug, Clone, Error)]
#[error("Telemetry sink failed: {0}")]
pub struct TelemetryError(pub String);

// =============================================================================
// Config Error
// =============================================================================

/// Failure to load, save or validate configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// Invalid API endpoint.
    #[error("Invalid API endpoint: {0}")]
    InvalidUrl(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    LoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    SaveFailed(String),
}

impl From<url::ParseError> for ConfigError {
    fn from(err: url::ParseError) -> Self {
        ConfigError::InvalidUrl(err.to_string())
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::LoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::LoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for ConfigError {
    fn from(err: toml::ser::Error) -> Self {
        ConfigError::SaveFailed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_facing_messages() {
        assert_eq!(CartError::CartNotFound.to_string(), CART_NOT_FOUND_MESSAGE);
        assert_eq!(
            CartError::Connection("dns lookup failed".into()).to_string(),
            CONNECTION_ERROR_MESSAGE
        );
        assert_eq!(
            CartError::UserError("Quantity must be at least 1".into()).to_string(),
            "Quantity must be at least 1"
        );
    }

    #[test]
    fn test_transport_errors_become_connection_errors() {
        let err: CartError = TransportError::Timeout(10).into();
        assert!(err.is_retryable());
        assert_eq!(err.to_string(), CONNECTION_ERROR_MESSAGE);
        assert_eq!(err.detail(), "Request timed out after 10 seconds");
    }

    #[test]
    fn test_error_categories() {
        assert!(!CartError::CartNotFound.is_retryable());
        assert!(CartError::UserError("nope".into()).is_user_error());
        assert!(!CartError::Connection("x".into()).is_user_error());
    }
}
