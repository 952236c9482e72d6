//! # Request Transport
//!
//! The engine's only view of the commerce backend.
//!
//! ## Request / Response Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Transport Contract                                 │
//! │                                                                         │
//! │  query(Document::CartQuery, { cartId })                                │
//! │  mutate(Document::CartCreate | CartLinesAdd | ..., variables)          │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  TransportResponse {                                                   │
//! │      data:        { "cart": <Cart> | null },                           │
//! │      errors:      [ { message, code? } ],      ← request-level         │
//! │      user_errors: [ { message, field, code? } ] ← input validation     │
//! │  }                                                                      │
//! │                                                                         │
//! │  Implementations normalize whatever the wire returns so that `data`    │
//! │  always carries the cart under the "cart" key, for every document.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The engine never sees GraphQL text or HTTP; see [`crate::http`] for the
//! network implementation and [`crate::memory`] for the in-process one.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use storefront_core::Cart;

use crate::error::{TransportError, TransportResult};

/// Error code a backend uses to say an entity does not exist.
pub const NOT_FOUND_CODE: &str = "NOT_FOUND";

// =============================================================================
// Document
// =============================================================================

/// Whether a document reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Query,
    Mutation,
}

/// Typed operation descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Document {
    /// Read a cart by id. Variables: `{ cartId }`.
    CartQuery,

    /// Create a cart with initial lines. Variables: `{ input: { lines } }`.
    CartCreate,

    /// Add lines to a cart. Variables: `{ cartId, lines }`.
    CartLinesAdd,

    /// Set line quantities. Variables: `{ cartId, lines: [{ id, quantity }] }`.
    CartLinesUpdate,

    /// Remove lines. Variables: `{ cartId, lineIds }`.
    CartLinesRemove,
}

impl Document {
    /// Returns whether the document is a query or a mutation.
    pub fn kind(&self) -> OperationKind {
        match self {
            Document::CartQuery => OperationKind::Query,
            _ => OperationKind::Mutation,
        }
    }

    /// Root field name of the operation on the backend schema.
    pub fn root_field(&self) -> &'static str {
        match self {
            Document::CartQuery => "cart",
            Document::CartCreate => "cartCreate",
            Document::CartLinesAdd => "cartLinesAdd",
            Document::CartLinesUpdate => "cartLinesUpdate",
            Document::CartLinesRemove => "cartLinesRemove",
        }
    }
}

impl std::fmt::Display for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.root_field())
    }
}

// =============================================================================
// Response
// =============================================================================

/// Request-level error reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub message: String,
    #[serde(default)]
    pub code: Option<String>,
}

impl ErrorRecord {
    pub fn new(message: impl Into<String>) -> Self {
        ErrorRecord {
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

/// Input validation error reported by the backend, meant for the shopper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserErrorRecord {
    pub message: String,
    #[serde(default)]
    pub field: Vec<String>,
    #[serde(default)]
    pub code: Option<String>,
}

impl UserErrorRecord {
    pub fn new(message: impl Into<String>) -> Self {
        UserErrorRecord {
            message: message.into(),
            field: Vec::new(),
            code: None,
        }
    }
}

/// Normalized backend response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportResponse {
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub errors: Vec<ErrorRecord>,
    #[serde(default)]
    pub user_errors: Vec<UserErrorRecord>,
}

impl TransportResponse {
    /// Response carrying a cart snapshot.
    pub fn with_cart(cart: &Cart) -> TransportResult<Self> {
        Ok(TransportResponse {
            data: Some(serde_json::json!({ "cart": serde_json::to_value(cart)? })),
            ..Default::default()
        })
    }

    /// Response saying the cart does not exist.
    pub fn cart_missing() -> Self {
        TransportResponse {
            data: Some(serde_json::json!({ "cart": null })),
            ..Default::default()
        }
    }

    /// Decodes `data.cart`.
    ///
    /// `Ok(None)` when the key is present but null, or when there is no data.
    pub fn cart(&self) -> TransportResult<Option<Cart>> {
        match self.data.as_ref().and_then(|d| d.get("cart")) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => Ok(Some(Cart::deserialize(value)?)),
        }
    }

    /// Returns true if the backend says the requested cart does not exist.
    ///
    /// ## Classification
    /// - any error record with code `NOT_FOUND`, or
    /// - no errors at all and `data.cart` explicitly null
    pub fn is_not_found(&self) -> bool {
        if self
            .errors
            .iter()
            .any(|e| e.code.as_deref() == Some(NOT_FOUND_CODE))
        {
            return true;
        }

        self.errors.is_empty()
            && matches!(
                self.data.as_ref().and_then(|d| d.get("cart")),
                Some(Value::Null)
            )
    }

    /// First user error message, if any.
    pub fn first_user_error(&self) -> Option<&str> {
        self.user_errors.first().map(|e| e.message.as_str())
    }

    /// All request-level error messages joined for logging.
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.message.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

// =============================================================================
// Transport Trait
// =============================================================================

/// Executes operations against the remote commerce API.
#[async_trait]
pub trait RequestTransport: Send + Sync {
    /// Executes a read-only document.
    async fn query(&self, document: Document, variables: Value) -> TransportResult<TransportResponse>;

    /// Executes a mutating document.
    async fn mutate(&self, document: Document, variables: Value)
        -> TransportResult<TransportResponse>;
}

/// Rejects a document sent through the wrong entry point.
pub(crate) fn expect_kind(document: Document, kind: OperationKind) -> TransportResult<()> {
    if document.kind() == kind {
        Ok(())
    } else {
        Err(TransportError::Unsupported(format!(
            "{} sent as {:?}",
            document, kind
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_document_kinds() {
        assert_eq!(Document::CartQuery.kind(), OperationKind::Query);
        assert_eq!(Document::CartLinesRemove.kind(), OperationKind::Mutation);
        assert!(expect_kind(Document::CartCreate, OperationKind::Query).is_err());
        assert!(expect_kind(Document::CartCreate, OperationKind::Mutation).is_ok());
    }

    #[test]
    fn test_not_found_classification() {
        assert!(TransportResponse::cart_missing().is_not_found());

        let coded = TransportResponse {
            errors: vec![ErrorRecord::new("Cart gone").with_code(NOT_FOUND_CODE)],
            ..Default::default()
        };
        assert!(coded.is_not_found());

        // A null cart next to other errors is a failure, not an expiry.
        let throttled = TransportResponse {
            data: Some(json!({ "cart": null })),
            errors: vec![ErrorRecord::new("Throttled").with_code("THROTTLED")],
            ..Default::default()
        };
        assert!(!throttled.is_not_found());

        // No data at all says nothing about the cart.
        assert!(!TransportResponse::default().is_not_found());
    }

    #[test]
    fn test_cart_decoding() {
        assert_eq!(TransportResponse::default().cart().unwrap(), None);
        assert_eq!(TransportResponse::cart_missing().cart().unwrap(), None);

        let broken = TransportResponse {
            data: Some(json!({ "cart": { "id": 7 } })),
            ..Default::default()
        };
        assert!(matches!(broken.cart(), Err(TransportError::Decode(_))));
    }

    #[test]
    fn test_error_summaries() {
        let response = TransportResponse {
            errors: vec![ErrorRecord::new("a"), ErrorRecord::new("b")],
            user_errors: vec![UserErrorRecord::new("Quantity too high")],
            ..Default::default()
        };
        assert_eq!(response.error_summary(), "a; b");
        assert_eq!(response.first_user_error(), Some("Quantity too high"));
    }
}
