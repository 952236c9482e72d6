//! # Error Types
//!
//! Domain-specific error types for storefront-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  storefront-core errors (this file)                                    │
//! │  └── CoreError        - Malformed amounts / identifiers                │
//! │                                                                         │
//! │  storefront-cart errors (separate crate)                               │
//! │  └── CartError        - What CartState.action_error / error display    │
//! │                                                                         │
//! │  storefront-modules errors (separate crate)                            │
//! │  └── ModuleError      - Registry misuse, failed warm-up                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Core data model errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// A decimal amount from the backend could not be parsed.
    ///
    /// ## When This Occurs
    /// - Empty string or stray characters (`"12,50"`, `"abc"`)
    /// - More than two significant fraction digits (`"1.005"`)
    #[error("Invalid amount '{value}': {reason}")]
    InvalidAmount { value: String, reason: String },

    /// A cart identifier was empty.
    #[error("Cart identifier must not be empty")]
    EmptyCartIdentifier,
}

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;
