//! # Domain Types
//!
//! Cart data model as observed by the storefront.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │ CartIdentifier  │   │      Cart       │   │    CartLine     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  opaque string  │◄──│  id             │   │  id             │       │
//! │  │  issued by the  │   │  total_quantity │   │  variant_id     │       │
//! │  │  backend        │   │  total_amount   │   │  unit_price     │       │
//! │  └─────────────────┘   │  checkout_url   │   │  line_total     │       │
//! │                        │  lines ─────────┼──►│  quantity       │       │
//! │                        └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌───────────────────────────────────────────────────────────────┐     │
//! │  │ CartState (what consumers observe)                            │     │
//! │  │  cart, is_loading, error          ← FETCH axis                │     │
//! │  │  action_loading, action_error     ← ACTION axis               │     │
//! │  └───────────────────────────────────────────────────────────────┘     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Snapshot Rule
//! A `Cart` is always replaced wholesale with the backend's response. The
//! client never patches lines or recomputes totals.

use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::MoneyAmount;

// =============================================================================
// Cart Identifier
// =============================================================================

/// Opaque cart identifier issued by the commerce backend.
///
/// Absence (no persisted identifier) means "no cart yet".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(transparent)]
#[ts(export)]
pub struct CartIdentifier(String);

impl CartIdentifier {
    /// Wraps a backend-issued identifier. Empty strings are rejected.
    pub fn new(value: impl Into<String>) -> CoreResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(CoreError::EmptyCartIdentifier);
        }
        Ok(CartIdentifier(value))
    }

    /// Returns the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the identifier, returning the raw string.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for CartIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CartIdentifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// Cart Line
// =============================================================================

/// A single line of the backend-owned cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CartLine {
    /// Backend line identifier (used by update/remove).
    pub id: String,

    /// Product variant (merchandise) this line refers to.
    pub variant_id: String,

    /// Display title.
    pub title: String,

    /// Price of one unit.
    pub unit_price: MoneyAmount,

    /// Backend-computed line total.
    pub line_total: MoneyAmount,

    /// Quantity on the line.
    pub quantity: u32,

    /// Whether the variant can currently be purchased.
    pub available_for_sale: bool,

    /// Stock the backend reports as available.
    #[serde(default)]
    pub quantity_available: i64,
}

// =============================================================================
// Cart
// =============================================================================

/// Snapshot of the remote cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Cart {
    /// Backend identifier for this cart.
    pub id: CartIdentifier,

    /// Sum of line quantities, as computed by the backend.
    pub total_quantity: u32,

    /// Cart total, as computed by the backend.
    pub total_amount: MoneyAmount,

    /// Hosted checkout URL.
    pub checkout_url: String,

    /// Lines in backend order.
    #[serde(default)]
    pub lines: Vec<CartLine>,
}

impl Cart {
    /// Returns true if the cart holds no lines.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Number of distinct lines.
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Finds the line holding the given variant.
    pub fn line_for_variant(&self, variant_id: &str) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.variant_id == variant_id)
    }

    /// Finds a line by its backend id.
    pub fn line(&self, line_id: &str) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.id == line_id)
    }
}

// =============================================================================
// Cart State
// =============================================================================

/// Observable cart state.
///
/// ## Two Independent Axes
/// ```text
/// FETCH axis:   is_loading / error           ← fetch_cart, refetch
/// ACTION axis:  action_loading / action_error ← add, update, remove
/// ```
/// A failed action never touches `error`, and a failed fetch never touches
/// `action_error`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CartState {
    /// Latest known-good snapshot (`None` = no cart yet / expired).
    pub cart: Option<Cart>,

    /// A whole-cart fetch is in flight.
    pub is_loading: bool,

    /// Last fetch failure message.
    pub error: Option<String>,

    /// A mutating action is in flight.
    pub action_loading: bool,

    /// Last action failure message.
    pub action_error: Option<String>,
}

impl CartState {
    /// Total item quantity, 0 when there is no cart.
    pub fn item_count(&self) -> u32 {
        self.cart.as_ref().map_or(0, |c| c.total_quantity)
    }

    /// Returns true while either axis is loading.
    ///
    /// UI controls that mutate the cart should be disabled while this holds.
    pub fn is_busy(&self) -> bool {
        self.is_loading || self.action_loading
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Money;

    fn sample_cart_json() -> &'static str {
        r#"{
            "id": "cart-A",
            "totalQuantity": 3,
            "totalAmount": {"amount": "30.00", "currencyCode": "USD"},
            "checkoutUrl": "https://shop.example/checkout/cart-A",
            "lines": [
                {
                    "id": "line-1",
                    "variantId": "variant-1",
                    "title": "Linen Shirt",
                    "unitPrice": {"amount": "10.0", "currencyCode": "USD"},
                    "lineTotal": {"amount": "30.0", "currencyCode": "USD"},
                    "quantity": 3,
                    "availableForSale": true,
                    "quantityAvailable": 12
                }
            ]
        }"#
    }

    #[test]
    fn test_cart_identifier_rejects_empty() {
        assert!(CartIdentifier::new("").is_err());
        assert!(CartIdentifier::new("   ").is_err());
        assert_eq!(CartIdentifier::new("cart-A").unwrap().as_str(), "cart-A");
    }

    #[test]
    fn test_cart_decodes_backend_shape() {
        let cart: Cart = serde_json::from_str(sample_cart_json()).unwrap();

        assert_eq!(cart.id.as_str(), "cart-A");
        assert_eq!(cart.total_quantity, 3);
        assert_eq!(cart.total_amount.to_string(), "30.00 USD");
        assert_eq!(cart.line_count(), 1);

        let line = cart.line_for_variant("variant-1").unwrap();
        assert_eq!(line.unit_price.amount, Money::from_minor_units(1000));
        assert_eq!(cart.line("line-1"), Some(line));
        assert!(cart.line_for_variant("variant-2").is_none());
    }

    #[test]
    fn test_cart_without_lines_is_empty() {
        let cart: Cart = serde_json::from_str(
            r#"{"id":"cart-B","totalQuantity":0,
                "totalAmount":{"amount":"0.0","currencyCode":"USD"},
                "checkoutUrl":"https://shop.example/checkout/cart-B"}"#,
        )
        .unwrap();
        assert!(cart.is_empty());
        assert_eq!(cart.total_quantity, 0);
    }

    #[test]
    fn test_cart_state_defaults() {
        let state = CartState::default();
        assert!(state.cart.is_none());
        assert_eq!(state.item_count(), 0);
        assert!(!state.is_busy());

        let busy = CartState {
            action_loading: true,
            ..Default::default()
        };
        assert!(busy.is_busy());
    }

    #[test]
    fn test_cart_state_item_count_reads_backend_total() {
        let cart: Cart = serde_json::from_str(sample_cart_json()).unwrap();
        let state = CartState {
            cart: Some(cart),
            ..Default::default()
        };
        assert_eq!(state.item_count(), 3);
    }
}
