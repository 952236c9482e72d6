//! # HTTP Transport
//!
//! [`RequestTransport`] over the Storefront GraphQL API.
//!
//! ## Request Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Document ──► GraphQL text ──► POST {endpoint}/api/{version}/graphql.json
//! │                                   X-Shopify-Storefront-Access-Token     │
//! │                                   { query, variables }                  │
//! │                                          │                              │
//! │                                          ▼                              │
//! │  TransportResponse ◄── normalize ◄── { data: { <root>: ... }, errors } │
//! │                                                                         │
//! │  normalize:                                                             │
//! │    query     data.cart                      → data.cart                 │
//! │    mutation  data.<root>.cart               → data.cart                 │
//! │              data.<root>.userErrors         → user_errors               │
//! │    errors[].extensions.code                 → ErrorRecord.code          │
//! │    lines.edges[].node, cost.totalAmount     → flat Cart                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, warn};

use storefront_core::{Cart, CartIdentifier, CartLine, Money, MoneyAmount};

use crate::config::StorefrontConfig;
use crate::error::{ConfigError, TransportError, TransportResult};
use crate::transport::{
    expect_kind, Document, ErrorRecord, OperationKind, RequestTransport, TransportResponse,
    UserErrorRecord,
};

/// Header carrying the public storefront token.
pub const ACCESS_TOKEN_HEADER: &str = "X-Shopify-Storefront-Access-Token";

/// Product variants without options carry this title.
const DEFAULT_VARIANT_TITLE: &str = "Default Title";

// =============================================================================
// GraphQL Documents
// =============================================================================

macro_rules! cart_fields {
    () => {
        "fragment CartFields on Cart { \
           id checkoutUrl totalQuantity \
           cost { totalAmount { amount currencyCode } } \
           lines(first: 100) { edges { node { \
             id quantity \
             cost { totalAmount { amount currencyCode } } \
             merchandise { ... on ProductVariant { \
               id title availableForSale quantityAvailable \
               price { amount currencyCode } \
               product { title } \
             } } \
           } } } \
         }"
    };
}

macro_rules! mutation_payload {
    () => {
        "{ cart { ...CartFields } userErrors { field message code } }"
    };
}

const CART_QUERY: &str = concat!(
    "query cart($cartId: ID!) { cart(id: $cartId) { ...CartFields } } ",
    cart_fields!()
);

const CART_CREATE: &str = concat!(
    "mutation cartCreate($input: CartInput!) { cartCreate(input: $input) ",
    mutation_payload!(),
    " } ",
    cart_fields!()
);

const CART_LINES_ADD: &str = concat!(
    "mutation cartLinesAdd($cartId: ID!, $lines: [CartLineInput!]!) { \
       cartLinesAdd(cartId: $cartId, lines: $lines) ",
    mutation_payload!(),
    " } ",
    cart_fields!()
);

const CART_LINES_UPDATE: &str = concat!(
    "mutation cartLinesUpdate($cartId: ID!, $lines: [CartLineUpdateInput!]!) { \
       cartLinesUpdate(cartId: $cartId, lines: $lines) ",
    mutation_payload!(),
    " } ",
    cart_fields!()
);

const CART_LINES_REMOVE: &str = concat!(
    "mutation cartLinesRemove($cartId: ID!, $lineIds: [ID!]!) { \
       cartLinesRemove(cartId: $cartId, lineIds: $lineIds) ",
    mutation_payload!(),
    " } ",
    cart_fields!()
);

/// GraphQL text for a document.
pub fn document_text(document: Document) -> &'static str {
    match document {
        Document::CartQuery => CART_QUERY,
        Document::CartCreate => CART_CREATE,
        Document::CartLinesAdd => CART_LINES_ADD,
        Document::CartLinesUpdate => CART_LINES_UPDATE,
        Document::CartLinesRemove => CART_LINES_REMOVE,
    }
}

// =============================================================================
// Transport
// =============================================================================

/// Storefront API client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    graphql_url: String,
    access_token: Option<String>,
    timeout_secs: u64,
}

impl HttpTransport {
    /// Creates a client for `{endpoint}/api/{version}/graphql.json`.
    pub fn new(
        endpoint: &str,
        version: &str,
        access_token: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self, ConfigError> {
        let graphql_url = format!(
            "{}/api/{}/graphql.json",
            endpoint.trim_end_matches('/'),
            version
        );
        url::Url::parse(&graphql_url)?;

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ConfigError::Invalid(format!("HTTP client: {}", e)))?;

        Ok(HttpTransport {
            client,
            graphql_url,
            access_token,
            timeout_secs,
        })
    }

    /// Creates a client from the `[api]` section.
    pub fn from_config(config: &StorefrontConfig) -> Result<Self, ConfigError> {
        let endpoint = config
            .endpoint()
            .ok_or_else(|| ConfigError::Invalid("api.endpoint is not set".into()))?;

        HttpTransport::new(
            endpoint,
            &config.api.version,
            config.api.access_token.clone(),
            config.api.timeout_secs,
        )
    }

    /// Full GraphQL URL.
    pub fn graphql_url(&self) -> &str {
        &self.graphql_url
    }

    async fn execute(
        &self,
        document: Document,
        variables: Value,
    ) -> TransportResult<TransportResponse> {
        debug!(%document, url = %self.graphql_url, "Storefront request");

        let mut request = self
            .client
            .post(&self.graphql_url)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .json(&json!({
                "query": document_text(document),
                "variables": variables,
            }));

        if let Some(ref token) = self.access_token {
            request = request.header(ACCESS_TOKEN_HEADER, token);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout(self.timeout_secs)
            } else {
                e.into()
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!(%document, status = status.as_u16(), "Storefront request rejected");
            return Err(TransportError::Status {
                status: status.as_u16(),
            });
        }

        let body: Value = response.json().await?;
        normalize(document, &body)
    }
}

#[async_trait]
impl RequestTransport for HttpTransport {
    async fn query(&self, document: Document, variables: Value) -> TransportResult<TransportResponse> {
        expect_kind(document, OperationKind::Query)?;
        self.execute(document, variables).await
    }

    async fn mutate(&self, document: Document, variables: Value) -> TransportResult<TransportResponse> {
        expect_kind(document, OperationKind::Mutation)?;
        self.execute(document, variables).await
    }
}

// =============================================================================
// Normalization
// =============================================================================

/// Maps a raw GraphQL body onto the transport contract.
pub fn normalize(document: Document, body: &Value) -> TransportResult<TransportResponse> {
    let errors = body
        .get("errors")
        .and_then(Value::as_array)
        .map(|list| list.iter().map(error_record).collect())
        .unwrap_or_default();

    let data = match body.get("data") {
        None | Some(Value::Null) => {
            return Ok(TransportResponse {
                data: None,
                errors,
                user_errors: Vec::new(),
            })
        }
        Some(data) => data,
    };

    let root = data.get(document.root_field());
    let (cart_node, user_errors) = match document.kind() {
        OperationKind::Query => (root, Vec::new()),
        OperationKind::Mutation => (
            root.and_then(|payload| payload.get("cart")),
            root.and_then(|payload| payload.get("userErrors"))
                .and_then(Value::as_array)
                .map(|list| list.iter().map(user_error_record).collect())
                .unwrap_or_default(),
        ),
    };

    let mut response = match cart_node {
        None | Some(Value::Null) => TransportResponse::cart_missing(),
        Some(node) => TransportResponse::with_cart(&flatten_cart(node)?)?,
    };
    response.errors = errors;
    response.user_errors = user_errors;
    Ok(response)
}

fn error_record(raw: &Value) -> ErrorRecord {
    let message = raw
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("unknown error");
    let record = ErrorRecord::new(message);
    match raw.pointer("/extensions/code").and_then(Value::as_str) {
        Some(code) => record.with_code(code),
        None => record,
    }
}

fn user_error_record(raw: &Value) -> UserErrorRecord {
    let mut record = UserErrorRecord::new(
        raw.get("message")
            .and_then(Value::as_str)
            .unwrap_or("invalid input"),
    );
    // `field` is null for errors not tied to an input.
    record.field = raw
        .get("field")
        .and_then(Value::as_array)
        .map(|path| {
            path.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    record.code = raw.get("code").and_then(Value::as_str).map(str::to_string);
    record
}

fn str_at<'a>(node: &'a Value, pointer: &str) -> TransportResult<&'a str> {
    node.pointer(pointer)
        .and_then(Value::as_str)
        .ok_or_else(|| TransportError::Decode(format!("missing {}", pointer)))
}

fn money_at(node: &Value, pointer: &str) -> TransportResult<MoneyAmount> {
    let amount = Money::parse_decimal(str_at(node, &format!("{}/amount", pointer))?)
        .map_err(|e| TransportError::Decode(e.to_string()))?;
    let currency = str_at(node, &format!("{}/currencyCode", pointer))?;
    Ok(MoneyAmount::new(amount, currency))
}

fn u32_at(node: &Value, pointer: &str) -> TransportResult<u32> {
    node.pointer(pointer)
        .and_then(Value::as_u64)
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| TransportError::Decode(format!("invalid {}", pointer)))
}

fn flatten_line(node: &Value) -> TransportResult<CartLine> {
    let product_title = node
        .pointer("/merchandise/product/title")
        .and_then(Value::as_str);
    let variant_title = str_at(node, "/merchandise/title")?;
    let title = match product_title {
        Some(product) if variant_title == DEFAULT_VARIANT_TITLE => product.to_string(),
        Some(product) => format!("{} - {}", product, variant_title),
        None => variant_title.to_string(),
    };

    Ok(CartLine {
        id: str_at(node, "/id")?.to_string(),
        variant_id: str_at(node, "/merchandise/id")?.to_string(),
        title,
        unit_price: money_at(node, "/merchandise/price")?,
        line_total: money_at(node, "/cost/totalAmount")?,
        quantity: u32_at(node, "/quantity")?,
        available_for_sale: node
            .pointer("/merchandise/availableForSale")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        quantity_available: node
            .pointer("/merchandise/quantityAvailable")
            .and_then(Value::as_i64)
            .unwrap_or(0),
    })
}

fn flatten_cart(node: &Value) -> TransportResult<Cart> {
    let lines = match node.pointer("/lines/edges").and_then(Value::as_array) {
        Some(edges) => edges
            .iter()
            .map(|edge| {
                edge.get("node")
                    .ok_or_else(|| TransportError::Decode("line edge without node".into()))
                    .and_then(flatten_line)
            })
            .collect::<TransportResult<Vec<_>>>()?,
        None => Vec::new(),
    };

    Ok(Cart {
        id: CartIdentifier::new(str_at(node, "/id")?)
            .map_err(|e| TransportError::Decode(e.to_string()))?,
        total_quantity: u32_at(node, "/totalQuantity")?,
        total_amount: money_at(node, "/cost/totalAmount")?,
        checkout_url: str_at(node, "/checkoutUrl")?.to_string(),
        lines,
    })
}
