//! The lookup wire contract.
//!
//! A request is the bare digest, written as ASCII `0`/`1` characters without
//! any framing. The response is a single JSON object, either
//! `{"Product": <string>, "Price": <number>}` or `{"error": <string>}`, after
//! which the server closes the connection. One exchange per connection.
//!
//! Since neither direction is length prefixed, the end of a response is only
//! known from the server closing the connection. Readers therefore read until
//! end of stream, bounded by [`MAX_RESPONSE_BYTES`].

use serde::{Deserialize, Serialize};

use crate::catalog::{CatalogEntry, Price};
use crate::error::{BarscanError, Result};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8888;

/// Upper bound of the single read that receives a request.
pub const REQUEST_BUFFER_BYTES: usize = 1024;
/// Upper bound of a response accepted by the client.
pub const MAX_RESPONSE_BYTES: usize = 64 * 1024;

pub const NOT_FOUND_MESSAGE: &str = "Invalid barcode";
pub const MALFORMED_MESSAGE: &str = "Malformed barcode";
pub const UNREACHABLE_MESSAGE: &str = "Connection failed";

// ------------- LookupRequest -------------
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LookupRequest {
    digest: String,
}

impl LookupRequest {
    /// Validates a digest of exactly `width` binary digits. Surrounding
    /// whitespace is not significant.
    pub fn new(digest: &str, width: usize) -> Result<Self> {
        let digest = digest.trim();
        if digest.len() != width {
            return Err(BarscanError::MalformedRequest {
                reason: format!("expected {width} binary digits, got {}", digest.chars().count()),
            });
        }
        if let Some(symbol) = digest.chars().find(|c| *c != '0' && *c != '1') {
            return Err(BarscanError::MalformedRequest {
                reason: format!("unexpected symbol {symbol:?}"),
            });
        }
        Ok(Self {
            digest: digest.to_owned(),
        })
    }
    /// Decodes the bytes of one read from the wire.
    pub fn from_bytes(bytes: &[u8], width: usize) -> Result<Self> {
        let text = std::str::from_utf8(bytes).map_err(|e| BarscanError::MalformedRequest {
            reason: format!("request is not UTF-8: {e}"),
        })?;
        Self::new(text, width)
    }
    pub fn digest(&self) -> &str {
        &self.digest
    }
    pub fn as_bytes(&self) -> &[u8] {
        self.digest.as_bytes()
    }
}

// ------------- LookupResponse -------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupResponse {
    Found { name: String, price: Price },
    NotFound,
    Malformed { reason: String },
    // never sent by a server, stands in for a failed exchange on the client
    Unreachable { reason: String },
}

// Shape of the JSON object on the wire. Older servers capitalise the error key.
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum WireResponse {
    Product {
        #[serde(rename = "Product")]
        product: String,
        #[serde(rename = "Price")]
        price: f64,
    },
    Error {
        #[serde(alias = "Error")]
        error: String,
    },
}

impl LookupResponse {
    pub fn found(entry: &CatalogEntry) -> Self {
        LookupResponse::Found {
            name: entry.name().to_owned(),
            price: entry.price().clone(),
        }
    }
    pub fn is_found(&self) -> bool {
        matches!(self, LookupResponse::Found { .. })
    }
    /// Message carried by the error object, `None` for a found product.
    pub fn error_message(&self) -> Option<String> {
        match self {
            LookupResponse::Found { .. } => None,
            LookupResponse::NotFound => Some(NOT_FOUND_MESSAGE.to_owned()),
            LookupResponse::Malformed { reason } if reason.is_empty() => Some(MALFORMED_MESSAGE.to_owned()),
            LookupResponse::Malformed { reason } => Some(format!("{MALFORMED_MESSAGE}: {reason}")),
            LookupResponse::Unreachable { .. } => Some(UNREACHABLE_MESSAGE.to_owned()),
        }
    }
    fn to_wire(&self) -> WireResponse {
        match self {
            LookupResponse::Found { name, price } => WireResponse::Product {
                product: name.clone(),
                price: price.to_f64(),
            },
            other => WireResponse::Error {
                error: other.error_message().unwrap_or_default(),
            },
        }
    }
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.to_wire())?)
    }
    pub fn to_value(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self.to_wire())?)
    }
    /// Classifies a server response. Error messages are matched by their
    /// prefix, anything not recognised counts as a catalog miss.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let response = match serde_json::from_slice::<WireResponse>(bytes)? {
            WireResponse::Product { product, price } => match Price::from_f64(price) {
                Some(price) => LookupResponse::Found { name: product, price },
                None => LookupResponse::Malformed {
                    reason: format!("server sent an invalid price {price}"),
                },
            },
            WireResponse::Error { error } => {
                if let Some(reason) = error.strip_prefix(MALFORMED_MESSAGE) {
                    LookupResponse::Malformed {
                        reason: reason.trim_start_matches(':').trim().to_owned(),
                    }
                } else if error == UNREACHABLE_MESSAGE {
                    LookupResponse::Unreachable { reason: error }
                } else {
                    LookupResponse::NotFound
                }
            }
        };
        Ok(response)
    }
}
