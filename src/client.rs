use std::time::Duration;

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::error::{BarscanError, Result};
use crate::protocol::{LookupResponse, MAX_RESPONSE_BYTES};

/// What the cart driver does with tokens of the wrong width. Tokens of the
/// right width always go to the server, which judges their symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MalformedTokenPolicy {
    /// Leave them out of the cart without a trace in the receipt.
    #[default]
    Skip,
    /// Keep them as `Malformed` lines, without asking the server.
    Report,
}

/// One requested code and what became of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLine {
    pub code: String,
    pub response: LookupResponse,
}

impl CartLine {
    pub fn new(code: impl Into<String>, response: LookupResponse) -> Self {
        Self {
            code: code.into(),
            response,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BarcodeClient {
    address: String,
    digest_width: usize,
    connect_timeout: Option<Duration>,
    read_timeout: Option<Duration>,
    policy: MalformedTokenPolicy,
}

impl BarcodeClient {
    pub fn new(address: impl Into<String>, digest_width: usize) -> Self {
        Self {
            address: address.into(),
            digest_width,
            connect_timeout: None,
            read_timeout: None,
            policy: MalformedTokenPolicy::default(),
        }
    }
    pub fn with_connect_timeout(mut self, connect_timeout: Option<Duration>) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }
    /// Bounds the wait for a response once connected.
    pub fn with_read_timeout(mut self, read_timeout: Option<Duration>) -> Self {
        self.read_timeout = read_timeout;
        self
    }
    pub fn with_policy(mut self, policy: MalformedTokenPolicy) -> Self {
        self.policy = policy;
        self
    }
    pub fn address(&self) -> &str {
        &self.address
    }
    pub fn digest_width(&self) -> usize {
        self.digest_width
    }

    /// Looks up one digest on a fresh connection. Transport failures do not
    /// escape, they come back as `Unreachable`.
    pub async fn lookup_one(&self, digest: &str) -> LookupResponse {
        match self.exchange(digest).await {
            Ok(response) => response,
            Err(e) => {
                warn!(barcode = %digest, error = %e, "connection failed");
                LookupResponse::Unreachable {
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn exchange(&self, digest: &str) -> Result<LookupResponse> {
        let mut stream = match self.connect_timeout {
            Some(limit) => tokio::time::timeout(limit, TcpStream::connect(self.address.as_str()))
                .await
                .map_err(|_| BarscanError::Transport(format!("connect timed out after {limit:?}")))??,
            None => TcpStream::connect(self.address.as_str()).await?,
        };
        let response = match self.read_timeout {
            Some(limit) => tokio::time::timeout(limit, request(&mut stream, digest))
                .await
                .map_err(|_| BarscanError::Transport(format!("no response within {limit:?}")))??,
            None => request(&mut stream, digest).await?,
        };
        if response.is_empty() {
            return Err(BarscanError::Transport(String::from(
                "server closed the connection without a response",
            )));
        }
        debug!(barcode = %digest, bytes = response.len(), "response received");
        LookupResponse::from_json(&response)
    }

    /// Resolves the tokens of one cart in order, each awaited before the
    /// next is sent. Tokens of the wrong width follow the client's
    /// [`MalformedTokenPolicy`].
    pub async fn lookup_cart(&self, tokens: &[String]) -> Vec<CartLine> {
        let mut lines = Vec::with_capacity(tokens.len());
        for token in tokens {
            let token = token.trim();
            let width = token.chars().count();
            if width != self.digest_width {
                let reason = format!("expected {} binary digits, got {width}", self.digest_width);
                match self.policy {
                    MalformedTokenPolicy::Skip => debug!(%token, %reason, "skipping malformed token"),
                    MalformedTokenPolicy::Report => {
                        lines.push(CartLine::new(token, LookupResponse::Malformed { reason }));
                    }
                }
                continue;
            }
            let response = self.lookup_one(token).await;
            match &response {
                LookupResponse::Found { name, price } => info!(barcode = %token, product = %name, %price, "resolved"),
                other => warn!(barcode = %token, error = ?other.error_message(), "not resolved"),
            }
            lines.push(CartLine::new(token, response));
        }
        lines
    }

    /// Drives the carts one after another.
    pub async fn lookup_carts(&self, carts: &[Vec<String>]) -> Vec<Vec<CartLine>> {
        let mut resolved = Vec::with_capacity(carts.len());
        for (index, cart) in carts.iter().enumerate() {
            info!(cart = index + 1, codes = cart.len(), "sending cart");
            resolved.push(self.lookup_cart(cart).await);
        }
        resolved
    }

    /// Drives all carts at once. Lookups inside a cart stay sequential and
    /// the result keeps the order in which the carts were given.
    pub async fn lookup_carts_concurrently(&self, carts: &[Vec<String>]) -> Vec<Vec<CartLine>> {
        join_all(carts.iter().map(|cart| self.lookup_cart(cart))).await
    }
}

async fn request(stream: &mut TcpStream, digest: &str) -> Result<Vec<u8>> {
    stream.write_all(digest.as_bytes()).await?;
    stream.flush().await?;
    // The server closes after one response, so end of stream ends it.
    let mut response = Vec::new();
    stream.take(MAX_RESPONSE_BYTES as u64).read_to_end(&mut response).await?;
    Ok(response)
}
