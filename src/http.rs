use std::sync::Arc;
use axum::{routing::post, Router, Json};
use tower_http::cors::{CorsLayer, Any};
use serde::{Deserialize, Serialize};
use axum::http::StatusCode;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use crate::catalog::Catalog;
use crate::client::{CartLine, MalformedTokenPolicy};
use crate::error::Result;
use crate::protocol::LookupResponse;
use crate::receipt::Receipt;
use crate::server::resolve;

#[derive(Deserialize)]
pub struct LookupBody {
    pub barcode: String,
}

#[derive(Deserialize)]
pub struct ReceiptBody {
    pub codes: Vec<String>,
    #[serde(default)]
    pub malformed_tokens: MalformedTokenPolicy,
}

#[derive(Serialize)]
pub struct ReceiptResponse {
    pub status: String,
    pub elapsed_ms: f64,
    pub receipt: Receipt,
}

/// JSON over HTTP view of the same catalog the TCP server answers from.
pub fn router(catalog: Arc<Catalog>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([axum::http::Method::POST])
        .allow_headers(Any);
    let lookup_catalog = Arc::clone(&catalog);
    Router::new()
        .route("/v1/lookup", post(move |Json(req): Json<LookupBody>| {
            let catalog = Arc::clone(&lookup_catalog);
            async move {
                let response = resolve(&catalog, req.barcode.as_bytes());
                let status = match response {
                    LookupResponse::Found { .. } => StatusCode::OK,
                    LookupResponse::NotFound => StatusCode::NOT_FOUND,
                    LookupResponse::Malformed { .. } | LookupResponse::Unreachable { .. } => StatusCode::BAD_REQUEST,
                };
                match response.to_value() {
                    Ok(body) => (status, Json(body)),
                    Err(e) => {
                        warn!(error = %e, "lookup serialization failed");
                        (StatusCode::INTERNAL_SERVER_ERROR, Json(serde_json::json!({ "error": e.to_string() })))
                    }
                }
            }
        }))
        .route("/v1/receipt", post(move |Json(req): Json<ReceiptBody>| {
            let catalog = Arc::clone(&catalog);
            async move {
                let started = std::time::Instant::now();
                let width = catalog.digest_width();
                let mut lines = Vec::with_capacity(req.codes.len());
                for code in &req.codes {
                    let code = code.trim();
                    if code.chars().count() != width && req.malformed_tokens == MalformedTokenPolicy::Skip {
                        continue;
                    }
                    lines.push(CartLine::new(code, resolve(&catalog, code.as_bytes())));
                }
                let receipt = Receipt::build(1, &lines);
                let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
                info!(ms = elapsed_ms, lines = receipt.lines().len(), total = %receipt.total(), "receipt complete");
                (StatusCode::OK, Json(ReceiptResponse { status: "ok".into(), elapsed_ms, receipt }))
            }
        }))
        .layer(cors)
}

/// Serves the gateway until `shutdown` is cancelled.
pub async fn serve(listener: TcpListener, catalog: Arc<Catalog>, shutdown: CancellationToken) -> Result<()> {
    let address = listener.local_addr()?;
    info!(%address, "http gateway listening");
    axum::serve(listener, router(catalog))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    info!(%address, "http gateway shutdown");
    Ok(())
}
