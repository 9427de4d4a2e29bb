//! End-to-end runs: load the tables once, serve the frozen catalog and drive
//! the carts through it.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::catalog::Catalog;
use crate::client::BarcodeClient;
use crate::error::Result;
use crate::http;
use crate::ingest::{load_carts, load_catalog, load_encoding_table};
use crate::receipt::{Receipt, build_receipts};
use crate::server::BarcodeServer;
use crate::settings::Settings;

pub fn load_catalog_from(settings: &Settings) -> Result<Arc<Catalog>> {
    let table = load_encoding_table(&settings.data.encodings)?;
    let catalog = load_catalog(&settings.data.products, &table)?;
    Ok(Arc::new(catalog))
}

/// Starts the HTTP gateway when a port is configured.
async fn spawn_gateway(
    settings: &Settings,
    catalog: &Arc<Catalog>,
    shutdown: &CancellationToken,
) -> Result<Option<JoinHandle<Result<()>>>> {
    let Some(port) = settings.http.port else {
        return Ok(None);
    };
    let listener = TcpListener::bind((settings.server.host.as_str(), port)).await?;
    Ok(Some(tokio::spawn(http::serve(listener, Arc::clone(catalog), shutdown.clone()))))
}

async fn join_gateway(gateway: Option<JoinHandle<Result<()>>>) {
    if let Some(gateway) = gateway {
        match gateway.await {
            Ok(Ok(())) => (),
            Ok(Err(e)) => error!(error = %e, "http gateway failed"),
            Err(e) => error!(error = %e, "http gateway task failed"),
        }
    }
}

/// Serves `catalog`, resolves every cart through the server and stops the
/// server again. Receipts come back in cart order.
pub async fn run_carts(settings: &Settings, catalog: Arc<Catalog>, carts: &[Vec<String>]) -> Result<Vec<Receipt>> {
    let listener = BarcodeServer::bind(&settings.server.host, settings.server.port).await?;
    let server = BarcodeServer::new(Arc::clone(&catalog))
        .with_read_timeout(settings.server.read_timeout())
        .spawn(listener)?;
    let shutdown = server.shutdown_token();
    let gateway = spawn_gateway(settings, &catalog, &shutdown).await?;

    let client = BarcodeClient::new(server.address().to_string(), catalog.digest_width())
        .with_connect_timeout(settings.client.connect_timeout())
        .with_read_timeout(settings.client.read_timeout())
        .with_policy(settings.client.malformed_tokens);

    info!("===== CLIENT SESSION START =====");
    let resolved = if settings.client.concurrent_carts {
        client.lookup_carts_concurrently(carts).await
    } else {
        client.lookup_carts(carts).await
    };
    let receipts = build_receipts(&resolved);
    for receipt in &receipts {
        info!(cart = receipt.cart(), resolved = receipt.resolved(), lines = receipt.lines().len(), total = %receipt.total(), "cart total");
    }
    info!("===== CLIENT SESSION END =====");

    server.stop().await?;
    join_gateway(gateway).await;
    Ok(receipts)
}

/// The default mode: load everything from the configured files, run the
/// carts, then print and save the receipts.
pub async fn run(settings: &Settings) -> Result<Vec<Receipt>> {
    let catalog = load_catalog_from(settings)?;
    let carts = load_carts(&settings.data.carts)?;
    info!(carts = carts.len(), "carts loaded");
    run_carts(settings, catalog, &carts).await
}

/// Serves until `shutdown` is cancelled.
pub async fn serve(settings: &Settings, catalog: Arc<Catalog>, shutdown: CancellationToken) -> Result<()> {
    let gateway = spawn_gateway(settings, &catalog, &shutdown).await?;
    BarcodeServer::new(catalog)
        .with_read_timeout(settings.server.read_timeout())
        .start(&settings.server.host, settings.server.port, shutdown)
        .await?;
    join_gateway(gateway).await;
    Ok(())
}
