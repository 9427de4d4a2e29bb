use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::catalog::Catalog;
use crate::error::{BarscanError, Result};
use crate::protocol::{LookupRequest, LookupResponse, REQUEST_BUFFER_BYTES};

/// Answers lookups against a frozen catalog, one task per connection.
#[derive(Clone)]
pub struct BarcodeServer {
    catalog: Arc<Catalog>,
    read_timeout: Option<Duration>,
}

impl BarcodeServer {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            catalog,
            read_timeout: None,
        }
    }
    /// Bounds how long a connection may stay silent before it is dropped.
    /// Without a bound a client that never writes holds its task forever.
    pub fn with_read_timeout(mut self, read_timeout: Option<Duration>) -> Self {
        self.read_timeout = read_timeout;
        self
    }
    pub async fn bind(host: &str, port: u16) -> Result<TcpListener> {
        Ok(TcpListener::bind((host, port)).await?)
    }

    /// Binds and serves until `shutdown` is cancelled.
    pub async fn start(self, host: &str, port: u16, shutdown: CancellationToken) -> Result<()> {
        let listener = Self::bind(host, port).await?;
        self.serve(listener, shutdown).await
    }

    /// Accept loop. Every connection is handled on its own task, and a
    /// failing connection is logged without affecting the loop.
    pub async fn serve(self, listener: TcpListener, shutdown: CancellationToken) -> Result<()> {
        let address = listener.local_addr()?;
        info!(%address, width = self.catalog.digest_width(), "barcode server listening");
        let mut incoming = TcpListenerStream::new(listener);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!(%address, "barcode server shutdown");
                    break;
                }
                accepted = incoming.next() => match accepted {
                    Some(Ok(stream)) => {
                        let peer = stream
                            .peer_addr()
                            .map(|peer| peer.to_string())
                            .unwrap_or_else(|_| String::from("unknown"));
                        let catalog = Arc::clone(&self.catalog);
                        let read_timeout = self.read_timeout;
                        tokio::spawn(async move {
                            match handle_connection(stream, &catalog, read_timeout).await {
                                Ok(response) => debug!(%peer, found = response.is_found(), "connection closed"),
                                Err(e) => error!(%peer, error = %e, "error handling client"),
                            }
                        });
                    }
                    Some(Err(e)) => error!(error = %e, "failed to accept connection"),
                    None => break,
                }
            }
        }
        Ok(())
    }

    /// Serves on a background task, returning a handle to stop it.
    pub fn spawn(self, listener: TcpListener) -> Result<RunningServer> {
        let address = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(self.serve(listener, shutdown.clone()));
        Ok(RunningServer {
            address,
            shutdown,
            task,
        })
    }
}

pub struct RunningServer {
    address: SocketAddr,
    shutdown: CancellationToken,
    task: JoinHandle<Result<()>>,
}

impl RunningServer {
    pub fn address(&self) -> SocketAddr {
        self.address
    }
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }
    /// Cancels the accept loop and waits for it to wind down. Connections
    /// already accepted finish on their own tasks.
    pub async fn stop(self) -> Result<()> {
        self.shutdown.cancel();
        self.task
            .await
            .map_err(|e| BarscanError::Handler(format!("server task failed: {e}")))?
    }
}

/// One exchange: read the request, resolve it, write the response, close.
/// A peer that closes its side without sending anything made an empty
/// request and still gets an answer.
pub async fn handle_connection<S>(
    mut stream: S,
    catalog: &Catalog,
    read_timeout: Option<Duration>,
) -> Result<LookupResponse>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buffer = [0u8; REQUEST_BUFFER_BYTES];
    let read = match read_timeout {
        Some(limit) => tokio::time::timeout(limit, stream.read(&mut buffer))
            .await
            .map_err(|_| BarscanError::Handler(format!("no request within {limit:?}")))??,
        None => stream.read(&mut buffer).await?,
    };
    let response = resolve(catalog, &buffer[..read]);
    stream.write_all(&response.to_json()?).await?;
    stream.flush().await?;
    // the response is already written
    if let Err(e) = stream.shutdown().await {
        debug!(error = %e, "peer gone before shutdown");
    }
    Ok(response)
}

/// Maps raw request bytes to the response the server sends.
pub fn resolve(catalog: &Catalog, request: &[u8]) -> LookupResponse {
    debug!(request = %String::from_utf8_lossy(request).trim(), "received encoded barcode");
    match LookupRequest::from_bytes(request, catalog.digest_width()) {
        Ok(request) => match catalog.lookup_by_digest(request.digest()) {
            Some(entry) => {
                info!(digest = %request.digest(), product = %entry.name(), "barcode resolved");
                LookupResponse::found(&entry)
            }
            None => {
                info!(digest = %request.digest(), "barcode not in catalog");
                LookupResponse::NotFound
            }
        },
        Err(BarscanError::MalformedRequest { reason }) => {
            warn!(%reason, "malformed barcode");
            LookupResponse::Malformed { reason }
        }
        Err(e) => LookupResponse::Malformed {
            reason: e.to_string(),
        },
    }
}
