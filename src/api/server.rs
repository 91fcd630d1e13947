/*!
 * Broker Server
 *
 * TCP listener speaking the line protocol. Each connection runs in its own
 * task and serves its requests sequentially.
 *
 * # Shutdown
 *
 * When the shutdown token fires the accept loop stops, idle connections
 * close, and in-flight requests observe cancellation through their
 * per-request token. `run()` returns after every connection task finished.
 */

use super::protocol::{Request, Response};
use super::traits::ApiHandler;
use super::types::{status, ApiError, ApiResult, RequestMetadata, ServerConfig};
use crate::core::cancel::CancelToken;
use crate::core::limits::MAX_REQUEST_LINE_BYTES;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Bound listener plus everything needed to serve it
pub struct BrokerServer<H> {
    config: ServerConfig,
    listener: TcpListener,
    handler: Arc<H>,
    shutdown: CancelToken,
}

impl<H: ApiHandler + 'static> BrokerServer<H> {
    /// Bind the configured address; port 0 picks an ephemeral port
    pub async fn bind(
        config: ServerConfig,
        handler: Arc<H>,
        shutdown: CancelToken,
    ) -> ApiResult<Self> {
        let listener = TcpListener::bind(config.address)
            .await
            .map_err(|source| ApiError::Bind {
                address: config.address,
                source,
            })?;

        Ok(Self {
            config,
            listener,
            handler,
            shutdown,
        })
    }

    pub fn local_addr(&self) -> ApiResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until the shutdown token fires
    pub async fn run(self) -> ApiResult<()> {
        let address = self.local_addr()?;
        let limiter = Arc::new(Semaphore::new(self.config.max_connections));
        let mut connections = JoinSet::new();

        info!(
            %address,
            max_connections = self.config.max_connections,
            request_timeout_ms = self.config.request_timeout.as_millis() as u64,
            "Broker server listening"
        );

        loop {
            let permit = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                permit = Arc::clone(&limiter).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let (stream, peer) = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        warn!(error = %e, "Accept failed");
                        continue;
                    }
                },
            };

            debug!(%peer, "Connection accepted");
            connections.spawn(serve_connection(
                stream,
                peer,
                Arc::clone(&self.handler),
                self.config.request_timeout,
                self.shutdown.clone(),
                permit,
            ));

            // Reap finished connections so the set stays small
            while connections.try_join_next().is_some() {}
        }

        info!(
            open_connections = connections.len(),
            "Broker server stopped accepting"
        );
        while connections.join_next().await.is_some() {}
        info!("Broker server stopped");
        Ok(())
    }
}

async fn serve_connection<H: ApiHandler>(
    stream: TcpStream,
    peer: SocketAddr,
    handler: Arc<H>,
    request_timeout: Duration,
    shutdown: CancelToken,
    _permit: OwnedSemaphorePermit,
) {
    match handle_connection(stream, peer, handler.as_ref(), request_timeout, &shutdown).await {
        Ok(()) => debug!(%peer, "Connection closed"),
        Err(e) => debug!(%peer, error = %e, "Connection closed with error"),
    }
}

async fn handle_connection<H: ApiHandler>(
    stream: TcpStream,
    peer: SocketAddr,
    handler: &H,
    request_timeout: Duration,
    shutdown: &CancelToken,
) -> ApiResult<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut line = String::new();

    loop {
        line.clear();
        let mut limited = (&mut reader).take(MAX_REQUEST_LINE_BYTES as u64 + 1);
        let read = tokio::select! {
            biased;
            _ = shutdown.cancelled() => return Ok(()),
            read = limited.read_line(&mut line) => read?,
        };
        if read == 0 {
            return Ok(());
        }

        if line.len() > MAX_REQUEST_LINE_BYTES && !line.ends_with('\n') {
            let err = ApiError::RequestTooLarge {
                limit: MAX_REQUEST_LINE_BYTES,
            };
            let response = Response::error(status::BAD_REQUEST, err.to_string());
            write_half.write_all(response.encode().as_bytes()).await?;
            return Err(err);
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let response = match Request::decode(trimmed) {
            Ok(request) => {
                let metadata = RequestMetadata::new(shutdown.child_with_timeout(request_timeout))
                    .with_client_addr(peer);
                handler.handle(request, metadata).await
            }
            Err(e) => Response::error(status::BAD_REQUEST, e.to_string()),
        };

        write_half.write_all(response.encode().as_bytes()).await?;
    }
}
