/*!
 * API Types
 * Common types for the broker transport layer
 */

use crate::core::cancel::CancelToken;
use crate::core::config::BrokerConfig;
use crate::core::limits::{DEFAULT_MAX_CONNECTIONS, DEFAULT_REQUEST_TIMEOUT};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

/// API operation result
pub type ApiResult<T> = Result<T, ApiError>;

/// Transport-level failures (distinct from broker outcomes, which become statuses)
#[derive(Error, Debug)]
pub enum ApiError {
    /// Request line could not be decoded
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Request line exceeded the configured bound
    #[error("request line exceeds {limit} bytes")]
    RequestTooLarge { limit: usize },

    /// Listener could not be bound
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Socket read/write failure
    #[error("connection I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Response status codes, mirroring their HTTP meaning
pub mod status {
    pub const OK: u16 = 200;
    pub const BAD_REQUEST: u16 = 400;
    pub const NOT_FOUND: u16 = 404;
    pub const TOO_MANY_REQUESTS: u16 = 429;
    pub const INTERNAL_ERROR: u16 = 500;
    pub const UNAVAILABLE: u16 = 503;
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub address: SocketAddr,
    pub max_connections: usize,
    /// Upper bound on any single request, including GET waits
    pub request_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: SocketAddr::from(([0, 0, 0, 0], 8080)),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl ServerConfig {
    pub fn new(address: SocketAddr) -> Self {
        Self {
            address,
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }
}

impl From<&BrokerConfig> for ServerConfig {
    fn from(config: &BrokerConfig) -> Self {
        Self {
            address: config.listen_addr,
            max_connections: config.max_connections,
            request_timeout: config.request_timeout,
        }
    }
}

/// Per-request context handed to the handler
#[derive(Debug, Clone)]
pub struct RequestMetadata {
    pub client_addr: Option<SocketAddr>,
    /// Fires on server shutdown or when the server-wide timeout elapses
    pub cancel: CancelToken,
}

impl RequestMetadata {
    pub fn new(cancel: CancelToken) -> Self {
        Self {
            client_addr: None,
            cancel,
        }
    }

    pub fn with_client_addr(mut self, addr: SocketAddr) -> Self {
        self.client_addr = Some(addr);
        self
    }
}
