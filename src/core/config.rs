/*!
 * Broker Configuration
 *
 * Process-level settings read from the environment at startup.
 *
 * Environment variables:
 * - BROKER_ADDR: listen address (default: 0.0.0.0:8080)
 * - BROKER_REQUEST_TIMEOUT_MS: upper bound for a single request (default: 1000)
 * - BROKER_QUEUE_MAX_SIZE: per-topic buffer capacity (default: 2)
 * - BROKER_QUEUES_MAX_COUNT: maximum number of topics (default: 2)
 * - BROKER_MAX_CONNECTIONS: concurrent client connections (default: 1024)
 */

use super::errors::{BrokerError, BrokerResult};
use super::limits::{
    DEFAULT_LISTEN_ADDR, DEFAULT_MAX_CONNECTIONS, DEFAULT_MAX_TOPICS, DEFAULT_REQUEST_TIMEOUT,
    DEFAULT_TOPIC_CAPACITY, MAX_TOPIC_CAPACITY,
};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

pub const ENV_ADDR: &str = "BROKER_ADDR";
pub const ENV_REQUEST_TIMEOUT_MS: &str = "BROKER_REQUEST_TIMEOUT_MS";
pub const ENV_QUEUE_MAX_SIZE: &str = "BROKER_QUEUE_MAX_SIZE";
pub const ENV_QUEUES_MAX_COUNT: &str = "BROKER_QUEUES_MAX_COUNT";
pub const ENV_MAX_CONNECTIONS: &str = "BROKER_MAX_CONNECTIONS";

/// Limits the topic registry is constructed with. Immutable for its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryLimits {
    /// Maximum number of distinct topics
    pub max_topics: usize,
    /// Buffer capacity applied to every topic
    pub topic_capacity: usize,
}

impl RegistryLimits {
    pub const fn new(max_topics: usize, topic_capacity: usize) -> Self {
        Self {
            max_topics,
            topic_capacity,
        }
    }

    pub fn validate(&self) -> BrokerResult<()> {
        if self.max_topics == 0 {
            return Err(BrokerError::InvalidConfig(
                "max topics must be at least 1".into(),
            ));
        }
        if self.topic_capacity == 0 || self.topic_capacity > MAX_TOPIC_CAPACITY {
            return Err(BrokerError::InvalidConfig(format!(
                "topic capacity must be within 1..={}, got {}",
                MAX_TOPIC_CAPACITY, self.topic_capacity
            )));
        }
        Ok(())
    }
}

impl Default for RegistryLimits {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TOPICS, DEFAULT_TOPIC_CAPACITY)
    }
}

/// Full process configuration
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrokerConfig {
    pub listen_addr: SocketAddr,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub request_timeout: Duration,
    pub topic_capacity: usize,
    pub max_topics: usize,
    pub max_connections: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            topic_capacity: DEFAULT_TOPIC_CAPACITY,
            max_topics: DEFAULT_MAX_TOPICS,
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

impl BrokerConfig {
    /// Load configuration from process environment variables
    pub fn from_env() -> BrokerResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup; missing keys fall back to defaults
    pub fn from_lookup<F>(lookup: F) -> BrokerResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let default_addr = DEFAULT_LISTEN_ADDR
            .parse::<SocketAddr>()
            .map_err(|e| BrokerError::InvalidConfig(format!("{} default: {}", ENV_ADDR, e)))?;
        let listen_addr = parse_or(&lookup, ENV_ADDR, default_addr)?;
        let timeout_ms: u64 = parse_or(
            &lookup,
            ENV_REQUEST_TIMEOUT_MS,
            DEFAULT_REQUEST_TIMEOUT.as_millis() as u64,
        )?;
        let topic_capacity: usize = parse_or(&lookup, ENV_QUEUE_MAX_SIZE, DEFAULT_TOPIC_CAPACITY)?;
        let max_topics: usize = parse_or(&lookup, ENV_QUEUES_MAX_COUNT, DEFAULT_MAX_TOPICS)?;
        let max_connections: usize =
            parse_or(&lookup, ENV_MAX_CONNECTIONS, DEFAULT_MAX_CONNECTIONS)?;

        let config = Self {
            listen_addr,
            request_timeout: Duration::from_millis(timeout_ms),
            topic_capacity,
            max_topics,
            max_connections,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> BrokerResult<()> {
        self.limits().validate()?;
        if self.request_timeout.is_zero() {
            return Err(BrokerError::InvalidConfig(format!(
                "{} must be positive",
                ENV_REQUEST_TIMEOUT_MS
            )));
        }
        if self.max_connections == 0 {
            return Err(BrokerError::InvalidConfig(format!(
                "{} must be at least 1",
                ENV_MAX_CONNECTIONS
            )));
        }
        Ok(())
    }

    pub fn limits(&self) -> RegistryLimits {
        RegistryLimits::new(self.max_topics, self.topic_capacity)
    }

    /// Single-line JSON rendering for startup logs
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| format!("<unserializable config: {}>", e))
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> BrokerResult<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| BrokerError::InvalidConfig(format!("{}={:?}: {}", key, raw, e))),
        None => Ok(default),
    }
}
