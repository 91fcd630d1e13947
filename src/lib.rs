/*!
 * Queue Broker Library
 *
 * In-memory message broker with named topics. Producers put messages,
 * consumers block until a message arrives or their wait is cancelled.
 */

pub mod api;
pub mod core;
pub mod monitoring;
pub mod queue;

// Re-exports
pub use api::{ApiError, ApiHandler, BrokerHandler, BrokerServer, Request, Response, ServerConfig};
pub use crate::core::{BrokerConfig, BrokerError, BrokerResult, CancelToken, RegistryLimits};
pub use monitoring::init_tracing;
pub use queue::{EngineState, EngineStats, QueueEngine, TopicRegistry};
