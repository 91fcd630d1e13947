/*!
 * Core Module
 * Shared building blocks: errors, limits, configuration, cancellation
 */

pub mod cancel;
pub mod config;
pub mod errors;
pub mod limits;

pub use cancel::CancelToken;
pub use config::{BrokerConfig, RegistryLimits};
pub use errors::{BrokerError, BrokerResult};
