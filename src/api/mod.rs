/*!
 * API Module
 * External interface: line-delimited JSON over TCP
 */

pub mod handlers;
pub mod protocol;
pub mod server;
pub mod traits;
pub mod types;

// Re-export for convenience
pub use handlers::{status_for, BrokerHandler};
pub use protocol::{Request, Response};
pub use server::BrokerServer;
pub use traits::ApiHandler;
pub use types::*;
