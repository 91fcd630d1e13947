/*!
 * API Traits
 * Seam between the connection loop and request handling
 */

use super::protocol::{Request, Response};
use super::types::RequestMetadata;
use std::future::Future;
use std::pin::Pin;

/// Async request handler
///
/// Every outcome, including broker errors, is expressed as a [`Response`].
pub trait ApiHandler: Send + Sync {
    fn handle(
        &self,
        request: Request,
        metadata: RequestMetadata,
    ) -> Pin<Box<dyn Future<Output = Response> + Send + '_>>;
}
