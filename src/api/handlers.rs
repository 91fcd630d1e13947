/*!
 * Request Handlers
 * Route decoded requests to the topic registry and map outcomes to statuses
 */

use super::protocol::{Request, Response};
use super::traits::ApiHandler;
use super::types::{status, RequestMetadata};
use crate::core::cancel::CancelToken;
use crate::core::errors::BrokerError;
use crate::monitoring::RequestSpan;
use crate::queue::TopicRegistry;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, Instrument};

/// Status code for a broker error
pub fn status_for(err: &BrokerError) -> u16 {
    match err.root() {
        BrokerError::WaitTimeout => status::NOT_FOUND,
        BrokerError::TopicLimitReached { .. } => status::TOO_MANY_REQUESTS,
        BrokerError::PutCancelled { .. } | BrokerError::Closed => status::UNAVAILABLE,
        _ => status::INTERNAL_ERROR,
    }
}

/// Handler serving PUT/GET/STATS against a shared registry
pub struct BrokerHandler {
    registry: Arc<TopicRegistry<String>>,
}

impl BrokerHandler {
    pub fn new(registry: Arc<TopicRegistry<String>>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<TopicRegistry<String>> {
        &self.registry
    }

    async fn dispatch(&self, request: Request, cancel: CancelToken) -> Response {
        match request {
            Request::Put { queue, message } => {
                match self.registry.put_to(&queue, message, &cancel).await {
                    Ok(()) => Response::ok(),
                    Err(e) => error_response("PUT", &e),
                }
            }
            Request::Get { queue, timeout } => {
                let cancel = match timeout {
                    Some(secs) => cancel.child_with_timeout(Duration::from_secs(secs)),
                    None => cancel,
                };
                match self.registry.get_from(&queue, &cancel).await {
                    Ok(message) => Response::with_message(message),
                    Err(e) => error_response("GET", &e),
                }
            }
            Request::Stats { queue } => match self.registry.stats(&queue) {
                Some(stats) => Response::with_stats(stats),
                None => Response::error(status::NOT_FOUND, format!("unknown queue {}", queue)),
            },
        }
    }
}

fn error_response(method: &str, err: &BrokerError) -> Response {
    let code = status_for(err);
    if code == status::INTERNAL_ERROR {
        error!(method, error = %err, "Request failed");
    } else {
        debug!(method, status = code, error = %err, "Request rejected");
    }
    Response::error(code, err.to_string())
}

impl ApiHandler for BrokerHandler {
    fn handle(
        &self,
        request: Request,
        metadata: RequestMetadata,
    ) -> Pin<Box<dyn Future<Output = Response> + Send + '_>> {
        let span = RequestSpan::new(request.method(), request.queue());
        let instrumented = span.span().clone();

        Box::pin(
            async move {
                let response = self.dispatch(request, metadata.cancel).await;
                span.record_status(response.status);
                response
            }
            .instrument(instrumented),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::RegistryLimits;

    fn handler(max_topics: usize, capacity: usize) -> BrokerHandler {
        let registry = TopicRegistry::new(RegistryLimits::new(max_topics, capacity)).unwrap();
        BrokerHandler::new(Arc::new(registry))
    }

    fn metadata(timeout_ms: u64) -> RequestMetadata {
        RequestMetadata::new(CancelToken::with_timeout(Duration::from_millis(timeout_ms)))
    }

    fn put(queue: &str, message: &str) -> Request {
        Request::Put {
            queue: queue.into(),
            message: message.into(),
        }
    }

    fn get(queue: &str) -> Request {
        Request::Get {
            queue: queue.into(),
            timeout: None,
        }
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(&BrokerError::WaitTimeout.in_topic("q")), 404);
        assert_eq!(
            status_for(&BrokerError::TopicLimitReached { max_topics: 1 }),
            429
        );
        assert_eq!(status_for(&BrokerError::PutCancelled { capacity: 1 }), 503);
        assert_eq!(status_for(&BrokerError::Closed.in_topic("q")), 503);
        assert_eq!(status_for(&BrokerError::InvalidConfig("x".into())), 500);
    }

    #[tokio::test]
    async fn test_put_get_round_trip() {
        let handler = handler(2, 2);

        assert_eq!(handler.handle(put("q", "m1"), metadata(200)).await, Response::ok());
        let response = handler.handle(get("q"), metadata(200)).await;
        assert_eq!(response, Response::with_message("m1".into()));

        handler.registry().close_all().await;
    }

    #[tokio::test]
    async fn test_get_timeout_is_not_found() {
        let handler = handler(2, 2);

        let response = handler.handle(get("q"), metadata(30)).await;
        assert_eq!(response.status, status::NOT_FOUND);
        assert_eq!(response.error.as_deref(), Some("topic q: didn't wait for the message"));

        handler.registry().close_all().await;
    }

    #[tokio::test]
    async fn test_huge_get_timeout_falls_back_to_server_timeout() {
        let handler = handler(2, 2);
        let request = Request::decode(
            r#"{"method":"GET","queue":"q","timeout":18446744073709551615}"#,
        )
        .unwrap();

        let response = handler.handle(request, metadata(30)).await;
        assert_eq!(response.status, status::NOT_FOUND);

        handler.registry().close_all().await;
    }

    #[tokio::test]
    async fn test_topic_limit_and_stats() {
        let handler = handler(1, 2);

        assert!(handler.handle(put("a", "x"), metadata(200)).await.is_success());
        let response = handler.handle(put("b", "x"), metadata(200)).await;
        assert_eq!(response.status, status::TOO_MANY_REQUESTS);

        let stats = handler
            .handle(Request::Stats { queue: "a".into() }, metadata(200))
            .await;
        assert_eq!(stats.stats.map(|s| s.buffered), Some(1));

        let missing = handler
            .handle(Request::Stats { queue: "b".into() }, metadata(200))
            .await;
        assert_eq!(missing.status, status::NOT_FOUND);

        handler.registry().close_all().await;
    }
}
