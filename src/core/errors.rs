/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Broker operation result
pub type BrokerResult<T> = Result<T, BrokerError>;

/// Queue engine and topic registry errors with serialization support
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum BrokerError {
    #[error("maximum of {max_topics} topics reached")]
    #[diagnostic(
        code(registry::topic_limit_reached),
        help("Reuse an existing topic name or raise BROKER_QUEUES_MAX_COUNT.")
    )]
    TopicLimitReached { max_topics: usize },

    #[error("didn't wait for the message")]
    #[diagnostic(
        code(queue::wait_timeout),
        help("No message was dispatched before the wait was cancelled. Retry or use a longer timeout.")
    )]
    WaitTimeout,

    #[error("buffer stayed full (capacity {capacity}), message not enqueued")]
    #[diagnostic(
        code(queue::put_cancelled),
        help("The producer gave up while the topic buffer was full. The message was not stored.")
    )]
    PutCancelled { capacity: usize },

    #[error("queue is closed")]
    #[diagnostic(
        code(queue::closed),
        help("The broker is shutting down and no longer accepts or delivers messages.")
    )]
    Closed,

    #[error("invalid configuration: {0}")]
    #[diagnostic(
        code(config::invalid),
        help("Check the BROKER_* environment variables.")
    )]
    InvalidConfig(String),

    #[error("topic {topic}: {source}")]
    #[diagnostic(code(registry::topic))]
    Topic {
        topic: String,
        #[source]
        source: Box<BrokerError>,
    },
}

impl BrokerError {
    /// Annotate an engine error with the topic it came from
    pub fn in_topic(self, topic: &str) -> Self {
        BrokerError::Topic {
            topic: topic.to_string(),
            source: Box::new(self),
        }
    }

    /// The underlying error with all topic annotations removed
    pub fn root(&self) -> &BrokerError {
        match self {
            BrokerError::Topic { source, .. } => source.root(),
            other => other,
        }
    }

    /// Topic name attached to this error, if any
    pub fn topic(&self) -> Option<&str> {
        match self {
            BrokerError::Topic { topic, .. } => Some(topic),
            _ => None,
        }
    }

    pub fn is_wait_timeout(&self) -> bool {
        matches!(self.root(), BrokerError::WaitTimeout)
    }

    pub fn is_topic_limit(&self) -> bool {
        matches!(self.root(), BrokerError::TopicLimitReached { .. })
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.root(), BrokerError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_annotation_keeps_root() {
        let err = BrokerError::WaitTimeout.in_topic("orders");

        assert_eq!(err.topic(), Some("orders"));
        assert_eq!(err.root(), &BrokerError::WaitTimeout);
        assert!(err.is_wait_timeout());
        assert!(!err.is_closed());
        assert_eq!(err.to_string(), "topic orders: didn't wait for the message");
    }

    #[test]
    fn test_serde_tagging() {
        let err = BrokerError::TopicLimitReached { max_topics: 3 };
        let json = serde_json::to_string(&err).unwrap();
        assert_eq!(
            json,
            r#"{"error_type":"topic_limit_reached","details":{"max_topics":3}}"#
        );

        let back: BrokerError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, err);
    }

    #[test]
    fn test_diagnostic_code() {
        let err = BrokerError::Closed;
        let code = err.code().map(|c| c.to_string());
        assert_eq!(code.as_deref(), Some("queue::closed"));
    }
}
