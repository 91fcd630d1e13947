/*!
 * Topic Registry
 * Lazily creates, bounds, and routes to per-topic queue engines
 */

use super::engine::QueueEngine;
use super::types::EngineStats;
use crate::core::cancel::CancelToken;
use crate::core::config::RegistryLimits;
use crate::core::errors::{BrokerError, BrokerResult};
use ahash::RandomState;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

/// Topic name to engine mapping with a fixed topic limit
///
/// Engines are created on first use and never replaced or removed.
pub struct TopicRegistry<T> {
    topics: RwLock<HashMap<String, Arc<QueueEngine<T>>, RandomState>>,
    limits: RegistryLimits,
    created: AtomicU64,
    closed: AtomicBool,
}

impl<T: Send + 'static> TopicRegistry<T> {
    pub fn new(limits: RegistryLimits) -> BrokerResult<Self> {
        limits.validate()?;
        info!(
            max_topics = limits.max_topics,
            topic_capacity = limits.topic_capacity,
            "Topic registry initialized"
        );
        Ok(Self {
            topics: RwLock::new(HashMap::with_hasher(RandomState::new())),
            limits,
            created: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        })
    }

    /// Engine for `name`, created if the topic limit allows
    pub fn get_or_create(&self, name: &str) -> BrokerResult<Arc<QueueEngine<T>>> {
        if let Some(engine) = self.topics.read().get(name) {
            return Ok(Arc::clone(engine));
        }

        let mut topics = self.topics.write();
        // Another caller may have created it between the two locks
        if let Some(engine) = topics.get(name) {
            return Ok(Arc::clone(engine));
        }
        if self.closed.load(Ordering::Acquire) {
            return Err(BrokerError::Closed);
        }
        if topics.len() >= self.limits.max_topics {
            return Err(BrokerError::TopicLimitReached {
                max_topics: self.limits.max_topics,
            });
        }

        let engine = {
            let span = tracing::info_span!("topic", name = %name);
            let _entered = span.enter();
            let engine = Arc::new(QueueEngine::new(self.limits.topic_capacity)?);
            info!(capacity = self.limits.topic_capacity, "Topic created");
            engine
        };

        topics.insert(name.to_string(), Arc::clone(&engine));
        self.created.fetch_add(1, Ordering::Relaxed);
        Ok(engine)
    }

    /// Put into `name`, creating the topic if needed
    pub async fn put_to(&self, name: &str, message: T, cancel: &CancelToken) -> BrokerResult<()> {
        let engine = self.get_or_create(name)?;
        engine
            .put(message, cancel)
            .await
            .map_err(|e| e.in_topic(name))
    }

    /// Get from `name`, creating the topic if needed
    pub async fn get_from(&self, name: &str, cancel: &CancelToken) -> BrokerResult<T> {
        let engine = self.get_or_create(name)?;
        engine.get(cancel).await.map_err(|e| e.in_topic(name))
    }

    /// Close every registered engine and refuse new topics
    pub async fn close_all(&self) {
        self.closed.store(true, Ordering::Release);

        let engines: Vec<Arc<QueueEngine<T>>> = self.topics.read().values().cloned().collect();
        let count = engines.len();
        futures::future::join_all(engines.iter().map(|engine| engine.close())).await;

        info!(topics = count, "All topics closed");
    }
}

impl<T> TopicRegistry<T> {
    /// Existing engine for `name`, without creating one
    pub fn get(&self, name: &str) -> Option<Arc<QueueEngine<T>>> {
        self.topics.read().get(name).cloned()
    }

    pub fn topic_count(&self) -> usize {
        self.topics.read().len()
    }

    /// Registered topic names, sorted
    pub fn topic_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.topics.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of engines ever constructed
    pub fn topics_created(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }

    pub fn limits(&self) -> RegistryLimits {
        self.limits
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl<T: Send + 'static> TopicRegistry<T> {
    /// Statistics for an existing topic
    pub fn stats(&self, name: &str) -> Option<EngineStats> {
        self.get(name).map(|engine| engine.stats())
    }
}
