/*!
 * Queue Engine
 *
 * One engine per topic: a bounded message buffer, the pending-consumer
 * tickets, and a dispatcher task pairing the two in order.
 *
 * # Lifecycle
 *
 * `Open -> Closing -> Closed`. `close()` is the only way forward and is
 * idempotent; concurrent callers all return once the dispatcher has drained.
 *
 * # Cancellation
 *
 * - `put` reserves buffer space before moving the message in, so a
 *   cancelled put leaves nothing behind
 * - `get` settles a cancellation/delivery race through the ticket's claim
 *   state: either the ticket is withdrawn or the in-flight message is returned
 */

use super::dispatcher::DispatcherTask;
use super::ticket::{ticket, Outcome};
use super::types::{AtomicEngineState, EngineCounters, EngineState, EngineStats};
use super::waiters::WaiterRegistry;
use crate::core::cancel::CancelToken;
use crate::core::errors::{BrokerError, BrokerResult};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

/// Blocking FIFO delivery for a single topic
pub struct QueueEngine<T> {
    capacity: usize,
    sender: mpsc::Sender<T>,
    waiters: Arc<WaiterRegistry<T>>,
    state: AtomicEngineState,
    counters: Arc<EngineCounters>,
    dispatcher: Mutex<Option<DispatcherTask>>,
}

impl<T: Send + 'static> QueueEngine<T> {
    /// Create an engine and start its dispatcher.
    ///
    /// Must be called inside a tokio runtime. `capacity` is validated by the
    /// registry; a zero here is a caller bug and fails with `InvalidConfig`.
    pub fn new(capacity: usize) -> BrokerResult<Self> {
        if capacity == 0 {
            return Err(BrokerError::InvalidConfig(
                "topic capacity must be at least 1".into(),
            ));
        }

        let (sender, buffer) = mpsc::channel(capacity);
        let waiters = Arc::new(WaiterRegistry::new());
        let counters = Arc::new(EngineCounters::default());
        let dispatcher =
            DispatcherTask::spawn(buffer, Arc::clone(&waiters), Arc::clone(&counters));

        debug!(capacity, "Queue engine started");

        Ok(Self {
            capacity,
            sender,
            waiters,
            state: AtomicEngineState::new(),
            counters,
            dispatcher: Mutex::new(Some(dispatcher)),
        })
    }

    /// Enqueue `message`, suspending while the buffer is full.
    ///
    /// On `PutCancelled` the message was not enqueued.
    pub async fn put(&self, message: T, cancel: &CancelToken) -> BrokerResult<()> {
        if self.state.load() != EngineState::Open {
            return Err(BrokerError::Closed);
        }

        let permit = tokio::select! {
            biased;
            reserved = self.sender.reserve() => reserved.map_err(|_| BrokerError::Closed)?,
            _ = cancel.cancelled() => {
                EngineCounters::bump(&self.counters.puts_cancelled);
                return Err(BrokerError::PutCancelled { capacity: self.capacity });
            }
        };

        permit.send(message);
        EngineCounters::bump(&self.counters.puts);
        Ok(())
    }

    /// Wait for the next message dispatched to this caller
    pub async fn get(&self, cancel: &CancelToken) -> BrokerResult<T> {
        if self.state.load() != EngineState::Open {
            return Err(BrokerError::Closed);
        }

        let (ticket, mut handle) = ticket();
        self.waiters.register(ticket)?;

        let outcome = tokio::select! {
            biased;
            outcome = handle.wait() => outcome,
            _ = cancel.cancelled() => {
                if handle.try_cancel() {
                    self.waiters.cancel(handle.id());
                    EngineCounters::bump(&self.counters.gets_cancelled);
                    return Err(BrokerError::WaitTimeout);
                }
                // Delivery won the race; the message is already in the slot
                handle.wait().await
            }
        };

        match outcome {
            Outcome::Delivered(message) => Ok(message),
            Outcome::Released => Err(BrokerError::Closed),
        }
    }

    /// Stop accepting work, drain the buffer, and release waiting consumers
    pub async fn close(&self) {
        let mut dispatcher = self.dispatcher.lock().await;
        if self.state.transition(EngineState::Open, EngineState::Closing) {
            debug!("Queue engine closing");
        }

        if let Some(task) = dispatcher.take() {
            if let Some(report) = task.shutdown().await {
                debug!(
                    delivered = report.delivered,
                    dropped = report.dropped,
                    released = report.released,
                    "Queue engine drained"
                );
            }
        }
        self.state.store(EngineState::Closed);
    }

    pub fn stats(&self) -> EngineStats {
        let load = |counter: &std::sync::atomic::AtomicU64| counter.load(Ordering::Relaxed);
        let buffered = if self.sender.is_closed() {
            0
        } else {
            self.capacity.saturating_sub(self.sender.capacity())
        };

        EngineStats {
            state: self.state.load(),
            capacity: self.capacity,
            buffered,
            waiting_consumers: self.waiters.len(),
            puts: load(&self.counters.puts),
            puts_cancelled: load(&self.counters.puts_cancelled),
            deliveries: load(&self.counters.deliveries),
            gets_cancelled: load(&self.counters.gets_cancelled),
            dropped_on_close: load(&self.counters.dropped_on_close),
        }
    }

    pub fn state(&self) -> EngineState {
        self.state.load()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<T> std::fmt::Debug for QueueEngine<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueEngine")
            .field("capacity", &self.capacity)
            .field("state", &self.state.load())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn short() -> CancelToken {
        CancelToken::with_timeout(Duration::from_millis(50))
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let engine = QueueEngine::new(2).unwrap();
        let cancel = CancelToken::new();

        engine.put("a", &cancel).await.unwrap();
        engine.put("b", &cancel).await.unwrap();
        assert_eq!(engine.stats().buffered, 2);

        assert_eq!(engine.get(&cancel).await.unwrap(), "a");
        assert_eq!(engine.get(&cancel).await.unwrap(), "b");
        engine.close().await;
    }

    #[tokio::test]
    async fn test_zero_capacity_rejected() {
        let err = QueueEngine::<u8>::new(0).unwrap_err();
        assert!(matches!(err, BrokerError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn test_full_buffer_put_cancelled() {
        let engine = QueueEngine::new(1).unwrap();
        engine.put(1u32, &CancelToken::new()).await.unwrap();

        let err = engine.put(2, &short()).await.unwrap_err();
        assert_eq!(err, BrokerError::PutCancelled { capacity: 1 });

        let stats = engine.stats();
        assert_eq!(stats.puts, 1);
        assert_eq!(stats.puts_cancelled, 1);
        assert_eq!(stats.buffered, 1);
        engine.close().await;
    }

    #[tokio::test]
    async fn test_get_timeout_then_served() {
        let engine = QueueEngine::new(2).unwrap();

        assert_eq!(engine.get(&short()).await, Err(BrokerError::WaitTimeout));
        assert_eq!(engine.stats().gets_cancelled, 1);

        engine.put(9u32, &CancelToken::new()).await.unwrap();
        assert_eq!(engine.get(&short()).await, Ok(9));
        engine.close().await;
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_final() {
        let engine = QueueEngine::<u32>::new(2).unwrap();
        engine.close().await;
        engine.close().await;

        assert_eq!(engine.state(), EngineState::Closed);
        assert_eq!(
            engine.put(1, &CancelToken::new()).await,
            Err(BrokerError::Closed)
        );
        assert_eq!(engine.get(&CancelToken::new()).await, Err(BrokerError::Closed));
    }
}
