/*!
 * Queue Types
 * Common types for queue engines and the topic registry
 */

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

/// Engine lifecycle: Open -> Closing -> Closed, never back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum EngineState {
    /// Accepting puts and gets
    Open = 0,
    /// Buffer closed, dispatcher draining
    Closing = 1,
    /// Dispatcher exited
    Closed = 2,
}

impl EngineState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => EngineState::Open,
            1 => EngineState::Closing,
            _ => EngineState::Closed,
        }
    }
}

/// Lock-free holder for an [`EngineState`]
#[derive(Debug)]
pub(super) struct AtomicEngineState(AtomicU8);

impl AtomicEngineState {
    pub fn new() -> Self {
        Self(AtomicU8::new(EngineState::Open as u8))
    }

    pub fn load(&self) -> EngineState {
        EngineState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn store(&self, state: EngineState) {
        self.0.store(state as u8, Ordering::Release);
    }

    /// Move from `from` to `to`; false if another caller got there first
    pub fn transition(&self, from: EngineState, to: EngineState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// Monotonic per-engine counters
#[derive(Debug, Default)]
pub(super) struct EngineCounters {
    pub puts: AtomicU64,
    pub puts_cancelled: AtomicU64,
    pub deliveries: AtomicU64,
    pub gets_cancelled: AtomicU64,
    pub dropped_on_close: AtomicU64,
}

impl EngineCounters {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Point-in-time view of a queue engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    pub state: EngineState,
    pub capacity: usize,
    /// Messages sitting in the buffer
    pub buffered: usize,
    /// Consumers with a registered, undelivered ticket
    pub waiting_consumers: usize,
    pub puts: u64,
    pub puts_cancelled: u64,
    pub deliveries: u64,
    pub gets_cancelled: u64,
    pub dropped_on_close: u64,
}
