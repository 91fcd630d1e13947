/*!
 * Waiter Registry
 *
 * FIFO sequence of pending consumer tickets with rendezvous hand-off.
 *
 * # Design
 *
 * A mutex-protected `VecDeque` holds tickets in registration order. When the
 * dispatcher finds the sequence empty it parks a one-shot receiver in the
 * registry; the next `register` hands its ticket straight to that receiver
 * instead of queueing it.
 *
 * - `register`: O(1)
 * - `claim_next` / `try_claim_next`: O(1) amortized (dead tickets are skipped)
 * - `cancel`: O(n) by id
 *
 * Only the engine's dispatcher calls the claim operations.
 */

use super::ticket::{Ticket, TicketId};
use crate::core::errors::{BrokerError, BrokerResult};
use parking_lot::Mutex;
use std::collections::VecDeque;
use tokio::sync::oneshot;

struct WaiterState<T> {
    pending: VecDeque<Ticket<T>>,
    /// Dispatcher parked in `claim_next` on an empty sequence
    parked: Option<oneshot::Sender<Ticket<T>>>,
    closed: bool,
}

/// Ordered pending-consumer tickets for one queue engine
pub struct WaiterRegistry<T> {
    state: Mutex<WaiterState<T>>,
}

impl<T> WaiterRegistry<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(WaiterState {
                pending: VecDeque::new(),
                parked: None,
                closed: false,
            }),
        }
    }

    /// Append a ticket, or hand it directly to a parked dispatcher
    pub fn register(&self, ticket: Ticket<T>) -> BrokerResult<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(BrokerError::Closed);
        }

        let ticket = match state.parked.take() {
            Some(dispatcher) => match dispatcher.send(ticket) {
                Ok(()) => return Ok(()),
                // Dispatcher stopped waiting; keep the ticket in line instead
                Err(ticket) => ticket,
            },
            None => ticket,
        };

        state.pending.push_back(ticket);
        Ok(())
    }

    /// Oldest live ticket, waiting for one if none is pending.
    ///
    /// Returns `None` once the registry is closed.
    pub async fn claim_next(&self) -> Option<Ticket<T>> {
        loop {
            let parked = {
                let mut state = self.state.lock();
                if let Some(ticket) = Self::pop_live(&mut state.pending) {
                    return Some(ticket);
                }
                if state.closed {
                    return None;
                }
                let (tx, rx) = oneshot::channel();
                state.parked = Some(tx);
                rx
            };

            // Sender dropped means the registry was closed while parked
            let ticket = parked.await.ok()?;
            if ticket.is_live() {
                return Some(ticket);
            }
        }
    }

    /// Oldest live ticket without waiting
    pub fn try_claim_next(&self) -> Option<Ticket<T>> {
        Self::pop_live(&mut self.state.lock().pending)
    }

    /// Remove a ticket by id; false if it was already claimed or never queued
    pub fn cancel(&self, id: TicketId) -> bool {
        let mut state = self.state.lock();
        match state.pending.iter().position(|t| t.id() == id) {
            Some(index) => {
                state.pending.remove(index);
                true
            }
            None => false,
        }
    }

    /// Refuse new tickets and release every pending one.
    ///
    /// Released consumers observe their slot closing. A parked dispatcher is
    /// woken with `None`. Returns the number of tickets released.
    pub fn close(&self) -> usize {
        let (released, parked) = {
            let mut state = self.state.lock();
            state.closed = true;
            let released: Vec<Ticket<T>> = state.pending.drain(..).collect();
            (released, state.parked.take())
        };
        let count = released.iter().filter(|t| t.is_live()).count();
        drop(released);
        drop(parked);
        count
    }

    /// Number of queued tickets (including ones cancelled but not yet skipped)
    pub fn len(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    fn pop_live(pending: &mut VecDeque<Ticket<T>>) -> Option<Ticket<T>> {
        while let Some(ticket) = pending.pop_front() {
            if ticket.is_live() {
                return Some(ticket);
            }
        }
        None
    }
}

impl<T> Default for WaiterRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}
