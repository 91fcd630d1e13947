/*!
 * Consumer Tickets
 *
 * A ticket is a consumer's pending request: an id, a one-shot delivery slot,
 * and an atomic claim state shared between the dispatcher half ([`Ticket`])
 * and the consumer half ([`TicketHandle`]).
 *
 * The claim state settles a cancellation/delivery race deterministically:
 * exactly one of `Pending -> Delivered` (dispatcher) or
 * `Pending -> Cancelled` (consumer) succeeds.
 */

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use uuid::Uuid;

const PENDING: u8 = 0;
const DELIVERED: u8 = 1;
const CANCELLED: u8 = 2;

/// Unique ticket identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TicketId(Uuid);

impl TicketId {
    fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Dispatcher side of a ticket, stored in the waiter registry
pub struct Ticket<T> {
    id: TicketId,
    state: Arc<AtomicU8>,
    slot: oneshot::Sender<T>,
}

/// Consumer side of a ticket
pub struct TicketHandle<T> {
    id: TicketId,
    state: Arc<AtomicU8>,
    slot: oneshot::Receiver<T>,
}

/// Create a linked ticket pair
pub fn ticket<T>() -> (Ticket<T>, TicketHandle<T>) {
    let id = TicketId::generate();
    let state = Arc::new(AtomicU8::new(PENDING));
    let (tx, rx) = oneshot::channel();
    (
        Ticket {
            id,
            state: Arc::clone(&state),
            slot: tx,
        },
        TicketHandle {
            id,
            state,
            slot: rx,
        },
    )
}

impl<T> Ticket<T> {
    pub fn id(&self) -> TicketId {
        self.id
    }

    /// False once the consumer cancelled or stopped listening
    pub fn is_live(&self) -> bool {
        self.state.load(Ordering::Acquire) == PENDING && !self.slot.is_closed()
    }

    /// Resolves once the consumer has dropped its handle
    pub async fn abandoned(&mut self) {
        self.slot.closed().await
    }

    /// Hand `message` to the consumer.
    ///
    /// Returns the message back if the ticket was cancelled or the consumer
    /// is gone, so the caller can offer it to the next ticket.
    pub fn deliver(self, message: T) -> Result<(), T> {
        if self
            .state
            .compare_exchange(PENDING, DELIVERED, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(message);
        }
        self.slot.send(message)
    }
}

impl<T> fmt::Debug for Ticket<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ticket")
            .field("id", &self.id)
            .field("state", &self.state.load(Ordering::Relaxed))
            .finish()
    }
}

/// How a consumer's wait ended
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome<T> {
    Delivered(T),
    /// Released without a message (engine closed)
    Released,
}

impl<T> TicketHandle<T> {
    pub fn id(&self) -> TicketId {
        self.id
    }

    /// Wait for the dispatcher to fill or release the slot
    pub async fn wait(&mut self) -> Outcome<T> {
        match (&mut self.slot).await {
            Ok(message) => Outcome::Delivered(message),
            Err(_) => Outcome::Released,
        }
    }

    /// Try to withdraw the ticket.
    ///
    /// True means the dispatcher will never deliver to it. False means a
    /// delivery already won the race and the message is on its way.
    pub fn try_cancel(&self) -> bool {
        self.state
            .compare_exchange(PENDING, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}
