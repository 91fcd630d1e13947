/*!
 * Queue Module
 *
 * Named topics with blocking, ordered delivery:
 * - Waiter registry: FIFO pending-consumer tickets with direct hand-off
 * - Queue engine: bounded buffer plus a dispatcher task per topic
 * - Topic registry: lazily creates and bounds engines, routes by name
 */

mod dispatcher;
pub mod engine;
pub mod registry;
pub mod ticket;
pub mod types;
pub mod waiters;

pub use dispatcher::DrainReport;
pub use engine::QueueEngine;
pub use registry::TopicRegistry;
pub use ticket::{ticket, Outcome, Ticket, TicketHandle, TicketId};
pub use types::{EngineState, EngineStats};
pub use waiters::WaiterRegistry;
