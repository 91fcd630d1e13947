/*!
 * Dispatcher Task
 *
 * Per-engine background task that pairs buffered messages with pending
 * consumer tickets, one at a time, in order.
 *
 * # Matching Loop
 *
 * 1. Claim the oldest live ticket (suspends while nobody waits)
 * 2. Take the next buffered message (suspends while the buffer is empty)
 * 3. Deliver; a refused delivery keeps the message for the next ticket
 *
 * Claiming before receiving keeps unclaimed messages inside the bounded
 * buffer, so the buffer capacity alone decides when producers suspend.
 *
 * # Shutdown
 *
 * `shutdown().await` signals the loop and waits for the drain to finish.
 * Dropping the handle without it aborts the task and logs a warning.
 */

use super::ticket::Ticket;
use super::types::EngineCounters;
use super::waiters::WaiterRegistry;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn, Instrument};

/// Outcome of the close-time drain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Buffered messages handed to consumers that were already waiting
    pub delivered: usize,
    /// Buffered messages nobody was waiting for
    pub dropped: usize,
    /// Waiting consumers released without a message
    pub released: usize,
}

/// Handle to a running dispatcher
pub(super) struct DispatcherTask {
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<DrainReport>>,
}

impl DispatcherTask {
    /// Spawn the dispatcher in the caller's tracing span
    pub fn spawn<T: Send + 'static>(
        buffer: mpsc::Receiver<T>,
        waiters: Arc<WaiterRegistry<T>>,
        counters: Arc<EngineCounters>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(
            run_dispatch_loop(buffer, waiters, counters, shutdown_rx)
                .instrument(tracing::Span::current()),
        );

        Self {
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    /// Stop the loop, drain, and wait for the task to exit
    ///
    /// Returns `None` if the task panicked or was already gone.
    pub async fn shutdown(mut self) -> Option<DrainReport> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        let handle = self.handle.take()?;
        match handle.await {
            Ok(report) => Some(report),
            Err(e) => {
                warn!(error = %e, "Dispatcher task ended abnormally");
                None
            }
        }
    }
}

impl Drop for DispatcherTask {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            warn!(
                "DispatcherTask dropped without calling shutdown() - aborting task. \
                 Close the engine for a graceful drain."
            );
            handle.abort();
        }
    }
}

async fn run_dispatch_loop<T>(
    mut buffer: mpsc::Receiver<T>,
    waiters: Arc<WaiterRegistry<T>>,
    counters: Arc<EngineCounters>,
    mut shutdown: oneshot::Receiver<()>,
) -> DrainReport {
    debug!("Dispatcher started");

    // Message refused by a ticket, offered to the next one
    let mut carried: Option<T> = None;
    // Ticket claimed when shutdown arrived before a message did
    let mut held: Option<Ticket<T>> = None;

    loop {
        let mut ticket = tokio::select! {
            biased;
            _ = &mut shutdown => break,
            claimed = waiters.claim_next() => match claimed {
                Some(ticket) => ticket,
                None => break,
            },
        };

        let message = match carried.take() {
            Some(message) => message,
            None => {
                tokio::select! {
                    biased;
                    _ = &mut shutdown => {
                        held = Some(ticket);
                        break;
                    }
                    // Consumer went away while we waited; claim the next one
                    _ = ticket.abandoned() => continue,
                    received = buffer.recv() => match received {
                        Some(message) => message,
                        None => {
                            held = Some(ticket);
                            break;
                        }
                    },
                }
            }
        };

        match ticket.deliver(message) {
            Ok(()) => EngineCounters::bump(&counters.deliveries),
            Err(message) => carried = Some(message),
        }
    }

    let report = drain(&mut buffer, &waiters, &counters, carried, held).await;
    info!(
        delivered = report.delivered,
        dropped = report.dropped,
        released = report.released,
        "Dispatcher stopped"
    );
    report
}

/// Close the buffer, hand leftovers to waiting consumers, release the rest
///
/// Waits for permits reserved before the close, so every accepted put is
/// either delivered or counted as dropped.
async fn drain<T>(
    buffer: &mut mpsc::Receiver<T>,
    waiters: &WaiterRegistry<T>,
    counters: &EngineCounters,
    mut carried: Option<T>,
    mut held: Option<Ticket<T>>,
) -> DrainReport {
    buffer.close();

    let mut report = DrainReport::default();
    loop {
        let mut message = match carried.take() {
            Some(message) => message,
            None => match buffer.recv().await {
                Some(message) => message,
                None => break,
            },
        };

        let mut delivered = false;
        while let Some(ticket) = held.take().or_else(|| waiters.try_claim_next()) {
            match ticket.deliver(message) {
                Ok(()) => {
                    delivered = true;
                    break;
                }
                Err(refused) => message = refused,
            }
        }

        if delivered {
            EngineCounters::bump(&counters.deliveries);
            report.delivered += 1;
        } else {
            EngineCounters::bump(&counters.dropped_on_close);
            report.dropped += 1;
        }
    }

    // A held ticket with no message left is released along with the rest
    report.released = usize::from(held.is_some_and(|t| t.is_live())) + waiters.close();
    report
}
