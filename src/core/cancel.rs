/*!
 * Cancellation Tokens
 *
 * Explicit cancellation signal passed into every blocking broker call.
 *
 * A token fires when `cancel()` is called on it (or on any clone or child
 * sharing its signal) or when its deadline passes, whichever comes first.
 * Children share the parent's signal and can only tighten the deadline.
 *
 * ## Example
 *
 * ```ignore
 * let shutdown = CancelToken::new();
 * let request = shutdown.child_with_timeout(Duration::from_secs(5));
 *
 * tokio::select! {
 *     _ = request.cancelled() => { /* shutdown or 5s elapsed */ }
 *     msg = work() => { /* ... */ }
 * }
 * ```
 */

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// Cooperative cancellation signal with an optional deadline
#[derive(Debug, Clone)]
pub struct CancelToken {
    signal: Arc<watch::Sender<bool>>,
    deadline: Option<Instant>,
}

impl CancelToken {
    /// Token that only fires when cancelled explicitly
    pub fn new() -> Self {
        let (signal, _) = watch::channel(false);
        Self {
            signal: Arc::new(signal),
            deadline: None,
        }
    }

    /// Token that fires after `timeout`
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new().child_with_timeout(timeout)
    }

    /// Derived token sharing this token's signal, with a deadline no later than `timeout` from now
    ///
    /// A timeout too large to represent as an instant adds no deadline.
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let deadline = match (self.deadline, Instant::now().checked_add(timeout)) {
            (Some(current), Some(candidate)) => Some(current.min(candidate)),
            (current, None) => current,
            (None, candidate) => candidate,
        };
        Self {
            signal: Arc::clone(&self.signal),
            deadline,
        }
    }

    /// Fire the signal for this token and every token sharing it
    pub fn cancel(&self) {
        self.signal.send_replace(true);
    }

    /// Deadline after which the token counts as cancelled
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        *self.signal.borrow() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Wait until the token is cancelled or its deadline passes
    pub async fn cancelled(&self) {
        let mut rx = self.signal.subscribe();
        let signalled = async move {
            // The sender lives as long as `self`, so this only returns on `true`
            let _ = rx.wait_for(|cancelled| *cancelled).await;
        };

        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = signalled => {}
                    _ = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => signalled.await,
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_explicit_cancel_reaches_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());

        let waiter = tokio::spawn(async move { clone.cancelled().await });
        token.cancel();

        waiter.await.unwrap();
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_deadline_fires() {
        let token = CancelToken::with_timeout(Duration::from_millis(50));
        assert!(!token.is_cancelled());

        token.cancelled().await;
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_child_keeps_tighter_deadline() {
        let parent = CancelToken::with_timeout(Duration::from_millis(100));
        let child = parent.child_with_timeout(Duration::from_secs(10));
        assert_eq!(child.deadline(), parent.deadline());

        let tighter = parent.child_with_timeout(Duration::from_millis(10));
        assert!(tighter.deadline() < parent.deadline());
    }

    #[tokio::test]
    async fn test_unrepresentable_timeout_keeps_parent_deadline() {
        let huge = Duration::from_secs(u64::MAX);

        let parent = CancelToken::with_timeout(Duration::from_millis(100));
        let child = parent.child_with_timeout(huge);
        assert_eq!(child.deadline(), parent.deadline());

        let unbounded = CancelToken::new().child_with_timeout(huge);
        assert_eq!(unbounded.deadline(), None);
        assert!(!unbounded.is_cancelled());
    }

    #[tokio::test]
    async fn test_parent_cancel_reaches_child() {
        let parent = CancelToken::new();
        let child = parent.child_with_timeout(Duration::from_secs(60));

        parent.cancel();
        child.cancelled().await;
        assert!(child.is_cancelled());
    }
}
