//! Cancellation signal passed to every connector operation

use std::sync::Arc;
use tokio::sync::watch;

/// Cooperative cancellation shared between a caller and in-flight calls.
///
/// Clones share one flag: cancelling any clone cancels all of them, and
/// cancellation cannot be undone.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    state: Arc<watch::Sender<bool>>,
}

impl CancellationToken {
    /// A token that is not cancelled
    pub fn new() -> Self {
        let (state, _) = watch::channel(false);
        Self { state: Arc::new(state) }
    }

    /// Cancel this token and every clone of it
    pub fn cancel(&self) {
        self.state.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.state.borrow()
    }

    /// Resolves once the token is cancelled
    pub async fn cancelled(&self) {
        let mut watcher = self.state.subscribe();
        // only fails if the sender is dropped, and `self` holds it
        let _ = watcher.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_clones_share_state() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());

        clone.cancel();
        assert!(token.is_cancelled());
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_resolves_for_waiters() {
        let token = CancellationToken::new();
        let waiter = token.clone();
        let handle = tokio::spawn(async move { waiter.cancelled().await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        token.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_cancelled_after_the_fact() {
        let token = CancellationToken::new();
        token.cancel();
        tokio::time::timeout(Duration::from_millis(100), token.cancelled())
            .await
            .unwrap();
    }
}
