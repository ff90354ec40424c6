//! Cache change notifications
//!
//! Fired after a mutation cycle settles. Delivery is fire-and-forget on a
//! broadcast channel; listeners are not serialized with cache mutations and
//! should re-read the store rather than assume a particular state.

use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Why the cache changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeSource {
    /// Batch delivered by the remote change feed
    RemoteSync,
    /// Records written through this store
    LocalWrite,
    /// Standalone retention purge that removed rows
    Purge,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheChanged {
    pub source: ChangeSource,
    pub inserted: usize,
    pub deleted: usize,
    /// Rows dropped by the retention purge in the same cycle
    pub purged: usize,
}

/// Broadcast fan-out for [`CacheChanged`] events
#[derive(Debug)]
pub struct ChangeNotifier {
    sender: broadcast::Sender<CacheChanged>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn emit(&self, event: CacheChanged) {
        trace!(event = ?event, "Emitting cache change");
        // No subscribers is fine
        let _ = self.sender.send(event);
    }

    /// Dropping the receiver unsubscribes
    pub fn subscribe(&self) -> broadcast::Receiver<CacheChanged> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawn a background task that logs every change
pub fn spawn_logging_listener(
    mut receiver: broadcast::Receiver<CacheChanged>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => debug!(
                    source = ?event.source,
                    inserted = event.inserted,
                    deleted = event.deleted,
                    purged = event.purged,
                    "Sample cache changed"
                ),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    debug!(skipped = n, "Change listener lagged, skipped events");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Change notifier closed, stopping listener");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn test_emit_receive() {
        let notifier = ChangeNotifier::new();
        let mut receiver = notifier.subscribe();

        notifier.emit(CacheChanged {
            source: ChangeSource::LocalWrite,
            inserted: 2,
            deleted: 0,
            purged: 0,
        });

        let event = timeout(Duration::from_millis(100), receiver.recv())
            .await
            .expect("timeout")
            .expect("receive error");
        assert_eq!(event.source, ChangeSource::LocalWrite);
        assert_eq!(event.inserted, 2);
    }

    #[test]
    fn test_no_subscribers() {
        let notifier = ChangeNotifier::new();
        notifier.emit(CacheChanged {
            source: ChangeSource::RemoteSync,
            inserted: 0,
            deleted: 1,
            purged: 0,
        });
        assert_eq!(notifier.subscriber_count(), 0);
    }

    #[test]
    fn test_unsubscribe_on_drop() {
        let notifier = ChangeNotifier::new();
        let receiver = notifier.subscribe();
        assert_eq!(notifier.subscriber_count(), 1);
        drop(receiver);
        assert_eq!(notifier.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_logging_listener_stops_when_notifier_dropped() {
        let notifier = ChangeNotifier::new();
        let handle = spawn_logging_listener(notifier.subscribe());
        notifier.emit(CacheChanged {
            source: ChangeSource::RemoteSync,
            inserted: 1,
            deleted: 0,
            purged: 0,
        });
        drop(notifier);

        timeout(Duration::from_secs(1), handle)
            .await
            .expect("listener did not stop")
            .expect("listener panicked");
    }
}
