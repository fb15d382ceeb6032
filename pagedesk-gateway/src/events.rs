//! In-process change-notification bus
//!
//! Route handlers publish a [`ChangeEvent`] after successful store
//! mutations; subscribers refetch whatever they care about. Eventual
//! convergence only: no ordering guarantee, and lagging subscribers drop
//! events per broadcast-channel semantics.

use tokio::sync::broadcast;

/// Buffer capacity for the broadcast channel.
const CHANNEL_CAPACITY: usize = 256;

/// A mutation notification: which entity kind changed, and its key.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub entity: &'static str,
    pub key: String,
}

/// Fan-out hub for [`ChangeEvent`]s, shared via the app state.
pub struct ChangeBus {
    sender: broadcast::Sender<ChangeEvent>,
}

impl ChangeBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Publish a change. Send errors (no subscribers) are not failures.
    pub fn publish(&self, entity: &'static str, key: impl Into<String>) {
        let _ = self.sender.send(ChangeEvent {
            entity,
            key: key.into(),
        });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }
}

impl Default for ChangeBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_see_published_changes() {
        let bus = ChangeBus::new();
        let mut rx = bus.subscribe();

        bus.publish("facebook_pages", "page-1");

        let event = rx.recv().await.unwrap();
        assert_eq!(event.entity, "facebook_pages");
        assert_eq!(event.key, "page-1");
    }

    #[test]
    fn test_publish_without_subscribers_is_fine() {
        let bus = ChangeBus::new();
        bus.publish("user_pages_relations", "u1:p1");
    }
}
