//! Fan-out of change notifications to live subscribers.

use std::collections::HashMap;
use std::hash::Hash;
use tokio::sync::{broadcast, RwLock};

/// Snapshots buffered per subscriber before it starts lagging.
const CHANNEL_CAPACITY: usize = 16;

/// One broadcast channel per watched key.
pub struct SubscriptionHub<K, T> {
    channels: RwLock<HashMap<K, broadcast::Sender<T>>>,
}

impl<K, T> SubscriptionHub<K, T>
where
    K: Eq + Hash + Clone,
    T: Clone,
{
    pub fn new() -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// Subscribes to updates for `key`.
    pub async fn subscribe(&self, key: &K) -> broadcast::Receiver<T> {
        let mut channels = self.channels.write().await;

        // Drop channels whose subscribers have all gone away.
        channels.retain(|_, sender| sender.receiver_count() > 0);

        if let Some(sender) = channels.get(key) {
            sender.subscribe()
        } else {
            let (sender, receiver) = broadcast::channel(CHANNEL_CAPACITY);
            channels.insert(key.clone(), sender);
            receiver
        }
    }

    /// Whether anyone is listening on `key`.
    pub async fn is_watched(&self, key: &K) -> bool {
        let channels = self.channels.read().await;
        channels
            .get(key)
            .map(|sender| sender.receiver_count() > 0)
            .unwrap_or(false)
    }

    /// Sends `message` to every subscriber of `key`.
    pub async fn publish(&self, key: &K, message: T) {
        let channels = self.channels.read().await;

        if let Some(sender) = channels.get(key) {
            // No receivers left is not an error.
            let _ = sender.send(message);
        }
    }
}

impl<K, T> Default for SubscriptionHub<K, T>
where
    K: Eq + Hash + Clone,
    T: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
