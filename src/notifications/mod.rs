//! In-process fan-out of notification payloads to connected clients.
//!
//! Each user gets at most one broadcast channel; SSE streams and relay
//! sockets subscribe to it. Payloads are pre-serialized JSON strings so a
//! single publish serves every transport.

use dashmap::DashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

pub mod relay;

/// Buffered messages per subscriber before slow consumers start lagging.
const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Default)]
pub struct NotificationHub {
    channels: DashMap<Uuid, broadcast::Sender<String>>,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to a user's live notification stream, creating the channel
    /// on first use.
    pub fn subscribe(&self, user_id: Uuid) -> broadcast::Receiver<String> {
        self.channels
            .entry(user_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Push a payload to every live subscriber of the user. Returns the
    /// number of subscribers that received it; zero when nobody is listening.
    pub fn publish(&self, user_id: Uuid, payload: &str) -> usize {
        match self.channels.get(&user_id) {
            Some(tx) => tx.send(payload.to_string()).unwrap_or(0),
            None => 0,
        }
    }

    /// Drop channels whose subscribers have all disconnected.
    pub fn sweep(&self) {
        self.channels.retain(|_, tx| tx.receiver_count() > 0);
    }

    pub fn connected_users(&self) -> usize {
        self.channels
            .iter()
            .filter(|entry| entry.value().receiver_count() > 0)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_reaches_subscriber() {
        let hub = NotificationHub::new();
        let user = Uuid::new_v4();
        let mut rx = hub.subscribe(user);

        assert_eq!(hub.publish(user, "{\"kind\":\"system\"}"), 1);
        assert_eq!(rx.recv().await.unwrap(), "{\"kind\":\"system\"}");
    }

    #[test]
    fn publish_without_subscriber_is_dropped() {
        let hub = NotificationHub::new();
        assert_eq!(hub.publish(Uuid::new_v4(), "payload"), 0);
    }

    #[test]
    fn sweep_removes_dead_channels() {
        let hub = NotificationHub::new();
        let user = Uuid::new_v4();
        let rx = hub.subscribe(user);
        drop(rx);

        hub.sweep();
        assert_eq!(hub.connected_users(), 0);
        assert_eq!(hub.publish(user, "late"), 0);
    }
}
