//! Client subscriptions and per-match fan-out

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::simulation::MatchBroadcast;
use crate::ws::protocol::{MatchId, ServerMsg};

pub type ClientId = Uuid;

/// Outbound queue depth per connection
const CLIENT_QUEUE_CAPACITY: usize = 256;

/// Which matches each client observes, indexed both ways
#[derive(Default)]
pub struct SubscriptionRegistry {
    by_client: DashMap<ClientId, HashSet<MatchId>>,
    by_match: DashMap<MatchId, HashSet<ClientId>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, client_id: ClientId, match_id: MatchId) {
        self.by_client.entry(client_id).or_default().insert(match_id);
        self.by_match.entry(match_id).or_default().insert(client_id);
    }

    pub fn unsubscribe(&self, client_id: ClientId, match_id: MatchId) {
        if let Some(mut matches) = self.by_client.get_mut(&client_id) {
            matches.remove(&match_id);
        }
        self.detach(match_id, client_id);
    }

    /// Drop every subscription held by a client
    pub fn on_disconnect(&self, client_id: ClientId) {
        let Some((_, matches)) = self.by_client.remove(&client_id) else {
            return;
        };
        for match_id in matches {
            self.detach(match_id, client_id);
        }
    }

    pub fn subscribers(&self, match_id: MatchId) -> Vec<ClientId> {
        self.by_match
            .get(&match_id)
            .map(|clients| clients.iter().copied().collect())
            .unwrap_or_default()
    }

    #[cfg(test)]
    pub fn matches_for(&self, client_id: ClientId) -> HashSet<MatchId> {
        self.by_client
            .get(&client_id)
            .map(|m| m.value().clone())
            .unwrap_or_default()
    }

    fn detach(&self, match_id: MatchId, client_id: ClientId) {
        self.by_match.remove_if_mut(&match_id, |_, clients| {
            clients.remove(&client_id);
            clients.is_empty()
        });
    }
}

/// Delivers messages to connected clients
pub struct Broadcaster {
    registry: Arc<SubscriptionRegistry>,
    connections: DashMap<ClientId, mpsc::Sender<ServerMsg>>,
}

impl Broadcaster {
    pub fn new(registry: Arc<SubscriptionRegistry>) -> Self {
        Self {
            registry,
            connections: DashMap::new(),
        }
    }

    /// Register a connection; the receiver feeds the socket writer
    pub fn connect(&self, client_id: ClientId) -> mpsc::Receiver<ServerMsg> {
        let (tx, rx) = mpsc::channel(CLIENT_QUEUE_CAPACITY);
        self.connections.insert(client_id, tx);
        rx
    }

    pub fn disconnect(&self, client_id: ClientId) {
        self.connections.remove(&client_id);
        self.registry.on_disconnect(client_id);
    }

    pub fn connected_clients(&self) -> usize {
        self.connections.len()
    }

    /// Send directly to one client
    pub fn send_to(&self, client_id: ClientId, msg: ServerMsg) -> bool {
        let Some(tx) = self.connections.get(&client_id).map(|c| c.value().clone()) else {
            debug!(client_id = %client_id, "No connection for client");
            return false;
        };

        match tx.try_send(msg) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(client_id = %client_id, "Client queue full, dropping message");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(client_id = %client_id, "Client queue closed");
                false
            }
        }
    }

    /// Deliver to every subscriber of a match; returns the delivered count
    pub fn publish(&self, match_id: MatchId, msg: &ServerMsg) -> usize {
        let mut delivered = 0;
        for client_id in self.registry.subscribers(match_id) {
            if self.send_to(client_id, msg.clone()) {
                delivered += 1;
            } else {
                warn!(match_id, client_id = %client_id, "Broadcast delivery failed");
            }
        }
        delivered
    }
}

impl MatchBroadcast for Broadcaster {
    fn broadcast(&self, match_id: MatchId, msg: ServerMsg) {
        self.publish(match_id, &msg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ack() -> ServerMsg {
        ServerMsg::response("test", true, "ok")
    }

    #[test]
    fn subscribe_is_idempotent_and_unsubscribe_tolerates_absence() {
        let registry = SubscriptionRegistry::new();
        let client = Uuid::new_v4();

        registry.subscribe(client, 1);
        registry.subscribe(client, 1);
        registry.subscribe(client, 2);
        assert_eq!(registry.matches_for(client).len(), 2);

        registry.unsubscribe(client, 1);
        registry.unsubscribe(client, 1);
        registry.unsubscribe(Uuid::new_v4(), 1);
        assert_eq!(registry.subscribers(2), vec![client]);
        assert!(registry.subscribers(1).is_empty());
    }

    #[test]
    fn match_index_drops_empty_entries() {
        let registry = SubscriptionRegistry::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        registry.subscribe(a, 5);
        registry.subscribe(b, 5);

        registry.unsubscribe(a, 5);
        assert_eq!(registry.subscribers(5), vec![b]);

        registry.on_disconnect(b);
        assert!(registry.subscribers(5).is_empty());
        assert!(!registry.by_match.contains_key(&5));
        assert!(registry.by_client.get(&a).map_or(true, |m| m.is_empty()));
    }

    #[test]
    fn disconnect_clears_all_subscriptions() {
        let registry = SubscriptionRegistry::new();
        let client = Uuid::new_v4();
        registry.subscribe(client, 1);
        registry.subscribe(client, 2);

        registry.on_disconnect(client);

        assert!(registry.matches_for(client).is_empty());
        assert!(registry.subscribers(1).is_empty());
    }

    #[tokio::test]
    async fn publish_reaches_only_subscribers_of_the_match() {
        let registry = Arc::new(SubscriptionRegistry::new());
        let broadcaster = Broadcaster::new(registry.clone());
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut rx_a = broadcaster.connect(a);
        let mut rx_b = broadcaster.connect(b);
        registry.subscribe(a, 9);
        registry.subscribe(b, 10);

        assert_eq!(broadcaster.publish(9, &ack()), 1);

        assert!(rx_a.recv().await.is_some());
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn closed_client_does_not_block_others() {
        let registry = Arc::new(SubscriptionRegistry::new());
        let broadcaster = Broadcaster::new(registry.clone());
        let (gone, live) = (Uuid::new_v4(), Uuid::new_v4());
        drop(broadcaster.connect(gone));
        let mut rx_live = broadcaster.connect(live);
        registry.subscribe(gone, 3);
        registry.subscribe(live, 3);

        assert_eq!(broadcaster.publish(3, &ack()), 1);
        assert!(rx_live.recv().await.is_some());
    }

    #[test]
    fn disconnect_removes_connection_and_subscriptions() {
        let registry = Arc::new(SubscriptionRegistry::new());
        let broadcaster = Broadcaster::new(registry.clone());
        let client = Uuid::new_v4();
        let _rx = broadcaster.connect(client);
        registry.subscribe(client, 4);

        broadcaster.disconnect(client);

        assert_eq!(broadcaster.connected_clients(), 0);
        assert!(registry.subscribers(4).is_empty());
        assert!(!broadcaster.send_to(client, ack()));
    }
}
