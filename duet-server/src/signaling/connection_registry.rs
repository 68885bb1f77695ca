use axum::extract::ws::Message;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use duet_core::ClientId;
use tokio::sync::mpsc;

/// Open connections, keyed by the id handed out on upgrade.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: DashMap<ClientId, mpsc::UnboundedSender<Message>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the id is already taken by an open connection.
    pub fn register(&self, client_id: ClientId, tx: mpsc::UnboundedSender<Message>) -> bool {
        match self.connections.entry(client_id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(tx);
                true
            }
        }
    }

    pub fn unregister(&self, client_id: &ClientId) {
        self.connections.remove(client_id);
    }

    pub fn sender(&self, client_id: &ClientId) -> Option<mpsc::UnboundedSender<Message>> {
        self.connections.get(client_id).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, client_id: &ClientId) -> bool {
        self.connections.contains_key(client_id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
