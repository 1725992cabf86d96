use tokio::sync::broadcast;

use crate::dto::events::ServerEvent;

/// Fan-out hub shared by every viewer connection (WebSocket and SSE).
pub struct ViewerHub {
    sender: broadcast::Sender<ServerEvent>,
}

impl ViewerHub {
    /// Construct a new hub backed by a Tokio broadcast channel with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    /// Send an event to all current subscribers, ignoring delivery errors.
    pub fn broadcast(&self, event: ServerEvent) {
        let _ = self.sender.send(event);
    }

    /// Number of live subscribers.
    pub fn viewer_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
