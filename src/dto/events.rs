use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

/// Event name of the full match snapshot pushed to every viewer.
pub const ALL_MATCHES_EVENT: &str = "all_matches";
/// Event name of the acknowledgement sent back to a command issuer.
pub const COMMAND_RESULT_EVENT: &str = "command_result";
/// Event name of the degraded-mode notification.
pub const SYSTEM_STATUS_EVENT: &str = "system_status";

#[derive(Clone, Debug)]
/// Dispatched payload carried across the viewer channels (WebSocket and SSE).
///
/// The payload is shared behind an [`Arc`] so fanning a large snapshot out to many
/// subscribers does not copy it.
pub struct ServerEvent {
    /// Event name.
    pub event: String,
    /// JSON payload.
    pub data: Arc<Value>,
}

impl ServerEvent {
    /// Serialise `payload` into a named event.
    pub fn json<T>(event: &str, payload: &T) -> serde_json::Result<Self>
    where
        T: Serialize + ?Sized,
    {
        Ok(Self {
            event: event.to_string(),
            data: Arc::new(serde_json::to_value(payload)?),
        })
    }

    /// Text frame sent to WebSocket clients: `{"event": ..., "data": ...}`.
    pub fn ws_text(&self) -> serde_json::Result<String> {
        serde_json::to_string(&Envelope {
            event: &self.event,
            data: &self.data,
        })
    }

    /// Data line sent to SSE clients.
    pub fn sse_data(&self) -> serde_json::Result<String> {
        serde_json::to_string(self.data.as_ref())
    }
}

#[derive(Serialize)]
struct Envelope<'a> {
    event: &'a str,
    data: &'a Value,
}

#[derive(Debug, Serialize)]
/// Broadcast when the backend enters or leaves degraded mode.
pub struct SystemStatus {
    /// Whether writes are currently refused.
    pub degraded: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ws_frame_wraps_payload_under_data() {
        let event = ServerEvent::json(ALL_MATCHES_EVENT, &vec![1, 2]).unwrap();
        let frame: Value = serde_json::from_str(&event.ws_text().unwrap()).unwrap();
        assert_eq!(frame["event"], "all_matches");
        assert_eq!(frame["data"], serde_json::json!([1, 2]));
        assert_eq!(event.sse_data().unwrap(), "[1,2]");
    }
}
