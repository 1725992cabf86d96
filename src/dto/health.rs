use serde::Serialize;
use utoipa::ToSchema;

/// Health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Whether the match timer loop is running.
    pub timer_running: bool,
    /// Number of connected viewers (WebSocket and SSE).
    pub viewers: usize,
}

impl HealthResponse {
    /// Build a response from the observed backend state.
    pub fn new(degraded: bool, timer_running: bool, viewers: usize) -> Self {
        let status = if degraded { "degraded" } else { "ok" };
        Self {
            status: status.to_string(),
            timer_running,
            viewers,
        }
    }
}
