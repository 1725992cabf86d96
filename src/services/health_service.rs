use tracing::warn;

use crate::{dto::health::HealthResponse, services::match_timer, state::SharedState};

/// Report degraded mode, timer and viewer counts while logging connectivity issues.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.require_match_store().await {
        Ok(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "storage health check failed");
            }
        }
        Err(_) => warn!("storage unavailable (degraded mode)"),
    }

    HealthResponse::new(
        state.is_degraded(),
        match_timer::is_running(state).await,
        state.viewers().viewer_count(),
    )
}
