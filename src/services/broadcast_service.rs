use tracing::{debug, warn};

use crate::{
    dto::{
        events::{ALL_MATCHES_EVENT, ServerEvent},
        matches::MatchSnapshot,
    },
    state::SharedState,
};

/// Project every committed match, resolving competitor names from the directory.
pub async fn snapshot(state: &SharedState) -> Vec<MatchSnapshot> {
    state
        .read_matches(|table| {
            table
                .values()
                .map(|record| MatchSnapshot::build(record, |id| state.competitor(id)))
                .collect()
        })
        .await
}

/// Build the `all_matches` event carrying the full current snapshot.
pub async fn all_matches_event(state: &SharedState) -> Option<ServerEvent> {
    let matches = snapshot(state).await;
    match ServerEvent::json(ALL_MATCHES_EVENT, &matches) {
        Ok(event) => Some(event),
        Err(err) => {
            warn!(error = %err, "failed to serialize match snapshot");
            None
        }
    }
}

/// Push the full current snapshot to every connected viewer.
pub async fn broadcast_all_matches(state: &SharedState) {
    if let Some(event) = all_matches_event(state).await {
        debug!(
            viewers = state.viewers().viewer_count(),
            "broadcasting match snapshot"
        );
        state.viewers().broadcast(event);
    }
}
