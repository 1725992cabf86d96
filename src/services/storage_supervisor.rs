use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{match_store::MatchStore, storage::StorageError},
    services::broadcast_service,
    state::{
        SharedState,
        matches::{Competitor, Match},
    },
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Reconnect to the storage backend and keep the shared state in degraded mode when it is unavailable.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn MatchStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        let store = match connect().await {
            Ok(store) => store,
            Err(err) => {
                warn!(error = %err, "storage connection attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
                continue;
            }
        };

        if let Err(err) = attach(&state, store.clone()).await {
            warn!(error = %err, "failed to load matches from storage");
            sleep(delay).await;
            delay = (delay * 2).min(MAX_DELAY);
            continue;
        }
        info!("storage connection established; leaving degraded mode");
        delay = INITIAL_DELAY;

        loop {
            sleep(HEALTH_POLL_INTERVAL).await;
            if store.health_check().await.is_ok() {
                if state.is_degraded() {
                    info!("storage healthy again; leaving degraded mode");
                    state.update_degraded(false);
                }
                continue;
            }

            if !reconnect(&state, store.as_ref()).await {
                warn!("exhausted storage reconnect attempts; staying in degraded mode");
                state.clear_match_store().await;
                break;
            }
            state.update_degraded(false);
        }

        sleep(delay).await;
        delay = (delay * 2).min(MAX_DELAY);
    }
}

async fn reconnect(state: &SharedState, store: &dyn MatchStore) -> bool {
    let mut reconnect_delay = INITIAL_DELAY;
    for attempt in 0..MAX_RECONNECT_ATTEMPTS {
        match store.try_reconnect().await {
            Ok(()) => {
                info!(attempt, "storage reconnection succeeded after health check failure");
                return true;
            }
            Err(err) => {
                if attempt == 0 {
                    warn!(
                        attempt, error = %err,
                        "storage reconnect first attempt failed; entering in degraded mode"
                    );
                    state.update_degraded(true);
                } else {
                    warn!(attempt, error = %err, "storage reconnect attempt failed");
                }
                sleep(reconnect_delay).await;
                reconnect_delay = (reconnect_delay * 2).min(MAX_DELAY);
            }
        }
    }
    false
}

/// Load matches and the competitor directory from `store`, install it and push the
/// loaded snapshot to viewers.
///
/// Stored records violating match invariants are logged and skipped.
pub async fn attach(state: &SharedState, store: Arc<dyn MatchStore>) -> Result<usize, StorageError> {
    let loaded = {
        let _gate = state.lock_mutations().await;

        let entities = store.list_matches().await?;
        let competitors = store.list_competitors().await?;

        let records: Vec<Match> = entities
            .into_iter()
            .map(Match::from)
            .filter(|record| match record.check_invariants() {
                Ok(()) => true,
                Err(err) => {
                    warn!(match_id = %record.id, error = %err, "skipping inconsistent stored match");
                    false
                }
            })
            .collect();
        let loaded = records.len();

        state.replace_matches(records).await;
        state.competitors().clear();
        for competitor in competitors.into_iter().map(Competitor::from) {
            state.competitors().insert(competitor.id, competitor);
        }
        state.install_match_store(store).await;
        loaded
    };

    info!(matches = loaded, "match table loaded from storage");
    broadcast_service::broadcast_all_matches(state).await;
    Ok(loaded)
}
