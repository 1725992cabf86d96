use std::time::SystemTime;

use rand::rng;
use tracing::info;

use crate::{
    dto::{
        admin::{BracketCreatedResponse, CreateBracketRequest},
        matches::MatchSnapshot,
    },
    error::ServiceError,
    services::broadcast_service,
    state::{
        SharedState,
        bracket::{BracketSeed, build_bracket},
    },
};

/// Generate a bracket, store it as one unit and announce it to viewers.
pub async fn create_bracket(
    state: &SharedState,
    request: CreateBracketRequest,
) -> Result<BracketCreatedResponse, ServiceError> {
    let seed = BracketSeed {
        category: request.category.trim().to_string(),
        level: request.level.trim().to_string(),
        competitors: request.competitor_ids,
        referee_id: request.referee_id,
    };
    let competitors = seed.competitors.len();

    let matches = {
        let mut rng = rng();
        build_bracket(seed, state.config().rules(), &mut rng, SystemTime::now())?
    };
    let bracket_id = matches
        .first()
        .and_then(|root| root.bracket_id)
        .ok_or_else(|| ServiceError::InvalidState("generated bracket is empty".into()))?;

    {
        let _gate = state.lock_mutations().await;
        state.persist_matches(&matches).await?;
        state.commit_matches(matches.iter().cloned()).await;
    }

    info!(
        bracket_id = %bracket_id,
        competitors,
        matches = matches.len(),
        "bracket generated"
    );
    broadcast_service::broadcast_all_matches(state).await;

    Ok(BracketCreatedResponse {
        bracket_id,
        matches: matches
            .iter()
            .map(|record| MatchSnapshot::build(record, |id| state.competitor(id)))
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use uuid::Uuid;

    use super::*;
    use crate::{
        config::AppConfig, dao::match_store::test_support::FlakyStore, state::AppState,
    };

    fn request(count: usize) -> CreateBracketRequest {
        CreateBracketRequest {
            category: "sumo".into(),
            level: "university".into(),
            competitor_ids: (0..count).map(|_| Uuid::new_v4()).collect(),
            referee_id: Some("ref-1".into()),
        }
    }

    #[tokio::test]
    async fn bracket_is_committed_and_broadcast() {
        let state = AppState::new(AppConfig::default());
        let store = FlakyStore::new();
        state.install_match_store(Arc::new(store.clone())).await;
        let mut rx = state.viewers().subscribe();

        let created = create_bracket(&state, request(5)).await.unwrap();
        assert_eq!(created.matches.len(), 7);
        assert_eq!(created.matches[0].round, "FINAL");
        assert!(store.stored(created.matches[6].id).await.is_some());
        assert_eq!(state.read_matches(|table| table.len()).await, 7);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.data.as_array().unwrap().len(), 7);
    }

    #[tokio::test]
    async fn failed_batch_leaves_no_match_behind() {
        let state = AppState::new(AppConfig::default());
        let store = FlakyStore::new();
        store.fail_all(true);
        state.install_match_store(Arc::new(store.clone())).await;

        let err = create_bracket(&state, request(4)).await.unwrap_err();
        assert!(matches!(err, ServiceError::Unavailable(_)));
        assert_eq!(state.read_matches(|table| table.len()).await, 0);
    }

    #[tokio::test]
    async fn single_competitor_is_invalid_input() {
        let state = AppState::new(AppConfig::default());
        state
            .install_match_store(Arc::new(FlakyStore::new()))
            .await;

        let err = create_bracket(&state, request(1)).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }
}
