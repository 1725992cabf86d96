//! Referee command processing: validate, apply on copies, persist, commit, broadcast.

use std::time::SystemTime;

use indexmap::IndexMap;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    error::ServiceError,
    services::broadcast_service,
    state::{
        SharedState,
        access::Role,
        matches::{Advancement, CommandError, CommandOutcome, Match, MatchCommand, Slot},
    },
};

/// Apply `command` to match `match_id` on behalf of `role`.
///
/// Nothing is broadcast when the command is rejected. Accepted commands always trigger a
/// full snapshot broadcast, even when they left the match unchanged.
pub async fn execute(
    state: &SharedState,
    role: &Role,
    match_id: Uuid,
    command: MatchCommand,
) -> Result<CommandOutcome, ServiceError> {
    if !role.can_control() {
        return Err(ServiceError::Unauthorized(
            "viewers cannot control matches".into(),
        ));
    }

    let outcome = {
        let _gate = state.lock_mutations().await;

        let target = state
            .find_match(match_id)
            .await
            .ok_or(CommandError::MatchNotFound(match_id))?;

        if !role.may_control(&target, state.config().enforce_referee_assignment()) {
            return Err(CommandError::Forbidden(match_id).into());
        }

        if matches!(command, MatchCommand::AdvanceBye) {
            let pending = state
                .read_matches(|table| pending_feeder(table, &target))
                .await;
            if let Some(feeder_id) = pending {
                warn!(
                    match_id = %match_id,
                    feeder_id = %feeder_id,
                    "bye refused while the empty slot still awaits a winner"
                );
                return Err(CommandError::NotABye(match_id).into());
            }
        }

        let mut next = match target.next {
            Some(link) if command.touches_next_match() => state.find_match(link.match_id).await,
            _ => None,
        };

        let mut updated = target.clone();
        let outcome = updated.apply(
            &command,
            next.as_mut(),
            state.config().rules(),
            SystemTime::now(),
        )?;

        let mut changed = Vec::with_capacity(2);
        if outcome.changed {
            changed.push(updated);
        }
        if let (true, Some(next)) = (outcome.next_changed, next) {
            changed.push(next);
        }

        if !changed.is_empty() {
            state.persist_matches(&changed).await.inspect_err(|err| {
                warn!(
                    match_id = %match_id,
                    action = command.action_name(),
                    error = %err,
                    "control command not persisted"
                );
            })?;
            state.commit_matches(changed).await;
        }
        outcome
    };

    info!(
        match_id = %match_id,
        action = command.action_name(),
        changed = outcome.changed,
        advanced = outcome.next_changed,
        "control command applied"
    );
    broadcast_service::broadcast_all_matches(state).await;
    Ok(outcome)
}

/// Match that may still send a winner into the empty slot of `target`.
///
/// A slot is a real bye when nothing feeds it, or when its feeder finished without a winner.
fn pending_feeder(table: &IndexMap<Uuid, Match>, target: &Match) -> Option<Uuid> {
    let empty_slot = match (target.competitor_a, target.competitor_b) {
        (Some(_), None) => Slot::B,
        (None, Some(_)) => Slot::A,
        _ => return None,
    };
    let link = Advancement {
        match_id: target.id,
        slot: empty_slot,
    };

    table
        .values()
        .find(|feeder| {
            feeder.next == Some(link) && !(feeder.is_finished && feeder.winner.is_none())
        })
        .map(|feeder| feeder.id)
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use super::*;
    use crate::{
        config::AppConfig,
        dao::match_store::test_support::FlakyStore,
        dto::events::ALL_MATCHES_EVENT,
        state::{
            AppState,
            matches::MatchRules,
        },
    };

    fn new_match(round: &str) -> Match {
        let mut record = Match::new(
            "sumo".into(),
            round.into(),
            "school".into(),
            Some("ref-1".into()),
            &MatchRules::default(),
            SystemTime::now(),
        );
        record.competitor_a = Some(Uuid::new_v4());
        record.competitor_b = Some(Uuid::new_v4());
        record
    }

    async fn setup(config: AppConfig) -> (SharedState, FlakyStore, Match, Match) {
        let state = AppState::new(config);
        let store = FlakyStore::new();
        state.install_match_store(Arc::new(store.clone())).await;

        let mut parent = new_match("FINAL");
        parent.competitor_a = None;
        parent.competitor_b = None;
        let mut child = new_match("SEMIS");
        child.next = Some(Advancement {
            match_id: parent.id,
            slot: Slot::A,
        });
        state.commit_matches([parent.clone(), child.clone()]).await;
        (state, store, parent, child)
    }

    #[tokio::test]
    async fn finish_advances_persists_and_broadcasts_once() {
        let (state, store, parent, child) = setup(AppConfig::default()).await;
        let mut rx = state.viewers().subscribe();

        execute(
            &state,
            &Role::Admin,
            child.id,
            MatchCommand::AddScore {
                slot: Slot::A,
                amount: 3,
            },
        )
        .await
        .unwrap();
        rx.recv().await.unwrap();

        let outcome = execute(&state, &Role::Admin, child.id, MatchCommand::Finish)
            .await
            .unwrap();
        assert!(outcome.changed && outcome.next_changed);

        let committed_parent = state.find_match(parent.id).await.unwrap();
        assert_eq!(committed_parent.competitor_a, child.competitor_a);
        assert_eq!(
            store.stored(parent.id).await.unwrap().competitor_a,
            child.competitor_a
        );

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event, ALL_MATCHES_EVENT);
        let snapshot = event.data.as_array().unwrap();
        let finished = snapshot
            .iter()
            .find(|entry| entry["id"] == child.id.to_string())
            .unwrap();
        assert_eq!(finished["isFinished"], true);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unknown_match_is_rejected_without_broadcast() {
        let (state, _store, _parent, _child) = setup(AppConfig::default()).await;
        let mut rx = state.viewers().subscribe();

        let err = execute(&state, &Role::Admin, Uuid::new_v4(), MatchCommand::Start)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn persistence_failure_leaves_state_untouched() {
        let (state, store, _parent, child) = setup(AppConfig::default()).await;
        store.fail_all(true);
        let mut rx = state.viewers().subscribe();

        let err = execute(&state, &Role::Admin, child.id, MatchCommand::Start)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unavailable(_)));
        assert!(!state.find_match(child.id).await.unwrap().is_active);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn stalled_storage_times_out() {
        let config = AppConfig::default().with_persist_timeout(Duration::from_millis(50));
        let (state, store, _parent, child) = setup(config).await;
        store.stall_writes(Duration::from_secs(5));

        let err = execute(&state, &Role::Admin, child.id, MatchCommand::Start)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Timeout));
        assert!(!state.find_match(child.id).await.unwrap().is_active);
    }

    #[tokio::test]
    async fn bye_refused_while_sibling_feeder_is_live() {
        let (state, _store, parent, child) = setup(AppConfig::default()).await;
        let mut sibling = new_match("SEMIS");
        sibling.next = Some(Advancement {
            match_id: parent.id,
            slot: Slot::B,
        });
        state.commit_matches([sibling.clone()]).await;

        execute(
            &state,
            &Role::Admin,
            child.id,
            MatchCommand::AddScore {
                slot: Slot::A,
                amount: 2,
            },
        )
        .await
        .unwrap();
        execute(&state, &Role::Admin, child.id, MatchCommand::Finish)
            .await
            .unwrap();
        execute(&state, &Role::Admin, sibling.id, MatchCommand::Start)
            .await
            .unwrap();

        let mut rx = state.viewers().subscribe();
        let err = execute(&state, &Role::Admin, parent.id, MatchCommand::AdvanceBye)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
        assert!(rx.try_recv().is_err());

        let final_match = state.find_match(parent.id).await.unwrap();
        assert!(!final_match.is_finished);
        assert_eq!(final_match.competitor_a, child.competitor_a);
        assert_eq!(final_match.competitor_b, None);
    }

    #[tokio::test]
    async fn bye_allowed_once_sibling_feeder_ends_without_winner() {
        let (state, _store, parent, child) = setup(AppConfig::default()).await;
        let mut sibling = new_match("SEMIS");
        sibling.next = Some(Advancement {
            match_id: parent.id,
            slot: Slot::B,
        });
        state.commit_matches([sibling.clone()]).await;

        execute(
            &state,
            &Role::Admin,
            child.id,
            MatchCommand::AddScore {
                slot: Slot::A,
                amount: 2,
            },
        )
        .await
        .unwrap();
        execute(&state, &Role::Admin, child.id, MatchCommand::Finish)
            .await
            .unwrap();
        execute(&state, &Role::Admin, sibling.id, MatchCommand::Finish)
            .await
            .unwrap();

        execute(&state, &Role::Admin, parent.id, MatchCommand::AdvanceBye)
            .await
            .unwrap();
        let final_match = state.find_match(parent.id).await.unwrap();
        assert!(final_match.is_finished);
        assert_eq!(final_match.winner, child.competitor_a);
    }

    #[tokio::test]
    async fn viewers_and_unassigned_referees_are_refused() {
        let config = AppConfig::default().with_referee_assignment(true);
        let (state, _store, _parent, child) = setup(config).await;

        let err = execute(&state, &Role::Viewer, child.id, MatchCommand::Start)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));

        let err = execute(
            &state,
            &Role::Referee("ref-2".into()),
            child.id,
            MatchCommand::Start,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        execute(
            &state,
            &Role::Referee("ref-1".into()),
            child.id,
            MatchCommand::Start,
        )
        .await
        .unwrap();
        assert!(state.find_match(child.id).await.unwrap().is_active);
    }
}
