//! Admin match setup and competitor directory maintenance.

use std::time::SystemTime;

use tracing::info;
use uuid::Uuid;

use crate::{
    dao::models::CompetitorEntity,
    dao::storage::with_deadline,
    dto::{
        admin::{AdvancementInput, CreateMatchRequest, UpdateMatchRequest, UpsertCompetitorsRequest},
        matches::MatchSnapshot,
    },
    error::ServiceError,
    services::broadcast_service,
    state::{
        SharedState,
        matches::{Advancement, Competitor, Match},
    },
};

/// Create a standalone match.
pub async fn create_match(
    state: &SharedState,
    request: CreateMatchRequest,
) -> Result<MatchSnapshot, ServiceError> {
    let mut record = Match::new(
        request.category.trim().to_string(),
        request.round.trim().to_string(),
        request.level.trim().to_string(),
        request.referee_id,
        state.config().rules(),
        SystemTime::now(),
    );
    record.competitor_a = request.competitor_a;
    record.competitor_b = request.competitor_b;
    record.show_in_dashboard = request.show_in_dashboard;
    record.next = request.advancement.map(advancement);

    {
        let _gate = state.lock_mutations().await;
        ensure_consistent(state, &record).await?;
        state.persist_matches(std::slice::from_ref(&record)).await?;
        state.commit_matches([record.clone()]).await;
    }

    info!(match_id = %record.id, "match created");
    broadcast_service::broadcast_all_matches(state).await;
    Ok(MatchSnapshot::build(&record, |id| state.competitor(id)))
}

/// Change the setup of an existing match. Scores, clock and outcome are left to
/// control commands.
pub async fn update_match(
    state: &SharedState,
    id: Uuid,
    request: UpdateMatchRequest,
) -> Result<MatchSnapshot, ServiceError> {
    let updated = {
        let _gate = state.lock_mutations().await;
        let current = state
            .find_match(id)
            .await
            .ok_or_else(|| ServiceError::NotFound(format!("match `{id}` not found")))?;

        let mut updated = current.clone();
        if let Some(competitor) = request.competitor_a {
            updated.competitor_a = competitor;
        }
        if let Some(competitor) = request.competitor_b {
            updated.competitor_b = competitor;
        }
        if let Some(category) = request.category {
            updated.category = category.trim().to_string();
        }
        if let Some(round) = request.round {
            updated.round = round.trim().to_string();
        }
        if let Some(level) = request.level {
            updated.level = level.trim().to_string();
        }
        if let Some(link) = request.advancement {
            updated.next = link.map(advancement);
        }
        if let Some(referee_id) = request.referee_id {
            updated.referee_id = referee_id;
        }
        if let Some(pinned) = request.show_in_dashboard {
            updated.show_in_dashboard = pinned;
        }

        if updated.winner.is_some_and(|winner| {
            updated.competitor_a != Some(winner) && updated.competitor_b != Some(winner)
        }) {
            return Err(ServiceError::InvalidState(
                "cannot replace the winner of a finished match; unfinish it first".into(),
            ));
        }
        ensure_consistent(state, &updated).await?;

        if updated != current {
            updated.updated_at = SystemTime::now();
            state.persist_matches(std::slice::from_ref(&updated)).await?;
            state.commit_matches([updated.clone()]).await;
        }
        updated
    };

    info!(match_id = %id, "match updated");
    broadcast_service::broadcast_all_matches(state).await;
    Ok(MatchSnapshot::build(&updated, |id| state.competitor(id)))
}

/// Delete a match that no other match feeds into.
pub async fn delete_match(state: &SharedState, id: Uuid) -> Result<(), ServiceError> {
    {
        let _gate = state.lock_mutations().await;
        let (exists, feeders) = state
            .read_matches(|table| {
                let feeders = table
                    .values()
                    .filter(|record| record.next.is_some_and(|link| link.match_id == id))
                    .count();
                (table.contains_key(&id), feeders)
            })
            .await;

        if !exists {
            return Err(ServiceError::NotFound(format!("match `{id}` not found")));
        }
        if feeders > 0 {
            return Err(ServiceError::InvalidState(format!(
                "match `{id}` receives winners from {feeders} match(es)"
            )));
        }

        let store = state.require_match_store().await?;
        with_deadline(
            "delete_match",
            state.config().persist_timeout(),
            store.delete_match(id),
        )
        .await?;
        state.remove_match(id).await;
    }

    info!(match_id = %id, "match deleted");
    broadcast_service::broadcast_all_matches(state).await;
    Ok(())
}

/// Insert or replace competitor directory entries.
pub async fn upsert_competitors(
    state: &SharedState,
    request: UpsertCompetitorsRequest,
) -> Result<usize, ServiceError> {
    let competitors: Vec<Competitor> = request
        .competitors
        .into_iter()
        .map(|input| Competitor {
            id: input.id,
            name: input.name.trim().to_string(),
            institution_name: input
                .institution_name
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty()),
        })
        .collect();
    let count = competitors.len();

    let store = state.require_match_store().await?;
    let entities: Vec<CompetitorEntity> = competitors.iter().cloned().map(Into::into).collect();
    with_deadline(
        "save_competitors",
        state.config().persist_timeout(),
        store.save_competitors(entities),
    )
    .await?;

    for competitor in competitors {
        state.competitors().insert(competitor.id, competitor);
    }

    info!(count, "competitor directory updated");
    broadcast_service::broadcast_all_matches(state).await;
    Ok(count)
}

fn advancement(input: AdvancementInput) -> Advancement {
    Advancement {
        match_id: input.next_match_id,
        slot: input.position,
    }
}

/// Check structural invariants and that the advancement target exists and has the slot
/// free for this match.
async fn ensure_consistent(state: &SharedState, record: &Match) -> Result<(), ServiceError> {
    record
        .check_invariants()
        .map_err(|err| ServiceError::InvalidInput(err.to_string()))?;

    let Some(link) = record.next else {
        return Ok(());
    };

    state
        .read_matches(|table| {
            if !table.contains_key(&link.match_id) {
                return Err(ServiceError::InvalidInput(format!(
                    "next match `{}` does not exist",
                    link.match_id
                )));
            }
            let taken = table.values().any(|other| {
                other.id != record.id
                    && other.next.is_some_and(|other_link| other_link == link)
            });
            if taken {
                return Err(ServiceError::InvalidState(format!(
                    "slot {:?} of match `{}` is already fed by another match",
                    link.slot, link.match_id
                )));
            }
            Ok(())
        })
        .await
}
