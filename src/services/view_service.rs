//! Read-only projections: match lookups, bracket trees and the dashboard.

use std::collections::HashMap;

use indexmap::IndexMap;
use uuid::Uuid;

use crate::{
    dto::{
        matches::MatchSnapshot,
        public::{BracketNode, DashboardResponse},
    },
    error::ServiceError,
    services::broadcast_service,
    state::{
        SharedState,
        matches::{Competitor, Match, Slot},
    },
};

/// Every committed match.
pub async fn list_matches(state: &SharedState) -> Vec<MatchSnapshot> {
    broadcast_service::snapshot(state).await
}

/// A single match.
pub async fn get_match(state: &SharedState, id: Uuid) -> Result<MatchSnapshot, ServiceError> {
    let record = state
        .find_match(id)
        .await
        .ok_or_else(|| ServiceError::NotFound(format!("match `{id}` not found")))?;
    Ok(MatchSnapshot::build(&record, |id| state.competitor(id)))
}

/// Rebuild the tree of a generated bracket from its root.
pub async fn bracket_tree(
    state: &SharedState,
    bracket_id: Uuid,
) -> Result<BracketNode, ServiceError> {
    state
        .read_matches(|table| {
            let members: Vec<&Match> = table
                .values()
                .filter(|record| record.bracket_id == Some(bracket_id))
                .collect();
            let root = members
                .iter()
                .find(|record| record.is_root())
                .ok_or_else(|| ServiceError::NotFound(format!("bracket `{bracket_id}` not found")))?;

            let mut feeders: HashMap<(Uuid, Slot), &Match> = HashMap::new();
            for record in &members {
                if let Some(link) = record.next {
                    feeders.insert((link.match_id, link.slot), *record);
                }
            }

            Ok(build_node(root, &feeders, &|id| state.competitor(id)))
        })
        .await
}

fn build_node(
    record: &Match,
    feeders: &HashMap<(Uuid, Slot), &Match>,
    lookup: &dyn Fn(Uuid) -> Option<Competitor>,
) -> BracketNode {
    let child = |slot| {
        feeders
            .get(&(record.id, slot))
            .map(|feeder| Box::new(build_node(feeder, feeders, lookup)))
    };
    BracketNode {
        match_: MatchSnapshot::build(record, lookup),
        feeder_a: child(Slot::A),
        feeder_b: child(Slot::B),
    }
}

/// Dashboard content: the featured match, running matches and admin pins.
pub async fn dashboard(state: &SharedState) -> DashboardResponse {
    let threshold = state.config().focus_threshold_secs();
    let (focus, active, pinned) = state
        .read_matches(|table| {
            let focus = pick_focus(table, threshold).map(|record| record.id);

            let mut active: Vec<&Match> = table.values().filter(|record| record.is_active).collect();
            active.sort_by_key(|record| record.time_remaining);

            let project = |record: &Match| MatchSnapshot::build(record, |id| state.competitor(id));
            (
                focus.and_then(|id| table.get(&id)).map(project),
                active.into_iter().map(project).collect::<Vec<_>>(),
                table
                    .values()
                    .filter(|record| record.show_in_dashboard)
                    .map(project)
                    .collect::<Vec<_>>(),
            )
        })
        .await;

    DashboardResponse {
        focus,
        active,
        pinned,
        degraded: state.is_degraded(),
    }
}

/// Match to feature on the dashboard: the active match closest to its end when one is
/// at or under `threshold_secs`, otherwise the most recently started active match.
pub fn pick_focus(table: &IndexMap<Uuid, Match>, threshold_secs: u32) -> Option<&Match> {
    let active = || table.values().filter(|record| record.is_active);

    active()
        .filter(|record| record.time_remaining <= threshold_secs)
        .min_by_key(|record| record.time_remaining)
        .or_else(|| active().max_by_key(|record| record.started_at))
}
