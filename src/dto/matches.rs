use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dto::format_system_time,
    state::matches::{Competitor, Match, Slot},
};

#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
/// Competitor slot resolved against the competitor directory.
pub struct CompetitorSnapshot {
    /// Competitor id.
    pub id: Uuid,
    /// Competitor display name, unset when the directory has no entry.
    pub name: Option<String>,
    /// Owning institution display name.
    pub institution_name: Option<String>,
}

impl CompetitorSnapshot {
    /// Resolve `id` through `lookup`.
    pub fn resolve(id: Uuid, lookup: impl Fn(Uuid) -> Option<Competitor>) -> Self {
        match lookup(id) {
            Some(competitor) => Self {
                id,
                name: Some(competitor.name),
                institution_name: competitor.institution_name,
            },
            None => Self {
                id,
                name: None,
                institution_name: None,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
/// Public projection of a match, as broadcast in `all_matches` events.
pub struct MatchSnapshot {
    /// Match id.
    pub id: Uuid,
    /// Bracket the match belongs to.
    pub bracket_id: Option<Uuid>,
    /// Competitor in slot A.
    pub competitor_a: Option<CompetitorSnapshot>,
    /// Competitor in slot B.
    pub competitor_b: Option<CompetitorSnapshot>,
    /// Score of slot A.
    pub score_a: u32,
    /// Score of slot B.
    pub score_b: u32,
    /// Penalties of slot A, oldest first.
    pub penalties_a: Vec<String>,
    /// Penalties of slot B, oldest first.
    pub penalties_b: Vec<String>,
    /// Seconds left on the clock.
    pub time_remaining: u32,
    /// Whether the clock is running.
    pub is_active: bool,
    /// Whether an outcome was declared.
    pub is_finished: bool,
    /// Winning competitor id.
    pub winner: Option<Uuid>,
    /// Competition category.
    pub category: String,
    /// Round label.
    pub round: String,
    /// Competition level.
    pub level: String,
    /// Match receiving the winner.
    pub next_match_id: Option<Uuid>,
    /// Slot of the next match receiving the winner.
    pub position_in_next_match: Option<Slot>,
    /// Operator expected to control the match.
    pub referee_id: Option<String>,
    /// Admin dashboard pin.
    pub show_in_dashboard: bool,
    /// RFC 3339 timestamp of the last start.
    pub started_at: Option<String>,
    /// RFC 3339 timestamp of the last change.
    pub updated_at: String,
}

impl MatchSnapshot {
    /// Project `value`, resolving competitor names through `lookup`.
    pub fn build(value: &Match, lookup: impl Fn(Uuid) -> Option<Competitor>) -> Self {
        let resolve = |id: Option<Uuid>| id.map(|id| CompetitorSnapshot::resolve(id, &lookup));
        Self {
            id: value.id,
            bracket_id: value.bracket_id,
            competitor_a: resolve(value.competitor_a),
            competitor_b: resolve(value.competitor_b),
            score_a: value.score_a,
            score_b: value.score_b,
            penalties_a: value.penalties_a.clone(),
            penalties_b: value.penalties_b.clone(),
            time_remaining: value.time_remaining,
            is_active: value.is_active,
            is_finished: value.is_finished,
            winner: value.winner,
            category: value.category.clone(),
            round: value.round.clone(),
            level: value.level.clone(),
            next_match_id: value.next.map(|link| link.match_id),
            position_in_next_match: value.next.map(|link| link.slot),
            referee_id: value.referee_id.clone(),
            show_in_dashboard: value.show_in_dashboard,
            started_at: value.started_at.map(format_system_time),
            updated_at: format_system_time(value.updated_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;
    use crate::state::matches::MatchRules;

    #[test]
    fn snapshot_resolves_names_and_uses_camel_case() {
        let mut value = Match::new(
            "sumo".into(),
            "FINAL".into(),
            "school".into(),
            None,
            &MatchRules::default(),
            SystemTime::UNIX_EPOCH,
        );
        let known = Uuid::new_v4();
        let unknown = Uuid::new_v4();
        value.competitor_a = Some(known);
        value.competitor_b = Some(unknown);

        let snapshot = MatchSnapshot::build(&value, |id| {
            (id == known).then(|| Competitor {
                id,
                name: "Bolt".into(),
                institution_name: Some("UNI".into()),
            })
        });

        let a = snapshot.competitor_a.clone().unwrap();
        assert_eq!(a.name.as_deref(), Some("Bolt"));
        assert_eq!(a.institution_name.as_deref(), Some("UNI"));
        assert_eq!(snapshot.competitor_b.clone().unwrap().name, None);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["timeRemaining"], 180);
        assert_eq!(json["competitorA"]["institutionName"], "UNI");
        assert_eq!(json["updatedAt"], "1970-01-01T00:00:00Z");
    }
}
