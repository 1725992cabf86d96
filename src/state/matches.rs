//! Runtime match model and the rules applied to it by referee commands and timer ticks.
//!
//! Everything in this module is synchronous and side-effect free: services clone the
//! records they want to change, run the rules on the copies, persist them and only then
//! commit the copies back into the shared table.

use std::{cmp::Ordering, time::SystemTime};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dao::models::{CompetitorEntity, MatchEntity, SlotEntity};

/// One of the two competitor slots of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum Slot {
    /// First slot.
    A,
    /// Second slot.
    B,
}

impl Slot {
    /// Slot of the parent match fed by the child at `index` within its round.
    pub fn for_child_index(index: usize) -> Self {
        if index % 2 == 0 { Slot::A } else { Slot::B }
    }
}

/// Link from a match to the one its winner feeds into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Advancement {
    /// Identifier of the next match.
    pub match_id: Uuid,
    /// Slot of the next match filled by the winner.
    pub slot: Slot,
}

/// Tunables applied when creating matches and resolving command defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRules {
    /// Initial clock value, also restored by RESET.
    pub match_duration_secs: u32,
    /// Seconds added by ADD_TIME when no amount is given.
    pub add_time_secs: u32,
    /// Penalty label used by ADD_PENALTY when no reason is given.
    pub default_penalty: String,
}

/// Competitor directory entry used to resolve display names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Competitor {
    /// Stable identifier for the competitor.
    pub id: Uuid,
    /// Display name of the competitor.
    pub name: String,
    /// Display name of the owning institution.
    pub institution_name: Option<String>,
}

/// A head-to-head contest between two competitor slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    /// Primary key of the match.
    pub id: Uuid,
    /// Generated bracket this match belongs to, if any.
    pub bracket_id: Option<Uuid>,
    /// Competitor in slot A.
    pub competitor_a: Option<Uuid>,
    /// Competitor in slot B.
    pub competitor_b: Option<Uuid>,
    /// Score of slot A.
    pub score_a: u32,
    /// Score of slot B.
    pub score_b: u32,
    /// Penalties of slot A in chronological order.
    pub penalties_a: Vec<String>,
    /// Penalties of slot B in chronological order.
    pub penalties_b: Vec<String>,
    /// Seconds left on the clock.
    pub time_remaining: u32,
    /// Whether the clock is running.
    pub is_active: bool,
    /// Whether an outcome was declared.
    pub is_finished: bool,
    /// Winning competitor, always one of the two slots.
    pub winner: Option<Uuid>,
    /// Competition category.
    pub category: String,
    /// Round label.
    pub round: String,
    /// Competition level.
    pub level: String,
    /// Where the winner goes next; `None` for a bracket root.
    pub next: Option<Advancement>,
    /// Operator expected to control the match.
    pub referee_id: Option<String>,
    /// Whether an admin pinned the match on the public dashboard.
    pub show_in_dashboard: bool,
    /// Last time the clock was started.
    pub started_at: Option<SystemTime>,
    /// Creation timestamp.
    pub created_at: SystemTime,
    /// Last mutation timestamp.
    pub updated_at: SystemTime,
}

/// Referee action validated at the connection boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchCommand {
    /// Start the clock.
    Start,
    /// Stop the clock.
    Pause,
    /// Zero scores and penalties and rewind the clock.
    Reset,
    /// Add points to a slot; negative amounts correct a mistake, floored at zero.
    AddScore {
        /// Slot receiving the points.
        slot: Slot,
        /// Points to add.
        amount: i64,
    },
    /// Record a penalty against a slot.
    AddPenalty {
        /// Penalised slot.
        slot: Slot,
        /// Reason displayed to viewers.
        reason: String,
    },
    /// Extend (or shorten) the clock, floored at zero.
    AddTime {
        /// Seconds to add.
        seconds: i64,
    },
    /// Declare the outcome and advance the winner.
    Finish,
    /// Reopen a finished match, retracting its advancement.
    Unfinish,
    /// Finish a match with a single competitor and advance that competitor.
    AdvanceBye,
}

impl MatchCommand {
    /// Wire name of the action, as sent by referee consoles.
    pub fn action_name(&self) -> &'static str {
        match self {
            MatchCommand::Start => "START",
            MatchCommand::Pause => "PAUSE",
            MatchCommand::Reset => "RESET",
            MatchCommand::AddScore { slot: Slot::A, .. } => "ADD_SCORE_A",
            MatchCommand::AddScore { slot: Slot::B, .. } => "ADD_SCORE_B",
            MatchCommand::AddPenalty { slot: Slot::A, .. } => "ADD_PENALTY_A",
            MatchCommand::AddPenalty { slot: Slot::B, .. } => "ADD_PENALTY_B",
            MatchCommand::AddTime { .. } => "ADD_TIME",
            MatchCommand::Finish => "FINISH",
            MatchCommand::Unfinish => "UNFINISH",
            MatchCommand::AdvanceBye => "ADVANCE_BYE",
        }
    }

    /// Whether applying the command may write into the next match.
    pub fn touches_next_match(&self) -> bool {
        matches!(
            self,
            MatchCommand::Finish | MatchCommand::Unfinish | MatchCommand::AdvanceBye
        )
    }
}

/// Reasons a control command cannot be applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// The action name is not part of the control vocabulary.
    #[error("unknown action `{0}`")]
    UnknownAction(String),
    /// The match id could not be parsed.
    #[error("invalid match id `{0}`")]
    InvalidMatchId(String),
    /// No match with this id exists.
    #[error("match `{0}` not found")]
    MatchNotFound(Uuid),
    /// The caller may not control this match.
    #[error("not allowed to control match `{0}`")]
    Forbidden(Uuid),
    /// A finished match cannot be started again before UNFINISH.
    #[error("match `{0}` is finished")]
    AlreadyFinished(Uuid),
    /// ADVANCE_BYE requires exactly one competitor.
    #[error("match `{0}` is not a bye")]
    NotABye(Uuid),
    /// The next match referenced by the bracket link does not exist.
    #[error("next match `{0}` is missing")]
    NextMatchMissing(Uuid),
    /// UNFINISH refused because the next match already progressed.
    #[error("next match `{0}` already progressed; cannot retract the advanced winner")]
    DownstreamProgressed(Uuid),
}

/// Which records a command modified.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommandOutcome {
    /// The target match changed.
    pub changed: bool,
    /// The next match changed (advancement or retraction).
    pub next_changed: bool,
}

/// Broken structural invariant of a match record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    /// Winner is neither competitor.
    #[error("winner must be one of the match competitors")]
    WinnerNotCompetitor,
    /// Running clock on a finished match.
    #[error("a finished match cannot be active")]
    ActiveAndFinished,
    /// Match linked to itself.
    #[error("a match cannot feed into itself")]
    SelfReference,
    /// Same competitor on both sides.
    #[error("a competitor cannot face itself")]
    SameCompetitor,
}

impl Match {
    /// Build an empty match using the configured clock duration.
    pub fn new(
        category: String,
        round: String,
        level: String,
        referee_id: Option<String>,
        rules: &MatchRules,
        now: SystemTime,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            bracket_id: None,
            competitor_a: None,
            competitor_b: None,
            score_a: 0,
            score_b: 0,
            penalties_a: Vec::new(),
            penalties_b: Vec::new(),
            time_remaining: rules.match_duration_secs,
            is_active: false,
            is_finished: false,
            winner: None,
            category,
            round,
            level,
            next: None,
            referee_id,
            show_in_dashboard: false,
            started_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Competitor currently in `slot`.
    pub fn competitor(&self, slot: Slot) -> Option<Uuid> {
        match slot {
            Slot::A => self.competitor_a,
            Slot::B => self.competitor_b,
        }
    }

    /// Replace the competitor in `slot`.
    pub fn set_competitor(&mut self, slot: Slot, competitor: Option<Uuid>) {
        match slot {
            Slot::A => self.competitor_a = competitor,
            Slot::B => self.competitor_b = competitor,
        }
    }

    fn score_mut(&mut self, slot: Slot) -> &mut u32 {
        match slot {
            Slot::A => &mut self.score_a,
            Slot::B => &mut self.score_b,
        }
    }

    fn penalties_mut(&mut self, slot: Slot) -> &mut Vec<String> {
        match slot {
            Slot::A => &mut self.penalties_a,
            Slot::B => &mut self.penalties_b,
        }
    }

    /// Whether this match is the root (final) of its bracket.
    pub fn is_root(&self) -> bool {
        self.next.is_none()
    }

    /// Whether anything happened in this match since it was created or reset.
    pub fn has_progressed(&self, rules: &MatchRules) -> bool {
        self.is_active
            || self.is_finished
            || self.score_a > 0
            || self.score_b > 0
            || !self.penalties_a.is_empty()
            || !self.penalties_b.is_empty()
            || self.time_remaining != rules.match_duration_secs
    }

    /// Competitor with the strictly higher score, if any.
    pub fn leader(&self) -> Option<Uuid> {
        match self.score_a.cmp(&self.score_b) {
            Ordering::Greater => self.competitor_a,
            Ordering::Less => self.competitor_b,
            Ordering::Equal => None,
        }
    }

    /// Check the structural invariants enforced on every stored match.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        if let Some(winner) = self.winner {
            if self.competitor_a != Some(winner) && self.competitor_b != Some(winner) {
                return Err(InvariantViolation::WinnerNotCompetitor);
            }
        }
        if self.is_active && self.is_finished {
            return Err(InvariantViolation::ActiveAndFinished);
        }
        if self.next.is_some_and(|next| next.match_id == self.id) {
            return Err(InvariantViolation::SelfReference);
        }
        if self.competitor_a.is_some() && self.competitor_a == self.competitor_b {
            return Err(InvariantViolation::SameCompetitor);
        }
        Ok(())
    }

    /// Advance the clock by one tick. Returns whether the match changed.
    ///
    /// A clock already at zero stops the match without finishing it; a human still has
    /// to declare the outcome.
    pub fn tick(&mut self, now: SystemTime) -> bool {
        if !self.is_active {
            return false;
        }

        if self.time_remaining > 0 {
            self.time_remaining -= 1;
        } else {
            self.is_active = false;
        }
        self.updated_at = now;
        true
    }

    /// Apply a referee command.
    ///
    /// `next` must be the match referenced by [`Match::next`] whenever the command may
    /// touch it (see [`MatchCommand::touches_next_match`]). On error neither record is
    /// modified.
    pub fn apply(
        &mut self,
        command: &MatchCommand,
        mut next: Option<&mut Match>,
        rules: &MatchRules,
        now: SystemTime,
    ) -> Result<CommandOutcome, CommandError> {
        let before = self.clone();
        let mut next_changed = false;

        match command {
            MatchCommand::Start => {
                if self.is_finished {
                    return Err(CommandError::AlreadyFinished(self.id));
                }
                if !self.is_active {
                    self.is_active = true;
                    self.started_at = Some(now);
                }
            }
            MatchCommand::Pause => self.is_active = false,
            MatchCommand::Reset => {
                self.score_a = 0;
                self.score_b = 0;
                self.penalties_a.clear();
                self.penalties_b.clear();
                self.time_remaining = rules.match_duration_secs;
                self.is_active = false;
            }
            MatchCommand::AddScore { slot, amount } => {
                let score = self.score_mut(*slot);
                *score = saturating_offset(*score, *amount);
            }
            MatchCommand::AddPenalty { slot, reason } => {
                self.penalties_mut(*slot).push(reason.clone());
            }
            MatchCommand::AddTime { seconds } => {
                self.time_remaining = saturating_offset(self.time_remaining, *seconds);
            }
            MatchCommand::Finish => {
                let winner = self.leader();
                next_changed =
                    self.propagate_result(before.winner, winner, next.as_deref_mut(), rules)?;
                self.is_active = false;
                self.is_finished = true;
                self.winner = winner;
            }
            MatchCommand::Unfinish => {
                next_changed = self.retract_advancement(next.as_deref_mut(), rules)?;
                self.is_finished = false;
                self.winner = None;
            }
            MatchCommand::AdvanceBye => {
                if self.is_finished {
                    return Err(CommandError::AlreadyFinished(self.id));
                }
                let present = match (self.competitor_a, self.competitor_b) {
                    (Some(competitor), None) | (None, Some(competitor)) => competitor,
                    _ => return Err(CommandError::NotABye(self.id)),
                };
                next_changed =
                    self.propagate_result(None, Some(present), next.as_deref_mut(), rules)?;
                self.is_active = false;
                self.is_finished = true;
                self.winner = Some(present);
            }
        }

        let changed = *self != before;
        if changed {
            self.updated_at = now;
        }
        if next_changed {
            if let Some(next) = next {
                next.updated_at = now;
            }
        }

        Ok(CommandOutcome {
            changed,
            next_changed,
        })
    }

    /// Write `winner` into the next match. When the outcome became a tie, a previously
    /// advanced winner is withdrawn from the next match. The slot is left alone once the
    /// next match progressed.
    fn propagate_result(
        &self,
        previous_winner: Option<Uuid>,
        winner: Option<Uuid>,
        next: Option<&mut Match>,
        rules: &MatchRules,
    ) -> Result<bool, CommandError> {
        let Some(link) = self.next else {
            return Ok(false);
        };

        let stale_advance = winner.is_none() && previous_winner.is_some();
        if winner.is_none() && !stale_advance {
            return Ok(false);
        }

        let next = next
            .filter(|candidate| candidate.id == link.match_id)
            .ok_or(CommandError::NextMatchMissing(link.match_id))?;

        let current = next.competitor(link.slot);
        let target = match winner {
            Some(winner) => Some(winner),
            None if current == previous_winner => None,
            None => return Ok(false),
        };

        if current == target {
            return Ok(false);
        }

        if next.has_progressed(rules) {
            return Err(CommandError::DownstreamProgressed(next.id));
        }

        next.set_competitor(link.slot, target);
        Ok(true)
    }

    /// Clear the slot this match filled in the next match, unless the next match
    /// already progressed.
    fn retract_advancement(
        &self,
        next: Option<&mut Match>,
        rules: &MatchRules,
    ) -> Result<bool, CommandError> {
        let (Some(winner), Some(link)) = (self.winner, self.next) else {
            return Ok(false);
        };

        let next = next
            .filter(|candidate| candidate.id == link.match_id)
            .ok_or(CommandError::NextMatchMissing(link.match_id))?;

        if next.competitor(link.slot) != Some(winner) {
            return Ok(false);
        }

        if next.has_progressed(rules) {
            return Err(CommandError::DownstreamProgressed(next.id));
        }

        next.set_competitor(link.slot, None);
        Ok(true)
    }
}

fn saturating_offset(value: u32, delta: i64) -> u32 {
    let shifted = i64::from(value).saturating_add(delta);
    shifted.clamp(0, i64::from(u32::MAX)) as u32
}

impl From<SlotEntity> for Slot {
    fn from(value: SlotEntity) -> Self {
        match value {
            SlotEntity::A => Slot::A,
            SlotEntity::B => Slot::B,
        }
    }
}

impl From<Slot> for SlotEntity {
    fn from(value: Slot) -> Self {
        match value {
            Slot::A => SlotEntity::A,
            Slot::B => SlotEntity::B,
        }
    }
}

impl From<MatchEntity> for Match {
    fn from(value: MatchEntity) -> Self {
        let next = value
            .next_match_id
            .zip(value.position_in_next_match)
            .map(|(match_id, slot)| Advancement {
                match_id,
                slot: slot.into(),
            });

        Self {
            id: value.id,
            bracket_id: value.bracket_id,
            competitor_a: value.competitor_a,
            competitor_b: value.competitor_b,
            score_a: value.score_a,
            score_b: value.score_b,
            penalties_a: value.penalties_a,
            penalties_b: value.penalties_b,
            time_remaining: value.time_remaining,
            is_active: value.is_active,
            is_finished: value.is_finished,
            winner: value.winner,
            category: value.category,
            round: value.round,
            level: value.level,
            next,
            referee_id: value.referee_id,
            show_in_dashboard: value.show_in_dashboard,
            started_at: value.started_at,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

impl From<Match> for MatchEntity {
    fn from(value: Match) -> Self {
        Self {
            id: value.id,
            bracket_id: value.bracket_id,
            competitor_a: value.competitor_a,
            competitor_b: value.competitor_b,
            score_a: value.score_a,
            score_b: value.score_b,
            penalties_a: value.penalties_a,
            penalties_b: value.penalties_b,
            time_remaining: value.time_remaining,
            is_active: value.is_active,
            is_finished: value.is_finished,
            winner: value.winner,
            category: value.category,
            round: value.round,
            level: value.level,
            next_match_id: value.next.map(|link| link.match_id),
            position_in_next_match: value.next.map(|link| link.slot.into()),
            referee_id: value.referee_id,
            show_in_dashboard: value.show_in_dashboard,
            started_at: value.started_at,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

impl From<CompetitorEntity> for Competitor {
    fn from(value: CompetitorEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
            institution_name: value.institution_name,
        }
    }
}

impl From<Competitor> for CompetitorEntity {
    fn from(value: Competitor) -> Self {
        Self {
            id: value.id,
            name: value.name,
            institution_name: value.institution_name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> MatchRules {
        MatchRules {
            match_duration_secs: 180,
            add_time_secs: 30,
            default_penalty: "Warning".into(),
        }
    }

    fn sample_match() -> Match {
        let mut m = Match::new(
            "sumo".into(),
            "SEMIS".into(),
            "university".into(),
            Some("ref-1".into()),
            &rules(),
            SystemTime::UNIX_EPOCH,
        );
        m.competitor_a = Some(Uuid::new_v4());
        m.competitor_b = Some(Uuid::new_v4());
        m
    }

    fn linked_pair(slot: Slot) -> (Match, Match) {
        let parent = Match::new(
            "sumo".into(),
            "FINAL".into(),
            "university".into(),
            None,
            &rules(),
            SystemTime::UNIX_EPOCH,
        );
        let mut child = sample_match();
        child.next = Some(Advancement {
            match_id: parent.id,
            slot,
        });
        (child, parent)
    }

    fn apply(m: &mut Match, command: MatchCommand) -> CommandOutcome {
        m.apply(&command, None, &rules(), SystemTime::now()).unwrap()
    }

    #[test]
    fn finish_picks_strictly_higher_score() {
        let mut m = sample_match();
        m.score_a = 2;
        m.score_b = 1;
        apply(&mut m, MatchCommand::Finish);
        assert_eq!(m.winner, m.competitor_a);
        assert!(m.is_finished);
        assert!(!m.is_active);

        let mut m = sample_match();
        m.score_b = 4;
        apply(&mut m, MatchCommand::Finish);
        assert_eq!(m.winner, m.competitor_b);
    }

    #[test]
    fn finish_on_tie_leaves_winner_unset() {
        let mut m = sample_match();
        m.score_a = 3;
        m.score_b = 3;
        apply(&mut m, MatchCommand::Finish);
        assert!(m.is_finished);
        assert_eq!(m.winner, None);
    }

    #[test]
    fn finish_advances_winner_into_next_match_slot() {
        for slot in [Slot::A, Slot::B] {
            let (mut child, mut parent) = linked_pair(slot);
            child.score_a = 3;

            let outcome = child
                .apply(
                    &MatchCommand::Finish,
                    Some(&mut parent),
                    &rules(),
                    SystemTime::now(),
                )
                .unwrap();

            assert!(outcome.next_changed);
            assert_eq!(parent.competitor(slot), child.competitor_a);
        }
    }

    #[test]
    fn finish_without_next_match_record_is_rejected() {
        let (mut child, parent) = linked_pair(Slot::A);
        child.score_a = 1;
        let snapshot = child.clone();

        let err = child
            .apply(&MatchCommand::Finish, None, &rules(), SystemTime::now())
            .unwrap_err();

        assert_eq!(err, CommandError::NextMatchMissing(parent.id));
        assert_eq!(child, snapshot);
    }

    #[test]
    fn refinish_as_tie_withdraws_previous_advance() {
        let (mut child, mut parent) = linked_pair(Slot::B);
        child.score_a = 1;
        child
            .apply(&MatchCommand::Finish, Some(&mut parent), &rules(), SystemTime::now())
            .unwrap();
        assert_eq!(parent.competitor_b, child.competitor_a);

        child.score_b = 1;
        child
            .apply(&MatchCommand::Finish, Some(&mut parent), &rules(), SystemTime::now())
            .unwrap();
        assert_eq!(child.winner, None);
        assert_eq!(parent.competitor_b, None);
    }

    #[test]
    fn pause_on_paused_match_changes_nothing() {
        let mut m = sample_match();
        let before = m.clone();
        let outcome = apply(&mut m, MatchCommand::Pause);
        assert!(!outcome.changed);
        assert_eq!(m, before);
    }

    #[test]
    fn reset_is_idempotent_and_keeps_outcome() {
        let mut m = sample_match();
        m.score_a = 5;
        m.penalties_b.push("falta".into());
        m.time_remaining = 12;
        m.is_finished = true;
        m.winner = m.competitor_a;

        apply(&mut m, MatchCommand::Reset);
        let first = m.clone();
        let outcome = apply(&mut m, MatchCommand::Reset);

        assert!(!outcome.changed);
        assert_eq!(m, first);
        assert_eq!(m.score_a, 0);
        assert!(m.penalties_b.is_empty());
        assert_eq!(m.time_remaining, 180);
        assert!(m.is_finished);
        assert_eq!(m.winner, m.competitor_a);
    }

    #[test]
    fn penalties_keep_chronological_order() {
        let mut m = sample_match();
        for reason in ["falta1", "falta2", "falta3"] {
            apply(
                &mut m,
                MatchCommand::AddPenalty {
                    slot: Slot::A,
                    reason: reason.into(),
                },
            );
        }
        assert_eq!(m.penalties_a, vec!["falta1", "falta2", "falta3"]);
        assert!(m.penalties_b.is_empty());
    }

    #[test]
    fn score_and_time_offsets_floor_at_zero() {
        let mut m = sample_match();
        apply(
            &mut m,
            MatchCommand::AddScore {
                slot: Slot::B,
                amount: -4,
            },
        );
        assert_eq!(m.score_b, 0);

        apply(&mut m, MatchCommand::AddTime { seconds: 45 });
        assert_eq!(m.time_remaining, 225);
        apply(&mut m, MatchCommand::AddTime { seconds: -1000 });
        assert_eq!(m.time_remaining, 0);
    }

    #[test]
    fn start_is_rejected_on_finished_match() {
        let mut m = sample_match();
        m.is_finished = true;
        let err = m
            .apply(&MatchCommand::Start, None, &rules(), SystemTime::now())
            .unwrap_err();
        assert_eq!(err, CommandError::AlreadyFinished(m.id));
        assert!(!m.is_active);
    }

    #[test]
    fn tick_decrements_then_stops_at_zero() {
        let mut m = sample_match();
        m.is_active = true;
        m.time_remaining = 1;

        assert!(m.tick(SystemTime::now()));
        assert_eq!(m.time_remaining, 0);
        assert!(m.is_active);

        assert!(m.tick(SystemTime::now()));
        assert_eq!(m.time_remaining, 0);
        assert!(!m.is_active);
        assert!(!m.is_finished);

        assert!(!m.tick(SystemTime::now()));
    }

    #[test]
    fn unfinish_retracts_untouched_advancement() {
        let (mut child, mut parent) = linked_pair(Slot::A);
        child.score_a = 2;
        child
            .apply(&MatchCommand::Finish, Some(&mut parent), &rules(), SystemTime::now())
            .unwrap();

        let outcome = child
            .apply(&MatchCommand::Unfinish, Some(&mut parent), &rules(), SystemTime::now())
            .unwrap();

        assert!(outcome.next_changed);
        assert!(!child.is_finished);
        assert_eq!(child.winner, None);
        assert_eq!(parent.competitor_a, None);
    }

    #[test]
    fn unfinish_refused_once_next_match_progressed() {
        let (mut child, mut parent) = linked_pair(Slot::A);
        child.score_a = 2;
        child
            .apply(&MatchCommand::Finish, Some(&mut parent), &rules(), SystemTime::now())
            .unwrap();
        parent.score_b = 1;
        let child_before = child.clone();

        let err = child
            .apply(&MatchCommand::Unfinish, Some(&mut parent), &rules(), SystemTime::now())
            .unwrap_err();

        assert_eq!(err, CommandError::DownstreamProgressed(parent.id));
        assert_eq!(child, child_before);
        assert_eq!(parent.competitor_a, child.competitor_a);
    }

    #[test]
    fn refinish_refused_once_next_match_finished() {
        let (mut child, mut parent) = linked_pair(Slot::A);
        child.score_a = 3;
        child
            .apply(&MatchCommand::Finish, Some(&mut parent), &rules(), SystemTime::now())
            .unwrap();
        parent.competitor_b = Some(Uuid::new_v4());
        parent.score_a = 1;
        parent
            .apply(&MatchCommand::Finish, None, &rules(), SystemTime::now())
            .unwrap();
        assert_eq!(parent.winner, child.competitor_a);

        child.score_b = 5;
        let child_before = child.clone();
        let parent_before = parent.clone();
        let err = child
            .apply(&MatchCommand::Finish, Some(&mut parent), &rules(), SystemTime::now())
            .unwrap_err();

        assert_eq!(err, CommandError::DownstreamProgressed(parent.id));
        assert_eq!(child, child_before);
        assert_eq!(parent, parent_before);
        assert_eq!(parent.check_invariants(), Ok(()));
    }

    #[test]
    fn refinish_as_tie_keeps_advance_once_next_match_started() {
        let (mut child, mut parent) = linked_pair(Slot::B);
        child.score_a = 1;
        child
            .apply(&MatchCommand::Finish, Some(&mut parent), &rules(), SystemTime::now())
            .unwrap();
        parent.is_active = true;

        child.score_b = 1;
        let child_before = child.clone();
        let err = child
            .apply(&MatchCommand::Finish, Some(&mut parent), &rules(), SystemTime::now())
            .unwrap_err();

        assert_eq!(err, CommandError::DownstreamProgressed(parent.id));
        assert_eq!(child, child_before);
        assert_eq!(parent.competitor_b, child.competitor_a);
    }

    #[test]
    fn refinish_with_same_winner_ignores_progressed_next_match() {
        let (mut child, mut parent) = linked_pair(Slot::A);
        child.score_a = 2;
        child
            .apply(&MatchCommand::Finish, Some(&mut parent), &rules(), SystemTime::now())
            .unwrap();
        parent.score_a = 4;

        child.score_a = 3;
        let outcome = child
            .apply(&MatchCommand::Finish, Some(&mut parent), &rules(), SystemTime::now())
            .unwrap();

        assert!(!outcome.next_changed);
        assert_eq!(child.winner, child.competitor_a);
        assert_eq!(parent.competitor_a, child.competitor_a);
    }

    #[test]
    fn advance_bye_promotes_lone_competitor() {
        let (mut child, mut parent) = linked_pair(Slot::B);
        child.competitor_a = None;

        child
            .apply(&MatchCommand::AdvanceBye, Some(&mut parent), &rules(), SystemTime::now())
            .unwrap();

        assert!(child.is_finished);
        assert_eq!(child.winner, child.competitor_b);
        assert_eq!(parent.competitor_b, child.competitor_b);
    }

    #[test]
    fn advance_bye_requires_exactly_one_competitor() {
        let mut full = sample_match();
        assert_eq!(
            full.apply(&MatchCommand::AdvanceBye, None, &rules(), SystemTime::now()),
            Err(CommandError::NotABye(full.id))
        );

        let mut empty = sample_match();
        empty.competitor_a = None;
        empty.competitor_b = None;
        assert_eq!(
            empty.apply(&MatchCommand::AdvanceBye, None, &rules(), SystemTime::now()),
            Err(CommandError::NotABye(empty.id))
        );
    }

    #[test]
    fn invariants_catch_foreign_winner() {
        let mut m = sample_match();
        m.winner = Some(Uuid::new_v4());
        assert_eq!(
            m.check_invariants(),
            Err(InvariantViolation::WinnerNotCompetitor)
        );
    }

    #[test]
    fn entity_round_trip_keeps_bracket_link() {
        let (child, parent) = linked_pair(Slot::B);
        let entity: MatchEntity = child.clone().into();
        assert_eq!(entity.next_match_id, Some(parent.id));
        assert_eq!(entity.position_in_next_match, Some(SlotEntity::B));
        assert_eq!(Match::from(entity), child);
    }
}
