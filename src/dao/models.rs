use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

/// Competitor slot as persisted by the storage layer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SlotEntity {
    /// First slot of the next match.
    A,
    /// Second slot of the next match.
    B,
}

/// Representation of a match stored in persistence and shared across layers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchEntity {
    /// Primary key of the match.
    pub id: Uuid,
    /// Generated bracket this match belongs to, if any.
    pub bracket_id: Option<Uuid>,
    /// Competitor filling slot A, unset while the bracket slot is pending.
    pub competitor_a: Option<Uuid>,
    /// Competitor filling slot B, unset while the bracket slot is pending.
    pub competitor_b: Option<Uuid>,
    /// Points scored by competitor A.
    pub score_a: u32,
    /// Points scored by competitor B.
    pub score_b: u32,
    /// Penalty reasons given to competitor A, oldest first.
    pub penalties_a: Vec<String>,
    /// Penalty reasons given to competitor B, oldest first.
    pub penalties_b: Vec<String>,
    /// Seconds left on the match clock.
    pub time_remaining: u32,
    /// Whether the match clock is running.
    pub is_active: bool,
    /// Whether an outcome was declared.
    pub is_finished: bool,
    /// Winning competitor, if decided.
    pub winner: Option<Uuid>,
    /// Competition category (e.g. "sumo").
    pub category: String,
    /// Round label such as FINAL or SEMIS.
    pub round: String,
    /// Competition level (e.g. "university").
    pub level: String,
    /// Match receiving this match's winner.
    pub next_match_id: Option<Uuid>,
    /// Slot of the next match receiving this match's winner.
    pub position_in_next_match: Option<SlotEntity>,
    /// Operator expected to control the match.
    pub referee_id: Option<String>,
    /// Whether an admin pinned the match on the public dashboard.
    pub show_in_dashboard: bool,
    /// Last time the clock was started.
    pub started_at: Option<SystemTime>,
    /// Creation timestamp for auditing/debugging.
    pub created_at: SystemTime,
    /// Last time the match was updated.
    pub updated_at: SystemTime,
}

/// Competitor directory entry (robot and owning institution).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompetitorEntity {
    /// Stable identifier for the competitor.
    pub id: Uuid,
    /// Display name of the competitor.
    pub name: String,
    /// Display name of the owning institution.
    pub institution_name: Option<String>,
}
