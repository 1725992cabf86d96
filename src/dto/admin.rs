//! DTO definitions used by the admin REST API and documentation layer.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{
        matches::MatchSnapshot,
        validation::{validate_distinct_ids, validate_label},
    },
    state::matches::Slot,
};

/// Request to generate a single-elimination bracket.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateBracketRequest {
    /// Competition category shared by every match.
    #[validate(custom(function = "validate_label"))]
    pub category: String,
    /// Competition level shared by every match.
    #[validate(custom(function = "validate_label"))]
    pub level: String,
    /// Competitors to seed; shuffled before seating.
    #[validate(
        length(min = 2, message = "a bracket needs at least two competitors"),
        custom(function = "validate_distinct_ids")
    )]
    pub competitor_ids: Vec<Uuid>,
    /// Operator assigned to every generated match.
    #[serde(default)]
    pub referee_id: Option<String>,
}

/// Response returned once a bracket was stored.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BracketCreatedResponse {
    /// Identifier grouping the generated matches.
    pub bracket_id: Uuid,
    /// Generated matches, final first.
    pub matches: Vec<MatchSnapshot>,
}

/// Link from a match to the one its winner feeds.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdvancementInput {
    /// Next match id.
    pub next_match_id: Uuid,
    /// Slot of the next match filled by the winner.
    pub position: Slot,
}

/// Request to create a standalone match.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateMatchRequest {
    /// Competitor in slot A.
    #[serde(default)]
    pub competitor_a: Option<Uuid>,
    /// Competitor in slot B.
    #[serde(default)]
    pub competitor_b: Option<Uuid>,
    /// Competition category.
    #[validate(custom(function = "validate_label"))]
    pub category: String,
    /// Round label.
    #[validate(custom(function = "validate_label"))]
    pub round: String,
    /// Competition level.
    #[validate(custom(function = "validate_label"))]
    pub level: String,
    /// Where the winner goes next.
    #[serde(default)]
    pub advancement: Option<AdvancementInput>,
    /// Operator expected to control the match.
    #[serde(default)]
    pub referee_id: Option<String>,
    /// Dashboard pin.
    #[serde(default)]
    pub show_in_dashboard: bool,
}

/// Partial update of a match's setup. Omitted fields keep their value; `null` clears
/// optional ones.
#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMatchRequest {
    /// Competitor in slot A.
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<Uuid>)]
    pub competitor_a: Option<Option<Uuid>>,
    /// Competitor in slot B.
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<Uuid>)]
    pub competitor_b: Option<Option<Uuid>>,
    /// Competition category.
    #[validate(custom(function = "validate_label"))]
    pub category: Option<String>,
    /// Round label.
    #[validate(custom(function = "validate_label"))]
    pub round: Option<String>,
    /// Competition level.
    #[validate(custom(function = "validate_label"))]
    pub level: Option<String>,
    /// Where the winner goes next.
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<AdvancementInput>)]
    pub advancement: Option<Option<AdvancementInput>>,
    /// Operator expected to control the match.
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<String>)]
    pub referee_id: Option<Option<String>>,
    /// Dashboard pin.
    pub show_in_dashboard: Option<bool>,
}

/// Directory entry supplied by the registration side.
#[derive(Debug, Serialize, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CompetitorInput {
    /// Competitor id.
    pub id: Uuid,
    /// Display name.
    #[validate(custom(function = "validate_label"))]
    pub name: String,
    /// Owning institution.
    #[serde(default)]
    pub institution_name: Option<String>,
}

/// Batch upsert of directory entries.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct UpsertCompetitorsRequest {
    /// Entries to insert or replace.
    #[validate(length(min = 1), nested)]
    pub competitors: Vec<CompetitorInput>,
}

/// Generic action acknowledgement used by admin endpoints.
#[derive(Debug, Serialize, ToSchema)]
pub struct ActionResponse {
    /// Human readable outcome.
    pub message: String,
}

/// State of the match timer loop.
#[derive(Debug, Serialize, ToSchema)]
pub struct TimerStatusResponse {
    /// Whether the loop is running after the call.
    pub running: bool,
}
