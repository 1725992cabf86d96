use serde::Serialize;
use utoipa::ToSchema;

use crate::dto::matches::MatchSnapshot;

/// Node of a bracket tree: a match and the two matches feeding its slots.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BracketNode {
    /// The match at this node.
    #[serde(rename = "match")]
    pub match_: MatchSnapshot,
    /// Match feeding slot A.
    #[schema(no_recursion)]
    pub feeder_a: Option<Box<BracketNode>>,
    /// Match feeding slot B.
    #[schema(no_recursion)]
    pub feeder_b: Option<Box<BracketNode>>,
}

/// Content of the public dashboard.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardResponse {
    /// Match featured on the main screen.
    pub focus: Option<MatchSnapshot>,
    /// Every running match, least time remaining first.
    pub active: Vec<MatchSnapshot>,
    /// Matches pinned by an admin.
    pub pinned: Vec<MatchSnapshot>,
    /// Whether the backend is refusing writes.
    pub degraded: bool,
}
