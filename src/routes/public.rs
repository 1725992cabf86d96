use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};
use uuid::Uuid;

use crate::{
    dto::{
        matches::MatchSnapshot,
        public::{BracketNode, DashboardResponse},
    },
    error::AppError,
    services::view_service,
    state::SharedState,
};

/// Public read-only endpoints exposing matches, brackets and the dashboard.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/public/matches", get(list_matches))
        .route("/public/matches/{id}", get(get_match))
        .route("/public/brackets/{bracket_id}", get(get_bracket))
        .route("/public/dashboard", get(get_dashboard))
}

#[utoipa::path(
    get,
    path = "/public/matches",
    tag = "public",
    responses((status = 200, description = "Every match", body = [MatchSnapshot]))
)]
/// Return every match with competitor names resolved.
pub async fn list_matches(State(state): State<SharedState>) -> Json<Vec<MatchSnapshot>> {
    Json(view_service::list_matches(&state).await)
}

#[utoipa::path(
    get,
    path = "/public/matches/{id}",
    tag = "public",
    params(("id" = String, Path, description = "Match identifier")),
    responses(
        (status = 200, description = "Match", body = MatchSnapshot),
        (status = 404, description = "Unknown match")
    )
)]
/// Return a single match.
pub async fn get_match(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MatchSnapshot>, AppError> {
    Ok(Json(view_service::get_match(&state, id).await?))
}

#[utoipa::path(
    get,
    path = "/public/brackets/{bracket_id}",
    tag = "public",
    params(("bracket_id" = String, Path, description = "Bracket identifier")),
    responses(
        (status = 200, description = "Bracket tree rooted at the final", body = BracketNode),
        (status = 404, description = "Unknown bracket")
    )
)]
/// Return a generated bracket as a tree.
pub async fn get_bracket(
    State(state): State<SharedState>,
    Path(bracket_id): Path<Uuid>,
) -> Result<Json<BracketNode>, AppError> {
    Ok(Json(view_service::bracket_tree(&state, bracket_id).await?))
}

#[utoipa::path(
    get,
    path = "/public/dashboard",
    tag = "public",
    responses((status = 200, description = "Dashboard content", body = DashboardResponse))
)]
/// Return the featured match, running matches and pinned matches.
pub async fn get_dashboard(State(state): State<SharedState>) -> Json<DashboardResponse> {
    Json(view_service::dashboard(&state).await)
}
