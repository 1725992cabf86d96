use axum::{
    Json, Router,
    body::Body,
    extract::{Path, State},
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{post, put},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::{
        admin::{
            ActionResponse, BracketCreatedResponse, CreateBracketRequest, CreateMatchRequest,
            TimerStatusResponse, UpdateMatchRequest, UpsertCompetitorsRequest,
        },
        matches::MatchSnapshot,
    },
    error::AppError,
    services::{bracket_service, match_service, match_timer},
    state::{SharedState, access::Role},
};

const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Admin-only endpoints for setting up brackets and matches and driving the timer.
pub fn router(state: SharedState) -> Router<SharedState> {
    Router::new()
        .route("/admin/brackets", post(create_bracket))
        .route("/admin/matches", post(create_match))
        .route(
            "/admin/matches/{id}",
            put(update_match).delete(delete_match),
        )
        .route("/admin/competitors", put(upsert_competitors))
        .route("/admin/timer/start", post(start_timer))
        .route("/admin/timer/stop", post(stop_timer))
        .route_layer(middleware::from_fn_with_state(state, require_admin_token))
}

/// Generate a single-elimination bracket from a competitor list.
#[utoipa::path(
    post,
    path = "/admin/brackets",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Configured admin token")),
    request_body = CreateBracketRequest,
    responses(
        (status = 201, description = "Bracket generated", body = BracketCreatedResponse),
        (status = 400, description = "Invalid competitor list"),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn create_bracket(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateBracketRequest>>,
) -> Result<(StatusCode, Json<BracketCreatedResponse>), AppError> {
    let created = bracket_service::create_bracket(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Create a standalone match.
#[utoipa::path(
    post,
    path = "/admin/matches",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Configured admin token")),
    request_body = CreateMatchRequest,
    responses(
        (status = 201, description = "Match created", body = MatchSnapshot),
        (status = 400, description = "Invalid match setup"),
        (status = 409, description = "Advancement slot already taken")
    )
)]
pub async fn create_match(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateMatchRequest>>,
) -> Result<(StatusCode, Json<MatchSnapshot>), AppError> {
    let created = match_service::create_match(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Change the setup of a match.
#[utoipa::path(
    put,
    path = "/admin/matches/{id}",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Configured admin token"),
    ("id" = String, Path, description = "Identifier of the match to update")),
    request_body = UpdateMatchRequest,
    responses(
        (status = 200, description = "Match updated", body = MatchSnapshot),
        (status = 404, description = "Unknown match"),
        (status = 409, description = "Update conflicts with the match outcome")
    )
)]
pub async fn update_match(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<UpdateMatchRequest>>,
) -> Result<Json<MatchSnapshot>, AppError> {
    Ok(Json(match_service::update_match(&state, id, payload).await?))
}

/// Delete a match that no other match feeds into.
#[utoipa::path(
    delete,
    path = "/admin/matches/{id}",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Configured admin token"),
    ("id" = String, Path, description = "Identifier of the match to delete")),
    responses(
        (status = 204, description = "Match deleted"),
        (status = 404, description = "Unknown match"),
        (status = 409, description = "Match still receives winners")
    )
)]
pub async fn delete_match(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    match_service::delete_match(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Insert or replace competitor directory entries.
#[utoipa::path(
    put,
    path = "/admin/competitors",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Configured admin token")),
    request_body = UpsertCompetitorsRequest,
    responses((status = 200, description = "Directory updated", body = ActionResponse))
)]
pub async fn upsert_competitors(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<UpsertCompetitorsRequest>>,
) -> Result<Json<ActionResponse>, AppError> {
    let count = match_service::upsert_competitors(&state, payload).await?;
    Ok(Json(ActionResponse {
        message: format!("{count} competitor(s) stored"),
    }))
}

/// Start the match clock loop.
#[utoipa::path(
    post,
    path = "/admin/timer/start",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Configured admin token")),
    responses((status = 200, description = "Timer running", body = TimerStatusResponse))
)]
pub async fn start_timer(State(state): State<SharedState>) -> Json<TimerStatusResponse> {
    match_timer::start(&state).await;
    Json(TimerStatusResponse { running: true })
}

/// Stop the match clock loop.
#[utoipa::path(
    post,
    path = "/admin/timer/stop",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Configured admin token")),
    responses((status = 200, description = "Timer stopped", body = TimerStatusResponse))
)]
pub async fn stop_timer(State(state): State<SharedState>) -> Json<TimerStatusResponse> {
    match_timer::stop(&state).await;
    Json(TimerStatusResponse { running: false })
}

async fn require_admin_token(
    State(state): State<SharedState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let provided = req
        .headers()
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            AppError::Unauthorized("missing admin token header `X-Admin-Token`".into())
        })?;

    let role = state.config().resolve_role(Some(provided));
    match role {
        Role::Admin => Ok(next.run(req).await),
        _ => Err(AppError::Unauthorized("invalid admin token".into())),
    }
}
