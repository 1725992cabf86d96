use axum::{
    Router,
    extract::{Query, State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{services::websocket_service, state::SharedState};

/// Optional access token identifying referees and admins.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct WsAuth {
    /// Opaque access token; omitted for read-only viewers.
    pub token: Option<String>,
}

#[utoipa::path(
    get,
    path = "/ws",
    tag = "matches",
    params(WsAuth),
    responses((status = 101, description = "Switching protocols to WebSocket"))
)]
/// Upgrade the HTTP connection into a match WebSocket session.
pub async fn ws_handler(
    State(state): State<SharedState>,
    Query(auth): Query<WsAuth>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let role = state.config().resolve_role(auth.token.as_deref());
    ws.on_upgrade(move |socket| websocket_service::handle_socket(state, socket, role))
}

/// Configure the WebSocket endpoint.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/ws", get(ws_handler))
}
