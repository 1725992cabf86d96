use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI document for Bracket Live Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::matches_stream,
        crate::routes::websocket::ws_handler,
        crate::routes::public::list_matches,
        crate::routes::public::get_match,
        crate::routes::public::get_bracket,
        crate::routes::public::get_dashboard,
        crate::routes::admin::create_bracket,
        crate::routes::admin::create_match,
        crate::routes::admin::update_match,
        crate::routes::admin::delete_match,
        crate::routes::admin::upsert_competitors,
        crate::routes::admin::start_timer,
        crate::routes::admin::stop_timer,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::matches::MatchSnapshot,
            crate::dto::matches::CompetitorSnapshot,
            crate::dto::public::BracketNode,
            crate::dto::public::DashboardResponse,
            crate::dto::ws::ClientMessage,
            crate::dto::ws::ControlMatchRequest,
            crate::dto::ws::CommandResult,
            crate::dto::admin::CreateBracketRequest,
            crate::dto::admin::BracketCreatedResponse,
            crate::dto::admin::CreateMatchRequest,
            crate::dto::admin::UpdateMatchRequest,
            crate::dto::admin::AdvancementInput,
            crate::dto::admin::UpsertCompetitorsRequest,
            crate::dto::admin::CompetitorInput,
            crate::dto::admin::ActionResponse,
            crate::dto::admin::TimerStatusResponse,
            crate::state::matches::Slot,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "matches", description = "WebSocket match updates and referee commands"),
        (name = "public", description = "Read-only match, bracket and dashboard views"),
        (name = "admin", description = "Bracket and match administration"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_match_routes() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/public/brackets/{bracket_id}"));
        assert!(doc.paths.paths.contains_key("/admin/matches/{id}"));
        assert!(doc.paths.paths.contains_key("/ws"));
    }
}
