/// Bracket generation.
pub mod bracket_service;
/// Snapshot projection and fan-out to viewers.
pub mod broadcast_service;
/// Referee control commands.
pub mod control_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Periodic match clock.
pub mod match_timer;
/// Admin match setup and competitor directory.
pub mod match_service;
/// Server-Sent Events viewer streams.
pub mod sse_service;
/// Storage connection supervision and hydration.
pub mod storage_supervisor;
/// Read-only projections for public endpoints.
pub mod view_service;
/// WebSocket connection and message handling service.
pub mod websocket_service;
