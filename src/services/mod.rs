/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Match records, lineups and tallies.
pub mod match_service;
/// Own-team roster management.
pub mod roster_service;
/// Shared session allocation, activity and next set.
pub mod session_service;
/// Storage connection supervision and degraded mode.
pub mod storage_supervisor;
/// WebSocket push channel.
pub mod websocket_service;
