use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the volley stats backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::session::active_match,
        crate::routes::session::report_activity,
        crate::routes::session::next_set,
        crate::routes::session::reset,
        crate::routes::matches::create_match,
        crate::routes::matches::get_match,
        crate::routes::matches::update_match,
        crate::routes::matches::delete_match,
        crate::routes::matches::history,
        crate::routes::matches::summary,
        crate::routes::matches::lineup,
        crate::routes::matches::append_lineup,
        crate::routes::matches::remove_lineup,
        crate::routes::matches::grade_stats,
        crate::routes::matches::increment_grade,
        crate::routes::matches::reason_stats,
        crate::routes::matches::increment_reason,
        crate::routes::matches::player_reason_stats,
        crate::routes::matches::increment_player_reason,
        crate::routes::matches::rotation_stats,
        crate::routes::matches::upsert_rotation,
        crate::routes::roster::list_players,
        crate::routes::roster::create_player,
        crate::routes::roster::rename_player,
        crate::routes::roster::delete_player,
        crate::routes::websocket::push_channel,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::session::ActiveSessionResponse,
            crate::dto::session::AckResponse,
            crate::dto::session::NextSetRequest,
            crate::dto::session::NextSetResponse,
            crate::dto::matches::MatchRecord,
            crate::state::rotation::RotationPosition,
            crate::dto::matches::CreateMatchRequest,
            crate::dto::matches::CreateMatchResponse,
            crate::dto::matches::UpdateMatchRequest,
            crate::dto::matches::MatchSummaryResponse,
            crate::dto::matches::LineupRecord,
            crate::dto::matches::AppendLineupRequest,
            crate::dto::matches::GradeTallyRecord,
            crate::dto::matches::GradeIncrementRequest,
            crate::dto::matches::ReasonTallyRecord,
            crate::dto::matches::ReasonIncrementRequest,
            crate::dto::matches::PlayerReasonTallyRecord,
            crate::dto::matches::PlayerReasonIncrementRequest,
            crate::dto::matches::RotationTallyRecord,
            crate::dto::matches::RotationUpsertRequest,
            crate::dto::roster::PlayerRecord,
            crate::dto::roster::CreatePlayerRequest,
            crate::dto::roster::RenamePlayerRequest,
            crate::dto::ws::PushInbound,
            crate::dto::ws::PushOutbound,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "session", description = "Shared session coordinator"),
        (name = "matches", description = "Match records and history"),
        (name = "lineups", description = "Players registered per match"),
        (name = "tallies", description = "Grade, reason and rotation counters"),
        (name = "roster", description = "Own-team roster"),
        (name = "push", description = "WebSocket push channel"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_coordinator_paths() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/active-match"));
        assert!(doc.paths.paths.contains_key("/api/match-lineups/{id}/{entry}"));
    }
}
