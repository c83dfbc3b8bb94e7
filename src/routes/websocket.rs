use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    response::Response,
    routing::get,
};
use tracing::debug;

use crate::{services::websocket_service, state::SharedState};

/// Push channel for scoring clients.
pub fn router() -> Router<SharedState> {
    Router::new().route("/ws", get(push_channel))
}

/// Upgrade to the push channel. The first frame carries the session code for this peer.
#[utoipa::path(
    get,
    path = "/ws",
    tag = "push",
    responses((status = 101, description = "Switching protocols to the push channel"))
)]
pub async fn push_channel(State(state): State<SharedState>, upgrade: WebSocketUpgrade) -> Response {
    debug!("push channel upgrade requested");
    upgrade.on_upgrade(move |socket| websocket_service::handle_socket(state, socket))
}
