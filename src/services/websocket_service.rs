use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    dao::models::MatchEntity,
    dto::ws::{PushInbound, PushOutbound},
    services::session_service::ensure_backing_record,
    state::{SharedState, hub::PeerConnection},
};

/// Handle the full lifecycle of one scoring client on the push channel.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Writer task drains the peer queue independently of inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let peer = state.hub().join(outbound_tx.clone());
    info!(peer = %peer.id, session_id = %peer.session_id, "push peer connected");

    let mut record = MatchEntity::empty(peer.session_id.clone());
    record.point_cap = state.config().default_point_cap.value();
    if let Err(err) = ensure_backing_record(&state, record).await {
        warn!(session_id = %peer.session_id, error = %err, "push session has no backing record");
    }

    let welcome = PushOutbound::Session {
        session_id: peer.session_id.clone(),
    };
    if !send_message(&peer.tx, &welcome) {
        disconnect(&state, &peer);
        finalize(writer_task, outbound_tx).await;
        return;
    }

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => match serde_json::from_str::<PushInbound>(&text) {
                Ok(inbound) => {
                    relay(&state, &peer, inbound);
                }
                Err(err) => {
                    warn!(peer = %peer.id, error = %err, "failed to parse push message");
                }
            },
            Ok(Message::Ping(payload)) => {
                state.hub().coordinator().touch();
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) | Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(peer = %peer.id, error = %err, "websocket error");
                break;
            }
        }
    }

    disconnect(&state, &peer);
    finalize(writer_task, outbound_tx).await;
}

/// Apply one inbound message from `from`. Returns how many other peers were notified.
pub fn relay(state: &SharedState, from: &PeerConnection, inbound: PushInbound) -> usize {
    let hub = state.hub();
    hub.coordinator().touch();
    let outbound = match inbound {
        PushInbound::PointScored {
            our_score,
            opponent_score,
        } => PushOutbound::PointScored {
            session_id: from.session_id.clone(),
            our_score,
            opponent_score,
        },
        PushInbound::SessionEnded { result } => {
            info!(session_id = %from.session_id, result = ?result, "push session ended");
            PushOutbound::SessionEnded {
                session_id: from.session_id.clone(),
                result,
            }
        }
        PushInbound::Ping => return 0,
        PushInbound::Unknown => {
            debug!(peer = %from.id, "ignoring unknown push message");
            return 0;
        }
    };

    hub.senders(Some(from.id))
        .into_iter()
        .filter(|(_, tx)| send_message(tx, &outbound))
        .count()
}

fn disconnect(state: &SharedState, peer: &PeerConnection) {
    if state.hub().leave(peer.id) {
        info!(session_id = %peer.session_id, "last push peer left; session cleared");
    } else {
        info!(peer = %peer.id, "push peer disconnected");
    }
}

/// Serialize and queue a message. `false` when the peer's writer is gone.
fn send_message(tx: &mpsc::UnboundedSender<Message>, message: &PushOutbound) -> bool {
    match serde_json::to_string(message) {
        Ok(text) => tx.send(Message::Text(text.into())).is_ok(),
        Err(err) => {
            warn!(error = %err, "failed to serialize push message");
            false
        }
    }
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::AppConfig, state::AppState};

    fn received(rx: &mut mpsc::UnboundedReceiver<Message>) -> Option<PushOutbound> {
        match rx.try_recv().ok()? {
            Message::Text(text) => serde_json::from_str(text.as_str()).ok(),
            _ => None,
        }
    }

    #[test]
    fn points_are_relayed_to_other_peers_only() {
        let state = AppState::new(AppConfig::default());
        let (first_tx, mut first_rx) = mpsc::unbounded_channel();
        let (second_tx, mut second_rx) = mpsc::unbounded_channel();
        let first = state.hub().join(first_tx);
        let second = state.hub().join(second_tx);

        let notified = relay(
            &state,
            &first,
            PushInbound::PointScored {
                our_score: 4,
                opponent_score: 2,
            },
        );
        assert_eq!(notified, 1);
        assert!(received(&mut first_rx).is_none());
        assert_eq!(
            received(&mut second_rx),
            Some(PushOutbound::PointScored {
                session_id: second.session_id.clone(),
                our_score: 4,
                opponent_score: 2,
            })
        );
        assert_eq!(relay(&state, &second, PushInbound::Ping), 0);
    }

    #[test]
    fn last_peer_leaving_clears_the_session() {
        let state = AppState::new(AppConfig::default());
        let first = state.hub().join(mpsc::unbounded_channel().0);
        disconnect(&state, &first);
        assert_eq!(state.hub().coordinator().active(), None);

        let next = state.hub().join(mpsc::unbounded_channel().0);
        assert_ne!(next.session_id, first.session_id);
    }
}
