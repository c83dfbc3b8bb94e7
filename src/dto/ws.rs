use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Deserialize, Serialize, ToSchema)]
/// Messages accepted from scoring clients over the push channel.
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PushInbound {
    /// A client recorded a rally; relayed to every other peer.
    PointScored {
        our_score: u32,
        opponent_score: u32,
    },
    /// A client saw the set end; relayed to every other peer.
    SessionEnded {
        #[serde(default)]
        result: Option<String>,
    },
    /// Keep-alive without payload.
    Ping,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, PartialEq, Eq)]
/// Messages the server pushes to connected scoring clients.
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PushOutbound {
    /// Sent once after connecting: the code this peer works on.
    Session { session_id: String },
    PointScored {
        session_id: String,
        our_score: u32,
        opponent_score: u32,
    },
    SessionEnded {
        session_id: String,
        result: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbound_messages_are_tagged() {
        let message: PushInbound =
            serde_json::from_str(r#"{"type":"point_scored","our_score":3,"opponent_score":1}"#)
                .unwrap();
        assert!(matches!(
            message,
            PushInbound::PointScored {
                our_score: 3,
                opponent_score: 1
            }
        ));
        let message: PushInbound = serde_json::from_str(r#"{"type":"dance"}"#).unwrap();
        assert!(matches!(message, PushInbound::Unknown));
    }

    #[test]
    fn outbound_session_message_shape() {
        let text = serde_json::to_string(&PushOutbound::Session {
            session_id: "AB12CD".into(),
        })
        .unwrap();
        assert_eq!(text, r#"{"type":"session","session_id":"AB12CD"}"#);
    }
}
