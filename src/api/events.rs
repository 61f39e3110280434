use serde::{Deserialize, Serialize};

use crate::api::models::Message;

/// Frames emitted by the client over the push channel. Serialized as
/// `{"event": "...", "data": {...}}` to match the backend's socket protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    Auth { token: String },
    JoinRoom { counterpart_id: String },
    SendMessage { recipient_id: String, content: String },
}

/// Frames received from the push channel. Unrecognized event names are kept
/// as `Unknown` so protocol additions never break the read loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    ReceiveMessage(Message),
    OnlineUsers { users: Vec<String> },
    #[serde(other)]
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn client_events_use_socket_wire_names() {
        let auth = serde_json::to_value(ClientEvent::Auth { token: "t0k".into() })
            .expect("auth should encode");
        assert_eq!(auth["event"], "auth");
        assert_eq!(auth["data"]["token"], "t0k");

        let join = serde_json::to_value(ClientEvent::JoinRoom { counterpart_id: "9".into() })
            .expect("join should encode");
        assert_eq!(join["event"], "join_room");

        let send = serde_json::to_value(ClientEvent::SendMessage {
            recipient_id: "9".into(),
            content: "hi".into(),
        })
        .expect("send should encode");
        assert_eq!(send["event"], "send_message");
        assert_eq!(send["data"]["recipient_id"], "9");
        assert_eq!(send["data"]["content"], "hi");
    }

    #[test]
    fn receive_message_round_trips() {
        let event = ServerEvent::ReceiveMessage(Message {
            id: "31".into(),
            sender_id: "9".into(),
            recipient_id: "4".into(),
            body: "hello".into(),
            created_at: Utc::now(),
            read: false,
        });
        let text = serde_json::to_string(&event).expect("event should encode");
        assert!(text.contains("\"event\":\"receive_message\""));
        assert!(text.contains("\"content\":\"hello\""));
        let back: ServerEvent = serde_json::from_str(&text).expect("event should decode");
        assert_eq!(back, event);
    }

    #[test]
    fn unknown_event_names_do_not_fail() {
        let event: ServerEvent =
            serde_json::from_str(r#"{"event":"typing_started","data":{"user":"9"}}"#)
                .expect("unknown event should decode");
        assert_eq!(event, ServerEvent::Unknown);
    }
}
