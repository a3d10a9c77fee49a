//! Wire events for the real-time transport.
//!
//! Every frame is a JSON text message `{"event": "<name>", "data": {...}}`.
//! Inbound frames decode once into `ClientEvent`; handlers emit `ServerEvent`.

use serde::{Deserialize, Serialize};

use crate::db::models::{MessageRecord, MessageType, NotificationRecord, UserSummary};

// --- Client -> server ---

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    JoinChat(ChatTarget),
    SendMessage(SendMessage),
    TypingStart(ChatTarget),
    TypingStop(ChatTarget),
    JoinLiveRoom(LiveRoomRef),
    LeaveLiveRoom(LiveRoomRef),
    LiveComment(LiveComment),
    SendLiveGift(SendLiveGift),
    CallUser(CallUser),
    CallResponse(CallResponse),
    CallEnded(CallEnded),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatTarget {
    pub receiver_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessage {
    pub receiver_id: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub message_type: MessageType,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub video: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveRoomRef {
    pub room_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveComment {
    pub room_id: String,
    pub comment: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendLiveGift {
    pub room_id: String,
    pub receiver_id: String,
    pub gift_type: String,
    pub gift_name: String,
    pub price: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallUser {
    pub receiver_id: String,
    #[serde(rename = "type")]
    pub call_type: String,
    #[serde(default)]
    pub agora_token: Option<String>,
    pub channel_name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallResponse {
    pub caller_id: String,
    pub accepted: bool,
    #[serde(default)]
    pub agora_token: Option<String>,
    #[serde(default)]
    pub channel_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallEnded {
    pub other_user_id: String,
}

// --- Server -> client ---

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    UserOnline(UserWithProfile),
    UserOffline(UserRef),
    JoinedChat(JoinedChat),
    NewMessage(MessageRecord),
    UserTyping(UserWithProfile),
    UserStoppedTyping(UserRef),
    ViewerJoined(UserWithProfile),
    ViewerLeft(UserRef),
    NewLiveComment(LiveCommentEvent),
    LiveGiftSent(LiveGiftEvent),
    IncomingCall(IncomingCall),
    CallResponse(CallResponseEvent),
    CallEnded(UserRef),
    Error(ErrorEvent),
    Notification(NotificationRecord),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRef {
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserWithProfile {
    pub user_id: String,
    pub user: UserSummary,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinedChat {
    pub chat_room_id: String,
    pub receiver_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveCommentEvent {
    pub user_id: String,
    pub user: UserSummary,
    pub comment: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveGiftEvent {
    pub sender: UserSummary,
    pub receiver_id: String,
    pub gift_type: String,
    pub gift_name: String,
    pub price: i64,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingCall {
    pub caller_id: String,
    pub caller: UserSummary,
    #[serde(rename = "type")]
    pub call_type: String,
    pub agora_token: Option<String>,
    pub channel_name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallResponseEvent {
    pub receiver_id: String,
    pub receiver: UserSummary,
    pub accepted: bool,
    pub agora_token: Option<String>,
    pub channel_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorEvent {
    pub message: String,
}

impl ServerEvent {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(ErrorEvent {
            message: message.into(),
        })
    }

    pub fn user_online(user: &UserSummary) -> Self {
        Self::UserOnline(UserWithProfile {
            user_id: user.id.clone(),
            user: user.clone(),
        })
    }

    pub fn user_offline(user_id: &str) -> Self {
        Self::UserOffline(UserRef {
            user_id: user_id.to_string(),
        })
    }

    pub fn viewer_joined(user: &UserSummary) -> Self {
        Self::ViewerJoined(UserWithProfile {
            user_id: user.id.clone(),
            user: user.clone(),
        })
    }

    pub fn viewer_left(user_id: &str) -> Self {
        Self::ViewerLeft(UserRef {
            user_id: user_id.to_string(),
        })
    }

    /// Event name as it appears on the wire, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::UserOnline(_) => "user_online",
            Self::UserOffline(_) => "user_offline",
            Self::JoinedChat(_) => "joined_chat",
            Self::NewMessage(_) => "new_message",
            Self::UserTyping(_) => "user_typing",
            Self::UserStoppedTyping(_) => "user_stopped_typing",
            Self::ViewerJoined(_) => "viewer_joined",
            Self::ViewerLeft(_) => "viewer_left",
            Self::NewLiveComment(_) => "new_live_comment",
            Self::LiveGiftSent(_) => "live_gift_sent",
            Self::IncomingCall(_) => "incoming_call",
            Self::CallResponse(_) => "call_response",
            Self::CallEnded(_) => "call_ended",
            Self::Error(_) => "error",
            Self::Notification(_) => "notification",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_tagged_client_event_with_defaults() {
        let raw = r#"{"event":"send_message","data":{"receiverId":"u2","content":"hi"}}"#;
        match serde_json::from_str::<ClientEvent>(raw).unwrap() {
            ClientEvent::SendMessage(msg) => {
                assert_eq!(msg.receiver_id, "u2");
                assert_eq!(msg.content.as_deref(), Some("hi"));
                assert_eq!(msg.message_type, MessageType::Text);
                assert!(msg.image.is_none());
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn unknown_event_name_is_rejected() {
        let raw = r#"{"event":"drop_table","data":{}}"#;
        assert!(serde_json::from_str::<ClientEvent>(raw).is_err());
    }

    #[test]
    fn server_event_encodes_name_and_camel_case_payload() {
        let value = serde_json::to_value(ServerEvent::user_offline("u1")).unwrap();
        assert_eq!(value["event"], "user_offline");
        assert_eq!(value["data"]["userId"], "u1");
        assert_eq!(ServerEvent::user_offline("u1").name(), "user_offline");
    }
}
