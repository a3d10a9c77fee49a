/// Database row types shared across the real-time handlers and REST surface.
/// Serialized field names are camelCase to match the client wire format.
use serde::{Deserialize, Serialize};

/// Public profile fields attached to presence, typing, and chat events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: String,
    pub username: String,
    pub full_name: Option<String>,
    pub profile_image: Option<String>,
}

impl UserSummary {
    /// Name shown in notification titles: full name when set, else username.
    pub fn display_name(&self) -> &str {
        match self.full_name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => &self.username,
        }
    }
}

/// Account row as the auth gate and moderation see it.
#[derive(Debug, Clone)]
pub struct Account {
    pub summary: UserSummary,
    pub is_blocked: bool,
    pub is_admin: bool,
}

/// Spendable and earned balances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Balances {
    pub diamonds: i64,
    pub coins: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    #[default]
    Text,
    Image,
    Video,
    Gift,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Video => "video",
            Self::Gift => "gift",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "text" => Some(Self::Text),
            "image" => Some(Self::Image),
            "video" => Some(Self::Video),
            "gift" => Some(Self::Gift),
            _ => None,
        }
    }
}

/// A persisted direct message with its sender's profile.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub content: Option<String>,
    pub message_type: MessageType,
    pub image: Option<String>,
    pub video: Option<String>,
    pub is_read: bool,
    pub created_at: String,
    pub sender: UserSummary,
}

impl MessageRecord {
    /// Media references carried by the message, image first.
    pub fn media(&self) -> Vec<String> {
        self.image.iter().chain(self.video.iter()).cloned().collect()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    pub id: String,
    pub user_id: String,
    pub title: String,
    #[serde(rename = "message")]
    pub body: String,
    #[serde(rename = "type")]
    pub notification_type: String,
    pub data: Option<serde_json::Value>,
    pub is_read: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GiftRecord {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub gift_type: String,
    pub gift_name: String,
    pub price: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRecord {
    pub id: String,
    pub caller_id: String,
    pub receiver_id: String,
    #[serde(rename = "type")]
    pub call_type: String,
    pub status: String,
    pub duration: Option<i64>,
    pub started_at: Option<String>,
    pub ended_at: Option<String>,
    pub created_at: String,
}
