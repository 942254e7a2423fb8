use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// -- Auth --

/// Body of `POST /auth`. The legacy wire contract selects the operation with
/// an `action` field inside the JSON body rather than by route, so the three
/// operations deserialize as one tagged enum. Field-level requirements
/// (non-empty username, password length, ...) are checked by the handler so
/// the error messages stay on the wire contract.
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum AuthRequest {
    Register {
        #[serde(default)]
        username: String,
        #[serde(default)]
        password: String,
        #[serde(default)]
        first_name: String,
        #[serde(default)]
        last_name: String,
        #[serde(default)]
        phone: String,
    },
    Login {
        #[serde(default)]
        username: String,
        #[serde(default)]
        password: String,
    },
    Verify,
}

/// Returned by register and login.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub user: UserPublic,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub user: UserPublic,
}

/// Public projection of a user row. The credential hash never appears here.
#[derive(Debug, Clone, Serialize)]
pub struct UserPublic {
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub is_online: bool,
}

/// Narrower projection used by user search; deliberately omits the phone.
#[derive(Debug, Clone, Serialize)]
pub struct UserHit {
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UsersResponse {
    pub users: Vec<UserHit>,
}

// -- Chats --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatType {
    #[default]
    Private,
    Group,
    Channel,
}

impl ChatType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatType::Private => "private",
            ChatType::Group => "group",
            ChatType::Channel => "channel",
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateChatRequest {
    #[serde(rename = "type", default)]
    pub chat_type: ChatType,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub member_ids: Vec<i64>,
}

#[derive(Debug, Serialize)]
pub struct ChatCreated {
    pub id: i64,
    #[serde(rename = "type")]
    pub chat_type: String,
    pub name: Option<String>,
    pub username: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ChatCreatedResponse {
    pub chat: ChatCreated,
}

/// One entry of `GET /chats`: membership flags, counts, and the latest
/// message, ordered most-recently-active first.
#[derive(Debug, Serialize)]
pub struct ChatSummary {
    pub id: i64,
    #[serde(rename = "type")]
    pub chat_type: String,
    pub name: Option<String>,
    pub username: Option<String>,
    pub description: Option<String>,
    pub avatar_url: Option<String>,
    pub is_pinned: bool,
    pub is_muted: bool,
    pub members: i64,
    pub unread_count: i64,
    pub last_message: Option<LastMessage>,
}

#[derive(Debug, Serialize)]
pub struct LastMessage {
    pub id: i64,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub sender_id: i64,
    pub first_name: String,
    pub last_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatsResponse {
    pub chats: Vec<ChatSummary>,
}

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub chat_id: Option<i64>,
    #[serde(default)]
    pub text: String,
    #[serde(default = "default_message_type")]
    pub message_type: String,
}

fn default_message_type() -> String {
    "text".to_string()
}

#[derive(Debug, Serialize)]
pub struct MessageCreated {
    pub id: i64,
    pub chat_id: i64,
    pub sender_id: i64,
    pub text: String,
    pub message_type: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct MessageCreatedResponse {
    pub message: MessageCreated,
}

/// One entry of a message page, sender fields joined in.
#[derive(Debug, Serialize)]
pub struct MessageView {
    pub id: i64,
    pub text: String,
    pub message_type: String,
    pub media_url: Option<String>,
    pub media_name: Option<String>,
    pub media_size: Option<i64>,
    pub is_edited: bool,
    pub is_forwarded: bool,
    pub reply_to_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub sender_id: i64,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: String,
    pub avatar_url: Option<String>,
    pub reactions: Vec<ReactionAggregate>,
}

#[derive(Debug, Serialize)]
pub struct MessagesResponse {
    pub messages: Vec<MessageView>,
}

// -- Reactions --

#[derive(Debug, Clone, Serialize)]
pub struct ReactionAggregate {
    pub emoji: String,
    pub count: i64,
    /// Whether the requesting user is among the reactors for this emoji.
    pub selected: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReactRequest {
    pub message_id: Option<i64>,
    #[serde(default)]
    pub emoji: String,
}

// -- Read markers --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MarkReadRequest {
    pub chat_id: Option<i64>,
    pub message_id: Option<i64>,
}
