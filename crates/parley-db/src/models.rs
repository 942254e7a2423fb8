//! Database row types — these map directly to SQLite rows.
//! Distinct from the parley-types API models to keep the DB layer
//! independent. Timestamps stay as the raw TEXT SQLite produced; the API
//! layer owns parsing.

pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub password_hash: String,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub is_online: bool,
    pub last_seen: Option<String>,
    pub created_at: String,
}

/// A chat as returned from creation.
pub struct ChatRow {
    pub id: i64,
    pub chat_type: String,
    pub name: Option<String>,
    pub username: Option<String>,
    pub created_at: String,
}

/// One chat-list entry for a given member: chat columns, that member's
/// per-chat flags, and the two aggregate counts.
pub struct ChatSummaryRow {
    pub id: i64,
    pub chat_type: String,
    pub name: Option<String>,
    pub username: Option<String>,
    pub description: Option<String>,
    pub avatar_url: Option<String>,
    pub is_pinned: bool,
    pub is_muted: bool,
    pub member_count: i64,
    pub unread_count: i64,
}

pub struct LastMessageRow {
    pub id: i64,
    pub text: String,
    pub created_at: String,
    pub sender_id: i64,
    pub first_name: String,
    pub last_name: Option<String>,
}

/// One page entry, sender columns joined in.
pub struct MessageRow {
    pub id: i64,
    pub text: String,
    pub message_type: String,
    pub media_url: Option<String>,
    pub media_name: Option<String>,
    pub media_size: Option<i64>,
    pub is_edited: bool,
    pub is_forwarded: bool,
    pub reply_to_id: Option<i64>,
    pub created_at: String,
    pub sender_id: i64,
    pub sender_first_name: String,
    pub sender_last_name: Option<String>,
    pub sender_username: String,
    pub sender_avatar_url: Option<String>,
}

/// A freshly inserted message, before any joins.
pub struct NewMessageRow {
    pub id: i64,
    pub chat_id: i64,
    pub sender_id: i64,
    pub text: String,
    pub message_type: String,
    pub created_at: String,
}

pub struct ReactionRow {
    pub message_id: i64,
    pub user_id: i64,
    pub emoji: String,
}
