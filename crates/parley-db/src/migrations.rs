use crate::error::DbError;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id             INTEGER PRIMARY KEY,
            username       TEXT NOT NULL UNIQUE,
            first_name     TEXT NOT NULL,
            last_name      TEXT,
            phone          TEXT,
            password_hash  TEXT NOT NULL,
            avatar_url     TEXT,
            bio            TEXT,
            is_online      INTEGER NOT NULL DEFAULT 0,
            last_seen      TEXT,
            created_at     TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS chats (
            id          INTEGER PRIMARY KEY,
            type        TEXT NOT NULL DEFAULT 'private',
            name        TEXT,
            username    TEXT UNIQUE,
            description TEXT,
            avatar_url  TEXT,
            created_by  INTEGER REFERENCES users(id),
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            -- recency ordering key; millisecond precision so a send within
            -- the same second still reorders the chat list
            updated_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now'))
        );

        CREATE TABLE IF NOT EXISTS chat_members (
            chat_id    INTEGER NOT NULL REFERENCES chats(id),
            user_id    INTEGER NOT NULL REFERENCES users(id),
            role       TEXT NOT NULL DEFAULT 'member',
            is_pinned  INTEGER NOT NULL DEFAULT 0,
            is_muted   INTEGER NOT NULL DEFAULT 0,
            joined_at  TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(chat_id, user_id)
        );

        -- AUTOINCREMENT keeps message ids strictly increasing even across
        -- deletes; unread counts compare ids against read markers
        CREATE TABLE IF NOT EXISTS messages (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            chat_id      INTEGER NOT NULL REFERENCES chats(id),
            sender_id    INTEGER NOT NULL REFERENCES users(id),
            text         TEXT NOT NULL,
            message_type TEXT NOT NULL DEFAULT 'text',
            media_url    TEXT,
            media_name   TEXT,
            media_size   INTEGER,
            is_edited    INTEGER NOT NULL DEFAULT 0,
            is_forwarded INTEGER NOT NULL DEFAULT 0,
            reply_to_id  INTEGER REFERENCES messages(id),
            created_at   TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now'))
        );

        CREATE INDEX IF NOT EXISTS idx_messages_chat
            ON messages(chat_id, created_at);

        CREATE TABLE IF NOT EXISTS read_messages (
            chat_id               INTEGER NOT NULL REFERENCES chats(id),
            user_id               INTEGER NOT NULL REFERENCES users(id),
            last_read_message_id  INTEGER NOT NULL,
            UNIQUE(chat_id, user_id)
        );

        CREATE TABLE IF NOT EXISTS reactions (
            id          INTEGER PRIMARY KEY,
            message_id  INTEGER NOT NULL REFERENCES messages(id),
            user_id     INTEGER NOT NULL REFERENCES users(id),
            emoji       TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(message_id, user_id, emoji)
        );

        CREATE INDEX IF NOT EXISTS idx_reactions_message
            ON reactions(message_id);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
