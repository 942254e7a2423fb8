use crate::Database;
use crate::error::DbError;
use crate::models::{
    ChatRow, ChatSummaryRow, LastMessageRow, MessageRow, NewMessageRow, ReactionRow, UserRow,
};
use rusqlite::{Connection, OptionalExtension, params};

const USER_COLS: &str =
    "id, username, first_name, last_name, phone, password_hash, avatar_url, bio, is_online, last_seen, created_at";

impl Database {
    // -- Users --

    /// Insert a new user, already marked online. A taken username surfaces
    /// as [`DbError::Conflict`] straight from the UNIQUE constraint.
    pub fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        first_name: &str,
        last_name: Option<&str>,
        phone: Option<&str>,
    ) -> Result<UserRow, DbError> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!(
                    "INSERT INTO users (username, first_name, last_name, phone, password_hash, is_online)
                     VALUES (?1, ?2, ?3, ?4, ?5, 1)
                     RETURNING {USER_COLS}"
                ),
                params![username, first_name, last_name, phone, password_hash],
                map_user,
            )
            .map_err(DbError::on_insert)
        })
    }

    /// Single lookup matching username AND credential digest, so a missing
    /// user and a wrong password are indistinguishable to the caller.
    pub fn find_user_by_credentials(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<Option<UserRow>, DbError> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    &format!(
                        "SELECT {USER_COLS} FROM users WHERE username = ?1 AND password_hash = ?2"
                    ),
                    params![username, password_hash],
                    map_user,
                )
                .optional()?)
        })
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>, DbError> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT {USER_COLS} FROM users WHERE id = ?1"),
                    [id],
                    map_user,
                )
                .optional()?)
        })
    }

    pub fn mark_online(&self, user_id: i64) -> Result<(), DbError> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET is_online = 1, last_seen = datetime('now') WHERE id = ?1",
                [user_id],
            )?;
            Ok(())
        })
    }

    /// Substring search over username and lowercased first/last name.
    /// `query` must already be trimmed and lowercased by the caller.
    pub fn search_users(&self, query: &str) -> Result<Vec<UserRow>, DbError> {
        let pattern = format!("%{query}%");
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {USER_COLS} FROM users
                 WHERE username LIKE ?1 OR LOWER(first_name) LIKE ?1 OR LOWER(last_name) LIKE ?1
                 LIMIT 20"
            ))?;
            let rows = stmt
                .query_map([&pattern], map_user)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Chats --

    /// Every chat `user_id` belongs to, most recently active first, with
    /// member count and the caller's unread count. Unread means: sent by
    /// someone else, id above the caller's read marker (all such messages
    /// when no marker exists).
    pub fn list_chats(&self, user_id: i64) -> Result<Vec<ChatSummaryRow>, DbError> {
        self.with_conn(|conn| query_chats(conn, user_id))
    }

    pub fn latest_message(&self, chat_id: i64) -> Result<Option<LastMessageRow>, DbError> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT m.id, m.text, m.created_at, m.sender_id, u.first_name, u.last_name
                     FROM messages m
                     JOIN users u ON u.id = m.sender_id
                     WHERE m.chat_id = ?1
                     ORDER BY m.created_at DESC, m.id DESC
                     LIMIT 1",
                    [chat_id],
                    |row| {
                        Ok(LastMessageRow {
                            id: row.get(0)?,
                            text: row.get(1)?,
                            created_at: row.get(2)?,
                            sender_id: row.get(3)?,
                            first_name: row.get(4)?,
                            last_name: row.get(5)?,
                        })
                    },
                )
                .optional()?)
        })
    }

    pub fn is_member(&self, chat_id: i64, user_id: i64) -> Result<bool, DbError> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT 1 FROM chat_members WHERE chat_id = ?1 AND user_id = ?2",
                    params![chat_id, user_id],
                    |_| Ok(()),
                )
                .optional()?
                .is_some())
        })
    }

    /// Chat, owner membership and deduplicated member rows all commit
    /// together or not at all. The creator is silently dropped from
    /// `member_ids`; a taken chat handle rolls the whole unit back as
    /// [`DbError::Conflict`].
    pub fn create_chat(
        &self,
        creator_id: i64,
        chat_type: &str,
        name: Option<&str>,
        username: Option<&str>,
        member_ids: &[i64],
    ) -> Result<ChatRow, DbError> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let chat = tx
                .query_row(
                    "INSERT INTO chats (type, name, username, created_by)
                     VALUES (?1, ?2, ?3, ?4)
                     RETURNING id, type, name, username, created_at",
                    params![chat_type, name, username, creator_id],
                    |row| {
                        Ok(ChatRow {
                            id: row.get(0)?,
                            chat_type: row.get(1)?,
                            name: row.get(2)?,
                            username: row.get(3)?,
                            created_at: row.get(4)?,
                        })
                    },
                )
                .map_err(DbError::on_insert)?;

            tx.execute(
                "INSERT INTO chat_members (chat_id, user_id, role) VALUES (?1, ?2, 'owner')",
                params![chat.id, creator_id],
            )?;

            let mut members = member_ids.to_vec();
            members.sort_unstable();
            members.dedup();
            for member_id in members {
                if member_id != creator_id {
                    tx.execute(
                        "INSERT INTO chat_members (chat_id, user_id, role) VALUES (?1, ?2, 'member')",
                        params![chat.id, member_id],
                    )?;
                }
            }

            tx.commit()?;
            Ok(chat)
        })
    }

    // -- Messages --

    /// Insert the message and bump the chat's recency in one transaction, so
    /// the chat list ordering always reflects committed sends.
    pub fn insert_message(
        &self,
        chat_id: i64,
        sender_id: i64,
        text: &str,
        message_type: &str,
    ) -> Result<NewMessageRow, DbError> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let message = tx.query_row(
                "INSERT INTO messages (chat_id, sender_id, text, message_type)
                 VALUES (?1, ?2, ?3, ?4)
                 RETURNING id, chat_id, sender_id, text, message_type, created_at",
                params![chat_id, sender_id, text, message_type],
                |row| {
                    Ok(NewMessageRow {
                        id: row.get(0)?,
                        chat_id: row.get(1)?,
                        sender_id: row.get(2)?,
                        text: row.get(3)?,
                        message_type: row.get(4)?,
                        created_at: row.get(5)?,
                    })
                },
            )?;

            tx.execute(
                "UPDATE chats SET updated_at = strftime('%Y-%m-%d %H:%M:%f', 'now') WHERE id = ?1",
                [chat_id],
            )?;

            tx.commit()?;
            Ok(message)
        })
    }

    /// One page, newest first; the API layer reverses it to chronological
    /// order. Ties on `created_at` break on id so pages are stable.
    pub fn messages_page(
        &self,
        chat_id: i64,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<MessageRow>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT m.id, m.text, m.message_type, m.media_url, m.media_name, m.media_size,
                        m.is_edited, m.is_forwarded, m.reply_to_id, m.created_at,
                        m.sender_id, u.first_name, u.last_name, u.username, u.avatar_url
                 FROM messages m
                 JOIN users u ON u.id = m.sender_id
                 WHERE m.chat_id = ?1
                 ORDER BY m.created_at DESC, m.id DESC
                 LIMIT ?2 OFFSET ?3",
            )?;
            let rows = stmt
                .query_map(params![chat_id, limit, offset], |row| {
                    Ok(MessageRow {
                        id: row.get(0)?,
                        text: row.get(1)?,
                        message_type: row.get(2)?,
                        media_url: row.get(3)?,
                        media_name: row.get(4)?,
                        media_size: row.get(5)?,
                        is_edited: row.get(6)?,
                        is_forwarded: row.get(7)?,
                        reply_to_id: row.get(8)?,
                        created_at: row.get(9)?,
                        sender_id: row.get(10)?,
                        sender_first_name: row.get(11)?,
                        sender_last_name: row.get(12)?,
                        sender_username: row.get(13)?,
                        sender_avatar_url: row.get(14)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Reactions --

    /// Batch-fetch reactions for a page of message ids.
    pub fn reactions_for_messages(&self, message_ids: &[i64]) -> Result<Vec<ReactionRow>, DbError> {
        if message_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> =
                (1..=message_ids.len()).map(|i| format!("?{i}")).collect();
            let sql = format!(
                "SELECT message_id, user_id, emoji FROM reactions WHERE message_id IN ({})",
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let sql_params: Vec<&dyn rusqlite::types::ToSql> = message_ids
                .iter()
                .map(|id| id as &dyn rusqlite::types::ToSql)
                .collect();

            let rows = stmt
                .query_map(sql_params.as_slice(), |row| {
                    Ok(ReactionRow {
                        message_id: row.get(0)?,
                        user_id: row.get(1)?,
                        emoji: row.get(2)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Toggle a reaction: removes if present, inserts if not.
    /// Returns true when the reaction was added.
    pub fn toggle_reaction(
        &self,
        message_id: i64,
        user_id: i64,
        emoji: &str,
    ) -> Result<bool, DbError> {
        self.with_conn(|conn| {
            let existing: Option<i64> = conn
                .query_row(
                    "SELECT id FROM reactions WHERE message_id = ?1 AND user_id = ?2 AND emoji = ?3",
                    params![message_id, user_id, emoji],
                    |row| row.get(0),
                )
                .optional()?;

            if let Some(existing_id) = existing {
                conn.execute("DELETE FROM reactions WHERE id = ?1", [existing_id])?;
                Ok(false)
            } else {
                conn.execute(
                    "INSERT INTO reactions (message_id, user_id, emoji) VALUES (?1, ?2, ?3)",
                    params![message_id, user_id, emoji],
                )?;
                Ok(true)
            }
        })
    }

    pub fn chat_of_message(&self, message_id: i64) -> Result<Option<i64>, DbError> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT chat_id FROM messages WHERE id = ?1",
                    [message_id],
                    |row| row.get(0),
                )
                .optional()?)
        })
    }

    // -- Read markers --

    /// Upsert the caller's read marker for a chat. The marker only ever
    /// advances; acknowledging an older message is a no-op.
    pub fn mark_read(&self, chat_id: i64, user_id: i64, message_id: i64) -> Result<(), DbError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO read_messages (chat_id, user_id, last_read_message_id)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(chat_id, user_id)
                 DO UPDATE SET last_read_message_id = MAX(last_read_message_id, excluded.last_read_message_id)",
                params![chat_id, user_id, message_id],
            )?;
            Ok(())
        })
    }
}

fn query_chats(conn: &Connection, user_id: i64) -> Result<Vec<ChatSummaryRow>, DbError> {
    let mut stmt = conn.prepare(
        "SELECT
            c.id, c.type, c.name, c.username, c.description, c.avatar_url,
            cm.is_pinned, cm.is_muted,
            (SELECT COUNT(*) FROM chat_members WHERE chat_id = c.id) AS members_count,
            (SELECT COUNT(*) FROM messages m
             LEFT JOIN read_messages rm ON rm.chat_id = c.id AND rm.user_id = ?1
             WHERE m.chat_id = c.id AND m.sender_id != ?1
               AND (rm.last_read_message_id IS NULL OR m.id > rm.last_read_message_id)
            ) AS unread_count
         FROM chats c
         JOIN chat_members cm ON cm.chat_id = c.id
         WHERE cm.user_id = ?1
         ORDER BY c.updated_at DESC, c.id DESC",
    )?;

    let rows = stmt
        .query_map([user_id], |row| {
            Ok(ChatSummaryRow {
                id: row.get(0)?,
                chat_type: row.get(1)?,
                name: row.get(2)?,
                username: row.get(3)?,
                description: row.get(4)?,
                avatar_url: row.get(5)?,
                is_pinned: row.get(6)?,
                is_muted: row.get(7)?,
                member_count: row.get(8)?,
                unread_count: row.get(9)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rows)
}

fn map_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        phone: row.get(4)?,
        password_hash: row.get(5)?,
        avatar_url: row.get(6)?,
        bio: row.get(7)?,
        is_online: row.get(8)?,
        last_seen: row.get(9)?,
        created_at: row.get(10)?,
    })
}
