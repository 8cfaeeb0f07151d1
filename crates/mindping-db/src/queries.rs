use anyhow::Result;
use chrono::{SecondsFormat, SubsecRound, Utc};
use rusqlite::{Connection, OptionalExtension, Row};

use mindping_types::models::{Message, MessageKind, User};

use crate::Database;
use crate::models::{MessageRow, UserRow};

const USER_COLUMNS: &str = "id, username, password, avatar";
const MESSAGE_COLUMNS: &str = "id, sender_id, recipient_id, kind, content, seen, created_at";

impl Database {
    // -- Users --

    /// Fails if the username is already taken, ignoring case.
    pub fn create_user(&self, username: &str, password_hash: &str, avatar: &str) -> Result<User> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (username, password, avatar) VALUES (?1, ?2, ?3)",
                (username, password_hash, avatar),
            )?;
            Ok(User {
                id: conn.last_insert_rowid(),
                username: username.to_string(),
                avatar: avatar.to_string(),
            })
        })
    }

    pub fn get_user(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
            Ok(conn.query_row(&sql, [id], user_row).optional()?)
        })
    }

    /// Exact match, case-insensitive.
    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1 COLLATE NOCASE");
            Ok(conn.query_row(&sql, [username], user_row).optional()?)
        })
    }

    /// Case-insensitive substring search. An empty query matches nobody.
    pub fn find_users(&self, query: &str) -> Result<Vec<UserRow>> {
        if query.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {USER_COLUMNS} FROM users
                 WHERE instr(lower(username), lower(?1)) > 0
                 ORDER BY id"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([query], user_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Messages --

    /// Store a new unseen message. The recipient is not checked for existence.
    pub fn create_message(
        &self,
        sender_id: i64,
        recipient_id: i64,
        kind: MessageKind,
        content: &str,
    ) -> Result<Message> {
        self.with_conn(|conn| {
            // Stamped under the lock so id order and created_at order agree.
            let created_at = Utc::now().trunc_subsecs(3);
            conn.execute(
                "INSERT INTO messages (sender_id, recipient_id, kind, content, seen, created_at)
                 VALUES (?1, ?2, ?3, ?4, 0, ?5)",
                rusqlite::params![
                    sender_id,
                    recipient_id,
                    kind.as_str(),
                    content,
                    created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
                ],
            )?;

            Ok(Message {
                id: conn.last_insert_rowid(),
                sender_id,
                recipient_id,
                kind,
                content: content.to_string(),
                seen: false,
                created_at,
            })
        })
    }

    pub fn get_message(&self, id: i64) -> Result<Option<Message>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1");
            let row = conn.query_row(&sql, [id], message_row).optional()?;
            Ok(row.map(MessageRow::into_message))
        })
    }

    /// Everything the user sent or received, newest first.
    pub fn get_messages_for_user(&self, user_id: i64) -> Result<Vec<Message>> {
        self.with_conn(|conn| query_messages_for_user(conn, user_id))
    }

    /// Counted from the message table on every call.
    pub fn get_unseen_count(&self, user_id: i64) -> Result<u64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM messages WHERE recipient_id = ?1 AND seen = 0",
                [user_id],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
    }

    /// Idempotent. Returns whether this call flipped the flag; unknown ids
    /// and already-seen messages are a no-op.
    pub fn mark_as_seen(&self, message_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE messages SET seen = 1 WHERE id = ?1 AND seen = 0",
                [message_id],
            )?;
            Ok(changed > 0)
        })
    }
}

fn query_messages_for_user(conn: &Connection, user_id: i64) -> Result<Vec<Message>> {
    let sql = format!(
        "SELECT {MESSAGE_COLUMNS} FROM messages
         WHERE sender_id = ?1 OR recipient_id = ?1
         ORDER BY created_at DESC, id DESC"
    );
    let mut stmt = conn.prepare(&sql)?;

    let rows = stmt
        .query_map([user_id], message_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows.into_iter().map(MessageRow::into_message).collect())
}

fn user_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        password: row.get(2)?,
        avatar: row.get(3)?,
    })
}

fn message_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        sender_id: row.get(1)?,
        recipient_id: row.get(2)?,
        kind: row.get(3)?,
        content: row.get(4)?,
        seen: row.get(5)?,
        created_at: row.get(6)?,
    })
}
