use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            username    TEXT NOT NULL UNIQUE COLLATE NOCASE,
            password    TEXT NOT NULL,
            avatar      TEXT NOT NULL DEFAULT '/default-avatar.png'
        );

        CREATE TABLE IF NOT EXISTS messages (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            sender_id       INTEGER NOT NULL,
            recipient_id    INTEGER NOT NULL,
            kind            TEXT NOT NULL CHECK (kind IN ('emoticon', 'thought')),
            content         TEXT NOT NULL,
            seen            INTEGER NOT NULL DEFAULT 0,
            created_at      TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_messages_recipient_seen
            ON messages(recipient_id, seen);

        CREATE INDEX IF NOT EXISTS idx_messages_sender
            ON messages(sender_id);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
