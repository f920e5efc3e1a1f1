//! v001 -- Initial schema creation.
//!
//! Creates the five core tables: `users`, `contacts`, `conversations`,
//! `messages`, and `verification_codes`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    email         TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,              -- salt_hex$blake3_hex
    username      TEXT NOT NULL,
    avatar        TEXT,
    status        TEXT NOT NULL,
    verified      INTEGER NOT NULL DEFAULT 0, -- boolean 0/1
    created_at    TEXT NOT NULL               -- RFC-3339
);

-- ----------------------------------------------------------------
-- Contacts
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS contacts (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id      INTEGER NOT NULL,            -- owner, FK -> users(id)
    contact_id   INTEGER NOT NULL,            -- FK -> users(id)
    contact_name TEXT NOT NULL,               -- name as saved by the owner
    created_at   TEXT NOT NULL,

    FOREIGN KEY (user_id) REFERENCES users(id),
    FOREIGN KEY (contact_id) REFERENCES users(id)
);

CREATE INDEX IF NOT EXISTS idx_contacts_user_id ON contacts(user_id);

-- ----------------------------------------------------------------
-- Conversations
-- ----------------------------------------------------------------
-- One row per unordered pair; the pair invariant is enforced by the
-- store's find-or-create, not by a constraint.
CREATE TABLE IF NOT EXISTS conversations (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    participant_a     INTEGER NOT NULL,
    participant_b     INTEGER NOT NULL,
    last_message_time TEXT,                   -- NULL until the first message
    created_at        TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_conversations_a ON conversations(participant_a);
CREATE INDEX IF NOT EXISTS idx_conversations_b ON conversations(participant_b);

-- ----------------------------------------------------------------
-- Messages
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS messages (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    conversation_id INTEGER NOT NULL,         -- not a FK, see Database::create_message
    sender_id       INTEGER NOT NULL,         -- FK -> users(id)
    content         TEXT NOT NULL,
    status          TEXT NOT NULL DEFAULT 'sent',
    timestamp       TEXT NOT NULL,

    FOREIGN KEY (sender_id) REFERENCES users(id)
);

CREATE INDEX IF NOT EXISTS idx_messages_conversation_ts
    ON messages(conversation_id, timestamp ASC);

-- ----------------------------------------------------------------
-- Verification codes
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS verification_codes (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    email      TEXT NOT NULL UNIQUE,
    code       TEXT NOT NULL,
    expires_at TEXT NOT NULL,
    created_at TEXT NOT NULL
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
