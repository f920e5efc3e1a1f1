//! CRUD operations for [`Conversation`] records and the read-side
//! conversation list.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use banca_shared::types::{ConversationId, UserId};

use crate::database::{format_timestamp, optional, parse_timestamp, Database};
use crate::error::{Result, StoreError};
use crate::models::{compare_by_recent_activity, Conversation, ConversationSummary};

const CONVERSATION_COLUMNS: &str =
    "id, participant_a, participant_b, last_message_time, created_at";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Return the conversation between `a` and `b` (in either order),
    /// creating it if none exists. The boolean is `true` when a new row was
    /// inserted.
    ///
    /// Lookup and insert run in one transaction so two concurrent callers
    /// cannot create two rows for the same pair.
    pub fn find_or_create_conversation(
        &self,
        a: UserId,
        b: UserId,
    ) -> Result<(Conversation, bool)> {
        if a == b {
            return Err(StoreError::Invalid(format!(
                "conversation needs two distinct participants, got {a} twice"
            )));
        }

        let tx = self.conn().unchecked_transaction()?;

        if let Some(existing) = find_by_participants(&tx, a, b)? {
            tx.commit()?;
            return Ok((existing, false));
        }

        let now = Utc::now();
        tx.execute(
            "INSERT INTO conversations (participant_a, participant_b, last_message_time, created_at)
             VALUES (?1, ?2, NULL, ?3)",
            params![a.0, b.0, format_timestamp(&now)],
        )?;
        let id = ConversationId(tx.last_insert_rowid());
        tx.commit()?;

        tracing::debug!(conversation_id = %id, a = %a, b = %b, "created conversation");

        Ok((
            Conversation {
                id,
                participant_a: a,
                participant_b: b,
                last_message_time: None,
                created_at: now,
            },
            true,
        ))
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    pub fn get_conversation(&self, id: ConversationId) -> Result<Option<Conversation>> {
        optional(self.conn().query_row(
            &format!("SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = ?1"),
            params![id.0],
            row_to_conversation,
        ))
    }

    /// Order-independent lookup: (A, B) matches a row stored as (B, A).
    pub fn find_conversation_by_participants(
        &self,
        a: UserId,
        b: UserId,
    ) -> Result<Option<Conversation>> {
        find_by_participants(self.conn(), a, b)
    }

    /// Every conversation `user_id` takes part in, in id order.
    pub fn list_conversations_for_user(&self, user_id: UserId) -> Result<Vec<Conversation>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {CONVERSATION_COLUMNS}
             FROM conversations
             WHERE participant_a = ?1 OR participant_b = ?1
             ORDER BY id ASC"
        ))?;

        let rows = stmt.query_map(params![user_id.0], row_to_conversation)?;

        let mut conversations = Vec::new();
        for row in rows {
            conversations.push(row?);
        }
        Ok(conversations)
    }

    /// The conversation list for `user_id`: each conversation with the other
    /// participant, the latest message and the unread count, most recently
    /// active first.
    pub fn conversation_summaries(&self, user_id: UserId) -> Result<Vec<ConversationSummary>> {
        let mut conversations = self.list_conversations_for_user(user_id)?;
        conversations.sort_by(compare_by_recent_activity);

        let mut summaries = Vec::with_capacity(conversations.len());
        for conversation in conversations {
            let other_participant = match conversation.counterpart(user_id) {
                Some(other) => self.get_user(other)?,
                None => None,
            };
            let latest_message = self.latest_message(conversation.id)?;
            let unread_count = self.unread_count(conversation.id, user_id)?;

            summaries.push(ConversationSummary {
                conversation,
                other_participant,
                latest_message,
                unread_count,
            });
        }
        Ok(summaries)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Set `last_message_time`. Returns `false` if the conversation does not
    /// exist.
    pub fn touch_conversation(&self, id: ConversationId, time: DateTime<Utc>) -> Result<bool> {
        touch(self.conn(), id, time)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn find_by_participants(conn: &Connection, a: UserId, b: UserId) -> Result<Option<Conversation>> {
    optional(conn.query_row(
        &format!(
            "SELECT {CONVERSATION_COLUMNS}
             FROM conversations
             WHERE (participant_a = ?1 AND participant_b = ?2)
                OR (participant_a = ?2 AND participant_b = ?1)
             ORDER BY id ASC
             LIMIT 1"
        ),
        params![a.0, b.0],
        row_to_conversation,
    ))
}

pub(crate) fn touch(conn: &Connection, id: ConversationId, time: DateTime<Utc>) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE conversations SET last_message_time = ?1 WHERE id = ?2",
        params![format_timestamp(&time), id.0],
    )?;
    Ok(affected > 0)
}

/// Map a `rusqlite::Row` to a [`Conversation`].
fn row_to_conversation(row: &rusqlite::Row<'_>) -> rusqlite::Result<Conversation> {
    let last_str: Option<String> = row.get(3)?;
    let created_str: String = row.get(4)?;

    let last_message_time = last_str
        .map(|s| parse_timestamp(3, &s))
        .transpose()?;

    Ok(Conversation {
        id: ConversationId(row.get(0)?),
        participant_a: UserId(row.get(1)?),
        participant_b: UserId(row.get(2)?),
        last_message_time,
        created_at: parse_timestamp(4, &created_str)?,
    })
}
