use chrono::Utc;
use rusqlite::params;

use banca_shared::types::{ConversationId, MessageId, UserId};
use banca_shared::MessageStatus;

use crate::conversations::touch;
use crate::database::{format_timestamp, optional, parse_timestamp, Database};
use crate::error::Result;
use crate::models::{Message, NewMessage, StatusChange};

const MESSAGE_COLUMNS: &str = "id, conversation_id, sender_id, content, status, timestamp";

impl Database {
    /// Insert a message with status `sent` and move the conversation's
    /// `last_message_time` to the message timestamp, in one transaction.
    ///
    /// The conversation is not required to exist: the message is stored
    /// either way and the timestamp update simply touches no row.
    pub fn create_message(&self, message: &NewMessage) -> Result<Message> {
        let now = Utc::now();
        let tx = self.conn().unchecked_transaction()?;

        tx.execute(
            "INSERT INTO messages (conversation_id, sender_id, content, status, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                message.conversation_id.0,
                message.sender_id.0,
                message.content,
                MessageStatus::Sent.as_str(),
                format_timestamp(&now),
            ],
        )?;
        let id = MessageId(tx.last_insert_rowid());

        if !touch(&tx, message.conversation_id, now)? {
            tracing::debug!(
                message_id = %id,
                conversation_id = %message.conversation_id,
                "message stored for unknown conversation"
            );
        }

        tx.commit()?;

        Ok(Message {
            id,
            conversation_id: message.conversation_id,
            sender_id: message.sender_id,
            content: message.content.clone(),
            status: MessageStatus::Sent,
            timestamp: now,
        })
    }

    /// Full history of a conversation, oldest first.
    pub fn list_messages(&self, conversation_id: ConversationId) -> Result<Vec<Message>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {MESSAGE_COLUMNS}
             FROM messages
             WHERE conversation_id = ?1
             ORDER BY timestamp ASC, id ASC"
        ))?;

        let rows = stmt.query_map(params![conversation_id.0], row_to_message)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    pub fn latest_message(&self, conversation_id: ConversationId) -> Result<Option<Message>> {
        optional(self.conn().query_row(
            &format!(
                "SELECT {MESSAGE_COLUMNS}
                 FROM messages
                 WHERE conversation_id = ?1
                 ORDER BY timestamp DESC, id DESC
                 LIMIT 1"
            ),
            params![conversation_id.0],
            row_to_message,
        ))
    }

    pub fn get_message(&self, id: MessageId) -> Result<Option<Message>> {
        optional(self.conn().query_row(
            &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1"),
            params![id.0],
            row_to_message,
        ))
    }

    /// Move a message forward to `target`. A target at or below the current
    /// status leaves the row untouched and reports `changed: false`.
    ///
    /// Returns `None` if the message does not exist.
    pub fn advance_message_status(
        &self,
        id: MessageId,
        target: MessageStatus,
    ) -> Result<Option<StatusChange>> {
        let tx = self.conn().unchecked_transaction()?;

        let Some(mut message) = optional(tx.query_row(
            &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1"),
            params![id.0],
            row_to_message,
        ))?
        else {
            return Ok(None);
        };

        let previous = message.status;
        let changed = match previous.advance(target) {
            Some(next) => {
                tx.execute(
                    "UPDATE messages SET status = ?1 WHERE id = ?2",
                    params![next.as_str(), id.0],
                )?;
                message.status = next;
                true
            }
            None => false,
        };
        tx.commit()?;

        Ok(Some(StatusChange {
            message,
            previous,
            changed,
        }))
    }

    /// Messages in the conversation sent by someone other than `viewer` and
    /// not yet read.
    pub fn unread_count(&self, conversation_id: ConversationId, viewer: UserId) -> Result<u32> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM messages
             WHERE conversation_id = ?1 AND sender_id != ?2 AND status != ?3",
            params![conversation_id.0, viewer.0, MessageStatus::Read.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as u32)
    }
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let status_str: String = row.get(4)?;
    let ts_str: String = row.get(5)?;

    let status = status_str.parse::<MessageStatus>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(Message {
        id: MessageId(row.get(0)?),
        conversation_id: ConversationId(row.get(1)?),
        sender_id: UserId(row.get(2)?),
        content: row.get(3)?,
        status,
        timestamp: parse_timestamp(5, &ts_str)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::tests::new_user;

    struct Fixture {
        db: Database,
        sara: UserId,
        alex: UserId,
        conversation: ConversationId,
    }

    fn fixture() -> Fixture {
        let db = Database::open_in_memory().unwrap();
        let sara = db.create_user(&new_user("sara@example.com", "Sara")).unwrap().id;
        let alex = db.create_user(&new_user("alex@example.com", "Alex")).unwrap().id;
        let (conversation, _) = db.find_or_create_conversation(sara, alex).unwrap();
        Fixture {
            db,
            sara,
            alex,
            conversation: conversation.id,
        }
    }

    fn send(f: &Fixture, sender: UserId, content: &str) -> Message {
        f.db.create_message(&NewMessage {
            conversation_id: f.conversation,
            sender_id: sender,
            content: content.to_string(),
        })
        .unwrap()
    }

    #[test]
    fn create_updates_conversation_time() {
        let f = fixture();
        let msg = send(&f, f.sara, "hi");

        assert_eq!(msg.status, MessageStatus::Sent);
        let conv = f.db.get_conversation(f.conversation).unwrap().unwrap();
        let last = conv.last_message_time.unwrap();
        assert_eq!((last - msg.timestamp).num_microseconds(), Some(0));
        assert_eq!(f.db.get_message(msg.id).unwrap().unwrap().content, "hi");
    }

    #[test]
    fn message_for_unknown_conversation_is_kept() {
        let f = fixture();
        let msg = f
            .db
            .create_message(&NewMessage {
                conversation_id: ConversationId(404),
                sender_id: f.sara,
                content: "lost".into(),
            })
            .unwrap();
        assert!(f.db.get_message(msg.id).unwrap().is_some());
    }

    #[test]
    fn history_is_oldest_first() {
        let f = fixture();
        let first = send(&f, f.sara, "one");
        let second = send(&f, f.alex, "two");
        let third = send(&f, f.sara, "three");

        let ids: Vec<MessageId> = f
            .db
            .list_messages(f.conversation)
            .unwrap()
            .iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec![first.id, second.id, third.id]);
        assert_eq!(f.db.latest_message(f.conversation).unwrap().unwrap().id, third.id);
    }

    #[test]
    fn status_moves_forward_only() {
        let f = fixture();
        let msg = send(&f, f.sara, "hi");

        let delivered = f
            .db
            .advance_message_status(msg.id, MessageStatus::Delivered)
            .unwrap()
            .unwrap();
        assert!(delivered.changed);
        assert_eq!(delivered.previous, MessageStatus::Sent);

        let read = f
            .db
            .advance_message_status(msg.id, MessageStatus::Read)
            .unwrap()
            .unwrap();
        assert!(read.changed);
        assert_eq!(read.message.status, MessageStatus::Read);

        // A late "delivered" must not downgrade a read message.
        let late = f
            .db
            .advance_message_status(msg.id, MessageStatus::Delivered)
            .unwrap()
            .unwrap();
        assert!(!late.changed);
        assert_eq!(late.message.status, MessageStatus::Read);

        // Second receipt: no error, still read.
        let again = f
            .db
            .advance_message_status(msg.id, MessageStatus::Read)
            .unwrap()
            .unwrap();
        assert!(!again.changed);
        assert_eq!(
            f.db.get_message(msg.id).unwrap().unwrap().status,
            MessageStatus::Read
        );
    }

    #[test]
    fn advance_unknown_message() {
        let f = fixture();
        assert!(f
            .db
            .advance_message_status(MessageId(77), MessageStatus::Read)
            .unwrap()
            .is_none());
    }

    #[test]
    fn unread_count_excludes_own_and_read() {
        let f = fixture();
        let m1 = send(&f, f.sara, "m1");
        let m2 = send(&f, f.sara, "m2");
        send(&f, f.alex, "reply");
        f.db.advance_message_status(m2.id, MessageStatus::Read).unwrap();

        assert_eq!(f.db.unread_count(f.conversation, f.alex).unwrap(), 1);
        assert_eq!(f.db.unread_count(f.conversation, f.sara).unwrap(), 1);

        f.db.advance_message_status(m1.id, MessageStatus::Read).unwrap();
        assert_eq!(f.db.unread_count(f.conversation, f.alex).unwrap(), 0);
    }
}
