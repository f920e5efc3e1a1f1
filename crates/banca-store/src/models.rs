//! Domain model structs persisted in the SQLite database.
//!
//! Every struct derives `Serialize` so it can be returned directly by the
//! HTTP API. Field names are camelCase on the wire.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use banca_shared::types::{ConversationId, UserId};

pub use banca_shared::types::Message;
pub use banca_shared::MessageStatus;

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A registered person.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    /// Unique contact address.
    pub email: String,
    /// Salted password digest. Never leaves the server.
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    /// Display name.
    pub username: String,
    pub avatar: Option<String>,
    /// Free-form status text.
    pub status: String,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
}

/// Fields required to insert a [`User`].
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub username: String,
    pub avatar: Option<String>,
    /// `None` stores the default status text.
    pub status: Option<String>,
    pub verified: bool,
}

/// Partial update of a [`User`]. `None` leaves a column unchanged.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub password_hash: Option<String>,
    pub username: Option<String>,
    pub avatar: Option<String>,
    pub status: Option<String>,
    pub verified: Option<bool>,
}

// ---------------------------------------------------------------------------
// Contact
// ---------------------------------------------------------------------------

/// An entry in a user's contact list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: i64,
    /// Owner of the contact list.
    pub user_id: UserId,
    /// The user being saved as a contact.
    pub contact_id: UserId,
    /// Name as saved by the owner.
    pub contact_name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewContact {
    pub user_id: UserId,
    pub contact_id: UserId,
    pub contact_name: String,
}

// ---------------------------------------------------------------------------
// Conversation
// ---------------------------------------------------------------------------

/// A two-party conversation. The participant order carries no meaning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: ConversationId,
    pub participant_a: UserId,
    pub participant_b: UserId,
    /// Timestamp of the most recent message, `None` before the first one.
    pub last_message_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    pub fn has_participant(&self, user: UserId) -> bool {
        self.participant_a == user || self.participant_b == user
    }

    /// The participant that is not `user`, or `None` if `user` is not part
    /// of this conversation.
    pub fn counterpart(&self, user: UserId) -> Option<UserId> {
        if self.participant_a == user {
            Some(self.participant_b)
        } else if self.participant_b == user {
            Some(self.participant_a)
        } else {
            None
        }
    }
}

/// A conversation as shown in a user's conversation list.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub other_participant: Option<User>,
    pub latest_message: Option<Message>,
    /// Messages from the other participant not yet marked read.
    pub unread_count: u32,
}

/// Most recent activity first; conversations that never had a message last.
pub fn compare_by_recent_activity(a: &Conversation, b: &Conversation) -> Ordering {
    match (a.last_message_time, b.last_message_time) {
        (Some(ta), Some(tb)) => tb.cmp(&ta),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => b.created_at.cmp(&a.created_at),
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// Fields required to insert a [`Message`]. Status and timestamp are
/// assigned by the store.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    pub content: String,
}

/// Result of asking the store to move a message to a new status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    /// The message after the attempt.
    pub message: Message,
    pub previous: MessageStatus,
    /// `false` when the request would have kept or lowered the status.
    pub changed: bool,
}

// ---------------------------------------------------------------------------
// Verification code
// ---------------------------------------------------------------------------

/// A one-time code sent to an email address.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VerificationCode {
    pub id: i64,
    pub email: String,
    pub code: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl VerificationCode {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
