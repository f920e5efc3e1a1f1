use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::status::MessageStatus;
use crate::types::{ConversationId, Message, MessageId, UserId};

/// Frames a client sends over its channel.
///
/// Encoded as JSON objects tagged by a `type` field, e.g.
/// `{"type":"authenticate","userId":1}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientFrame {
    /// Bind the channel to a user identity
    Authenticate { user_id: UserId },

    /// Send a text message on a conversation
    Message {
        conversation_id: ConversationId,
        content: String,
    },

    /// Mark messages as read
    ReadReceipt { message_ids: Vec<MessageId> },
}

/// Frames the server pushes to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerFrame {
    /// Reply to [`ClientFrame::Authenticate`]
    Authenticated {
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    /// A message for the recipient, pushed on fan-out
    NewMessage { message: Message },

    /// Acknowledgment to the sender with the persisted message
    MessageSent { message: Message },

    /// Status change of a message the receiving client sent
    MessageUpdate {
        message_id: MessageId,
        status: MessageStatus,
    },

    /// Frame rejected (malformed, unauthenticated, invalid content)
    Error { message: String },
}

impl ClientFrame {
    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Frame name as it appears in the `type` field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Authenticate { .. } => "authenticate",
            Self::Message { .. } => "message",
            Self::ReadReceipt { .. } => "read_receipt",
        }
    }
}

impl ServerFrame {
    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}
