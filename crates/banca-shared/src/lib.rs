//! # banca-shared
//!
//! Types shared by the Banca Messenger store and server: typed identifiers,
//! the message delivery status state machine, the JSON frames exchanged over
//! the WebSocket channel, and input validation helpers.

pub mod constants;
pub mod error;
pub mod protocol;
pub mod status;
pub mod types;
pub mod validation;

pub use error::ProtocolError;
pub use protocol::{ClientFrame, ServerFrame};
pub use status::MessageStatus;
pub use types::{ConnectionId, ConversationId, Message, MessageId, UserId};
