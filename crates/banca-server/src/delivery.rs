//! Delivery status tracking.
//!
//! Drives a message through `sent -> delivered -> read` as a side effect of
//! fan-out and read receipts, and tells the original sender about each step
//! when they are online. The forward-only rule itself lives in
//! [`MessageStatus::advance`]; the store applies it atomically.

use tracing::{debug, warn};

use banca_shared::types::{Message, MessageId, UserId};
use banca_shared::{MessageStatus, ServerFrame};
use banca_store::StatusChange;

use crate::error::ServerError;
use crate::registry::{ChannelHandle, ConnectionRegistry};
use crate::store::Store;

/// What happened to one id of a read receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptOutcome {
    /// Status is now `read`. `changed` is `false` for a repeated receipt.
    Read { changed: bool, sender_notified: bool },
    /// No message with this id.
    UnknownMessage,
    /// The reader sent this message; senders cannot mark their own messages.
    OwnMessage,
    /// The reader is not part of the message's conversation.
    NotParticipant,
}

enum ReceiptLookup {
    Missing,
    Own,
    Outsider,
    Advanced(StatusChange),
}

#[derive(Clone)]
pub struct Delivery {
    store: Store,
    registry: ConnectionRegistry,
}

impl Delivery {
    pub fn new(store: Store, registry: ConnectionRegistry) -> Self {
        Self { store, registry }
    }

    /// Push a freshly stored message to `recipient` if they have a live
    /// channel. On success the message becomes `delivered` and the sender is
    /// told through `sender_channel`.
    ///
    /// Returns the message as it stands afterwards.
    pub async fn fan_out(
        &self,
        message: Message,
        recipient: UserId,
        sender_channel: &ChannelHandle,
    ) -> Result<Message, ServerError> {
        let Some(live) = self.registry.lookup(recipient).await else {
            debug!(message_id = %message.id, recipient = %recipient, "Recipient offline");
            return Ok(message);
        };

        if !live.push(ServerFrame::NewMessage {
            message: message.clone(),
        }) {
            debug!(message_id = %message.id, recipient = %recipient, "Recipient channel closed");
            return Ok(message);
        }

        let id = message.id;
        let change = self
            .store
            .call(move |db| db.advance_message_status(id, MessageStatus::Delivered))
            .await?;

        let Some(change) = change else {
            warn!(message_id = %id, "Message vanished before delivery update");
            return Ok(message);
        };

        if change.changed {
            sender_channel.push(ServerFrame::MessageUpdate {
                message_id: id,
                status: MessageStatus::Delivered,
            });
        } else {
            // The recipient already read it before we got here.
            debug!(message_id = %id, status = %change.message.status, "Delivery update skipped");
        }

        Ok(change.message)
    }

    /// Mark one message as read on behalf of `reader` and notify the
    /// original sender if they are online.
    pub async fn mark_read(
        &self,
        reader: UserId,
        message_id: MessageId,
    ) -> Result<ReceiptOutcome, ServerError> {
        let lookup = self
            .store
            .call(move |db| {
                let Some(message) = db.get_message(message_id)? else {
                    return Ok(ReceiptLookup::Missing);
                };
                if message.sender_id == reader {
                    return Ok(ReceiptLookup::Own);
                }
                let participant = db
                    .get_conversation(message.conversation_id)?
                    .is_some_and(|conversation| conversation.has_participant(reader));
                if !participant {
                    return Ok(ReceiptLookup::Outsider);
                }
                Ok(match db.advance_message_status(message_id, MessageStatus::Read)? {
                    Some(change) => ReceiptLookup::Advanced(change),
                    None => ReceiptLookup::Missing,
                })
            })
            .await?;

        let change = match lookup {
            ReceiptLookup::Missing => return Ok(ReceiptOutcome::UnknownMessage),
            ReceiptLookup::Own => return Ok(ReceiptOutcome::OwnMessage),
            ReceiptLookup::Outsider => return Ok(ReceiptOutcome::NotParticipant),
            ReceiptLookup::Advanced(change) => change,
        };

        let sender_notified = match self.registry.lookup(change.message.sender_id).await {
            Some(channel) => channel.push(ServerFrame::MessageUpdate {
                message_id,
                status: MessageStatus::Read,
            }),
            None => false,
        };

        Ok(ReceiptOutcome::Read {
            changed: change.changed,
            sender_notified,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use banca_shared::types::ConversationId;
    use banca_store::{Database, NewMessage, NewUser};
    use crate::registry::OUTBOUND_QUEUE_LEN;

    struct Fixture {
        delivery: Delivery,
        store: Store,
        registry: ConnectionRegistry,
        sara: UserId,
        alex: UserId,
        conversation: ConversationId,
    }

    async fn fixture() -> Fixture {
        let store = Store::new(Database::open_in_memory().unwrap());
        let (sara, alex, conversation) = store
            .call(|db| {
                let mut ids = Vec::new();
                for (email, name) in [("sara@example.com", "Sara"), ("alex@example.com", "Alex")] {
                    let user = db.create_user(&NewUser {
                        email: email.into(),
                        password_hash: "salt$hash".into(),
                        username: name.into(),
                        avatar: None,
                        status: None,
                        verified: true,
                    })?;
                    ids.push(user.id);
                }
                let (conv, _) = db.find_or_create_conversation(ids[0], ids[1])?;
                Ok((ids[0], ids[1], conv.id))
            })
            .await
            .unwrap();

        let registry = ConnectionRegistry::new();
        Fixture {
            delivery: Delivery::new(store.clone(), registry.clone()),
            store,
            registry,
            sara,
            alex,
            conversation,
        }
    }

    async fn store_message(f: &Fixture, sender: UserId) -> Message {
        let conversation_id = f.conversation;
        f.store
            .call(move |db| {
                db.create_message(&NewMessage {
                    conversation_id,
                    sender_id: sender,
                    content: "hi".into(),
                })
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_fan_out_offline_keeps_sent() {
        let f = fixture().await;
        let (sender, mut sender_rx) = ChannelHandle::open();
        let message = store_message(&f, f.sara).await;

        let result = f.delivery.fan_out(message, f.alex, &sender).await.unwrap();
        assert_eq!(result.status, MessageStatus::Sent);
        assert!(sender_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_fan_out_live_marks_delivered() {
        let f = fixture().await;
        let (sender, mut sender_rx) = ChannelHandle::open();
        let (recipient, mut recipient_rx) = ChannelHandle::open();
        f.registry.bind(f.alex, recipient).await;

        let message = store_message(&f, f.sara).await;
        let result = f.delivery.fan_out(message.clone(), f.alex, &sender).await.unwrap();

        assert_eq!(result.status, MessageStatus::Delivered);
        assert_eq!(
            recipient_rx.try_recv().unwrap(),
            ServerFrame::NewMessage { message: message.clone() }
        );
        assert_eq!(
            sender_rx.try_recv().unwrap(),
            ServerFrame::MessageUpdate {
                message_id: message.id,
                status: MessageStatus::Delivered,
            }
        );
    }

    #[tokio::test]
    async fn test_fan_out_to_backed_up_recipient_keeps_sent() {
        let f = fixture().await;
        let (sender, mut sender_rx) = ChannelHandle::open();
        let (recipient, _recipient_rx) = ChannelHandle::open();
        for _ in 0..OUTBOUND_QUEUE_LEN {
            recipient.push(ServerFrame::error("backlog"));
        }
        f.registry.bind(f.alex, recipient).await;

        let message = store_message(&f, f.sara).await;
        let result = f.delivery.fan_out(message, f.alex, &sender).await.unwrap();

        assert_eq!(result.status, MessageStatus::Sent);
        assert!(sender_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_mark_read_notifies_sender() {
        let f = fixture().await;
        let (sara_channel, mut sara_rx) = ChannelHandle::open();
        f.registry.bind(f.sara, sara_channel).await;
        let message = store_message(&f, f.sara).await;

        let outcome = f.delivery.mark_read(f.alex, message.id).await.unwrap();
        assert_eq!(
            outcome,
            ReceiptOutcome::Read {
                changed: true,
                sender_notified: true
            }
        );
        assert_eq!(
            sara_rx.try_recv().unwrap(),
            ServerFrame::MessageUpdate {
                message_id: message.id,
                status: MessageStatus::Read,
            }
        );
    }

    #[tokio::test]
    async fn test_mark_read_edge_cases() {
        let f = fixture().await;
        let message = store_message(&f, f.sara).await;

        assert_eq!(
            f.delivery.mark_read(f.alex, MessageId(999)).await.unwrap(),
            ReceiptOutcome::UnknownMessage
        );
        assert_eq!(
            f.delivery.mark_read(f.sara, message.id).await.unwrap(),
            ReceiptOutcome::OwnMessage
        );

        f.delivery.mark_read(f.alex, message.id).await.unwrap();
        assert_eq!(
            f.delivery.mark_read(f.alex, message.id).await.unwrap(),
            ReceiptOutcome::Read {
                changed: false,
                sender_notified: false
            }
        );
    }

    #[tokio::test]
    async fn test_mark_read_rejects_outsider() {
        let f = fixture().await;
        let (sara_channel, mut sara_rx) = ChannelHandle::open();
        f.registry.bind(f.sara, sara_channel).await;
        let message = store_message(&f, f.sara).await;

        let maya = f
            .store
            .call(|db| {
                db.create_user(&NewUser {
                    email: "maya@example.com".into(),
                    password_hash: "salt$hash".into(),
                    username: "Maya".into(),
                    avatar: None,
                    status: None,
                    verified: true,
                })
            })
            .await
            .unwrap()
            .id;

        assert_eq!(
            f.delivery.mark_read(maya, message.id).await.unwrap(),
            ReceiptOutcome::NotParticipant
        );
        assert!(sara_rx.try_recv().is_err());

        let id = message.id;
        let stored = f.store.call(move |db| db.get_message(id)).await.unwrap().unwrap();
        assert_eq!(stored.status, MessageStatus::Sent);
    }
}
