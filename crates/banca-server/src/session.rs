//! Per-channel protocol handler.
//!
//! A [`Session`] owns one channel's state: its outbound handle and the
//! identity it authenticated as (if any). Every inbound frame is handled to
//! completion before the next one, so replies on a channel come out in the
//! order the frames came in.
//!
//! Failure policy: frames the client got wrong get an `error` frame back;
//! store failures are logged and the frame is dropped without a reply.

use tracing::{debug, error, info, warn};

use banca_shared::constants::MAX_FRAME_SIZE;
use banca_shared::types::{ConnectionId, ConversationId, MessageId, UserId};
use banca_shared::validation::validate_message_content;
use banca_shared::{ClientFrame, ServerFrame};
use banca_store::NewMessage;

use crate::delivery::{Delivery, ReceiptOutcome};
use crate::error::ServerError;
use crate::rate_limit::RateLimiter;
use crate::registry::{ChannelHandle, ConnectionRegistry};
use crate::store::Store;

pub struct Session {
    channel: ChannelHandle,
    user: Option<UserId>,
    store: Store,
    registry: ConnectionRegistry,
    delivery: Delivery,
    limiter: RateLimiter<ConnectionId>,
}

impl Session {
    pub fn new(
        channel: ChannelHandle,
        store: Store,
        registry: ConnectionRegistry,
        limiter: RateLimiter<ConnectionId>,
    ) -> Self {
        Self {
            delivery: Delivery::new(store.clone(), registry.clone()),
            channel,
            user: None,
            store,
            registry,
            limiter,
        }
    }

    /// The identity this channel authenticated as.
    pub fn user(&self) -> Option<UserId> {
        self.user
    }

    pub fn connection(&self) -> ConnectionId {
        self.channel.id()
    }

    /// Handle one raw text frame from the socket.
    pub async fn handle_text(&mut self, text: &str) {
        if text.len() > MAX_FRAME_SIZE {
            warn!(connection = %self.connection().short(), size = text.len(), "Frame too large");
            self.reject("Frame too large");
            return;
        }

        if !self.limiter.check(self.connection()).await {
            warn!(connection = %self.connection().short(), "Frame rate limit exceeded");
            self.reject("Rate limit exceeded");
            return;
        }

        match ClientFrame::from_json(text) {
            Ok(frame) => self.handle_frame(frame).await,
            Err(e) => {
                debug!(connection = %self.connection().short(), error = %e, "Undecodable frame");
                self.reject("Malformed frame");
            }
        }
    }

    /// Dispatch a decoded frame.
    pub async fn handle_frame(&mut self, frame: ClientFrame) {
        let kind = frame.kind();

        let result = match (frame, self.user) {
            (ClientFrame::Authenticate { user_id }, _) => self.authenticate(user_id).await,
            (
                ClientFrame::Message {
                    conversation_id,
                    content,
                },
                Some(sender),
            ) => self.send_message(sender, conversation_id, content).await,
            (ClientFrame::ReadReceipt { message_ids }, Some(reader)) => {
                self.read_receipt(reader, message_ids).await;
                Ok(())
            }
            (_, None) => {
                debug!(connection = %self.connection().short(), kind, "Frame before authentication");
                self.reject("Not authenticated");
                Ok(())
            }
        };

        if let Err(e) = result {
            error!(
                connection = %self.connection().short(),
                user_id = ?self.user,
                kind,
                error = %e,
                "Frame dropped"
            );
        }
    }

    /// Push a frame that is not a reply to anything in particular, e.g. the
    /// rejection of a binary frame.
    pub fn reject(&self, reason: &str) {
        self.reply(ServerFrame::error(reason));
    }

    /// Unregister this channel. Called once the socket has closed.
    pub async fn close(self) {
        if let Some(user) = self.user {
            self.registry.unbind(user, self.channel.id()).await;
        }
        self.limiter.forget(&self.channel.id()).await;
    }

    // ------------------------------------------------------------------
    // Frame handlers
    // ------------------------------------------------------------------

    async fn authenticate(&mut self, user_id: UserId) -> Result<(), ServerError> {
        let user = self.store.call(move |db| db.get_user(user_id)).await?;

        if user.is_none() {
            info!(connection = %self.connection().short(), user_id = %user_id, "Authentication failed");
            self.reply(ServerFrame::Authenticated {
                success: false,
                error: Some("User not found".to_string()),
            });
            return Ok(());
        }

        if let Some(previous) = self.user.filter(|prev| *prev != user_id) {
            self.registry.unbind(previous, self.channel.id()).await;
        }

        self.registry.bind(user_id, self.channel.clone()).await;
        self.user = Some(user_id);

        self.reply(ServerFrame::Authenticated {
            success: true,
            error: None,
        });
        Ok(())
    }

    async fn send_message(
        &self,
        sender: UserId,
        conversation_id: ConversationId,
        content: String,
    ) -> Result<(), ServerError> {
        if let Err(reason) = validate_message_content(&content) {
            self.reject(&reason);
            return Ok(());
        }

        let conversation = self
            .store
            .call(move |db| db.get_conversation(conversation_id))
            .await?;

        let recipient = match &conversation {
            Some(conversation) => match conversation.counterpart(sender) {
                Some(recipient) => Some(recipient),
                None => {
                    warn!(
                        user_id = %sender,
                        conversation_id = %conversation_id,
                        "Sender is not a participant"
                    );
                    self.reject("Not a participant of this conversation");
                    return Ok(());
                }
            },
            None => {
                warn!(
                    user_id = %sender,
                    conversation_id = %conversation_id,
                    "Conversation not found, storing message without fan-out"
                );
                None
            }
        };

        let message = self
            .store
            .call(move |db| {
                db.create_message(&NewMessage {
                    conversation_id,
                    sender_id: sender,
                    content,
                })
            })
            .await?;

        debug!(
            message_id = %message.id,
            conversation_id = %conversation_id,
            user_id = %sender,
            "Message stored"
        );

        let message = match recipient {
            Some(recipient) => {
                self.delivery
                    .fan_out(message, recipient, &self.channel)
                    .await?
            }
            None => message,
        };

        self.reply(ServerFrame::MessageSent { message });
        Ok(())
    }

    /// Each id is handled on its own; a failure on one never stops the rest.
    async fn read_receipt(&self, reader: UserId, message_ids: Vec<MessageId>) {
        for message_id in message_ids {
            match self.delivery.mark_read(reader, message_id).await {
                Ok(ReceiptOutcome::Read {
                    changed,
                    sender_notified,
                }) => {
                    debug!(
                        user_id = %reader,
                        message_id = %message_id,
                        changed,
                        sender_notified,
                        "Message read"
                    );
                }
                Ok(ReceiptOutcome::UnknownMessage) => {
                    debug!(user_id = %reader, message_id = %message_id, "Receipt for unknown message");
                }
                Ok(ReceiptOutcome::OwnMessage) => {
                    debug!(user_id = %reader, message_id = %message_id, "Receipt for own message ignored");
                }
                Ok(ReceiptOutcome::NotParticipant) => {
                    warn!(user_id = %reader, message_id = %message_id, "Receipt from non-participant ignored");
                }
                Err(e) => {
                    error!(user_id = %reader, message_id = %message_id, error = %e, "Read receipt failed");
                }
            }
        }
    }

    fn reply(&self, frame: ServerFrame) {
        if !self.channel.push(frame) {
            debug!(connection = %self.connection().short(), "Reply to closed channel dropped");
        }
    }
}
