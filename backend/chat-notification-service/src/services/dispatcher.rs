/// Chat Notification Dispatcher
///
/// Turns one "message created" event into zero or one push notification:
/// 1. Read sender/text from the event payload
/// 2. Load the chat to find both participants
/// 3. Pick the participant who did not send the message
/// 4. Look up their FCM token in the teachers/parents directory
/// 5. Send the notification
///
/// Every failure ends the dispatch quietly; nothing is retried and nothing is written.
use std::sync::Arc;
use tracing::{error, info, warn, Instrument};

use crate::error::DispatchError;
use crate::metrics;
use crate::models::{
    non_empty, Chat, ChatNotification, DirectoryCollection, DispatchOutcome, MessageCreatedEvent,
    Recipient,
};
use crate::services::{DocumentStore, PushGateway};

/// Work out who receives a message sent by `sender` in `chat`.
pub fn resolve_recipient(chat: &Chat, sender: &str) -> Result<Recipient, DispatchError> {
    let (teacher, parent) = match (
        non_empty(chat.teacher_username.as_deref()),
        non_empty(chat.parent_username.as_deref()),
    ) {
        (Some(teacher), Some(parent)) => (teacher, parent),
        _ => return Err(DispatchError::MissingParticipants),
    };

    if sender == teacher {
        Ok(Recipient {
            collection: DirectoryCollection::Parents,
            username: parent.to_string(),
        })
    } else if sender == parent {
        Ok(Recipient {
            collection: DirectoryCollection::Teachers,
            username: teacher.to_string(),
        })
    } else {
        Err(DispatchError::SenderNotParticipant)
    }
}

#[derive(Clone)]
pub struct NotificationDispatcher {
    store: Arc<dyn DocumentStore>,
    push: Arc<dyn PushGateway>,
}

impl NotificationDispatcher {
    pub fn new(store: Arc<dyn DocumentStore>, push: Arc<dyn PushGateway>) -> Self {
        Self { store, push }
    }

    /// Handle one event. Never fails; the outcome is informational.
    pub async fn dispatch(&self, event: MessageCreatedEvent) -> DispatchOutcome {
        let span = tracing::info_span!(
            "dispatch",
            chat_id = %event.chat_id,
            message_id = %event.message_id
        );

        async move {
            let sender = event
                .message
                .as_ref()
                .map(|m| m.sender_or_unknown().to_string());

            let outcome = match self.try_dispatch(&event).await {
                Ok((recipient, message_id)) => {
                    info!(recipient = %recipient, message_id = %message_id, "✅ Notification sent");
                    DispatchOutcome::Sent {
                        recipient,
                        message_id,
                    }
                }
                Err(err) => {
                    let sender = sender.as_deref().unwrap_or_default();
                    if let DispatchError::Delivery(fcm_err) = &err {
                        if fcm_err.is_unregistered_token() {
                            warn!(sender, "FCM token is no longer registered");
                        }
                    }
                    if err.is_failure() {
                        error!(sender, stage = err.stage(), error = %err, "Notification not sent");
                    } else {
                        warn!(sender, stage = err.stage(), reason = %err, "Skipping notification");
                    }
                    DispatchOutcome::Skipped(err)
                }
            };

            metrics::record_dispatch(&outcome);
            outcome
        }
        .instrument(span)
        .await
    }

    async fn try_dispatch(
        &self,
        event: &MessageCreatedEvent,
    ) -> Result<(Recipient, String), DispatchError> {
        let message = event
            .message
            .as_ref()
            .ok_or(DispatchError::MissingMessageData)?;

        let sender = message.sender_or_unknown();
        info!(
            sender,
            text = message.body_or_placeholder(),
            "🆕 New message"
        );

        let chat = self
            .store
            .get_chat(&event.chat_id)
            .await?
            .ok_or(DispatchError::ChatNotFound)?;

        let recipient = resolve_recipient(&chat, sender)?;
        info!(receiver = %recipient, "🎯 Receiver resolved");

        let entry = self
            .store
            .find_directory_entry(recipient.collection, &recipient.username)
            .await?
            .ok_or_else(|| DispatchError::RecipientNotFound {
                collection: recipient.collection,
                username: recipient.username.clone(),
            })?;

        let token = non_empty(entry.fcm_token.as_deref()).ok_or_else(|| {
            DispatchError::MissingFcmToken {
                collection: recipient.collection,
                username: recipient.username.clone(),
            }
        })?;

        let notification = ChatNotification::for_message(&event.chat_id, message, token);
        let message_id = self.push.send(&notification).await?;

        Ok((recipient, message_id))
    }
}
