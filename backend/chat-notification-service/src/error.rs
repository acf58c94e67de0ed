use taska_fcm_shared::FCMError;
use thiserror::Error;

use crate::models::DirectoryCollection;

/// Failure reading from the document database.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to get access token: {0}")]
    Auth(#[from] FCMError),

    #[error("Firestore request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Firestore API error: {0} - {1}")]
    Api(u16, String),

    #[error("Failed to decode Firestore response: {0}")]
    Decode(String),
}

/// Every reason a dispatch ends without a delivered notification.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("No message data found")]
    MissingMessageData,

    #[error("Chat document not found")]
    ChatNotFound,

    #[error("Chat metadata missing teacher/parent usernames")]
    MissingParticipants,

    #[error("Sender does not match chat participants")]
    SenderNotParticipant,

    #[error("Receiver {username} not found in {collection}")]
    RecipientNotFound {
        collection: DirectoryCollection,
        username: String,
    },

    #[error("No FCM token for {collection}/{username}")]
    MissingFcmToken {
        collection: DirectoryCollection,
        username: String,
    },

    #[error("Error sending notification: {0}")]
    Delivery(#[from] FCMError),

    #[error("Error reading chat data: {0}")]
    Store(#[from] StoreError),
}

impl DispatchError {
    /// Step at which the dispatch stopped, used in logs and metric labels.
    pub fn stage(&self) -> &'static str {
        match self {
            DispatchError::MissingMessageData => "event",
            DispatchError::ChatNotFound => "chat",
            DispatchError::MissingParticipants | DispatchError::SenderNotParticipant => {
                "participants"
            }
            DispatchError::RecipientNotFound { .. } => "recipient",
            DispatchError::MissingFcmToken { .. } => "token",
            DispatchError::Delivery(_) => "delivery",
            DispatchError::Store(_) => "store",
        }
    }

    /// Downstream failures, as opposed to missing or inconsistent data.
    pub fn is_failure(&self) -> bool {
        matches!(self, DispatchError::Delivery(_) | DispatchError::Store(_))
    }
}
