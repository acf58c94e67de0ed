use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::services::firestore::Document;

/// Body used when a message was created without text.
pub const PLACEHOLDER_BODY: &str = "(No text message)";

/// Sender name reported when the message has none.
pub const UNKNOWN_SENDER: &str = "Unknown";

/// Value of `data.click_action`, routes the tap to the Flutter app.
pub const CLICK_ACTION: &str = "FLUTTER_NOTIFICATION_CLICK";

/// Chat metadata naming the two participants (`chats/{chatId}`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub teacher_username: Option<String>,
    pub parent_username: Option<String>,
}

impl Chat {
    pub fn from_document(doc: &Document) -> Self {
        Self {
            teacher_username: doc.string_field("teacherUsername").map(String::from),
            parent_username: doc.string_field("parentUsername").map(String::from),
        }
    }
}

/// A chat message (`chats/{chatId}/messages/{messageId}`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender: Option<String>,
    pub text: Option<String>,
}

impl ChatMessage {
    pub fn from_document(doc: &Document) -> Self {
        Self {
            sender: doc.string_field("sender").map(String::from),
            text: doc.string_field("text").map(String::from),
        }
    }

    pub fn sender_or_unknown(&self) -> &str {
        non_empty(self.sender.as_deref()).unwrap_or(UNKNOWN_SENDER)
    }

    pub fn body_or_placeholder(&self) -> &str {
        non_empty(self.text.as_deref()).unwrap_or(PLACEHOLDER_BODY)
    }
}

/// A teacher or parent profile holding the push token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryEntry {
    pub username: String,
    pub fcm_token: Option<String>,
}

impl DirectoryEntry {
    pub fn from_document(doc: &Document) -> Self {
        Self {
            username: doc.string_field("username").unwrap_or_default().to_string(),
            fcm_token: doc.string_field("fcmToken").map(String::from),
        }
    }
}

/// Directory collection holding one participant role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectoryCollection {
    Teachers,
    Parents,
}

impl DirectoryCollection {
    pub fn as_str(&self) -> &'static str {
        match self {
            DirectoryCollection::Teachers => "teachers",
            DirectoryCollection::Parents => "parents",
        }
    }
}

impl fmt::Display for DirectoryCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The participant who should receive the notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recipient {
    pub collection: DirectoryCollection,
    pub username: String,
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.username)
    }
}

/// "Message created" event with its path parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageCreatedEvent {
    pub chat_id: String,
    pub message_id: String,
    /// `None` when the event carried no document data.
    pub message: Option<ChatMessage>,
}

/// Notification for a single device, before it is handed to the push gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatNotification {
    pub token: String,
    pub title: String,
    pub body: String,
    pub data: BTreeMap<String, String>,
}

impl ChatNotification {
    /// Build the notification for `message` in `chat_id`, addressed to `token`.
    pub fn for_message(chat_id: &str, message: &ChatMessage, token: &str) -> Self {
        let mut data = BTreeMap::new();
        data.insert("click_action".to_string(), CLICK_ACTION.to_string());
        data.insert("chatId".to_string(), chat_id.to_string());

        Self {
            token: token.to_string(),
            title: format!("💬 New message from {}", message.sender_or_unknown()),
            body: message.body_or_placeholder().to_string(),
            data,
        }
    }
}

/// Result of one dispatch. Never surfaced to the event source.
#[derive(Debug)]
pub enum DispatchOutcome {
    Sent {
        recipient: Recipient,
        message_id: String,
    },
    Skipped(crate::error::DispatchError),
}

impl DispatchOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, DispatchOutcome::Sent { .. })
    }

    pub fn stage(&self) -> &'static str {
        match self {
            DispatchOutcome::Sent { .. } => "delivered",
            DispatchOutcome::Skipped(err) => err.stage(),
        }
    }
}

pub(crate) fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
