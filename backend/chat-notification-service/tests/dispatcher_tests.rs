/// Dispatcher behaviour against in-memory Firestore and FCM stand-ins
///
/// Covers:
/// - Missing payload, missing chat, unknown sender (no delivery)
/// - Recipient selection in both directions
/// - Missing directory entry or token (no delivery)
/// - Delivery and store failures are swallowed
use async_trait::async_trait;
use chat_notification_service::{
    Chat, ChatMessage, ChatNotification, DirectoryCollection, DirectoryEntry, DispatchError,
    DispatchOutcome, DocumentStore, MessageCreatedEvent, NotificationDispatcher, PushGateway,
    StoreError,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use taska_fcm_shared::FCMError;

#[derive(Default)]
struct MemoryStore {
    chats: HashMap<String, Chat>,
    directory: Vec<(DirectoryCollection, DirectoryEntry)>,
    lookups: Mutex<Vec<(DirectoryCollection, String)>>,
    unavailable: bool,
}

impl MemoryStore {
    fn with_chat(mut self, chat_id: &str, teacher: &str, parent: &str) -> Self {
        self.chats.insert(
            chat_id.to_string(),
            Chat {
                teacher_username: Some(teacher.to_string()),
                parent_username: Some(parent.to_string()),
            },
        );
        self
    }

    fn with_entry(
        mut self,
        collection: DirectoryCollection,
        username: &str,
        token: Option<&str>,
    ) -> Self {
        self.directory.push((
            collection,
            DirectoryEntry {
                username: username.to_string(),
                fcm_token: token.map(String::from),
            },
        ));
        self
    }

    fn lookups(&self) -> Vec<(DirectoryCollection, String)> {
        self.lookups.lock().unwrap().clone()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get_chat(&self, chat_id: &str) -> Result<Option<Chat>, StoreError> {
        if self.unavailable {
            return Err(StoreError::Api(503, "unavailable".to_string()));
        }
        Ok(self.chats.get(chat_id).cloned())
    }

    async fn find_directory_entry(
        &self,
        collection: DirectoryCollection,
        username: &str,
    ) -> Result<Option<DirectoryEntry>, StoreError> {
        self.lookups
            .lock()
            .unwrap()
            .push((collection, username.to_string()));
        Ok(self
            .directory
            .iter()
            .find(|(c, e)| *c == collection && e.username == username)
            .map(|(_, e)| e.clone()))
    }
}

#[derive(Default)]
struct RecordingPush {
    sent: Mutex<Vec<ChatNotification>>,
    fail: bool,
}

impl RecordingPush {
    fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    fn sent(&self) -> Vec<ChatNotification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl PushGateway for RecordingPush {
    async fn send(&self, notification: &ChatNotification) -> Result<String, FCMError> {
        self.sent.lock().unwrap().push(notification.clone());
        if self.fail {
            return Err(FCMError::ApiError(500, "internal".to_string()));
        }
        Ok(format!("projects/test/messages/{}", self.sent.lock().unwrap().len()))
    }
}

fn event(chat_id: &str, sender: Option<&str>, text: Option<&str>) -> MessageCreatedEvent {
    MessageCreatedEvent {
        chat_id: chat_id.to_string(),
        message_id: "m1".to_string(),
        message: Some(ChatMessage {
            sender: sender.map(String::from),
            text: text.map(String::from),
        }),
    }
}

fn dispatcher(store: Arc<MemoryStore>, push: Arc<RecordingPush>) -> NotificationDispatcher {
    NotificationDispatcher::new(store, push)
}

fn classroom() -> MemoryStore {
    MemoryStore::default()
        .with_chat("c1", "t1", "p1")
        .with_entry(DirectoryCollection::Parents, "p1", Some("TOK123"))
        .with_entry(DirectoryCollection::Teachers, "t1", Some("TEACHER-TOK"))
}

#[tokio::test]
async fn test_teacher_message_notifies_parent() {
    let store = Arc::new(classroom());
    let push = Arc::new(RecordingPush::default());

    let outcome = dispatcher(store.clone(), push.clone())
        .dispatch(event("c1", Some("t1"), Some("Hello")))
        .await;

    assert!(outcome.is_sent());
    assert_eq!(
        store.lookups(),
        vec![(DirectoryCollection::Parents, "p1".to_string())]
    );

    let sent = push.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].token, "TOK123");
    assert!(sent[0].title.contains("t1"));
    assert_eq!(sent[0].body, "Hello");
    assert_eq!(sent[0].data.get("chatId").map(String::as_str), Some("c1"));
    assert_eq!(
        sent[0].data.get("click_action").map(String::as_str),
        Some("FLUTTER_NOTIFICATION_CLICK")
    );
}

#[tokio::test]
async fn test_parent_message_notifies_teacher() {
    let store = Arc::new(classroom());
    let push = Arc::new(RecordingPush::default());

    let outcome = dispatcher(store.clone(), push.clone())
        .dispatch(event("c1", Some("p1"), Some("Thanks")))
        .await;

    match outcome {
        DispatchOutcome::Sent { recipient, .. } => {
            assert_eq!(recipient.collection, DirectoryCollection::Teachers);
            assert_eq!(recipient.username, "t1");
        }
        other => panic!("expected a delivery, got {other:?}"),
    }
    assert_eq!(push.sent()[0].token, "TEACHER-TOK");
}

#[tokio::test]
async fn test_parent_message_without_teacher_token() {
    let store = Arc::new(
        MemoryStore::default()
            .with_chat("c1", "t1", "p1")
            .with_entry(DirectoryCollection::Teachers, "t1", None),
    );
    let push = Arc::new(RecordingPush::default());

    let outcome = dispatcher(store.clone(), push.clone())
        .dispatch(event("c1", Some("p1"), None))
        .await;

    assert!(matches!(
        outcome,
        DispatchOutcome::Skipped(DispatchError::MissingFcmToken { .. })
    ));
    assert_eq!(
        store.lookups(),
        vec![(DirectoryCollection::Teachers, "t1".to_string())]
    );
    assert!(push.sent().is_empty());
}

#[tokio::test]
async fn test_empty_token_counts_as_missing() {
    let store = Arc::new(
        MemoryStore::default()
            .with_chat("c1", "t1", "p1")
            .with_entry(DirectoryCollection::Parents, "p1", Some("")),
    );
    let push = Arc::new(RecordingPush::default());

    let outcome = dispatcher(store, push.clone())
        .dispatch(event("c1", Some("t1"), Some("Hi")))
        .await;

    assert_eq!(outcome.stage(), "token");
    assert!(push.sent().is_empty());
}

#[tokio::test]
async fn test_missing_payload_sends_nothing() {
    let store = Arc::new(classroom());
    let push = Arc::new(RecordingPush::default());

    let outcome = dispatcher(store.clone(), push.clone())
        .dispatch(MessageCreatedEvent {
            chat_id: "c1".to_string(),
            message_id: "m1".to_string(),
            message: None,
        })
        .await;

    assert!(matches!(
        outcome,
        DispatchOutcome::Skipped(DispatchError::MissingMessageData)
    ));
    assert!(store.lookups().is_empty());
    assert!(push.sent().is_empty());
}

#[tokio::test]
async fn test_unknown_chat_sends_nothing() {
    let store = Arc::new(classroom());
    let push = Arc::new(RecordingPush::default());

    let outcome = dispatcher(store.clone(), push.clone())
        .dispatch(event("missing-chat", Some("t1"), Some("Hello")))
        .await;

    assert!(matches!(
        outcome,
        DispatchOutcome::Skipped(DispatchError::ChatNotFound)
    ));
    assert!(store.lookups().is_empty());
    assert!(push.sent().is_empty());
}

#[tokio::test]
async fn test_sender_outside_chat_sends_nothing() {
    let store = Arc::new(classroom());
    let push = Arc::new(RecordingPush::default());
    let dispatcher = dispatcher(store.clone(), push.clone());

    for sender in [Some("someone-else"), None, Some("T1")] {
        let outcome = dispatcher.dispatch(event("c1", sender, Some("Hello"))).await;
        assert!(matches!(
            outcome,
            DispatchOutcome::Skipped(DispatchError::SenderNotParticipant)
        ));
    }

    assert!(store.lookups().is_empty());
    assert!(push.sent().is_empty());
}

#[tokio::test]
async fn test_chat_without_participants_sends_nothing() {
    let mut store = MemoryStore::default();
    store.chats.insert(
        "c1".to_string(),
        Chat {
            teacher_username: Some("t1".to_string()),
            parent_username: None,
        },
    );
    let store = Arc::new(store);
    let push = Arc::new(RecordingPush::default());

    let outcome = dispatcher(store, push.clone())
        .dispatch(event("c1", Some("t1"), Some("Hello")))
        .await;

    assert!(matches!(
        outcome,
        DispatchOutcome::Skipped(DispatchError::MissingParticipants)
    ));
    assert!(push.sent().is_empty());
}

#[tokio::test]
async fn test_recipient_missing_from_directory() {
    let store = Arc::new(MemoryStore::default().with_chat("c1", "t1", "p1"));
    let push = Arc::new(RecordingPush::default());

    let outcome = dispatcher(store, push.clone())
        .dispatch(event("c1", Some("t1"), Some("Hello")))
        .await;

    match outcome {
        DispatchOutcome::Skipped(DispatchError::RecipientNotFound {
            collection,
            username,
        }) => {
            assert_eq!(collection, DirectoryCollection::Parents);
            assert_eq!(username, "p1");
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert!(push.sent().is_empty());
}

#[tokio::test]
async fn test_missing_text_uses_placeholder_body() {
    let store = Arc::new(classroom());
    let push = Arc::new(RecordingPush::default());

    dispatcher(store, push.clone())
        .dispatch(event("c1", Some("t1"), None))
        .await;

    assert_eq!(push.sent()[0].body, "(No text message)");
}

#[tokio::test]
async fn test_delivery_failure_is_swallowed() {
    let store = Arc::new(classroom());
    let push = Arc::new(RecordingPush::failing());

    let outcome = dispatcher(store, push.clone())
        .dispatch(event("c1", Some("t1"), Some("Hello")))
        .await;

    match &outcome {
        DispatchOutcome::Skipped(err) => {
            assert!(matches!(err, DispatchError::Delivery(_)));
            assert!(err.is_failure());
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    // exactly one attempt, no retry
    assert_eq!(push.sent().len(), 1);
}

#[tokio::test]
async fn test_store_failure_is_swallowed() {
    let store = Arc::new(MemoryStore {
        unavailable: true,
        ..classroom()
    });
    let push = Arc::new(RecordingPush::default());

    let outcome = dispatcher(store, push.clone())
        .dispatch(event("c1", Some("t1"), Some("Hello")))
        .await;

    assert_eq!(outcome.stage(), "store");
    assert!(push.sent().is_empty());
}

#[tokio::test]
async fn test_dispatch_outcomes_are_counted() {
    use chat_notification_service::metrics::dispatch_count;

    let before = dispatch_count("skipped", "chat");

    let store = Arc::new(classroom());
    let push = Arc::new(RecordingPush::default());
    dispatcher(store, push)
        .dispatch(event("nope", Some("t1"), Some("Hello")))
        .await;

    assert!(dispatch_count("skipped", "chat") > before);
}
