/// Firestore "document created" events delivered as CloudEvents over HTTP
///
/// Binary mode carries the CloudEvent attributes in `ce-*` headers and the
/// `DocumentEventData` as the body. Structured mode wraps both in one JSON envelope.
use actix_web::{web, HttpRequest, HttpResponse, Result as ActixResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::models::{ChatMessage, MessageCreatedEvent};
use crate::services::firestore::{relative_document_path, Document};
use crate::services::NotificationDispatcher;

const STRUCTURED_CONTENT_TYPE: &str = "application/cloudevents+json";

/// Firestore documents reach 1 MiB; leave room for the event envelope.
pub const MAX_EVENT_BYTES: usize = 2 * 1024 * 1024;

/// Payload of a Firestore document event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentEventData {
    pub value: Option<Document>,
    pub old_value: Option<Document>,
}

/// Structured-mode CloudEvent envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct CloudEventEnvelope {
    #[serde(rename = "type")]
    pub event_type: Option<String>,
    pub subject: Option<String>,
    pub data: Option<DocumentEventData>,
}

/// What the receiver makes of one delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedEvent {
    MessageCreated(MessageCreatedEvent),
    Ignored(String),
}

#[derive(Debug, Serialize)]
pub struct EventAck {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Split `chats/{chatId}/messages/{messageId}` into its parameters.
pub fn parse_message_path(path: &str) -> Option<(String, String)> {
    let relative = relative_document_path(path)?;
    let parts: Vec<&str> = relative.split('/').collect();
    match parts.as_slice() {
        ["chats", chat_id, "messages", message_id]
            if !chat_id.is_empty() && !message_id.is_empty() =>
        {
            Some((chat_id.to_string(), message_id.to_string()))
        }
        _ => None,
    }
}

fn is_created_event(event_type: &str) -> bool {
    event_type.ends_with(".created")
}

/// Interpret a delivery from its CloudEvent type, subject and body.
pub fn parse_event(
    content_type: Option<&str>,
    ce_type: Option<&str>,
    ce_subject: Option<&str>,
    body: &[u8],
) -> ParsedEvent {
    let structured = content_type
        .map(|ct| ct.starts_with(STRUCTURED_CONTENT_TYPE))
        .unwrap_or(false);

    let (event_type, subject, data) = if structured {
        match serde_json::from_slice::<CloudEventEnvelope>(body) {
            Ok(envelope) => (envelope.event_type, envelope.subject, envelope.data),
            Err(e) => return ParsedEvent::Ignored(format!("unreadable CloudEvent: {}", e)),
        }
    } else {
        let data = if body.is_empty() {
            None
        } else {
            match serde_json::from_slice::<DocumentEventData>(body) {
                Ok(data) => Some(data),
                Err(e) => return ParsedEvent::Ignored(format!("unreadable event data: {}", e)),
            }
        };
        (
            ce_type.map(String::from),
            ce_subject.map(String::from),
            data,
        )
    };

    if let Some(event_type) = event_type.as_deref() {
        if !is_created_event(event_type) {
            return ParsedEvent::Ignored(format!("event type {} is not a creation", event_type));
        }
    }

    let document = data.and_then(|d| d.value);

    let path = document
        .as_ref()
        .map(|doc| doc.name.as_str())
        .filter(|name| !name.is_empty())
        .or(subject.as_deref());

    let Some((chat_id, message_id)) = path.and_then(parse_message_path) else {
        return ParsedEvent::Ignored(format!(
            "document path {} does not match chats/{{chatId}}/messages/{{messageId}}",
            path.unwrap_or("<none>")
        ));
    };

    ParsedEvent::MessageCreated(MessageCreatedEvent {
        chat_id,
        message_id,
        message: document.as_ref().map(ChatMessage::from_document),
    })
}

fn header_str<'a>(req: &'a HttpRequest, name: &str) -> Option<&'a str> {
    req.headers().get(name).and_then(|v| v.to_str().ok())
}

/// Receive a Firestore event
///
/// POST /
///
/// Always answers 200: a failed delivery would be redelivered, and dispatches are never retried.
pub async fn receive_event(
    dispatcher: web::Data<Arc<NotificationDispatcher>>,
    req: HttpRequest,
    body: web::Bytes,
) -> ActixResult<HttpResponse> {
    let parsed = parse_event(
        header_str(&req, "content-type"),
        header_str(&req, "ce-type"),
        header_str(&req, "ce-subject"),
        &body,
    );

    let ack = match parsed {
        ParsedEvent::MessageCreated(event) => {
            debug!(
                ce_id = header_str(&req, "ce-id").unwrap_or_default(),
                chat_id = %event.chat_id,
                "Received message event"
            );
            let outcome = dispatcher.dispatch(event).await;
            EventAck {
                status: if outcome.is_sent() { "sent" } else { "skipped" },
                detail: Some(outcome.stage().to_string()),
            }
        }
        ParsedEvent::Ignored(reason) => {
            warn!(reason = %reason, "⚠️ Ignoring event");
            EventAck {
                status: "ignored",
                detail: Some(reason),
            }
        }
    };

    Ok(HttpResponse::Ok().json(ack))
}

/// Register routes
pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::PayloadConfig::new(MAX_EVENT_BYTES))
        .route("/", web::post().to(receive_event));
}
