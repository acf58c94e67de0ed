/// Firestore access over the REST v1 API
///
/// Only the reads the dispatcher needs: a single document get and an equality query
/// limited to one result.
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use taska_fcm_shared::AccessTokenProvider;
use tracing::debug;

use crate::error::StoreError;
use crate::models::{Chat, DirectoryCollection, DirectoryEntry};

pub const DEFAULT_FIRESTORE_BASE_URL: &str = "https://firestore.googleapis.com/v1";
pub const DEFAULT_DATABASE: &str = "(default)";

/// Firestore typed value, as encoded by the REST API (`{"stringValue": "..."}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Value {
    NullValue(()),
    BooleanValue(bool),
    /// int64 travels as a decimal string
    IntegerValue(String),
    DoubleValue(f64),
    TimestampValue(String),
    StringValue(String),
    BytesValue(String),
    ReferenceValue(String),
    GeoPointValue(serde_json::Value),
    ArrayValue(ArrayValue),
    MapValue(MapValue),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::StringValue(s) => Some(s),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArrayValue {
    #[serde(default)]
    pub values: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MapValue {
    #[serde(default)]
    pub fields: HashMap<String, Value>,
}

/// A Firestore document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub fields: HashMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<String>,
}

impl Document {
    /// Non-empty string field; any other type counts as absent.
    pub fn string_field(&self, field: &str) -> Option<&str> {
        self.fields
            .get(field)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Path relative to the database root, e.g. `chats/c1/messages/m1`.
    pub fn relative_path(&self) -> Option<&str> {
        relative_document_path(&self.name)
    }
}

/// Strip the `projects/{p}/databases/{db}/documents/` prefix (or the `documents/`
/// subject prefix) if present.
pub fn relative_document_path(name: &str) -> Option<&str> {
    let name = name.trim_matches('/');
    let path = if name.starts_with("projects/") {
        let mut parts = name.splitn(6, '/');
        match (
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
        ) {
            (Some("projects"), Some(_), Some("databases"), Some(_), Some("documents"), rest) => {
                rest.unwrap_or_default()
            }
            _ => return None,
        }
    } else if name == "documents" {
        ""
    } else {
        name.strip_prefix("documents/").unwrap_or(name)
    };

    let path = path.trim_matches('/');
    if path.is_empty() {
        None
    } else {
        Some(path)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RunQueryResponseItem {
    document: Option<Document>,
}

/// Read access to chats and the user directories.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// `chats/{chat_id}`; `None` if the document does not exist.
    async fn get_chat(&self, chat_id: &str) -> Result<Option<Chat>, StoreError>;

    /// First entry in `collection` whose `username` equals `username`.
    async fn find_directory_entry(
        &self,
        collection: DirectoryCollection,
        username: &str,
    ) -> Result<Option<DirectoryEntry>, StoreError>;
}

/// Firestore REST client
pub struct FirestoreClient {
    documents_root: String,
    tokens: Arc<AccessTokenProvider>,
    http_client: reqwest::Client,
}

impl FirestoreClient {
    pub fn new(
        base_url: &str,
        project_id: &str,
        database: &str,
        tokens: Arc<AccessTokenProvider>,
        http_client: reqwest::Client,
    ) -> Self {
        let documents_root = format!(
            "{}/projects/{}/databases/{}/documents",
            base_url.trim_end_matches('/'),
            project_id,
            database
        );

        Self {
            documents_root,
            tokens,
            http_client,
        }
    }

    /// Base URL for a Firestore emulator listening on `host` (`host:port`).
    pub fn emulator_base_url(host: &str) -> String {
        format!("http://{}/v1", host.trim_end_matches('/'))
    }

    fn document_url(&self, segments: &[&str]) -> Result<Url, StoreError> {
        let mut url = Url::parse(&self.documents_root)
            .map_err(|e| StoreError::Decode(format!("invalid Firestore URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| StoreError::Decode("Firestore URL cannot be a base".to_string()))?
            .extend(segments);
        Ok(url)
    }

    /// Get a single document; HTTP 404 maps to `None`.
    pub async fn get_document(&self, segments: &[&str]) -> Result<Option<Document>, StoreError> {
        let url = self.document_url(segments)?;
        let access_token = self.tokens.access_token().await?;

        let response = self
            .http_client
            .get(url)
            .bearer_auth(access_token)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let doc = response
                    .json::<Document>()
                    .await
                    .map_err(|e| StoreError::Decode(e.to_string()))?;
                Ok(Some(doc))
            }
            StatusCode::NOT_FOUND => Ok(None),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(StoreError::Api(status.as_u16(), body))
            }
        }
    }

    /// Run `collection where field == value limit 1`.
    pub async fn query_first(
        &self,
        collection: &str,
        field: &str,
        value: Value,
    ) -> Result<Option<Document>, StoreError> {
        let url = format!("{}:runQuery", self.documents_root);
        let access_token = self.tokens.access_token().await?;

        let query = serde_json::json!({
            "structuredQuery": {
                "from": [{ "collectionId": collection }],
                "where": {
                    "fieldFilter": {
                        "field": { "fieldPath": field },
                        "op": "EQUAL",
                        "value": value,
                    }
                },
                "limit": 1
            }
        });

        let response = self
            .http_client
            .post(url)
            .bearer_auth(access_token)
            .json(&query)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Api(status, body));
        }

        let items = response
            .json::<Vec<RunQueryResponseItem>>()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;

        Ok(items.into_iter().find_map(|item| item.document))
    }
}

#[async_trait]
impl DocumentStore for FirestoreClient {
    async fn get_chat(&self, chat_id: &str) -> Result<Option<Chat>, StoreError> {
        let doc = self.get_document(&["chats", chat_id]).await?;
        Ok(doc.as_ref().map(Chat::from_document))
    }

    async fn find_directory_entry(
        &self,
        collection: DirectoryCollection,
        username: &str,
    ) -> Result<Option<DirectoryEntry>, StoreError> {
        let doc = self
            .query_first(
                collection.as_str(),
                "username",
                Value::StringValue(username.to_string()),
            )
            .await?;

        debug!(
            collection = %collection,
            username,
            found = doc.is_some(),
            "Directory lookup finished"
        );

        Ok(doc.as_ref().map(DirectoryEntry::from_document))
    }
}
