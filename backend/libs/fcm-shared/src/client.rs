use std::sync::Arc;
use tracing::debug;

use crate::auth::AccessTokenProvider;
use crate::errors::FCMError;
use crate::models::*;

pub const DEFAULT_FCM_BASE_URL: &str = "https://fcm.googleapis.com";

/// Firebase Cloud Messaging Client
///
/// Sends notifications through the FCM HTTP v1 API. Access tokens come from a shared
/// [`AccessTokenProvider`], so the same credentials can also back other Google API clients.
pub struct FCMClient {
    pub project_id: String,
    base_url: String,
    tokens: Arc<AccessTokenProvider>,
    http_client: reqwest::Client,
}

impl FCMClient {
    /// Create new FCM client
    ///
    /// # Arguments
    /// * `project_id` - Firebase project ID
    /// * `tokens` - OAuth2 access token provider
    /// * `http_client` - shared HTTP client (timeouts are configured there)
    pub fn new(
        project_id: String,
        tokens: Arc<AccessTokenProvider>,
        http_client: reqwest::Client,
    ) -> Self {
        Self {
            project_id,
            base_url: DEFAULT_FCM_BASE_URL.to_string(),
            tokens,
            http_client,
        }
    }

    /// Point the client at a different endpoint (proxy or mock server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn send_url(&self) -> String {
        format!(
            "{}/v1/projects/{}/messages:send",
            self.base_url, self.project_id
        )
    }

    /// Send notification via FCM to a single device
    pub async fn send(&self, message: &DeviceMessage) -> Result<FCMSendResult, FCMError> {
        if !Self::validate_token(&message.token) {
            return Err(FCMError::InvalidToken);
        }

        let access_token = self.tokens.access_token().await?;

        let response = self
            .http_client
            .post(self.send_url())
            .bearer_auth(access_token)
            .json(&FcmMessage::from(message))
            .send()
            .await
            .map_err(|e| FCMError::SendRequestError(e.to_string()))?;

        match response.status() {
            reqwest::StatusCode::OK => {
                let fcm_response: FcmApiResponse = response
                    .json()
                    .await
                    .map_err(|e| FCMError::ResponseParseError(e.to_string()))?;

                let message_id = fcm_response.name.unwrap_or_default();
                debug!(message_id = %message_id, "FCM accepted message");

                Ok(FCMSendResult { message_id })
            }
            status => {
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());

                Err(FCMError::ApiError(status.as_u16(), error_text))
            }
        }
    }

    /// Validate device token format
    pub fn validate_token(device_token: &str) -> bool {
        // FCM tokens are typically 100-200 characters
        !device_token.trim().is_empty() && device_token.len() <= 4096
    }
}
