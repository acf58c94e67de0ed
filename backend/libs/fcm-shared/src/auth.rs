use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::errors::FCMError;
use crate::models::*;

/// OAuth2 scope granting access to Firestore and FCM.
pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

/// Default GCE / Cloud Run metadata endpoint for the attached service account.
pub const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Cached tokens are refreshed once they have less than this many seconds left.
const REFRESH_MARGIN_SECS: i64 = 60;

/// Where access tokens come from.
#[derive(Debug, Clone)]
pub enum TokenSource {
    /// Self-signed JWT exchanged at the key's `token_uri`.
    ServiceAccount(Arc<ServiceAccountKey>),
    /// The metadata server of the runtime environment.
    MetadataServer { endpoint: String },
    /// A fixed bearer token (emulators, tests).
    Static(String),
}

/// Google OAuth2 access token provider with caching.
///
/// Shared by every Google API client in the process. The cache lock is never held
/// across an await point.
pub struct AccessTokenProvider {
    source: TokenSource,
    token_cache: Mutex<Option<TokenCache>>,
    http_client: reqwest::Client,
}

impl AccessTokenProvider {
    pub fn new(source: TokenSource, http_client: reqwest::Client) -> Self {
        Self {
            source,
            token_cache: Mutex::new(None),
            http_client,
        }
    }

    pub fn service_account(credentials: ServiceAccountKey, http_client: reqwest::Client) -> Self {
        Self::new(TokenSource::ServiceAccount(Arc::new(credentials)), http_client)
    }

    pub fn metadata_server(http_client: reqwest::Client) -> Self {
        Self::new(
            TokenSource::MetadataServer {
                endpoint: METADATA_TOKEN_URL.to_string(),
            },
            http_client,
        )
    }

    pub fn fixed(token: impl Into<String>) -> Self {
        Self::new(TokenSource::Static(token.into()), reqwest::Client::new())
    }

    /// Get a bearer token, reusing the cached one while it stays valid.
    pub async fn access_token(&self) -> Result<String, FCMError> {
        if let Some(token) = self.cached_token() {
            return Ok(token);
        }

        let response = match &self.source {
            TokenSource::ServiceAccount(credentials) => {
                self.exchange_service_account_jwt(credentials).await?
            }
            TokenSource::MetadataServer { endpoint } => self.fetch_metadata_token(endpoint).await?,
            TokenSource::Static(token) => return Ok(token.clone()),
        };

        let expires_at = Utc::now().timestamp() + response.expires_in;
        debug!(expires_in = response.expires_in, "Refreshed Google access token");

        let mut cache = self
            .token_cache
            .lock()
            .map_err(|_| FCMError::TokenError("token cache lock poisoned".to_string()))?;
        *cache = Some(TokenCache {
            access_token: response.access_token.clone(),
            expires_at,
        });

        Ok(response.access_token)
    }

    fn cached_token(&self) -> Option<String> {
        let cache = self.token_cache.lock().ok()?;
        let cached = cache.as_ref()?;
        if cached.expires_at > Utc::now().timestamp() + REFRESH_MARGIN_SECS {
            Some(cached.access_token.clone())
        } else {
            None
        }
    }

    async fn exchange_service_account_jwt(
        &self,
        credentials: &ServiceAccountKey,
    ) -> Result<GoogleTokenResponse, FCMError> {
        let now = Utc::now();
        let claims = JwtClaims {
            iss: credentials.client_email.clone(),
            sub: credentials.client_email.clone(),
            scope: CLOUD_PLATFORM_SCOPE.to_string(),
            aud: credentials.token_uri.clone(),
            exp: (now + Duration::hours(1)).timestamp(),
            iat: now.timestamp(),
        };

        let encoding_key = EncodingKey::from_rsa_pem(credentials.private_key.as_bytes())
            .map_err(|e| FCMError::KeyParseError(e.to_string()))?;

        let mut header = Header::new(Algorithm::RS256);
        if !credentials.private_key_id.is_empty() {
            header.kid = Some(credentials.private_key_id.clone());
        }

        let assertion = encode(&header, &claims, &encoding_key)
            .map_err(|e| FCMError::JwtEncodeError(e.to_string()))?;

        let params = [
            ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
            ("assertion", assertion.as_str()),
        ];

        let response = self
            .http_client
            .post(&credentials.token_uri)
            .form(&params)
            .send()
            .await
            .map_err(|e| FCMError::TokenError(e.to_string()))?;

        Self::parse_token_response(response).await
    }

    async fn fetch_metadata_token(&self, endpoint: &str) -> Result<GoogleTokenResponse, FCMError> {
        let response = self
            .http_client
            .get(endpoint)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| FCMError::TokenError(e.to_string()))?;

        Self::parse_token_response(response).await
    }

    async fn parse_token_response(
        response: reqwest::Response,
    ) -> Result<GoogleTokenResponse, FCMError> {
        if !response.status().is_success() {
            return Err(FCMError::TokenRequestFailed(response.status().to_string()));
        }

        response
            .json()
            .await
            .map_err(|e| FCMError::TokenParseError(e.to_string()))
    }
}
