/// Taska FCM Shared Library
///
/// Firebase Cloud Messaging (FCM) client and Google OAuth2 access tokens
/// for the Taska Zurah backend.
///
/// It handles:
/// - OAuth2 token generation from service accounts or the metadata server
/// - Token caching with automatic refresh
/// - Single-device message delivery over the FCM HTTP v1 API

pub mod auth;
pub mod client;
pub mod errors;
pub mod models;

pub use auth::{AccessTokenProvider, TokenSource};
pub use client::FCMClient;
pub use errors::FCMError;
pub use models::{DeviceMessage, FCMSendResult, ServiceAccountKey};
