/// Push delivery seam between the dispatcher and FCM
use async_trait::async_trait;
use std::time::Instant;
use taska_fcm_shared::{DeviceMessage, FCMClient, FCMError};

use crate::metrics;
use crate::models::ChatNotification;

/// Sends one notification to one device token.
#[async_trait]
pub trait PushGateway: Send + Sync {
    /// Returns the provider's message id on success.
    async fn send(&self, notification: &ChatNotification) -> Result<String, FCMError>;
}

impl From<&ChatNotification> for DeviceMessage {
    fn from(notification: &ChatNotification) -> Self {
        DeviceMessage {
            token: notification.token.clone(),
            title: notification.title.clone(),
            body: notification.body.clone(),
            data: notification.data.clone(),
        }
    }
}

#[async_trait]
impl PushGateway for FCMClient {
    async fn send(&self, notification: &ChatNotification) -> Result<String, FCMError> {
        let start = Instant::now();
        let result = FCMClient::send(self, &DeviceMessage::from(notification)).await;
        metrics::observe_delivery(result.is_ok(), start.elapsed());
        result.map(|r| r.message_id)
    }
}
