//! NATS message consumer for incoming scan images

use anyhow::Result;
use async_nats::{Client, HeaderMap, Subscriber};
use tracing::info;

/// Header carrying the caller's scan identifier
pub const SCAN_ID_HEADER: &str = "Scan-Id";

/// Consumer for receiving scan images from NATS
pub struct ScanConsumer {
    client: Client,
    subject: String,
}

impl ScanConsumer {
    /// Create a new scan consumer
    pub fn new(client: Client, subject: &str) -> Self {
        Self {
            client,
            subject: subject.to_string(),
        }
    }

    /// Subscribe to the scan subject
    pub async fn subscribe(&self) -> Result<Subscriber> {
        let subscriber = self.client.subscribe(self.subject.clone()).await?;
        info!(subject = %self.subject, "Subscribed to scan subject");
        Ok(subscriber)
    }

    /// Get the subject name
    pub fn subject(&self) -> &str {
        &self.subject
    }
}

/// Scan id from the message headers, if the sender provided one
pub fn scan_id(headers: Option<&HeaderMap>) -> Option<String> {
    headers
        .and_then(|headers| headers.get(SCAN_ID_HEADER))
        .map(|value| value.as_str().trim().to_string())
        .filter(|id| !id.is_empty())
}
