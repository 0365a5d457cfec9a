//! NATS message producer for scan outcomes and health replies

use crate::types::health::ServiceHealth;
use crate::types::scan::ScanOutcome;
use anyhow::Result;
use async_nats::{Client, Subject};
use tracing::debug;

/// Producer for publishing scan outcomes to NATS
#[derive(Clone)]
pub struct ResultProducer {
    client: Client,
    subject: String,
}

impl ResultProducer {
    /// Create a new result producer
    pub fn new(client: Client, subject: &str) -> Self {
        Self {
            client,
            subject: subject.to_string(),
        }
    }

    /// Publish an outcome to the reply subject, or to the result subject when
    /// the request did not ask for a reply
    pub async fn publish(&self, outcome: &ScanOutcome, reply: Option<Subject>) -> Result<()> {
        let payload = serde_json::to_vec(outcome)?;
        let target = reply.unwrap_or_else(|| Subject::from(self.subject.as_str()));

        self.client.publish(target.clone(), payload.into()).await?;

        debug!(
            scan_id = %outcome.scan_id,
            subject = %target,
            disease = %outcome.result.disease_key,
            success = outcome.result.success,
            "Published scan outcome"
        );

        Ok(())
    }

    /// Answer a health probe
    pub async fn reply_health(&self, reply: Subject, health: &ServiceHealth) -> Result<()> {
        let payload = serde_json::to_vec(health)?;
        self.client.publish(reply, payload.into()).await?;
        Ok(())
    }

    /// Get the subject name
    pub fn subject(&self) -> &str {
        &self.subject
    }
}
