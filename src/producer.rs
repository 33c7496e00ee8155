//! NATS message producer for delivery estimates

use crate::types::estimate::EstimateReply;
use anyhow::Result;
use async_nats::{Client, Subject};
use tracing::debug;

/// Producer for publishing estimate replies to NATS
#[derive(Clone)]
pub struct EstimateProducer {
    client: Client,
    subject: String,
}

impl EstimateProducer {
    /// Create a new estimate producer
    pub fn new(client: Client, subject: &str) -> Self {
        Self {
            client,
            subject: subject.to_string(),
        }
    }

    /// Publish a reply on the estimates subject and, when the request
    /// carried one, on its reply subject
    pub async fn publish(&self, reply: &EstimateReply, reply_to: Option<Subject>) -> Result<()> {
        let payload = serde_json::to_vec(reply)?;

        if let Some(reply_to) = reply_to {
            self.client.publish(reply_to, payload.clone().into()).await?;
        }

        self.client
            .publish(self.subject.clone(), payload.into())
            .await?;

        debug!(
            order_id = reply.order_id().unwrap_or("-"),
            ok = reply.is_ok(),
            "Published estimate reply"
        );

        Ok(())
    }

    /// Get the subject name
    pub fn subject(&self) -> &str {
        &self.subject
    }
}
