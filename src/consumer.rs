//! Order intake from NATS.
//!
//! Replicas of the service can share the order subject through a queue
//! group, in which case each order reaches exactly one of them.

use crate::config::NatsConfig;
use anyhow::{Context, Result};
use async_nats::{Client, Subscriber};
use tracing::info;

/// Where order requests are read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderIntake {
    pub subject: String,
    pub queue_group: Option<String>,
}

impl OrderIntake {
    pub fn from_config(nats: &NatsConfig) -> Self {
        Self {
            subject: nats.orders_subject.clone(),
            queue_group: nats
                .queue_group
                .as_deref()
                .map(str::trim)
                .filter(|group| !group.is_empty())
                .map(str::to_string),
        }
    }

    /// Whether orders are load-balanced across replicas
    pub fn is_shared(&self) -> bool {
        self.queue_group.is_some()
    }
}

/// Subscribes the service to incoming order requests
pub struct OrderConsumer {
    client: Client,
    intake: OrderIntake,
}

impl OrderConsumer {
    pub fn new(client: Client, intake: OrderIntake) -> Self {
        Self { client, intake }
    }

    /// Start receiving orders, joining the queue group when one is configured
    pub async fn subscribe(&self) -> Result<Subscriber> {
        let subject = self.intake.subject.clone();
        let subscriber = match &self.intake.queue_group {
            Some(group) => self
                .client
                .queue_subscribe(subject, group.clone())
                .await
                .with_context(|| {
                    format!(
                        "Failed to join queue group '{}' on {}",
                        group, self.intake.subject
                    )
                })?,
            None => self
                .client
                .subscribe(subject)
                .await
                .with_context(|| format!("Failed to subscribe to {}", self.intake.subject))?,
        };

        info!(
            subject = %self.intake.subject,
            queue_group = self.intake.queue_group.as_deref().unwrap_or("-"),
            "Listening for order requests"
        );
        Ok(subscriber)
    }

    pub fn intake(&self) -> &OrderIntake {
        &self.intake
    }
}
