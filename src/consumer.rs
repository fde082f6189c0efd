//! NATS consumer for incoming prediction requests

use anyhow::Result;
use async_nats::{Client, Subscriber};
use tracing::info;

/// Consumer for receiving prediction requests from NATS
pub struct RequestConsumer {
    client: Client,
    subject: String,
    queue_group: Option<String>,
}

impl RequestConsumer {
    /// Create a new request consumer
    pub fn new(client: Client, subject: &str) -> Self {
        Self {
            client,
            subject: subject.to_string(),
            queue_group: None,
        }
    }

    /// Share the subscription with other replicas in a queue group
    pub fn with_queue_group(mut self, queue_group: Option<String>) -> Self {
        self.queue_group = queue_group;
        self
    }

    /// Subscribe to the request subject
    pub async fn subscribe(&self) -> Result<Subscriber> {
        let subscriber = match &self.queue_group {
            Some(group) => {
                self.client
                    .queue_subscribe(self.subject.clone(), group.clone())
                    .await?
            }
            None => self.client.subscribe(self.subject.clone()).await?,
        };
        info!(
            subject = %self.subject,
            queue_group = ?self.queue_group,
            "Subscribed to request subject"
        );
        Ok(subscriber)
    }

    /// Get the subject name
    pub fn subject(&self) -> &str {
        &self.subject
    }
}
