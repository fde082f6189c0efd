//! NATS publisher for prediction responses

use crate::types::message::RetentionResponse;
use anyhow::Result;
use async_nats::{Client, Subject};
use tracing::debug;

/// Publishes responses on the reply subject of each request
#[derive(Clone)]
pub struct ResponsePublisher {
    client: Client,
}

impl ResponsePublisher {
    /// Create a new response publisher
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Publish a response to the requester
    pub async fn reply(&self, reply_to: Subject, response: &RetentionResponse) -> Result<()> {
        let payload = serde_json::to_vec(response)?;

        self.client.publish(reply_to, payload.into()).await?;

        debug!(
            request_id = %response.request_id,
            success = response.is_success(),
            "Published response"
        );

        Ok(())
    }
}
