//! Outbound result publishing.
//!
//! Every status update produced for a task goes through the
//! [`ResultPublisher`] seam. The MQTT implementation stamps correlation
//! data and content type onto each message so consumers can match results
//! to requests without parsing the body.

use crate::error::{PipelineError, PipelineResult};
use crate::protocol::AiResult;
use async_trait::async_trait;
use bytes::Bytes;
use rumqttc::v5::mqttbytes::v5::PublishProperties;
use rumqttc::v5::mqttbytes::QoS;
use rumqttc::v5::AsyncClient;
use tracing::debug;

/// Sink for task status updates
#[async_trait]
pub trait ResultPublisher: Send + Sync {
    /// Publish one result, honoring an optional per-task destination
    async fn publish(&self, result: &AiResult, reply_to: Option<&str>) -> PipelineResult<()>;
}

/// Publishes results to an MQTT topic at QoS 1
pub struct MqttResultPublisher {
    client: AsyncClient,
    default_topic: String,
}

impl MqttResultPublisher {
    pub fn new(client: AsyncClient, default_topic: String) -> Self {
        Self {
            client,
            default_topic,
        }
    }
}

#[async_trait]
impl ResultPublisher for MqttResultPublisher {
    async fn publish(&self, result: &AiResult, reply_to: Option<&str>) -> PipelineResult<()> {
        let topic = reply_to.unwrap_or(&self.default_topic);
        let payload = serde_json::to_vec(result)
            .map_err(|e| PipelineError::publish(format!("result serialization failed: {e}")))?;

        let props = PublishProperties {
            correlation_data: Some(Bytes::from(result.correlation_id.clone().into_bytes())),
            content_type: Some("application/json".to_string()),
            ..Default::default()
        };

        self.client
            .publish_with_properties(topic, QoS::AtLeastOnce, false, payload, props)
            .await
            .map_err(|e| PipelineError::publish(format!("broker publish to '{topic}': {e}")))?;

        debug!(
            topic,
            task_id = %result.task_id,
            status = ?result.status,
            "Published result"
        );
        Ok(())
    }
}
