//! Inbound MQTT adapter.
//!
//! Owns the broker connection, the subscriptions and the delivery loop.
//! Deliveries on the main queue are processed concurrently up to a
//! configured in-flight cap; failures are republished according to the
//! routing policy in [`crate::queue::routing`]. Deliveries on the retry
//! queue are held for the configured delay and then fed back to the main
//! queue with their attempt counter intact.
//!
//! QoS 1 with broker-side acknowledgement on receipt means a delivery is
//! never redelivered by the broker itself; redelivery is always an explicit
//! republish by this adapter.

use crate::config::ServiceConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::queue::pipeline::TaskPipeline;
use crate::queue::routing::{
    retry_count_from, route_failure, stamp_retry_properties, FailureRoute,
};
use rumqttc::v5::mqttbytes::v5::{Packet, Publish};
use rumqttc::v5::mqttbytes::QoS;
use rumqttc::v5::{AsyncClient, Event, EventLoop, MqttOptions};
use rumqttc::Transport;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{watch, Semaphore};
use tracing::{debug, error, info, warn};
use url::Url;

/// Delay before re-polling after an event loop error
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(1);
/// Ceiling on waiting for in-flight tasks during shutdown
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("Invalid broker URL: {0}")]
    InvalidBrokerUrl(String),
    #[error("Subscription failed: {0}")]
    SubscriptionFailed(String),
}

/// Build broker options from config.
///
/// The client id embeds a timestamp so a restarted worker never collides
/// with its previous session on the broker.
pub fn configure_mqtt_options(config: &ServiceConfig) -> Result<MqttOptions, AdapterError> {
    let url = Url::parse(&config.mqtt.broker_url)
        .map_err(|_| AdapterError::InvalidBrokerUrl(config.mqtt.broker_url.clone()))?;

    let host = url
        .host_str()
        .ok_or_else(|| AdapterError::InvalidBrokerUrl(config.mqtt.broker_url.clone()))?;
    let port = url
        .port()
        .unwrap_or(if url.scheme() == "mqtts" { 8883 } else { 1883 });

    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let client_id = format!("{}-{timestamp}", config.service.id);
    let mut options = MqttOptions::new(client_id, host, port);

    if url.scheme() == "mqtts" {
        options.set_transport(Transport::tls_with_default_config());
    }

    if let Some(username) = config.mqtt_username() {
        options.set_credentials(&username, &config.mqtt_password().unwrap_or_default());
    }

    options.set_keep_alive(Duration::from_secs(60));
    // Large LLM payloads; the rumqttc default of 10KB is far too small
    options.set_max_packet_size(Some(256 * 1024));

    Ok(options)
}

/// Consumes task deliveries and drives them through the pipeline
pub struct ChannelAdapter {
    client: AsyncClient,
    event_loop: EventLoop,
    pipeline: Arc<TaskPipeline>,
    config: ServiceConfig,
    in_flight: Arc<Semaphore>,
}

impl ChannelAdapter {
    /// Create the adapter and its broker connection handles.
    ///
    /// Returns the adapter together with the `AsyncClient` so the caller
    /// can hand the same connection to the result publisher.
    pub fn new(
        config: ServiceConfig,
        pipeline: TaskPipeline,
        client: AsyncClient,
        event_loop: EventLoop,
    ) -> Self {
        let in_flight = Arc::new(Semaphore::new(config.queues.max_in_flight));
        Self {
            client,
            event_loop,
            pipeline: Arc::new(pipeline),
            config,
            in_flight,
        }
    }

    /// Run the delivery loop until the shutdown signal flips.
    ///
    /// On shutdown, stops accepting new deliveries and waits for in-flight
    /// tasks to finish, bounded by [`DRAIN_TIMEOUT`].
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> PipelineResult<()> {
        info!(
            main = %self.config.queues.main,
            retry = %self.config.queues.retry,
            dead_letter = %self.config.queues.dead_letter,
            max_in_flight = self.config.queues.max_in_flight,
            "Starting task consumer"
        );

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Shutdown signal received, draining in-flight tasks");
                        break;
                    }
                }
                event = self.event_loop.poll() => {
                    match event {
                        Ok(Event::Incoming(Packet::ConnAck(_))) => {
                            self.subscribe_queues().await?;
                        }
                        Ok(Event::Incoming(Packet::Publish(publish))) => {
                            self.handle_delivery(publish, &shutdown).await;
                        }
                        Ok(_) => {}
                        Err(err) => {
                            error!(error = %err, "Broker connection error, backing off");
                            tokio::time::sleep(POLL_ERROR_BACKOFF).await;
                        }
                    }
                }
            }
        }

        self.drain().await;
        Ok(())
    }

    async fn subscribe_queues(&self) -> PipelineResult<()> {
        for topic in [&self.config.queues.main, &self.config.queues.retry] {
            self.client
                .subscribe(topic, QoS::AtLeastOnce)
                .await
                .map_err(|e| {
                    PipelineError::Transport(Box::new(AdapterError::SubscriptionFailed(
                        format!("{topic}: {e}"),
                    )))
                })?;
            info!(topic, "Subscribed");
        }
        Ok(())
    }

    async fn handle_delivery(&self, publish: Publish, shutdown: &watch::Receiver<bool>) {
        let topic = String::from_utf8_lossy(&publish.topic).into_owned();

        if topic == self.config.queues.retry {
            let _hold = self.hold_and_requeue(publish, shutdown.clone());
        } else if topic == self.config.queues.main {
            self.process_concurrently(publish).await;
        } else {
            debug!(topic, "Ignoring delivery on unexpected topic");
        }
    }

    /// Retry-queue delivery: hold for the configured delay, then feed it
    /// back to the main queue unchanged, attempt counter included.
    ///
    /// The message was acknowledged at receipt, so this task is the only
    /// copy left. It holds an in-flight permit so [`Self::drain`] waits for
    /// the republish, and a shutdown cuts the hold short instead of
    /// dropping the message.
    fn hold_and_requeue(
        &self,
        publish: Publish,
        mut shutdown: watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        let client = self.client.clone();
        let main_topic = self.config.queues.main.clone();
        let delay = Duration::from_millis(self.config.queues.retry_delay_ms);
        let in_flight = Arc::clone(&self.in_flight);

        tokio::spawn(async move {
            let _permit = match in_flight.acquire_owned().await {
                Ok(permit) => permit,
                // Semaphore is never closed while the adapter is running
                Err(_) => return,
            };

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.wait_for(|stopping| *stopping) => {
                    debug!("Shutdown during retry hold, redelivering immediately");
                }
            }

            let props = publish.properties.clone().unwrap_or_default();
            let attempt = retry_count_from(publish.properties.as_ref());
            debug!(attempt, "Redelivering held message to main queue");

            if let Err(err) = client
                .publish_with_properties(
                    &main_topic,
                    QoS::AtLeastOnce,
                    false,
                    publish.payload.clone(),
                    props,
                )
                .await
            {
                error!(error = %err, "Failed to redeliver held message");
            }
        })
    }

    /// Main-queue delivery: process under the in-flight cap; on failure,
    /// republish to the retry or dead letter queue.
    ///
    /// The permit is acquired inside the spawned task so a saturated worker
    /// keeps polling the event loop and the broker keep-alive stays healthy.
    async fn process_concurrently(&self, publish: Publish) {
        let in_flight = Arc::clone(&self.in_flight);
        let pipeline = Arc::clone(&self.pipeline);
        let client = self.client.clone();
        let retry_topic = self.config.queues.retry.clone();
        let dlq_topic = self.config.queues.dead_letter.clone();
        let max_retries = self.config.queues.max_retries;

        tokio::spawn(async move {
            let _permit = match in_flight.acquire_owned().await {
                Ok(permit) => permit,
                // Semaphore is never closed while the adapter is running
                Err(_) => return,
            };

            if let Err(err) = pipeline.process(&publish.payload).await {
                let previous = retry_count_from(publish.properties.as_ref());
                let route = route_failure(previous, max_retries);
                route_delivery(
                    &client,
                    &retry_topic,
                    &dlq_topic,
                    &publish,
                    route,
                    &err,
                )
                .await;
            }
        });
    }

    /// Wait for in-flight tasks, bounded
    async fn drain(&self) {
        let slots = self.config.queues.max_in_flight as u32;
        match tokio::time::timeout(DRAIN_TIMEOUT, self.in_flight.acquire_many(slots)).await {
            Ok(Ok(_)) => info!("All in-flight tasks drained"),
            Ok(Err(_)) => {}
            Err(_) => warn!(
                timeout_secs = DRAIN_TIMEOUT.as_secs(),
                "Drain timed out with tasks still in flight"
            ),
        }
    }
}

/// Execute a routing decision for a failed delivery
async fn route_delivery(
    client: &AsyncClient,
    retry_topic: &str,
    dlq_topic: &str,
    publish: &Publish,
    route: FailureRoute,
    cause: &PipelineError,
) {
    let (topic, attempt): (&str, u32) = match route {
        FailureRoute::Retry { attempt } => {
            warn!(attempt, error = %cause, "Routing failed delivery to retry queue");
            (retry_topic, attempt)
        }
        FailureRoute::DeadLetter { attempt } => {
            error!(attempt, error = %cause, "Retries exhausted, dead-lettering delivery");
            (dlq_topic, attempt)
        }
    };

    let props = stamp_retry_properties(publish.properties.as_ref(), attempt);
    if let Err(err) = client
        .publish_with_properties(topic, QoS::AtLeastOnce, false, publish.payload.clone(), props)
        .await
    {
        // The delivery is already acknowledged; losing this republish
        // loses the message, which is why it is logged at error level.
        error!(topic, error = %err, "Failed to republish failed delivery");
    }
}
