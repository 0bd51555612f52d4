//! Pure retry routing policy.
//!
//! Delivery attempts are tracked in a message user property so they survive
//! a round trip through the broker. All routing decisions are pure functions
//! over that counter; the adapter only executes them.

use rumqttc::v5::mqttbytes::v5::PublishProperties;

/// User property carrying the completed delivery-attempt count
pub const RETRY_COUNT_HEADER: &str = "x-retry-count";

/// Where a failed delivery goes next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureRoute {
    /// Republish to the retry queue as attempt number `attempt`
    Retry { attempt: u32 },
    /// Attempts exhausted, park on the dead letter queue
    DeadLetter { attempt: u32 },
}

/// Read the completed attempt count from message properties.
///
/// A missing header or a garbled value both count as zero, so a malformed
/// counter restarts the retry budget instead of dead-lettering outright.
pub fn retry_count_from(properties: Option<&PublishProperties>) -> u32 {
    properties
        .map(|props| props.user_properties.as_slice())
        .unwrap_or_default()
        .iter()
        .find(|(key, _)| key == RETRY_COUNT_HEADER)
        .and_then(|(_, value)| value.trim().parse().ok())
        .unwrap_or(0)
}

/// Decide the next hop for a failed delivery.
///
/// `previous` is the attempt count the message arrived with. The failed
/// delivery becomes attempt `previous + 1`; it is retried while the new
/// count stays within `max_retries`, dead-lettered otherwise. A message
/// therefore gets exactly `max_retries` redeliveries after its first
/// failure before parking.
pub fn route_failure(previous: u32, max_retries: u32) -> FailureRoute {
    let attempt = previous.saturating_add(1);
    if attempt <= max_retries {
        FailureRoute::Retry { attempt }
    } else {
        FailureRoute::DeadLetter { attempt }
    }
}

/// Properties for a republished message: everything the producer set
/// survives the round trip, only the attempt counter is replaced
pub fn stamp_retry_properties(
    original: Option<&PublishProperties>,
    attempt: u32,
) -> PublishProperties {
    let mut props = PublishProperties::default();
    if let Some(original) = original {
        props.correlation_data = original.correlation_data.clone();
        props.content_type = original.content_type.clone();
        props.response_topic = original.response_topic.clone();
        props.user_properties = original
            .user_properties
            .iter()
            .filter(|(key, _)| key != RETRY_COUNT_HEADER)
            .cloned()
            .collect();
    }
    props
        .user_properties
        .push((RETRY_COUNT_HEADER.to_string(), attempt.to_string()));
    props
}
