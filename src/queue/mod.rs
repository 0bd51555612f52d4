//! Queue transport: intake, retry routing and result publishing.
//!
//! The split mirrors the failure model. `routing` is the pure retry policy,
//! `pipeline` is the per-message flow, `consumer` executes both against the
//! broker, and `publisher` is the outbound seam the pipeline emits through.

pub mod consumer;
pub mod pipeline;
pub mod publisher;
pub mod routing;

pub use consumer::{configure_mqtt_options, ChannelAdapter};
pub use pipeline::TaskPipeline;
pub use publisher::{MqttResultPublisher, ResultPublisher};
