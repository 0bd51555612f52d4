//! Liveness probe handler.

use crate::error::PipelineResult;
use crate::handlers::TaskHandler;
use async_trait::async_trait;
use serde_json::{json, Value};

/// Answers `PING` with a fixed pong payload, no backend involved
pub struct PingHandler;

#[async_trait]
impl TaskHandler for PingHandler {
    async fn handle(&self, _payload: &Value) -> PipelineResult<Value> {
        Ok(json!({ "pong": true }))
    }
}
