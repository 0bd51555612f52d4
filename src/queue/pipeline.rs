//! Per-message processing pipeline.
//!
//! One delivery flows through here: decode the task envelope, announce
//! PROCESSING, dispatch to the handler, publish the terminal result. The
//! error contract matters: a handler failure publishes an ERROR result for
//! the producer AND still returns `Err` so the adapter routes the delivery
//! through the retry policy. Only the broker-side outcome decides whether
//! the message is done.

use crate::error::{PipelineError, PipelineResult};
use crate::handlers::Dispatcher;
use crate::protocol::{AiResult, AiTask};
use crate::queue::publisher::ResultPublisher;
use std::sync::Arc;
use tracing::{error, info};

pub struct TaskPipeline {
    dispatcher: Dispatcher,
    publisher: Arc<dyn ResultPublisher>,
}

impl TaskPipeline {
    pub fn new(dispatcher: Dispatcher, publisher: Arc<dyn ResultPublisher>) -> Self {
        Self {
            dispatcher,
            publisher,
        }
    }

    /// Process one raw delivery end to end.
    ///
    /// `Err` means the delivery failed and should be routed by the caller;
    /// a terminal ERROR result may already have been published for it.
    pub async fn process(&self, body: &[u8]) -> PipelineResult<()> {
        let task: AiTask = serde_json::from_slice(body)
            .map_err(|e| PipelineError::parse(format!("invalid task envelope: {e}")))?;

        info!(
            task_id = %task.task_id,
            correlation_id = %task.correlation_id,
            kind = task.kind.as_str(),
            "Processing task"
        );

        // Announce intake before any work; a producer that sees PROCESSING
        // knows the task reached a live worker.
        self.publisher
            .publish(&AiResult::processing(&task), task.reply_to.as_deref())
            .await?;

        match self.dispatcher.dispatch(&task.kind, &task.payload).await {
            Ok(result) => {
                let update = AiResult::success(&task, result);
                self.publisher
                    .publish(&update, task.reply_to.as_deref())
                    .await?;
                info!(task_id = %task.task_id, status = ?update.status, "Task completed");
                Ok(())
            }
            Err(err) => {
                error!(
                    task_id = %task.task_id,
                    kind = task.kind.as_str(),
                    error = %err,
                    "Task failed"
                );
                // Best effort: the producer gets an ERROR result even though
                // the delivery continues through the retry policy.
                if let Err(publish_err) = self
                    .publisher
                    .publish(&AiResult::failure(&task, &err), task.reply_to.as_deref())
                    .await
                {
                    error!(
                        task_id = %task.task_id,
                        error = %publish_err,
                        "Failed to publish error result"
                    );
                }
                Err(err)
            }
        }
    }
}
