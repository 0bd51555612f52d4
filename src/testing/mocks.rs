//! Scriptable doubles for the generation and publishing seams.

use crate::error::{PipelineError, PipelineResult};
use crate::handlers::PortFactory;
use crate::llm::{GenerationError, GenerationPort};
use crate::protocol::AiResult;
use crate::queue::publisher::ResultPublisher;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Generation backend with a per-call script and an optional steady-state
/// fallback once the script runs out.
pub struct MockGenerationPort {
    script: Mutex<VecDeque<Result<String, GenerationError>>>,
    fallback: Option<Result<String, String>>,
    calls: AtomicUsize,
    prompts: Arc<Mutex<Vec<String>>>,
    timeout: Duration,
}

impl MockGenerationPort {
    /// Consume `script` one entry per call, then error
    pub fn scripted(script: Vec<Result<String, GenerationError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: None,
            calls: AtomicUsize::new(0),
            prompts: Arc::new(Mutex::new(Vec::new())),
            timeout: Duration::from_secs(60),
        }
    }

    /// Answer every call with the same text
    pub fn answering(answer: &str) -> Self {
        Self {
            fallback: Some(Ok(answer.to_string())),
            ..Self::scripted(Vec::new())
        }
    }

    /// Fail every call with a request failure
    pub fn always_failing(message: &str) -> Self {
        Self {
            fallback: Some(Err(message.to_string())),
            ..Self::scripted(Vec::new())
        }
    }

    /// Number of generation calls made so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Shared handle to the prompts seen by this port
    pub fn prompts(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.prompts)
    }
}

#[async_trait]
impl GenerationPort for MockGenerationPort {
    fn name(&self) -> &str {
        "mock"
    }

    fn call_timeout(&self) -> Duration {
        self.timeout
    }

    async fn generate_raw(
        &self,
        prompt: &str,
        _structured_hint: bool,
    ) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());

        if let Some(entry) = self.script.lock().unwrap().pop_front() {
            return entry;
        }
        match &self.fallback {
            Some(Ok(answer)) => Ok(answer.clone()),
            Some(Err(message)) => Err(GenerationError::RequestFailed(message.clone())),
            None => Err(GenerationError::InvalidResponse(
                "mock script exhausted".to_string(),
            )),
        }
    }
}

/// Port factory recording acquisitions and the per-task overrides it saw
pub struct MockPortFactory {
    port: Arc<MockGenerationPort>,
    acquisitions: Arc<AtomicUsize>,
    overrides: Arc<Mutex<Vec<Option<String>>>>,
}

impl MockPortFactory {
    pub fn answering(answer: &str) -> Self {
        Self::with_port(Arc::new(MockGenerationPort::answering(answer)))
    }

    pub fn with_port(port: Arc<MockGenerationPort>) -> Self {
        Self {
            port,
            acquisitions: Arc::new(AtomicUsize::new(0)),
            overrides: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Counter of backend acquisitions, shared so it survives the move
    /// into a handler
    pub fn port_calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.acquisitions)
    }

    /// Provider overrides passed to [`PortFactory::acquire`]
    pub fn provider_overrides(&self) -> Arc<Mutex<Vec<Option<String>>>> {
        Arc::clone(&self.overrides)
    }

    /// Prompts seen by the underlying port
    pub fn prompts(&self) -> Arc<Mutex<Vec<String>>> {
        self.port.prompts()
    }
}

#[async_trait]
impl PortFactory for MockPortFactory {
    async fn acquire(
        &self,
        provider_override: Option<&str>,
    ) -> Result<Arc<dyn GenerationPort>, GenerationError> {
        self.acquisitions.fetch_add(1, Ordering::SeqCst);
        self.overrides
            .lock()
            .unwrap()
            .push(provider_override.map(str::to_string));
        Ok(Arc::clone(&self.port) as Arc<dyn GenerationPort>)
    }
}

/// Publisher that records every emitted result instead of talking to a broker
pub struct MockPublisher {
    records: Arc<Mutex<Vec<(AiResult, Option<String>)>>>,
    failure: Option<String>,
}

impl MockPublisher {
    pub fn new() -> Self {
        Self {
            records: Arc::new(Mutex::new(Vec::new())),
            failure: None,
        }
    }

    /// Fail every publish attempt with the given message
    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::new()
        }
    }

    /// Shared handle to the recorded `(result, reply_to)` pairs
    pub fn records(&self) -> Arc<Mutex<Vec<(AiResult, Option<String>)>>> {
        Arc::clone(&self.records)
    }
}

impl Default for MockPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResultPublisher for MockPublisher {
    async fn publish(&self, result: &AiResult, reply_to: Option<&str>) -> PipelineResult<()> {
        if let Some(message) = &self.failure {
            return Err(PipelineError::publish(message.clone()));
        }
        self.records
            .lock()
            .unwrap()
            .push((result.clone(), reply_to.map(str::to_string)));
        Ok(())
    }
}
