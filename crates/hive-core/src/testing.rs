//! Test backends and helpers

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::agents::AgentBuilder;
use crate::config::LocalConfig;
use crate::llm::{Backend, ModelRequest, ModelTurn, ToolCall};
use crate::{Error, Result};

pub(crate) fn final_answer(text: &str) -> ModelTurn {
    ModelTurn::Final(text.to_string())
}

pub(crate) fn tool_call(name: &str, input: serde_json::Value) -> ModelTurn {
    ModelTurn::ToolCall(ToolCall::new(name, input))
}

/// Builder for a local-backend agent rooted at `root`
pub(crate) fn agent_builder<B: Backend + 'static>(
    name: impl Into<String>,
    root: &Path,
    backend: Arc<B>,
) -> AgentBuilder {
    AgentBuilder::new(name)
        .local(LocalConfig::new("test-model"))
        .output_root(root)
        .backend(backend)
}

/// Plays back a fixed sequence of turns and records every request
pub(crate) struct ScriptedBackend {
    script: Mutex<VecDeque<Result<ModelTurn>>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedBackend {
    pub(crate) fn new(turns: impl IntoIterator<Item = ModelTurn>) -> Arc<Self> {
        Self::from_results(turns.into_iter().map(Ok))
    }

    pub(crate) fn from_results(results: impl IntoIterator<Item = Result<ModelTurn>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(results.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// A backend that fails on first use
    pub(crate) fn empty() -> Arc<Self> {
        Self::new([])
    }

    pub(crate) fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().clone()
    }

    pub(crate) fn calls(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    async fn complete(&self, request: ModelRequest) -> Result<ModelTurn> {
        self.requests.lock().push(request);
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(Error::Backend("script exhausted".to_string())))
    }
}

/// Tracks how many gauged backend calls run at once
#[derive(Default)]
pub(crate) struct ConcurrencyGauge {
    current: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

impl ConcurrencyGauge {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn enter(self: &Arc<Self>) -> GaugeGuard {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        GaugeGuard(Arc::clone(self))
    }
}

struct GaugeGuard(Arc<ConcurrencyGauge>);

impl Drop for GaugeGuard {
    fn drop(&mut self) {
        self.0.current.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Clone, Copy)]
enum GaugedBehavior {
    Answer,
    Fail,
    Panic,
}

/// Sleeps briefly inside the gauge, then answers, fails or panics
pub(crate) struct GaugedBackend {
    gauge: Arc<ConcurrencyGauge>,
    behavior: GaugedBehavior,
}

impl GaugedBackend {
    pub(crate) fn answering(gauge: Arc<ConcurrencyGauge>) -> Arc<Self> {
        Arc::new(Self {
            gauge,
            behavior: GaugedBehavior::Answer,
        })
    }

    pub(crate) fn failing(gauge: Arc<ConcurrencyGauge>) -> Arc<Self> {
        Arc::new(Self {
            gauge,
            behavior: GaugedBehavior::Fail,
        })
    }

    pub(crate) fn panicking(gauge: Arc<ConcurrencyGauge>) -> Arc<Self> {
        Arc::new(Self {
            gauge,
            behavior: GaugedBehavior::Panic,
        })
    }
}

#[async_trait]
impl Backend for GaugedBackend {
    async fn complete(&self, request: ModelRequest) -> Result<ModelTurn> {
        let _guard = self.gauge.enter();
        tokio::time::sleep(Duration::from_millis(20)).await;
        match self.behavior {
            GaugedBehavior::Answer => Ok(ModelTurn::Final(format!("{} done", request.agent))),
            GaugedBehavior::Fail => Err(Error::Backend("scripted failure".to_string())),
            GaugedBehavior::Panic => panic!("scripted panic in {}", request.agent),
        }
    }
}
