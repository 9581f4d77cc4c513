//! Scripted collaborators for engine tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use flowsmith_types::workflow::{Capability, Template};
use serde_json::{json, Value};

use super::invoker::{
    AgentInvoker, BoxFuture, Collaborators, InvokeError, LoadError, SubWorkflowLoader, ToolInvoker,
    ToolRequest,
};

type AgentFn = dyn Fn(&Capability, &str) -> Result<String, InvokeError> + Send + Sync;
type ToolFn = dyn Fn(&ToolRequest) -> Result<Value, InvokeError> + Send + Sync;

/// Agent whose replies come from a closure. Records every call.
pub struct MockAgent {
    respond: Box<AgentFn>,
    delay: Duration,
    calls: Mutex<Vec<(Capability, String)>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockAgent {
    pub fn new<F>(respond: F) -> Self
    where
        F: Fn(&Capability, &str) -> Result<String, InvokeError> + Send + Sync + 'static,
    {
        Self {
            respond: Box::new(respond),
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Replies `"<capability>: <instruction>"`.
    pub fn echo() -> Self {
        Self::new(|cap, instruction| Ok(format!("{cap}: {instruction}")))
    }

    /// Sleep this long inside every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<(Capability, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn instructions(&self) -> Vec<String> {
        self.calls().into_iter().map(|(_, i)| i).collect()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl AgentInvoker for MockAgent {
    fn invoke<'a>(
        &'a self,
        capability: &'a Capability,
        instruction: &'a str,
    ) -> BoxFuture<'a, Result<String, InvokeError>> {
        Box::pin(async move {
            self.calls
                .lock()
                .unwrap()
                .push((capability.clone(), instruction.to_string()));
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            (self.respond)(capability, instruction)
        })
    }
}

/// Tool whose results come from a closure. Records every request and the
/// order in which calls finish.
pub struct MockTool {
    respond: Box<ToolFn>,
    delays: HashMap<String, Duration>,
    requests: Mutex<Vec<ToolRequest>>,
    finished: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockTool {
    pub fn new<F>(respond: F) -> Self
    where
        F: Fn(&ToolRequest) -> Result<Value, InvokeError> + Send + Sync + 'static,
    {
        Self {
            respond: Box::new(respond),
            delays: HashMap::new(),
            requests: Mutex::new(Vec::new()),
            finished: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Returns `{"tool": <name>, "instruction": <instruction>, "params": <params>}`.
    pub fn echo() -> Self {
        Self::new(|req| {
            Ok(json!({
                "tool": req.tool_name,
                "instruction": req.instruction,
                "params": req.params,
            }))
        })
    }

    /// Sleep this long when `tool_name` is called.
    pub fn with_delay(mut self, tool_name: &str, delay: Duration) -> Self {
        self.delays.insert(tool_name.to_string(), delay);
        self
    }

    pub fn requests(&self) -> Vec<ToolRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Tool names in the order their calls returned.
    pub fn finished(&self) -> Vec<String> {
        self.finished.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl ToolInvoker for MockTool {
    fn invoke(&self, request: ToolRequest) -> BoxFuture<'_, Result<Value, InvokeError>> {
        Box::pin(async move {
            self.requests.lock().unwrap().push(request.clone());
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            if let Some(delay) = self.delays.get(&request.tool_name) {
                tokio::time::sleep(*delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.finished.lock().unwrap().push(request.tool_name.clone());
            (self.respond)(&request)
        })
    }
}

/// Loader backed by a fixed map. Counts loads.
#[derive(Default)]
pub struct MapLoader {
    templates: HashMap<String, Arc<Template>>,
    loads: AtomicUsize,
}

impl MapLoader {
    pub fn new<I>(templates: I) -> Self
    where
        I: IntoIterator<Item = Template>,
    {
        Self {
            templates: templates
                .into_iter()
                .map(|t| (t.name.clone(), Arc::new(t)))
                .collect(),
            loads: AtomicUsize::new(0),
        }
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl SubWorkflowLoader for MapLoader {
    fn load<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<Arc<Template>, LoadError>> {
        Box::pin(async move {
            self.loads.fetch_add(1, Ordering::SeqCst);
            self.templates
                .get(name)
                .cloned()
                .ok_or_else(|| LoadError::NotFound(name.to_string()))
        })
    }
}

pub fn collaborators(
    agent: Arc<MockAgent>,
    tool: Arc<MockTool>,
    loader: Arc<MapLoader>,
) -> Collaborators {
    Collaborators::new(agent, tool, loader)
}
