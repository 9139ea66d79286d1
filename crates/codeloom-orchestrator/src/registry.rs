use async_trait::async_trait;
use codeloom_core::{CodeloomError, CodeloomResult};
use std::sync::Arc;

/// The single capability contract every concrete agent implements.
///
/// Search, matching, UI selection, code generation, and packaging agents
/// all plug in through this one seam; their bodies are external
/// collaborators as far as the orchestration core is concerned.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Execute the agent against one input and return its result.
    async fn execute(&self, input: &str) -> CodeloomResult<String>;
}

/// Adapts a plain closure into an [`Agent`]; handy for tests and for
/// agents with no state of their own.
pub struct FnAgent<F>
where
    F: Fn(&str) -> CodeloomResult<String> + Send + Sync,
{
    f: F,
}

impl<F> FnAgent<F>
where
    F: Fn(&str) -> CodeloomResult<String> + Send + Sync,
{
    /// Wrap a closure.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F> Agent for FnAgent<F>
where
    F: Fn(&str) -> CodeloomResult<String> + Send + Sync,
{
    async fn execute(&self, input: &str) -> CodeloomResult<String> {
        (self.f)(input)
    }
}

/// Maps agent names to executable handles, preserving registration order.
///
/// An explicit object handed to the orchestrator at construction; there is
/// no process-wide registry. Duplicate names are rejected rather than
/// overwritten.
#[derive(Default)]
pub struct AgentRegistry {
    agents: Vec<(String, Arc<dyn Agent>)>,
}

impl AgentRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an agent under a unique name.
    ///
    /// Fails with [`CodeloomError::DuplicateAgent`] when the name is taken.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        agent: Arc<dyn Agent>,
    ) -> CodeloomResult<()> {
        let name = name.into();
        if self.contains(&name) {
            return Err(CodeloomError::DuplicateAgent(name));
        }
        self.agents.push((name, agent));
        Ok(())
    }

    /// Whether an agent is registered under the given name.
    pub fn contains(&self, name: &str) -> bool {
        self.agents.iter().any(|(n, _)| n == name)
    }

    /// Look up an agent handle by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Agent>> {
        self.agents
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, a)| Arc::clone(a))
    }

    /// Registered names, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.agents.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Iterate handles in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn Agent>)> {
        self.agents.iter().map(|(n, a)| (n.as_str(), a))
    }

    /// Number of registered agents.
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}
