use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Metrics accumulated per registered agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentStats {
    /// Total invocations, successful or not.
    pub invocations: u64,
    /// Invocations that returned a failure.
    pub failures: u64,
    /// Invocations that exceeded the bounded wait.
    pub timeouts: u64,
    /// Cumulative wall-clock time spent in this agent.
    pub total_duration_ms: u64,
}

/// Tracks invocation metrics for all agents driven by the orchestrator.
pub struct AgentMonitor {
    stats: Arc<RwLock<HashMap<String, AgentStats>>>,
}

impl AgentMonitor {
    /// Create a monitor with no recorded activity.
    pub fn new() -> Self {
        Self {
            stats: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Record a successful invocation.
    pub async fn record_success(&self, agent: &str, duration_ms: u64) {
        let mut stats = self.stats.write().await;
        let entry = stats.entry(agent.to_string()).or_default();
        entry.invocations += 1;
        entry.total_duration_ms += duration_ms;
    }

    /// Record a failed invocation.
    pub async fn record_failure(&self, agent: &str, duration_ms: u64) {
        let mut stats = self.stats.write().await;
        let entry = stats.entry(agent.to_string()).or_default();
        entry.invocations += 1;
        entry.failures += 1;
        entry.total_duration_ms += duration_ms;
    }

    /// Record a timed-out invocation.
    pub async fn record_timeout(&self, agent: &str, duration_ms: u64) {
        let mut stats = self.stats.write().await;
        let entry = stats.entry(agent.to_string()).or_default();
        entry.invocations += 1;
        entry.timeouts += 1;
        entry.total_duration_ms += duration_ms;
    }

    /// Stats for one agent, if it has been invoked.
    pub async fn get(&self, agent: &str) -> Option<AgentStats> {
        self.stats.read().await.get(agent).cloned()
    }

    /// Snapshot of all per-agent stats.
    pub async fn snapshot(&self) -> HashMap<String, AgentStats> {
        self.stats.read().await.clone()
    }

    /// Aggregate metrics across all agents.
    pub async fn aggregate(&self) -> AgentStats {
        let stats = self.stats.read().await;
        let mut total = AgentStats::default();
        for s in stats.values() {
            total.invocations += s.invocations;
            total.failures += s.failures;
            total.timeouts += s.timeouts;
            total.total_duration_ms += s.total_duration_ms;
        }
        total
    }

    /// Serialize the current state as JSON (for dashboards and logs).
    pub async fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "agents": self.snapshot().await,
            "aggregate": self.aggregate().await,
        })
    }
}

impl Default for AgentMonitor {
    fn default() -> Self {
        Self::new()
    }
}
