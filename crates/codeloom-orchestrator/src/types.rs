use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

/// How a pipeline run dispatches its agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineMode {
    /// One agent at a time, in registration order.
    Sequential,
    /// All agents concurrently, outcomes joined before returning.
    FanOut,
}

/// Configuration for pipeline execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Abort remaining invocations on the first agent failure.
    #[serde(default)]
    pub fail_fast: bool,
    /// Dispatch mode.
    #[serde(default = "default_mode")]
    pub mode: PipelineMode,
    /// Bounded wait per agent invocation, in milliseconds.
    #[serde(default = "default_agent_timeout_ms")]
    pub agent_timeout_ms: u64,
}

fn default_mode() -> PipelineMode {
    PipelineMode::Sequential
}

fn default_agent_timeout_ms() -> u64 {
    30_000
}

impl PipelineConfig {
    /// The per-agent timeout as a [`Duration`].
    pub fn agent_timeout(&self) -> Duration {
        Duration::from_millis(self.agent_timeout_ms)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fail_fast: false,
            mode: default_mode(),
            agent_timeout_ms: default_agent_timeout_ms(),
        }
    }
}

/// State machine for a pipeline run.
///
/// Created → Running → {Completed, PartiallyFailed, Aborted}. Once a run is
/// terminal its [`PipelineResult`] is immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Result allocated, no agent invoked yet.
    Created,
    /// Agents executing.
    Running,
    /// Every agent succeeded.
    Completed,
    /// At least one agent failed or timed out; the rest still ran.
    PartiallyFailed,
    /// Fail-fast stopped the run; see `aborted_by`.
    Aborted,
}

impl RunStatus {
    /// Whether the run has finished.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::PartiallyFailed | RunStatus::Aborted
        )
    }
}

/// Outcome of one agent invocation within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentOutcome {
    /// The agent returned a result.
    Success {
        /// The agent's output.
        output: String,
    },
    /// The agent reported a failure; isolated to this agent.
    Failed {
        /// The wrapped failure.
        reason: String,
    },
    /// The invocation exceeded the bounded wait.
    TimedOut,
}

impl AgentOutcome {
    /// Whether this outcome counts as a success.
    pub fn is_success(&self) -> bool {
        matches!(self, AgentOutcome::Success { .. })
    }
}

/// Per-agent outcomes for a single pipeline run.
///
/// Agents never invoked (or aborted mid-flight by fail-fast) are absent
/// from `outcomes`; `aborted_by` names the agent that triggered the abort.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    /// Unique id for this run.
    pub run_id: Uuid,
    /// The input every agent received.
    pub input: String,
    /// Terminal status of the run.
    pub status: RunStatus,
    /// Outcome per agent name, for agents that ran to completion.
    pub outcomes: HashMap<String, AgentOutcome>,
    /// The agent whose failure aborted the run, when fail-fast fired.
    pub aborted_by: Option<String>,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run reached a terminal status.
    pub finished_at: Option<DateTime<Utc>>,
}

impl PipelineResult {
    /// Allocate a result for a run that has not started executing.
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            input: input.into(),
            status: RunStatus::Created,
            outcomes: HashMap::new(),
            aborted_by: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Number of agents that failed or timed out.
    pub fn failure_count(&self) -> usize {
        self.outcomes.values().filter(|o| !o.is_success()).count()
    }

    /// The successful output of a named agent, if any.
    pub fn output_of(&self, agent: &str) -> Option<&str> {
        match self.outcomes.get(agent) {
            Some(AgentOutcome::Success { output }) => Some(output),
            _ => None,
        }
    }
}
