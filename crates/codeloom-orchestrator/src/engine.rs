use crate::monitor::AgentMonitor;
use crate::registry::{Agent, AgentRegistry};
use crate::types::{AgentOutcome, PipelineConfig, PipelineMode, PipelineResult, RunStatus};
use chrono::Utc;
use codeloom_core::{CodeloomError, CodeloomResult};
use codeloom_queue::{QueueConfig, WorkQueue};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// The pipeline orchestration engine.
///
/// Owns the agent registry, drives registered agents over each input in
/// registration order (or fanned out), and is the primary client of the
/// work queue for asynchronous work distribution. Every agent failure is
/// isolated to its own outcome unless fail-fast is configured.
pub struct Orchestrator {
    registry: AgentRegistry,
    config: PipelineConfig,
    queue: Arc<RwLock<WorkQueue>>,
    monitor: Arc<AgentMonitor>,
}

impl Orchestrator {
    /// Create an orchestrator over a registry with default configuration.
    pub fn new(registry: AgentRegistry) -> Self {
        Self {
            registry,
            config: PipelineConfig::default(),
            queue: Arc::new(RwLock::new(WorkQueue::default())),
            monitor: Arc::new(AgentMonitor::new()),
        }
    }

    /// Replace the pipeline configuration.
    pub fn with_pipeline_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the work queue configuration.
    pub fn with_queue_config(mut self, config: QueueConfig) -> Self {
        self.queue = Arc::new(RwLock::new(WorkQueue::new(config)));
        self
    }

    /// The shared work queue (snapshot it for backups through here).
    pub fn queue(&self) -> &Arc<RwLock<WorkQueue>> {
        &self.queue
    }

    /// Invocation metrics for all agents.
    pub fn monitor(&self) -> &Arc<AgentMonitor> {
        &self.monitor
    }

    /// The registered agents.
    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    /// Enqueue a unit of work for later pipeline processing.
    pub async fn submit(&self, payload: impl Into<String>) -> CodeloomResult<u64> {
        let id = self.queue.write().await.enqueue(payload)?;
        info!(id, "work item submitted");
        Ok(id)
    }

    /// Run the pipeline over one input.
    ///
    /// Always returns a [`PipelineResult`]; agent failures and timeouts are
    /// captured per-agent, and a fail-fast abort is expressed through
    /// [`RunStatus::Aborted`] plus `aborted_by` rather than an `Err`.
    pub async fn run_pipeline(&self, input: &str) -> PipelineResult {
        let mut result = PipelineResult::new(input);
        info!(
            run_id = %result.run_id,
            agents = self.registry.len(),
            mode = ?self.config.mode,
            "pipeline starting"
        );
        result.status = RunStatus::Running;

        match self.config.mode {
            PipelineMode::Sequential => self.run_sequential(&mut result).await,
            PipelineMode::FanOut => self.run_fan_out(&mut result).await,
        }

        result.status = if result.aborted_by.is_some() {
            RunStatus::Aborted
        } else if result.failure_count() > 0 {
            RunStatus::PartiallyFailed
        } else {
            RunStatus::Completed
        };
        result.finished_at = Some(Utc::now());

        info!(run_id = %result.run_id, status = ?result.status, "pipeline finished");
        result
    }

    /// Dequeue one work item, run the pipeline over its payload, and ack it
    /// on completion (nack otherwise, flowing into the queue's retry policy).
    ///
    /// Returns `Ok(None)` when nothing is pending.
    pub async fn process_next(&self) -> CodeloomResult<Option<(u64, PipelineResult)>> {
        let item = { self.queue.write().await.dequeue() };
        let Some(item) = item else {
            return Ok(None);
        };

        let result = self.run_pipeline(&item.payload).await;

        {
            let mut queue = self.queue.write().await;
            if result.status == RunStatus::Completed {
                queue.ack(item.id)?;
            } else {
                let status = queue.nack(item.id)?;
                warn!(id = item.id, status = %status, "pipeline run unsuccessful, item nacked");
            }
        }

        Ok(Some((item.id, result)))
    }

    /// Process queued work until nothing is pending.
    ///
    /// Terminates even when pipelines keep failing: nacked items exhaust the
    /// queue's retry limit and settle as Failed.
    pub async fn drain(&self) -> CodeloomResult<Vec<(u64, PipelineResult)>> {
        let mut results = Vec::new();
        while let Some(entry) = self.process_next().await? {
            results.push(entry);
        }
        Ok(results)
    }

    async fn run_sequential(&self, result: &mut PipelineResult) {
        for (name, agent) in self.registry.iter() {
            let (name, outcome) = Self::run_agent(
                name.to_string(),
                Arc::clone(agent),
                result.input.clone(),
                self.config.agent_timeout(),
                Arc::clone(&self.monitor),
            )
            .await;

            let failed = !outcome.is_success();
            result.outcomes.insert(name.clone(), outcome);
            if failed && self.config.fail_fast {
                result.aborted_by = Some(name);
                break;
            }
        }
    }

    async fn run_fan_out(&self, result: &mut PipelineResult) {
        let mut set = JoinSet::new();
        for (name, agent) in self.registry.iter() {
            set.spawn(Self::run_agent(
                name.to_string(),
                Arc::clone(agent),
                result.input.clone(),
                self.config.agent_timeout(),
                Arc::clone(&self.monitor),
            ));
        }

        while let Some(joined) = set.join_next().await {
            // Invocations cancelled by a fail-fast abort contribute nothing.
            let Ok((name, outcome)) = joined else {
                continue;
            };
            let failed = !outcome.is_success();
            result.outcomes.insert(name.clone(), outcome);
            if failed && self.config.fail_fast && result.aborted_by.is_none() {
                result.aborted_by = Some(name);
                set.abort_all();
            }
        }
    }

    /// Invoke one agent under the bounded wait and record its metrics.
    async fn run_agent(
        name: String,
        agent: Arc<dyn Agent>,
        input: String,
        timeout: Duration,
        monitor: Arc<AgentMonitor>,
    ) -> (String, AgentOutcome) {
        let start = Instant::now();
        let invoked = match tokio::time::timeout(timeout, agent.execute(&input)).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(CodeloomError::AgentFailure {
                agent: name.clone(),
                reason: e.to_string(),
            }),
            Err(_) => Err(CodeloomError::AgentTimeout {
                agent: name.clone(),
                timeout_ms: timeout.as_millis() as u64,
            }),
        };
        let elapsed = start.elapsed().as_millis() as u64;

        let outcome = match invoked {
            Ok(output) => {
                monitor.record_success(&name, elapsed).await;
                AgentOutcome::Success { output }
            }
            Err(err @ CodeloomError::AgentTimeout { .. }) => {
                warn!(agent = %name, error = %err, "agent timed out");
                monitor.record_timeout(&name, elapsed).await;
                AgentOutcome::TimedOut
            }
            Err(err) => {
                error!(agent = %name, error = %err, "agent failed");
                monitor.record_failure(&name, elapsed).await;
                AgentOutcome::Failed {
                    reason: err.to_string(),
                }
            }
        };

        (name, outcome)
    }
}
