//! End-to-end pipeline tests.
//!
//! Verifies the full submit → dequeue → pipeline → ack/nack path with mock
//! agents: per-agent failure isolation, fail-fast aborts in both dispatch
//! modes, timeout handling, retry flow through the queue, and recovery from
//! a backup taken mid-stream.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use codeloom_core::{CodeloomError, CodeloomResult};
use codeloom_orchestrator::{
    Agent, AgentRegistry, FnAgent, Orchestrator, PipelineConfig, PipelineMode, RunStatus,
};
use codeloom_queue::{BackupStore, FileBackupStore, QueueConfig};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Mock agents
// ---------------------------------------------------------------------------

fn ok_agent(tag: &'static str) -> Arc<dyn Agent> {
    Arc::new(FnAgent::new(move |input: &str| Ok(format!("{tag}({input})"))))
}

fn failing_agent() -> Arc<dyn Agent> {
    Arc::new(FnAgent::new(|_: &str| {
        Err(CodeloomError::AgentFailure {
            agent: "generator".to_string(),
            reason: "template expansion failed".to_string(),
        })
    }))
}

/// Sleeps longer than any test timeout; used to observe timeout and abort paths.
struct SlowAgent;

#[async_trait]
impl Agent for SlowAgent {
    async fn execute(&self, _input: &str) -> CodeloomResult<String> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok("too late".to_string())
    }
}

/// Fails the first `failures` invocations, then succeeds.
struct FlakyAgent {
    failures: u32,
    calls: AtomicU32,
}

impl FlakyAgent {
    fn new(failures: u32) -> Self {
        Self {
            failures,
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl Agent for FlakyAgent {
    async fn execute(&self, input: &str) -> CodeloomResult<String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(CodeloomError::AgentFailure {
                agent: "flaky".to_string(),
                reason: format!("transient failure #{}", call + 1),
            });
        }
        Ok(format!("recovered({input})"))
    }
}

fn standard_registry() -> AgentRegistry {
    let mut registry = AgentRegistry::new();
    registry.register("search", ok_agent("search")).unwrap();
    registry.register("matcher", ok_agent("matcher")).unwrap();
    registry.register("ui_select", ok_agent("ui_select")).unwrap();
    registry.register("codegen", ok_agent("codegen")).unwrap();
    registry.register("packager", ok_agent("packager")).unwrap();
    registry
}

// ---------------------------------------------------------------------------
// Test: happy path — every registered agent contributes an outcome
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_e2e_happy_path() {
    let orchestrator = Orchestrator::new(standard_registry());
    let result = orchestrator.run_pipeline("generate a todo app").await;

    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(result.outcomes.len(), 5);
    for agent in ["search", "matcher", "ui_select", "codegen", "packager"] {
        assert!(
            result.output_of(agent).unwrap().contains("generate a todo app"),
            "missing outcome for {agent}"
        );
    }

    let agg = orchestrator.monitor().aggregate().await;
    assert_eq!(agg.invocations, 5);
    assert_eq!(agg.failures, 0);
}

// ---------------------------------------------------------------------------
// Test: isolation — one agent fails, the rest still produce outcomes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_e2e_failure_isolation() {
    let mut registry = AgentRegistry::new();
    registry.register("search", ok_agent("search")).unwrap();
    registry.register("generator", failing_agent()).unwrap();
    registry.register("packager", ok_agent("packager")).unwrap();

    let orchestrator = Orchestrator::new(registry);
    let result = orchestrator.run_pipeline("input").await;

    assert_eq!(result.status, RunStatus::PartiallyFailed);
    assert_eq!(result.outcomes.len(), 3);
    assert_eq!(result.failure_count(), 1);
    assert!(result.output_of("search").is_some());
    assert!(result.output_of("packager").is_some());
    assert!(result.aborted_by.is_none());

    let stats = orchestrator.monitor().get("generator").await.unwrap();
    assert_eq!(stats.failures, 1);
}

// ---------------------------------------------------------------------------
// Test: timeout is an agent-level failure, not a process-fatal error
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_e2e_timeout_is_isolated() {
    let mut registry = AgentRegistry::new();
    registry.register("slow", Arc::new(SlowAgent)).unwrap();
    registry.register("fast", ok_agent("fast")).unwrap();

    let orchestrator = Orchestrator::new(registry).with_pipeline_config(PipelineConfig {
        agent_timeout_ms: 20,
        ..PipelineConfig::default()
    });
    let result = orchestrator.run_pipeline("input").await;

    assert_eq!(result.status, RunStatus::PartiallyFailed);
    assert_eq!(
        result.outcomes.get("slow"),
        Some(&codeloom_orchestrator::AgentOutcome::TimedOut)
    );
    assert!(result.output_of("fast").is_some());

    let stats = orchestrator.monitor().get("slow").await.unwrap();
    assert_eq!(stats.timeouts, 1);
}

// ---------------------------------------------------------------------------
// Test: fan-out fail-fast cancels unfinished invocations as a group
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_e2e_fan_out_fail_fast_aborts_group() {
    let mut registry = AgentRegistry::new();
    registry.register("generator", failing_agent()).unwrap();
    registry.register("slow", Arc::new(SlowAgent)).unwrap();

    let orchestrator = Orchestrator::new(registry).with_pipeline_config(PipelineConfig {
        fail_fast: true,
        mode: PipelineMode::FanOut,
        agent_timeout_ms: 10_000,
    });
    let result = orchestrator.run_pipeline("input").await;

    assert_eq!(result.status, RunStatus::Aborted);
    assert_eq!(result.aborted_by.as_deref(), Some("generator"));
    // The cancelled invocation contributes nothing
    assert!(!result.outcomes.contains_key("slow"));
}

// ---------------------------------------------------------------------------
// Test: fan-out without fail-fast still collects every outcome
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_e2e_fan_out_collects_all_outcomes() {
    let mut registry = AgentRegistry::new();
    registry.register("search", ok_agent("search")).unwrap();
    registry.register("generator", failing_agent()).unwrap();
    registry.register("packager", ok_agent("packager")).unwrap();

    let orchestrator = Orchestrator::new(registry).with_pipeline_config(PipelineConfig {
        mode: PipelineMode::FanOut,
        ..PipelineConfig::default()
    });
    let result = orchestrator.run_pipeline("input").await;

    assert_eq!(result.status, RunStatus::PartiallyFailed);
    assert_eq!(result.outcomes.len(), 3);
    assert_eq!(result.failure_count(), 1);
}

// ---------------------------------------------------------------------------
// Test: queue-driven processing — ack on success
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_e2e_queue_driven_processing() {
    let orchestrator = Orchestrator::new(standard_registry());

    for i in 0..3 {
        orchestrator.submit(format!("job-{i}")).await.unwrap();
    }

    let results = orchestrator.drain().await.unwrap();
    assert_eq!(results.len(), 3);
    // FIFO processing order
    assert_eq!(results[0].0, 1);
    assert_eq!(results[1].0, 2);
    assert_eq!(results[2].0, 3);
    for (_, result) in &results {
        assert_eq!(result.status, RunStatus::Completed);
    }

    let queue = orchestrator.queue().read().await;
    assert!(queue.is_drained());
    assert_eq!(queue.done_count(), 3);
}

// ---------------------------------------------------------------------------
// Test: retry flow — transient pipeline failures are retried via nack,
// persistent ones settle as Failed instead of spinning forever
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_e2e_retry_then_success() {
    let mut registry = AgentRegistry::new();
    registry.register("flaky", Arc::new(FlakyAgent::new(2))).unwrap();

    let orchestrator = Orchestrator::new(registry).with_queue_config(QueueConfig {
        capacity: 16,
        max_attempts: 3,
    });
    orchestrator.submit("retry me").await.unwrap();

    let results = orchestrator.drain().await.unwrap();
    // Two failed runs (nacked and requeued), then the successful third
    assert_eq!(results.len(), 3);
    assert_eq!(results[2].1.status, RunStatus::Completed);

    let queue = orchestrator.queue().read().await;
    assert_eq!(queue.done_count(), 1);
    assert_eq!(queue.failed_count(), 0);
    assert_eq!(queue.get(1).unwrap().attempts, 2);
}

#[tokio::test]
async fn test_e2e_persistent_failure_settles_as_failed() {
    let mut registry = AgentRegistry::new();
    registry.register("generator", failing_agent()).unwrap();

    let orchestrator = Orchestrator::new(registry).with_queue_config(QueueConfig {
        capacity: 16,
        max_attempts: 1,
    });
    orchestrator.submit("doomed").await.unwrap();

    let results = orchestrator.drain().await.unwrap();
    // Initial run + one retry, then the queue gives up
    assert_eq!(results.len(), 2);

    let queue = orchestrator.queue().read().await;
    assert!(queue.is_drained());
    let failed = queue.failed_items();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].id, 1);
    assert_eq!(failed[0].attempts, 2);
}

// ---------------------------------------------------------------------------
// Test: backup taken mid-stream, crash, restore, finish the work
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_e2e_backup_restore_mid_stream() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileBackupStore::new(dir.path());

    // First orchestrator processes one of three jobs, then snapshots
    let orchestrator = Orchestrator::new(standard_registry());
    for i in 0..3 {
        orchestrator.submit(format!("job-{i}")).await.unwrap();
    }
    orchestrator.process_next().await.unwrap().unwrap();

    let state = orchestrator.queue().read().await.snapshot();
    store.create_backup("mid-stream", &state).await.unwrap();
    drop(orchestrator); // the "crash"

    // A fresh orchestrator restores the queue and finishes the remainder
    let recovered = Orchestrator::new(standard_registry());
    let state = store.restore_from_backup("mid-stream").await.unwrap();
    recovered.queue().write().await.restore(state).unwrap();

    {
        let queue = recovered.queue().read().await;
        assert_eq!(queue.done_count(), 1);
        assert_eq!(queue.pending_count(), 2);
    }

    let results = recovered.drain().await.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].0, 2);
    assert_eq!(results[1].0, 3);

    let queue = recovered.queue().read().await;
    assert!(queue.is_drained());
    assert_eq!(queue.done_count(), 3);
}
