//! Core types and error definitions for the Codeloom platform.
//!
//! This crate provides the foundational types shared across all Codeloom
//! crates: the work-item data model, the queue-state snapshot type, and the
//! unified error enum.
//!
//! # Main types
//!
//! - [`CodeloomError`] — Unified error enum for all Codeloom subsystems.
//! - [`CodeloomResult`] — Convenience alias for `Result<T, CodeloomError>`.
//! - [`WorkItem`] — A single unit of work passing through the queue.
//! - [`WorkItemStatus`] — Lifecycle state of a work item.
//! - [`QueueState`] — Point-in-time snapshot of the queue, the unit of backup.

/// Work item and queue snapshot types.
pub mod work;

pub use work::{QueueState, WorkItem, WorkItemStatus};

// --- Error types ---

/// Top-level error type for the Codeloom platform.
///
/// Queue-level structural errors (`UnknownItem`, `InvalidTransition`,
/// `InvalidState`) indicate caller bugs and are surfaced directly, never
/// swallowed. Agent-level failures are captured per-agent inside a pipeline
/// result rather than propagated.
#[derive(Debug, thiserror::Error)]
pub enum CodeloomError {
    /// The queue has reached its configured capacity bound.
    #[error("queue full: capacity of {capacity} items reached")]
    QueueFull {
        /// The configured capacity that was hit.
        capacity: usize,
    },

    /// No work item with the given id exists in the queue.
    #[error("unknown work item: {0}")]
    UnknownItem(u64),

    /// A status transition was requested that the item's current status forbids.
    #[error("invalid transition for item {id}: {from} -> {to}")]
    InvalidTransition {
        /// The work item id.
        id: u64,
        /// Status the item currently holds.
        from: WorkItemStatus,
        /// Status the caller tried to move it to.
        to: WorkItemStatus,
    },

    /// A supplied queue state violates the status/cursor invariant.
    #[error("invalid queue state: {0}")]
    InvalidState(String),

    /// Writing a backup artifact failed; live queue state is untouched.
    #[error("backup write failed: {0}")]
    BackupWrite(String),

    /// No backup artifact exists under the given name.
    #[error("backup not found: {0}")]
    BackupNotFound(String),

    /// A backup artifact failed validation during restore.
    #[error("backup corrupt: {0}")]
    BackupCorrupt(String),

    /// An agent name was registered twice.
    #[error("duplicate agent: {0}")]
    DuplicateAgent(String),

    /// An agent invocation failed; wraps the agent's own failure.
    #[error("agent '{agent}' failed: {reason}")]
    AgentFailure {
        /// Registered name of the agent.
        agent: String,
        /// The underlying failure, stringified.
        reason: String,
    },

    /// An agent invocation exceeded its bounded wait.
    #[error("agent '{agent}' timed out after {timeout_ms}ms")]
    AgentTimeout {
        /// Registered name of the agent.
        agent: String,
        /// The configured timeout in milliseconds.
        timeout_ms: u64,
    },

    /// An error in configuration parsing or validation.
    #[error("config error: {0}")]
    Config(String),

    /// A (de)serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used across all Codeloom crates.
pub type CodeloomResult<T> = Result<T, CodeloomError>;

// --- Tracing setup ---

/// Initialize the global tracing subscriber with an env-filter.
///
/// Reads `RUST_LOG` when set, defaulting to `info`. Safe to call more than
/// once; subsequent calls are no-ops.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    tracing::debug!("tracing initialized");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CodeloomError::QueueFull { capacity: 8 };
        assert_eq!(err.to_string(), "queue full: capacity of 8 items reached");

        let err = CodeloomError::UnknownItem(42);
        assert_eq!(err.to_string(), "unknown work item: 42");

        let err = CodeloomError::AgentTimeout {
            agent: "search".to_string(),
            timeout_ms: 500,
        };
        assert_eq!(err.to_string(), "agent 'search' timed out after 500ms");
    }

    #[test]
    fn test_invalid_transition_display() {
        let err = CodeloomError::InvalidTransition {
            id: 3,
            from: WorkItemStatus::Pending,
            to: WorkItemStatus::Done,
        };
        assert_eq!(err.to_string(), "invalid transition for item 3: pending -> done");
    }

    #[test]
    fn test_serde_error_conversion() {
        let parse: Result<WorkItem, _> = serde_json::from_str("not json");
        let err: CodeloomError = parse.unwrap_err().into();
        assert!(matches!(err, CodeloomError::Serialization(_)));
    }
}
