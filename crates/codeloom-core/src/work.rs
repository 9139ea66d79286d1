use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::{CodeloomError, CodeloomResult};

/// Lifecycle state of a [`WorkItem`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkItemStatus {
    /// Enqueued, waiting for delivery.
    Pending,
    /// Dispatched to a consumer, not yet acknowledged.
    InFlight,
    /// Acknowledged successfully.
    Done,
    /// Retry limit exceeded; surfaced to the caller, never dropped.
    Failed {
        /// Why the item was given up on.
        reason: String,
    },
}

impl std::fmt::Display for WorkItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkItemStatus::Pending => write!(f, "pending"),
            WorkItemStatus::InFlight => write!(f, "in_flight"),
            WorkItemStatus::Done => write!(f, "done"),
            WorkItemStatus::Failed { .. } => write!(f, "failed"),
        }
    }
}

/// A single unit of work passing through the queue.
///
/// Created on enqueue and mutated only by the queue; retained in its
/// terminal state for conservation accounting until the caller drains it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Unique, monotonically increasing id assigned by the queue.
    pub id: u64,
    /// Caller payload; opaque to the queue.
    pub payload: String,
    /// Current lifecycle state.
    pub status: WorkItemStatus,
    /// Number of times the item has been nacked.
    pub attempts: u32,
    /// When the item was enqueued.
    pub enqueued_at: DateTime<Utc>,
    /// When the item reached a terminal state, if it has.
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl WorkItem {
    /// Create a fresh Pending item.
    pub fn new(id: u64, payload: impl Into<String>) -> Self {
        Self {
            id,
            payload: payload.into(),
            status: WorkItemStatus::Pending,
            attempts: 0,
            enqueued_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Whether the item is in a terminal state (Done or Failed).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            WorkItemStatus::Done | WorkItemStatus::Failed { .. }
        )
    }
}

/// A consistent point-in-time snapshot of the queue: the unit of backup.
///
/// `cursor` is the next id the queue will assign; every item id is strictly
/// below it. `pending_order` records FIFO delivery order for the Pending
/// items (requeued items sit at the tail).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueState {
    /// All work items, ascending by id.
    pub items: Vec<WorkItem>,
    /// Ids of Pending items in delivery order.
    pub pending_order: Vec<u64>,
    /// The next id to assign.
    pub cursor: u64,
}

impl QueueState {
    /// An empty state with the cursor at the first assignable id.
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            pending_order: Vec::new(),
            cursor: 1,
        }
    }

    /// Check the status/cursor invariant.
    ///
    /// Rejects duplicate ids, ids at or beyond the cursor, and any mismatch
    /// between `pending_order` and the set of Pending items.
    pub fn validate(&self) -> CodeloomResult<()> {
        let mut seen = HashSet::new();
        for item in &self.items {
            if !seen.insert(item.id) {
                return Err(CodeloomError::InvalidState(format!(
                    "duplicate work item id {}",
                    item.id
                )));
            }
            if item.id >= self.cursor {
                return Err(CodeloomError::InvalidState(format!(
                    "item id {} is not below the cursor {}",
                    item.id, self.cursor
                )));
            }
        }

        let pending_ids: HashSet<u64> = self
            .items
            .iter()
            .filter(|i| i.status == WorkItemStatus::Pending)
            .map(|i| i.id)
            .collect();

        let mut ordered = HashSet::new();
        for id in &self.pending_order {
            if !ordered.insert(*id) {
                return Err(CodeloomError::InvalidState(format!(
                    "id {id} appears twice in the pending order"
                )));
            }
            if !pending_ids.contains(id) {
                return Err(CodeloomError::InvalidState(format!(
                    "pending order references id {id} which is not a pending item"
                )));
            }
        }
        if ordered.len() != pending_ids.len() {
            return Err(CodeloomError::InvalidState(
                "pending items missing from the pending order".to_string(),
            ));
        }

        Ok(())
    }

    /// Count items currently in the given status.
    pub fn count_status(&self, status: &WorkItemStatus) -> usize {
        self.items
            .iter()
            .filter(|i| {
                std::mem::discriminant(&i.status) == std::mem::discriminant(status)
            })
            .count()
    }
}
