use chrono::Utc;
use codeloom_core::{CodeloomError, CodeloomResult, QueueState, WorkItem, WorkItemStatus};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

/// Capacity and retry limits for a [`WorkQueue`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Maximum number of live (Pending + InFlight) items.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// How many nacks an item survives before it is marked Failed.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_capacity() -> usize {
    1024
}

fn default_max_attempts() -> u32 {
    3
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            max_attempts: default_max_attempts(),
        }
    }
}

/// FIFO work queue with a capacity bound, tail-requeue retry policy, and
/// atomic snapshot/restore.
///
/// The queue is a synchronous structure; callers that share it across tasks
/// wrap it in `Arc<RwLock<WorkQueue>>` so all mutation happens under one
/// logical lock. Terminal items (Done/Failed) stay in the queue for
/// conservation accounting until [`WorkQueue::drain_terminal`] removes them.
pub struct WorkQueue {
    items: HashMap<u64, WorkItem>,
    pending: VecDeque<u64>,
    next_id: u64,
    total_enqueued: u64,
    config: QueueConfig,
}

impl WorkQueue {
    /// Create an empty queue with the given configuration.
    pub fn new(config: QueueConfig) -> Self {
        Self {
            items: HashMap::new(),
            pending: VecDeque::new(),
            next_id: 1,
            total_enqueued: 0,
            config,
        }
    }

    /// Enqueue a payload, assigning the next monotone id.
    ///
    /// Fails with [`CodeloomError::QueueFull`] when live items have reached
    /// the configured capacity.
    pub fn enqueue(&mut self, payload: impl Into<String>) -> CodeloomResult<u64> {
        if self.live_count() >= self.config.capacity {
            return Err(CodeloomError::QueueFull {
                capacity: self.config.capacity,
            });
        }
        let id = self.next_id;
        self.next_id += 1;
        self.total_enqueued += 1;
        self.items.insert(id, WorkItem::new(id, payload));
        self.pending.push_back(id);
        Ok(id)
    }

    /// Deliver the oldest Pending item, transitioning it to InFlight.
    ///
    /// A non-blocking poll: returns `None` when nothing is Pending.
    pub fn dequeue(&mut self) -> Option<WorkItem> {
        let id = self.pending.pop_front()?;
        let item = self.items.get_mut(&id)?;
        item.status = WorkItemStatus::InFlight;
        Some(item.clone())
    }

    /// Acknowledge an InFlight item, transitioning it to Done.
    pub fn ack(&mut self, id: u64) -> CodeloomResult<()> {
        let item = self
            .items
            .get_mut(&id)
            .ok_or(CodeloomError::UnknownItem(id))?;
        if item.status != WorkItemStatus::InFlight {
            return Err(CodeloomError::InvalidTransition {
                id,
                from: item.status.clone(),
                to: WorkItemStatus::Done,
            });
        }
        item.status = WorkItemStatus::Done;
        item.completed_at = Some(Utc::now());
        Ok(())
    }

    /// Negatively acknowledge an InFlight item.
    ///
    /// Increments the attempt count. While the count stays within
    /// `max_attempts` the item re-enters Pending at the tail (preserving
    /// FIFO fairness for other waiters); on the `max_attempts + 1`th nack it
    /// becomes Failed and is surfaced via [`WorkQueue::failed_items`].
    /// Returns the item's resulting status.
    pub fn nack(&mut self, id: u64) -> CodeloomResult<WorkItemStatus> {
        let max_attempts = self.config.max_attempts;
        let item = self
            .items
            .get_mut(&id)
            .ok_or(CodeloomError::UnknownItem(id))?;
        if item.status != WorkItemStatus::InFlight {
            return Err(CodeloomError::InvalidTransition {
                id,
                from: item.status.clone(),
                to: WorkItemStatus::Pending,
            });
        }
        item.attempts += 1;
        if item.attempts <= max_attempts {
            item.status = WorkItemStatus::Pending;
            self.pending.push_back(id);
        } else {
            item.status = WorkItemStatus::Failed {
                reason: format!("retry limit exceeded after {} attempts", item.attempts),
            };
            item.completed_at = Some(Utc::now());
        }
        Ok(item.status.clone())
    }

    /// Consistent point-in-time copy of the queue for backup purposes.
    ///
    /// Cost is bounded by the copy itself; the caller's lock is held no
    /// longer than that.
    pub fn snapshot(&self) -> QueueState {
        let mut items: Vec<WorkItem> = self.items.values().cloned().collect();
        items.sort_by_key(|i| i.id);
        QueueState {
            items,
            pending_order: self.pending.iter().copied().collect(),
            cursor: self.next_id,
        }
    }

    /// Atomically replace all queue state with a validated snapshot.
    ///
    /// Fails with [`CodeloomError::InvalidState`] if the snapshot violates
    /// the status/cursor invariant; live state is untouched on failure.
    pub fn restore(&mut self, state: QueueState) -> CodeloomResult<()> {
        state.validate()?;
        let total = state.items.len() as u64;
        self.pending = state.pending_order.iter().copied().collect();
        self.next_id = state.cursor;
        self.items = state.items.into_iter().map(|i| (i.id, i)).collect();
        self.total_enqueued = total;
        Ok(())
    }

    /// Get a copy of an item by id.
    pub fn get(&self, id: u64) -> Option<WorkItem> {
        self.items.get(&id).cloned()
    }

    /// Items that exceeded the retry limit, ascending by id.
    pub fn failed_items(&self) -> Vec<WorkItem> {
        let mut failed: Vec<WorkItem> = self
            .items
            .values()
            .filter(|i| matches!(i.status, WorkItemStatus::Failed { .. }))
            .cloned()
            .collect();
        failed.sort_by_key(|i| i.id);
        failed
    }

    /// Remove and return all terminal (Done/Failed) items.
    pub fn drain_terminal(&mut self) -> Vec<WorkItem> {
        let ids: Vec<u64> = self
            .items
            .values()
            .filter(|i| i.is_terminal())
            .map(|i| i.id)
            .collect();
        let mut drained: Vec<WorkItem> = ids
            .iter()
            .filter_map(|id| self.items.remove(id))
            .collect();
        drained.sort_by_key(|i| i.id);
        drained
    }

    /// Number of Pending items.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Number of InFlight items.
    pub fn in_flight_count(&self) -> usize {
        self.count(|s| *s == WorkItemStatus::InFlight)
    }

    /// Number of Done items still held.
    pub fn done_count(&self) -> usize {
        self.count(|s| *s == WorkItemStatus::Done)
    }

    /// Number of Failed items still held.
    pub fn failed_count(&self) -> usize {
        self.count(|s| matches!(s, WorkItemStatus::Failed { .. }))
    }

    /// Total number of successful enqueues over the queue's lifetime
    /// (reset to the item count on restore).
    pub fn total_enqueued(&self) -> u64 {
        self.total_enqueued
    }

    /// Whether no Pending or InFlight work remains.
    pub fn is_drained(&self) -> bool {
        self.pending.is_empty() && self.in_flight_count() == 0
    }

    fn live_count(&self) -> usize {
        self.pending.len() + self.in_flight_count()
    }

    fn count(&self, pred: impl Fn(&WorkItemStatus) -> bool) -> usize {
        self.items.values().filter(|i| pred(&i.status)).count()
    }
}

impl Default for WorkQueue {
    fn default() -> Self {
        Self::new(QueueConfig::default())
    }
}
