//! Durable FIFO work queue and backup store for the Codeloom platform.
//!
//! The queue is the single shared mutable resource of the orchestration
//! core: it owns the [`codeloom_core::WorkItem`] lifecycle and is the unit
//! snapshotted by the backup store. Concurrent users wrap it in
//! `Arc<RwLock<WorkQueue>>` so every status transition is atomic.
//!
//! # Main types
//!
//! - [`WorkQueue`] — FIFO queue with capacity bound, retry policy, and
//!   snapshot/restore.
//! - [`QueueConfig`] — Capacity and retry limits.
//! - [`BackupStore`] — Storage-agnostic persistence seam for queue snapshots.
//! - [`FileBackupStore`] — JSON-on-disk implementation with checksummed,
//!   versioned artifacts.
//! - [`BackupRecord`] — Write-once handle to a stored snapshot.

/// Snapshot persistence.
pub mod backup;
/// The work queue itself.
pub mod queue;

pub use backup::{BackupRecord, BackupStore, FileBackupStore};
pub use queue::{QueueConfig, WorkQueue};
