use crate::config::PerfConfig;
use codeloom_core::{CodeloomError, CodeloomResult};
use codeloom_queue::{QueueConfig, WorkQueue};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::info;

/// Aggregate metrics for one bounded load run; immutable once computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    /// Messages that reached Done.
    pub messages_processed: u64,
    /// Messages that exhausted their retries.
    pub messages_failed: u64,
    /// Successful acknowledgements.
    pub acks: u64,
    /// Negative acknowledgements (injected failures).
    pub nacks: u64,
    /// Failed deliveries over total attempted: nacks / (acks + nacks).
    pub error_rate: f64,
    /// Mean end-to-end enqueue → ack time, in milliseconds.
    pub average_latency_ms: f64,
    /// Messages processed per elapsed second.
    pub throughput_per_sec: f64,
    /// Wall-clock duration of the run, in milliseconds.
    pub elapsed_ms: u64,
}

impl PerformanceReport {
    fn zero() -> Self {
        Self {
            messages_processed: 0,
            messages_failed: 0,
            acks: 0,
            nacks: 0,
            error_rate: 0.0,
            average_latency_ms: 0.0,
            throughput_per_sec: 0.0,
            elapsed_ms: 0,
        }
    }
}

/// Drive a bounded synthetic load through a fresh queue and report
/// aggregate metrics.
///
/// Spawns `concurrency` producers and `concurrency` consumers over one
/// shared queue. Which messages get an injected first-delivery failure is
/// precomputed from the seeded generator before any task starts, so a
/// fixed seed reproduces identical injections regardless of interleaving.
pub async fn run_performance_test(config: &PerfConfig) -> CodeloomResult<PerformanceReport> {
    config.validate()?;
    if config.message_count == 0 {
        return Ok(PerformanceReport::zero());
    }

    let queue = Arc::new(RwLock::new(WorkQueue::new(QueueConfig {
        capacity: config.message_count,
        max_attempts: config.max_attempts,
    })));

    // Injection plan, indexed by id - 1 (ids are assigned 1..=message_count).
    let mut rng = StdRng::seed_from_u64(config.seed);
    let inject: Arc<Vec<bool>> = Arc::new(
        (0..config.message_count)
            .map(|_| rng.gen_bool(config.failure_injection_rate))
            .collect(),
    );

    let enqueue_times: Arc<Mutex<HashMap<u64, Instant>>> =
        Arc::new(Mutex::new(HashMap::with_capacity(config.message_count)));
    let latencies: Arc<Mutex<Vec<Duration>>> = Arc::new(Mutex::new(Vec::new()));
    let acks = Arc::new(AtomicU64::new(0));
    let nacks = Arc::new(AtomicU64::new(0));

    let payload = "x".repeat(config.payload_size);
    let start = Instant::now();
    let mut handles = Vec::new();

    // Producers: split message_count evenly, remainder to the first few.
    let base = config.message_count / config.concurrency;
    let remainder = config.message_count % config.concurrency;
    for worker in 0..config.concurrency {
        let share = base + usize::from(worker < remainder);
        let queue = Arc::clone(&queue);
        let enqueue_times = Arc::clone(&enqueue_times);
        let payload = payload.clone();
        handles.push(tokio::spawn(async move {
            for _ in 0..share {
                loop {
                    match queue.write().await.enqueue(payload.as_str()) {
                        Ok(id) => {
                            enqueue_times.lock().insert(id, Instant::now());
                            break;
                        }
                        Err(CodeloomError::QueueFull { .. }) => {
                            tokio::task::yield_now().await;
                        }
                        Err(e) => return Err(e),
                    }
                }
            }
            Ok(())
        }));
    }

    // Consumers: poll until every message is terminal.
    let total = config.message_count;
    for _ in 0..config.concurrency {
        let queue = Arc::clone(&queue);
        let inject = Arc::clone(&inject);
        let enqueue_times = Arc::clone(&enqueue_times);
        let latencies = Arc::clone(&latencies);
        let acks = Arc::clone(&acks);
        let nacks = Arc::clone(&nacks);
        handles.push(tokio::spawn(async move {
            loop {
                let item = { queue.write().await.dequeue() };
                match item {
                    Some(item) => {
                        let idx = (item.id - 1) as usize;
                        let fail_first = inject.get(idx).copied().unwrap_or(false);
                        if fail_first && item.attempts == 0 {
                            queue.write().await.nack(item.id)?;
                            nacks.fetch_add(1, Ordering::Relaxed);
                        } else {
                            queue.write().await.ack(item.id)?;
                            acks.fetch_add(1, Ordering::Relaxed);
                            if let Some(t0) = enqueue_times.lock().remove(&item.id) {
                                latencies.lock().push(t0.elapsed());
                            }
                        }
                    }
                    None => {
                        let settled = {
                            let q = queue.read().await;
                            q.done_count() + q.failed_count()
                        };
                        if settled == total {
                            break;
                        }
                        tokio::task::yield_now().await;
                    }
                }
            }
            Ok(())
        }));
    }

    for handle in handles {
        handle
            .await
            .map_err(|e| CodeloomError::InvalidState(format!("harness task panicked: {e}")))??;
    }

    let elapsed = start.elapsed();
    let (processed, failed) = {
        let q = queue.read().await;
        (q.done_count() as u64, q.failed_count() as u64)
    };

    let acks = acks.load(Ordering::Relaxed);
    let nacks = nacks.load(Ordering::Relaxed);
    let attempted = acks + nacks;
    let error_rate = if attempted == 0 {
        0.0
    } else {
        nacks as f64 / attempted as f64
    };

    let average_latency_ms = {
        let samples = latencies.lock();
        if samples.is_empty() {
            0.0
        } else {
            let sum: f64 = samples.iter().map(|d| d.as_secs_f64() * 1000.0).sum();
            sum / samples.len() as f64
        }
    };

    let report = PerformanceReport {
        messages_processed: processed,
        messages_failed: failed,
        acks,
        nacks,
        error_rate,
        average_latency_ms,
        throughput_per_sec: processed as f64 / elapsed.as_secs_f64(),
        elapsed_ms: elapsed.as_millis() as u64,
    };

    info!(
        processed = report.messages_processed,
        failed = report.messages_failed,
        error_rate = report.error_rate,
        throughput = report.throughput_per_sec,
        "performance run complete"
    );

    Ok(report)
}
