//! Background vectorization queue.
//!
//! FIFO over an in-process `VecDeque`, drained by a fixed set of worker loops
//! spawned lazily on first enqueue. Workers poll with a bounded timeout so an
//! empty queue never wedges shutdown.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Notify;
use tracing::{debug, info, warn};
use uuid::Uuid;

use vellum_core::QueueConfig;

use crate::vectorize::TaskHandler;

/// Lifecycle of one queue task. Only terminal states reach the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

/// Task record kept in the bounded completed-task history. In-memory only.
#[derive(Debug, Clone)]
pub struct VectorizationTask {
    pub document_id: Uuid,
    pub status: TaskStatus,
    pub worker_id: Option<usize>,
    pub enqueued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

/// Point-in-time queue snapshot for status surfaces.
#[derive(Debug, Clone)]
pub struct QueueStatus {
    pub processing: bool,
    pub queue_size: usize,
    pub active_count: usize,
    pub completed_count: u64,
    pub failed_count: u64,
    pub max_concurrency: usize,
    pub active_ids: Vec<Uuid>,
}

struct QueueState {
    pending: VecDeque<(Uuid, DateTime<Utc>)>,
    active: Vec<Uuid>,
    history: VecDeque<VectorizationTask>,
    completed_count: u64,
    failed_count: u64,
    workers_started: bool,
}

struct QueueInner {
    handler: Arc<dyn TaskHandler>,
    config: QueueConfig,
    state: Mutex<QueueState>,
    notify: Notify,
    shutdown: AtomicBool,
}

/// In-process vectorization queue.
///
/// Enqueueing the same document twice is allowed and not de-duplicated; the
/// later run's delete-then-insert supersedes the earlier one.
#[derive(Clone)]
pub struct VectorizationQueue {
    inner: Arc<QueueInner>,
}

impl VectorizationQueue {
    pub fn new(handler: Arc<dyn TaskHandler>, config: QueueConfig) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                handler,
                config,
                state: Mutex::new(QueueState {
                    pending: VecDeque::new(),
                    active: Vec::new(),
                    history: VecDeque::new(),
                    completed_count: 0,
                    failed_count: 0,
                    workers_started: false,
                }),
                notify: Notify::new(),
                shutdown: AtomicBool::new(false),
            }),
        }
    }

    /// Append a document to the queue. Spawns the worker pool on first use.
    /// Must be called from within a tokio runtime.
    pub fn enqueue(&self, document_id: Uuid) {
        let spawn_workers = {
            let mut state = self.inner.state.lock().unwrap();
            state.pending.push_back((document_id, Utc::now()));
            debug!(
                document_id = %document_id,
                queue_size = state.pending.len(),
                "Enqueued vectorization task"
            );
            !std::mem::replace(&mut state.workers_started, true)
        };

        if spawn_workers {
            for worker_id in 0..self.inner.config.max_concurrency {
                let inner = self.inner.clone();
                tokio::spawn(async move {
                    worker_loop(inner, worker_id).await;
                });
            }
            info!(
                worker_count = self.inner.config.max_concurrency,
                "Vectorization workers started"
            );
        }
        self.inner.notify.notify_one();
    }

    pub fn status(&self) -> QueueStatus {
        let state = self.inner.state.lock().unwrap();
        QueueStatus {
            processing: !state.pending.is_empty() || !state.active.is_empty(),
            queue_size: state.pending.len(),
            active_count: state.active.len(),
            completed_count: state.completed_count,
            failed_count: state.failed_count,
            max_concurrency: self.inner.config.max_concurrency,
            active_ids: state.active.clone(),
        }
    }

    /// Most recent completed tasks, newest last.
    pub fn recent_tasks(&self) -> Vec<VectorizationTask> {
        self.inner.state.lock().unwrap().history.iter().cloned().collect()
    }

    /// Signal workers to stop. Each worker finishes its current task and
    /// exits; pending tasks are left in the queue.
    pub fn shutdown(&self) {
        self.inner.shutdown.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
        info!("Vectorization queue shutdown requested");
    }
}

async fn worker_loop(inner: Arc<QueueInner>, worker_id: usize) {
    let poll_interval = Duration::from_millis(inner.config.poll_interval_ms);
    debug!(worker_id, "Worker loop started");

    loop {
        if inner.shutdown.load(Ordering::SeqCst) {
            break;
        }

        let next = {
            let mut state = inner.state.lock().unwrap();
            let next = state.pending.pop_front();
            if let Some((id, _)) = next {
                state.active.push(id);
            }
            next
        };

        match next {
            Some((document_id, enqueued_at)) => {
                let started_at = Utc::now();
                let result = inner.handler.run(document_id).await;
                let mut state = inner.state.lock().unwrap();
                // Remove this run's entry only; a duplicate enqueue of the
                // same id may still be mid-run on another worker.
                if let Some(pos) = state.active.iter().position(|id| *id == document_id) {
                    state.active.swap_remove(pos);
                }
                let status = match &result {
                    Ok(()) => {
                        state.completed_count += 1;
                        TaskStatus::Completed
                    }
                    Err(e) => {
                        warn!(worker_id, document_id = %document_id, error_msg = %e, "Task failed");
                        state.failed_count += 1;
                        TaskStatus::Failed
                    }
                };
                state.history.push_back(VectorizationTask {
                    document_id,
                    status,
                    worker_id: Some(worker_id),
                    enqueued_at,
                    started_at: Some(started_at),
                    completed_at: Some(Utc::now()),
                    error: result.err().map(|e| e.to_string()),
                });
                while state.history.len() > inner.config.history_limit {
                    state.history.pop_front();
                }
            }
            None => {
                tokio::select! {
                    _ = inner.notify.notified() => {}
                    _ = tokio::time::sleep(poll_interval) => {}
                }
            }
        }
    }
    debug!(worker_id, "Worker loop exited");
}
