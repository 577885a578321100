//! Deduplicating in-memory work queue.
//!
//! Every id lives in exactly one of four sets: queued, processing, completed,
//! failed. Terminal ids are kept for the lifetime of the process so that
//! rediscovering them is a no-op. Idle consumers park on a [`Notify`] and are
//! woken by `enqueue` instead of polling.

use std::collections::{BTreeSet, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use tokio::sync::Notify;
use tracing::{debug, info};

use crate::domain::models::{QueueStats, WorkItemId, WorkItemState};

#[derive(Debug, Default)]
struct QueueState {
    order: VecDeque<WorkItemId>,
    queued: HashSet<WorkItemId>,
    processing: BTreeSet<WorkItemId>,
    completed: HashSet<WorkItemId>,
    failed: HashSet<WorkItemId>,
}

impl QueueState {
    fn state_of(&self, id: &WorkItemId) -> Option<WorkItemState> {
        if self.queued.contains(id) {
            Some(WorkItemState::Queued)
        } else if self.processing.contains(id) {
            Some(WorkItemState::Processing)
        } else if self.completed.contains(id) {
            Some(WorkItemState::Completed)
        } else if self.failed.contains(id) {
            Some(WorkItemState::Failed)
        } else {
            None
        }
    }

    fn is_drained(&self) -> bool {
        self.order.is_empty() && self.processing.is_empty()
    }
}

/// Thread-safe work queue shared by the discovery loop and the workers.
#[derive(Debug, Default)]
pub struct WorkQueue {
    state: Mutex<QueueState>,
    /// Wakes one idle consumer per enqueue; all of them on close
    available: Notify,
    /// Wakes `wait_drained` callers whenever an item settles
    settled: Notify,
    closed: AtomicBool,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        // A panic while holding the lock cannot leave the sets half-updated:
        // every mutation below is a single insert/remove pair.
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Add `id`; `true` iff it was newly queued.
    ///
    /// A failed id is moved back to queued so a later discovery cycle can
    /// retry it.
    pub fn enqueue(&self, id: WorkItemId) -> bool {
        if self.is_closed() {
            return false;
        }
        {
            let mut state = self.lock();
            match state.state_of(&id) {
                Some(WorkItemState::Queued | WorkItemState::Processing | WorkItemState::Completed) => {
                    return false;
                }
                Some(WorkItemState::Failed) => {
                    state.failed.remove(&id);
                    debug!(item = %id, "re-queueing previously failed item");
                }
                None => {}
            }
            state.queued.insert(id.clone());
            state.order.push_back(id);
        }
        self.available.notify_one();
        true
    }

    /// Atomically move the oldest queued id to processing.
    pub fn dequeue(&self) -> Option<WorkItemId> {
        if self.is_closed() {
            return None;
        }
        let mut state = self.lock();
        let id = state.order.pop_front()?;
        state.queued.remove(&id);
        state.processing.insert(id.clone());
        Some(id)
    }

    /// Wait for the next item; `None` once the queue is closed.
    pub async fn next(&self) -> Option<WorkItemId> {
        loop {
            let notified = self.available.notified();
            tokio::pin!(notified);
            // Register before checking so an enqueue between the check and
            // the await is not lost.
            notified.as_mut().enable();

            if self.is_closed() {
                return None;
            }
            if let Some(id) = self.dequeue() {
                return Some(id);
            }
            notified.await;
        }
    }

    pub fn mark_completed(&self, id: &WorkItemId) {
        self.settle(id, WorkItemState::Completed);
    }

    pub fn mark_failed(&self, id: &WorkItemId) {
        self.settle(id, WorkItemState::Failed);
    }

    fn settle(&self, id: &WorkItemId, outcome: WorkItemState) {
        {
            let mut state = self.lock();
            state.processing.remove(id);
            if state.queued.remove(id) {
                state.order.retain(|queued| queued != id);
            }
            match outcome {
                WorkItemState::Completed => {
                    state.failed.remove(id);
                    state.completed.insert(id.clone());
                }
                _ => {
                    state.completed.remove(id);
                    state.failed.insert(id.clone());
                }
            }
        }
        info!(item = %id, outcome = %outcome, "work item settled");
        self.settled.notify_waiters();
    }

    pub fn state_of(&self, id: &WorkItemId) -> Option<WorkItemState> {
        self.lock().state_of(id)
    }

    pub fn stats(&self) -> QueueStats {
        let state = self.lock();
        QueueStats {
            queued: state.order.len(),
            processing: state.processing.len(),
            completed: state.completed.len(),
            failed: state.failed.len(),
            processing_items: state.processing.iter().cloned().collect(),
        }
    }

    /// Stop handing out items and release every idle consumer.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!("work queue closed");
        }
        self.available.notify_waiters();
        self.settled.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Wait until nothing is queued or processing, or the queue is closed.
    pub async fn wait_drained(&self) {
        loop {
            let notified = self.settled.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.is_closed() || self.lock().is_drained() {
                return;
            }
            notified.await;
        }
    }
}
