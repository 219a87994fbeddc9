// SPDX-License-Identifier: MIT

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};

use super::{InterruptRecord, InterruptRequest, ResolvedInterrupt, ResumeDecision, ResumeStatus};
use crate::adk::error::{Result, TollgateError};
use crate::tollgate::workflow::store::{BusyPolicy, Thread, ThreadLocks, ThreadStatus, ThreadStore};

/// Captures pause requests and hands resume decisions back to the runner.
///
/// The broker shares the runner's store and lock table, so a decision
/// submitted here is serialized against any invocation on the same thread.
pub struct InterruptBroker {
    store: Arc<dyn ThreadStore>,
    locks: Arc<ThreadLocks>,
    busy_policy: BusyPolicy,
    signals: Mutex<HashMap<String, Arc<Notify>>>,
}

impl InterruptBroker {
    pub fn new(store: Arc<dyn ThreadStore>, locks: Arc<ThreadLocks>, busy_policy: BusyPolicy) -> Self {
        Self {
            store,
            locks,
            busy_policy,
            signals: Mutex::new(HashMap::new()),
        }
    }

    /// Attach a new pending record to the thread.
    ///
    /// Records raised by the same step keep their raise order. The thread is
    /// not persisted here; the caller commits it with the rest of the step.
    pub fn raise_interrupt(
        &self,
        thread: &mut Thread,
        node: &str,
        request: InterruptRequest,
    ) -> InterruptRecord {
        let record = InterruptRecord {
            id: format!("{}:{}:{}", node, thread.step, thread.interrupts),
            node: node.to_string(),
            key: request.key,
            payload: request.payload,
            created_at: Utc::now(),
        };
        log::info!("Thread {} paused at {} ({})", thread.id, node, record.id);
        log::debug!("Interrupt payload: {}", record.payload);
        thread.interrupts += 1;
        thread.pending.push_back(record.clone());
        thread.status = ThreadStatus::Interrupted;
        record
    }

    /// What the thread is waiting for right now
    pub async fn await_resume(&self, thread_id: &str) -> Result<ResumeStatus> {
        let thread = self
            .store
            .get(thread_id)
            .await?
            .ok_or_else(|| TollgateError::thread_not_found(thread_id))?;
        Ok(status_of(&thread))
    }

    /// Resolve the oldest pending record of an already-loaded thread.
    ///
    /// Returns the next record still waiting, or every resolved decision once
    /// the queue is empty.
    pub fn resolve(&self, thread: &mut Thread, decision: ResumeDecision) -> Result<ResumeStatus> {
        let record = thread
            .pending
            .pop_front()
            .ok_or_else(|| TollgateError::no_pending(&thread.id))?;
        log::info!(
            "Thread {} resolved {} with {}",
            thread.id,
            record.id,
            decision.kind()
        );
        thread.resolved.push(ResolvedInterrupt { record, decision });
        thread.updated_at = Utc::now();

        if thread.pending.is_empty() {
            thread.status = ThreadStatus::Resumable;
        }
        Ok(status_of(thread))
    }

    /// Load, resolve and persist in one locked operation
    pub async fn submit_resume(
        &self,
        thread_id: &str,
        decision: ResumeDecision,
    ) -> Result<ResumeStatus> {
        let _guard = self.locks.acquire(thread_id, self.busy_policy).await?;
        let mut thread = self
            .store
            .get(thread_id)
            .await?
            .ok_or_else(|| TollgateError::no_pending(thread_id))?;
        let status = self.resolve(&mut thread, decision)?;
        self.store.put(&thread).await?;
        self.notify(thread_id).await;
        Ok(status)
    }

    /// Wait until the thread is no longer waiting on a decision, or until
    /// `timeout` elapses. Returns the status observed last.
    pub async fn wait_for_resume(&self, thread_id: &str, timeout: Duration) -> Result<ResumeStatus> {
        let signal = self.signal(thread_id).await;
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = signal.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let status = self.await_resume(thread_id).await?;
            if !matches!(status, ResumeStatus::Pending(_)) {
                return Ok(status);
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.await_resume(thread_id).await;
            }
        }
    }

    /// Wake every `wait_for_resume` caller on the thread
    pub async fn notify(&self, thread_id: &str) {
        self.signal(thread_id).await.notify_waiters();
    }

    /// Drop a thread's wake-up signal unless a waiter still holds it
    pub async fn forget(&self, thread_id: &str) {
        let mut signals = self.signals.lock().await;
        if signals
            .get(thread_id)
            .is_some_and(|signal| Arc::strong_count(signal) == 1)
        {
            signals.remove(thread_id);
        }
    }

    /// Number of thread ids with a signal
    pub async fn tracked(&self) -> usize {
        self.signals.lock().await.len()
    }

    async fn signal(&self, thread_id: &str) -> Arc<Notify> {
        let mut signals = self.signals.lock().await;
        signals.entry(thread_id.to_string()).or_default().clone()
    }
}

fn status_of(thread: &Thread) -> ResumeStatus {
    match thread.status {
        ThreadStatus::Interrupted => match thread.pending.front() {
            Some(record) => ResumeStatus::Pending(record.clone()),
            None => ResumeStatus::NotPaused,
        },
        ThreadStatus::Resumable => ResumeStatus::Ready(thread.resolved.clone()),
        ThreadStatus::Ready | ThreadStatus::Completed => ResumeStatus::NotPaused,
    }
}
