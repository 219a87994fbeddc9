// SPDX-License-Identifier: MIT

//! Thread persistence
//!
//! A [`Thread`] is everything the engine needs to pick a computation back up:
//! the current snapshot, the cursor (next node), pending interrupts and a
//! bounded list of checkpoints. Stores persist whole threads, so one `put`
//! commits one step.
//!
//! - [`MemoryStore`] - process-local, for tests and short-lived tools
//! - [`FileStore`] - one JSON file per thread, survives restarts

mod file;
mod lock;
mod memory;

pub use file::FileStore;
pub use lock::{BusyPolicy, ThreadGuard, ThreadLocks};
pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::adk::error::Result;
use crate::tollgate::workflow::interrupt::{InterruptRecord, ResolvedInterrupt};
use crate::tollgate::workflow::state::StateSnapshot;

/// Where a thread is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadStatus {
    /// Cursor points at the next node to run
    Ready,
    /// Waiting for a decision on at least one interrupt record
    Interrupted,
    /// Every record is resolved; the paused node runs again on the next invocation
    Resumable,
    /// Reached a terminal node
    Completed,
}

/// State of a thread after one committed step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub step: u64,
    /// Node that produced the step; `None` for caller-supplied writes
    pub node: Option<String>,
    pub cursor: Option<String>,
    pub snapshot: StateSnapshot,
    pub created_at: DateTime<Utc>,
}

/// A persisted workflow execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    pub id: String,
    pub snapshot: StateSnapshot,
    /// Next node to run; `None` once the thread has reached a terminal node
    pub cursor: Option<String>,
    pub status: ThreadStatus,
    #[serde(default)]
    pub pending: VecDeque<InterruptRecord>,
    #[serde(default)]
    pub resolved: Vec<ResolvedInterrupt>,
    pub step: u64,
    /// Interrupts raised over the thread's lifetime; never reset
    #[serde(default)]
    pub interrupts: u64,
    #[serde(default)]
    pub history: Vec<Checkpoint>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Thread {
    pub fn new(id: impl Into<String>, snapshot: StateSnapshot, cursor: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            snapshot,
            status: if cursor.is_some() {
                ThreadStatus::Ready
            } else {
                ThreadStatus::Completed
            },
            cursor,
            pending: VecDeque::new(),
            resolved: Vec::new(),
            step: 0,
            interrupts: 0,
            history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Record the current snapshot as a new checkpoint, keeping at most `limit`
    pub fn checkpoint(&mut self, node: Option<&str>, limit: usize) {
        let now = Utc::now();
        self.history.push(Checkpoint {
            step: self.step,
            node: node.map(str::to_string),
            cursor: self.cursor.clone(),
            snapshot: self.snapshot.clone(),
            created_at: now,
        });
        if self.history.len() > limit {
            let excess = self.history.len() - limit;
            self.history.drain(..excess);
        }
        self.updated_at = now;
    }

    /// Checkpoint recorded at `step`, if still retained
    pub fn checkpoint_at(&self, step: u64) -> Option<&Checkpoint> {
        self.history.iter().find(|cp| cp.step == step)
    }
}

/// Persistence for threads, keyed by thread id
#[async_trait]
pub trait ThreadStore: Send + Sync {
    /// Load a thread; `None` means start fresh
    async fn get(&self, thread_id: &str) -> Result<Option<Thread>>;

    /// Atomically replace the stored thread
    async fn put(&self, thread: &Thread) -> Result<()>;

    /// Remove a thread; returns whether it existed
    async fn delete(&self, thread_id: &str) -> Result<bool>;

    /// Ids of all stored threads, sorted
    async fn list(&self) -> Result<Vec<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tollgate::workflow::state::{StateDelta, StateSchema};
    use serde_json::json;

    #[test]
    fn test_new_thread_status_follows_cursor() {
        let ready = Thread::new("t1", StateSnapshot::empty(), Some("chat".into()));
        assert_eq!(ready.status, ThreadStatus::Ready);

        let done = Thread::new("t2", StateSnapshot::empty(), None);
        assert_eq!(done.status, ThreadStatus::Completed);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut thread = Thread::new("t1", StateSnapshot::empty(), Some("a".into()));
        for i in 0..5u64 {
            thread.step = i;
            thread
                .snapshot
                .apply(&StateDelta::new().set("n", json!(i)), &StateSchema::default())
                .unwrap();
            thread.checkpoint(Some("a"), 3);
        }

        let steps: Vec<u64> = thread.history.iter().map(|cp| cp.step).collect();
        assert_eq!(steps, vec![2, 3, 4]);
        assert!(thread.checkpoint_at(1).is_none());
        assert_eq!(
            thread.checkpoint_at(3).unwrap().snapshot.get("n"),
            Some(&json!(3))
        );
    }
}
