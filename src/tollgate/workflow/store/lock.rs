// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::adk::error::{Result, TollgateError};

/// Held for the duration of one invocation on a thread
pub type ThreadGuard = OwnedMutexGuard<()>;

/// What a second invocation on a busy thread does
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusyPolicy {
    /// Queue behind the running invocation
    Wait,
    /// Return `ThreadBusy` immediately
    #[default]
    FailFast,
}

impl FromStr for BusyPolicy {
    type Err = TollgateError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "wait" => Ok(Self::Wait),
            "fail_fast" => Ok(Self::FailFast),
            other => Err(TollgateError::config(format!(
                "unknown busy policy '{}', expected 'wait' or 'fail_fast'",
                other
            ))),
        }
    }
}

/// Per-thread mutual exclusion. Distinct ids never contend.
#[derive(Default)]
pub struct ThreadLocks {
    table: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ThreadLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, thread_id: &str, policy: BusyPolicy) -> Result<ThreadGuard> {
        let lock = {
            let mut table = self.table.lock().await;
            table.entry(thread_id.to_string()).or_default().clone()
        };
        match policy {
            BusyPolicy::Wait => Ok(lock.lock_owned().await),
            BusyPolicy::FailFast => lock
                .try_lock_owned()
                .map_err(|_| TollgateError::busy(thread_id)),
        }
    }

    /// Drop a thread's entry unless someone still holds or waits on it
    pub async fn forget(&self, thread_id: &str) {
        let mut table = self.table.lock().await;
        if table
            .get(thread_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            table.remove(thread_id);
        }
    }

    /// Number of thread ids with an entry
    pub async fn tracked(&self) -> usize {
        self.table.lock().await.len()
    }
}
