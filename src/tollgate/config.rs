// SPDX-License-Identifier: MIT

//! Runner configuration
//!
//! Values come from the optional `runtime:` section of a workflow file and
//! can be overridden with `TOLLGATE_*` environment variables.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::adk::error::{Result, TollgateError};
use crate::tollgate::workflow::store::BusyPolicy;

pub const ENV_RECURSION_LIMIT: &str = "TOLLGATE_RECURSION_LIMIT";
pub const ENV_BUSY_POLICY: &str = "TOLLGATE_BUSY_POLICY";
pub const ENV_HISTORY_LIMIT: &str = "TOLLGATE_HISTORY_LIMIT";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Steps one invocation may take before failing with `RecursionLimit`
    pub recursion_limit: u32,
    pub busy_policy: BusyPolicy,
    /// Checkpoints retained per thread
    pub history_limit: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            recursion_limit: 25,
            busy_policy: BusyPolicy::FailFast,
            history_limit: 50,
        }
    }
}

impl RunnerConfig {
    /// Apply overrides from the process environment
    pub fn with_env_overrides(self) -> Result<Self> {
        let mut envs = HashMap::new();
        for key in [ENV_RECURSION_LIMIT, ENV_BUSY_POLICY, ENV_HISTORY_LIMIT] {
            if let Ok(value) = std::env::var(key) {
                envs.insert(key.to_string(), value);
            }
        }
        self.with_overrides(&envs)
    }

    fn with_overrides(mut self, envs: &HashMap<String, String>) -> Result<Self> {
        if let Some(raw) = envs.get(ENV_RECURSION_LIMIT) {
            self.recursion_limit = parse_number(ENV_RECURSION_LIMIT, raw)?;
        }
        if let Some(raw) = envs.get(ENV_BUSY_POLICY) {
            self.busy_policy = raw.parse()?;
        }
        if let Some(raw) = envs.get(ENV_HISTORY_LIMIT) {
            self.history_limit = parse_number(ENV_HISTORY_LIMIT, raw)?;
        }
        if self.recursion_limit == 0 {
            return Err(TollgateError::config("recursion_limit must be at least 1"));
        }
        if self.history_limit == 0 {
            return Err(TollgateError::config("history_limit must be at least 1"));
        }
        Ok(self)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| TollgateError::config(format!("invalid {}='{}'", key, raw)))
}
