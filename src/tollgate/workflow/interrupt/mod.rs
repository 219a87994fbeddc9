// SPDX-License-Identifier: MIT

//! Interrupts and resume decisions
//!
//! An interruptible node pauses by returning one [`InterruptRequest`] per
//! decision it needs. The broker turns each request into an
//! [`InterruptRecord`] owned by the thread; callers answer records one at a
//! time, in raise order, with a [`ResumeDecision`].

mod broker;

pub use broker::InterruptBroker;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A pause request produced by a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterruptRequest {
    /// Node-chosen key used to look the decision up on resume
    pub key: String,
    /// Opaque description of the decision needed
    pub payload: Value,
}

impl InterruptRequest {
    pub fn new(key: impl Into<String>, payload: Value) -> Self {
        Self {
            key: key.into(),
            payload,
        }
    }
}

/// A pending pause, persisted with the thread until a decision resolves it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterruptRecord {
    /// Resume-slot identifier, `{node}:{step}:{seq}`. `seq` counts every
    /// interrupt the thread has raised, so ids are never reused.
    pub id: String,
    /// Node that raised the interrupt
    pub node: String,
    pub key: String,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}

/// The caller's answer to an interrupt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ResumeDecision {
    /// Proceed with the proposed action unchanged
    Accept,
    /// Proceed with a replacement payload
    Edit { payload: Value },
    /// Abort the proposed action; optionally end the thread
    #[serde(alias = "ignore")]
    Reject {
        #[serde(default)]
        terminate: bool,
    },
    /// Skip the action and use the supplied value as its answer
    Respond { value: Value },
}

impl ResumeDecision {
    pub fn edit(payload: Value) -> Self {
        Self::Edit { payload }
    }

    pub fn respond(value: Value) -> Self {
        Self::Respond { value }
    }

    pub fn reject(terminate: bool) -> Self {
        Self::Reject { terminate }
    }

    /// Short name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Edit { .. } => "edit",
            Self::Reject { .. } => "reject",
            Self::Respond { .. } => "respond",
        }
    }
}

/// A record paired with the decision that resolved it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedInterrupt {
    pub record: InterruptRecord,
    pub decision: ResumeDecision,
}

/// What a thread is waiting for
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum ResumeStatus {
    /// Nothing pending and nothing waiting to be applied
    NotPaused,
    /// The next record that needs a decision
    Pending(InterruptRecord),
    /// Every record is resolved; the decisions apply on the next invocation
    Ready(Vec<ResolvedInterrupt>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decision_wire_format() {
        assert_eq!(
            serde_json::to_value(ResumeDecision::Accept).unwrap(),
            json!({"type": "accept"})
        );
        assert_eq!(
            serde_json::to_value(ResumeDecision::edit(json!({"args": {"a": 10}}))).unwrap(),
            json!({"type": "edit", "payload": {"args": {"a": 10}}})
        );

        let reject: ResumeDecision = serde_json::from_value(json!({"type": "reject"})).unwrap();
        assert_eq!(reject, ResumeDecision::reject(false));

        let respond: ResumeDecision =
            serde_json::from_value(json!({"type": "respond", "value": "use the cache"})).unwrap();
        assert_eq!(respond, ResumeDecision::respond(json!("use the cache")));
    }

    #[test]
    fn test_ignore_is_a_reject() {
        let ignore: ResumeDecision = serde_json::from_value(json!({"type": "ignore"})).unwrap();
        assert_eq!(ignore, ResumeDecision::reject(false));

        let ignore: ResumeDecision =
            serde_json::from_value(json!({"type": "ignore", "terminate": true})).unwrap();
        assert_eq!(ignore, ResumeDecision::reject(true));
        // serialized under its primary name
        assert_eq!(
            serde_json::to_value(ignore).unwrap(),
            json!({"type": "reject", "terminate": true})
        );
    }

    #[test]
    fn test_unknown_decision_is_rejected() {
        let parsed = serde_json::from_value::<ResumeDecision>(json!({"type": "skip"}));
        assert!(parsed.is_err());
    }
}
