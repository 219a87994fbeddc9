// SPDX-License-Identifier: MIT

//! Typed error handling for tollgate-rs
//!
//! Every failure the engine can report is a variant of [`TollgateError`].
//! The recoverable ones (`InvalidResumeInput`, `NoPendingInterrupt`,
//! `ThreadBusy`) tell the caller to correct its request and retry; the rest
//! abort the current step and leave the persisted thread untouched.

use thiserror::Error;

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, TollgateError>;

/// Top-level error type for tollgate-rs
#[derive(Debug, Error)]
pub enum TollgateError {
    /// Bad node, edge or routing reference
    #[error("Malformed workflow: {0}")]
    MalformedWorkflow(String),

    /// Resume input sent to a thread that is not paused, or plain input sent
    /// to a paused one
    #[error("Invalid resume input: {0}")]
    InvalidResumeInput(String),

    /// A resume decision arrived but nothing is waiting for one
    #[error("No pending interrupt for thread '{thread_id}'")]
    NoPendingInterrupt { thread_id: String },

    /// A node referenced a tool that is not registered
    #[error("Tool '{name}' not found")]
    UnknownTool { name: String },

    /// Another invocation holds the thread
    #[error("Thread '{thread_id}' is busy")]
    ThreadBusy { thread_id: String },

    /// The caller asked for a thread that was never created
    #[error("Thread '{thread_id}' not found")]
    ThreadNotFound { thread_id: String },

    /// Time travel to a step whose checkpoint is not retained
    #[error("Thread '{thread_id}' has no checkpoint at step {step}")]
    CheckpointNotFound { thread_id: String, step: u64 },

    /// Step budget for a single invocation exhausted
    #[error("Recursion limit of {limit} steps reached")]
    RecursionLimit { limit: u32 },

    /// A state delta could not be merged under the field's reducer
    #[error("Invalid update for field '{field}': {message}")]
    InvalidDelta { field: String, message: String },

    /// Node logic failed
    #[error("Node '{node}' failed: {message}")]
    Node { node: String, message: String },

    /// Model invocation failed
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    /// Routing condition could not be parsed
    #[error("Condition error: {0}")]
    Condition(String),

    /// Thread store failure
    #[error("Store error: {0}")]
    Store(String),

    /// Configuration errors (missing env vars, invalid values)
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Model/LLM-specific errors
#[derive(Debug, Error)]
pub enum ModelError {
    /// API key not configured
    #[error("API key not configured for provider: {0}")]
    ApiKeyMissing(String),

    /// Provider returned a non-success status
    #[error("API error from {provider}: {message}")]
    Api { provider: String, message: String },

    /// Invalid response from model
    #[error("Invalid response from model: {0}")]
    InvalidResponse(String),

    /// Anything a third-party `Model` implementation reported
    #[error("{0}")]
    Other(String),
}

impl TollgateError {
    /// Create a malformed workflow error
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedWorkflow(message.into())
    }

    /// Create an invalid resume input error
    pub fn invalid_resume(message: impl Into<String>) -> Self {
        Self::InvalidResumeInput(message.into())
    }

    /// Create a no-pending-interrupt error
    pub fn no_pending(thread_id: impl Into<String>) -> Self {
        Self::NoPendingInterrupt {
            thread_id: thread_id.into(),
        }
    }

    /// Create an unknown tool error
    pub fn unknown_tool(name: impl Into<String>) -> Self {
        Self::UnknownTool { name: name.into() }
    }

    /// Create a thread busy error
    pub fn busy(thread_id: impl Into<String>) -> Self {
        Self::ThreadBusy {
            thread_id: thread_id.into(),
        }
    }

    /// Create a thread not found error
    pub fn thread_not_found(thread_id: impl Into<String>) -> Self {
        Self::ThreadNotFound {
            thread_id: thread_id.into(),
        }
    }

    /// Create a node failure error
    pub fn node(node: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Node {
            node: node.into(),
            message: message.into(),
        }
    }

    /// Create an invalid delta error
    pub fn invalid_delta(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidDelta {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a store error
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store(message.into())
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Whether the caller can fix its request and try again
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InvalidResumeInput(_) | Self::NoPendingInterrupt { .. } | Self::ThreadBusy { .. }
        )
    }
}

// Model and Tool implementations report boxed errors
impl From<Box<dyn std::error::Error + Send + Sync>> for ModelError {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        Self::Other(err.to_string())
    }
}
