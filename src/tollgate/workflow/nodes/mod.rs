// SPDX-License-Identifier: MIT

//! Built-in nodes
//!
//! - [`ChatNode`] - asks the injected model for the next assistant message
//! - [`ToolNode`] - runs proposed tool calls behind per-tool approval gates
//! - [`ReviewNode`] - pauses so a human can correct state fields
//! - [`SummarizeNode`] - folds older messages into a running summary

mod chat;
mod review;
mod summarize;
mod tools;

pub use chat::ChatNode;
pub use review::ReviewNode;
pub use summarize::{SummarizeNode, SUMMARIZED_THROUGH, SUMMARY};
pub use tools::{ApprovalPolicy, ToolNode};
