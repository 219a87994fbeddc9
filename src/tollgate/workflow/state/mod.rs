// SPDX-License-Identifier: MIT

//! State management for workflows
//!
//! This module provides:
//! - `StateSchema` - defines the shape of thread state and each field's reducer
//! - `StateSnapshot` - the merged state of a thread at one point in time
//! - `StateDelta` - the updates a single node produced

mod schema;
mod snapshot;

pub use schema::{FieldType, ReducerType, StateFieldDef, StateSchema, MESSAGES};
pub use snapshot::{StateDelta, StateSnapshot};
