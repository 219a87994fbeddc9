// SPDX-License-Identifier: MIT

//! State schema definitions

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Field that carries the conversation history
pub const MESSAGES: &str = "messages";

/// Schema defining the workflow state structure
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct StateSchema {
    /// Field definitions
    #[serde(flatten)]
    pub fields: HashMap<String, StateFieldDef>,
}

/// Definition of a single state field
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct StateFieldDef {
    /// Type of the field
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Reducer for merging values
    #[serde(default)]
    pub reducer: ReducerType,
    /// Default value
    pub default: Option<serde_json::Value>,
}

/// Supported field types
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Array,
    Object,
}

/// Reducer types for merging values into state
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ReducerType {
    /// Replace the value (default)
    #[default]
    Overwrite,
    /// Append to array
    Append,
    /// Keep maximum value
    Max,
    /// Keep minimum value
    Min,
    /// Shallow merge objects
    Merge,
}

impl StateSchema {
    /// Schema with an appending `messages` field, the shape every chat
    /// workflow starts from
    pub fn messages() -> Self {
        Self::default().with_field(MESSAGES, FieldType::Array, ReducerType::Append)
    }

    /// Add or replace a field definition
    pub fn with_field(mut self, name: &str, field_type: FieldType, reducer: ReducerType) -> Self {
        self.fields.insert(
            name.to_string(),
            StateFieldDef {
                field_type,
                reducer,
                default: None,
            },
        );
        self
    }

    /// Add or replace a field definition with a default value
    pub fn with_default(
        mut self,
        name: &str,
        field_type: FieldType,
        reducer: ReducerType,
        default: serde_json::Value,
    ) -> Self {
        self.fields.insert(
            name.to_string(),
            StateFieldDef {
                field_type,
                reducer,
                default: Some(default),
            },
        );
        self
    }

    /// Reducer for a field; undeclared fields overwrite
    pub fn reducer_for(&self, field: &str) -> ReducerType {
        self.fields
            .get(field)
            .map(|def| def.reducer)
            .unwrap_or_default()
    }
}
