// SPDX-License-Identifier: MIT

//! Snapshot and delta types for thread state

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::schema::{ReducerType, StateSchema, MESSAGES};
use crate::adk::error::{Result, TollgateError};
use crate::adk::model::Content;

/// Merged state of a thread at one point in time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateSnapshot {
    fields: BTreeMap<String, Value>,
}

/// Ordered field updates produced by one node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateDelta {
    updates: Vec<(String, Value)>,
}

impl StateDelta {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an update for `field`
    pub fn set(mut self, field: impl Into<String>, value: Value) -> Self {
        self.updates.push((field.into(), value));
        self
    }

    /// Add an update in place
    pub fn push(&mut self, field: impl Into<String>, value: Value) {
        self.updates.push((field.into(), value));
    }

    /// Append one message to the `messages` field
    pub fn message(self, content: &Content) -> Result<Self> {
        Ok(self.set(MESSAGES, serde_json::to_value(content)?))
    }

    /// Build a delta from a JSON object, one update per key
    pub fn from_object(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self {
                updates: map.into_iter().collect(),
            }),
            other => Err(TollgateError::invalid_delta(
                "<input>",
                format!("expected a JSON object, got {}", other),
            )),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.updates.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.updates.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Render as a JSON object; later updates to the same field win
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        for (k, v) in &self.updates {
            map.insert(k.clone(), v.clone());
        }
        Value::Object(map)
    }
}

impl StateSnapshot {
    /// Create a snapshot seeded with the schema's default values
    pub fn new(schema: &StateSchema) -> Self {
        let fields = schema
            .fields
            .iter()
            .filter_map(|(name, def)| def.default.clone().map(|d| (name.clone(), d)))
            .collect();
        Self { fields }
    }

    /// Create an empty snapshot
    pub fn empty() -> Self {
        Self::default()
    }

    /// Fold a delta into the snapshot.
    ///
    /// All-or-nothing: if any update does not fit its field's reducer the
    /// snapshot is left exactly as it was.
    pub fn apply(&mut self, delta: &StateDelta, schema: &StateSchema) -> Result<()> {
        let mut next = self.fields.clone();
        for (field, value) in delta.iter() {
            reduce(&mut next, field, value.clone(), schema.reducer_for(field))?;
        }
        self.fields = next;
        Ok(())
    }

    /// Get a field value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Get a nested value using dot notation (e.g., "result.intent")
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let mut current = self.fields.get(parts.next()?)?;
        for part in parts {
            current = match current {
                Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
                other => other.get(part)?,
            };
        }
        Some(current)
    }

    /// Decode the `messages` field
    pub fn messages(&self) -> Result<Vec<Content>> {
        match self.fields.get(MESSAGES) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(value) => Ok(serde_json::from_value(value.clone())?),
        }
    }

    /// Last message in the history, if any
    pub fn last_message(&self) -> Result<Option<Content>> {
        match self.fields.get(MESSAGES) {
            Some(Value::Array(items)) => match items.last() {
                Some(last) => Ok(Some(serde_json::from_value(last.clone())?)),
                None => Ok(None),
            },
            _ => Ok(None),
        }
    }

    /// Number of entries in the `messages` field
    pub fn message_count(&self) -> usize {
        match self.fields.get(MESSAGES) {
            Some(Value::Array(items)) => items.len(),
            _ => 0,
        }
    }

    /// Convert state to a JSON object
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.fields
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    /// Get all field names
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.fields.keys()
    }
}

fn reduce(
    fields: &mut BTreeMap<String, Value>,
    key: &str,
    value: Value,
    reducer: ReducerType,
) -> Result<()> {
    match reducer {
        ReducerType::Overwrite => {
            fields.insert(key.to_string(), value);
        }
        ReducerType::Append => {
            let slot = fields.entry(key.to_string()).or_insert(Value::Null);
            if slot.is_null() {
                *slot = Value::Array(Vec::new());
            }
            let Value::Array(items) = slot else {
                return Err(TollgateError::invalid_delta(key, "append onto a non-array"));
            };
            match value {
                Value::Array(new_items) => items.extend(new_items),
                other => items.push(other),
            }
        }
        ReducerType::Max | ReducerType::Min => {
            let new = value
                .as_f64()
                .ok_or_else(|| TollgateError::invalid_delta(key, "expected a number"))?;
            let replace = match fields.get(key).and_then(Value::as_f64) {
                None => true,
                Some(current) if reducer == ReducerType::Max => new > current,
                Some(current) => new < current,
            };
            if replace {
                fields.insert(key.to_string(), value);
            }
        }
        ReducerType::Merge => {
            let Value::Object(new_obj) = value else {
                return Err(TollgateError::invalid_delta(key, "merge expects an object"));
            };
            let slot = fields.entry(key.to_string()).or_insert(Value::Null);
            if slot.is_null() {
                *slot = Value::Object(Map::new());
            }
            let Value::Object(current) = slot else {
                return Err(TollgateError::invalid_delta(key, "merge onto a non-object"));
            };
            current.extend(new_obj);
        }
    }
    Ok(())
}
