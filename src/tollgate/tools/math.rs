//! Arithmetic tools used by the demo workflows

use crate::adk::tool::{FnTool, Tool};
use futures::FutureExt;
use once_cell::sync::Lazy;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::error::Error;
use std::sync::Arc;

// --- Static schema ---

static OPERANDS_SCHEMA: Lazy<Value> = Lazy::new(|| {
    let mut schema = serde_json::to_value(schemars::schema_for!(Operands))
        .unwrap_or_else(|_| json!({"type": "object", "properties": {}}));
    if let Some(obj) = schema.as_object_mut() {
        obj.remove("$schema");
        obj.remove("title");
    }
    schema
});

/// Arguments shared by every arithmetic tool
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct Operands {
    /// First operand
    pub a: f64,
    /// Second operand
    pub b: f64,
}

type BinaryOp = fn(f64, f64) -> Result<f64, String>;

fn binary_tool(name: &str, description: &str, op: BinaryOp) -> Arc<dyn Tool> {
    Arc::new(FnTool::new(
        name,
        description,
        OPERANDS_SCHEMA.clone(),
        move |input: Value| {
            async move {
                let Operands { a, b } = serde_json::from_value(input)?;
                let result = op(a, b)?;
                Ok::<Value, Box<dyn Error + Send + Sync>>(number(result))
            }
            .boxed()
        },
    ))
}

/// Whole results are reported as integers
fn number(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        json!(value as i64)
    } else {
        json!(value)
    }
}

pub fn create_tools() -> Vec<Arc<dyn Tool>> {
    vec![
        binary_tool("add", "Adds a and b.", |a, b| Ok(a + b)),
        binary_tool("subtract", "Subtracts b from a.", |a, b| Ok(a - b)),
        binary_tool("multiply", "Multiplies a and b.", |a, b| Ok(a * b)),
        binary_tool("divide", "Divides a by b.", |a, b| {
            if b == 0.0 {
                Err("division by zero".to_string())
            } else {
                Ok(a / b)
            }
        }),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool(name: &str) -> Arc<dyn Tool> {
        create_tools()
            .into_iter()
            .find(|t| t.name() == name)
            .unwrap()
    }

    #[test]
    fn test_schema_lists_operands() {
        let schema = tool("add").schema().clone();
        assert_eq!(schema["type"], "object");
        assert!(schema["properties"]["a"].is_object());
        assert!(schema["properties"]["b"].is_object());
        assert_eq!(schema["required"], json!(["a", "b"]));
    }

    #[tokio::test]
    async fn test_arithmetic() {
        assert_eq!(tool("add").execute(json!({"a": 2, "b": 3})).await.unwrap(), json!(5));
        assert_eq!(
            tool("subtract").execute(json!({"a": 2, "b": 3})).await.unwrap(),
            json!(-1)
        );
        assert_eq!(
            tool("multiply").execute(json!({"a": 4, "b": 2.5})).await.unwrap(),
            json!(10)
        );
        assert_eq!(
            tool("divide").execute(json!({"a": 3, "b": 2})).await.unwrap(),
            json!(1.5)
        );
    }

    #[tokio::test]
    async fn test_divide_by_zero_and_bad_args() {
        let err = tool("divide")
            .execute(json!({"a": 1, "b": 0}))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "division by zero");

        assert!(tool("add").execute(json!({"a": "two"})).await.is_err());
    }
}
