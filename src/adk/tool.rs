use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;
use std::error::Error;
use std::sync::Arc;

/// Trait for tools that a workflow can call.
///
/// `name()` and `description()` return `&str` and `schema()` returns `&Value`
/// so implementations store them once instead of allocating per call.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Returns the tool name (must be unique within a registry)
    fn name(&self) -> &str;

    /// Returns a human-readable description of what the tool does
    fn description(&self) -> &str;

    /// Returns the JSON schema for the tool's input parameters
    fn schema(&self) -> &Value;

    /// Execute the tool with the given input and return the result
    async fn execute(&self, input: Value) -> Result<Value, Box<dyn Error + Send + Sync>>;
}

type ToolFn =
    dyn Fn(Value) -> BoxFuture<'static, Result<Value, Box<dyn Error + Send + Sync>>> + Send + Sync;

/// A tool backed by an async closure
pub struct FnTool {
    name: String,
    description: String,
    schema: Value,
    func: Arc<ToolFn>,
}

impl FnTool {
    pub fn new<F>(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: Value,
        func: F,
    ) -> Self
    where
        F: Fn(Value) -> BoxFuture<'static, Result<Value, Box<dyn Error + Send + Sync>>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            schema,
            func: Arc::new(func),
        }
    }
}

#[async_trait]
impl Tool for FnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn schema(&self) -> &Value {
        &self.schema
    }

    async fn execute(&self, input: Value) -> Result<Value, Box<dyn Error + Send + Sync>> {
        (self.func)(input).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use serde_json::json;

    #[tokio::test]
    async fn test_fn_tool_executes_closure() {
        let tool = FnTool::new(
            "echo",
            "Echo the input back",
            json!({"type": "object"}),
            |input| {
                async move { Ok::<Value, Box<dyn Error + Send + Sync>>(json!({ "echo": input })) }
                    .boxed()
            },
        );

        assert_eq!(tool.name(), "echo");
        assert_eq!(tool.description(), "Echo the input back");
        assert_eq!(tool.schema()["type"], "object");

        let out = tool.execute(json!({"x": 1})).await.unwrap();
        assert_eq!(out, json!({"echo": {"x": 1}}));
    }

    #[tokio::test]
    async fn test_fn_tool_propagates_error() {
        let tool = FnTool::new("fail", "Always fails", json!({}), |_| {
            async move { Err::<Value, Box<dyn Error + Send + Sync>>("nope".into()) }.boxed()
        });

        let err = tool.execute(json!({})).await.unwrap_err();
        assert_eq!(err.to_string(), "nope");
    }
}
