// SPDX-License-Identifier: MIT

use crate::adk::error::{Result, TollgateError};
use crate::adk::tool::Tool;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Name-keyed table of callable tools, shared by clones
#[derive(Clone)]
pub struct ToolRegistry {
    tools: Arc<RwLock<HashMap<String, Arc<dyn Tool>>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn register(&self, tool: Arc<dyn Tool>) {
        let mut tools = self.tools.write().await;
        tools.insert(tool.name().to_string(), tool);
    }

    pub async fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        let tools = self.tools.read().await;
        tools.get(name).cloned()
    }

    /// Like `get`, but an unregistered name is an `UnknownTool` error
    pub async fn require(&self, name: &str) -> Result<Arc<dyn Tool>> {
        self.get(name)
            .await
            .ok_or_else(|| TollgateError::unknown_tool(name))
    }

    /// Resolve a list of names in order, failing on the first unknown one
    pub async fn resolve(&self, names: &[String]) -> Result<Vec<Arc<dyn Tool>>> {
        let tools = self.tools.read().await;
        names
            .iter()
            .map(|name| {
                tools
                    .get(name)
                    .cloned()
                    .ok_or_else(|| TollgateError::unknown_tool(name))
            })
            .collect()
    }

    /// Registered tool names, sorted
    pub async fn names(&self) -> Vec<String> {
        let tools = self.tools.read().await;
        let mut names: Vec<String> = tools.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adk::tool::FnTool;
    use futures::FutureExt;
    use serde_json::{json, Value};
    use std::error::Error;

    fn stub(name: &str) -> Arc<dyn Tool> {
        Arc::new(FnTool::new(
            name,
            format!("Stub tool: {}", name),
            json!({"type": "object", "properties": {}}),
            |_| async { Ok::<Value, Box<dyn Error + Send + Sync>>(json!(null)) }.boxed(),
        ))
    }

    #[tokio::test]
    async fn test_register_and_require() {
        let registry = ToolRegistry::new();
        registry.register(stub("add")).await;

        assert_eq!(registry.require("add").await.unwrap().name(), "add");
        match registry.require("rm").await {
            Err(TollgateError::UnknownTool { name }) => assert_eq!(name, "rm"),
            Err(other) => panic!("Expected UnknownTool, got {}", other),
            Ok(_) => panic!("Expected UnknownTool for an unregistered name"),
        }
    }

    #[tokio::test]
    async fn test_resolve_keeps_order_and_rejects_unknown() {
        let registry = ToolRegistry::new();
        registry.register(stub("add")).await;
        registry.register(stub("divide")).await;

        let tools = registry
            .resolve(&["divide".to_string(), "add".to_string()])
            .await
            .unwrap();
        let names: Vec<&str> = tools.iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["divide", "add"]);

        assert!(registry
            .resolve(&["add".to_string(), "nope".to_string()])
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_registry_is_clone() {
        let registry = ToolRegistry::new();
        registry.register(stub("lookup")).await;

        let cloned = registry.clone();
        assert!(cloned.get("lookup").await.is_some());

        // clones share one table
        cloned.register(stub("notify")).await;
        assert_eq!(registry.names().await, vec!["lookup", "notify"]);
    }
}
