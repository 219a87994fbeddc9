//! Workflow loader - YAML file loading and parsing
//!
//! This module handles loading workflow definitions from YAML files.

use super::types::WorkflowDefinition;
use crate::adk::error::Result;
use std::fs;
use std::path::Path;

/// Loads workflow definitions from YAML files
pub struct WorkflowLoader;

impl WorkflowLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load a workflow definition from a YAML file
    pub fn load_workflow<P: AsRef<Path>>(&self, path: P) -> Result<WorkflowDefinition> {
        let path = path.as_ref();
        log::debug!("Loading workflow from {}", path.display());
        let content = fs::read_to_string(path)?;
        Self::parse_yaml(&content)
    }

    /// Parse a workflow definition from a YAML string
    pub fn parse_yaml(content: &str) -> Result<WorkflowDefinition> {
        let def: WorkflowDefinition = serde_yaml::from_str(content)?;
        Ok(def)
    }
}

impl Default for WorkflowLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adk::error::TollgateError;
    use crate::tollgate::workflow::state::ReducerType;
    use crate::tollgate::workflow::store::BusyPolicy;
    use crate::tollgate::workflow::types::{EdgeDefinition, NodeSpec};
    use std::io::Write;

    const CALCULATOR: &str = r#"
name: calculator
description: "Arithmetic assistant with an approval gate on division"

state:
  messages:
    type: array
    reducer: append

start: agent

nodes:
  - id: agent
    kind: chat
    instructions: "You are a helpful assistant tasked with performing arithmetic."
    tools: [add, multiply, divide]
  - id: tools
    kind: tools
    approval:
      divide:
        require_approval: true
        description: "Please review the division"

edges:
  - from: agent
    route: tools_condition
  - from: tools
    to: agent

runtime:
  recursion_limit: 10
  busy_policy: wait
"#;

    #[test]
    fn test_parse_workflow() {
        let def = WorkflowLoader::parse_yaml(CALCULATOR).unwrap();
        assert_eq!(def.name, "calculator");
        assert_eq!(def.start, "agent");
        assert_eq!(def.nodes.len(), 2);
        assert_eq!(def.edges.len(), 2);
        assert_eq!(def.state.reducer_for("messages"), ReducerType::Append);

        match &def.nodes[0].spec {
            NodeSpec::Chat { tools, keep_last, .. } => {
                assert_eq!(tools, &vec!["add", "multiply", "divide"]);
                assert!(keep_last.is_none());
            }
            other => panic!("Expected Chat, got {:?}", other),
        }
        match &def.nodes[1].spec {
            NodeSpec::Tools { approval } => {
                assert!(approval["divide"].require_approval);
            }
            other => panic!("Expected Tools, got {:?}", other),
        }
        assert!(matches!(def.edges[1], EdgeDefinition::Direct { .. }));
    }

    #[test]
    fn test_runtime_defaults() {
        let def = WorkflowLoader::parse_yaml(CALCULATOR).unwrap();
        assert_eq!(def.runtime.recursion_limit, 10);
        assert_eq!(def.runtime.busy_policy, BusyPolicy::Wait);
        assert_eq!(def.runtime.history_limit, 50);

        let bare = WorkflowLoader::parse_yaml(
            "name: bare\nstart: a\nnodes:\n  - id: a\n    kind: tools\n",
        )
        .unwrap();
        assert_eq!(bare.runtime.recursion_limit, 25);
        assert!(bare.edges.is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CALCULATOR.as_bytes()).unwrap();

        let def = WorkflowLoader::new().load_workflow(file.path()).unwrap();
        assert_eq!(def.name, "calculator");

        let missing = WorkflowLoader::new().load_workflow("/definitely/not/here.yaml");
        assert!(matches!(missing, Err(TollgateError::Io(_))));
    }

    #[test]
    fn test_invalid_yaml_returns_error() {
        let yaml = r#"
name:
  - invalid structure
"#;
        let result = WorkflowLoader::parse_yaml(yaml);
        assert!(matches!(result, Err(TollgateError::Yaml(_))));
    }
}
