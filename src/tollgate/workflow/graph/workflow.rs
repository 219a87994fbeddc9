// SPDX-License-Identifier: MIT

//! Workflow graph construction and validation

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;

use super::edge::{identity_routes, Edge, FnRouter, Router, END};
use super::node::Node;
use crate::adk::error::{Result, TollgateError};
use crate::tollgate::workflow::state::{StateSchema, StateSnapshot};

/// Mutable graph under construction.
///
/// Mistakes are collected and reported together by [`WorkflowGraph::compile`].
pub struct WorkflowGraph {
    name: String,
    schema: StateSchema,
    nodes: HashMap<String, Arc<dyn Node>>,
    order: Vec<String>,
    edges: HashMap<String, Edge>,
    terminals: HashSet<String>,
    start: Option<String>,
    errors: Vec<String>,
}

impl WorkflowGraph {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: StateSchema::default(),
            nodes: HashMap::new(),
            order: Vec::new(),
            edges: HashMap::new(),
            terminals: HashSet::new(),
            start: None,
            errors: Vec::new(),
        }
    }

    pub fn with_schema(mut self, schema: StateSchema) -> Self {
        self.schema = schema;
        self
    }

    pub fn add_node(mut self, name: impl Into<String>, node: impl Node + 'static) -> Self {
        self.insert_node(name.into(), Arc::new(node));
        self
    }

    /// Add a node that is already shared
    pub fn add_shared_node(mut self, name: impl Into<String>, node: Arc<dyn Node>) -> Self {
        self.insert_node(name.into(), node);
        self
    }

    fn insert_node(&mut self, name: String, node: Arc<dyn Node>) {
        if name == END {
            self.errors.push(format!("'{}' is reserved", END));
        } else if self.nodes.contains_key(&name) {
            self.errors.push(format!("duplicate node '{}'", name));
        } else {
            self.order.push(name.clone());
            self.nodes.insert(name, node);
        }
    }

    pub fn set_start(mut self, name: impl Into<String>) -> Self {
        self.start = Some(name.into());
        self
    }

    /// Declare a node whose completion ends the thread
    pub fn set_terminal(mut self, name: impl Into<String>) -> Self {
        self.terminals.insert(name.into());
        self
    }

    pub fn add_edge(self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.insert_edge(from.into(), Edge::Direct(to.into()))
    }

    /// Conditional edge whose router returns target names directly
    pub fn add_conditional_edges<I, S>(
        self,
        from: impl Into<String>,
        router: impl Router + 'static,
        targets: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add_routed_edges(from, router, identity_routes(targets))
    }

    /// Conditional edge with an explicit label -> target map
    pub fn add_routed_edges(
        self,
        from: impl Into<String>,
        router: impl Router + 'static,
        routes: BTreeMap<String, String>,
    ) -> Self {
        self.insert_edge(
            from.into(),
            Edge::Conditional {
                router: Arc::new(router),
                routes,
            },
        )
    }

    /// Conditional edge driven by a closure returning a target name
    pub fn add_routing_fn<F, I, S>(self, from: impl Into<String>, func: F, targets: I) -> Self
    where
        F: Fn(&StateSnapshot) -> String + Send + Sync + 'static,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add_conditional_edges(from, FnRouter(func), targets)
    }

    fn insert_edge(mut self, from: String, edge: Edge) -> Self {
        if self.edges.contains_key(&from) {
            self.errors
                .push(format!("node '{}' already has an outgoing edge", from));
        } else {
            self.edges.insert(from, edge);
        }
        self
    }

    /// Validate and freeze the graph
    pub fn compile(self) -> Result<Workflow> {
        let mut errors = self.errors;

        let start = match &self.start {
            None => {
                errors.push("no start node".to_string());
                String::new()
            }
            Some(start) if !self.nodes.contains_key(start) => {
                errors.push(format!("start node '{}' does not exist", start));
                start.clone()
            }
            Some(start) => start.clone(),
        };

        for terminal in &self.terminals {
            if !self.nodes.contains_key(terminal) {
                errors.push(format!("terminal '{}' is not a node", terminal));
            }
        }

        let mut sources: Vec<&String> = self.edges.keys().collect();
        sources.sort();
        for from in sources {
            if !self.nodes.contains_key(from) {
                errors.push(format!("edge from unknown node '{}'", from));
            }
            for target in self.edges[from].targets() {
                if target != END && !self.nodes.contains_key(target) {
                    errors.push(format!("edge '{}' -> '{}': no such node", from, target));
                }
            }
        }

        if errors.is_empty() {
            let reachable = reachable_from(&start, &self.edges);
            for name in &self.order {
                if !reachable.contains(name) {
                    log::warn!("Workflow '{}': node '{}' is unreachable", self.name, name);
                } else if !self.edges.contains_key(name) && !self.terminals.contains(name) {
                    errors.push(format!(
                        "node '{}' has no outgoing edge and is not terminal",
                        name
                    ));
                }
            }
        }

        if !errors.is_empty() {
            return Err(TollgateError::malformed(format!(
                "workflow '{}': {}",
                self.name,
                errors.join("; ")
            )));
        }

        log::info!(
            "Compiled workflow '{}' with {} nodes, starting at '{}'",
            self.name,
            self.nodes.len(),
            start
        );
        Ok(Workflow {
            name: self.name,
            schema: self.schema,
            nodes: self.nodes,
            edges: self.edges,
            terminals: self.terminals,
            start,
        })
    }
}

fn reachable_from(start: &str, edges: &HashMap<String, Edge>) -> HashSet<String> {
    let mut seen = HashSet::new();
    let mut queue = VecDeque::from([start.to_string()]);
    while let Some(name) = queue.pop_front() {
        if name == END || !seen.insert(name.clone()) {
            continue;
        }
        if let Some(edge) = edges.get(&name) {
            queue.extend(edge.targets().into_iter().map(str::to_string));
        }
    }
    seen
}

/// A validated, immutable workflow
pub struct Workflow {
    name: String,
    schema: StateSchema,
    nodes: HashMap<String, Arc<dyn Node>>,
    edges: HashMap<String, Edge>,
    terminals: HashSet<String>,
    start: String,
}

impl Workflow {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &StateSchema {
        &self.schema
    }

    pub fn start(&self) -> &str {
        &self.start
    }

    pub fn node(&self, name: &str) -> Result<&Arc<dyn Node>> {
        self.nodes
            .get(name)
            .ok_or_else(|| TollgateError::malformed(format!("no node named '{}'", name)))
    }

    /// Node to run after `from`, or `None` when the thread ends
    pub fn next(&self, from: &str, state: &StateSnapshot) -> Result<Option<String>> {
        let next = match self.edges.get(from) {
            Some(edge) => edge.next(from, state)?,
            None if self.terminals.contains(from) => END.to_string(),
            None => {
                return Err(TollgateError::malformed(format!(
                    "node '{}' has no outgoing edge",
                    from
                )))
            }
        };
        Ok(if next == END { None } else { Some(next) })
    }
}
