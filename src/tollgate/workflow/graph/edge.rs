use std::collections::BTreeMap;
use std::sync::Arc;

use crate::adk::error::{Result, TollgateError};
use crate::tollgate::workflow::condition::{self, Expression};
use crate::tollgate::workflow::state::StateSnapshot;

/// Terminal pseudo-node
pub const END: &str = "__end__";

/// Picks a route label from the state after the source node completes
pub trait Router: Send + Sync {
    fn route(&self, state: &StateSnapshot) -> Result<String>;
}

/// Router backed by a closure
pub struct FnRouter<F>(pub F);

impl<F> Router for FnRouter<F>
where
    F: Fn(&StateSnapshot) -> String + Send + Sync,
{
    fn route(&self, state: &StateSnapshot) -> Result<String> {
        Ok((self.0)(state))
    }
}

/// Routes to the tool node when the last message proposes tool calls, and
/// to `END` otherwise
pub struct ToolsCondition {
    tools_route: String,
}

impl ToolsCondition {
    pub fn new(tools_route: impl Into<String>) -> Self {
        Self {
            tools_route: tools_route.into(),
        }
    }
}

impl Default for ToolsCondition {
    fn default() -> Self {
        Self::new("tools")
    }
}

impl Router for ToolsCondition {
    fn route(&self, state: &StateSnapshot) -> Result<String> {
        let wants_tools = state
            .last_message()?
            .map(|m| m.has_tool_calls())
            .unwrap_or(false);
        Ok(if wants_tools {
            self.tools_route.clone()
        } else {
            END.to_string()
        })
    }
}

/// Ordered `when` expressions; the first one that holds wins
pub struct ConditionRouter {
    branches: Vec<(Expression, String)>,
    default: String,
}

impl ConditionRouter {
    /// Parse every branch up front
    pub fn new(branches: Vec<(String, String)>, default: impl Into<String>) -> Result<Self> {
        let branches = branches
            .into_iter()
            .map(|(when, to)| {
                condition::parse(&when)
                    .map(|expr| (expr, to))
                    .map_err(|e| TollgateError::malformed(format!("route '{}': {}", when, e)))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            branches,
            default: default.into(),
        })
    }

    /// Every label this router can return
    pub fn targets(&self) -> Vec<String> {
        let mut targets: Vec<String> = self.branches.iter().map(|(_, to)| to.clone()).collect();
        targets.push(self.default.clone());
        targets
    }
}

impl Router for ConditionRouter {
    fn route(&self, state: &StateSnapshot) -> Result<String> {
        Ok(self
            .branches
            .iter()
            .find(|(expr, _)| condition::evaluate(expr, state))
            .map(|(_, to)| to.clone())
            .unwrap_or_else(|| self.default.clone()))
    }
}

/// Outgoing edge of a node
#[derive(Clone)]
pub enum Edge {
    /// Always continue to the target
    Direct(String),
    /// Ask the router for a label, then map it to a target
    Conditional {
        router: Arc<dyn Router>,
        routes: BTreeMap<String, String>,
    },
}

impl Edge {
    /// Nodes this edge may lead to
    pub fn targets(&self) -> Vec<&str> {
        match self {
            Edge::Direct(target) => vec![target.as_str()],
            Edge::Conditional { routes, .. } => routes.values().map(String::as_str).collect(),
        }
    }

    /// Resolve the next node for `from`.
    ///
    /// A label outside the declared routes is a malformed workflow, not a
    /// silent stop.
    pub fn next(&self, from: &str, state: &StateSnapshot) -> Result<String> {
        match self {
            Edge::Direct(target) => Ok(target.clone()),
            Edge::Conditional { router, routes } => {
                let label = router.route(state)?;
                routes.get(&label).cloned().ok_or_else(|| {
                    TollgateError::malformed(format!(
                        "router on '{}' returned '{}', which is not one of its routes",
                        from, label
                    ))
                })
            }
        }
    }
}

/// Identity route map, label == target
pub fn identity_routes<I, S>(targets: I) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    targets
        .into_iter()
        .map(|t| {
            let t = t.into();
            (t.clone(), t)
        })
        .collect()
}
