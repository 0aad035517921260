//! Assembled workflow definitions.

use crate::errors::{AssemblyError, PipeforgeError};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet, VecDeque};

/// Error class matched by every catch clause.
pub const CATCH_ALL: &str = "States.ALL";

/// Where a caught error is written in the state input.
pub const ERROR_RESULT_PATH: &str = "$.errorInfo";

/// The kind of an assembled node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    /// A worker task.
    Task,
    /// A branch run once per iteration item.
    ParallelMap,
    /// The shared error-notification node.
    ErrorReport,
}

impl NodeType {
    /// Returns the executor state type the node is emitted as.
    #[must_use]
    pub fn as_state_type(self) -> &'static str {
        match self {
            Self::Task | Self::ErrorReport => "Task",
            Self::ParallelMap => "Map",
        }
    }
}

impl Serialize for NodeType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_state_type())
    }
}

/// A catch clause routing any failure to the error-report node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CatchClause {
    /// Error classes matched.
    pub error_equals: Vec<String>,
    /// Where the error is captured.
    pub result_path: String,
    /// The node to transition to.
    pub next: String,
}

impl CatchClause {
    /// Creates a clause matching every error.
    #[must_use]
    pub fn catch_all(next: impl Into<String>) -> Self {
        Self {
            error_equals: vec![CATCH_ALL.to_string()],
            result_path: ERROR_RESULT_PATH.to_string(),
            next: next.into(),
        }
    }
}

/// One concrete node of a workflow definition.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct GraphNode {
    /// The node kind.
    #[serde(rename = "Type")]
    pub node_type: NodeType,
    /// Executor-invocable target.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    /// Resolved invocation parameters.
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub parameters: Map<String, Value>,
    /// Where the task result is written; always discarded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_path: Option<Value>,
    /// Maximum task run time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
    /// Maximum silence between heartbeats.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heartbeat_seconds: Option<u64>,
    /// Input path of the iteration items (maps only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items_path: Option<String>,
    /// The branch run per iteration (maps only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iterator: Option<Box<GraphDefinition>>,
    /// Successor node name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    /// Marks the end of a sequence.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub end: bool,
    /// Failure routing.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub catch: Vec<CatchClause>,
}

impl GraphNode {
    pub(crate) fn bare(node_type: NodeType) -> Self {
        Self {
            node_type,
            resource: None,
            parameters: Map::new(),
            result_path: None,
            timeout_seconds: None,
            heartbeat_seconds: None,
            items_path: None,
            iterator: None,
            next: None,
            end: false,
            catch: Vec::new(),
        }
    }

    /// Sets the successor, or marks the node as the end of its sequence.
    pub(crate) fn chain(&mut self, next: Option<String>) {
        self.end = next.is_none();
        self.next = next;
    }

    /// Returns true if the node ends its sequence.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.next.is_none()
    }
}

/// A complete workflow definition: named nodes plus an entry node.
///
/// Nodes are kept in a sorted map so serialization is byte-for-byte stable.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct GraphDefinition {
    /// The entry node.
    pub start_at: String,
    /// All nodes by name.
    pub states: BTreeMap<String, GraphNode>,
}

impl GraphDefinition {
    /// Returns a node by name (top level only).
    #[must_use]
    pub fn node(&self, name: &str) -> Option<&GraphNode> {
        self.states.get(name)
    }

    /// Returns the number of nodes at every depth.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.states
            .values()
            .map(|node| 1 + node.iterator.as_ref().map_or(0, |branch| branch.node_count()))
            .sum()
    }

    /// Returns the names of the error-report nodes at every depth.
    #[must_use]
    pub fn error_nodes(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.visit(&mut |name, node| {
            if node.node_type == NodeType::ErrorReport {
                names.push(name);
            }
        });
        names
    }

    /// Returns every distinct catch target at every depth.
    #[must_use]
    pub fn catch_targets(&self) -> HashSet<&str> {
        let mut targets = HashSet::new();
        self.visit(&mut |_, node| {
            targets.extend(node.catch.iter().map(|clause| clause.next.as_str()));
        });
        targets
    }

    fn visit<'a>(&'a self, f: &mut dyn FnMut(&'a str, &'a GraphNode)) {
        for (name, node) in &self.states {
            f(name, node);
            if let Some(branch) = &node.iterator {
                branch.visit(f);
            }
        }
    }

    /// Serializes the definition to canonical JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if a parameter value cannot be serialized.
    pub fn to_json(&self) -> Result<String, PipeforgeError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Serializes the definition to indented JSON for logs and fixtures.
    ///
    /// # Errors
    ///
    /// Returns an error if a parameter value cannot be serialized.
    pub fn to_json_pretty(&self) -> Result<String, PipeforgeError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Returns the SHA-256 hex digest of the canonical JSON.
    ///
    /// Identical definitions always share a fingerprint, so it can key
    /// idempotent re-submission.
    ///
    /// # Errors
    ///
    /// Returns an error if the definition cannot be serialized.
    pub fn fingerprint(&self) -> Result<String, PipeforgeError> {
        let json = self.to_json()?;
        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());
        Ok(hex::encode(hasher.finalize()))
    }

    /// Checks the structural invariants of an assembled definition.
    ///
    /// # Errors
    ///
    /// Returns [`AssemblyError::InvalidGraph`] describing the first violation.
    pub fn validate(&self) -> Result<(), AssemblyError> {
        let error_nodes: Vec<&str> = self
            .states
            .iter()
            .filter(|(_, node)| node.node_type == NodeType::ErrorReport)
            .map(|(name, _)| name.as_str())
            .collect();
        let [sink] = error_nodes.as_slice() else {
            return Err(AssemblyError::invalid_graph(format!(
                "expected exactly one error-report node at the top level, found {}",
                error_nodes.len()
            )));
        };
        if self.error_nodes().len() != 1 {
            return Err(AssemblyError::invalid_graph(
                "error-report nodes are only allowed at the top level",
            ));
        }

        self.validate_level(sink, true)
    }

    fn validate_level(&self, sink: &str, top_level: bool) -> Result<(), AssemblyError> {
        if !self.states.contains_key(&self.start_at) {
            return Err(AssemblyError::invalid_graph(format!(
                "start node '{}' does not exist",
                self.start_at
            )));
        }

        for (name, node) in &self.states {
            if let Some(next) = &node.next {
                if !self.states.contains_key(next) {
                    return Err(AssemblyError::invalid_graph(format!(
                        "node '{name}' transitions to unknown node '{next}'"
                    )));
                }
            }

            match node.node_type {
                NodeType::ErrorReport => {
                    if node.next.is_some() || !node.catch.is_empty() {
                        return Err(AssemblyError::invalid_graph(format!(
                            "error-report node '{name}' must be a leaf"
                        )));
                    }
                }
                NodeType::Task | NodeType::ParallelMap => {
                    if node.catch.is_empty() || node.catch.iter().any(|clause| clause.next != sink) {
                        return Err(AssemblyError::invalid_graph(format!(
                            "node '{name}' does not route failures to '{sink}'"
                        )));
                    }
                    if node.next.is_none() && !node.end {
                        return Err(AssemblyError::invalid_graph(format!(
                            "node '{name}' has neither a successor nor an end marker"
                        )));
                    }
                }
            }

            match (node.node_type, &node.iterator) {
                (NodeType::ParallelMap, Some(branch)) => branch.validate_level(sink, false)?,
                (NodeType::ParallelMap, None) => {
                    return Err(AssemblyError::invalid_graph(format!(
                        "map node '{name}' has no branch"
                    )));
                }
                (_, Some(_)) => {
                    return Err(AssemblyError::invalid_graph(format!(
                        "node '{name}' carries a branch but is not a map"
                    )));
                }
                (_, None) => {}
            }
        }

        let reached = self.reachable(top_level.then_some(sink));
        if let Some(orphan) = self.states.keys().find(|name| !reached.contains(name.as_str())) {
            return Err(AssemblyError::invalid_graph(format!(
                "node '{orphan}' is unreachable from '{}'",
                self.start_at
            )));
        }

        Ok(())
    }

    fn reachable(&self, sink: Option<&str>) -> HashSet<&str> {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([self.start_at.as_str()]);

        while let Some(name) = queue.pop_front() {
            if !seen.insert(name) {
                continue;
            }
            let Some(node) = self.states.get(name) else {
                continue;
            };
            if let Some(next) = &node.next {
                queue.push_back(next);
            }
            for clause in &node.catch {
                if sink == Some(clause.next.as_str()) {
                    queue.push_back(&clause.next);
                }
            }
        }
        seen
    }
}
