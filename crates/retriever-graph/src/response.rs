//! Response envelope: the standardized answer shape echoed back to callers.

use crate::knowledge_graph::KnowledgeGraph;
use crate::query_graph::QueryGraph;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Binding from a query-graph id to a knowledge-graph id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Binding {
    pub id: String,
}

/// One answer: bindings from query-graph node/edge ids to the knowledge
/// graph entries that satisfy them.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResultEntry {
    pub node_bindings: BTreeMap<String, Vec<Binding>>,
    pub edge_bindings: BTreeMap<String, Vec<Binding>>,
}

/// Attempted vs. failed subquery counts, surfaced so callers can tell a
/// complete answer from one missing sources.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub attempted: usize,
    pub failed: usize,
}

/// The assembled response: the (normalized) query graph echoed back, the
/// deduplicated knowledge graph, and one result entry per distinct answer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub query_graph: QueryGraph,
    pub knowledge_graph: KnowledgeGraph,
    pub results: Vec<ResultEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<ExecutionSummary>,
}
