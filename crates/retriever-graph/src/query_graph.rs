//! Query-graph model and normalization.
//!
//! The wire format follows the standardized one-hop notation:
//!
//! ```json
//! {
//!   "nodes": { "n0": { "ids": ["MONDO:0005737"], "categories": ["biolink:Disease"] },
//!              "n1": { "categories": ["biolink:Gene"] } },
//!   "edges": { "e01": { "subject": "n0", "object": "n1",
//!                       "predicates": ["biolink:related_to"] } }
//! }
//! ```
//!
//! Normalization canonicalizes category casing to PascalCase, strips the
//! `biolink:` vocabulary prefix from categories and predicates, and rejects
//! structurally invalid graphs (dangling edge endpoints, nodes with neither
//! ids nor categories).

use crate::GraphError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Vocabulary prefix used on the wire for categories and predicates.
pub const VOCAB_PREFIX: &str = "biolink:";

/// A node in the query graph: optionally bound to concrete curies, and
/// optionally constrained to semantic categories.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<String>>,
}

impl QueryNode {
    /// Curies this node is bound to (empty slice when unbound).
    pub fn curies(&self) -> &[String] {
        self.ids.as_deref().unwrap_or(&[])
    }

    /// Whether the node is bound to at least one curie.
    pub fn is_bound(&self) -> bool {
        !self.curies().is_empty()
    }

    /// The node's primary semantic category, if any.
    pub fn primary_category(&self) -> Option<&str> {
        self.categories
            .as_deref()
            .and_then(|c| c.first())
            .map(String::as_str)
    }
}

/// An edge in the query graph connecting two node ids.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryEdge {
    pub subject: String,
    pub object: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicates: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualifier_constraints: Option<serde_json::Value>,
}

impl QueryEdge {
    /// The edge's primary predicate, if one is declared.
    pub fn primary_predicate(&self) -> Option<&str> {
        self.predicates
            .as_deref()
            .and_then(|p| p.first())
            .map(String::as_str)
    }
}

/// A declarative query graph. Node and edge ids are caller-supplied opaque
/// tokens; `BTreeMap` keeps iteration deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryGraph {
    pub nodes: BTreeMap<String, QueryNode>,
    pub edges: BTreeMap<String, QueryEdge>,
}

impl QueryGraph {
    /// Normalize and validate the graph, consuming the raw form.
    ///
    /// Categories are stripped of the vocabulary prefix and canonicalized to
    /// PascalCase; predicates are stripped of the prefix but keep their
    /// snake_case form. Fails if an edge references a missing node or a node
    /// carries neither ids nor categories.
    pub fn normalized(mut self) -> Result<QueryGraph, GraphError> {
        for (node_id, node) in &mut self.nodes {
            if let Some(categories) = &mut node.categories {
                for category in categories.iter_mut() {
                    *category = pascal_case(strip_vocab(category));
                }
            }
            if !node.is_bound() && node.primary_category().is_none() {
                return Err(GraphError::UnconstrainedNode {
                    node_id: node_id.clone(),
                });
            }
        }
        for (edge_id, edge) in &mut self.edges {
            for endpoint in [&edge.subject, &edge.object] {
                if !self.nodes.contains_key(endpoint) {
                    return Err(GraphError::DanglingEdge {
                        edge_id: edge_id.clone(),
                        node_id: endpoint.clone(),
                    });
                }
            }
            if let Some(predicates) = &mut edge.predicates {
                for predicate in predicates.iter_mut() {
                    *predicate = strip_vocab(predicate).to_string();
                }
            }
        }
        Ok(self)
    }

    /// Find the id of the node bound to the given curie.
    pub fn node_id_by_curie(&self, curie: &str) -> Option<&str> {
        self.nodes
            .iter()
            .find(|(_, node)| node.curies().iter().any(|c| c == curie))
            .map(|(id, _)| id.as_str())
    }

    /// Find the id of an unbound node constrained to the given category.
    ///
    /// Used when binding an output back to the query graph: the output side
    /// of a one-hop query is the node with a matching category and no curie.
    pub fn unbound_node_id_by_category(&self, category: &str) -> Option<&str> {
        self.nodes
            .iter()
            .find(|(_, node)| {
                !node.is_bound()
                    && node
                        .categories
                        .as_deref()
                        .is_some_and(|cats| cats.iter().any(|c| c == category))
            })
            .map(|(id, _)| id.as_str())
    }

    /// Find the edge connecting `subject_id` to `object_id` with the given
    /// predicate. `None` matches only edges that declare no predicate.
    pub fn edge_id_matching(
        &self,
        subject_id: &str,
        object_id: &str,
        predicate: Option<&str>,
    ) -> Option<&str> {
        self.edges
            .iter()
            .find(|(_, edge)| {
                edge.subject == subject_id
                    && edge.object == object_id
                    && match predicate {
                        Some(p) => edge
                            .predicates
                            .as_deref()
                            .is_some_and(|preds| preds.iter().any(|q| q == p)),
                        None => edge.predicates.as_deref().map_or(true, |p| p.is_empty()),
                    }
            })
            .map(|(id, _)| id.as_str())
    }
}

/// Strip the vocabulary prefix from a category or predicate, if present.
pub fn strip_vocab(value: &str) -> &str {
    value.strip_prefix(VOCAB_PREFIX).unwrap_or(value)
}

/// Convert a snake_case (or space-separated) name to PascalCase.
/// Already-Pascal segments pass through unchanged.
pub fn pascal_case(raw: &str) -> String {
    raw.split(|c: char| c == '_' || c.is_whitespace())
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_hop() -> QueryGraph {
        serde_json::from_value(serde_json::json!({
            "nodes": {
                "n0": { "ids": ["MONDO:0005737"], "categories": ["biolink:disease"] },
                "n1": { "categories": ["biolink:gene"] }
            },
            "edges": {
                "e01": { "subject": "n0", "object": "n1",
                         "predicates": ["biolink:related_to"] }
            }
        }))
        .unwrap()
    }

    #[test]
    fn pascal_case_handles_snake_and_passthrough() {
        assert_eq!(pascal_case("gene"), "Gene");
        assert_eq!(pascal_case("small_molecule"), "SmallMolecule");
        assert_eq!(pascal_case("Disease"), "Disease");
        assert_eq!(pascal_case("chemical entity"), "ChemicalEntity");
    }

    #[test]
    fn normalization_canonicalizes_categories_and_predicates() {
        let graph = one_hop().normalized().unwrap();
        assert_eq!(graph.nodes["n0"].primary_category(), Some("Disease"));
        assert_eq!(graph.nodes["n1"].primary_category(), Some("Gene"));
        assert_eq!(graph.edges["e01"].primary_predicate(), Some("related_to"));
    }

    #[test]
    fn dangling_edge_is_rejected() {
        let mut graph = one_hop();
        graph.edges.get_mut("e01").unwrap().object = "n9".into();
        let err = graph.normalized().unwrap_err();
        assert!(matches!(err, GraphError::DanglingEdge { .. }));
    }

    #[test]
    fn unconstrained_node_is_rejected() {
        let mut graph = one_hop();
        graph.nodes.insert("n2".into(), QueryNode::default());
        let err = graph.normalized().unwrap_err();
        assert!(matches!(err, GraphError::UnconstrainedNode { node_id } if node_id == "n2"));
    }

    #[test]
    fn lookup_helpers_recover_query_graph_ids() {
        let graph = one_hop().normalized().unwrap();
        assert_eq!(graph.node_id_by_curie("MONDO:0005737"), Some("n0"));
        assert_eq!(graph.unbound_node_id_by_category("Gene"), Some("n1"));
        assert_eq!(graph.edge_id_matching("n0", "n1", Some("related_to")), Some("e01"));
        assert_eq!(graph.edge_id_matching("n0", "n1", None), None);
    }

    #[test]
    fn wildcard_edge_matches_only_without_predicate() {
        let mut graph = one_hop();
        graph.edges.get_mut("e01").unwrap().predicates = None;
        let graph = graph.normalized().unwrap();
        assert_eq!(graph.edge_id_matching("n0", "n1", None), Some("e01"));
        assert_eq!(graph.edge_id_matching("n0", "n1", Some("related_to")), None);
    }
}
