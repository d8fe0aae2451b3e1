//! Knowledge-graph assembly.
//!
//! Nodes are keyed by their output id (first-seen wins for attributes);
//! edges are keyed by the composite `source--predicate--target` id and merge
//! provenance from repeated observations. Both maps are `BTreeMap`s so the
//! assembled graph is deterministic regardless of record arrival order.

use crate::record::ResultRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A resolved entity in the answer graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KgNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub categories: Vec<String>,
}

/// A resolved relationship in the answer graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KgEdge {
    pub subject: String,
    pub object: String,
    pub predicate: String,
    /// APIs and upstream sources that asserted this edge.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub publications: Vec<String>,
}

/// The deduplicated answer graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeGraph {
    pub nodes: BTreeMap<String, KgNode>,
    pub edges: BTreeMap<String, KgEdge>,
}

impl KnowledgeGraph {
    /// Merge one record into the graph. Idempotent: merging the same record
    /// twice leaves the graph unchanged, so retried pagination cursors and
    /// arbitrary arrival orders are safe.
    pub fn merge_record(&mut self, record: &ResultRecord) -> String {
        // Input node: first-seen wins.
        self.nodes
            .entry(record.input_curie.clone())
            .or_insert_with(|| KgNode {
                name: record.input_label.clone(),
                categories: vec![record.input_type.clone()],
            });
        self.nodes
            .entry(record.output_id.clone())
            .or_insert_with(|| KgNode {
                name: record.output_label.clone(),
                categories: vec![record.output_type.clone()],
            });

        let edge_id = record.kg_edge_id();
        let edge = self.edges.entry(edge_id.clone()).or_insert_with(|| KgEdge {
            subject: record.input_curie.clone(),
            object: record.output_id.clone(),
            predicate: record.predicate.clone(),
            sources: Vec::new(),
            publications: Vec::new(),
        });
        let mut sources: Vec<String> = vec![record.api_name.clone()];
        if let Some(source) = &record.source {
            sources.push(source.clone());
        }
        merge_sorted(&mut edge.sources, sources);
        merge_sorted(&mut edge.publications, record.publications.clone());
        edge_id
    }
}

/// Union `incoming` into `existing`, keeping the list sorted and
/// duplicate-free so merge order cannot be observed.
fn merge_sorted(existing: &mut Vec<String>, incoming: Vec<String>) {
    existing.extend(incoming);
    existing.sort();
    existing.dedup();
}
