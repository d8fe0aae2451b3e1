//! Edge-signature planning.
//!
//! Edges whose subject node carries curies are grouped by their
//! `(inputType, predicate, outputType)` signature; each signature's bucket
//! collects the `(curie, edgeId)` pairs contributing to it. Edges whose
//! subject is unbound are not planned independently: they are satisfied as
//! the object side of a signature.
//!
//! The buckets partition the curie-bearing edges exactly: every eligible
//! `(curie, edge)` pair lands in exactly one bucket, keyed by exact,
//! case-sensitive triple equality.

use retriever_graph::{GraphError, QueryGraph};
use retriever_metakg::FilterCriteria;
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// The `(inputType, predicate, outputType)` planning key. `predicate` is
/// `None` for wildcard edges.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct EdgeSignature {
    pub input_type: String,
    pub predicate: Option<String>,
    pub output_type: String,
}

impl fmt::Display for EdgeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}",
            self.input_type,
            self.predicate.as_deref().unwrap_or("None"),
            self.output_type
        )
    }
}

impl EdgeSignature {
    /// Registry matching criteria for this signature.
    pub fn criteria(&self) -> FilterCriteria {
        FilterCriteria {
            input_type: self.input_type.clone(),
            output_type: self.output_type.clone(),
            predicate: self.predicate.clone(),
        }
    }
}

/// One signature's contribution list, in edge/curie declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureBucket {
    pub signature: EdgeSignature,
    /// `(curie, query edge id)` pairs contributing to this signature.
    pub pairs: Vec<(String, String)>,
}

impl SignatureBucket {
    /// The bucket's curies, in order, duplicates preserved.
    pub fn curies(&self) -> Vec<String> {
        self.pairs.iter().map(|(curie, _)| curie.clone()).collect()
    }
}

/// Group the query graph's curie-bearing edges into signature buckets.
///
/// Fails when a planned edge's subject or object lacks a category, since
/// the signature cannot be computed without the semantic types.
pub fn plan(graph: &QueryGraph) -> Result<Vec<SignatureBucket>, GraphError> {
    let mut buckets: BTreeMap<EdgeSignature, SignatureBucket> = BTreeMap::new();

    for (edge_id, edge) in &graph.edges {
        let subject = &graph.nodes[&edge.subject];
        if !subject.is_bound() {
            continue;
        }
        let Some(input_type) = subject.primary_category() else {
            return Err(GraphError::MissingCategory {
                node_id: edge.subject.clone(),
            });
        };
        let Some(output_type) = graph.nodes[&edge.object].primary_category() else {
            return Err(GraphError::MissingCategory {
                node_id: edge.object.clone(),
            });
        };
        let signature = EdgeSignature {
            input_type: input_type.to_string(),
            predicate: edge.primary_predicate().map(str::to_string),
            output_type: output_type.to_string(),
        };
        let bucket = buckets
            .entry(signature.clone())
            .or_insert_with(|| SignatureBucket {
                signature,
                pairs: Vec::new(),
            });
        for curie in subject.curies() {
            bucket.pairs.push((curie.clone(), edge_id.clone()));
        }
    }

    let buckets: Vec<SignatureBucket> = buckets.into_values().collect();
    debug!(signatures = buckets.len(), "planned edge signatures");
    Ok(buckets)
}
