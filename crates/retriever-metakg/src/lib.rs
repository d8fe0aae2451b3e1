//! Retriever MetaKG: the registry of federated API capabilities.
//!
//! Each [`CapabilityEdge`] describes one externally callable operation: the
//! semantic association it answers (input type, output type, predicate, the
//! identifier namespace it expects) and how to invoke it (server, path
//! template, method, batching, protocol). The registry is loaded once,
//! shared read-only across concurrent queries, and queried per planning
//! signature with [`MetaKg::filter`].
//!
//! Matching never mutates a registry entry. Each match produces a
//! [`MatchedEdge`] working copy that references the canonical record and
//! carries the per-query signature tag, so transient annotations cannot
//! leak between queries.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Errors raised while loading a registry snapshot.
#[derive(Debug, Error)]
pub enum MetaKgError {
    #[error("failed to read registry snapshot '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse registry snapshot '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// HTTP method of a registered operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    Get,
    Post,
}

/// Wire protocol of a registered operation, selecting the subquery kind
/// used to call it. New protocols extend this enum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiProtocol {
    /// Standardized query-graph protocol: POST one-hop message, complete
    /// response, no pagination.
    #[default]
    Trapi,
    /// Plain REST endpoint returning `{hits, total}` pages with offset
    /// pagination.
    Rest,
}

/// The semantic association one operation answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Association {
    /// Semantic type of the input, e.g. `Disease`.
    pub input_type: String,
    /// Identifier namespace the API expects as input, e.g. `MONDO`.
    pub input_id: String,
    /// Semantic type of the output, e.g. `Gene`.
    pub output_type: String,
    /// Identifier namespace of the output, e.g. `NCBIGene`.
    pub output_id: String,
    /// Predicate asserted by the operation, e.g. `related_to`.
    pub predicate: String,
    /// Name of the API, for provenance.
    pub api_name: String,
    /// Upstream knowledge source, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// How to invoke one registered operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryOperation {
    /// Server base URL, with or without a trailing slash.
    pub server: String,
    /// Path template; `{param}` placeholders are substituted from `params`,
    /// and `{inputs[0]}` from the subquery's resolved input values.
    pub path: String,
    /// Names of the path parameters to substitute.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path_params: Vec<String>,
    /// Static parameters: substituted into the path for `path_params`
    /// entries, appended to the query string otherwise (REST only).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, serde_json::Value>,
    pub method: HttpMethod,
    /// Whether the API accepts a batched list of input identifiers.
    #[serde(default)]
    pub support_batch: bool,
    #[serde(default)]
    pub protocol: ApiProtocol,
    /// Response field holding the output identifier (REST protocol only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_field: Option<String>,
}

/// One registry record: an externally callable operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityEdge {
    pub association: Association,
    pub query_operation: QueryOperation,
    /// Qualifier constraints to copy into outgoing sub-queries, when the
    /// operation declares any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualifier_constraints: Option<serde_json::Value>,
}

/// Per-query working copy of a matched registry record: references the
/// canonical edge and carries the originating signature tag.
#[derive(Debug, Clone)]
pub struct MatchedEdge {
    pub edge: Arc<CapabilityEdge>,
    /// Signature string of the planning bucket that matched this edge.
    pub signature: String,
}

/// Criteria for matching registry records against a planning signature.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCriteria {
    pub input_type: String,
    pub output_type: String,
    /// `None` is the wildcard: all predicates for the type pair match.
    pub predicate: Option<String>,
}

/// The meta-knowledge-graph registry. Construct once, share via `Arc`.
#[derive(Debug, Default)]
pub struct MetaKg {
    edges: Vec<Arc<CapabilityEdge>>,
}

impl MetaKg {
    pub fn from_edges(edges: Vec<CapabilityEdge>) -> Self {
        Self {
            edges: edges.into_iter().map(Arc::new).collect(),
        }
    }

    /// Load a registry snapshot from a JSON file holding a list of
    /// capability edges.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, MetaKgError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| MetaKgError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let edges: Vec<CapabilityEdge> =
            serde_json::from_str(&raw).map_err(|source| MetaKgError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        debug!(edges = edges.len(), path = %path.display(), "loaded registry snapshot");
        Ok(Self::from_edges(edges))
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Candidate operations for a signature, each tagged with the signature
    /// string. An empty result is not an error: the signature simply
    /// contributes no subqueries.
    pub fn filter(&self, criteria: &FilterCriteria, signature: &str) -> Vec<MatchedEdge> {
        let matched: Vec<MatchedEdge> = self
            .edges
            .iter()
            .filter(|edge| {
                let assoc = &edge.association;
                assoc.input_type == criteria.input_type
                    && assoc.output_type == criteria.output_type
                    && criteria
                        .predicate
                        .as_deref()
                        .map_or(true, |p| assoc.predicate == p)
            })
            .map(|edge| MatchedEdge {
                edge: Arc::clone(edge),
                signature: signature.to_string(),
            })
            .collect();
        debug!(signature, candidates = matched.len(), "matched capability edges");
        matched
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub fn edge(input: &str, predicate: &str, output: &str) -> CapabilityEdge {
        CapabilityEdge {
            association: Association {
                input_type: input.into(),
                input_id: "MONDO".into(),
                output_type: output.into(),
                output_id: "NCBIGene".into(),
                predicate: predicate.into(),
                api_name: "Test API".into(),
                source: None,
            },
            query_operation: QueryOperation {
                server: "https://api.test".into(),
                path: "/query".into(),
                path_params: vec![],
                params: BTreeMap::new(),
                method: HttpMethod::Post,
                support_batch: true,
                protocol: ApiProtocol::Trapi,
                output_field: None,
            },
            qualifier_constraints: None,
        }
    }

    #[test]
    fn filter_matches_exact_triple() {
        let kg = MetaKg::from_edges(vec![
            edge("Disease", "related_to", "Gene"),
            edge("Disease", "treated_by", "Gene"),
            edge("Gene", "related_to", "Disease"),
        ]);
        let matched = kg.filter(
            &FilterCriteria {
                input_type: "Disease".into(),
                output_type: "Gene".into(),
                predicate: Some("related_to".into()),
            },
            "Disease-related_to-Gene",
        );
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].signature, "Disease-related_to-Gene");
    }

    #[test]
    fn wildcard_predicate_matches_all_for_type_pair() {
        let kg = MetaKg::from_edges(vec![
            edge("Disease", "related_to", "Gene"),
            edge("Disease", "treated_by", "Gene"),
            edge("Gene", "related_to", "Disease"),
        ]);
        let matched = kg.filter(
            &FilterCriteria {
                input_type: "Disease".into(),
                output_type: "Gene".into(),
                predicate: None,
            },
            "Disease-None-Gene",
        );
        assert_eq!(matched.len(), 2);
    }

    #[test]
    fn no_candidates_is_empty_not_error() {
        let kg = MetaKg::from_edges(vec![edge("Disease", "related_to", "Gene")]);
        let matched = kg.filter(
            &FilterCriteria {
                input_type: "ChemicalEntity".into(),
                output_type: "Gene".into(),
                predicate: None,
            },
            "ChemicalEntity-None-Gene",
        );
        assert!(matched.is_empty());
    }

    #[test]
    fn matching_does_not_mutate_registry_entries() {
        let kg = MetaKg::from_edges(vec![edge("Disease", "related_to", "Gene")]);
        let criteria = FilterCriteria {
            input_type: "Disease".into(),
            output_type: "Gene".into(),
            predicate: None,
        };
        let first = kg.filter(&criteria, "sig-a");
        let second = kg.filter(&criteria, "sig-b");
        assert_eq!(first[0].signature, "sig-a");
        assert_eq!(second[0].signature, "sig-b");
        assert!(Arc::ptr_eq(&first[0].edge, &second[0].edge));
    }

    #[test]
    fn registry_snapshot_round_trips_through_json() {
        let edges = vec![edge("Disease", "related_to", "Gene")];
        let json = serde_json::to_string(&edges).unwrap();
        let parsed: Vec<CapabilityEdge> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, edges);
    }
}
