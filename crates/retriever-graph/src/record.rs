//! Intermediate result records.
//!
//! A [`ResultRecord`] is one matched input→output pair produced by executing
//! a subquery, carrying enough provenance to trace the answer back to the
//! query graph: the originating curie, the resolved identifier that was
//! actually sent, the association metadata of the API operation that
//! answered, and the signature predicate used during planning.

use serde::{Deserialize, Serialize};

/// One matched input→output pair with full provenance.
///
/// Records are transient: produced by the execution aggregator, consumed by
/// the response translator, never shared between queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    /// The query-graph curie that produced this record.
    pub input_curie: String,
    /// The resolved identifier value actually sent to the API.
    pub input_id: String,
    /// Human-readable label of the input entity, when resolution knew one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_label: Option<String>,
    /// The output identifier returned by the API, in prefixed form.
    pub output_id: String,
    /// Human-readable label of the output entity, when the API supplied one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_label: Option<String>,
    /// Semantic type of the input side, per the answering API's association.
    pub input_type: String,
    /// Semantic type of the output side, per the answering API's association.
    pub output_type: String,
    /// The concrete predicate asserted by the answering API.
    pub predicate: String,
    /// The predicate of the planning signature that produced the subquery;
    /// `None` when the query edge was a wildcard.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature_predicate: Option<String>,
    /// Name of the API that answered.
    pub api_name: String,
    /// Upstream knowledge source, when the registry declares one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Supporting publications, when the API supplied any.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub publications: Vec<String>,
}

impl ResultRecord {
    /// Deterministic knowledge-graph edge id for this record.
    pub fn kg_edge_id(&self) -> String {
        format!("{}--{}--{}", self.input_curie, self.predicate, self.output_id)
    }
}
