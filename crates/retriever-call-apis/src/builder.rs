//! Subquery construction from matched capability edges.
//!
//! For each matched edge, every bucket curie whose equivalence class
//! contains the namespace the API expects contributes input identifiers:
//! non-batch APIs get one subquery per individual identifier, batch-capable
//! APIs get exactly one subquery carrying the union of eligible identifiers
//! across all curies. Curies with an empty (or ineligible) equivalence
//! class simply contribute nothing.

use retriever_metakg::{ApiProtocol, MatchedEdge};
use retriever_resolver::ResolvedIdentifierSet;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

use crate::subquery::{prefixed_form, RestSubquery, Subquery, SubqueryInput, TrapiSubquery};

/// Identifier namespaces whose stored values already carry their prefix.
/// Kept as an explicit configuration table; values outside this list get a
/// reconstructed `"NAMESPACE:value"` form in `original_input`.
pub const DEFAULT_PREFIXED_NAMESPACES: [&str; 8] = [
    "MONDO", "DOID", "UBERON", "EFO", "HP", "CHEBI", "CL", "MGI",
];

/// Deployment environment, threaded in explicitly rather than read from
/// ambient process state. The label feeds the submitter tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Dev,
    Ci,
    Test,
    Prod,
}

impl Environment {
    pub fn label(self) -> &'static str {
        match self {
            Environment::Dev => "dev",
            Environment::Ci => "staging",
            Environment::Test => "test",
            Environment::Prod => "prod",
        }
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dev" => Ok(Environment::Dev),
            "ci" => Ok(Environment::Ci),
            "test" => Ok(Environment::Test),
            "prod" => Ok(Environment::Prod),
            other => Err(format!("unknown environment '{other}'")),
        }
    }
}

/// Configuration threaded into the builder at construction time.
#[derive(Debug, Clone)]
pub struct BuilderConfig {
    /// Identity of the calling system, e.g. `infores:retriever`.
    pub submitter: String,
    pub environment: Option<Environment>,
    /// Identifier of the original client, when one was supplied.
    pub client_submitter: Option<String>,
    pub prefixed_namespaces: Vec<String>,
    pub request_timeout: Duration,
    /// Page size for offset-paginated REST subqueries.
    pub rest_page_size: usize,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            submitter: "infores:retriever".to_string(),
            environment: None,
            client_submitter: None,
            prefixed_namespaces: DEFAULT_PREFIXED_NAMESPACES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            request_timeout: Duration::from_secs(30),
            rest_page_size: 1000,
        }
    }
}

impl BuilderConfig {
    /// Submitter/provenance tag appended to outgoing request bodies:
    /// calling system, deployment environment, and the original client.
    pub fn submitter_tag(&self) -> String {
        let mut tag = self.submitter.clone();
        if let Some(environment) = self.environment {
            tag.push_str(&format!("; retriever-{}", environment.label()));
        }
        if let Some(client) = &self.client_submitter {
            tag.push_str(&format!("; subquery for client \"{client}\""));
        }
        tag
    }
}

/// Expand one matched capability edge into concrete subqueries.
///
/// `curies` is the planning bucket's curie list (in order, duplicates
/// allowed); `resolved` maps each curie to its equivalence class.
pub fn build_subqueries(
    matched: &MatchedEdge,
    signature_predicate: Option<&str>,
    curies: &[String],
    resolved: &BTreeMap<String, ResolvedIdentifierSet>,
    config: &BuilderConfig,
) -> Vec<Subquery> {
    let edge = &matched.edge;
    let namespace = edge.association.input_id.as_str();
    let support_batch = edge.query_operation.support_batch;

    // Dedup curies, keeping bucket order.
    let mut seen: Vec<&str> = Vec::new();
    for curie in curies {
        if !seen.contains(&curie.as_str()) {
            seen.push(curie);
        }
    }

    let mut subqueries = Vec::new();
    if support_batch {
        let mut input_ids = Vec::new();
        let mut original_input = BTreeMap::new();
        let mut input_resolved = BTreeMap::new();
        for curie in &seen {
            let Some(set) = resolved.get(*curie) else { continue };
            for id in set.ids_for(namespace) {
                original_input.insert(
                    prefixed_form(namespace, id, &config.prefixed_namespaces),
                    curie.to_string(),
                );
                input_ids.push(id.clone());
            }
            if !set.ids_for(namespace).is_empty() {
                input_resolved.insert(curie.to_string(), set.clone());
            }
        }
        if !original_input.is_empty() {
            input_ids.sort();
            input_ids.dedup();
            subqueries.push(make_subquery(
                matched,
                signature_predicate,
                input_ids,
                original_input,
                input_resolved,
                config,
            ));
        }
    } else {
        for curie in &seen {
            let Some(set) = resolved.get(*curie) else { continue };
            for id in set.ids_for(namespace) {
                let original_input = BTreeMap::from([(
                    prefixed_form(namespace, id, &config.prefixed_namespaces),
                    curie.to_string(),
                )]);
                let input_resolved = BTreeMap::from([(curie.to_string(), set.clone())]);
                subqueries.push(make_subquery(
                    matched,
                    signature_predicate,
                    vec![id.clone()],
                    original_input,
                    input_resolved,
                    config,
                ));
            }
        }
    }
    debug!(
        signature = %matched.signature,
        api = %edge.association.api_name,
        batch = support_batch,
        subqueries = subqueries.len(),
        "built subqueries for capability edge"
    );
    subqueries
}

fn make_subquery(
    matched: &MatchedEdge,
    signature_predicate: Option<&str>,
    input_ids: Vec<String>,
    original_input: BTreeMap<String, String>,
    input_resolved: BTreeMap<String, ResolvedIdentifierSet>,
    config: &BuilderConfig,
) -> Subquery {
    let input = SubqueryInput {
        edge: matched.edge.clone(),
        signature: matched.signature.clone(),
        signature_predicate: signature_predicate.map(str::to_string),
        input_ids,
        original_input,
        input_resolved,
        prefixed_namespaces: config.prefixed_namespaces.clone(),
    };
    match matched.edge.query_operation.protocol {
        ApiProtocol::Trapi => Subquery::Trapi(TrapiSubquery::new(
            input,
            config.submitter_tag(),
            config.request_timeout,
        )),
        ApiProtocol::Rest => Subquery::Rest(RestSubquery::new(
            input,
            config.request_timeout,
            config.rest_page_size,
        )),
    }
}
