//! Subquery kinds: one concrete unit of execution per variant.
//!
//! Every kind implements the same contract: `build_request` constructs the
//! first request, `needs_pagination` inspects a raw response and reports how
//! many pages remain, `next_request` advances the explicit cursor state, and
//! `parse_records` normalizes a raw response into [`ResultRecord`]s using
//! the subquery's `original_input` / `input_resolved` provenance metadata.
//!
//! Pagination state (the `start` cursor) is explicit on the subquery so the
//! executor can drive the loop externally, which keeps cancellation and
//! bounded concurrency straightforward.

use retriever_graph::record::ResultRecord;
use retriever_metakg::{ApiProtocol, CapabilityEdge, HttpMethod};
use retriever_resolver::ResolvedIdentifierSet;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::CallApiError;

/// One concrete HTTP-style request, ready for the transport collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub url: String,
    pub method: HttpMethod,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
    pub timeout: Duration,
}

/// Resolved-input metadata shared by every subquery kind.
///
/// `original_input` maps each identifier sent to the API (in its prefixed
/// form when the namespace does not already carry one) back to the
/// query-graph curie that produced it; `input_resolved` keeps each curie's
/// full equivalence class for provenance.
#[derive(Debug, Clone)]
pub struct SubqueryInput {
    pub edge: Arc<CapabilityEdge>,
    pub signature: String,
    pub signature_predicate: Option<String>,
    /// Identifier values sent to the API, sorted at construction.
    pub input_ids: Vec<String>,
    pub original_input: BTreeMap<String, String>,
    pub input_resolved: BTreeMap<String, ResolvedIdentifierSet>,
    /// Namespaces whose identifier values already carry their prefix.
    pub prefixed_namespaces: Vec<String>,
}

impl SubqueryInput {
    /// Recover the originating curie for an identifier echoed by the API.
    /// Tries the id as returned, then its reconstructed prefixed form.
    pub fn curie_for(&self, id: &str) -> Option<&str> {
        self.original_input
            .get(id)
            .or_else(|| {
                self.original_input
                    .get(&format!("{}:{}", self.edge.association.input_id, id))
            })
            .map(String::as_str)
    }

    /// Prefixed form of an output identifier value.
    pub fn prefixed_output(&self, value: &str) -> String {
        prefixed_form(
            &self.edge.association.output_id,
            value,
            &self.prefixed_namespaces,
        )
    }

    fn input_label(&self, curie: &str) -> Option<String> {
        self.input_resolved
            .get(curie)
            .and_then(|set| set.label.clone())
    }

    fn record(
        &self,
        curie: &str,
        input_id: &str,
        output_id: String,
        output_label: Option<String>,
        publications: Vec<String>,
    ) -> ResultRecord {
        let assoc = &self.edge.association;
        ResultRecord {
            input_curie: curie.to_string(),
            input_id: input_id.to_string(),
            input_label: self.input_label(curie),
            output_id,
            output_label,
            input_type: assoc.input_type.clone(),
            output_type: assoc.output_type.clone(),
            predicate: assoc.predicate.clone(),
            signature_predicate: self.signature_predicate.clone(),
            api_name: assoc.api_name.clone(),
            source: assoc.source.clone(),
            publications,
        }
    }

    /// Substitute declared path parameters and the conventional
    /// `{inputs[0]}` placeholder into the operation's path template.
    fn resolved_url(&self) -> String {
        let op = &self.edge.query_operation;
        let server = op.server.trim_end_matches('/');
        let mut path = op.path.clone();
        for param in &op.path_params {
            if let Some(value) = op.params.get(param) {
                path = path.replace(&format!("{{{param}}}"), &value_as_string(value));
            }
        }
        path = path.replace("{inputs[0]}", &self.input_ids.join(","));
        format!("{server}{path}")
    }
}

/// Reconstruct the canonical form of an identifier: namespaces on the
/// allow-list already carry their prefix in stored values, all others get a
/// `"NAMESPACE:value"` key.
pub fn prefixed_form(namespace: &str, value: &str, prefixed_namespaces: &[String]) -> String {
    if prefixed_namespaces.iter().any(|ns| ns == namespace) {
        value.to_string()
    } else {
        format!("{namespace}:{value}")
    }
}

fn value_as_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ============================================================================
// TRAPI subquery
// ============================================================================

/// Subquery against a standardized query-graph endpoint: POSTs a one-hop
/// message, receives a complete response, never paginates.
#[derive(Debug, Clone)]
pub struct TrapiSubquery {
    pub input: SubqueryInput,
    /// Submitter/provenance tag appended to the request body.
    pub submitter: String,
    pub timeout: Duration,
}

impl TrapiSubquery {
    pub fn new(input: SubqueryInput, submitter: String, timeout: Duration) -> Self {
        Self {
            input,
            submitter,
            timeout,
        }
    }

    /// One-hop request body: input node bound to the resolved ids, output
    /// node constrained to the target type, edge carrying the predicate.
    /// Types and predicates are namespaced with the vocabulary prefix.
    fn request_body(&self) -> Value {
        let assoc = &self.input.edge.association;
        let mut edge = json!({
            "subject": "n0",
            "object": "n1",
            "predicates": [format!("biolink:{}", assoc.predicate)],
        });
        if let Some(qualifiers) = &self.input.edge.qualifier_constraints {
            edge["qualifier_constraints"] = qualifiers.clone();
        }
        json!({
            "message": {
                "query_graph": {
                    "nodes": {
                        "n0": {
                            "ids": self.input.input_ids,
                            "categories": [format!("biolink:{}", assoc.input_type)],
                        },
                        "n1": {
                            "categories": [format!("biolink:{}", assoc.output_type)],
                        },
                    },
                    "edges": { "e01": edge },
                },
            },
            "submitter": self.submitter,
        })
    }

    fn build_request(&self) -> Result<ApiRequest, CallApiError> {
        let url = self.input.resolved_url();
        Url::parse(&url).map_err(|source| CallApiError::Url {
            url: url.clone(),
            source,
        })?;
        Ok(ApiRequest {
            url,
            method: self.input.edge.query_operation.method,
            headers: vec![("Content-Type".into(), "application/json".into())],
            body: Some(self.request_body()),
            timeout: self.timeout,
        })
    }

    /// Walk `message.results`, binding `n0` back to the originating curie
    /// and `n1` to the output id; labels and publications are recovered from
    /// the response knowledge graph when present.
    fn parse_records(&self, response: &Value) -> Vec<ResultRecord> {
        let message = &response["message"];
        let kg_nodes = &message["knowledge_graph"]["nodes"];
        let kg_edges = &message["knowledge_graph"]["edges"];
        let Some(results) = message["results"].as_array() else {
            return Vec::new();
        };

        let mut records = Vec::new();
        for result in results {
            let Some(input_id) = binding_id(result, "node_bindings", "n0") else {
                continue;
            };
            let Some(output_id) = binding_id(result, "node_bindings", "n1") else {
                continue;
            };
            let Some(curie) = self.input.curie_for(input_id) else {
                continue;
            };
            let output_label = kg_nodes[output_id]["name"].as_str().map(str::to_string);
            let publications = binding_id(result, "edge_bindings", "e01")
                .map(|edge_id| edge_publications(&kg_edges[edge_id]))
                .unwrap_or_default();
            records.push(self.input.record(
                curie,
                input_id,
                output_id.to_string(),
                output_label,
                publications,
            ));
        }
        records
    }
}

fn binding_id<'a>(result: &'a Value, kind: &str, qid: &str) -> Option<&'a str> {
    result[kind][qid].as_array()?.first()?["id"].as_str()
}

/// Pull publication curies from a response knowledge-graph edge's
/// attribute list.
fn edge_publications(kg_edge: &Value) -> Vec<String> {
    kg_edge["attributes"]
        .as_array()
        .map(|attributes| {
            attributes
                .iter()
                .filter(|attr| attr["attribute_type_id"].as_str() == Some("biolink:publications"))
                .filter_map(|attr| attr["value"].as_array())
                .flatten()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

// ============================================================================
// REST subquery (offset pagination)
// ============================================================================

/// Subquery against a plain REST endpoint returning `{hits, total}` pages.
/// The cursor advances by `page_size` per page.
#[derive(Debug, Clone)]
pub struct RestSubquery {
    pub input: SubqueryInput,
    pub timeout: Duration,
    pub page_size: usize,
    start: usize,
}

impl RestSubquery {
    pub fn new(input: SubqueryInput, timeout: Duration, page_size: usize) -> Self {
        Self {
            input,
            timeout,
            page_size,
            start: 0,
        }
    }

    fn build_request(&self) -> Result<ApiRequest, CallApiError> {
        let op = &self.input.edge.query_operation;
        let base = self.input.resolved_url();
        let mut url = Url::parse(&base).map_err(|source| CallApiError::Url {
            url: base.clone(),
            source,
        })?;
        {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in &op.params {
                if !op.path_params.contains(name) {
                    pairs.append_pair(name, &value_as_string(value));
                }
            }
            // GET operations without a path placeholder carry the inputs in
            // the query string; the `q` body is POST-only.
            if op.method == HttpMethod::Get && !op.path.contains("{inputs[0]}") {
                pairs.append_pair("q", &self.input.input_ids.join(","));
            }
            pairs.append_pair("size", &self.page_size.to_string());
            pairs.append_pair("from", &self.start.to_string());
        }
        let body = match op.method {
            HttpMethod::Post => Some(json!({ "q": self.input.input_ids.join(",") })),
            HttpMethod::Get => None,
        };
        Ok(ApiRequest {
            url: url.into(),
            method: op.method,
            headers: vec![("Content-Type".into(), "application/json".into())],
            body,
            timeout: self.timeout,
        })
    }

    /// Offset contract: `total` counts all matches, `hits` is the current
    /// page. Remaining pages are reported so the executor can drive the
    /// loop to completion.
    fn needs_pagination(&mut self, response: &Value) -> usize {
        let total = response["total"].as_u64().unwrap_or(0) as usize;
        let fetched = self.start
            + response["hits"]
                .as_array()
                .map(|hits| hits.len())
                .unwrap_or(0);
        if fetched < total {
            (total - fetched).div_ceil(self.page_size)
        } else {
            0
        }
    }

    fn next_request(&mut self) -> Result<ApiRequest, CallApiError> {
        self.start += self.page_size;
        self.build_request()
    }

    fn parse_records(&self, response: &Value) -> Vec<ResultRecord> {
        let Some(hits) = response["hits"].as_array() else {
            return Vec::new();
        };
        let op = &self.input.edge.query_operation;
        let assoc = &self.input.edge.association;
        let output_field = op
            .output_field
            .clone()
            .unwrap_or_else(|| assoc.output_id.to_lowercase());

        let mut records = Vec::new();
        for hit in hits {
            // Batched responses name the matched input in `query`; a
            // single-input subquery falls back to its only id.
            let input_id = hit["query"]
                .as_str()
                .or_else(|| {
                    if self.input.input_ids.len() == 1 {
                        Some(self.input.input_ids[0].as_str())
                    } else {
                        None
                    }
                })
                .map(str::to_string);
            let Some(input_id) = input_id else { continue };
            let Some(curie) = self.input.curie_for(&input_id).map(str::to_string) else {
                continue;
            };
            let output_label = hit["name"].as_str().map(str::to_string);
            let publications: Vec<String> = hit["publications"]
                .as_array()
                .map(|values| {
                    values
                        .iter()
                        .filter_map(|v| v.as_str().map(str::to_string))
                        .collect()
                })
                .unwrap_or_default();
            for value in output_values(&hit[&output_field]) {
                records.push(self.input.record(
                    &curie,
                    &input_id,
                    self.input.prefixed_output(&value),
                    output_label.clone(),
                    publications.clone(),
                ));
            }
        }
        records
    }
}

/// An output field may hold a single value or a list of them.
fn output_values(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => vec![s.clone()],
        Value::Number(n) => vec![n.to_string()],
        Value::Array(values) => values.iter().flat_map(output_values).collect(),
        _ => Vec::new(),
    }
}

// ============================================================================
// Tagged dispatch
// ============================================================================

/// A concrete unit of execution. New protocols extend this enum without
/// touching the executor.
#[derive(Debug, Clone)]
pub enum Subquery {
    Trapi(TrapiSubquery),
    Rest(RestSubquery),
}

impl Subquery {
    pub fn input(&self) -> &SubqueryInput {
        match self {
            Subquery::Trapi(s) => &s.input,
            Subquery::Rest(s) => &s.input,
        }
    }

    pub fn protocol(&self) -> ApiProtocol {
        match self {
            Subquery::Trapi(_) => ApiProtocol::Trapi,
            Subquery::Rest(_) => ApiProtocol::Rest,
        }
    }

    pub fn build_request(&self) -> Result<ApiRequest, CallApiError> {
        match self {
            Subquery::Trapi(s) => s.build_request(),
            Subquery::Rest(s) => s.build_request(),
        }
    }

    /// How many additional pages remain after this response (0 if none).
    pub fn needs_pagination(&mut self, response: &Value) -> usize {
        match self {
            Subquery::Trapi(_) => 0,
            Subquery::Rest(s) => s.needs_pagination(response),
        }
    }

    /// Advance the cursor and build the request for the following page.
    pub fn next_request(&mut self) -> Result<ApiRequest, CallApiError> {
        match self {
            Subquery::Trapi(s) => s.build_request(),
            Subquery::Rest(s) => s.next_request(),
        }
    }

    /// Normalize one raw response into result records.
    pub fn parse_records(&self, response: &Value) -> Vec<ResultRecord> {
        match self {
            Subquery::Trapi(s) => s.parse_records(response),
            Subquery::Rest(s) => s.parse_records(response),
        }
    }
}
