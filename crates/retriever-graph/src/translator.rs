//! Response translation: from the raw record stream back to the query graph.
//!
//! For every record the translator recovers the query-graph node id of the
//! input (by curie), the node id of the output (the unbound node with the
//! record's output type), and the query-graph edge id connecting them (a
//! wildcard signature matches only edges with no declared predicate). The
//! record is then merged into the knowledge graph and one result entry is
//! appended with its bindings.
//!
//! The merge is commutative and idempotent: records may arrive in any order
//! and may repeat (e.g. a retried pagination cursor) without changing the
//! final output. Results are deduplicated by binding content and sorted.

use crate::knowledge_graph::KnowledgeGraph;
use crate::query_graph::QueryGraph;
use crate::record::ResultRecord;
use crate::response::{Binding, ExecutionSummary, Response, ResultEntry};
use std::collections::BTreeSet;
use tracing::warn;

/// Assemble the final response from the aggregated record stream.
///
/// Records that cannot be bound back to the query graph (no node matches
/// the input curie or output type, or no edge matches the endpoints and
/// predicate) are skipped with a warning rather than mis-attributed.
pub fn translate(
    query_graph: &QueryGraph,
    records: &[ResultRecord],
    summary: ExecutionSummary,
) -> Response {
    let mut knowledge_graph = KnowledgeGraph::default();
    let mut entries: BTreeSet<ResultEntry> = BTreeSet::new();

    for record in records {
        let Some(input_qid) = query_graph.node_id_by_curie(&record.input_curie) else {
            warn!(curie = %record.input_curie, "no query-graph node for record input, skipping");
            continue;
        };
        let Some(output_qid) = query_graph.unbound_node_id_by_category(&record.output_type) else {
            warn!(
                output_type = %record.output_type,
                "no unbound query-graph node for record output type, skipping"
            );
            continue;
        };
        let Some(edge_qid) = query_graph.edge_id_matching(
            input_qid,
            output_qid,
            record.signature_predicate.as_deref(),
        ) else {
            warn!(
                subject = %input_qid,
                object = %output_qid,
                predicate = ?record.signature_predicate,
                "no query-graph edge for record, skipping"
            );
            continue;
        };
        let (input_qid, output_qid, edge_qid) = (
            input_qid.to_string(),
            output_qid.to_string(),
            edge_qid.to_string(),
        );

        let kg_edge_id = knowledge_graph.merge_record(record);

        let mut entry = ResultEntry::default();
        entry.node_bindings.insert(
            input_qid,
            vec![Binding {
                id: record.input_curie.clone(),
            }],
        );
        entry.node_bindings.insert(
            output_qid,
            vec![Binding {
                id: record.output_id.clone(),
            }],
        );
        entry
            .edge_bindings
            .insert(edge_qid, vec![Binding { id: kg_edge_id }]);
        entries.insert(entry);
    }

    Response {
        query_graph: query_graph.clone(),
        knowledge_graph,
        results: entries.into_iter().collect(),
        summary: Some(summary),
    }
}
