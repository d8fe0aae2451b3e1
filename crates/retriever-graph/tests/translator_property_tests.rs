//! Property-based tests for response translation
//!
//! Uses proptest to check the merge-order guarantees:
//! 1. Translation is invariant under permutation of the record stream
//! 2. Duplicate records never produce duplicate nodes, edges, or results
//! 3. Node dedup holds for any record mix sharing output ids

use proptest::prelude::*;
use retriever_graph::{translate, ExecutionSummary, QueryGraph, ResultRecord};

fn one_hop() -> QueryGraph {
    serde_json::from_value::<QueryGraph>(serde_json::json!({
        "nodes": {
            "n0": { "ids": ["MONDO:1", "MONDO:2", "MONDO:3"],
                    "categories": ["biolink:Disease"] },
            "n1": { "categories": ["biolink:Gene"] }
        },
        "edges": {
            "e01": { "subject": "n0", "object": "n1",
                     "predicates": ["biolink:related_to"] }
        }
    }))
    .unwrap()
    .normalized()
    .unwrap()
}

// ============================================================================
// Strategies
// ============================================================================

fn record_strategy() -> impl Strategy<Value = ResultRecord> {
    (1usize..=3, 0usize..=9, proptest::bool::ANY).prop_map(|(input, output, with_pub)| {
        ResultRecord {
            input_curie: format!("MONDO:{input}"),
            input_id: format!("MONDO:{input}"),
            input_label: Some(format!("disease {input}")),
            output_id: format!("NCBIGene:{output}"),
            output_label: Some(format!("gene {output}")),
            input_type: "Disease".into(),
            output_type: "Gene".into(),
            predicate: "related_to".into(),
            signature_predicate: Some("related_to".into()),
            api_name: "Test API".into(),
            source: None,
            publications: if with_pub {
                vec![format!("PMID:{output}")]
            } else {
                vec![]
            },
        }
    })
}

fn record_stream() -> impl Strategy<Value = Vec<ResultRecord>> {
    proptest::collection::vec(record_strategy(), 0..24)
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn translation_is_permutation_invariant(records in record_stream().prop_shuffle()) {
        let graph = one_hop();
        let mut sorted = records.clone();
        sorted.sort_by_key(|r| (r.input_curie.clone(), r.output_id.clone(), r.publications.clone()));

        let a = translate(&graph, &records, ExecutionSummary::default());
        let b = translate(&graph, &sorted, ExecutionSummary::default());
        prop_assert_eq!(a, b);
    }

    #[test]
    fn duplicates_never_inflate_the_answer(records in record_stream()) {
        let graph = one_hop();
        let mut doubled = records.clone();
        doubled.extend(records.iter().cloned());

        let once = translate(&graph, &records, ExecutionSummary::default());
        let twice = translate(&graph, &doubled, ExecutionSummary::default());
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn each_output_id_yields_one_node(records in record_stream()) {
        let graph = one_hop();
        let response = translate(&graph, &records, ExecutionSummary::default());

        let distinct_outputs: std::collections::BTreeSet<&String> =
            records.iter().map(|r| &r.output_id).collect();
        let gene_nodes = response
            .knowledge_graph
            .nodes
            .keys()
            .filter(|id| id.starts_with("NCBIGene:"))
            .count();
        prop_assert_eq!(gene_nodes, distinct_outputs.len());
    }
}
