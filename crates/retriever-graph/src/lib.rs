//! Retriever Graph: query-graph model and knowledge-graph assembly
//!
//! This crate owns both ends of the pipeline's data model:
//!
//! - the declarative **query graph** a caller submits (nodes with optional
//!   curies and semantic categories, edges with optional predicates), plus
//!   normalization and structural validation;
//! - the concrete **knowledge graph** assembled from federated API results,
//!   together with the result bindings that map each answer back to the
//!   query-graph ids that produced it.
//!
//! The intermediate [`ResultRecord`] type lives here as well so that the
//! execution layer can emit records without depending on assembly logic.

pub mod knowledge_graph;
pub mod query_graph;
pub mod record;
pub mod response;
pub mod translator;

pub use knowledge_graph::{KgEdge, KgNode, KnowledgeGraph};
pub use query_graph::{QueryEdge, QueryGraph, QueryNode};
pub use record::ResultRecord;
pub use response::{Binding, ExecutionSummary, Response, ResultEntry};
pub use translator::translate;

use thiserror::Error;

/// Structural errors raised while normalizing a query graph.
///
/// These are fatal: a malformed query graph is rejected before any planning
/// or execution is attempted.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("query graph edge '{edge_id}' references missing node '{node_id}'")]
    DanglingEdge { edge_id: String, node_id: String },

    #[error("query graph node '{node_id}' has neither ids nor categories")]
    UnconstrainedNode { node_id: String },

    #[error("query graph node '{node_id}' is bound to curies but declares no category")]
    MissingCategory { node_id: String },
}
