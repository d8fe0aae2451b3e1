//! Retriever Call-APIs: subquery construction and federated execution.
//!
//! This crate turns matched capability edges plus resolved identifiers into
//! concrete, protocol-specific subqueries, then executes the full set with
//! bounded parallelism:
//!
//! - [`builder`] expands each matched edge into subqueries, one per resolved
//!   identifier for non-batch APIs or exactly one batched subquery per edge;
//! - [`subquery`] models the protocol kinds (TRAPI, offset-paginated REST)
//!   behind a common build/paginate/parse contract;
//! - [`transport`] is the HTTP collaborator boundary (retry/backoff policy
//!   lives behind it, not here);
//! - [`executor`] fans the subqueries out under a concurrency bound, drives
//!   each pagination loop sequentially, and isolates per-subquery failures.

pub mod builder;
pub mod executor;
pub mod subquery;
pub mod transport;

pub use builder::{build_subqueries, BuilderConfig, Environment, DEFAULT_PREFIXED_NAMESPACES};
pub use executor::{Executor, ExecutorConfig};
pub use subquery::{ApiRequest, RestSubquery, Subquery, SubqueryInput, TrapiSubquery};
pub use transport::{ReqwestTransport, Transport, TransportError};

use thiserror::Error;

/// Per-subquery execution errors. These are recorded and skipped, never
/// fatal to the query.
#[derive(Debug, Error)]
pub enum CallApiError {
    #[error("failed to construct request url '{url}': {source}")]
    Url {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),
}
