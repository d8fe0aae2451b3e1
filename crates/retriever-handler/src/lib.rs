//! Retriever Handler: the pipeline entry point.
//!
//! Orchestrates the full flow for one query: normalize the query graph,
//! plan edge signatures, resolve the input curies in one batch, match each
//! signature against the capability registry, build concrete subqueries,
//! execute them under a concurrency bound, and translate the aggregated
//! records into the standardized response envelope.
//!
//! Data flows strictly forward; the registry is the only state shared
//! across queries (read-only, behind an `Arc`). Everything else is owned by
//! the query's execution and discarded when it completes.

pub mod job;
pub mod planner;

pub use job::{JobOutcome, JobPayload, JobStatus, QueryQueue};
pub use planner::{plan, EdgeSignature, SignatureBucket};

use retriever_call_apis::{
    build_subqueries, BuilderConfig, Environment, Executor, ExecutorConfig, Subquery, Transport,
};
use retriever_graph::{translate, GraphError, QueryGraph, Response};
use retriever_metakg::MetaKg;
use retriever_resolver::{annotate_curies, IdResolver, ResolverError};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Fatal pipeline errors. Per-subquery failures are not here: they are
/// isolated during execution and surfaced as counts on the response.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("malformed query graph: {0}")]
    MalformedQueryGraph(#[from] GraphError),

    #[error("identifier resolution failed: {0}")]
    IdentifierResolution(#[from] ResolverError),
}

/// Per-query options threaded into the pipeline.
#[derive(Debug, Clone)]
pub struct QueryOptions {
    /// Identifier of the original client, forwarded in submitter tags.
    pub submitter: Option<String>,
    pub environment: Option<Environment>,
    pub max_concurrency: usize,
    /// Overall query deadline, covering identifier resolution and the
    /// subquery fan-out. A resolution timeout is fatal; in-flight subqueries
    /// are aborted and results already aggregated are kept.
    pub deadline: Option<Duration>,
    pub request_timeout: Duration,
    /// Page size for offset-paginated REST subqueries.
    pub rest_page_size: usize,
    /// Override for the prefixed-identifier namespace table.
    pub prefixed_namespaces: Option<Vec<String>>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            submitter: None,
            environment: None,
            max_concurrency: 10,
            deadline: None,
            request_timeout: Duration::from_secs(30),
            rest_page_size: 1000,
            prefixed_namespaces: None,
        }
    }
}

impl QueryOptions {
    fn builder_config(&self) -> BuilderConfig {
        let defaults = BuilderConfig::default();
        BuilderConfig {
            environment: self.environment,
            client_submitter: self.submitter.clone(),
            prefixed_namespaces: self
                .prefixed_namespaces
                .clone()
                .unwrap_or(defaults.prefixed_namespaces),
            request_timeout: self.request_timeout,
            rest_page_size: self.rest_page_size,
            ..defaults
        }
    }

    /// Executor configuration with the deadline reduced by the time the
    /// earlier pipeline stages already spent.
    fn executor_config(&self, elapsed: Duration) -> ExecutorConfig {
        ExecutorConfig {
            max_concurrency: self.max_concurrency,
            deadline: self.deadline.map(|limit| limit.saturating_sub(elapsed)),
            ..ExecutorConfig::default()
        }
    }
}

/// The pipeline: owns the shared registry and the collaborator handles.
pub struct QueryHandler {
    metakg: Arc<MetaKg>,
    resolver: Arc<dyn IdResolver>,
    transport: Arc<dyn Transport>,
    options: QueryOptions,
}

impl QueryHandler {
    pub fn new(
        metakg: Arc<MetaKg>,
        resolver: Arc<dyn IdResolver>,
        transport: Arc<dyn Transport>,
        options: QueryOptions,
    ) -> Self {
        Self {
            metakg,
            resolver,
            transport,
            options,
        }
    }

    /// Run the full pipeline for one query graph.
    pub async fn query(&self, raw: QueryGraph) -> Result<Response, HandlerError> {
        let started = tokio::time::Instant::now();
        let graph = raw.normalized()?;
        let buckets = planner::plan(&graph)?;

        let curies: BTreeSet<String> = buckets
            .iter()
            .flat_map(|bucket| bucket.curies())
            .collect();
        let resolving = annotate_curies(self.resolver.as_ref(), &curies);
        let resolved = match self.options.deadline {
            Some(limit) => tokio::time::timeout(limit, resolving)
                .await
                .map_err(|_| ResolverError::Batch("resolution deadline exceeded".into()))??,
            None => resolving.await?,
        };

        let builder_config = self.options.builder_config();
        let mut subqueries: Vec<Subquery> = Vec::new();
        for bucket in &buckets {
            let signature = bucket.signature.to_string();
            let matched = self.metakg.filter(&bucket.signature.criteria(), &signature);
            let bucket_curies = bucket.curies();
            for candidate in &matched {
                subqueries.extend(build_subqueries(
                    candidate,
                    bucket.signature.predicate.as_deref(),
                    &bucket_curies,
                    &resolved,
                    &builder_config,
                ));
            }
        }
        info!(
            signatures = buckets.len(),
            curies = curies.len(),
            subqueries = subqueries.len(),
            "query planned"
        );

        let executor = Executor::new(
            Arc::clone(&self.transport),
            self.options.executor_config(started.elapsed()),
        );
        let (records, summary) = executor.execute(subqueries).await;
        info!(
            records = records.len(),
            attempted = summary.attempted,
            failed = summary.failed,
            "query executed"
        );

        Ok(translate(&graph, &records, summary))
    }
}
