//! Execution aggregator: bounded fan-out over independent subqueries.
//!
//! Subqueries run in parallel under a semaphore-bounded concurrency limit;
//! each subquery's pagination loop is a sequential chain (page N+1 depends
//! on page N's cursor). A subquery that fails on its first page contributes
//! zero records and is counted as a failure; a failure on a later page
//! truncates that subquery's stream while keeping pages already collected.
//!
//! An optional deadline provides cooperative cancellation: when it passes,
//! in-flight subqueries are aborted, records already aggregated remain
//! valid, and the aborted subqueries are counted as failed.

use retriever_graph::record::ResultRecord;
use retriever_graph::response::ExecutionSummary;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::subquery::Subquery;
use crate::transport::Transport;
use crate::CallApiError;

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Maximum subqueries in flight at once.
    pub max_concurrency: usize,
    /// Overall deadline for the fan-out, if any.
    pub deadline: Option<Duration>,
    /// Safety cap on pages fetched per subquery.
    pub max_pages: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 10,
            deadline: None,
            max_pages: 50,
        }
    }
}

/// Runs a set of subqueries and aggregates their records.
pub struct Executor {
    transport: Arc<dyn Transport>,
    config: ExecutorConfig,
}

impl Executor {
    pub fn new(transport: Arc<dyn Transport>, config: ExecutorConfig) -> Self {
        Self { transport, config }
    }

    /// Execute every subquery, returning all aggregated records plus the
    /// attempted/failed counts. Individual failures never abort siblings.
    pub async fn execute(&self, subqueries: Vec<Subquery>) -> (Vec<ResultRecord>, ExecutionSummary) {
        let attempted = subqueries.len();
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let deadline = self.config.deadline.map(|d| Instant::now() + d);
        let max_pages = self.config.max_pages;

        let mut tasks: JoinSet<Result<Vec<ResultRecord>, CallApiError>> = JoinSet::new();
        for subquery in subqueries {
            let transport = Arc::clone(&self.transport);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                // Closed only when the set is dropped, so acquire cannot fail
                // while the task is still polled.
                let _permit = semaphore.acquire_owned().await;
                run_subquery(transport.as_ref(), subquery, max_pages).await
            });
        }

        let mut records = Vec::new();
        let mut failed = 0usize;
        let mut completed = 0usize;
        loop {
            let joined = match deadline {
                Some(at) => match tokio::time::timeout_at(at, tasks.join_next()).await {
                    Ok(joined) => joined,
                    Err(_) => {
                        warn!(
                            pending = attempted - completed,
                            "query deadline reached, aborting in-flight subqueries"
                        );
                        tasks.abort_all();
                        failed += attempted - completed;
                        break;
                    }
                },
                None => tasks.join_next().await,
            };
            let Some(joined) = joined else { break };
            completed += 1;
            match joined {
                Ok(Ok(mut subquery_records)) => records.append(&mut subquery_records),
                Ok(Err(err)) => {
                    warn!(error = %err, "subquery failed, skipping");
                    failed += 1;
                }
                Err(join_err) => {
                    warn!(error = %join_err, "subquery task did not complete");
                    failed += 1;
                }
            }
        }

        debug!(attempted, failed, records = records.len(), "subquery fan-out complete");
        (records, ExecutionSummary { attempted, failed })
    }
}

/// Drive one subquery's pagination loop to completion.
async fn run_subquery(
    transport: &dyn Transport,
    mut subquery: Subquery,
    max_pages: usize,
) -> Result<Vec<ResultRecord>, CallApiError> {
    let mut records = Vec::new();
    let mut request = subquery.build_request()?;
    let mut page = 0usize;
    loop {
        let response = match transport.execute(&request).await {
            Ok(response) => response,
            Err(err) if page == 0 => return Err(err.into()),
            Err(err) => {
                // Pagination failure: keep the pages already collected.
                warn!(
                    error = %err,
                    page,
                    api = %subquery.input().edge.association.api_name,
                    "pagination request failed, truncating"
                );
                break;
            }
        };
        records.extend(subquery.parse_records(&response));
        page += 1;
        if subquery.needs_pagination(&response) == 0 {
            break;
        }
        if page >= max_pages {
            warn!(
                page,
                api = %subquery.input().edge.association.api_name,
                "page cap reached, truncating pagination"
            );
            break;
        }
        request = subquery.next_request()?;
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{build_subqueries, BuilderConfig};
    use crate::subquery::ApiRequest;
    use crate::transport::TransportError;
    use async_trait::async_trait;
    use retriever_metakg::{
        ApiProtocol, Association, CapabilityEdge, HttpMethod, MatchedEdge, QueryOperation,
    };
    use retriever_resolver::ResolvedIdentifierSet;
    use serde_json::{json, Value};
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn rest_matched(server: &str) -> MatchedEdge {
        MatchedEdge {
            edge: Arc::new(CapabilityEdge {
                association: Association {
                    input_type: "Disease".into(),
                    input_id: "MONDO".into(),
                    output_type: "Gene".into(),
                    output_id: "NCBIGene".into(),
                    predicate: "related_to".into(),
                    api_name: "Test API".into(),
                    source: None,
                },
                query_operation: QueryOperation {
                    server: server.into(),
                    path: "/query".into(),
                    path_params: vec![],
                    params: BTreeMap::new(),
                    method: HttpMethod::Get,
                    support_batch: true,
                    protocol: ApiProtocol::Rest,
                    output_field: Some("ncbigene".into()),
                },
                qualifier_constraints: None,
            }),
            signature: "Disease-related_to-Gene".into(),
        }
    }

    fn resolved() -> BTreeMap<String, ResolvedIdentifierSet> {
        let mut identifiers = BTreeMap::new();
        identifiers.insert("MONDO".to_string(), vec!["MONDO:1".to_string()]);
        BTreeMap::from([(
            "MONDO:1".to_string(),
            ResolvedIdentifierSet {
                label: Some("asthma".into()),
                identifiers,
            },
        )])
    }

    fn subqueries_for(servers: &[&str], page_size: usize) -> Vec<Subquery> {
        let config = BuilderConfig {
            rest_page_size: page_size,
            ..BuilderConfig::default()
        };
        servers
            .iter()
            .flat_map(|server| {
                build_subqueries(
                    &rest_matched(server),
                    Some("related_to"),
                    &["MONDO:1".to_string()],
                    &resolved(),
                    &config,
                )
            })
            .collect()
    }

    /// Serves three pages of two hits each; fails any request whose url
    /// contains "broken".
    struct PagingTransport {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Transport for PagingTransport {
        async fn execute(&self, request: &ApiRequest) -> Result<Value, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if request.url.contains("broken") {
                return Err(TransportError::Status {
                    url: request.url.clone(),
                    status: 500,
                });
            }
            let from: usize = url::Url::parse(&request.url)
                .unwrap()
                .query_pairs()
                .find(|(k, _)| k == "from")
                .map(|(_, v)| v.parse().unwrap())
                .unwrap_or(0);
            let hits: Vec<Value> = (from..(from + 2).min(6))
                .map(|i| json!({ "ncbigene": i.to_string(), "query": "MONDO:1" }))
                .collect();
            Ok(json!({ "total": 6, "hits": hits }))
        }
    }

    #[tokio::test]
    async fn pagination_yields_union_of_all_pages() {
        let transport = Arc::new(PagingTransport {
            calls: AtomicUsize::new(0),
        });
        let executor = Executor::new(transport.clone(), ExecutorConfig::default());
        let (records, summary) = executor.execute(subqueries_for(&["https://api.test"], 2)).await;

        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
        assert_eq!(records.len(), 6);
        assert_eq!(summary, ExecutionSummary { attempted: 1, failed: 0 });
        let outputs: Vec<&str> = records.iter().map(|r| r.output_id.as_str()).collect();
        assert!(outputs.contains(&"NCBIGene:0"));
        assert!(outputs.contains(&"NCBIGene:5"));
    }

    #[tokio::test]
    async fn failing_subquery_is_isolated_and_counted() {
        let transport = Arc::new(PagingTransport {
            calls: AtomicUsize::new(0),
        });
        let executor = Executor::new(transport, ExecutorConfig::default());
        let (records, summary) = executor
            .execute(subqueries_for(&["https://api.test", "https://broken.test"], 10))
            .await;

        assert!(!records.is_empty());
        assert_eq!(summary, ExecutionSummary { attempted: 2, failed: 1 });
    }

    /// Never responds; used to exercise the deadline path.
    struct StalledTransport;

    #[async_trait]
    impl Transport for StalledTransport {
        async fn execute(&self, _request: &ApiRequest) -> Result<Value, TransportError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            unreachable!("sleep never completes under the test deadline")
        }
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_aborts_in_flight_subqueries() {
        let executor = Executor::new(
            Arc::new(StalledTransport),
            ExecutorConfig {
                deadline: Some(Duration::from_millis(100)),
                ..ExecutorConfig::default()
            },
        );
        let (records, summary) = executor.execute(subqueries_for(&["https://api.test"], 10)).await;
        assert!(records.is_empty());
        assert_eq!(summary, ExecutionSummary { attempted: 1, failed: 1 });
    }

    #[tokio::test]
    async fn empty_subquery_set_completes_cleanly() {
        let executor = Executor::new(Arc::new(StalledTransport), ExecutorConfig::default());
        let (records, summary) = executor.execute(Vec::new()).await;
        assert!(records.is_empty());
        assert_eq!(summary, ExecutionSummary::default());
    }
}
