//! Command-line runner: load a registry snapshot and a query graph, run the
//! pipeline against live endpoints, print the standardized response.

use anyhow::{Context, Result};
use clap::Parser;
use retriever_call_apis::{Environment, ReqwestTransport};
use retriever_graph::QueryGraph;
use retriever_handler::{QueryHandler, QueryOptions};
use retriever_metakg::MetaKg;
use retriever_resolver::{IdResolver, PassthroughResolver, ResolvedIdentifierSet, StaticResolver};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "retriever", about = "Run a query graph against a federation of knowledge APIs")]
struct Args {
    /// Registry snapshot: JSON list of capability edges.
    #[arg(long)]
    metakg: PathBuf,

    /// Query graph JSON (bare graph or a `{"message": {"query_graph": ...}}`
    /// envelope).
    #[arg(long)]
    query: PathBuf,

    /// Identifier equivalence classes as JSON (curie -> class). Without
    /// this, each curie resolves to itself.
    #[arg(long)]
    resolver: Option<PathBuf>,

    /// Client identifier forwarded in submitter tags.
    #[arg(long)]
    submitter: Option<String>,

    /// Deployment environment tag (dev, ci, test, prod).
    #[arg(long)]
    environment: Option<Environment>,

    /// Maximum subqueries in flight at once.
    #[arg(long, default_value_t = 10)]
    concurrency: usize,

    /// Overall query deadline in seconds.
    #[arg(long)]
    deadline_secs: Option<u64>,

    /// Per-request timeout in seconds.
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,

    /// Pretty-print the response.
    #[arg(long)]
    pretty: bool,
}

fn load_query_graph(path: &PathBuf) -> Result<QueryGraph> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read query graph '{}'", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse query graph '{}'", path.display()))?;
    let graph_value = value
        .pointer("/message/query_graph")
        .cloned()
        .unwrap_or(value);
    serde_json::from_value(graph_value)
        .with_context(|| format!("invalid query graph in '{}'", path.display()))
}

fn load_resolver(path: Option<&PathBuf>) -> Result<Arc<dyn IdResolver>> {
    match path {
        None => Ok(Arc::new(PassthroughResolver)),
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read resolver fixture '{}'", path.display()))?;
            let classes: BTreeMap<String, ResolvedIdentifierSet> = serde_json::from_str(&raw)
                .with_context(|| format!("failed to parse resolver fixture '{}'", path.display()))?;
            Ok(Arc::new(StaticResolver::new(classes)))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let metakg = Arc::new(MetaKg::load_json(&args.metakg)?);
    let query_graph = load_query_graph(&args.query)?;
    let resolver = load_resolver(args.resolver.as_ref())?;

    let options = QueryOptions {
        submitter: args.submitter,
        environment: args.environment,
        max_concurrency: args.concurrency,
        deadline: args.deadline_secs.map(Duration::from_secs),
        request_timeout: Duration::from_secs(args.timeout_secs),
        ..QueryOptions::default()
    };
    let handler = QueryHandler::new(
        metakg,
        resolver,
        Arc::new(ReqwestTransport::default()),
        options,
    );

    let response = handler.query(query_graph).await?;
    let rendered = if args.pretty {
        serde_json::to_string_pretty(&response)?
    } else {
        serde_json::to_string(&response)?
    };
    println!("{rendered}");
    Ok(())
}
