//! Retriever Resolver: the identifier-equivalence collaborator.
//!
//! The same biological entity carries many synonymous identifiers across
//! source systems. Before building subqueries the pipeline resolves every
//! input curie to its full equivalence class in one batch call, then picks
//! the identifiers each API actually accepts.
//!
//! The resolution service itself is a black box behind the [`IdResolver`]
//! trait. A batch-level failure is fatal to the query; an individual curie
//! that resolves to nothing keeps an empty class and is silently excluded
//! from subquery construction later.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use tracing::debug;

/// Errors from the resolution collaborator. Batch failures abort the query.
#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("identifier resolution batch failed: {0}")]
    Batch(String),
}

/// The full equivalence class of one curie: an optional primary label plus
/// a mapping from identifier namespace to equivalent identifier values.
///
/// Values are stored the way the resolution service reports them: for
/// namespaces whose canonical form carries the prefix (e.g. `MONDO`) the
/// values are full curies, otherwise bare values (e.g. `1017` under
/// `NCBIGene`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolvedIdentifierSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub identifiers: BTreeMap<String, Vec<String>>,
}

impl ResolvedIdentifierSet {
    /// Whether the class resolved to nothing (unknown curie).
    pub fn is_empty(&self) -> bool {
        self.identifiers.values().all(|ids| ids.is_empty())
    }

    /// Identifier values under the given namespace.
    pub fn ids_for(&self, namespace: &str) -> &[String] {
        self.identifiers
            .get(namespace)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Black-box batch lookup of identifier equivalence classes.
#[async_trait]
pub trait IdResolver: Send + Sync {
    /// Resolve a batch of curies. Individual curies may be absent from the
    /// returned map (unknown); that is not a batch failure.
    async fn resolve(
        &self,
        curies: &[String],
    ) -> Result<BTreeMap<String, ResolvedIdentifierSet>, ResolverError>;
}

/// Resolve the full curie set in one batch call, retaining unknown curies
/// with an empty equivalence class so later stages can skip them without
/// treating the miss as an error.
pub async fn annotate_curies(
    resolver: &dyn IdResolver,
    curies: &BTreeSet<String>,
) -> Result<BTreeMap<String, ResolvedIdentifierSet>, ResolverError> {
    let batch: Vec<String> = curies.iter().cloned().collect();
    let mut resolved = resolver.resolve(&batch).await?;
    for curie in curies {
        resolved.entry(curie.clone()).or_default();
    }
    debug!(
        curies = curies.len(),
        unresolved = resolved.values().filter(|set| set.is_empty()).count(),
        "annotated identifier batch"
    );
    Ok(resolved)
}

/// Map-backed resolver, loaded from a fixture or built in tests.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    classes: BTreeMap<String, ResolvedIdentifierSet>,
}

impl StaticResolver {
    pub fn new(classes: BTreeMap<String, ResolvedIdentifierSet>) -> Self {
        Self { classes }
    }
}

#[async_trait]
impl IdResolver for StaticResolver {
    async fn resolve(
        &self,
        curies: &[String],
    ) -> Result<BTreeMap<String, ResolvedIdentifierSet>, ResolverError> {
        Ok(curies
            .iter()
            .filter_map(|curie| {
                self.classes
                    .get(curie)
                    .map(|set| (curie.clone(), set.clone()))
            })
            .collect())
    }
}

/// Degenerate resolver mapping each curie to a class containing only
/// itself, under its own prefix. Useful for smoke tests and local runs
/// without a resolution service.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughResolver;

#[async_trait]
impl IdResolver for PassthroughResolver {
    async fn resolve(
        &self,
        curies: &[String],
    ) -> Result<BTreeMap<String, ResolvedIdentifierSet>, ResolverError> {
        Ok(curies
            .iter()
            .map(|curie| {
                let namespace = curie.split(':').next().unwrap_or("").to_string();
                let mut identifiers = BTreeMap::new();
                identifiers.insert(namespace, vec![curie.clone()]);
                (
                    curie.clone(),
                    ResolvedIdentifierSet {
                        label: None,
                        identifiers,
                    },
                )
            })
            .collect())
    }
}
