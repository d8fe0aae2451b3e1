//! Asynchronous job entry point.
//!
//! Long-running queries are submitted as jobs: the payload carries the
//! query graph, per-query options, and an optional callback target. The
//! queue/worker infrastructure and callback delivery live outside this
//! crate behind the [`QueryQueue`] trait; the pipeline's contribution is
//! [`QueryHandler::run_job`], which materializes the payload's options,
//! runs the pipeline, and wraps the result in a [`JobOutcome`] ready for
//! delivery.

use crate::{QueryHandler, QueryOptions};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use retriever_graph::{QueryGraph, Response};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// A submitted asynchronous query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobPayload {
    pub id: Uuid,
    pub query_graph: QueryGraph,
    /// Identifier of the submitting client, if supplied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitter: Option<String>,
    /// Where to deliver the outcome, if anywhere.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

impl JobPayload {
    pub fn new(query_graph: QueryGraph) -> Self {
        Self {
            id: Uuid::new_v4(),
            query_graph,
            submitter: None,
            callback_url: None,
            submitted_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Completed,
    Failed,
}

/// The finished job, ready for callback delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobOutcome {
    pub job_id: Uuid,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Response>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub completed_at: DateTime<Utc>,
}

/// Collaborator that schedules jobs and delivers outcomes. Queue storage,
/// worker scheduling, and callback delivery guarantees are its concern.
#[async_trait]
pub trait QueryQueue: Send + Sync {
    /// Accept a job for later execution, returning its id.
    async fn enqueue(&self, payload: JobPayload) -> Result<Uuid, String>;
}

impl QueryHandler {
    /// Execute a submitted job: thread the payload's submitter into the
    /// per-query options, run the pipeline, and package the outcome.
    /// Pipeline errors become a failed outcome rather than propagating, so
    /// the caller can always deliver something to the callback target.
    pub async fn run_job(&self, payload: JobPayload) -> JobOutcome {
        let options = QueryOptions {
            submitter: payload.submitter.clone().or(self.options.submitter.clone()),
            ..self.options.clone()
        };
        let handler = QueryHandler {
            metakg: self.metakg.clone(),
            resolver: self.resolver.clone(),
            transport: self.transport.clone(),
            options,
        };
        info!(job_id = %payload.id, "running asynchronous query job");
        match handler.query(payload.query_graph).await {
            Ok(response) => JobOutcome {
                job_id: payload.id,
                status: JobStatus::Completed,
                response: Some(response),
                error: None,
                completed_at: Utc::now(),
            },
            Err(err) => JobOutcome {
                job_id: payload.id,
                status: JobStatus::Failed,
                response: None,
                error: Some(err.to_string()),
                completed_at: Utc::now(),
            },
        }
    }
}
