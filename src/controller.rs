//! One end-to-end invocation: fetch, reconcile, dispatch.

use crate::dispatch::Dispatcher;
use crate::error::InvocationError;
use crate::models::{DispatchSummary, InvocationResponse, RunReport};
use crate::reconcile::{nameless_recipients, reconcile, MergeStats};
use crate::sources::{RelationshipSource, UnseenCountSource};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Result of a completed invocation.
#[derive(Debug, Clone)]
pub struct InvocationOutcome {
    pub response: InvocationResponse,
    pub report: RunReport,
}

/// Wires the two sources, the merge and the dispatch loop together.
pub struct Invocation {
    graph: Arc<dyn RelationshipSource>,
    indexed: Arc<dyn UnseenCountSource>,
    dispatcher: Dispatcher,
    dry_run: bool,
}

impl Invocation {
    pub fn new(
        graph: Arc<dyn RelationshipSource>,
        indexed: Arc<dyn UnseenCountSource>,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            graph,
            indexed,
            dispatcher,
            dry_run: false,
        }
    }

    /// Reconcile and report without notifying anyone.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Run one invocation.
    ///
    /// Either fetch failing aborts before anything is merged or sent.
    /// Individual delivery failures do not affect the result.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<InvocationOutcome, InvocationError> {
        let started_at = Utc::now();
        let start = Instant::now();

        let (graph_users, indexed_users) = tokio::try_join!(
            async {
                self.graph
                    .fetch_relationship_counts()
                    .await
                    .map_err(InvocationError::GraphSource)
            },
            async {
                self.indexed
                    .fetch_unseen_counts()
                    .await
                    .map_err(InvocationError::IndexedSource)
            },
        )?;

        let merged = reconcile(&graph_users, &indexed_users);
        let stats = MergeStats::compute(&graph_users, &indexed_users, &merged);
        info!(
            "Total number of users: {} ({} graph only, {} indexed only, {} in both)",
            stats.total, stats.graph_only, stats.indexed_only, stats.matched
        );

        for email in nameless_recipients(&merged) {
            warn!("{} has no display name; notifying anyway", email);
        }
        for user in merged.values() {
            debug!(
                "Fullname: {}, Email: {}, RequestCount: {}, SeenCount: {}",
                user.full_name, user.email, user.request_count, user.seen_count
            );
        }

        let dispatch = if self.dry_run {
            info!("Dry run: {} notifications not sent", merged.len());
            DispatchSummary::default()
        } else {
            self.dispatcher.dispatch(&merged, cancel).await
        };

        Ok(InvocationOutcome {
            response: InvocationResponse::successful(),
            report: RunReport {
                started_at,
                duration_seconds: start.elapsed().as_secs_f64(),
                dry_run: self.dry_run,
                merge: stats,
                dispatch,
            },
        })
    }
}
