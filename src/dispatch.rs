//! Paced, fault-isolated delivery of one notification per user.
//!
//! Sends are strictly sequential. Each attempt waits the pacing interval
//! first, so the relay never sees more than one request per interval. A
//! failed send is recorded and the loop moves on.

use crate::models::{DeliveryOutcome, DeliveryState, DispatchSummary, UserRecord};
use crate::notify::Notifier;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Drives the notifier over a reconciled batch.
pub struct Dispatcher {
    notifier: Arc<dyn Notifier>,
    pace: Duration,
    retries: u32,
    show_progress: bool,
}

impl Dispatcher {
    pub fn new(notifier: Arc<dyn Notifier>, pace: Duration, retries: u32) -> Self {
        Self {
            notifier,
            pace,
            retries,
            show_progress: false,
        }
    }

    /// Show a progress bar on stderr while dispatching.
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Notify every user in `records`.
    ///
    /// Once `cancel` fires, no further send is issued and the remaining
    /// users are reported as skipped.
    pub async fn dispatch(
        &self,
        records: &HashMap<String, UserRecord>,
        cancel: &CancellationToken,
    ) -> DispatchSummary {
        let mut summary = DispatchSummary::default();
        let progress = self.progress_bar(records.len() as u64);

        for user in records.values() {
            let outcome = if cancel.is_cancelled() {
                skipped(user)
            } else {
                self.deliver(user, cancel).await
            };

            match outcome.state {
                DeliveryState::Sent => info!("Notified {}", outcome.email),
                DeliveryState::Failed => warn!(
                    "Failed to notify {} after {} attempt(s): {}",
                    outcome.email,
                    outcome.attempts,
                    outcome.error.as_deref().unwrap_or("unknown error")
                ),
                DeliveryState::Skipped => debug!("Skipped {}", outcome.email),
            }

            summary.record(outcome);
            progress.inc(1);
        }

        progress.finish_and_clear();
        info!(
            "Dispatch finished: {} sent, {} failed, {} skipped",
            summary.sent, summary.failed, summary.skipped
        );
        summary
    }

    async fn deliver(&self, user: &UserRecord, cancel: &CancellationToken) -> DeliveryOutcome {
        let mut last_error = None;
        let mut attempts = 0;

        for _ in 0..=self.retries {
            if !self.wait_pace(cancel).await {
                break;
            }

            attempts += 1;
            match self
                .notifier
                .send_notification(&user.email, &user.full_name, user.request_count, user.seen_count)
                .await
            {
                Ok(()) => {
                    return DeliveryOutcome {
                        email: user.email.clone(),
                        state: DeliveryState::Sent,
                        attempts,
                        error: None,
                    }
                }
                Err(e) => {
                    debug!("Attempt {} for {} failed: {}", attempts, user.email, e);
                    last_error = Some(e.to_string());
                }
            }
        }

        if attempts == 0 {
            return skipped(user);
        }

        DeliveryOutcome {
            email: user.email.clone(),
            state: DeliveryState::Failed,
            attempts,
            error: last_error,
        }
    }

    /// Returns false if cancelled before the interval elapsed.
    async fn wait_pace(&self, cancel: &CancellationToken) -> bool {
        if self.pace.is_zero() {
            return !cancel.is_cancelled();
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(self.pace) => true,
        }
    }

    fn progress_bar(&self, len: u64) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(len);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} mails")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    }
}

fn skipped(user: &UserRecord) -> DeliveryOutcome {
    DeliveryOutcome {
        email: user.email.clone(),
        state: DeliveryState::Skipped,
        attempts: 0,
        error: None,
    }
}
