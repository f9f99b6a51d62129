//! Data sources feeding the reconciliation.
//!
//! Each source is reached through a narrow trait so the controller can be
//! driven by the real clients or by in-memory stand-ins.

pub mod graph;
pub mod indexed;

pub use graph::GraphSource;
pub use indexed::IndexedSource;

use crate::error::SourceError;
use crate::models::UserRecord;
use async_trait::async_trait;

/// Friend-request counts per target user.
#[async_trait]
pub trait RelationshipSource: Send + Sync {
    async fn fetch_relationship_counts(&self) -> Result<Vec<UserRecord>, SourceError>;
}

/// Unseen-notification counts per user.
#[async_trait]
pub trait UnseenCountSource: Send + Sync {
    async fn fetch_unseen_counts(&self) -> Result<Vec<UserRecord>, SourceError>;
}

/// Apply a source's malformed-row policy to one decoded row.
///
/// Returns `Ok(None)` when the row is skipped.
pub(crate) fn admit_row(
    decoded: Result<UserRecord, SourceError>,
    skip_malformed_rows: bool,
    row_index: usize,
) -> Result<Option<UserRecord>, SourceError> {
    match decoded {
        Ok(record) => Ok(Some(record)),
        Err(e) if skip_malformed_rows && e.is_decode() => {
            tracing::warn!("Skipping row {}: {}", row_index, e);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}
