//! Friend-request counts from the Neo4j graph.

use super::{admit_row, RelationshipSource};
use crate::config::GraphConfig;
use crate::error::SourceError;
use crate::models::UserRecord;
use async_trait::async_trait;
use neo4rs::{query, ConfigBuilder, Graph, Row};
use tracing::{debug, info};

const SOURCE: &str = "neo4j";

/// Counts incoming `SENT_FRIEND_REQUEST` edges per target node.
pub const FRIEND_REQUEST_QUERY: &str = "MATCH (a)-[:SENT_FRIEND_REQUEST]->(b) \
     WITH b, COUNT(a) AS requestCount \
     RETURN b.fullname AS fullname, b.email AS email, requestCount";

/// One result row, with each column present only if it decoded to the
/// expected type.
#[derive(Debug, Clone, Default)]
pub struct GraphRow {
    pub fullname: Option<String>,
    pub email: Option<String>,
    pub request_count: Option<i64>,
}

impl From<&Row> for GraphRow {
    fn from(row: &Row) -> Self {
        let fullname: Option<String> = row.get("fullname").ok();
        let email: Option<String> = row.get("email").ok();
        let request_count: Option<i64> = row.get("requestCount").ok();

        Self {
            fullname,
            email,
            request_count,
        }
    }
}

/// Map a row onto a record. Any missing or ill-typed column is a decode error.
pub fn decode_row(row: &GraphRow) -> Result<UserRecord, SourceError> {
    let email = row
        .email
        .as_ref()
        .ok_or_else(|| SourceError::decode(SOURCE, "missing or non-string `email`"))?;
    let fullname = row
        .fullname
        .as_ref()
        .ok_or_else(|| SourceError::decode(SOURCE, format!("missing `fullname` for {}", email)))?;
    let count = row.request_count.ok_or_else(|| {
        SourceError::decode(SOURCE, format!("missing `requestCount` for {}", email))
    })?;
    let count = u32::try_from(count).map_err(|_| {
        SourceError::decode(SOURCE, format!("`requestCount` {} out of range for {}", count, email))
    })?;

    Ok(UserRecord::from_graph(email.clone(), fullname.clone(), count))
}

/// Decode a batch of rows under the given malformed-row policy.
pub fn decode_rows(rows: &[GraphRow], skip_malformed_rows: bool) -> Result<Vec<UserRecord>, SourceError> {
    let mut users = Vec::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        if let Some(user) = admit_row(decode_row(row), skip_malformed_rows, i)? {
            users.push(user);
        }
    }
    Ok(users)
}

/// Neo4j-backed [`RelationshipSource`].
pub struct GraphSource {
    config: GraphConfig,
}

impl GraphSource {
    pub fn new(config: GraphConfig) -> Self {
        Self { config }
    }

    async fn connect(&self) -> Result<Graph, SourceError> {
        let config = ConfigBuilder::default()
            .uri(self.config.uri.as_str())
            .user(self.config.username.as_str())
            .password(self.config.password.as_str())
            .build()
            .map_err(|e| SourceError::connection(SOURCE, e.to_string()))?;

        Graph::connect(config)
            .await
            .map_err(|e| SourceError::connection(SOURCE, e.to_string()))
    }
}

/// Transport and authentication failures surface on the first request,
/// since the driver connects lazily.
fn classify(err: neo4rs::Error) -> SourceError {
    match err {
        neo4rs::Error::IOError { .. }
        | neo4rs::Error::ConnectionError
        | neo4rs::Error::AuthenticationError(_) => SourceError::connection(SOURCE, err.to_string()),
        other => SourceError::query(SOURCE, other.to_string()),
    }
}

#[async_trait]
impl RelationshipSource for GraphSource {
    async fn fetch_relationship_counts(&self) -> Result<Vec<UserRecord>, SourceError> {
        info!("Querying friend requests from {}", self.config.uri);
        let graph = self.connect().await?;

        let mut stream = graph.execute(query(FRIEND_REQUEST_QUERY)).await.map_err(classify)?;

        let mut rows = Vec::new();
        while let Some(row) = stream.next().await.map_err(classify)? {
            rows.push(GraphRow::from(&row));
        }
        debug!("Graph returned {} rows", rows.len());

        let users = decode_rows(&rows, self.config.skip_malformed_rows)?;
        info!("Fetched {} users with friend requests", users.len());
        Ok(users)
    }
}
