//! Error types shared across the sources, notifier and controller.

use thiserror::Error;

/// Failure while fetching from one of the two data sources.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("{source_name}: connection failed: {message}")]
    Connection {
        source_name: &'static str,
        message: String,
    },

    #[error("{source_name}: query failed: {message}")]
    Query {
        source_name: &'static str,
        message: String,
    },

    #[error("{source_name}: cannot decode row: {message}")]
    Decode {
        source_name: &'static str,
        message: String,
    },
}

impl SourceError {
    pub fn connection(source_name: &'static str, message: impl Into<String>) -> Self {
        Self::Connection {
            source_name,
            message: message.into(),
        }
    }

    pub fn query(source_name: &'static str, message: impl Into<String>) -> Self {
        Self::Query {
            source_name,
            message: message.into(),
        }
    }

    pub fn decode(source_name: &'static str, message: impl Into<String>) -> Self {
        Self::Decode {
            source_name,
            message: message.into(),
        }
    }

    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }
}

/// Failure to deliver one notification. Never fatal to the batch.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("invalid address {address}: {message}")]
    InvalidAddress { address: String, message: String },

    #[error("cannot build message: {0}")]
    Message(String),

    #[error("transport error: {0}")]
    Transport(String),
}

/// A fatal error that ends the invocation before any notification is sent.
#[derive(Debug, Error)]
pub enum InvocationError {
    #[error("graph source fetch failed: {0}")]
    GraphSource(#[source] SourceError),

    #[error("indexed source fetch failed: {0}")]
    IndexedSource(#[source] SourceError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_error_display() {
        let err = SourceError::connection("neo4j", "auth rejected");
        assert_eq!(err.to_string(), "neo4j: connection failed: auth rejected");
        assert!(!err.is_decode());
        assert!(SourceError::decode("dynamodb", "missing email").is_decode());
    }

    #[test]
    fn test_invocation_error_wraps_source() {
        let err = InvocationError::IndexedSource(SourceError::query("dynamodb", "bad index"));
        assert_eq!(
            err.to_string(),
            "indexed source fetch failed: dynamodb: query failed: bad index"
        );
    }
}
