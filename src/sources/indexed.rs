//! Unseen-notification counts from the DynamoDB secondary index.

use super::{admit_row, UnseenCountSource};
use crate::config::StoreConfig;
use crate::error::SourceError;
use crate::models::UserRecord;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::config::Region;
use aws_sdk_dynamodb::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use std::collections::HashMap;
use tracing::{debug, info};

const SOURCE: &str = "dynamodb";

/// Error codes DynamoDB returns for rejected or expired credentials.
const AUTH_ERROR_CODES: &[&str] = &[
    "UnrecognizedClientException",
    "InvalidSignatureException",
    "AccessDeniedException",
    "ExpiredTokenException",
];

pub type Item = HashMap<String, AttributeValue>;

fn string_attr(item: &Item, name: &str) -> Result<Option<String>, SourceError> {
    match item.get(name) {
        None | Some(AttributeValue::Null(_)) => Ok(None),
        Some(AttributeValue::S(s)) => Ok(Some(s.clone())),
        Some(_) => Err(SourceError::decode(
            SOURCE,
            format!("attribute `{}` is not a string", name),
        )),
    }
}

fn count_attr(item: &Item, name: &str) -> Result<u32, SourceError> {
    match item.get(name) {
        None | Some(AttributeValue::Null(_)) => Ok(0),
        Some(AttributeValue::N(n)) => n.trim().parse::<u32>().map_err(|_| {
            SourceError::decode(
                SOURCE,
                format!("attribute `{}` is not a non-negative integer: {}", name, n),
            )
        }),
        Some(_) => Err(SourceError::decode(
            SOURCE,
            format!("attribute `{}` is not a number", name),
        )),
    }
}

/// Map one item onto a record. Absent attributes take their zero value,
/// so an item without `email` decodes with an empty one. Only a present
/// attribute of the wrong type is a decode error.
pub fn decode_item(item: &Item) -> Result<UserRecord, SourceError> {
    let email = string_attr(item, "email")?.unwrap_or_default();

    Ok(UserRecord {
        full_name: string_attr(item, "fullname")?.unwrap_or_default(),
        request_count: count_attr(item, "requestCount")?,
        seen_count: count_attr(item, "seenCount")?,
        email,
    })
}

/// Decode a page of items under the given malformed-row policy.
pub fn decode_items(items: &[Item], skip_malformed_rows: bool) -> Result<Vec<UserRecord>, SourceError> {
    let mut users = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        if let Some(user) = admit_row(decode_item(item), skip_malformed_rows, i)? {
            users.push(user);
        }
    }
    Ok(users)
}

fn classify<E, R>(err: SdkError<E, R>) -> SourceError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let message = DisplayErrorContext(&err).to_string();
    let is_auth = err.code().map_or(false, |code| AUTH_ERROR_CODES.contains(&code));

    match err {
        SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) => {
            SourceError::connection(SOURCE, message)
        }
        _ if is_auth => SourceError::connection(SOURCE, message),
        _ => SourceError::query(SOURCE, message),
    }
}

/// DynamoDB-backed [`UnseenCountSource`].
pub struct IndexedSource {
    config: StoreConfig,
}

impl IndexedSource {
    pub fn new(config: StoreConfig) -> Self {
        Self { config }
    }

    async fn client(&self) -> Client {
        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(self.config.region.clone()))
            .load()
            .await;
        Client::new(&shared)
    }
}

#[async_trait]
impl UnseenCountSource for IndexedSource {
    async fn fetch_unseen_counts(&self) -> Result<Vec<UserRecord>, SourceError> {
        info!(
            "Querying {} on index {} where {}",
            self.config.table_name, self.config.index_name, self.config.key_condition
        );
        let client = self.client().await;

        let mut users = Vec::new();
        let mut start_key: Option<Item> = None;
        let mut pages = 0usize;

        loop {
            let output = client
                .query()
                .table_name(&self.config.table_name)
                .index_name(&self.config.index_name)
                .key_condition_expression(&self.config.key_condition)
                .expression_attribute_values(
                    &self.config.status_placeholder,
                    AttributeValue::N(self.config.status_value.clone()),
                )
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(classify)?;

            pages += 1;
            users.extend(decode_items(output.items(), self.config.skip_malformed_rows)?);

            match output.last_evaluated_key() {
                Some(key) if !key.is_empty() => start_key = Some(key.clone()),
                _ => break,
            }
        }

        debug!("Read {} pages from {}", pages, self.config.table_name);
        info!("Fetched {} users with unseen notifications", users.len());
        Ok(users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_dynamodb::error::ErrorMetadata;
    use aws_sdk_dynamodb::operation::query::QueryError;
    use aws_smithy_runtime_api::client::result::ConnectorError;
    use std::io;

    fn item(pairs: &[(&str, AttributeValue)]) -> Item {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_decode_item() {
        let it = item(&[
            ("email", AttributeValue::S("bob@x.com".into())),
            ("seenCount", AttributeValue::N("4".into())),
            ("seenStatus", AttributeValue::N("0".into())),
        ]);

        let user = decode_item(&it).unwrap();
        assert_eq!(user.email, "bob@x.com");
        assert_eq!(user.full_name, "");
        assert_eq!(user.request_count, 0);
        assert_eq!(user.seen_count, 4);
    }

    #[test]
    fn test_decode_item_keeps_reported_fields() {
        let it = item(&[
            ("email", AttributeValue::S("bob@x.com".into())),
            ("fullname", AttributeValue::S("Bob".into())),
            ("requestCount", AttributeValue::N("2".into())),
        ]);

        let user = decode_item(&it).unwrap();
        assert_eq!(user.full_name, "Bob");
        assert_eq!(user.request_count, 2);
        assert_eq!(user.seen_count, 0);
    }

    #[test]
    fn test_decode_item_without_email() {
        let summary_row = item(&[
            ("userId", AttributeValue::S("u-17".into())),
            ("chatId", AttributeValue::S("c-42".into())),
            ("seenCount", AttributeValue::N("3".into())),
            ("seenStatus", AttributeValue::N("0".into())),
        ]);

        let user = decode_item(&summary_row).unwrap();
        assert_eq!(user.email, "");
        assert_eq!(user.seen_count, 3);

        let null_email = item(&[("email", AttributeValue::Null(true))]);
        assert_eq!(decode_item(&null_email).unwrap().email, "");

        let items = vec![
            item(&[("email", AttributeValue::S("a@x.com".into()))]),
            summary_row,
        ];
        let users = decode_items(&items, false).unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].email, "a@x.com");
    }

    #[test]
    fn test_decode_item_rejects_bad_shapes() {
        let numeric_email = item(&[("email", AttributeValue::N("1".into()))]);
        assert!(decode_item(&numeric_email).unwrap_err().is_decode());

        let fractional = item(&[
            ("email", AttributeValue::S("a@x.com".into())),
            ("seenCount", AttributeValue::N("1.5".into())),
        ]);
        assert!(decode_item(&fractional).is_err());

        let negative = item(&[
            ("email", AttributeValue::S("a@x.com".into())),
            ("seenCount", AttributeValue::N("-2".into())),
        ]);
        assert!(decode_item(&negative).is_err());
    }

    #[test]
    fn test_single_malformed_item_fails_fetch() {
        let items = vec![
            item(&[("email", AttributeValue::S("a@x.com".into()))]),
            item(&[
                ("email", AttributeValue::S("b@x.com".into())),
                ("seenCount", AttributeValue::S("many".into())),
            ]),
        ];

        assert!(decode_items(&items, false).is_err());
        assert_eq!(decode_items(&items, true).unwrap().len(), 1);
    }

    fn service_error(code: &str) -> SdkError<QueryError, ()> {
        let meta = ErrorMetadata::builder().code(code).message("rejected").build();
        SdkError::service_error(QueryError::generic(meta), ())
    }

    #[test]
    fn test_transport_failures_are_connection_errors() {
        let timeout: SdkError<QueryError, ()> =
            SdkError::timeout_error(io::Error::new(io::ErrorKind::TimedOut, "deadline"));
        assert!(matches!(classify(timeout), SourceError::Connection { .. }));

        let refused = ConnectorError::io(Box::new(io::Error::new(
            io::ErrorKind::ConnectionRefused,
            "refused",
        )));
        let dispatch: SdkError<QueryError, ()> = SdkError::dispatch_failure(refused);
        assert!(matches!(classify(dispatch), SourceError::Connection { .. }));
    }

    #[test]
    fn test_rejected_credentials_are_connection_errors() {
        for code in AUTH_ERROR_CODES {
            assert!(
                matches!(classify(service_error(code)), SourceError::Connection { .. }),
                "{} should be a connection error",
                code
            );
        }
    }

    #[test]
    fn test_other_service_errors_are_query_errors() {
        for code in ["ValidationException", "ResourceNotFoundException", "InternalServerError"] {
            assert!(
                matches!(classify(service_error(code)), SourceError::Query { .. }),
                "{} should be a query error",
                code
            );
        }
    }
}
