//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.referral-notifier.toml` files. Environment variables reach the
//! configuration only through the CLI layer.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Default configuration file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".referral-notifier.toml";

/// Upper bound on the pacing delay between notifications.
pub const MAX_PACE_MS: u64 = 60_000;

/// Upper bound on retries per recipient.
pub const MAX_RETRIES: u32 = 10;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Graph store (friend requests).
    #[serde(default)]
    pub graph: GraphConfig,

    /// Key-value store (unseen notifications).
    #[serde(default)]
    pub store: StoreConfig,

    /// Mail relay settings.
    #[serde(default)]
    pub mail: MailConfig,

    /// Dispatch loop settings.
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

/// Neo4j connection settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    #[serde(default)]
    pub uri: String,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    /// Skip rows with missing or ill-typed columns instead of failing.
    #[serde(default = "default_true")]
    pub skip_malformed_rows: bool,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            uri: String::new(),
            username: String::new(),
            password: String::new(),
            skip_malformed_rows: true,
        }
    }
}

impl fmt::Debug for GraphConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphConfig")
            .field("uri", &self.uri)
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .field("skip_malformed_rows", &self.skip_malformed_rows)
            .finish()
    }
}

/// DynamoDB table and index settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_region")]
    pub region: String,

    #[serde(default)]
    pub table_name: String,

    #[serde(default = "default_index_name")]
    pub index_name: String,

    /// Key-condition expression run against the index.
    #[serde(default = "default_key_condition")]
    pub key_condition: String,

    /// Placeholder used in `key_condition` for the status value.
    #[serde(default = "default_status_placeholder")]
    pub status_placeholder: String,

    /// Numeric status that marks a notification as unseen.
    #[serde(default = "default_status_value")]
    pub status_value: String,

    /// Skip undecodable items instead of failing the fetch.
    #[serde(default)]
    pub skip_malformed_rows: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            table_name: String::new(),
            index_name: default_index_name(),
            key_condition: default_key_condition(),
            status_placeholder: default_status_placeholder(),
            status_value: default_status_value(),
            skip_malformed_rows: false,
        }
    }
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_index_name() -> String {
    "seenStatus-index".to_string()
}

fn default_key_condition() -> String {
    "seenStatus = :statusValue".to_string()
}

fn default_status_placeholder() -> String {
    ":statusValue".to_string()
}

fn default_status_value() -> String {
    "0".to_string()
}

/// SMTP relay settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct MailConfig {
    #[serde(default)]
    pub host: String,

    #[serde(default = "default_smtp_port")]
    pub port: u16,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    /// Sender address.
    #[serde(default = "default_from")]
    pub from: String,

    #[serde(default = "default_subject")]
    pub subject: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_smtp_port(),
            username: String::new(),
            password: String::new(),
            from: default_from(),
            subject: default_subject(),
        }
    }
}

impl fmt::Debug for MailConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .field("from", &self.from)
            .field("subject", &self.subject)
            .finish()
    }
}

fn default_smtp_port() -> u16 {
    587
}

fn default_from() -> String {
    "noreply@quickrefer.app".to_string()
}

fn default_subject() -> String {
    "Referral notifications on QuickRefer".to_string()
}

/// Dispatch loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Delay before each send, in milliseconds.
    #[serde(default = "default_pace_millis")]
    pub pace_millis: u64,

    /// Extra attempts after a failed send. Zero disables retry.
    #[serde(default)]
    pub delivery_retries: u32,

    /// Reconcile and report without sending anything.
    #[serde(default)]
    pub dry_run: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            pace_millis: default_pace_millis(),
            delivery_retries: 0,
            dry_run: false,
        }
    }
}

impl DispatchConfig {
    pub fn pace(&self) -> Duration {
        Duration::from_millis(self.pace_millis)
    }
}

fn default_pace_millis() -> u64 {
    1000
}

fn default_true() -> bool {
    true
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        ""
    } else {
        "***"
    }
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// Only values the CLI (or its environment variables) actually supplied
    /// override the file.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        fn set(target: &mut String, value: &Option<String>) {
            if let Some(v) = value {
                *target = v.clone();
            }
        }

        set(&mut self.graph.uri, &args.graph_uri);
        set(&mut self.graph.username, &args.graph_user);
        set(&mut self.graph.password, &args.graph_password);

        set(&mut self.store.region, &args.region);
        set(&mut self.store.table_name, &args.table_name);
        set(&mut self.store.index_name, &args.index_name);

        set(&mut self.mail.host, &args.smtp_host);
        set(&mut self.mail.username, &args.smtp_user);
        set(&mut self.mail.password, &args.smtp_pass);
        set(&mut self.mail.from, &args.mail_from);
        if let Some(port) = args.smtp_port {
            self.mail.port = port;
        }

        if let Some(pace) = args.pace_ms {
            self.dispatch.pace_millis = pace;
        }
        if let Some(retries) = args.retries {
            self.dispatch.delivery_retries = retries;
        }
        if args.dry_run {
            self.dispatch.dry_run = true;
        }
    }

    /// Check that everything an invocation needs is present.
    pub fn validate(&self) -> Result<()> {
        if self.graph.uri.is_empty() {
            bail!("Graph URI is not set (NEO4J_URI or [graph].uri)");
        }
        if self.store.table_name.is_empty() {
            bail!("Table name is not set (DDB_TABLE_NAME or [store].table_name)");
        }
        if !self.store.key_condition.contains(&self.store.status_placeholder) {
            bail!(
                "Key condition `{}` does not use placeholder `{}`",
                self.store.key_condition,
                self.store.status_placeholder
            );
        }
        if !self.dispatch.dry_run && self.mail.host.is_empty() {
            bail!("SMTP host is not set (SMTP_HOST or [mail].host)");
        }
        if self.mail.port == 0 {
            bail!("SMTP port must be non-zero");
        }
        if self.dispatch.pace_millis > MAX_PACE_MS {
            bail!(
                "Pacing of {}ms exceeds the {}ms limit",
                self.dispatch.pace_millis,
                MAX_PACE_MS
            );
        }
        if self.dispatch.delivery_retries > MAX_RETRIES {
            bail!(
                "{} delivery retries exceeds the limit of {}",
                self.dispatch.delivery_retries,
                MAX_RETRIES
            );
        }
        Ok(())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn runnable() -> Config {
        let mut config = Config::default();
        config.graph.uri = "neo4j://localhost:7687".to_string();
        config.store.table_name = "chat-summary".to_string();
        config.mail.host = "smtp.example.com".to_string();
        config
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.store.index_name, "seenStatus-index");
        assert_eq!(config.store.key_condition, "seenStatus = :statusValue");
        assert_eq!(config.mail.port, 587);
        assert_eq!(config.dispatch.pace(), Duration::from_secs(1));
        assert_eq!(config.dispatch.delivery_retries, 0);
        assert!(config.graph.skip_malformed_rows);
        assert!(!config.store.skip_malformed_rows);
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[graph]
uri = "neo4j+s://graph.example.com"
username = "neo4j"

[store]
table_name = "chat-summary"
skip_malformed_rows = true

[dispatch]
pace_millis = 250
delivery_retries = 2
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.graph.uri, "neo4j+s://graph.example.com");
        assert!(config.graph.skip_malformed_rows);
        assert_eq!(config.store.table_name, "chat-summary");
        assert_eq!(config.store.index_name, "seenStatus-index");
        assert!(config.store.skip_malformed_rows);
        assert_eq!(config.dispatch.pace_millis, 250);
        assert_eq!(config.dispatch.delivery_retries, 2);
        assert_eq!(config.mail.subject, "Referral notifications on QuickRefer");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[mail]\nhost = \"smtp.example.com\"\nport = 2525").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.mail.host, "smtp.example.com");
        assert_eq!(config.mail.port, 2525);
    }

    #[test]
    fn test_load_rejects_bad_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[dispatch]\npace_millis = \"soon\"").unwrap();
        assert!(Config::load(file.path()).is_err());
    }

    #[test]
    fn test_validate() {
        assert!(runnable().validate().is_ok());

        let mut config = runnable();
        config.store.table_name.clear();
        assert!(config.validate().is_err());

        let mut config = runnable();
        config.mail.host.clear();
        assert!(config.validate().is_err());
        config.dispatch.dry_run = true;
        assert!(config.validate().is_ok());

        let mut config = runnable();
        config.store.key_condition = "seenStatus = :other".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_dispatch_bounds_from_file() {
        let parsed: Config = toml::from_str("[dispatch]\ndelivery_retries = 4000000000\n").unwrap();
        let mut config = runnable();
        config.dispatch = parsed.dispatch;
        assert!(config.validate().is_err());

        let parsed: Config = toml::from_str("[dispatch]\npace_millis = 86400000\n").unwrap();
        let mut config = runnable();
        config.dispatch = parsed.dispatch;
        assert!(config.validate().is_err());

        let mut config = runnable();
        config.dispatch.pace_millis = MAX_PACE_MS;
        config.dispatch.delivery_retries = MAX_RETRIES;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_debug_redacts_passwords() {
        let mut config = runnable();
        config.graph.password = "hunter2".to_string();
        config.mail.password = "swordfish".to_string();

        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("swordfish"));
        assert!(rendered.contains("***"));
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[graph]"));
        assert!(toml_str.contains("[store]"));
        assert!(toml_str.contains("[mail]"));
        assert!(toml_str.contains("[dispatch]"));
    }
}
