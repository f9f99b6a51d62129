//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap. Every
//! connection setting can also come from the environment, which is the
//! only place the process reads environment variables.

use crate::config::{MAX_PACE_MS, MAX_RETRIES};
use clap::Parser;
use std::path::PathBuf;

/// Neo4j variables read by older deployments, in (uri, user, password) order.
const LEGACY_GRAPH_ENV: (&str, &str, &str) = ("URI", "USER", "PASSWORD");

/// Referral Notifier - mails each user a digest of pending friend
/// requests and unseen chat messages.
///
/// Reads friend-request counts from Neo4j and unseen-message counts from a
/// DynamoDB index, merges them per email, and sends one mail per user.
///
/// Examples:
///   referral-notifier
///   referral-notifier --dry-run --verbose
///   referral-notifier --report run.md --retries 2
///   referral-notifier --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Path to configuration file
    ///
    /// If not specified, looks for .referral-notifier.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Neo4j connection URI
    #[arg(long, env = "NEO4J_URI", value_name = "URI")]
    pub graph_uri: Option<String>,

    /// Neo4j user name
    #[arg(long, env = "NEO4J_USERNAME", value_name = "USER")]
    pub graph_user: Option<String>,

    /// Neo4j password
    #[arg(long, env = "NEO4J_PASSWORD", hide_env_values = true, value_name = "PASSWORD")]
    pub graph_password: Option<String>,

    /// AWS region of the DynamoDB table
    #[arg(long, env = "REGION", value_name = "REGION")]
    pub region: Option<String>,

    /// DynamoDB table holding chat summaries
    #[arg(long, env = "DDB_TABLE_NAME", value_name = "TABLE")]
    pub table_name: Option<String>,

    /// Secondary index queried for unseen notifications
    #[arg(long, value_name = "INDEX")]
    pub index_name: Option<String>,

    /// SMTP relay host
    #[arg(long, env = "SMTP_HOST", value_name = "HOST")]
    pub smtp_host: Option<String>,

    /// SMTP relay port (default 587)
    #[arg(long, env = "SMTP_PORT", value_name = "PORT")]
    pub smtp_port: Option<u16>,

    /// SMTP user name
    #[arg(long, env = "SMTP_USER", value_name = "USER")]
    pub smtp_user: Option<String>,

    /// SMTP password
    #[arg(long, env = "SMTP_PASS", hide_env_values = true, value_name = "PASSWORD")]
    pub smtp_pass: Option<String>,

    /// Sender address for notification mails
    #[arg(long, env = "MAIL_FROM", value_name = "ADDRESS")]
    pub mail_from: Option<String>,

    /// Delay before each send, in milliseconds (default 1000)
    #[arg(long, value_name = "MILLIS")]
    pub pace_ms: Option<u64>,

    /// Extra attempts for a failed send (default 0)
    #[arg(long, value_name = "NUM")]
    pub retries: Option<u32>,

    /// Fetch and reconcile, but send nothing
    #[arg(long)]
    pub dry_run: bool,

    /// Write a run report to this file
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Run report format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .referral-notifier.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the run report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        let mut args = Self::parse();
        args.fill_legacy_graph_env(|name| std::env::var(name).ok());
        args
    }

    /// Fall back to the unprefixed `URI`/`USER`/`PASSWORD` variables when no
    /// graph URI was given. `USER` is only consulted together with `URI`,
    /// since shells set it to the login name.
    pub fn fill_legacy_graph_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.graph_uri.is_some() {
            return;
        }
        let (uri_var, user_var, password_var) = LEGACY_GRAPH_ENV;
        let Some(uri) = lookup(uri_var) else {
            return;
        };

        self.graph_uri = Some(uri);
        if self.graph_user.is_none() {
            self.graph_user = lookup(user_var);
        }
        if self.graph_password.is_none() {
            self.graph_password = lookup(password_var);
        }
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(pace) = self.pace_ms {
            if pace > MAX_PACE_MS {
                return Err(format!("Pacing must be at most {}ms", MAX_PACE_MS));
            }
        }

        if let Some(retries) = self.retries {
            if retries > MAX_RETRIES {
                return Err(format!("Retries must be at most {}", MAX_RETRIES));
            }
        }

        if self.smtp_port == Some(0) {
            return Err("SMTP port must be non-zero".to_string());
        }

        if let Some(ref uri) = self.graph_uri {
            if !uri.contains("://") {
                return Err(format!("Graph URI has no scheme: {}", uri));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
