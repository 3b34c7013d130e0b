//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$STOCKSYNC_CONFIG` (environment variable)
//! 2. `~/.config/stocksync/config.toml` (Linux/macOS)
//!    `%APPDATA%\stocksync\config.toml` (Windows)
//! 3. Built-in defaults

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{StockError, Result};
use crate::model::header::HeaderTemplate;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging settings.
    pub general: GeneralConfig,
    /// Incoming mailbox holding the supplier messages.
    pub mailbox: MailboxConfig,
    /// Outgoing server used for the run notification.
    pub smtp: SmtpConfig,
    /// Product databases.
    pub store: StoreConfig,
    /// What to look for and how to apply it.
    pub job: JobConfig,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Override directory for log files.
    pub log_dir: Option<PathBuf>,
}

/// Transport security for the mailbox connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Security {
    Plain,
    Tls,
}

/// Incoming mailbox settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailboxConfig {
    pub host: String,
    pub port: u16,
    /// Service name shown in the connection string ("imap", "pop3").
    pub service: String,
    /// Connection flags such as "/novalidate-cert".
    pub flags: String,
    pub security: Security,
    pub user: String,
    pub password: String,
    pub inbox: String,
    /// `false` for servers without folders: moves are only logged.
    pub folders: bool,
}

/// Outgoing SMTP settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    /// Fully qualified domain name sent with HELO.
    pub helo_domain: String,
    pub user: String,
    pub password: String,
    /// Socket read timeout in seconds.
    pub timeout_secs: u64,
    /// Recipient used when none is given on the command line.
    pub default_recipient: String,
}

/// Product database locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Database updated when running with `--ops`.
    pub operational_path: PathBuf,
    /// Database updated otherwise.
    pub test_path: PathBuf,
}

/// How the subject is matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Server-side `SEARCH SUBJECT`.
    Server,
    /// Compare every message subject client-side.
    Scan,
}

/// Reconciliation job settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    /// Subject of the supplier message.
    pub subject: String,
    pub search: SearchMode,
    /// Delete aged messages from every folder after the run.
    pub purge: bool,
    pub purge_age_days: i64,
    /// Quantities below this are flagged out of stock.
    pub low_stock_threshold: f64,
    /// Quantity written for every updated product.
    pub quantity_sentinel: i64,
    pub notify_subject: String,
    pub notify_body: String,
    /// Header cells to locate in the spreadsheet.
    pub columns: HeaderTemplate,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_dir: None,
        }
    }
}

impl Default for MailboxConfig {
    fn default() -> Self {
        Self {
            host: "mail.example.com".to_string(),
            port: 143,
            service: "imap".to_string(),
            flags: "/novalidate-cert".to_string(),
            security: Security::Plain,
            user: String::new(),
            password: String::new(),
            inbox: "INBOX".to_string(),
            folders: true,
        }
    }
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: "smtp.example.com".to_string(),
            port: 587,
            helo_domain: "localhost".to_string(),
            user: String::new(),
            password: String::new(),
            timeout_secs: 1,
            default_recipient: String::new(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            operational_path: PathBuf::from("products.db"),
            test_path: PathBuf::from("products-test.db"),
        }
    }
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            subject: "Stock Position".to_string(),
            search: SearchMode::Server,
            purge: true,
            purge_age_days: 30,
            low_stock_threshold: 10.0,
            quantity_sentinel: 9999,
            notify_subject: "Stock Position File Processed".to_string(),
            notify_body: "Stock Position File Processed. See attached log file.".to_string(),
            columns: HeaderTemplate::default(),
        }
    }
}

impl MailboxConfig {
    /// `{host:port/service flags}` as shown in logs.
    pub fn connection_string(&self) -> String {
        let service = if self.service.is_empty() {
            String::new()
        } else {
            format!("/{}", self.service)
        };
        format!("{{{}:{}{}{}}}", self.host, self.port, service, self.flags)
    }

    pub fn novalidate_cert(&self) -> bool {
        self.flags.contains("/novalidate-cert")
    }

    pub fn processed_folder(&self) -> String {
        format!("{}.Processed", self.inbox)
    }

    pub fn error_folder(&self) -> String {
        format!("{}.Error", self.inbox)
    }
}

impl StoreConfig {
    pub fn path(&self, operational: bool) -> &Path {
        if operational {
            &self.operational_path
        } else {
            &self.test_path
        }
    }
}

impl Config {
    /// A copy safe to print: passwords replaced.
    pub fn masked(&self) -> Self {
        let mut copy = self.clone();
        for secret in [&mut copy.mailbox.password, &mut copy.smtp.password] {
            if !secret.is_empty() {
                *secret = "********".to_string();
            }
        }
        copy
    }
}

// ── Load / save ─────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// A missing file yields the defaults. Unlike an interactive tool, a batch
/// job must not silently run against defaults when its file is broken, so
/// read and parse errors are returned.
pub fn load_config() -> Result<Config> {
    match config_file_path() {
        Some(path) if path.exists() => load_config_from(&path),
        _ => {
            tracing::info!("No config file found, using defaults");
            Ok(Config::default())
        }
    }
}

/// Load configuration from an explicit path.
pub fn load_config_from(path: &Path) -> Result<Config> {
    let contents = std::fs::read_to_string(path).map_err(|e| StockError::io(path, e))?;
    let cfg = toml::from_str::<Config>(&contents)
        .map_err(|e| StockError::Config(format!("{}: {e}", path.display())))?;
    tracing::info!(path = %path.display(), "Loaded config");
    Ok(cfg)
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    // 1. Environment variable override
    if let Ok(env_path) = std::env::var("STOCKSYNC_CONFIG") {
        return Some(PathBuf::from(env_path));
    }

    // 2. Standard config directory
    dirs::config_dir().map(|d| d.join("stocksync").join("config.toml"))
}

/// Return the directory for log files.
pub fn log_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.log_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("stocksync")
}
