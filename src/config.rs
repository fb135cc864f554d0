// src/config.rs
//! Typed configuration. Recognized options are enumerated here instead of
//! an arbitrary option bag; unknown keys in the TOML are ignored by serde.
//!
//! Precedence: defaults < config file < environment variables.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::fingerprint::ContentKind;

pub const DEFAULT_CONFIG_PATH: &str = "config/firmwatch.toml";
pub const DEFAULT_SCHEDULE_TIME: &str = "20:00";

pub const ENV_DB_PATH: &str = "FIRMWATCH_DB";
pub const ENV_SCHEDULE_TIME: &str = "SCHEDULE_TIME";
pub const ENV_SMTP_SERVER: &str = "SMTP_SERVER";
pub const ENV_SMTP_PORT: &str = "SMTP_PORT";
pub const ENV_EMAIL_SENDER: &str = "EMAIL_SENDER";
pub const ENV_EMAIL_PASSWORD: &str = "EMAIL_PASSWORD";
pub const ENV_EMAIL_RECIPIENT: &str = "EMAIL_RECIPIENT";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub job_monitoring: JobMonitoringConfig,
    /// Daily run time, HH:MM (24h).
    #[serde(default = "default_schedule_time")]
    pub schedule_time: String,
}

// Manual impl: the serde `default =` attributes apply only during
// deserialization, and `schedule_time` must default to 20:00 either way.
impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            storage: StorageConfig::default(),
            ingest: IngestConfig::default(),
            email: EmailConfig::default(),
            job_monitoring: JobMonitoringConfig::default(),
            schedule_time: default_schedule_time(),
        }
    }
}

fn default_schedule_time() -> String {
    DEFAULT_SCHEDULE_TIME.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("firmwatch.db"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root of the file area for stored bodies.
    pub dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("content_storage"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Max sources ingesting at the same time.
    pub concurrency: usize,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            concurrency: crate::pipeline::DEFAULT_CONCURRENCY,
            sources: Vec::new(),
        }
    }
}

/// One configured source. `fixture` points at a JSON file of raw items
/// for sources whose scraper runs out-of-process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub url: String,
    pub kind: ContentKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixture: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmailConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub smtp_server: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub sender_email: String,
    #[serde(default)]
    pub sender_password: String,
    #[serde(default)]
    pub recipient_email: String,
}

fn default_smtp_port() -> u16 {
    587
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobMonitoringConfig {
    /// Scrape career pages of every registered firm.
    pub scrape_known_firms: bool,
    /// Also scrape firms first seen through campus events.
    pub scrape_event_firms: bool,
}

impl Default for JobMonitoringConfig {
    fn default() -> Self {
        Self {
            scrape_known_firms: true,
            scrape_event_firms: true,
        }
    }
}

impl Config {
    /// Load from `path` if it exists, else start from defaults; then apply
    /// environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading config from {}", path.display()))?;
            toml::from_str(&content)
                .with_context(|| format!("parsing config from {}", path.display()))?
        } else {
            Config::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(db) = std::env::var(ENV_DB_PATH) {
            self.database.path = PathBuf::from(db);
        }
        if let Ok(t) = std::env::var(ENV_SCHEDULE_TIME) {
            self.schedule_time = t;
        }
        if let Ok(server) = std::env::var(ENV_SMTP_SERVER) {
            self.email.enabled = true;
            self.email.smtp_server = server;
        }
        if let Ok(port) = std::env::var(ENV_SMTP_PORT) {
            if let Ok(port) = port.trim().parse() {
                self.email.smtp_port = port;
            }
        }
        if let Ok(v) = std::env::var(ENV_EMAIL_SENDER) {
            self.email.sender_email = v;
        }
        if let Ok(v) = std::env::var(ENV_EMAIL_PASSWORD) {
            self.email.sender_password = v;
        }
        if let Ok(v) = std::env::var(ENV_EMAIL_RECIPIENT) {
            self.email.recipient_email = v;
        }
    }

    /// Write an example config a user can edit (`firmwatch init-config`).
    pub fn write_example(path: &Path) -> Result<()> {
        let example = Config {
            ingest: IngestConfig {
                concurrency: crate::pipeline::DEFAULT_CONCURRENCY,
                sources: vec![SourceConfig {
                    name: "My University Events".into(),
                    url: "https://example.edu/events".into(),
                    kind: ContentKind::Event,
                    fixture: None,
                }],
            },
            email: EmailConfig {
                enabled: false,
                smtp_server: "smtp.gmail.com".into(),
                smtp_port: 587,
                sender_email: "your-email@gmail.com".into(),
                sender_password: "your-app-password".into(),
                recipient_email: "recipient@example.com".into(),
            },
            ..Config::default()
        };
        let rendered = toml::to_string_pretty(&example).context("rendering example config")?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
        }
        std::fs::write(path, rendered)
            .with_context(|| format!("writing example config to {}", path.display()))?;
        Ok(())
    }
}
