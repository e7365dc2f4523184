use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub data_dir: String,
    pub wal_flush_interval_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "snake_case")]
pub enum EmbedderType {
    Remote,
    Local,
    Mock,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbedderConfig {
    #[serde(default)]
    pub kind: Option<EmbedderType>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub credential: Option<String>,
    #[serde(default)]
    pub dimension_override: Option<usize>,
}

impl EmbedderConfig {
    /// Per §6: missing credential with unspecified type defaults to mock;
    /// an explicit type is always honored.
    pub fn resolved_kind(&self) -> EmbedderType {
        match &self.kind {
            Some(kind) => kind.clone(),
            None if self.credential.is_some() => EmbedderType::Remote,
            None => EmbedderType::Mock,
        }
    }
}

/// Fixed pool sizes and channel depth per §5's concurrency model.
#[derive(Debug, Deserialize, Clone)]
pub struct WorkerPoolConfig {
    #[serde(default = "WorkerPoolConfig::default_analyst_workers")]
    pub analyst_workers: usize,
    #[serde(default = "WorkerPoolConfig::default_tagger_workers")]
    pub tagger_workers: usize,
    #[serde(default = "WorkerPoolConfig::default_generic_workers")]
    pub generic_workers: usize,
    #[serde(default = "WorkerPoolConfig::default_channel_capacity")]
    pub channel_capacity: usize,
}

impl WorkerPoolConfig {
    fn default_analyst_workers() -> usize {
        3
    }
    fn default_tagger_workers() -> usize {
        2
    }
    fn default_generic_workers() -> usize {
        5
    }
    fn default_channel_capacity() -> usize {
        100
    }
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            analyst_workers: Self::default_analyst_workers(),
            tagger_workers: Self::default_tagger_workers(),
            generic_workers: Self::default_generic_workers(),
            channel_capacity: Self::default_channel_capacity(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PushConfig {
    #[serde(default = "PushConfig::default_keepalive_secs")]
    pub keepalive_interval_secs: u64,
    #[serde(default = "PushConfig::default_session_timeout_secs")]
    pub session_timeout_secs: u64,
    #[serde(default = "PushConfig::default_mailbox_ttl_days")]
    pub mailbox_ttl_days: u64,
}

impl PushConfig {
    fn default_keepalive_secs() -> u64 {
        30
    }
    fn default_session_timeout_secs() -> u64 {
        60
    }
    fn default_mailbox_ttl_days() -> u64 {
        7
    }
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            keepalive_interval_secs: Self::default_keepalive_secs(),
            session_timeout_secs: Self::default_session_timeout_secs(),
            mailbox_ttl_days: Self::default_mailbox_ttl_days(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    /// Gates the legacy CONFIDENTIAL keyword-scan alert path; kept
    /// independent of the rule-driven AnalystPool path (§9 open question).
    #[serde(default = "IngestConfig::default_legacy_keyword_alert_enabled")]
    pub legacy_keyword_alert_enabled: bool,
}

impl IngestConfig {
    fn default_legacy_keyword_alert_enabled() -> bool {
        true
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            legacy_keyword_alert_enabled: Self::default_legacy_keyword_alert_enabled(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub embedder: EmbedderConfig,
    #[serde(default)]
    pub worker_pools: WorkerPoolConfig,
    #[serde(default)]
    pub push: PushConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            kind: None,
            model: None,
            base_url: None,
            credential: None,
            dimension_override: None,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            .add_source(File::with_name("config/default"))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            .add_source(Environment::with_prefix("HIVE").separator("__"));

        builder.build()?.try_deserialize()
    }
}
