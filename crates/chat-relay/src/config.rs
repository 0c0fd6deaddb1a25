use chat_bus::{DEFAULT_INGRESS_CAPACITY, DEFAULT_MAILBOX_CAPACITY};
use chat_moderation::StrategyKind;
use chat_transcript::TranscriptConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub moderation: ModerationConfig,
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub stats: StatsConfig,
}

#[derive(Debug, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_listen")]
    pub listen_addr: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// JSON-lines transcript of every bus event. Disabled when unset.
    #[serde(default)]
    pub transcript_path: Option<PathBuf>,
    /// Rotate the transcript past this size. Never rotates when unset.
    #[serde(default)]
    pub transcript_max_bytes: Option<u64>,
    #[serde(default = "default_transcript_keep")]
    pub transcript_keep: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            transcript_path: None,
            transcript_max_bytes: None,
            transcript_keep: default_transcript_keep(),
        }
    }
}

impl LoggingConfig {
    pub fn transcript(&self) -> Option<TranscriptConfig> {
        let path = self.transcript_path.as_ref()?;
        let config = TranscriptConfig::new(path);
        Some(match self.transcript_max_bytes {
            Some(max) => config.with_rotation(max, self.transcript_keep),
            None => config,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ModerationConfig {
    /// Strategy active at startup. Falls back to the policy's default.
    #[serde(default)]
    pub strategy: Option<StrategyKind>,
    /// Word lists and chain order. Built-in lists when unset.
    #[serde(default)]
    pub policy_file: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
pub struct BusConfig {
    #[serde(default = "default_ingress_capacity")]
    pub ingress_capacity: usize,
    #[serde(default = "default_mailbox_capacity")]
    pub mailbox_capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            ingress_capacity: default_ingress_capacity(),
            mailbox_capacity: default_mailbox_capacity(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StatsConfig {
    #[serde(default = "default_report_interval")]
    pub report_interval_secs: u64,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            report_interval_secs: default_report_interval(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default-value functions used by serde
// ---------------------------------------------------------------------------

fn default_listen() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_transcript_keep() -> usize {
    chat_transcript::writer::DEFAULT_KEEP
}

fn default_ingress_capacity() -> usize {
    DEFAULT_INGRESS_CAPACITY
}

fn default_mailbox_capacity() -> usize {
    DEFAULT_MAILBOX_CAPACITY
}

fn default_report_interval() -> u64 {
    30
}

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

/// Load configuration from a YAML file.
///
/// If the file does not exist a default configuration is returned and a
/// warning is emitted.
pub fn load(path: &Path) -> anyhow::Result<Config> {
    if !path.exists() {
        warn!(
            path = %path.display(),
            "configuration file not found; using defaults"
        );
        return Ok(Config::default());
    }

    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

    let config: Config = serde_yml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("failed to parse config file {}: {e}", path.display()))?;

    config.validate()?;
    Ok(config)
}

impl Config {
    fn validate(&self) -> anyhow::Result<()> {
        if self.bus.ingress_capacity == 0 {
            anyhow::bail!("bus.ingress_capacity must be greater than zero");
        }
        if self.bus.mailbox_capacity == 0 {
            anyhow::bail!("bus.mailbox_capacity must be greater than zero");
        }
        if self.logging.transcript_max_bytes == Some(0) {
            anyhow::bail!("logging.transcript_max_bytes must be greater than zero");
        }
        if self.stats.report_interval_secs == 0 {
            anyhow::bail!("stats.report_interval_secs must be greater than zero");
        }
        Ok(())
    }
}
