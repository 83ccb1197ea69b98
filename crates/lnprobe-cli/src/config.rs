//! CLI configuration loading and management.

use lnprobe_core::ProbeConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Full configuration for the `lnprobe` binary.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LnprobeConfig {
    /// How to reach the node.
    #[serde(default)]
    pub node: NodeConfig,

    /// Defaults for probe sessions.
    #[serde(default)]
    pub probe: ProbeConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// LND REST gateway URL.
    #[serde(default = "default_rest_url")]
    pub rest_url: String,
    /// Macaroon sent with every request.
    #[serde(default)]
    pub macaroon_path: Option<PathBuf>,
    /// PEM certificate to trust in addition to the system roots.
    #[serde(default)]
    pub tls_cert_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (text, json).
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_rest_url() -> String {
    "https://127.0.0.1:8080".into()
}
fn default_log_level() -> String {
    "warn".into()
}
fn default_log_format() -> String {
    "text".into()
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            rest_url: default_rest_url(),
            macaroon_path: None,
            tls_cert_path: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl LnprobeConfig {
    /// Load config from a TOML file, falling back to defaults for missing fields.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            let config: LnprobeConfig = toml::from_str(&contents)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save the current config to a TOML file.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }
}
