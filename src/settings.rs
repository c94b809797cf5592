use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

fn default_debug_logging() -> bool {
    false
}

fn default_store_dir() -> PathBuf {
    dirs_next::data_dir()
        .map(|dir| dir.join("trade_dashboard"))
        .unwrap_or_else(|| PathBuf::from("dashboard_data"))
}

fn default_trade_wait_timeout_ms() -> u64 {
    3000
}

fn default_toast_log_file() -> PathBuf {
    PathBuf::from(crate::toast_log::TOAST_LOG_FILE)
}

/// Runtime configuration of the dashboard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    #[serde(default = "default_debug_logging")]
    pub debug_logging: bool,
    /// Directory holding the JSON store files.
    #[serde(default = "default_store_dir")]
    pub store_dir: PathBuf,
    /// How long startup waits for the trade dataset before giving up.
    #[serde(default = "default_trade_wait_timeout_ms")]
    pub trade_wait_timeout_ms: u64,
    #[serde(default = "default_toast_log_file")]
    pub toast_log_file: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug_logging: default_debug_logging(),
            store_dir: default_store_dir(),
            trade_wait_timeout_ms: default_trade_wait_timeout_ms(),
            toast_log_file: default_toast_log_file(),
        }
    }
}

impl Settings {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path).unwrap_or_default();
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &str) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn trade_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.trade_wait_timeout_ms.max(1))
    }
}
