//! Configuration type definitions.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub recreation: RecreationConfig,
    pub telegram: TelegramConfig,
    pub monitor: MonitorConfig,
    pub discovery: DiscoveryConfig,
}

/// Recreation.gov API settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecreationConfig {
    pub api_key: String,
    pub base_url: String,
    /// How many days ahead of today to request availability for.
    pub lookahead_days: u32,
    pub timeout_secs: u64,
}

impl Default for RecreationConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://www.recreation.gov".to_string(),
            lookahead_days: 90,
            timeout_secs: 15,
        }
    }
}

/// Telegram bot settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub bot_token: String,
    /// The only chat that receives notifications and may issue commands.
    /// Either a numeric chat ID or an `@username`.
    pub channel_id: String,
    pub base_url: String,
    pub command_poll_secs: u64,
    pub timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            channel_id: String::new(),
            base_url: "https://api.telegram.org".to_string(),
            command_poll_secs: 2,
            timeout_secs: 15,
        }
    }
}

/// Availability polling settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub check_interval_secs: u64,
    /// Directory holding `permits.json` and `availability_state.json`.
    pub data_dir: PathBuf,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: 60,
            data_dir: PathBuf::from("./data"),
        }
    }
}

impl MonitorConfig {
    pub fn registry_path(&self) -> PathBuf {
        self.data_dir.join("permits.json")
    }

    pub fn state_path(&self) -> PathBuf {
        self.data_dir.join("availability_state.json")
    }
}

/// Division discovery settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub probe_delay_ms: u64,
    /// Discovery stops once this many divisions have been found.
    pub min_divisions: usize,
    pub ranges: Vec<ProbeRange>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            probe_delay_ms: 500,
            min_divisions: 1,
            ranges: vec![
                ProbeRange { start: 1, end: 20 },
                ProbeRange { start: 300, end: 400 },
                ProbeRange { start: 1000, end: 1100 },
            ],
        }
    }
}

impl DiscoveryConfig {
    pub fn probe_delay(&self) -> Duration {
        Duration::from_millis(self.probe_delay_ms)
    }
}

/// Inclusive range of candidate division IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ProbeRange {
    pub start: u32,
    pub end: u32,
}

impl ProbeRange {
    pub fn candidates(&self) -> impl Iterator<Item = u32> {
        self.start..=self.end
    }
}
