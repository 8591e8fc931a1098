//! Environment variable overrides for configuration.
//!
//! - `RECREATION_API_KEY` - Recreation.gov API key
//! - `TELEGRAM_BOT_TOKEN` - Telegram bot token
//! - `TELEGRAM_CHANNEL_ID` - trusted chat ID (numeric or `@username`)
//! - `CHECK_INTERVAL` - availability poll interval in seconds
//! - `DATA_DIR` - directory holding the persisted JSON documents

use std::env;
use std::path::PathBuf;

use tracing::warn;

use crate::config::types::Config;

/// Apply environment variable overrides to a config.
pub fn apply_env_overrides(config: Config) -> Config {
    apply_overrides(config, |name| env::var(name).ok())
}

/// Apply overrides using an arbitrary variable lookup.
pub fn apply_overrides(mut config: Config, lookup: impl Fn(&str) -> Option<String>) -> Config {
    if let Some(key) = lookup("RECREATION_API_KEY") {
        config.recreation.api_key = key;
    }
    if let Some(token) = lookup("TELEGRAM_BOT_TOKEN") {
        config.telegram.bot_token = token;
    }
    if let Some(channel) = lookup("TELEGRAM_CHANNEL_ID") {
        config.telegram.channel_id = channel;
    }
    if let Some(interval) = lookup("CHECK_INTERVAL") {
        match interval.trim().parse() {
            Ok(secs) => config.monitor.check_interval_secs = secs,
            Err(_) => warn!("Ignoring invalid CHECK_INTERVAL '{}'", interval),
        }
    }
    if let Some(dir) = lookup("DATA_DIR") {
        config.monitor.data_dir = PathBuf::from(dir);
    }

    config
}

/// Get the config file path from environment or use default.
///
/// Checks `PERMIT_WATCH_CONFIG`, otherwise returns "permit-watch.conf".
pub fn get_config_path() -> String {
    env::var("PERMIT_WATCH_CONFIG").unwrap_or_else(|_| "permit-watch.conf".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_no_vars_leaves_config_unchanged() {
        let result = apply_overrides(Config::default(), lookup(&[]));
        assert!(result.recreation.api_key.is_empty());
        assert_eq!(result.monitor.check_interval_secs, 60);
    }

    #[test]
    fn test_secrets_and_interval_override() {
        let result = apply_overrides(
            Config::default(),
            lookup(&[
                ("RECREATION_API_KEY", "key"),
                ("TELEGRAM_BOT_TOKEN", "123:abc"),
                ("TELEGRAM_CHANNEL_ID", "-100200"),
                ("CHECK_INTERVAL", "90"),
                ("DATA_DIR", "/var/lib/permit-watch"),
            ]),
        );

        assert_eq!(result.recreation.api_key, "key");
        assert_eq!(result.telegram.bot_token, "123:abc");
        assert_eq!(result.telegram.channel_id, "-100200");
        assert_eq!(result.monitor.check_interval_secs, 90);
        assert_eq!(result.monitor.data_dir, PathBuf::from("/var/lib/permit-watch"));
    }

    #[test]
    fn test_invalid_interval_ignored() {
        let result = apply_overrides(Config::default(), lookup(&[("CHECK_INTERVAL", "soon")]));
        assert_eq!(result.monitor.check_interval_secs, 60);
    }
}
