//! Configuration validation.
//!
//! Validates configuration values and provides helpful error messages.

use crate::common::error::ConfigError;
use crate::config::types::Config;

/// Lowest inter-probe delay accepted for division discovery.
pub const MIN_PROBE_DELAY_MS: u64 = 300;

const PLACEHOLDERS: [&str; 3] = ["your_api_key", "your_bot_token", "your_channel_id"];

/// Validate a configuration and return detailed errors.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    check_secret(&mut errors, "RECREATION_API_KEY", &config.recreation.api_key);
    check_secret(&mut errors, "TELEGRAM_BOT_TOKEN", &config.telegram.bot_token);
    check_secret(&mut errors, "TELEGRAM_CHANNEL_ID", &config.telegram.channel_id);

    if config.monitor.check_interval_secs == 0 {
        errors.push("monitor.check_interval_secs must be non-zero".to_string());
    }
    if config.telegram.command_poll_secs == 0 {
        errors.push("telegram.command_poll_secs must be non-zero".to_string());
    }
    if config.recreation.timeout_secs == 0 || config.telegram.timeout_secs == 0 {
        errors.push("request timeouts must be non-zero".to_string());
    }
    if config.recreation.lookahead_days == 0 {
        errors.push("recreation.lookahead_days must be non-zero".to_string());
    }

    if config.discovery.probe_delay_ms < MIN_PROBE_DELAY_MS {
        errors.push(format!(
            "discovery.probe_delay_ms must be at least {} (got {})",
            MIN_PROBE_DELAY_MS, config.discovery.probe_delay_ms
        ));
    }
    if config.discovery.min_divisions == 0 {
        errors.push("discovery.min_divisions must be non-zero".to_string());
    }
    if config.discovery.ranges.is_empty() {
        errors.push("discovery.ranges is empty - no candidate divisions to probe".to_string());
    }
    for (i, range) in config.discovery.ranges.iter().enumerate() {
        if range.end < range.start {
            errors.push(format!(
                "discovery.ranges[{}] is inverted ({} > {})",
                i, range.start, range.end
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError {
            message: errors.join("\n"),
        })
    }
}

fn check_secret(errors: &mut Vec<String>, name: &str, value: &str) {
    let value = value.trim();
    if value.is_empty() {
        errors.push(format!("{} is required", name));
    } else if PLACEHOLDERS.contains(&value.to_lowercase().as_str()) {
        errors.push(format!("{} has not been configured (still using placeholder)", name));
    }
}
