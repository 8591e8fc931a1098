//! Configuration file parsing (HOCON format).

use std::fs;
use std::path::Path;

use hocon::HoconLoader;

use crate::common::error::ConfigError;
use crate::config::types::Config;

/// Load configuration from a HOCON file.
///
/// A missing file is not an error: every setting has a default and the
/// secrets usually arrive through the environment.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(Config::default());
    }

    let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    load_config_str(&content)
}

/// Load configuration from a HOCON string.
pub fn load_config_str(content: &str) -> Result<Config, ConfigError> {
    HoconLoader::new()
        .load_str(content)
        .map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })?
        .resolve()
        .map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = load_config("/nonexistent/permit-watch.conf").unwrap();
        assert_eq!(config.monitor.check_interval_secs, 60);
        assert_eq!(config.telegram.command_poll_secs, 2);
        assert_eq!(config.discovery.ranges.len(), 3);
    }

    #[test]
    fn test_config_file_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("permit-watch.conf");
        fs::write(
            &path,
            "telegram { channel_id = \"@rivers\" }\ndiscovery { probe_delay_ms = 750 }\n",
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.telegram.channel_id, "@rivers");
        assert_eq!(config.discovery.probe_delay_ms, 750);
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config = load_config_str(
            r#"
            monitor {
              check_interval_secs = 120
            }
            discovery {
              min_divisions = 2
            }
            "#,
        )
        .unwrap();

        assert_eq!(config.monitor.check_interval_secs, 120);
        assert_eq!(config.discovery.min_divisions, 2);
        assert_eq!(config.discovery.probe_delay_ms, 500);
        assert_eq!(config.recreation.base_url, "https://www.recreation.gov");
    }
}
