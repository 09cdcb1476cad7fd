// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Triage configuration

use crate::extractor::default_inclusion_pallets;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Tunables that are not worth a CLI flag
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriageConfig {
    /// Timeout applied to every chain query
    #[serde(default = "default_fetch_timeout", with = "humantime_serde")]
    pub fetch_timeout: Duration,

    /// How long a failing chain query is retried before the loop gives up.
    /// Zero disables retrying.
    #[serde(default = "default_max_retry_duration", with = "humantime_serde")]
    pub max_retry_duration: Duration,

    /// Interval between finalized head checks
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,

    /// Capacity of the finality notification channel
    #[serde(default = "default_channel_size")]
    pub channel_size: usize,

    /// Pallet names the inclusion events are emitted under
    #[serde(default = "default_inclusion_pallets")]
    pub inclusion_pallets: Vec<String>,

    #[serde(default)]
    pub log_format: LogFormat,
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: default_fetch_timeout(),
            max_retry_duration: default_max_retry_duration(),
            poll_interval: default_poll_interval(),
            channel_size: default_channel_size(),
            inclusion_pallets: default_inclusion_pallets(),
            log_format: LogFormat::default(),
        }
    }
}

fn default_fetch_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_max_retry_duration() -> Duration {
    Duration::from_secs(60)
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(2)
}

fn default_channel_size() -> usize {
    64
}

impl TriageConfig {
    /// Load configuration from YAML file with environment variable substitution
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .context(format!("Failed to read triage config file: {:?}", path))?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        let contents = substitute_env_vars(contents)?;
        serde_yaml::from_str(&contents).context("Failed to parse triage config YAML")
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(content: &str) -> Result<String> {
    use regex::Regex;

    let re = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}")
        .context("Failed to build env placeholder pattern")?;
    let mut result = content.to_string();

    for cap in re.captures_iter(content) {
        let full_match = &cap[0];
        let var_name = &cap[1];

        if let Ok(var_value) = std::env::var(var_name) {
            result = result.replace(full_match, &var_value);
        } else {
            tracing::warn!(
                "Environment variable {} not found, keeping placeholder",
                var_name
            );
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_from_empty_yaml() {
        let config = TriageConfig::from_yaml("{}").unwrap();
        assert_eq!(config.fetch_timeout, Duration::from_secs(30));
        assert_eq!(config.max_retry_duration, Duration::from_secs(60));
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.channel_size, 64);
        assert_eq!(config.inclusion_pallets, default_inclusion_pallets());
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    fn test_humantime_durations() {
        let yaml = "fetch_timeout: 5s\nmax_retry_duration: 0s\npoll_interval: 500ms\nlog_format: json\n";
        let config = TriageConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.fetch_timeout, Duration::from_secs(5));
        assert_eq!(config.max_retry_duration, Duration::ZERO);
        assert_eq!(config.poll_interval, Duration::from_millis(500));
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_invalid_yaml() {
        assert!(TriageConfig::from_yaml("fetch_timeout: soon").is_err());
    }

    #[test]
    #[serial]
    fn test_from_file_with_env_substitution() {
        std::env::set_var("TRIAGE_TEST_PALLET", "parasInclusion");

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "inclusion_pallets:\n  - ${{TRIAGE_TEST_PALLET}}\nchannel_size: 8").unwrap();

        let config = TriageConfig::from_file(file.path()).unwrap();
        assert_eq!(config.inclusion_pallets, vec!["parasInclusion".to_string()]);
        assert_eq!(config.channel_size, 8);

        std::env::remove_var("TRIAGE_TEST_PALLET");
    }

    #[test]
    #[serial]
    fn test_substitute_env_vars_missing() {
        std::env::remove_var("TRIAGE_MISSING_VAR");

        let input = "value: ${TRIAGE_MISSING_VAR}";
        let result = substitute_env_vars(input).unwrap();

        assert_eq!(result, "value: ${TRIAGE_MISSING_VAR}");
    }

    #[test]
    fn test_from_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(TriageConfig::from_file(&dir.path().join("absent.yaml")).is_err());
    }
}
