use anyhow::{Context, Result};
use clap::ArgMatches;
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

use crate::core::timings::Timings;

/// Root configuration structure, loaded with `--config <file>`.
///
/// Every field has a default, so a partial (or empty) JSON object is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Port the proxy server listens on
    #[serde(default = "default_port")]
    pub port: u16,
    /// Base URL of the proxy server the dashboard talks to
    #[serde(default = "default_proxy_url")]
    pub proxy_url: String,
    /// Directory holding the JSON configuration files and static assets
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// State poll period in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Connectivity probe period in milliseconds
    #[serde(default = "default_connectivity_interval_ms")]
    pub connectivity_interval_ms: u64,
    /// Timeout of one reachability probe in milliseconds
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    /// Timeout of proxied requests in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Delay before polling resumes after a command, in milliseconds
    #[serde(default = "default_resume_delay_ms")]
    pub resume_delay_ms: u64,
    /// How long polled state is ignored for acted-upon devices, in milliseconds
    #[serde(default = "default_suppression_window_ms")]
    pub suppression_window_ms: u64,
    /// Gap between the on and off halves of a trigger, in milliseconds
    #[serde(default = "default_trigger_settle_ms")]
    pub trigger_settle_ms: u64,
    /// How long an input transition stays highlighted, in milliseconds
    #[serde(default = "default_input_highlight_ms")]
    pub input_highlight_ms: u64,
}

fn default_port() -> u16 {
    3000
}

fn default_proxy_url() -> String {
    "http://127.0.0.1:3000".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_connectivity_interval_ms() -> u64 {
    10000
}

fn default_probe_timeout_ms() -> u64 {
    5000
}

fn default_request_timeout_ms() -> u64 {
    10000
}

fn default_resume_delay_ms() -> u64 {
    1000
}

fn default_suppression_window_ms() -> u64 {
    3000
}

fn default_trigger_settle_ms() -> u64 {
    300
}

fn default_input_highlight_ms() -> u64 {
    4000
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            proxy_url: default_proxy_url(),
            data_dir: default_data_dir(),
            poll_interval_ms: default_poll_interval_ms(),
            connectivity_interval_ms: default_connectivity_interval_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            resume_delay_ms: default_resume_delay_ms(),
            suppression_window_ms: default_suppression_window_ms(),
            trigger_settle_ms: default_trigger_settle_ms(),
            input_highlight_ms: default_input_highlight_ms(),
        }
    }
}

impl DashboardConfig {
    /// Parse configuration from a JSON string
    pub fn from_json(json_str: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json_str)
    }

    /// Read configuration from a file
    pub fn from_file(file_path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(file_path)
            .with_context(|| format!("Failed to read config file {file_path}"))?;
        Self::from_json(&content).with_context(|| format!("Invalid config file {file_path}"))
    }

    /// Convert to a JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Build the configuration for one invocation: defaults, then the
    /// `--config` file, then individual flags.
    pub fn from_matches(matches: &ArgMatches) -> Result<Self> {
        let mut config = match matches.get_one::<String>("config") {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        if let Some(dir) = matches.get_one::<String>("data-dir") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(url) = matches.get_one::<String>("proxy") {
            config.proxy_url = url.clone();
        }
        if let Some(("serve", sub)) = matches.subcommand() {
            if let Some(port) = sub.get_one::<u16>("port") {
                config.port = *port;
            }
        }
        Ok(config)
    }

    pub fn timings(&self) -> Timings {
        Timings {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            connectivity_interval: Duration::from_millis(self.connectivity_interval_ms),
            probe_timeout: Duration::from_millis(self.probe_timeout_ms),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            resume_delay: Duration::from_millis(self.resume_delay_ms),
            suppression_window: Duration::from_millis(self.suppression_window_ms),
            trigger_settle: Duration::from_millis(self.trigger_settle_ms),
            input_highlight: Duration::from_millis(self.input_highlight_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() -> Result<()> {
        let config = DashboardConfig::from_json("{}")?;
        assert_eq!(config, DashboardConfig::default());
        assert_eq!(config.port, 3000);
        assert_eq!(config.timings(), Timings::default());
        Ok(())
    }

    #[test]
    fn test_partial_config_overrides() -> Result<()> {
        let config = DashboardConfig::from_json(
            r#"{ "port": 8080, "poll_interval_ms": 500, "data_dir": "/srv/deck" }"#,
        )?;
        assert_eq!(config.port, 8080);
        assert_eq!(config.timings().poll_interval, Duration::from_millis(500));
        assert_eq!(config.data_dir, PathBuf::from("/srv/deck"));
        assert_eq!(config.suppression_window_ms, 3000);
        Ok(())
    }

    #[test]
    fn test_config_serialization() -> Result<()> {
        let config = DashboardConfig {
            proxy_url: "http://10.0.0.5:3000".to_string(),
            ..DashboardConfig::default()
        };
        let parsed = DashboardConfig::from_json(&config.to_json()?)?;
        assert_eq!(parsed, config);
        Ok(())
    }

    #[test]
    fn test_flags_override_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("deck.json");
        std::fs::write(&path, r#"{ "port": 4000, "proxy_url": "http://a:1" }"#)?;
        let path = path.to_string_lossy().to_string();

        let matches = crate::cli::build_command().try_get_matches_from([
            "relaydeck",
            "--config",
            path.as_str(),
            "--proxy",
            "http://b:2",
            "serve",
            "--port",
            "5000",
        ])?;
        let config = DashboardConfig::from_matches(&matches)?;
        assert_eq!(config.port, 5000);
        assert_eq!(config.proxy_url, "http://b:2");
        Ok(())
    }
}
