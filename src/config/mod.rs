use crate::global;
use crate::visit::VisitOptions;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// The bearer token never lives in the config file; it comes from
/// `--token` or the `TELEVISIT_TOKEN` environment variable.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub gateway: GatewayConfig,
    pub session: SessionConfig,
    pub api: ApiConfig,
    pub hook: HookConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// API root of the clinic backend, e.g. https://clinic.example.com/api/v1
    pub base_url: String,
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// How long a join may take, including OS camera/microphone prompts.
    pub join_timeout_seconds: u64,
    pub start_muted: bool,
    pub start_video_enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HookConfig {
    /// Shell command to run when a live visit ends.
    /// Receives the report as JSON via stdin.
    /// Env vars: TELEVISIT_MEETING_ID, TELEVISIT_APPOINTMENT_ID, TELEVISIT_ROLE,
    /// TELEVISIT_END_REASON, TELEVISIT_OUTCOME, TELEVISIT_DURATION_SECONDS
    pub on_meeting_ended: String,
    pub timeout_seconds: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000/api/v1".to_string(),
            request_timeout_seconds: 15,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            join_timeout_seconds: 120,
            start_muted: false,
            start_video_enabled: true,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self { port: 3838 }
    }
}

impl Default for HookConfig {
    fn default() -> Self {
        Self {
            on_meeting_ended: String::new(),
            timeout_seconds: 300,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            info!(
                "Config file not found, creating default at {:?}",
                config_path
            );
            let config = Self::default();
            config.save_to(config_path)?;
            return Ok(config);
        }

        let content =
            std::fs::read_to_string(config_path).context("Failed to read config file")?;

        let config: Self = toml::from_str(&content).context("Failed to parse config file")?;

        info!("Loaded config from {:?}", config_path);
        Ok(config)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(config_path, content).context("Failed to write config file")?;

        Ok(())
    }

    pub fn visit_options(&self) -> VisitOptions {
        VisitOptions {
            join_timeout: Duration::from_secs(self.session.join_timeout_seconds.max(1)),
            start_muted: self.session.start_muted,
            start_video_enabled: self.session.start_video_enabled,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.gateway.request_timeout_seconds.max(1))
    }

    fn config_path() -> Result<PathBuf> {
        global::config_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.api.port, 3838);
        assert_eq!(config.session.join_timeout_seconds, 120);
        assert!(config.hook.on_meeting_ended.is_empty());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[gateway]\nbase_url = \"https://clinic.example.com/api/v1\"\n\n[session]\nstart_muted = true\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.gateway.base_url, "https://clinic.example.com/api/v1");
        assert_eq!(config.gateway.request_timeout_seconds, 15);
        assert!(config.session.start_muted);
        assert!(config.session.start_video_enabled);

        let options = config.visit_options();
        assert!(options.start_muted);
        assert_eq!(options.join_timeout, Duration::from_secs(120));
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[api]\nport = \"not a number\"\n").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_round_trip_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.hook.on_meeting_ended = "notify-send 'visit over'".to_string();
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.hook.on_meeting_ended, "notify-send 'visit over'");
    }
}
