use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{Result, anyhow};

pub const DEFAULT_API_URL: &str = "http://localhost:5000";
pub const DEFAULT_MODEL: &str = "rebecca";
pub const DEFAULT_ASSISTANT_NAME: &str = "Rebecca";

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub api_url: Option<String>,
    pub model: Option<String>,
    pub assistant_name: Option<String>,
    pub speech_enabled: Option<bool>,
    /// Player command that reads audio from stdin, e.g. `["ffplay", "-nodisp", "-"]`
    pub audio_player: Option<Vec<String>>,
    /// Give up on a reply when no bytes arrive for this long. Unset or 0 waits forever.
    pub stall_timeout_secs: Option<u64>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    /// Base URL of the chat backend. `REBECCA_API_URL` wins over the file.
    pub fn api_url(&self) -> String {
        std::env::var("REBECCA_API_URL")
            .ok()
            .filter(|url| !url.trim().is_empty())
            .or_else(|| self.api_url.clone())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
    }

    /// Model name sent with every chat request. `REBECCA_MODEL` wins over the file.
    pub fn model(&self) -> String {
        std::env::var("REBECCA_MODEL")
            .ok()
            .filter(|model| !model.trim().is_empty())
            .or_else(|| self.model.clone())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string())
    }

    pub fn assistant_name(&self) -> String {
        self.assistant_name
            .clone()
            .unwrap_or_else(|| DEFAULT_ASSISTANT_NAME.to_string())
    }

    pub fn speech_enabled(&self) -> bool {
        self.speech_enabled.unwrap_or(true)
    }

    pub fn stall_timeout(&self) -> Option<Duration> {
        self.stall_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("rebecca"))
    }

    pub fn logs_dir() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("logs"))
    }

    fn get_config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::new());
        assert_eq!(config.assistant_name(), DEFAULT_ASSISTANT_NAME);
        assert!(config.speech_enabled());
        assert!(config.stall_timeout().is_none());
    }

    #[test]
    fn test_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rebecca").join("config.json");

        let config = Config {
            api_url: Some("http://chat.local:8080".to_string()),
            speech_enabled: Some(false),
            stall_timeout_secs: Some(30),
            ..Config::new()
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
        assert!(!loaded.speech_enabled());
        assert_eq!(loaded.stall_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_zero_timeout_means_none() {
        let config = Config {
            stall_timeout_secs: Some(0),
            ..Config::new()
        };
        assert!(config.stall_timeout().is_none());
    }

    #[test]
    fn test_partial_file_parses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "assistant_name": "Becca" }"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.assistant_name(), "Becca");
        assert!(config.api_url.is_none());
    }
}
