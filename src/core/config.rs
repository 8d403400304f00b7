//! Application configuration management

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub download: DownloadSettings,
    pub tonie: TonieSettings,
    pub bootstrap: BootstrapSettings,
}

/// Download-related configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadSettings {
    /// Default output directory; `None` means the current directory.
    pub output_dir: Option<PathBuf>,
    /// MP3 bitrate handed to the FFmpeg post-processor ("192K").
    pub audio_quality: String,
    /// YouTube player client for yt-dlp extraction. YouTube breaks the web
    /// client semi-regularly; the Android client is often more stable.
    pub player_client: String,
    /// Netscape-format cookie file handed to yt-dlp, if any.
    pub cookie_file: Option<PathBuf>,
    /// Browser cookie source ("chrome" or "chrome,Profile 1").
    pub cookies_from_browser: Option<String>,
    /// Retries for both whole downloads and individual fragments.
    pub retries: u32,
}

/// Tonie upload targets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TonieSettings {
    /// Creative Tonie IDs to upload to. Empty means default selection
    /// (env vars, then the first Tonie on the account).
    pub creative_tonie_ids: Vec<String>,
    /// Name-based target, used when no ID is configured.
    pub creative_tonie_name: Option<String>,
}

/// Environment bootstrap configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapSettings {
    /// Managed tools directory. `None` resolves to a `tools` directory
    /// next to the executable.
    pub tools_dir: Option<PathBuf>,
    /// yt-dlp release installed when the tools directory is empty. The
    /// binary is self-updated past this pin on every bootstrap run.
    pub pinned_ytdlp_version: String,
    /// Whether bootstrap runs `yt-dlp -U` after installing.
    pub self_update: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            download: DownloadSettings::default(),
            tonie: TonieSettings::default(),
            bootstrap: BootstrapSettings::default(),
        }
    }
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            output_dir: None,
            audio_quality: "192K".to_string(),
            player_client: "android".to_string(),
            cookie_file: None,
            cookies_from_browser: None,
            retries: 3,
        }
    }
}

impl Default for TonieSettings {
    fn default() -> Self {
        Self {
            creative_tonie_ids: Vec::new(),
            creative_tonie_name: None,
        }
    }
}

impl Default for BootstrapSettings {
    fn default() -> Self {
        Self {
            tools_dir: None,
            pinned_ytdlp_version: "2025.08.11".to_string(),
            self_update: true,
        }
    }
}

impl AppConfig {
    /// Load configuration from file, creating default if not exists
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

            let config: AppConfig =
                serde_json::from_str(&content).with_context(|| "Failed to parse config file")?;

            tracing::debug!("Loaded configuration from: {:?}", config_path);
            Ok(config)
        } else {
            let config = Self::default();
            config.save()?;
            tracing::info!("Created default configuration at: {:?}", config_path);
            Ok(config)
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = Self::get_config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content =
            serde_json::to_string_pretty(self).with_context(|| "Failed to serialize config")?;

        std::fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        tracing::debug!("Saved configuration to: {:?}", config_path);
        Ok(())
    }

    /// Get the path to the configuration file
    pub fn get_config_path() -> Result<PathBuf> {
        let project_dirs = ProjectDirs::from("com", "tubetoonie", "tubetoonie")
            .with_context(|| "Failed to get project directories")?;

        Ok(project_dirs.config_dir().join("config.json"))
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.download.retries > 10 {
            anyhow::bail!("Retry attempts should not exceed 10");
        }

        let valid_qualities = ["128K", "160K", "192K", "256K", "320K"];
        if !valid_qualities.contains(&self.download.audio_quality.as_str()) {
            anyhow::bail!("Invalid audio quality: {}", self.download.audio_quality);
        }

        let valid_clients = ["android", "web", "ios", "tv"];
        if !valid_clients.contains(&self.download.player_client.as_str()) {
            anyhow::bail!(
                "Invalid player client: must be one of {}",
                valid_clients.join(", ")
            );
        }

        if self.bootstrap.pinned_ytdlp_version.trim().is_empty() {
            anyhow::bail!("Pinned yt-dlp version must not be empty");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validation() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization_round_trip() {
        let config = AppConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(
            serde_json::to_string(&config).unwrap(),
            serde_json::to_string(&parsed).unwrap()
        );
    }

    #[test]
    fn test_invalid_config_validation() {
        let mut config = AppConfig::default();
        config.download.retries = 50;
        assert!(config.validate().is_err());

        config = AppConfig::default();
        config.download.audio_quality = "191K".to_string();
        assert!(config.validate().is_err());

        config = AppConfig::default();
        config.download.player_client = "betamax".to_string();
        assert!(config.validate().is_err());

        config = AppConfig::default();
        config.bootstrap.pinned_ytdlp_version = "  ".to_string();
        assert!(config.validate().is_err());
    }
}
