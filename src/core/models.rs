//! Core data models for the TubeToonie application

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Input error: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Bootstrap error: {0}")]
    Bootstrap(String),

    #[error("Download error: {0}")]
    Download(String),

    #[error("Tonie error: {0}")]
    Tonie(String),
}

impl AppError {
    /// Process exit code for this error, matching the CLI contract:
    /// 1 input/precondition, 2 download, 3 unexpected, 4 Tonie.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::InvalidInput(_) | AppError::Config(_) | AppError::Bootstrap(_) => 1,
            AppError::Download(_) => 2,
            AppError::Tonie(_) => 4,
            _ => 3,
        }
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;

/// Progress stage of a yt-dlp download as reported on its progress stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProgressStatus {
    Downloading,
    Finished,
}

/// Progress update emitted while downloading a single video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadProgress {
    pub status: ProgressStatus,
    /// Percent complete, 0.0..=100.0, when yt-dlp reports one.
    pub percent: Option<f64>,
    pub downloaded_bytes: Option<u64>,
    pub total_bytes: Option<u64>,
    /// Bytes per second.
    pub speed: Option<f64>,
}

/// Callback invoked with human-readable status lines.
pub type StatusCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Callback invoked with download progress updates.
pub type ProgressCallback = Arc<dyn Fn(&DownloadProgress) + Send + Sync>;

/// Format a byte count as a human-readable size ("1.50 MB").
pub fn format_bytes(value: Option<u64>) -> String {
    let Some(value) = value.filter(|v| *v > 0) else {
        return "0 B".to_string();
    };

    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut size = value as f64;
    for unit in UNITS {
        if size < 1024.0 || unit == "TB" {
            return format!("{:.2} {}", size, unit);
        }
        size /= 1024.0;
    }
    unreachable!()
}

/// Format a transfer speed as a human-readable rate ("1.50 MB/s").
pub fn format_speed(value: Option<f64>) -> String {
    match value.filter(|v| *v > 0.0) {
        Some(v) => format!("{}/s", format_bytes(Some(v as u64))),
        None => "0 B/s".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(None), "0 B");
        assert_eq!(format_bytes(Some(0)), "0 B");
        assert_eq!(format_bytes(Some(512)), "512.00 B");
        assert_eq!(format_bytes(Some(1536)), "1.50 KB");
        assert_eq!(format_bytes(Some(5 * 1024 * 1024)), "5.00 MB");
    }

    #[test]
    fn test_format_speed() {
        assert_eq!(format_speed(None), "0 B/s");
        assert_eq!(format_speed(Some(0.0)), "0 B/s");
        assert_eq!(format_speed(Some(1536.0)), "1.50 KB/s");
    }

    #[test]
    fn test_exit_codes_follow_cli_contract() {
        assert_eq!(AppError::InvalidInput("empty URL".into()).exit_code(), 1);
        assert_eq!(AppError::Bootstrap("missing ffmpeg".into()).exit_code(), 1);
        assert_eq!(AppError::Download("403".into()).exit_code(), 2);
        assert_eq!(AppError::Tonie("login failed".into()).exit_code(), 4);
        assert_eq!(
            AppError::Io(std::io::Error::new(std::io::ErrorKind::Other, "boom")).exit_code(),
            3
        );
    }
}
