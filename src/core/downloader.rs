//! Audio download engine
//!
//! Drives the provisioned yt-dlp binary as a subprocess to fetch a single
//! video's best audio stream and convert it to MP3 via ffmpeg. Progress and
//! phase transitions are parsed from a structured progress template on
//! stdout and forwarded through callbacks, so both front ends share one
//! engine.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::core::config::DownloadSettings;
use crate::core::models::{
    AppError, AppResult, DownloadProgress, ProgressCallback, ProgressStatus, StatusCallback,
};
use crate::core::youtube::normalize_youtube_url;

// Marker prefixes for the yt-dlp progress template. Everything else on
// stdout is ignored, so yt-dlp's own chatter can change freely.
const PROGRESS_MARKER: &str = "TT_PROGRESS|";
const POSTPROCESS_MARKER: &str = "TT_POSTPROCESS|";
const OUTPUT_MARKER: &str = "TT_OUTPUT|";

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Per-run download options, resolved from config with environment
/// overrides applied.
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    pub audio_quality: String,
    pub player_client: String,
    pub cookie_file: Option<PathBuf>,
    pub cookies_from_browser: Option<String>,
    pub retries: u32,
}

impl DownloadOptions {
    /// Environment variables override persisted settings, so a flaky
    /// extraction can be worked around per invocation without editing the
    /// config file.
    pub fn from_settings(settings: &DownloadSettings) -> Self {
        let mut options = Self {
            audio_quality: settings.audio_quality.clone(),
            player_client: settings.player_client.clone(),
            cookie_file: settings.cookie_file.clone(),
            cookies_from_browser: settings.cookies_from_browser.clone(),
            retries: settings.retries,
        };
        if let Ok(path) = std::env::var("YTAUDIO_COOKIEFILE") {
            if !path.trim().is_empty() {
                options.cookie_file = Some(PathBuf::from(path.trim()));
            }
        }
        if let Ok(browser) = std::env::var("YTAUDIO_COOKIES_FROM_BROWSER") {
            if !browser.trim().is_empty() {
                options.cookies_from_browser = Some(browser);
            }
        }
        if let Ok(client) = std::env::var("YTAUDIO_YOUTUBE_PLAYER_CLIENT") {
            if !client.trim().is_empty() {
                options.player_client = client;
            }
        }
        options
    }
}

/// One download engine bound to a provisioned yt-dlp binary.
pub struct AudioDownloader {
    ytdlp: PathBuf,
    options: DownloadOptions,
}

impl AudioDownloader {
    pub fn new(ytdlp: PathBuf, options: DownloadOptions) -> Self {
        Self { ytdlp, options }
    }

    /// Download one URL's audio as MP3 into `output_dir` and return the
    /// final file path.
    pub async fn download_audio(
        &self,
        url: &str,
        output_dir: &Path,
        on_progress: Option<ProgressCallback>,
        on_status: Option<StatusCallback>,
    ) -> AppResult<PathBuf> {
        let status = |message: &str| {
            if let Some(cb) = &on_status {
                cb(message);
            }
        };

        status("Preparing download...");
        let url = normalize_youtube_url(url);
        std::fs::create_dir_all(output_dir)?;

        let mut command = self.build_command(&url, output_dir);
        debug!("Spawning yt-dlp for {}", url);
        let mut child = command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AppError::Download("Failed to capture yt-dlp stdout".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| AppError::Download("Failed to capture yt-dlp stderr".to_string()))?;

        // Tail of stderr, kept for the error message if yt-dlp fails.
        let stderr_task = tokio::spawn(async move {
            let mut tail: Vec<String> = Vec::new();
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if tail.len() >= 12 {
                    tail.remove(0);
                }
                tail.push(line);
            }
            tail
        });

        let mut output_path: Option<PathBuf> = None;
        let mut converting_reported = false;
        let mut lines = BufReader::new(stdout).lines();
        while let Some(line) = lines.next_line().await? {
            if let Some(payload) = line.strip_prefix(PROGRESS_MARKER) {
                if let Some(progress) = parse_progress_line(payload) {
                    if progress.status == ProgressStatus::Finished {
                        status("Download complete. Starting conversion to MP3...");
                    }
                    if let Some(cb) = &on_progress {
                        cb(&progress);
                    }
                }
            } else if let Some(stage) = line.strip_prefix(POSTPROCESS_MARKER) {
                match stage.trim() {
                    "started" | "processing" if !converting_reported => {
                        converting_reported = true;
                        status("Converting with FFmpeg...");
                    }
                    "finished" => status("Conversion finished."),
                    _ => {}
                }
            } else if let Some(path) = line.strip_prefix(OUTPUT_MARKER) {
                let path = path.trim();
                if !path.is_empty() {
                    output_path = Some(PathBuf::from(path));
                }
            }
        }

        let exit = child.wait().await?;
        let stderr_tail = stderr_task.await.unwrap_or_default();

        if !exit.success() {
            let detail = if stderr_tail.is_empty() {
                format!("yt-dlp exited with {}", exit)
            } else {
                format!("yt-dlp exited with {}: {}", exit, stderr_tail.join(" | "))
            };
            return Err(AppError::Download(detail));
        }

        match output_path {
            Some(path) => Ok(path),
            // yt-dlp printed no after_move path (seen with some
            // postprocessor combinations); fall back to the newest MP3.
            None => {
                warn!("yt-dlp reported no output path, scanning {:?}", output_dir);
                find_latest_mp3(output_dir)?.ok_or_else(|| {
                    AppError::Download("Download finished but no MP3 file was produced".to_string())
                })
            }
        }
    }

    fn build_command(&self, url: &str, output_dir: &Path) -> Command {
        let mut command = Command::new(&self.ytdlp);
        command
            .arg("-x")
            .args(["--audio-format", "mp3"])
            .args(["--audio-quality", &self.options.audio_quality])
            .arg("--no-playlist")
            .arg("--newline")
            .arg("--no-warnings")
            .args(["--retries", &self.options.retries.to_string()])
            .args(["--fragment-retries", &self.options.retries.to_string()])
            .args(["--user-agent", USER_AGENT])
            .args([
                "--extractor-args",
                &format!("youtube:player_client={}", self.options.player_client),
            ])
            .args([
                "--progress-template",
                "download:TT_PROGRESS|%(progress.status)s|%(progress._percent_str)s|\
                 %(progress.downloaded_bytes)s|%(progress.total_bytes)s|%(progress.speed)s",
            ])
            .args([
                "--progress-template",
                "postprocess:TT_POSTPROCESS|%(progress.status)s",
            ])
            .args(["--print", "after_move:TT_OUTPUT|%(filepath)s"])
            .arg("--no-simulate")
            .args(["-o", "%(title)s.%(ext)s"])
            .args(["-P", &output_dir.to_string_lossy()]);

        if let Some(cookie_file) = &self.options.cookie_file {
            command.arg("--cookies").arg(cookie_file);
        } else if let Some(browser) = &self.options.cookies_from_browser {
            command.args(["--cookies-from-browser", &browser_spec(browser)]);
        }

        command.arg(url);
        command
    }
}

/// Parse one `TT_PROGRESS|status|percent|downloaded|total|speed` payload.
/// yt-dlp substitutes `NA` for fields it cannot compute.
pub fn parse_progress_line(payload: &str) -> Option<DownloadProgress> {
    let mut fields = payload.split('|');
    let status = match fields.next()?.trim() {
        "downloading" => ProgressStatus::Downloading,
        "finished" => ProgressStatus::Finished,
        _ => return None,
    };
    let percent =
        parse_field(fields.next()).and_then(|s| s.trim_end_matches('%').trim().parse().ok());
    let downloaded_bytes = parse_field(fields.next()).and_then(|s| s.parse().ok());
    let total_bytes = parse_field(fields.next()).and_then(|s| s.parse().ok());
    let speed = parse_field(fields.next()).and_then(|s| s.parse().ok());
    Some(DownloadProgress {
        status,
        percent,
        downloaded_bytes,
        total_bytes,
        speed,
    })
}

/// Translate the friendly `name,profile` browser cookie source into
/// yt-dlp's `name:profile` syntax. A bare browser name passes through.
pub fn browser_spec(value: &str) -> String {
    match value.split_once(',') {
        Some((browser, profile)) => format!("{}:{}", browser.trim(), profile.trim()),
        None => value.trim().to_string(),
    }
}

fn parse_field(field: Option<&str>) -> Option<&str> {
    let value = field?.trim();
    if value.is_empty() || value == "NA" || value == "None" {
        None
    } else {
        Some(value)
    }
}

/// Most recently modified `.mp3` in a directory, if any.
pub fn find_latest_mp3(dir: &Path) -> AppResult<Option<PathBuf>> {
    let mut newest: Option<(std::time::SystemTime, PathBuf)> = None;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_mp3 = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("mp3"))
            .unwrap_or(false);
        if !is_mp3 {
            continue;
        }
        let modified = entry.metadata()?.modified()?;
        let newer = match &newest {
            Some((best, _)) => modified > *best,
            None => true,
        };
        if newer {
            newest = Some((modified, path));
        }
    }
    Ok(newest.map(|(_, path)| path))
}
