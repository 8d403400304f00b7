//! Plain command-line front end
//!
//! Prompts for whatever the command line left out, prints line-oriented
//! progress, and pushes finished files to creative tonies when the
//! capability is available. All heavy lifting lives in `core`.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::core::bootstrap::{BootstrapReport, TonieSupport};
use crate::core::config::AppConfig;
use crate::core::downloader::{AudioDownloader, DownloadOptions};
use crate::core::inputs::resolve_urls;
use crate::core::models::{
    format_bytes, format_speed, AppError, AppResult, DownloadProgress, ProgressCallback,
    ProgressStatus, StatusCallback,
};
use crate::core::secrets::get_tonie_credentials;
use crate::core::tonie::{
    load_tonie_target_ids_from_env, load_tonie_target_name_from_env, select_target, TonieClient,
};
use crate::core::youtube::is_youtube_url;

/// Inputs for one CLI download run, straight from argument parsing.
#[derive(Debug, Default)]
pub struct DownloadRequest {
    pub url: Option<String>,
    pub urls_file: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub skip_tonie: bool,
}

/// Run the download flow and return a process exit code: 0 on full
/// success, 2 if any download failed, 4 if the Tonie push failed.
pub async fn run_download(
    config: &AppConfig,
    report: &BootstrapReport,
    request: DownloadRequest,
) -> AppResult<i32> {
    println!("TubeToonie - YouTube audio to your Creative Tonie");

    let url = match &request.url {
        Some(url) => Some(url.clone()),
        None if request.urls_file.is_none() => Some(prompt("YouTube URL: ")?),
        None => None,
    };
    let urls = resolve_urls(url.as_deref(), request.urls_file.as_deref())?;

    let output_dir = request
        .output_dir
        .or_else(|| config.download.output_dir.clone())
        .map(Ok)
        .unwrap_or_else(std::env::current_dir)?;

    let downloader = AudioDownloader::new(
        report.ytdlp_path.clone(),
        DownloadOptions::from_settings(&config.download),
    );

    let mut downloaded: Vec<PathBuf> = Vec::new();
    let mut failures = 0usize;
    for url in &urls {
        if !is_youtube_url(url) {
            warn!("URL does not look like a YouTube link: {}", url);
        }
        println!("\n==> {}", url);
        match download_one(&downloader, url, &output_dir).await {
            Ok(path) => {
                println!("Saved: {}", path.display());
                downloaded.push(path);
            }
            Err(err) => {
                failures += 1;
                error!("Download failed for {}: {}", url, err);
                eprintln!("Download failed: {}", err);
            }
        }
    }

    if !request.skip_tonie && !downloaded.is_empty() {
        match &report.tonie {
            TonieSupport::Available => match push_to_tonies(config, &downloaded).await {
                Ok(uploaded) => println!("Uploaded {} chapter(s).", uploaded),
                Err(err) => {
                    error!("Tonie upload failed: {}", err);
                    eprintln!("Tonie upload failed: {}", err);
                    return Ok(4);
                }
            },
            TonieSupport::Degraded { reason } => {
                info!("Skipping Tonie upload: {}", reason);
            }
        }
    }

    Ok(if failures > 0 { 2 } else { 0 })
}

async fn download_one(
    downloader: &AudioDownloader,
    url: &str,
    output_dir: &Path,
) -> AppResult<PathBuf> {
    let on_progress: ProgressCallback = Arc::new(|progress: &DownloadProgress| {
        if progress.status == ProgressStatus::Downloading {
            let percent = progress
                .percent
                .map(|p| format!("{:5.1}%", p))
                .unwrap_or_else(|| "   ??%".to_string());
            print!(
                "\rDownloading: {} | {} / {} | {}   ",
                percent,
                format_bytes(progress.downloaded_bytes),
                format_bytes(progress.total_bytes),
                format_speed(progress.speed)
            );
            let _ = std::io::stdout().flush();
        }
    });
    let on_status: StatusCallback = Arc::new(|message: &str| {
        println!("\n{}", message);
    });

    downloader
        .download_audio(url, output_dir, Some(on_progress), Some(on_status))
        .await
}

/// Upload each downloaded file to the configured creative tonies and
/// return the number of chapters uploaded. Targets come from the
/// environment first, then the persisted config; with no explicit target,
/// the account's first tonie wins.
pub async fn push_to_tonies(config: &AppConfig, files: &[PathBuf]) -> AppResult<usize> {
    let credentials = get_tonie_credentials().ok_or_else(|| {
        AppError::Tonie("Tonie credentials are no longer available".to_string())
    })?;
    let client = TonieClient::login(&credentials).await?;
    let tonies = client.creative_tonies().await?;

    let mut target_ids = load_tonie_target_ids_from_env();
    if target_ids.is_empty() {
        target_ids = config.tonie.creative_tonie_ids.clone();
    }

    let targets: Vec<&crate::core::tonie::CreativeTonie> = if target_ids.is_empty() {
        let target_name = load_tonie_target_name_from_env()
            .or_else(|| config.tonie.creative_tonie_name.clone());
        vec![select_target(&tonies, None, target_name.as_deref())?]
    } else {
        target_ids
            .iter()
            .map(|id| select_target(&tonies, Some(id.as_str()), None))
            .collect::<AppResult<Vec<_>>>()?
    };

    let mut uploaded = 0usize;
    for target in targets {
        let mut current = (*target).clone();
        for file in files {
            let title = chapter_title_for(file);
            println!("Uploading \"{}\" to tonie \"{}\"...", title, current.name);
            current = client.upload_chapter(&current, &title, file).await?;
            uploaded += 1;
        }
        println!(
            "Tonie \"{}\": {} chapters, {:.0}s remaining",
            current.name, current.chapters_present, current.seconds_remaining
        );
    }
    Ok(uploaded)
}

/// Chapter title for an uploaded file: the file stem, as written by yt-dlp
/// from the video title.
pub fn chapter_title_for(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Untitled".to_string())
}

/// List every creative tonie on the account with its capacity. Does not
/// require a bootstrapped environment, only credentials.
pub async fn list_tonies() -> AppResult<()> {
    let credentials = get_tonie_credentials().ok_or_else(|| {
        AppError::Tonie(
            "No Tonie credentials configured (set TONIE_USERNAME and TONIE_PASSWORD)"
                .to_string(),
        )
    })?;
    let client = TonieClient::login(&credentials).await?;
    let tonies = client.creative_tonies().await?;

    if tonies.is_empty() {
        println!("No creative tonies found on this account.");
        return Ok(());
    }
    for tonie in &tonies {
        println!("{}  {}", tonie.id, tonie.name);
        println!(
            "    {} chapters ({} free), {:.0}s used, {:.0}s remaining",
            tonie.chapters_present,
            tonie.chapters_remaining,
            tonie.seconds_present,
            tonie.seconds_remaining
        );
        for chapter in &tonie.chapters {
            println!("      - {} ({:.0}s)", chapter.title, chapter.seconds);
        }
    }
    Ok(())
}

/// Store or clear Tonie credentials in the OS secret store.
pub fn manage_credentials(clear: bool) -> AppResult<()> {
    use crate::core::secrets;

    if clear {
        secrets::delete_tonie_credentials_from_keyring();
        println!("Stored Tonie credentials cleared.");
        return Ok(());
    }

    if !secrets::supports_secure_store() {
        return Err(AppError::Config(
            "Secure storage is only supported on macOS and Windows. Use TONIE_USERNAME and \
             TONIE_PASSWORD instead."
                .to_string(),
        ));
    }

    let username: String = dialoguer::Input::new()
        .with_prompt("Tonie account email")
        .interact_text()
        .map_err(|err| AppError::InvalidInput(err.to_string()))?;
    let password = dialoguer::Password::new()
        .with_prompt("Tonie account password")
        .interact()
        .map_err(|err| AppError::InvalidInput(err.to_string()))?;

    let credentials = secrets::credentials_from_parts(Some(username.as_str()), Some(password.as_str()))
        .ok_or_else(|| {
            AppError::InvalidInput("Username and password are both required".to_string())
        })?;
    secrets::set_tonie_credentials_in_keyring(&credentials)?;
    println!("Credentials stored in the OS secret store.");
    Ok(())
}

fn prompt(label: &str) -> AppResult<String> {
    print!("{}", label);
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    let value = line.trim().to_string();
    if value.is_empty() {
        return Err(AppError::InvalidInput("No URL provided".to_string()));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chapter_title_from_stem() {
        assert_eq!(
            chapter_title_for(Path::new("/tmp/out/Rainbow Song.mp3")),
            "Rainbow Song"
        );
        assert_eq!(chapter_title_for(Path::new("noext")), "noext");
    }
}
