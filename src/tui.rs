//! Interactive terminal front end
//!
//! Menu-driven flow on top of the same core engine as the CLI: downloads
//! with live progress bars, pushing local files to a tonie, listing tonies,
//! and chapter editing (rename and reorder). Cancelling a prompt exits the
//! whole menu with the conventional interrupt status.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dialoguer::{theme::ColorfulTheme, Confirm, Input, Select};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::error;

use crate::cli::chapter_title_for;
use crate::core::bootstrap::{BootstrapReport, TonieSupport};
use crate::core::config::AppConfig;
use crate::core::downloader::{AudioDownloader, DownloadOptions};
use crate::core::inputs::{load_urls_from_file, parse_urls_from_text};
use crate::core::models::{
    AppError, AppResult, DownloadProgress, ProgressCallback, ProgressStatus, StatusCallback,
};
use crate::core::secrets::get_tonie_credentials;
use crate::core::tonie::{select_target, CreativeTonie, TonieClient, TonieChapter};

/// Exit status for an interrupted interactive session (SIGINT convention).
pub const INTERRUPTED: i32 = 130;

enum MenuAction {
    Download,
    PushLocal,
    ListTonies,
    EditTonie,
    Quit,
}

/// Run the interactive menu until the user quits. Returns the process exit
/// code: 0 on a clean session, 2 if any download failed, `INTERRUPTED` on
/// a cancelled prompt.
pub async fn run(config: &AppConfig, report: &BootstrapReport) -> i32 {
    let theme = ColorfulTheme::default();
    let mut had_failures = false;

    loop {
        let choice = Select::with_theme(&theme)
            .with_prompt("TubeToonie")
            .items(&[
                "Download YouTube audio",
                "Push local files to a tonie",
                "List creative tonies",
                "Edit a tonie (rename / reorder chapters)",
                "Quit",
            ])
            .default(0)
            .interact();
        let action = match choice {
            Ok(0) => MenuAction::Download,
            Ok(1) => MenuAction::PushLocal,
            Ok(2) => MenuAction::ListTonies,
            Ok(3) => MenuAction::EditTonie,
            Ok(_) => MenuAction::Quit,
            Err(_) => return INTERRUPTED,
        };

        let outcome = match action {
            MenuAction::Download => download_flow(config, report, &theme).await,
            MenuAction::PushLocal => push_local_flow(config, report, &theme).await,
            MenuAction::ListTonies => list_flow().await,
            MenuAction::EditTonie => edit_flow(config, &theme).await,
            MenuAction::Quit => return if had_failures { 2 } else { 0 },
        };

        match outcome {
            Ok(clean) => had_failures |= !clean,
            Err(FlowError::Cancelled) => return INTERRUPTED,
            Err(FlowError::App(err)) => {
                error!("{}", err);
                eprintln!("Error: {}", err);
                had_failures = true;
            }
        }
    }
}

/// Prompt-level flow errors: a cancelled prompt unwinds the whole session,
/// an application error returns to the menu.
enum FlowError {
    Cancelled,
    App(AppError),
}

impl From<AppError> for FlowError {
    fn from(err: AppError) -> Self {
        FlowError::App(err)
    }
}

impl From<dialoguer::Error> for FlowError {
    fn from(_: dialoguer::Error) -> Self {
        FlowError::Cancelled
    }
}

type FlowResult<T> = Result<T, FlowError>;

async fn download_flow(
    config: &AppConfig,
    report: &BootstrapReport,
    theme: &ColorfulTheme,
) -> FlowResult<bool> {
    let mode = Select::with_theme(theme)
        .with_prompt("Download mode")
        .items(&["Single URL", "Paste multiple URLs", "Read URLs from a file"])
        .default(0)
        .interact()?;

    let urls: Vec<String> = match mode {
        0 => {
            let url: String = Input::with_theme(theme)
                .with_prompt("YouTube URL")
                .interact_text()?;
            parse_urls_from_text(&url)
        }
        1 => {
            let pasted: String = Input::with_theme(theme)
                .with_prompt("URLs (separated by spaces or commas)")
                .interact_text()?;
            parse_urls_from_text(&pasted)
        }
        _ => {
            let path: String = Input::with_theme(theme)
                .with_prompt("Path to URL file")
                .interact_text()?;
            load_urls_from_file(Path::new(path.trim()))?
        }
    };
    if urls.is_empty() {
        return Err(AppError::InvalidInput("No URLs provided".to_string()).into());
    }

    let default_dir = config
        .download
        .output_dir
        .clone()
        .map(Ok)
        .unwrap_or_else(std::env::current_dir)
        .map_err(AppError::from)?;
    let dir_input: String = Input::with_theme(theme)
        .with_prompt("Output directory")
        .default(default_dir.to_string_lossy().into_owned())
        .interact_text()?;
    let output_dir = PathBuf::from(dir_input.trim());

    let downloader = AudioDownloader::new(
        report.ytdlp_path.clone(),
        DownloadOptions::from_settings(&config.download),
    );

    let mut downloaded: Vec<PathBuf> = Vec::new();
    let mut failures: Vec<(String, String)> = Vec::new();
    for url in &urls {
        println!("\n==> {}", url);
        match download_with_bar(&downloader, url, &output_dir).await {
            Ok(path) => {
                println!("Saved: {}", path.display());
                downloaded.push(path);
            }
            Err(err) => failures.push((url.clone(), err.to_string())),
        }
    }

    if !failures.is_empty() {
        eprintln!("\n{} of {} downloads failed:", failures.len(), urls.len());
        for (url, reason) in &failures {
            eprintln!("  {}: {}", url, reason);
        }
    }

    if !downloaded.is_empty() && report.tonie.is_available() {
        let push = Confirm::with_theme(theme)
            .with_prompt("Push downloaded files to a creative tonie?")
            .default(true)
            .interact()?;
        if push {
            push_files(config, theme, &downloaded).await?;
        }
    } else if let TonieSupport::Degraded { reason } = &report.tonie {
        println!("(Tonie upload unavailable: {})", reason);
    }

    Ok(failures.is_empty())
}

async fn download_with_bar(
    downloader: &AudioDownloader,
    url: &str,
    output_dir: &Path,
) -> AppResult<PathBuf> {
    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::with_template("{bar:40.cyan/blue} {percent:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let progress_bar = bar.clone();
    let on_progress: ProgressCallback = Arc::new(move |progress: &DownloadProgress| {
        if progress.status == ProgressStatus::Downloading {
            if let Some(percent) = progress.percent {
                progress_bar.set_position(percent.clamp(0.0, 100.0) as u64);
            }
        }
    });
    let status_bar = bar.clone();
    let on_status: StatusCallback = Arc::new(move |message: &str| {
        status_bar.set_message(message.to_string());
    });

    let result = downloader
        .download_audio(url, output_dir, Some(on_progress), Some(on_status))
        .await;
    match &result {
        Ok(_) => bar.finish_with_message("done"),
        Err(_) => bar.abandon_with_message("failed"),
    }
    result
}

async fn push_local_flow(
    config: &AppConfig,
    report: &BootstrapReport,
    theme: &ColorfulTheme,
) -> FlowResult<bool> {
    if let TonieSupport::Degraded { reason } = &report.tonie {
        println!("Tonie upload unavailable: {}", reason);
        return Ok(true);
    }

    let raw: String = Input::with_theme(theme)
        .with_prompt("Audio files (comma-separated paths)")
        .interact_text()?;
    let files: Vec<PathBuf> = raw
        .split(',')
        .map(|part| PathBuf::from(part.trim()))
        .filter(|path| !path.as_os_str().is_empty())
        .collect();
    if files.is_empty() {
        return Err(AppError::InvalidInput("No files provided".to_string()).into());
    }
    for file in &files {
        if !file.is_file() {
            return Err(
                AppError::InvalidInput(format!("Not a file: {}", file.display())).into(),
            );
        }
    }

    push_files(config, theme, &files).await?;
    Ok(true)
}

/// Interactive tonie selection plus per-file title prompt, then upload.
async fn push_files(
    config: &AppConfig,
    theme: &ColorfulTheme,
    files: &[PathBuf],
) -> FlowResult<()> {
    let client = connect().await?;
    let tonies = client.creative_tonies().await?;
    let mut target = pick_tonie(theme, &tonies, config)?.clone();

    for file in files {
        let title: String = Input::with_theme(theme)
            .with_prompt(format!("Chapter title for {}", file.display()))
            .default(chapter_title_for(file))
            .interact_text()?;
        println!("Uploading \"{}\" to tonie \"{}\"...", title, target.name);
        target = client.upload_chapter(&target, &title, file).await?;
    }
    println!(
        "Tonie \"{}\": {} chapters, {:.0}s remaining",
        target.name, target.chapters_present, target.seconds_remaining
    );
    Ok(())
}

async fn list_flow() -> FlowResult<bool> {
    crate::cli::list_tonies().await?;
    Ok(true)
}

async fn edit_flow(config: &AppConfig, theme: &ColorfulTheme) -> FlowResult<bool> {
    let client = connect().await?;
    let tonies = client.creative_tonies().await?;
    let tonie = pick_tonie(theme, &tonies, config)?;
    if tonie.chapters.is_empty() {
        println!("Tonie \"{}\" has no chapters.", tonie.name);
        return Ok(true);
    }

    let action = Select::with_theme(theme)
        .with_prompt(format!("Edit \"{}\"", tonie.name))
        .items(&["Rename chapters", "Reorder chapters", "Back"])
        .default(0)
        .interact()?;

    match action {
        0 => {
            let mut chapters = tonie.chapters.clone();
            for chapter in &mut chapters {
                let title: String = Input::with_theme(theme)
                    .with_prompt(format!("Title for \"{}\"", chapter.title))
                    .default(chapter.title.clone())
                    .interact_text()?;
                chapter.title = title;
            }
            client
                .patch_chapters(&tonie.household_id, &tonie.id, &chapters)
                .await?;
            println!("Renamed {} chapters.", chapters.len());
        }
        1 => {
            for (index, chapter) in tonie.chapters.iter().enumerate() {
                println!("  {}. {}", index + 1, chapter.title);
            }
            let raw: String = Input::with_theme(theme)
                .with_prompt("New order (e.g. 3 1 2)")
                .interact_text()?;
            let order = parse_order(&raw, tonie.chapters.len()).ok_or_else(|| {
                AppError::InvalidInput(format!(
                    "Order must be a permutation of 1..{}",
                    tonie.chapters.len()
                ))
            })?;
            let chapters: Vec<TonieChapter> = order
                .iter()
                .map(|&index| tonie.chapters[index].clone())
                .collect();
            client
                .patch_chapters(&tonie.household_id, &tonie.id, &chapters)
                .await?;
            println!("Reordered {} chapters.", chapters.len());
        }
        _ => {}
    }
    Ok(true)
}

async fn connect() -> AppResult<TonieClient> {
    let credentials = get_tonie_credentials().ok_or_else(|| {
        AppError::Tonie(
            "No Tonie credentials configured (set TONIE_USERNAME and TONIE_PASSWORD)"
                .to_string(),
        )
    })?;
    TonieClient::login(&credentials).await
}

fn pick_tonie<'a>(
    theme: &ColorfulTheme,
    tonies: &'a [CreativeTonie],
    config: &AppConfig,
) -> FlowResult<&'a CreativeTonie> {
    if tonies.is_empty() {
        return Err(
            AppError::Tonie("No creative tonies found on this account".to_string()).into(),
        );
    }
    if tonies.len() == 1 {
        return Ok(&tonies[0]);
    }
    // A configured name preselects its entry, the prompt still confirms.
    let default = config
        .tonie
        .creative_tonie_name
        .as_deref()
        .and_then(|name| {
            select_target(tonies, None, Some(name))
                .ok()
                .and_then(|target| tonies.iter().position(|t| t.id == target.id))
        })
        .unwrap_or(0);
    let labels: Vec<String> = tonies
        .iter()
        .map(|t| format!("{} ({:.0}s free)", t.name, t.seconds_remaining))
        .collect();
    let index = Select::with_theme(theme)
        .with_prompt("Creative tonie")
        .items(&labels)
        .default(default)
        .interact()?;
    Ok(&tonies[index])
}

/// Parse a 1-based chapter order like `3 1 2` or `3,1,2`. Returns 0-based
/// indices only if the input is a full permutation.
pub fn parse_order(raw: &str, len: usize) -> Option<Vec<usize>> {
    let indices: Vec<usize> = raw
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(|part| part.parse::<usize>().ok())
        .collect::<Option<Vec<usize>>>()?;
    if indices.len() != len {
        return None;
    }
    let mut seen = vec![false; len];
    for &index in &indices {
        if index == 0 || index > len || seen[index - 1] {
            return None;
        }
        seen[index - 1] = true;
    }
    Some(indices.iter().map(|&index| index - 1).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_order_accepts_permutations() {
        assert_eq!(parse_order("3 1 2", 3), Some(vec![2, 0, 1]));
        assert_eq!(parse_order("3,1,2", 3), Some(vec![2, 0, 1]));
        assert_eq!(parse_order("1", 1), Some(vec![0]));
    }

    #[test]
    fn test_parse_order_rejects_non_permutations() {
        assert_eq!(parse_order("1 1 2", 3), None);
        assert_eq!(parse_order("1 2", 3), None);
        assert_eq!(parse_order("0 1 2", 3), None);
        assert_eq!(parse_order("1 2 4", 3), None);
        assert_eq!(parse_order("one two", 2), None);
    }
}
