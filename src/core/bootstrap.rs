//! Environment bootstrapper
//!
//! Brings the host machine from an arbitrary starting state to one where a
//! front end can run: Python runtime present, ffmpeg installed, the managed
//! tools directory created, the yt-dlp binary provisioned and refreshed,
//! and the optional Tonie capability probed. Steps run strictly in order
//! and the procedure is idempotent: re-running only performs missing work.
//!
//! Failure classification:
//! - missing interpreter, missing package manager, unsupported OS and
//!   failed core installs are fatal and abort the run;
//! - the Tonie capability probe is the single degradable step: its failure
//!   is reported as a warning and recorded on the report, never an error.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use futures_util::StreamExt;
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::core::config::BootstrapSettings;
use crate::core::models::{AppError, AppResult, StatusCallback};
use crate::core::secrets::{get_tonie_credentials, TonieCredentials};

const YTDLP_RELEASE_BASE: &str = "https://github.com/yt-dlp/yt-dlp/releases/download";
const CHECKSUM_MANIFEST: &str = "SHA2-256SUMS";

/// Platform-specific yt-dlp release asset name.
pub fn ytdlp_asset_name() -> &'static str {
    if cfg!(target_os = "windows") {
        "yt-dlp.exe"
    } else {
        "yt-dlp"
    }
}

/// URL of a file within a pinned yt-dlp release.
pub fn ytdlp_release_url(version: &str, file: &str) -> String {
    format!("{}/{}/{}", YTDLP_RELEASE_BASE, version, file)
}

/// Extract the SHA-256 for one asset from a `SHA2-256SUMS` manifest
/// (lines of `<hex>  <filename>`).
pub fn parse_sha256_for_asset(manifest: &str, asset: &str) -> Option<String> {
    manifest.lines().find_map(|line| {
        let mut parts = line.split_whitespace();
        let hash = parts.next()?;
        let name = parts.next()?;
        // Some sum tools prefix binary-mode entries with '*'.
        if name.trim_start_matches('*') == asset && hash.len() == 64 {
            Some(hash.to_ascii_lowercase())
        } else {
            None
        }
    })
}

/// Operating-system family for the ffmpeg install strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OsFamily {
    MacOs,
    Windows,
    Other(String),
}

impl OsFamily {
    pub fn detect() -> Self {
        Self::from_identifier(std::env::consts::OS)
    }

    pub fn from_identifier(os: &str) -> Self {
        match os {
            "macos" => OsFamily::MacOs,
            "windows" => OsFamily::Windows,
            other => OsFamily::Other(other.to_string()),
        }
    }
}

/// Resolved bootstrap inputs. The tools directory is an explicit path (no
/// implicit working-directory state); by default it lives next to the
/// executable, so invocation from any directory — including paths with
/// spaces — anchors identically.
#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    pub tools_dir: PathBuf,
    pub pinned_ytdlp_version: String,
    pub self_update: bool,
}

impl BootstrapConfig {
    pub fn resolve(settings: &BootstrapSettings) -> AppResult<Self> {
        let tools_dir = match &settings.tools_dir {
            Some(dir) => dir.clone(),
            None => default_tools_dir()?,
        };
        Ok(Self {
            tools_dir,
            pinned_ytdlp_version: settings.pinned_ytdlp_version.clone(),
            self_update: settings.self_update,
        })
    }

    /// Fixed, predictable location of the managed yt-dlp binary.
    pub fn ytdlp_path(&self) -> PathBuf {
        self.tools_dir.join(ytdlp_asset_name())
    }

    /// Whether a previous bootstrap already provisioned the tools.
    pub fn is_provisioned(&self) -> bool {
        self.ytdlp_path().exists()
    }

    /// Report for an environment provisioned by an earlier run. Probes the
    /// Tonie capability but performs no install or update steps; entry
    /// points that require setup to have happened already use this.
    pub fn existing_report(&self) -> BootstrapReport {
        BootstrapReport {
            ytdlp_path: self.ytdlp_path(),
            tonie: TonieSupport::from_credentials(get_tonie_credentials().as_ref()),
        }
    }
}

fn default_tools_dir() -> AppResult<PathBuf> {
    let exe = std::env::current_exe()?;
    let dir = exe.parent().ok_or_else(|| {
        AppError::Bootstrap("Executable path has no parent directory".to_string())
    })?;
    Ok(dir.join("tools"))
}

/// Availability of the smart-speaker upload capability. Degraded is a
/// normal, queryable state, not an error: front ends check it before
/// offering Tonie features.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TonieSupport {
    Available,
    Degraded { reason: String },
}

impl TonieSupport {
    pub fn from_credentials(creds: Option<&TonieCredentials>) -> Self {
        match creds {
            Some(_) => TonieSupport::Available,
            None => TonieSupport::Degraded {
                reason: "no Tonie credentials configured (set TONIE_USERNAME and \
                         TONIE_PASSWORD, or store them in the OS secret store)"
                    .to_string(),
            },
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, TonieSupport::Available)
    }
}

/// Outcome of a successful bootstrap run, handed to the front ends.
#[derive(Debug, Clone)]
pub struct BootstrapReport {
    pub ytdlp_path: PathBuf,
    pub tonie: TonieSupport,
}

/// The bootstrap procedure itself.
pub struct Bootstrapper {
    config: BootstrapConfig,
    os: OsFamily,
    http: reqwest::Client,
}

impl Bootstrapper {
    pub fn new(config: BootstrapConfig) -> Self {
        Self::with_os_family(config, OsFamily::detect())
    }

    /// Bootstrapper for an explicit OS family instead of the detected one.
    pub fn with_os_family(config: BootstrapConfig, os: OsFamily) -> Self {
        Self {
            config,
            os,
            http: reqwest::Client::new(),
        }
    }

    pub fn config(&self) -> &BootstrapConfig {
        &self.config
    }

    /// Run all steps in order. Linear, no branching back; the first fatal
    /// failure aborts, so nothing later (including tools-dir creation) runs
    /// after, say, a failed ffmpeg install.
    pub async fn run(&self, on_status: Option<StatusCallback>) -> AppResult<BootstrapReport> {
        let status = |message: &str| {
            if let Some(cb) = &on_status {
                cb(message);
            }
        };

        status("Checking Python runtime...");
        self.check_interpreter().await?;

        status("Checking ffmpeg...");
        self.ensure_ffmpeg().await?;

        self.ensure_tools_dir()?;

        status("Provisioning yt-dlp...");
        self.ensure_ytdlp().await?;

        if self.config.self_update {
            status("Updating yt-dlp...");
            self.self_update_ytdlp().await?;
        }

        let tonie = TonieSupport::from_credentials(get_tonie_credentials().as_ref());
        if let TonieSupport::Degraded { reason } = &tonie {
            warn!("Tonie upload unavailable: {}", reason);
            status(&format!(
                "Tonie upload disabled: {}. Core downloads are unaffected.",
                reason
            ));
        }

        Ok(BootstrapReport {
            ytdlp_path: self.config.ytdlp_path(),
            tonie,
        })
    }

    /// Fatal precondition: the standalone yt-dlp build bundles its own
    /// runtime on Windows but requires Python 3 everywhere else.
    async fn check_interpreter(&self) -> AppResult<()> {
        if cfg!(target_os = "windows") {
            return Ok(());
        }

        if command_succeeds("python3", &["--version"]).await {
            return Ok(());
        }

        Err(AppError::Bootstrap(
            "Python 3 was not found. yt-dlp requires a Python 3 runtime on this platform. \
             Install it from https://www.python.org/downloads/ or via your package manager, \
             then re-run setup."
                .to_string(),
        ))
    }

    /// Probe ffmpeg on PATH; install it via the OS package manager only if
    /// missing. The package manager itself is a fatal precondition, not
    /// something this tool installs on the user's behalf.
    async fn ensure_ffmpeg(&self) -> AppResult<()> {
        if command_succeeds("ffmpeg", &["-version"]).await {
            debug!("ffmpeg already present, skipping install");
            return Ok(());
        }

        self.install_ffmpeg().await?;

        if !command_succeeds("ffmpeg", &["-version"]).await {
            return Err(AppError::Bootstrap(
                "ffmpeg is still not on PATH after installation. Open a new terminal or \
                 install it manually."
                    .to_string(),
            ));
        }

        Ok(())
    }

    /// Install ffmpeg via the package manager for this OS family. Called
    /// only after the PATH probe came up empty.
    pub(crate) async fn install_ffmpeg(&self) -> AppResult<()> {
        match &self.os {
            OsFamily::MacOs => {
                if !command_succeeds("brew", &["--version"]).await {
                    return Err(AppError::Bootstrap(
                        "ffmpeg is missing and Homebrew was not found. Install Homebrew from \
                         https://brew.sh (or install ffmpeg manually), then re-run setup."
                            .to_string(),
                    ));
                }
                info!("Installing ffmpeg via Homebrew");
                run_checked("brew", &["install", "ffmpeg"]).await?;
            }
            OsFamily::Windows => {
                if !command_succeeds("winget", &["--version"]).await {
                    return Err(AppError::Bootstrap(
                        "ffmpeg is missing and winget was not found. Install \"App Installer\" \
                         from the Microsoft Store (or install ffmpeg manually), then re-run \
                         setup."
                            .to_string(),
                    ));
                }
                info!("Installing ffmpeg via winget");
                run_checked(
                    "winget",
                    &[
                        "install",
                        "--id",
                        "Gyan.FFmpeg",
                        "-e",
                        "--accept-source-agreements",
                        "--accept-package-agreements",
                    ],
                )
                .await?;
            }
            OsFamily::Other(name) => {
                return Err(AppError::Bootstrap(format!(
                    "Unsupported operating system for automatic ffmpeg install: {}. \
                     Install ffmpeg manually, then re-run setup.",
                    name
                )));
            }
        }

        Ok(())
    }

    /// Create the tools directory only if missing. Never recreates or
    /// touches an existing one.
    pub fn ensure_tools_dir(&self) -> AppResult<()> {
        if self.config.tools_dir.is_dir() {
            debug!("Reusing tools directory: {:?}", self.config.tools_dir);
            return Ok(());
        }

        std::fs::create_dir_all(&self.config.tools_dir)?;
        info!("Created tools directory: {:?}", self.config.tools_dir);
        Ok(())
    }

    /// Install the pinned yt-dlp release if the binary is absent:
    /// checksum-verified download to a temp file, then an atomic rename
    /// into place so an interrupted run never leaves a half-written binary
    /// at the final path.
    async fn ensure_ytdlp(&self) -> AppResult<()> {
        let target = self.config.ytdlp_path();
        if target.exists() {
            debug!("yt-dlp already provisioned at {:?}", target);
            return Ok(());
        }

        let version = &self.config.pinned_ytdlp_version;
        let asset = ytdlp_asset_name();
        info!("Downloading yt-dlp {} ({})", version, asset);

        let manifest = self
            .http
            .get(ytdlp_release_url(version, CHECKSUM_MANIFEST))
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let expected = parse_sha256_for_asset(&manifest, asset).ok_or_else(|| {
            AppError::Bootstrap(format!(
                "No checksum for {} in the {} release manifest",
                asset, version
            ))
        })?;

        let temp = target.with_extension("tmp");
        self.download_to(&ytdlp_release_url(version, asset), &temp)
            .await?;

        let actual = sha256_file(&temp)?;
        if !actual.eq_ignore_ascii_case(&expected) {
            let _ = std::fs::remove_file(&temp);
            return Err(AppError::Bootstrap(format!(
                "Checksum mismatch for downloaded yt-dlp (expected {}, got {})",
                expected, actual
            )));
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&temp, std::fs::Permissions::from_mode(0o755))?;
        }

        std::fs::rename(&temp, &target)?;
        info!("Installed yt-dlp {} at {:?}", version, target);
        Ok(())
    }

    async fn download_to(&self, url: &str, path: &Path) -> AppResult<()> {
        let response = self.http.get(url).send().await?.error_for_status()?;
        let mut file = tokio::fs::File::create(path).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            file.write_all(&chunk?).await?;
        }
        file.flush().await?;
        Ok(())
    }

    /// Force-upgrade yt-dlp past the pin. Deliberate policy: YouTube
    /// extraction breaks faster than this application's release cycle, so
    /// platform compatibility beats reproducible pinning for this one
    /// dependency.
    async fn self_update_ytdlp(&self) -> AppResult<()> {
        run_checked(self.config.ytdlp_path().as_os_str(), &["-U"]).await
    }
}

/// Compute the SHA-256 of a file as lowercase hex.
pub fn sha256_file(path: &Path) -> AppResult<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

async fn command_succeeds(program: &str, args: &[&str]) -> bool {
    Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|status| status.success())
        .unwrap_or(false)
}

async fn run_checked(program: impl AsRef<OsStr>, args: &[&str]) -> AppResult<()> {
    let program = program.as_ref();
    let status = Command::new(program).args(args).status().await?;
    if !status.success() {
        return Err(AppError::Bootstrap(format!(
            "{} exited with {}",
            program.to_string_lossy(),
            status
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::secrets::TonieCredentials;

    #[test]
    fn test_release_url_layout() {
        assert_eq!(
            ytdlp_release_url("2025.08.11", "SHA2-256SUMS"),
            "https://github.com/yt-dlp/yt-dlp/releases/download/2025.08.11/SHA2-256SUMS"
        );
    }

    #[test]
    fn test_parse_sha256_for_asset() {
        let manifest = "\
0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef  yt-dlp\n\
fedcba9876543210fedcba9876543210fedcba9876543210fedcba9876543210  yt-dlp.exe\n";
        assert_eq!(
            parse_sha256_for_asset(manifest, "yt-dlp").as_deref(),
            Some("0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef")
        );
        assert_eq!(
            parse_sha256_for_asset(manifest, "yt-dlp.exe").as_deref(),
            Some("fedcba9876543210fedcba9876543210fedcba9876543210fedcba9876543210")
        );
        assert!(parse_sha256_for_asset(manifest, "yt-dlp.tar.gz").is_none());
    }

    #[test]
    fn test_parse_sha256_accepts_binary_mode_marker() {
        let manifest =
            "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef  *yt-dlp\n";
        assert!(parse_sha256_for_asset(manifest, "yt-dlp").is_some());
    }

    #[test]
    fn test_os_family_mapping() {
        assert_eq!(OsFamily::from_identifier("macos"), OsFamily::MacOs);
        assert_eq!(OsFamily::from_identifier("windows"), OsFamily::Windows);
        assert_eq!(
            OsFamily::from_identifier("freebsd"),
            OsFamily::Other("freebsd".to_string())
        );
        // The unsupported-OS error must be able to name the detected OS.
        if let OsFamily::Other(name) = OsFamily::from_identifier("linux") {
            assert_eq!(name, "linux");
        } else {
            panic!("linux must map to Other");
        }
    }

    #[test]
    fn test_tonie_support_from_credentials() {
        let creds = TonieCredentials {
            username: "user@example.com".to_string(),
            password: "pw".to_string(),
        };
        assert!(TonieSupport::from_credentials(Some(&creds)).is_available());

        let degraded = TonieSupport::from_credentials(None);
        assert!(!degraded.is_available());
        match degraded {
            TonieSupport::Degraded { reason } => {
                assert!(reason.contains("TONIE_USERNAME"));
            }
            TonieSupport::Available => panic!("expected degraded"),
        }
    }

    #[test]
    fn test_tools_dir_creation_is_idempotent() {
        let root = tempfile::tempdir().unwrap();
        let config = BootstrapConfig {
            tools_dir: root.path().join("tools"),
            pinned_ytdlp_version: "2025.08.11".to_string(),
            self_update: false,
        };
        let bootstrapper = Bootstrapper::new(config.clone());

        bootstrapper.ensure_tools_dir().unwrap();
        assert!(config.tools_dir.is_dir());

        // Plant a marker and re-run: nothing is destroyed or recreated.
        let marker = config.tools_dir.join("marker");
        std::fs::write(&marker, b"keep").unwrap();
        bootstrapper.ensure_tools_dir().unwrap();
        assert_eq!(std::fs::read(&marker).unwrap(), b"keep");
    }

    #[test]
    fn test_provisioned_detection_uses_fixed_path() {
        let root = tempfile::tempdir().unwrap();
        let config = BootstrapConfig {
            tools_dir: root.path().to_path_buf(),
            pinned_ytdlp_version: "2025.08.11".to_string(),
            self_update: true,
        };
        assert!(!config.is_provisioned());

        std::fs::write(config.ytdlp_path(), b"#!/bin/sh\n").unwrap();
        assert!(config.is_provisioned());
        assert_eq!(
            config.ytdlp_path().file_name().unwrap().to_str().unwrap(),
            ytdlp_asset_name()
        );
    }

    #[test]
    fn test_sha256_file_known_vector() {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join("payload");
        std::fs::write(&path, b"abc").unwrap();
        assert_eq!(
            sha256_file(&path).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
