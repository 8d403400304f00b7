//! Integration tests for the environment bootstrapper
//!
//! Cover the filesystem-level bootstrap behaviors that do not need a
//! network: idempotent directory handling, provisioning detection, and
//! the checksum verification pieces wired together.

use std::path::PathBuf;

use crate::core::bootstrap::{
    parse_sha256_for_asset, sha256_file, ytdlp_asset_name, ytdlp_release_url, BootstrapConfig,
    Bootstrapper, OsFamily, TonieSupport,
};

fn test_config(tools_dir: PathBuf) -> BootstrapConfig {
    BootstrapConfig {
        tools_dir,
        pinned_ytdlp_version: "2025.08.11".to_string(),
        self_update: false,
    }
}

#[test]
fn tools_dir_survives_repeated_bootstraps() {
    let root = tempfile::tempdir().unwrap();
    let config = test_config(root.path().join("tools"));

    Bootstrapper::new(config.clone()).ensure_tools_dir().unwrap();
    let marker = config.tools_dir.join("cached-binary");
    std::fs::write(&marker, b"v1").unwrap();

    // A second bootstrapper instance reuses the directory untouched.
    Bootstrapper::new(config.clone()).ensure_tools_dir().unwrap();
    assert_eq!(std::fs::read(&marker).unwrap(), b"v1");
}

#[test]
fn provisioned_environment_is_detected_without_reinstall() {
    let root = tempfile::tempdir().unwrap();
    let config = test_config(root.path().to_path_buf());

    assert!(!config.is_provisioned());
    std::fs::write(config.ytdlp_path(), b"fake binary").unwrap();
    assert!(config.is_provisioned());

    // Detection is purely path-based: same answer from a fresh config.
    let again = test_config(root.path().to_path_buf());
    assert!(again.is_provisioned());
}

#[test]
fn checksum_verification_accepts_matching_manifest() {
    let root = tempfile::tempdir().unwrap();
    let downloaded = root.path().join(ytdlp_asset_name());
    std::fs::write(&downloaded, b"release payload").unwrap();

    let digest = sha256_file(&downloaded).unwrap();
    let manifest = format!(
        "{}  {}\n{}  yt-dlp.tar.gz\n",
        digest,
        ytdlp_asset_name(),
        "0".repeat(64)
    );

    let expected = parse_sha256_for_asset(&manifest, ytdlp_asset_name()).unwrap();
    assert_eq!(expected, digest);
}

#[test]
fn checksum_verification_flags_tampered_payload() {
    let root = tempfile::tempdir().unwrap();
    let downloaded = root.path().join(ytdlp_asset_name());
    std::fs::write(&downloaded, b"release payload").unwrap();
    let manifest = format!("{}  {}\n", "a".repeat(64), ytdlp_asset_name());

    let expected = parse_sha256_for_asset(&manifest, ytdlp_asset_name()).unwrap();
    let actual = sha256_file(&downloaded).unwrap();
    assert_ne!(expected, actual);
}

#[test]
fn release_urls_share_one_version_directory() {
    let binary = ytdlp_release_url("2025.08.11", ytdlp_asset_name());
    let manifest = ytdlp_release_url("2025.08.11", "SHA2-256SUMS");
    assert!(binary.contains("/2025.08.11/"));
    assert!(manifest.contains("/2025.08.11/"));
    assert!(binary.ends_with(ytdlp_asset_name()));
}

#[tokio::test]
async fn unsupported_os_install_fails_naming_the_os_before_any_dirs_exist() {
    let root = tempfile::tempdir().unwrap();
    let config = test_config(root.path().join("tools"));
    let bootstrapper =
        Bootstrapper::with_os_family(config.clone(), OsFamily::from_identifier("linux"));

    let err = bootstrapper.install_ffmpeg().await.unwrap_err();
    assert!(err.to_string().contains("linux"));
    assert_ne!(err.exit_code(), 0);
    // Tool install precedes directory creation, so a failure here must
    // leave no tools directory behind.
    assert!(!config.tools_dir.exists());
}

#[test]
fn existing_report_does_no_provisioning_work() {
    let root = tempfile::tempdir().unwrap();
    let config = test_config(root.path().join("tools"));

    let report = config.existing_report();
    assert_eq!(report.ytdlp_path, config.ytdlp_path());
    // Building the report must not create anything on disk.
    assert!(!config.tools_dir.exists());
}

#[test]
fn degraded_tonie_support_is_queryable_not_fatal() {
    let support = TonieSupport::from_credentials(None);
    assert!(!support.is_available());
    match support {
        TonieSupport::Degraded { reason } => assert!(!reason.is_empty()),
        TonieSupport::Available => panic!("missing credentials must degrade, not fail"),
    }
}
