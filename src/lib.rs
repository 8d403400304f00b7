//! TubeToonie - Core Library
//!
//! This library provides the core functionality for the TubeToonie
//! application: environment bootstrapping, YouTube audio downloads, and
//! creative-tonie uploads, shared by the CLI and TUI front ends.

pub mod cli;
pub mod core;
pub mod tui;
pub mod utils;

// Re-export commonly used types
pub use core::{
    bootstrap::{BootstrapConfig, BootstrapReport, Bootstrapper, TonieSupport},
    config::AppConfig,
    downloader::{AudioDownloader, DownloadOptions},
    models::{AppError, AppResult, DownloadProgress},
    tonie::{CreativeTonie, TonieClient},
};
