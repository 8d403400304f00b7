//! Core business logic module
//!
//! This module contains the environment bootstrapper, download engine,
//! Tonie cloud client, and supporting domain models for the application.

pub mod bootstrap;
pub mod config;
pub mod downloader;
pub mod inputs;
pub mod models;
pub mod secrets;
pub mod tonie;
pub mod youtube;

#[cfg(test)]
mod bootstrap_integration_tests;


// Re-export commonly used types
pub use config::AppConfig;
pub use models::{AppError, AppResult};
