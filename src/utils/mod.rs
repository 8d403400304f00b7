//! Utility modules and helper functions
//!
//! This module contains shared utilities used across the application.

pub mod logging;

// Re-export commonly used utilities
pub use logging::*;
