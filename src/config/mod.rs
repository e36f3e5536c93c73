//! Configuration module
//!
//! Handles application settings and on-disk directories

mod settings;

pub use settings::{AppConfig, ConnectionSettings, ControlSettings, PlaybackSettings};

use directories::ProjectDirs;
use std::path::PathBuf;

/// Get the application configuration directory
pub fn config_dir() -> Option<PathBuf> {
    ProjectDirs::from("com", "samctl", "Samctl").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the application data directory
pub fn data_dir() -> Option<PathBuf> {
    ProjectDirs::from("com", "samctl", "Samctl").map(|dirs| dirs.data_dir().to_path_buf())
}

/// Get the script library directory
pub fn scripts_dir() -> Option<PathBuf> {
    data_dir().map(|d| d.join("scripts"))
}

/// Initialize application directories
pub fn init_directories() -> std::io::Result<()> {
    if let Some(dir) = config_dir() {
        std::fs::create_dir_all(&dir)?;
    }
    if let Some(dir) = data_dir() {
        std::fs::create_dir_all(&dir)?;
    }
    if let Some(dir) = scripts_dir() {
        std::fs::create_dir_all(&dir)?;
    }
    Ok(())
}
