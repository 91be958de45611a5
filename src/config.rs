// src/config.rs

//! Configuration loading utilities.
//!
//! Configuration is resolved once at process start and passed explicitly to
//! the pipelines from there on.

use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};
use crate::models::Config;

/// Load and validate configuration for local runs.
///
/// A missing or unreadable file falls back to defaults with a warning; an
/// invalid result is an error.
pub fn load_config(path: &Path) -> Result<Config> {
    let config = Config::load_or_default(path);
    config
        .validate()
        .map_err(|e| AppError::config(format!("{}: {e}", path.display())))?;
    Ok(config)
}

/// Load configuration for the Lambda environment.
///
/// Reads the file named by `CONFIG_PATH` when set, then applies environment
/// overrides on top.
pub fn load_lambda_config() -> Result<Config> {
    let mut config = match std::env::var("CONFIG_PATH") {
        Ok(path) => Config::load(PathBuf::from(path))?,
        Err(_) => Config::default(),
    };
    config.apply_env_overrides();
    config.validate()?;
    Ok(config)
}
