// src/pipeline/validate.rs

use std::path::Path;

use crate::error::Result;
use crate::models::Config;

/// Validate configuration and log the resolved settings.
pub fn run_validate(config: &Config) -> Result<()> {
    if let Err(e) = config.validate() {
        log::error!("Config validation failed: {}", e);
        return Err(e);
    }

    log::info!("✓ Config OK");
    log::info!("    Remote root: {} ({:?})", config.sync.remote_root, config.sync.remote.backend);
    log::info!("    Categories: {}", config.sync.categories.join(", "));
    log::info!("    Local root: {}", config.sync.local_root.display());
    log::info!("    Store: {}", config.store.root.display());
    log::info!(
        "    Collections: {} / {}",
        config.store.package_collection,
        config.store.catalog_collection
    );
    log::info!("    Catalog URL: {}", config.catalog.url);
    Ok(())
}

/// Load a config file without falling back to defaults, then validate it.
pub fn validate_file(path: &Path) -> Result<Config> {
    let config = Config::load(path).inspect_err(|e| {
        log::error!("Cannot load {}: {}", path.display(), e);
    })?;
    run_validate(&config)?;
    Ok(config)
}
