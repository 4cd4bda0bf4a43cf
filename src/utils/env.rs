// src/utils/env.rs
use log::{debug, info};
use std::path::Path;

/// Loads a `.env` file when one exists. Variables already set in the process
/// environment win over the file.
pub fn load_env() {
    match dotenv::dotenv() {
        Ok(path) => info!("Loaded environment from {}", path.display()),
        Err(e) => debug!("No .env file loaded: {}", e),
    }
}

/// Loads a specific env file, e.g. a per-city profile.
pub fn load_env_from(path: &Path) -> anyhow::Result<()> {
    dotenv::from_path(path)
        .map_err(|e| anyhow::anyhow!("Failed to load env file {}: {}", path.display(), e))?;
    info!("Loaded environment from {}", path.display());
    Ok(())
}
