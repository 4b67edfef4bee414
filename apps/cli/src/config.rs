//! CLI configuration loading.

use std::path::Path;

use anyhow::Context as _;
use remedy_core::Config;

/// Resolve the effective configuration.
///
/// An explicit `--config` file must exist; otherwise the global and local
/// files are discovered. `--db` overrides the configured database path.
pub fn load_config(path: Option<&Path>, db: Option<String>) -> anyhow::Result<Config> {
    let mut config = match path {
        Some(path) => Config::load_from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::discover_and_load(),
    };

    if let Some(db) = db {
        config.storage.database_path = db;
    }

    Ok(config)
}
