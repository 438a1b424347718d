//! Init command implementation

use crate::config::{Config, SiteConfig};
use crate::error::{Error, Result};
use crate::store::IndexStore;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone)]
pub struct InitOptions {
    pub base_dir: PathBuf,
    pub force: bool,
    /// Sites to write into the new config; a placeholder is used when empty
    pub sites: Vec<SiteConfig>,
}

/// Where init put things
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitSummary {
    pub config_path: String,
    pub db_path: String,
    pub sites: usize,
}

/// Write a default configuration and create the index database
pub async fn cmd_init(options: InitOptions) -> Result<InitSummary> {
    let mut config = Config::default();
    config.init_paths(Some(options.base_dir));

    if config.paths.config_file.exists() && !options.force {
        return Err(Error::Config(format!(
            "Config already exists at {}. Use --force to overwrite.",
            config.paths.config_file.display()
        )));
    }

    config.sites = if options.sites.is_empty() {
        vec![SiteConfig::new("https://example.com", "Example")]
    } else {
        options.sites
    };
    config.validate()?;

    config.save()?;
    info!("Created config at {:?}", config.paths.config_file);

    IndexStore::connect(&config).await?;
    info!("Created database at {:?}", config.paths.db_file);

    Ok(InitSummary {
        config_path: config.paths.config_file.display().to_string(),
        db_path: config.paths.db_file.display().to_string(),
        sites: config.sites.len(),
    })
}
