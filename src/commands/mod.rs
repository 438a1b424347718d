//! CLI commands implementation

pub mod index;
pub mod init;
pub mod search;
pub mod stats;

pub use index::*;
pub use init::*;
pub use search::*;
pub use stats::*;

use crate::config::Config;
use crate::error::Result;
use crate::indexing::IndexCoordinator;
use crate::lemma::Lemmatizer;
use crate::search::SearchEngine;
use crate::store::IndexStore;
use std::sync::Arc;

/// Components shared by the commands and the MCP server
#[derive(Clone)]
pub struct Services {
    pub config: Arc<Config>,
    pub store: IndexStore,
    pub coordinator: IndexCoordinator,
    pub engine: SearchEngine,
}

impl Services {
    /// Open the index database and wire up indexing and search
    pub async fn open(config: Config) -> Result<Self> {
        let config = Arc::new(config);
        let store = IndexStore::connect(&config).await?;
        let lemmatizer = Arc::new(Lemmatizer::new());
        let coordinator =
            IndexCoordinator::new(config.clone(), store.clone(), lemmatizer.clone())?;
        let engine = SearchEngine::new(config.clone(), store.clone(), lemmatizer);

        Ok(Self {
            config,
            store,
            coordinator,
            engine,
        })
    }
}
