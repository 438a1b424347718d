//! Configuration management for sitesearch
//!
//! Handles loading, saving, and validating configuration from TOML files.

mod defaults;

pub use defaults::*;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use url::Url;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Sites to crawl and search, in configuration order
    #[serde(default)]
    pub sites: Vec<SiteConfig>,

    /// Search and snippet configuration
    #[serde(default)]
    pub search: SearchConfig,

    /// Web crawling configuration
    #[serde(default)]
    pub crawl: CrawlConfig,

    /// Indexing run configuration
    #[serde(default)]
    pub indexing: IndexingConfig,

    /// Rank weights for the inverted index
    #[serde(default)]
    pub rank: RankConfig,

    /// Paths configuration (internal, not user-editable)
    #[serde(skip)]
    pub paths: PathsConfig,
}

/// A configured site
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Site root URL, e.g. `https://example.com`
    pub url: String,

    /// Human readable site name
    pub name: String,
}

impl SiteConfig {
    pub fn new(url: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            url: normalize_site_url(&url.into()),
            name: name.into(),
        }
    }

    /// Whether `url` (already lower-cased) belongs to this site
    pub fn contains(&self, url: &str) -> bool {
        match url.strip_prefix(self.url.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with(['/', '?', '#']),
            None => false,
        }
    }
}

/// Search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Context words emitted around each snippet hit
    #[serde(default = "default_words_range")]
    pub words_range: usize,

    /// Page size used when the caller gives no limit
    #[serde(default = "default_search_limit")]
    pub default_limit: i64,
}

/// Web crawling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlConfig {
    /// Maximum pages to crawl per site
    #[serde(default = "default_crawl_max_pages")]
    pub max_pages_per_site: u32,

    /// Requests per second per host
    #[serde(default = "default_crawl_rate_limit")]
    pub rate_limit_per_host: f64,

    /// Pages fetched concurrently within one site
    #[serde(default = "default_crawl_concurrency")]
    pub concurrency: usize,

    /// User agent string
    #[serde(default = "default_crawl_user_agent")]
    pub user_agent: String,

    /// Referrer header value
    #[serde(default = "default_crawl_referrer")]
    pub referrer: String,

    /// Request timeout in seconds
    #[serde(default = "default_crawl_timeout")]
    pub timeout_secs: u64,
}

/// Indexing run configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    /// Number of site crawls executed at the same time
    #[serde(default = "default_max_parallel_sites")]
    pub max_parallel_sites: usize,
}

/// Weights applied per lemma occurrence when computing index rank
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankConfig {
    #[serde(default = "default_title_weight")]
    pub title_weight: f32,

    #[serde(default = "default_heading_weight")]
    pub heading_weight: f32,

    #[serde(default = "default_body_weight")]
    pub body_weight: f32,
}

/// Internal paths configuration
#[derive(Debug, Clone, Default)]
pub struct PathsConfig {
    /// Base directory for sitesearch data
    pub base_dir: PathBuf,

    /// Path to config file
    pub config_file: PathBuf,

    /// Path to SQLite database
    pub db_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sites: Vec::new(),
            search: SearchConfig::default(),
            crawl: CrawlConfig::default(),
            indexing: IndexingConfig::default(),
            rank: RankConfig::default(),
            paths: PathsConfig::default(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            words_range: default_words_range(),
            default_limit: default_search_limit(),
        }
    }
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_pages_per_site: default_crawl_max_pages(),
            rate_limit_per_host: default_crawl_rate_limit(),
            concurrency: default_crawl_concurrency(),
            user_agent: default_crawl_user_agent(),
            referrer: default_crawl_referrer(),
            timeout_secs: default_crawl_timeout(),
        }
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            max_parallel_sites: default_max_parallel_sites(),
        }
    }
}

impl Default for RankConfig {
    fn default() -> Self {
        Self {
            title_weight: default_title_weight(),
            heading_weight: default_heading_weight(),
            body_weight: default_body_weight(),
        }
    }
}

impl Config {
    /// Get the default base directory for sitesearch (~/.sitesearch)
    pub fn default_base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".sitesearch")
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        Self::default_base_dir().join("config.toml")
    }

    /// Initialize paths configuration
    pub fn init_paths(&mut self, base_dir: Option<PathBuf>) {
        let base = base_dir.unwrap_or_else(Self::default_base_dir);
        self.paths = PathsConfig {
            config_file: base.join("config.toml"),
            db_file: base.join("index.db"),
            base_dir: base,
        };
    }

    /// Load configuration from a specific file path
    pub fn load(config_path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", config_path);

        if !config_path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }

        let content = std::fs::read_to_string(config_path)?;
        let mut config: Config = toml::from_str(&content)?;

        let base = config_path.parent().unwrap_or(Path::new(".")).to_path_buf();
        config.paths = PathsConfig {
            config_file: config_path.to_path_buf(),
            db_file: base.join("index.db"),
            base_dir: base,
        };

        config.normalize_sites();
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.paths.config_file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&self.paths.config_file, content)?;
        info!("Saved config to {:?}", self.paths.config_file);
        Ok(())
    }

    /// Find the configured site that owns `url`
    pub fn find_site(&self, url: &str) -> Option<&SiteConfig> {
        let url = url.trim().to_lowercase();
        self.sites.iter().find(|site| site.contains(&url))
    }

    /// Configured site URLs in configuration order
    pub fn site_urls(&self) -> Vec<String> {
        self.sites.iter().map(|s| s.url.clone()).collect()
    }

    fn normalize_sites(&mut self) {
        for site in &mut self.sites {
            site.url = normalize_site_url(&site.url);
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.sites.is_empty() {
            return Err(Error::Config(
                "at least one [[sites]] entry is required".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for site in &self.sites {
            let parsed = Url::parse(&site.url)
                .map_err(|e| Error::Config(format!("invalid site url '{}': {}", site.url, e)))?;
            if parsed.scheme() != "http" && parsed.scheme() != "https" {
                return Err(Error::Config(format!(
                    "site url '{}' must use http or https",
                    site.url
                )));
            }
            // Page paths are stored relative to the host root
            if parsed.path() != "/" || parsed.query().is_some() || parsed.fragment().is_some() {
                return Err(Error::Config(format!(
                    "site url '{}' must not have a path, query or fragment",
                    site.url
                )));
            }
            if !seen.insert(site.url.as_str()) {
                return Err(Error::Config(format!("duplicate site url '{}'", site.url)));
            }
        }

        if self.search.words_range == 0 {
            return Err(Error::Config("search.words_range must be >= 1".to_string()));
        }

        if self.search.default_limit <= 0 {
            return Err(Error::Config(
                "search.default_limit must be positive".to_string(),
            ));
        }

        if self.crawl.rate_limit_per_host <= 0.0 {
            return Err(Error::Config(
                "crawl.rate_limit_per_host must be positive".to_string(),
            ));
        }

        if self.crawl.concurrency == 0 {
            return Err(Error::Config("crawl.concurrency must be >= 1".to_string()));
        }

        if self.indexing.max_parallel_sites == 0 {
            return Err(Error::Config(
                "indexing.max_parallel_sites must be >= 1".to_string(),
            ));
        }

        if self.rank.title_weight < 0.0 || self.rank.heading_weight < 0.0 {
            return Err(Error::Config(
                "rank weights must not be negative".to_string(),
            ));
        }

        if self.rank.body_weight <= 0.0 {
            return Err(Error::Config("rank.body_weight must be positive".to_string()));
        }

        Ok(())
    }
}

/// Lower-case a site URL and drop its trailing slash
pub fn normalize_site_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_config() -> Config {
        let mut config = Config::default();
        config.sites = vec![
            SiteConfig::new("https://Example.com/", "Example"),
            SiteConfig::new("https://docs.example.org", "Docs"),
        ];
        config
    }

    #[test]
    fn test_default_config_needs_sites() {
        let config = Config::default();
        assert_eq!(config.search.words_range, 3);
        assert!(config.validate().is_err());
        assert!(sample_config().validate().is_ok());
    }

    #[test]
    fn test_site_url_is_normalized() {
        let config = sample_config();
        assert_eq!(config.sites[0].url, "https://example.com");
    }

    #[test]
    fn test_find_site_matches_prefix_on_boundary() {
        let config = sample_config();
        assert_eq!(
            config.find_site("https://EXAMPLE.com/news/1").map(|s| s.name.as_str()),
            Some("Example")
        );
        assert_eq!(
            config.find_site("https://example.com").map(|s| s.name.as_str()),
            Some("Example")
        );
        assert!(config.find_site("https://example.community/").is_none());
        assert!(config.find_site("https://other.net/").is_none());
    }

    #[test]
    fn test_config_save_load() {
        let tmp = TempDir::new().unwrap();
        let mut config = sample_config();
        config.init_paths(Some(tmp.path().to_path_buf()));
        config.search.words_range = 5;

        config.save().unwrap();
        assert!(config.paths.config_file.exists());

        let loaded = Config::load(&config.paths.config_file).unwrap();
        assert_eq!(loaded.search.words_range, 5);
        assert_eq!(loaded.sites.len(), 2);
        assert_eq!(loaded.paths.db_file, tmp.path().join("index.db"));
    }

    #[test]
    fn test_config_validation() {
        let mut config = sample_config();

        config.sites.push(SiteConfig::new("https://example.com/", "Dup"));
        assert!(config.validate().is_err());
        config.sites.pop();

        config.sites.push(SiteConfig::new("ftp://files.example.com", "Ftp"));
        assert!(config.validate().is_err());
        config.sites.pop();

        config.sites.push(SiteConfig::new("https://blog.example.net/posts", "Posts"));
        assert!(config.validate().is_err());
        config.sites.pop();

        config.sites.push(SiteConfig::new("https://blog.example.net/?lang=en", "Query"));
        assert!(config.validate().is_err());
        config.sites.pop();

        config.sites.push(SiteConfig::new("http://localhost:8080/", "Local"));
        assert!(config.validate().is_ok());
        config.sites.pop();

        config.search.words_range = 0;
        assert!(config.validate().is_err());
        config.search.words_range = 2;

        config.rank.body_weight = 0.0;
        assert!(config.validate().is_err());
        config.rank.body_weight = 1.0;

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_sites_parse() {
        let toml_src = r#"
            [[sites]]
            url = "https://Lenta.ru/"
            name = "Lenta"

            [search]
            words_range = 4
        "#;
        let mut config: Config = toml::from_str(toml_src).unwrap();
        config.normalize_sites();
        assert_eq!(config.sites[0].url, "https://lenta.ru");
        assert_eq!(config.search.words_range, 4);
        assert_eq!(config.crawl.concurrency, default_crawl_concurrency());
    }
}
