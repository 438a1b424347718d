//! Web crawling with per-host rate limiting
//!
//! This module provides:
//! - Page fetching with configurable user agent, referrer and timeout
//! - Per-host rate limiting
//! - Link extraction and page path normalization
//! - Site crawl tasks with cooperative cancellation (see [`task`])

mod rate_limit;
pub mod task;

pub use rate_limit::*;
pub use task::{CrawlTask, TaskPhase};

use crate::config::CrawlConfig;
use crate::error::{Error, Result};
use crate::parse::{parse_html, ContentType, ParsedPage};
use reqwest::header::{HeaderMap, HeaderValue, REFERER};
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;
use url::Url;

/// Result of fetching a single page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    /// HTTP status code of the response
    pub code: u16,
    /// Body of successful HTML responses, empty otherwise
    pub content: String,
    pub content_type: ContentType,
    /// Parsed document for successful HTML responses
    pub parsed: Option<ParsedPage>,
}

impl FetchedPage {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.code)
    }

    /// Internal links worth crawling, in document order
    pub fn crawlable_links(&self) -> Vec<String> {
        self.parsed
            .as_ref()
            .map(|p| {
                p.links
                    .iter()
                    .filter(|l| l.is_internal && should_crawl_url(&l.url))
                    .map(|l| l.url.clone())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// HTTP page fetcher
pub struct Crawler {
    client: Client,
    config: CrawlConfig,
    rate_limiters: Arc<RwLock<HashMap<String, HostRateLimiter>>>,
}

impl Crawler {
    /// Create a new crawler
    pub fn new(config: CrawlConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if !config.referrer.is_empty() {
            let referrer = HeaderValue::from_str(&config.referrer)
                .map_err(|e| Error::Config(format!("Invalid referrer: {}", e)))?;
            headers.insert(REFERER, referrer);
        }

        let client = Client::builder()
            .user_agent(&config.user_agent)
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| Error::Crawl(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            rate_limiters: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    pub fn config(&self) -> &CrawlConfig {
        &self.config
    }

    /// Fetch a single URL
    ///
    /// Non-2xx responses are returned with their code and no content.
    /// Transport failures are errors.
    pub async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        let parsed_url = Url::parse(url)?;
        let host = parsed_url
            .host_str()
            .ok_or_else(|| Error::Crawl("URL has no host".to_string()))?
            .to_string();

        // Rate limiting
        self.rate_limit(&host).await;

        debug!("Fetching: {}", url);

        let response = self.client.get(url).send().await?;
        let status = response.status();

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(ContentType::from_mime)
            .unwrap_or(ContentType::Unknown);

        if !status.is_success() || !content_type.is_indexable() {
            debug!("Not indexing {} (HTTP {}, {:?})", url, status, content_type);
            return Ok(FetchedPage {
                url: url.to_string(),
                code: status.as_u16(),
                content: String::new(),
                content_type,
                parsed: None,
            });
        }

        let content = response.text().await?;
        let parsed = parse_html(&content, Some(url));

        Ok(FetchedPage {
            url: url.to_string(),
            code: status.as_u16(),
            content,
            content_type,
            parsed: Some(parsed),
        })
    }

    async fn rate_limit(&self, host: &str) {
        let limiter = {
            let mut limiters = self.rate_limiters.write().await;
            limiters
                .entry(host.to_string())
                .or_insert_with(|| HostRateLimiter::new(self.config.rate_limit_per_host))
                .clone()
        };

        limiter.wait().await;
    }
}

/// Page path of a URL as stored in the index
///
/// Lower-cased path plus query, without fragment and without a trailing
/// `/` (except for the root).
pub fn normalize_path(url: &str) -> Result<String> {
    let parsed = Url::parse(url.trim())?;
    let trimmed = parsed.path().trim_end_matches('/');
    let mut path = if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    };
    if let Some(query) = parsed.query() {
        path.push('?');
        path.push_str(query);
    }
    Ok(path.to_lowercase())
}

/// Absolute URL of a stored page path on a site
pub fn page_url(site_url: &str, path: &str) -> Result<String> {
    let base = Url::parse(site_url)?;
    Ok(base.join(path)?.to_string())
}

/// File extensions that never hold an HTML document
const SKIPPED_EXTENSIONS: &[&str] = &[
    ".7z", ".avi", ".bmp", ".css", ".csv", ".doc", ".docx", ".dmg", ".eps", ".exe", ".gif",
    ".gz", ".ico", ".jpeg", ".jpg", ".js", ".json", ".mov", ".mp3", ".mp4", ".pdf", ".png",
    ".ppt", ".pptx", ".rar", ".rss", ".svg", ".tar", ".tif", ".tiff", ".webm", ".webp", ".xls",
    ".xlsx", ".xml", ".zip",
];

/// Check if a URL should be crawled based on patterns
pub fn should_crawl_url(url: &str) -> bool {
    let lower = url.to_lowercase();

    // Skip non-document schemes
    for scheme in ["javascript:", "mailto:", "tel:", "data:", "ftp:"] {
        if lower.starts_with(scheme) {
            return false;
        }
    }

    let path = match Url::parse(&lower) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => return false,
    };

    !SKIPPED_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}
