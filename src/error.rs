//! Custom error types for sitesearch

use thiserror::Error;

/// Main error type for sitesearch operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Crawl error: {0}")]
    Crawl(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("MCP protocol error: {0}")]
    McpProtocol(String),

    // ===== Indexing guards =====
    #[error("Indexing is already running")]
    AlreadyRunning,

    #[error("The previous indexing run is still stopping")]
    StopInProgress,

    #[error("Indexing is not running")]
    NotRunning,

    #[error("Indexing is already stopping")]
    AlreadyStopping,

    // ===== Input validation =====
    #[error("No url was given")]
    BlankUrl,

    #[error("The page is outside the sites listed in the configuration file")]
    SiteNotConfigured,

    #[error("The search query is empty")]
    EmptyQuery,

    #[error("The limit parameter must be greater than zero")]
    InvalidLimit,

    #[error("The offset parameter must not be negative")]
    InvalidOffset,

    // ===== Search preconditions =====
    #[error("The site has not been indexed yet")]
    SiteNotIndexed,

    #[error("Indexing of the site is not finished yet")]
    SiteStillIndexing,

    #[error("Indexing of some configured sites has never been started")]
    PartiallyIndexed,

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether the error is a guard or validation failure that is reported
    /// to the caller as `{result: false, error}` rather than logged as a fault.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Error::AlreadyRunning
                | Error::StopInProgress
                | Error::NotRunning
                | Error::AlreadyStopping
                | Error::BlankUrl
                | Error::SiteNotConfigured
                | Error::EmptyQuery
                | Error::InvalidLimit
                | Error::InvalidOffset
                | Error::SiteNotIndexed
                | Error::SiteStillIndexing
                | Error::PartiallyIndexed
        )
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(err.to_string())
    }
}

/// Result type alias for sitesearch
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_errors_are_user_facing() {
        assert!(Error::AlreadyRunning.is_user_facing());
        assert!(Error::InvalidOffset.is_user_facing());
        assert!(!Error::Crawl("boom".to_string()).is_user_facing());
        assert!(!Error::Config("missing".to_string()).is_user_facing());
    }
}
