//! Rows of the index database

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;

/// HTTP code recorded for a page whose fetch has not finished yet
pub const PAGE_IN_PROGRESS: i64 = 102;

/// Code recorded for a page whose fetch failed before any response
pub const PAGE_FETCH_FAILED: i64 = 500;

/// Indexing state of a site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SiteStatus {
    Indexing,
    Indexed,
    Failed,
}

impl std::fmt::Display for SiteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SiteStatus::Indexing => write!(f, "INDEXING"),
            SiteStatus::Indexed => write!(f, "INDEXED"),
            SiteStatus::Failed => write!(f, "FAILED"),
        }
    }
}

impl FromStr for SiteStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "INDEXING" => Ok(SiteStatus::Indexing),
            "INDEXED" => Ok(SiteStatus::Indexed),
            "FAILED" => Ok(SiteStatus::Failed),
            _ => Err(Error::Config(format!("Unknown site status: {}", s))),
        }
    }
}

/// An indexed site
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Site {
    pub id: i64,
    pub url: String,
    pub name: String,
    pub status: String,
    pub status_time: String,
    pub last_error: Option<String>,
}

impl Site {
    pub fn get_status(&self) -> Result<SiteStatus> {
        self.status.parse()
    }

    pub fn is_indexing(&self) -> bool {
        matches!(self.get_status(), Ok(SiteStatus::Indexing))
    }

    /// Status time as milliseconds since the Unix epoch
    pub fn status_time_millis(&self) -> Option<i64> {
        DateTime::parse_from_rfc3339(&self.status_time)
            .ok()
            .map(|t| t.with_timezone(&Utc).timestamp_millis())
    }
}

/// A page of a site
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Page {
    pub id: i64,
    pub site_id: i64,
    pub path: String,
    pub code: i64,
    pub content: String,
}

impl Page {
    pub fn is_in_progress(&self) -> bool {
        self.code == PAGE_IN_PROGRESS
    }

    /// Whether the page was fetched successfully and has something to show
    pub fn is_renderable(&self) -> bool {
        (200..300).contains(&self.code) && !self.content.is_empty()
    }
}

/// A normal form known on a site
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Lemma {
    pub id: i64,
    pub site_id: i64,
    pub lemma: String,
    pub frequency: i64,
}

/// Inverted index row
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: i64,
    pub page_id: i64,
    pub lemma_id: i64,
    pub rank: f64,
}

/// Page and lemma counts of a site
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SiteCounts {
    pub pages: usize,
    pub lemmas: usize,
}
