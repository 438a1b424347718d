//! Document parsing and text extraction
//!
//! This module handles:
//! - HTML parsing (title, headings, visible text, links)
//! - Content type detection for fetched pages

mod html;

pub use html::*;

/// Content types a fetched page can have
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Html,
    PlainText,
    Unknown,
}

impl ContentType {
    /// Detect content type from MIME type
    pub fn from_mime(mime: &str) -> Self {
        let mime_lower = mime.to_lowercase();
        if mime_lower.contains("text/html") || mime_lower.contains("application/xhtml") {
            ContentType::Html
        } else if mime_lower.contains("text/plain") {
            ContentType::PlainText
        } else {
            ContentType::Unknown
        }
    }

    /// Whether pages of this type are lemmatized and searchable
    pub fn is_indexable(self) -> bool {
        self == ContentType::Html
    }
}

/// Parsed HTML page
#[derive(Debug, Clone, Default)]
pub struct ParsedPage {
    /// Contents of `<title>` (if found)
    pub title: Option<String>,

    /// Visible text of the whole document on a single line
    pub text: String,

    /// Visible text of the body with one line per block element
    pub whole_text: String,

    /// Texts of `<h1>`..`<h6>` elements in document order
    pub headings: Vec<String>,

    /// Links found in the document
    pub links: Vec<ExtractedLink>,
}

/// A link extracted from a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedLink {
    /// Absolute URL (resolved against the page URL)
    pub url: String,

    /// Whether the link points to the same host as the page
    pub is_internal: bool,
}

/// Collapse runs of whitespace into single spaces
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_from_mime() {
        assert_eq!(ContentType::from_mime("text/html; charset=utf-8"), ContentType::Html);
        assert_eq!(ContentType::from_mime("application/xhtml+xml"), ContentType::Html);
        assert_eq!(ContentType::from_mime("text/plain"), ContentType::PlainText);
        assert_eq!(ContentType::from_mime("image/png"), ContentType::Unknown);
        assert!(ContentType::Html.is_indexable());
        assert!(!ContentType::Unknown.is_indexable());
    }

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("  a \n\t b  c "), "a b c");
    }
}
