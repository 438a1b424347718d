//! Search command implementation

use super::Services;
use crate::error::Result;
use crate::search::{SearchResponse, SearchResults};
use regex::Regex;
use std::sync::OnceLock;
use tracing::info;

/// Search options
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    /// Restrict the search to one configured site
    pub site: Option<String>,
    /// Page size, the configured default when absent
    pub limit: Option<i64>,
    pub offset: i64,
}

/// Run a search and wrap the outcome in the response envelope
pub async fn cmd_search(
    services: &Services,
    query: &str,
    options: SearchOptions,
) -> Result<SearchResponse> {
    let limit = options
        .limit
        .unwrap_or(services.config.search.default_limit);
    info!("Searching for: {}", query);

    let results: Result<SearchResults> = match options.site.as_deref() {
        Some(site) => {
            services
                .engine
                .search_site(site, query, limit, options.offset)
                .await
        }
        None => {
            services
                .engine
                .search_all_sites(query, limit, options.offset)
                .await
        }
    };

    SearchResponse::from_result(results)
}

/// Snippet markup rendered for a terminal
fn snippet_to_console(snippet: &str) -> String {
    static TAGS: OnceLock<Regex> = OnceLock::new();
    let tags = TAGS.get_or_init(|| Regex::new(r"</?(b|details)>").expect("valid tag pattern"));

    tags.replace_all(snippet, |caps: &regex::Captures| {
        if &caps[1] == "b" {
            "*".to_string()
        } else {
            String::new()
        }
    })
    .replace("&lt;", "<")
    .replace("&gt;", ">")
    .replace("&quot;", "\"")
    .replace("&#39;", "'")
    .replace("&amp;", "&")
}

/// Print search results to console
pub fn print_search_response(query: &str, response: &SearchResponse) {
    if let Some(error) = &response.error {
        println!("✗ {}", error);
        return;
    }

    let data = response.data.as_deref().unwrap_or_default();
    println!("\n🔍 Query: {}\n", query);
    println!(
        "Found {} results, showing {}:\n",
        response.count.unwrap_or(0),
        data.len()
    );

    for (i, item) in data.iter().enumerate() {
        println!(
            "{}. [relevance: {:.3}] {}{}",
            i + 1,
            item.relevance,
            item.site,
            item.uri
        );
        if !item.title.is_empty() {
            println!("   Title: {}", item.title);
        }
        if !item.snippet.is_empty() {
            println!("   {}\n", snippet_to_console(&item.snippet));
        }
    }
}
