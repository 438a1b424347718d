//! Default values for configuration

/// Default snippet context window (words on each side of a hit)
pub fn default_words_range() -> usize {
    3
}

/// Default number of search results per page
pub fn default_search_limit() -> i64 {
    20
}

/// Default maximum pages per site
pub fn default_crawl_max_pages() -> u32 {
    1000
}

/// Default rate limit (requests per second per host)
pub fn default_crawl_rate_limit() -> f64 {
    4.0
}

/// Default number of pages fetched concurrently within one site
pub fn default_crawl_concurrency() -> usize {
    4
}

/// Default user agent
pub fn default_crawl_user_agent() -> String {
    format!("sitesearch/{} (Site Indexer)", env!("CARGO_PKG_VERSION"))
}

/// Default referrer sent with every request
pub fn default_crawl_referrer() -> String {
    "http://www.google.com".to_string()
}

/// Default request timeout in seconds
pub fn default_crawl_timeout() -> u64 {
    10
}

/// Default number of sites crawled in parallel
pub fn default_max_parallel_sites() -> usize {
    4
}

/// Default rank weight of a lemma occurrence in the page title
pub fn default_title_weight() -> f32 {
    2.0
}

/// Default rank weight of a lemma occurrence in a heading
pub fn default_heading_weight() -> f32 {
    1.5
}

/// Default rank weight of a lemma occurrence in the page body
pub fn default_body_weight() -> f32 {
    1.0
}
