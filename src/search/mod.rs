//! Ranked search over the lemma index
//!
//! A query is reduced to its set of lemmas. A site takes part only when it
//! has every one of them (AND semantics). Within a site the rarest lemma
//! seeds the candidate pages and each further lemma, in ascending
//! frequency, narrows them down while adding its rank. Relevance is the
//! summed rank divided by the best summed rank of the whole result set.

use crate::config::{normalize_site_url, Config};
use crate::error::{Error, Result};
use crate::lemma::Lemmatizer;
use crate::parse::parse_html;
use crate::snippet::SnippetBuilder;
use crate::store::{IndexStore, Lemma, Site};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Page ids bound per intersection query
const PAGE_BATCH: usize = 500;

/// One search hit
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchItem {
    pub site: String,
    pub site_name: String,
    /// Page path on the site
    pub uri: String,
    pub title: String,
    /// HTML excerpt with highlighted hits
    pub snippet: String,
    /// Relevance relative to the best hit, in `(0, 1]`
    pub relevance: f64,
}

/// A page of search hits
#[derive(Debug, Clone, Default)]
pub struct SearchResults {
    /// Total number of matching pages
    pub count: usize,
    pub data: Vec<SearchItem>,
}

/// `{result, error, count, data}` envelope of a search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub result: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub data: Option<Vec<SearchItem>>,
}

impl SearchResponse {
    pub fn found(results: SearchResults) -> Self {
        Self {
            result: true,
            error: None,
            count: Some(results.count),
            data: Some(results.data),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            result: false,
            error: Some(message.into()),
            count: None,
            data: None,
        }
    }

    /// Turn validation and precondition failures into a failed envelope
    ///
    /// Infrastructure errors are passed through.
    pub fn from_result(result: Result<SearchResults>) -> Result<Self> {
        match result {
            Ok(results) => Ok(Self::found(results)),
            Err(e) if e.is_user_facing() => Ok(Self::failure(e.to_string())),
            Err(e) => Err(e),
        }
    }
}

/// Search engine over an [`IndexStore`]
#[derive(Clone)]
pub struct SearchEngine {
    config: Arc<Config>,
    store: IndexStore,
    lemmatizer: Arc<Lemmatizer>,
}

impl SearchEngine {
    pub fn new(config: Arc<Config>, store: IndexStore, lemmatizer: Arc<Lemmatizer>) -> Self {
        Self {
            config,
            store,
            lemmatizer,
        }
    }

    /// Search one configured site
    pub async fn search_site(
        &self,
        site_url: &str,
        query: &str,
        limit: i64,
        offset: i64,
    ) -> Result<SearchResults> {
        let url = normalize_site_url(site_url);
        if !self.config.sites.iter().any(|s| s.url == url) {
            return Err(Error::SiteNotConfigured);
        }

        let site = self
            .store
            .get_site_by_url(&url)
            .await?
            .ok_or(Error::SiteNotIndexed)?;
        if site.is_indexing() {
            return Err(Error::SiteStillIndexing);
        }

        self.search(&[site], query, limit, offset).await
    }

    /// Search every configured site
    ///
    /// All of them must have been indexed and none may be indexing.
    pub async fn search_all_sites(
        &self,
        query: &str,
        limit: i64,
        offset: i64,
    ) -> Result<SearchResults> {
        let mut sites = Vec::with_capacity(self.config.sites.len());
        for site_config in &self.config.sites {
            match self.store.get_site_by_url(&site_config.url).await? {
                Some(site) => sites.push(site),
                None => return Err(Error::PartiallyIndexed),
            }
        }
        if sites.iter().any(Site::is_indexing) {
            return Err(Error::SiteStillIndexing);
        }

        self.search(&sites, query, limit, offset).await
    }

    /// Search the given sites
    pub async fn search(
        &self,
        sites: &[Site],
        query: &str,
        limit: i64,
        offset: i64,
    ) -> Result<SearchResults> {
        if query.trim().is_empty() {
            return Err(Error::EmptyQuery);
        }
        if limit <= 0 {
            return Err(Error::InvalidLimit);
        }
        if offset < 0 {
            return Err(Error::InvalidOffset);
        }

        let query_lemmas: HashSet<String> =
            self.lemmatizer.extract_lemmas(query).into_keys().collect();
        let site_lemmas = self.matching_lemmas(sites, &query_lemmas).await?;
        if site_lemmas.is_empty() {
            return Ok(SearchResults::default());
        }

        let start = Instant::now();
        let site_urls: Vec<&str> = sites.iter().map(|s| s.url.as_str()).collect();
        info!("Searching \"{}\" in {:?}", query, site_urls);

        let mut absolute = HashMap::new();
        let mut page_sites = HashMap::new();
        for (site_id, lemmas) in site_lemmas {
            let scores = self.site_relevance(lemmas).await?;
            page_sites.extend(scores.keys().map(|page_id| (*page_id, site_id)));
            absolute.extend(scores);
        }
        let ranked = relative_relevance(absolute);
        let count = ranked.len();

        let window = Window {
            limit: limit as usize,
            offset: offset as usize,
        };
        let data = self
            .render(sites, &page_sites, &ranked, window, &query_lemmas)
            .await?;

        info!(
            "Search \"{}\" finished in {} ms with {} results",
            query,
            start.elapsed().as_millis(),
            count
        );

        Ok(SearchResults { count, data })
    }

    /// Query lemmas per site, keeping only sites that have all of them
    async fn matching_lemmas(
        &self,
        sites: &[Site],
        query_lemmas: &HashSet<String>,
    ) -> Result<HashMap<i64, Vec<Lemma>>> {
        if sites.is_empty() || query_lemmas.is_empty() {
            return Ok(HashMap::new());
        }

        let site_ids: Vec<i64> = sites.iter().map(|s| s.id).collect();
        let texts: Vec<String> = query_lemmas.iter().cloned().collect();
        let mut by_site: HashMap<i64, Vec<Lemma>> = HashMap::new();
        for lemma in self.store.lemmas_by_sites_and_texts(&site_ids, &texts).await? {
            by_site.entry(lemma.site_id).or_default().push(lemma);
        }

        by_site.retain(|site_id, lemmas| {
            let complete = lemmas.len() == query_lemmas.len();
            if !complete {
                debug!("Site {} lacks some query lemmas", site_id);
            }
            complete
        });
        Ok(by_site)
    }

    /// Summed ranks of the pages of one site that contain every lemma
    async fn site_relevance(&self, mut lemmas: Vec<Lemma>) -> Result<HashMap<i64, f64>> {
        lemmas.sort_by_key(|l| l.frequency);
        let Some((rarest, rest)) = lemmas.split_first() else {
            return Ok(HashMap::new());
        };

        let mut relevance: HashMap<i64, f64> = self
            .store
            .index_by_lemma(rarest.id)
            .await?
            .into_iter()
            .map(|row| (row.page_id, row.rank))
            .collect();

        for lemma in rest {
            if relevance.is_empty() {
                break;
            }
            let page_ids: Vec<i64> = relevance.keys().copied().collect();
            let mut narrowed = HashMap::with_capacity(relevance.len());
            for batch in page_ids.chunks(PAGE_BATCH) {
                for row in self.store.index_by_lemma_and_pages(lemma.id, batch).await? {
                    if let Some(score) = relevance.get(&row.page_id) {
                        narrowed.insert(row.page_id, score + row.rank);
                    }
                }
            }
            relevance = narrowed;
        }

        Ok(relevance)
    }

    /// Build result items for `ranked[offset..offset + limit]`
    ///
    /// A page removed since scoring keeps its place with an empty title,
    /// path and snippet.
    async fn render(
        &self,
        sites: &[Site],
        page_sites: &HashMap<i64, i64>,
        ranked: &[(i64, f64)],
        Window { limit, offset }: Window,
        query_lemmas: &HashSet<String>,
    ) -> Result<Vec<SearchItem>> {
        if offset >= ranked.len() {
            return Ok(Vec::new());
        }
        let window = &ranked[offset..ranked.len().min(offset.saturating_add(limit))];

        let ids: Vec<i64> = window.iter().map(|(id, _)| *id).collect();
        let pages: HashMap<i64, _> = self
            .store
            .pages_by_ids(&ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();
        let sites: HashMap<i64, &Site> = sites.iter().map(|s| (s.id, s)).collect();
        let snippets = SnippetBuilder::new(&self.lemmatizer, self.config.search.words_range);

        let mut items = Vec::with_capacity(window.len());
        for (page_id, relevance) in window {
            let page = pages.get(page_id);
            let site_id = page.map(|p| p.site_id).or_else(|| page_sites.get(page_id).copied());
            let Some(site) = site_id.and_then(|id| sites.get(&id)) else {
                continue;
            };

            let (title, snippet) = match page {
                Some(page) if page.is_renderable() => {
                    let parsed = parse_html(&page.content, None);
                    (
                        parsed.title.unwrap_or_default(),
                        snippets.build(&parsed.whole_text, query_lemmas),
                    )
                }
                _ => (String::new(), String::new()),
            };

            items.push(SearchItem {
                site: site.url.clone(),
                site_name: site.name.clone(),
                uri: page.map(|p| p.path.clone()).unwrap_or_default(),
                title,
                snippet,
                relevance: *relevance,
            });
        }

        Ok(items)
    }
}

/// Pagination window over ranked pages
#[derive(Debug, Clone, Copy)]
struct Window {
    limit: usize,
    offset: usize,
}

/// Divide by the best score and sort best first
///
/// Ties are ordered by page id.
fn relative_relevance(absolute: HashMap<i64, f64>) -> Vec<(i64, f64)> {
    let max = absolute.values().copied().fold(0.0_f64, f64::max);
    if max <= 0.0 {
        return Vec::new();
    }

    let mut ranked: Vec<(i64, f64)> = absolute
        .into_iter()
        .map(|(page_id, score)| (page_id, score / max))
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use crate::store::{Page, SiteStatus};
    use tempfile::TempDir;

    struct Fixture {
        engine: SearchEngine,
        store: IndexStore,
        _tmp: TempDir,
    }

    async fn fixture(sites: Vec<SiteConfig>) -> Fixture {
        let tmp = TempDir::new().unwrap();
        let store = IndexStore::new(&tmp.path().join("test.db")).await.unwrap();
        let config = Config {
            sites,
            ..Config::default()
        };
        let engine = SearchEngine::new(Arc::new(config), store.clone(), Arc::new(Lemmatizer::new()));
        Fixture {
            engine,
            store,
            _tmp: tmp,
        }
    }

    async fn add_page(store: &IndexStore, site: &Site, path: &str, ranks: &[(&str, f64)]) -> Page {
        let words: Vec<&str> = ranks.iter().map(|(l, _)| *l).collect();
        let content = format!(
            "<html><head><title>Page {}</title></head><body><p>{}</p></body></html>",
            path,
            words.join(" ")
        );
        let page = store.insert_page(site.id, path, 200, &content).await.unwrap();
        let ranks: HashMap<String, f64> =
            ranks.iter().map(|(l, r)| (l.to_string(), *r)).collect();
        store.save_page_index(site.id, page.id, &ranks).await.unwrap();
        page
    }

    #[tokio::test]
    async fn test_and_semantics_and_relevance() {
        let fx = fixture(vec![]).await;
        let site_a = fx
            .store
            .insert_site("https://a.example.com", "A", SiteStatus::Indexed)
            .await
            .unwrap();
        let site_b = fx
            .store
            .insert_site("https://b.example.com", "B", SiteStatus::Indexed)
            .await
            .unwrap();

        add_page(&fx.store, &site_a, "/p1", &[("cat", 2.0), ("dog", 1.0)]).await;
        add_page(&fx.store, &site_a, "/p2", &[("cat", 1.0)]).await;
        add_page(&fx.store, &site_a, "/p3", &[("cat", 1.0), ("dog", 0.5)]).await;
        // Site B has no dog at all
        add_page(&fx.store, &site_b, "/only-cats", &[("cat", 9.0)]).await;

        let results = fx
            .engine
            .search(&[site_a, site_b], "cats and dogs", 20, 0)
            .await
            .unwrap();

        assert_eq!(results.count, 2);
        let uris: Vec<&str> = results.data.iter().map(|d| d.uri.as_str()).collect();
        assert_eq!(uris, vec!["/p1", "/p3"]);
        assert_eq!(results.data[0].relevance, 1.0);
        assert_eq!(results.data[1].relevance, 0.5);
        assert_eq!(results.data[0].site_name, "A");
        assert_eq!(results.data[0].title, "Page /p1");
        assert!(results.data[0].snippet.contains("<b>"));
    }

    #[tokio::test]
    async fn test_page_removed_after_scoring_keeps_its_slot() {
        let fx = fixture(vec![]).await;
        let site = fx
            .store
            .insert_site("https://a.example.com", "A", SiteStatus::Indexed)
            .await
            .unwrap();
        let kept = add_page(&fx.store, &site, "/kept", &[("cat", 2.0)]).await;
        let removed = add_page(&fx.store, &site, "/removed", &[("cat", 1.0)]).await;

        let ranked = vec![(kept.id, 1.0), (removed.id, 0.5)];
        let page_sites: HashMap<i64, i64> =
            ranked.iter().map(|(page_id, _)| (*page_id, site.id)).collect();
        fx.store.delete_page_contributions(removed.id).await.unwrap();

        let query: HashSet<String> = ["cat".to_string()].into_iter().collect();
        let window = Window {
            limit: 10,
            offset: 0,
        };
        let items = fx
            .engine
            .render(std::slice::from_ref(&site), &page_sites, &ranked, window, &query)
            .await
            .unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].uri, "/kept");
        assert_eq!(items[1].site, "https://a.example.com");
        assert_eq!(items[1].relevance, 0.5);
        assert!(items[1].title.is_empty() && items[1].snippet.is_empty());
    }

    #[tokio::test]
    async fn test_offset_past_end_keeps_count() {
        let fx = fixture(vec![]).await;
        let site = fx
            .store
            .insert_site("https://a.example.com", "A", SiteStatus::Indexed)
            .await
            .unwrap();
        add_page(&fx.store, &site, "/1", &[("cat", 1.0)]).await;
        add_page(&fx.store, &site, "/2", &[("cat", 2.0)]).await;

        let results = fx
            .engine
            .search(std::slice::from_ref(&site), "cat", 20, 2)
            .await
            .unwrap();
        assert_eq!(results.count, 2);
        assert!(results.data.is_empty());

        let second = fx.engine.search(&[site], "cat", 1, 1).await.unwrap();
        assert_eq!(second.count, 2);
        assert_eq!(second.data.len(), 1);
        assert_eq!(second.data[0].uri, "/1");
        assert_eq!(second.data[0].relevance, 0.5);
    }

    #[tokio::test]
    async fn test_input_validation() {
        let fx = fixture(vec![]).await;
        assert!(matches!(
            fx.engine.search(&[], "  ", 10, 0).await,
            Err(Error::EmptyQuery)
        ));
        assert!(matches!(
            fx.engine.search(&[], "cat", 0, 0).await,
            Err(Error::InvalidLimit)
        ));
        assert!(matches!(
            fx.engine.search(&[], "cat", 10, -1).await,
            Err(Error::InvalidOffset)
        ));

        // Only function words: a valid query with nothing to find
        let empty = fx.engine.search(&[], "and the of", 10, 0).await.unwrap();
        assert_eq!(empty.count, 0);
        assert!(empty.data.is_empty());
    }

    #[tokio::test]
    async fn test_site_preconditions() {
        let fx = fixture(vec![
            SiteConfig::new("https://a.example.com", "A"),
            SiteConfig::new("https://b.example.com", "B"),
        ])
        .await;

        assert!(matches!(
            fx.engine.search_site("https://c.example.com", "cat", 10, 0).await,
            Err(Error::SiteNotConfigured)
        ));
        assert!(matches!(
            fx.engine.search_site("https://a.example.com/", "cat", 10, 0).await,
            Err(Error::SiteNotIndexed)
        ));
        assert!(matches!(
            fx.engine.search_all_sites("cat", 10, 0).await,
            Err(Error::PartiallyIndexed)
        ));

        let site_a = fx
            .store
            .insert_site("https://a.example.com", "A", SiteStatus::Indexing)
            .await
            .unwrap();
        fx.store
            .insert_site("https://b.example.com", "B", SiteStatus::Indexed)
            .await
            .unwrap();
        assert!(matches!(
            fx.engine.search_site("https://A.example.com", "cat", 10, 0).await,
            Err(Error::SiteStillIndexing)
        ));
        assert!(matches!(
            fx.engine.search_all_sites("cat", 10, 0).await,
            Err(Error::SiteStillIndexing)
        ));

        fx.store
            .update_site_status(site_a.id, SiteStatus::Indexed, None)
            .await
            .unwrap();
        add_page(&fx.store, &site_a, "/cats", &[("cat", 1.0)]).await;
        let results = fx.engine.search_all_sites("cat", 10, 0).await.unwrap();
        assert_eq!(results.count, 1);
        assert_eq!(results.data[0].site, "https://a.example.com");
    }

    #[test]
    fn test_search_response_envelope() {
        let empty = SearchResponse::from_result(Ok(SearchResults::default())).unwrap();
        assert_eq!(
            serde_json::to_string(&empty).unwrap(),
            r#"{"result":true,"count":0,"data":[]}"#
        );

        let failed = SearchResponse::from_result(Err(Error::EmptyQuery)).unwrap();
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            serde_json::json!({"result": false, "error": "The search query is empty"})
        );
    }
}
