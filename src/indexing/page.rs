//! Fetching and indexing a single page

use super::rank::RankScorer;
use crate::crawl::{page_url, Crawler};
use crate::error::Result;
use crate::lemma::Lemmatizer;
use crate::store::{IndexStore, Page, Site, PAGE_FETCH_FAILED};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Lazily created lock per site
///
/// Serializes changes to a site's lemma frequencies.
#[derive(Clone, Default)]
pub struct SiteLocks {
    locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl SiteLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the site with the given root URL
    pub async fn lock(&self, site_url: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks
                .entry(site_url.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

/// What happened to one page
#[derive(Debug, Clone)]
pub struct PageOutcome {
    /// Recorded HTTP code
    pub code: i64,
    /// Internal links to follow
    pub links: Vec<String>,
    /// Transport error, when no response was received
    pub error: Option<String>,
}

/// Fetches a page, records it and indexes its lemmas
pub struct PageIndexer {
    crawler: Crawler,
    store: IndexStore,
    lemmatizer: Arc<Lemmatizer>,
    scorer: RankScorer,
    site_locks: SiteLocks,
}

impl PageIndexer {
    pub fn new(
        crawler: Crawler,
        store: IndexStore,
        lemmatizer: Arc<Lemmatizer>,
        scorer: RankScorer,
        site_locks: SiteLocks,
    ) -> Self {
        Self {
            crawler,
            store,
            lemmatizer,
            scorer,
            site_locks,
        }
    }

    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    pub fn crawler(&self) -> &Crawler {
        &self.crawler
    }

    pub fn site_locks(&self) -> &SiteLocks {
        &self.site_locks
    }

    /// Fetch `page` and replace its in-progress row with the result
    ///
    /// Fetch failures are recorded on the page and reported in the
    /// outcome; only storage failures are errors.
    pub async fn index_page(&self, site: &Site, page: &Page) -> Result<PageOutcome> {
        let url = page_url(&site.url, &page.path)?;

        let fetched = match self.crawler.fetch(&url).await {
            Ok(fetched) => fetched,
            Err(e) => {
                self.store
                    .update_page(page.id, PAGE_FETCH_FAILED, "")
                    .await?;
                return Ok(PageOutcome {
                    code: PAGE_FETCH_FAILED,
                    links: Vec::new(),
                    error: Some(e.to_string()),
                });
            }
        };

        let code = i64::from(fetched.code);
        self.store
            .update_page(page.id, code, &fetched.content)
            .await?;

        let links = fetched.crawlable_links();
        if let Some(parsed) = fetched.parsed.as_ref().filter(|_| fetched.is_success()) {
            let ranks = self.scorer.score(&self.lemmatizer, parsed);
            let _site_guard = self.site_locks.lock(&site.url).await;
            self.store.save_page_index(site.id, page.id, &ranks).await?;
        }

        Ok(PageOutcome {
            code,
            links,
            error: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexing::test_support::{indexer_for, serve_site};
    use crate::store::SiteStatus;
    use wiremock::MockServer;

    #[tokio::test]
    async fn test_index_page_records_content_and_lemmas() {
        let server = MockServer::start().await;
        serve_site(&server, &[("/cats", "<h1>Cats</h1><p>cats chase dogs</p>")]).await;

        let (indexer, _tmp) = indexer_for().await;
        let store = indexer.store();
        let site = store
            .insert_site(&server.uri(), "Test", SiteStatus::Indexing)
            .await
            .unwrap();
        let page = store.claim_page(site.id, "/cats").await.unwrap().unwrap();

        let outcome = indexer.index_page(&site, &page).await.unwrap();
        assert_eq!(outcome.code, 200);
        assert!(outcome.error.is_none());

        let stored = store.get_page(page.id).await.unwrap().unwrap();
        assert!(stored.is_renderable());

        let lemmas = store
            .lemmas_by_site_and_texts(site.id, &["cat".to_string(), "dog".to_string()])
            .await
            .unwrap();
        assert_eq!(lemmas.len(), 2);
        let cat = lemmas.iter().find(|l| l.lemma == "cat").unwrap();
        let rows = store.index_by_lemma(cat.id).await.unwrap();
        // body 2 + heading 1.5
        assert_eq!(rows[0].rank, 3.5);
    }

    #[tokio::test]
    async fn test_missing_page_is_recorded_without_lemmas() {
        let server = MockServer::start().await;
        serve_site(&server, &[]).await;

        let (indexer, _tmp) = indexer_for().await;
        let store = indexer.store();
        let site = store
            .insert_site(&server.uri(), "Test", SiteStatus::Indexing)
            .await
            .unwrap();
        let page = store.claim_page(site.id, "/nope").await.unwrap().unwrap();

        let outcome = indexer.index_page(&site, &page).await.unwrap();
        assert_eq!(outcome.code, 404);

        let stored = store.get_page(page.id).await.unwrap().unwrap();
        assert_eq!(stored.code, 404);
        assert!(store.index_by_page(page.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transport_failure_is_recorded() {
        let (indexer, _tmp) = indexer_for().await;
        let store = indexer.store();
        // Nothing listens on port 9 of localhost
        let site = store
            .insert_site("http://127.0.0.1:9", "Down", SiteStatus::Indexing)
            .await
            .unwrap();
        let page = store.claim_page(site.id, "/").await.unwrap().unwrap();

        let outcome = indexer.index_page(&site, &page).await.unwrap();
        assert_eq!(outcome.code, PAGE_FETCH_FAILED);
        assert!(outcome.error.is_some());
        let stored = store.get_page(page.id).await.unwrap().unwrap();
        assert_eq!(stored.code, PAGE_FETCH_FAILED);
    }

    #[tokio::test]
    async fn test_site_locks_are_per_site() {
        let locks = SiteLocks::new();
        let a = locks.lock("https://a.example.com").await;
        // A different site is not blocked
        let _b = locks.lock("https://b.example.com").await;
        drop(a);
        // The same site can be locked again once released
        let _a = locks.lock("https://a.example.com").await;
    }
}
