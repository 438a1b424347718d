//! Index storage using SQLite
//!
//! This module holds everything the crawler writes and search reads:
//! - Sites (configured sites and their indexing status)
//! - Pages (fetched documents with HTTP code and content)
//! - Lemmas (normal forms per site with page frequency)
//! - Index rows (weighted lemma occurrences per page)
//!
//! `lemmas.frequency` always equals the number of index rows referencing
//! the lemma. Only [`IndexStore::save_page_index`] and
//! [`IndexStore::delete_page_contributions`] change it.

mod models;
mod schema;

pub use models::*;
pub use schema::*;

use crate::config::{Config, SiteConfig};
use crate::error::Result;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

/// Index database handle
#[derive(Clone)]
pub struct IndexStore {
    pool: SqlitePool,
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

/// Append `(?, ?, ...)` binding every value
fn push_in_list<'a, T>(builder: &mut QueryBuilder<'a, Sqlite>, values: &'a [T])
where
    &'a T: sqlx::Encode<'a, Sqlite> + sqlx::Type<Sqlite> + Send,
{
    builder.push(" (");
    let mut separated = builder.separated(", ");
    for value in values {
        separated.push_bind(value);
    }
    separated.push_unseparated(")");
}

impl IndexStore {
    /// Connect to the index database configured for this installation
    pub async fn connect(config: &Config) -> Result<Self> {
        Self::new(&config.paths.db_file).await
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Open (and create if needed) the database at `db_path`
    pub async fn new(db_path: &Path) -> Result<Self> {
        // Create parent directory if needed
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        debug!("Connecting to SQLite database at {:?}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool };

        // Auto-initialize schema if needed
        if !store.is_initialized().await? {
            store.init_schema().await?;
        }

        Ok(store)
    }

    /// Initialize the database schema
    pub async fn init_schema(&self) -> Result<()> {
        info!("Initializing database schema");
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    /// Check if database is initialized
    pub async fn is_initialized(&self) -> Result<bool> {
        let result: Option<(i32,)> =
            sqlx::query_as("SELECT 1 FROM sqlite_master WHERE type='table' AND name='indexes'")
                .fetch_optional(&self.pool)
                .await?;
        Ok(result.is_some())
    }

    // ===== Site Operations =====

    /// Insert a new site with the given status
    pub async fn insert_site(&self, url: &str, name: &str, status: SiteStatus) -> Result<Site> {
        let site = sqlx::query_as::<_, Site>(
            r#"
            INSERT INTO sites (url, name, status, status_time, last_error)
            VALUES (?, ?, ?, ?, NULL)
            RETURNING *
            "#,
        )
        .bind(url)
        .bind(name)
        .bind(status.to_string())
        .bind(now())
        .fetch_one(&self.pool)
        .await?;
        Ok(site)
    }

    /// Get site by ID
    pub async fn get_site(&self, id: i64) -> Result<Option<Site>> {
        let site = sqlx::query_as::<_, Site>("SELECT * FROM sites WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(site)
    }

    /// Get site by root URL
    pub async fn get_site_by_url(&self, url: &str) -> Result<Option<Site>> {
        let site = sqlx::query_as::<_, Site>("SELECT * FROM sites WHERE url = ?")
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;
        Ok(site)
    }

    /// List all sites
    pub async fn list_sites(&self) -> Result<Vec<Site>> {
        let sites = sqlx::query_as::<_, Site>("SELECT * FROM sites ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(sites)
    }

    /// List sites in the given status
    pub async fn sites_with_status(&self, status: SiteStatus) -> Result<Vec<Site>> {
        let sites = sqlx::query_as::<_, Site>("SELECT * FROM sites WHERE status = ? ORDER BY id")
            .bind(status.to_string())
            .fetch_all(&self.pool)
            .await?;
        Ok(sites)
    }

    /// Set site status, error text and status time
    pub async fn update_site_status(
        &self,
        id: i64,
        status: SiteStatus,
        last_error: Option<&str>,
    ) -> Result<()> {
        sqlx::query("UPDATE sites SET status = ?, status_time = ?, last_error = ? WHERE id = ?")
            .bind(status.to_string())
            .bind(now())
            .bind(last_error)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Refresh a site's status time
    pub async fn touch_site(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE sites SET status_time = ? WHERE id = ?")
            .bind(now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Delete a site and all its pages, lemmas and index rows
    pub async fn delete_site(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM sites WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Replace the given sites with fresh `INDEXING` rows and root pages
    ///
    /// Runs in one transaction: either every site is recreated or none is.
    pub async fn recreate_sites(&self, sites: &[SiteConfig]) -> Result<Vec<(Site, Page)>> {
        let mut tx = self.pool.begin().await?;
        let mut created = Vec::with_capacity(sites.len());

        for site_config in sites {
            sqlx::query("DELETE FROM sites WHERE url = ?")
                .bind(&site_config.url)
                .execute(&mut *tx)
                .await?;

            let site = sqlx::query_as::<_, Site>(
                r#"
                INSERT INTO sites (url, name, status, status_time, last_error)
                VALUES (?, ?, ?, ?, NULL)
                RETURNING *
                "#,
            )
            .bind(&site_config.url)
            .bind(&site_config.name)
            .bind(SiteStatus::Indexing.to_string())
            .bind(now())
            .fetch_one(&mut *tx)
            .await?;

            let root = sqlx::query_as::<_, Page>(
                "INSERT INTO pages (site_id, path, code, content) VALUES (?, '/', ?, '') RETURNING *",
            )
            .bind(site.id)
            .bind(PAGE_IN_PROGRESS)
            .fetch_one(&mut *tx)
            .await?;

            created.push((site, root));
        }

        tx.commit().await?;
        Ok(created)
    }

    // ===== Page Operations =====

    /// Insert a page
    pub async fn insert_page(
        &self,
        site_id: i64,
        path: &str,
        code: i64,
        content: &str,
    ) -> Result<Page> {
        let page = sqlx::query_as::<_, Page>(
            "INSERT INTO pages (site_id, path, code, content) VALUES (?, ?, ?, ?) RETURNING *",
        )
        .bind(site_id)
        .bind(path)
        .bind(code)
        .bind(content)
        .fetch_one(&self.pool)
        .await?;
        Ok(page)
    }

    /// Claim a path for crawling
    ///
    /// Inserts an in-progress page unless the path is already recorded for
    /// the site, in which case `None` is returned.
    pub async fn claim_page(&self, site_id: i64, path: &str) -> Result<Option<Page>> {
        let page = sqlx::query_as::<_, Page>(
            r#"
            INSERT INTO pages (site_id, path, code, content) VALUES (?, ?, ?, '')
            ON CONFLICT(site_id, path) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(site_id)
        .bind(path)
        .bind(PAGE_IN_PROGRESS)
        .fetch_optional(&self.pool)
        .await?;
        Ok(page)
    }

    /// Record the outcome of a fetch
    pub async fn update_page(&self, id: i64, code: i64, content: &str) -> Result<()> {
        sqlx::query("UPDATE pages SET code = ?, content = ? WHERE id = ?")
            .bind(code)
            .bind(content)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Get page by ID
    pub async fn get_page(&self, id: i64) -> Result<Option<Page>> {
        let page = sqlx::query_as::<_, Page>("SELECT * FROM pages WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(page)
    }

    /// Get page by site and path
    pub async fn get_page_by_path(&self, site_id: i64, path: &str) -> Result<Option<Page>> {
        let page = sqlx::query_as::<_, Page>("SELECT * FROM pages WHERE site_id = ? AND path = ?")
            .bind(site_id)
            .bind(path)
            .fetch_optional(&self.pool)
            .await?;
        Ok(page)
    }

    /// List pages of a site
    pub async fn pages_by_site(&self, site_id: i64) -> Result<Vec<Page>> {
        let pages = sqlx::query_as::<_, Page>("SELECT * FROM pages WHERE site_id = ? ORDER BY id")
            .bind(site_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(pages)
    }

    /// Pages of a site among the given paths
    pub async fn pages_by_paths(&self, site_id: i64, paths: &[String]) -> Result<Vec<Page>> {
        if paths.is_empty() {
            return Ok(Vec::new());
        }
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM pages WHERE site_id = ");
        builder.push_bind(site_id);
        builder.push(" AND path IN");
        push_in_list(&mut builder, paths);
        let pages = builder
            .build_query_as::<Page>()
            .fetch_all(&self.pool)
            .await?;
        Ok(pages)
    }

    /// Pages with the given IDs
    pub async fn pages_by_ids(&self, ids: &[i64]) -> Result<Vec<Page>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM pages WHERE id IN");
        push_in_list(&mut builder, ids);
        let pages = builder
            .build_query_as::<Page>()
            .fetch_all(&self.pool)
            .await?;
        Ok(pages)
    }

    // ===== Lemma Operations =====

    /// All lemmas of the given sites
    pub async fn lemmas_by_sites(&self, site_ids: &[i64]) -> Result<Vec<Lemma>> {
        if site_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM lemmas WHERE site_id IN");
        push_in_list(&mut builder, site_ids);
        let lemmas = builder
            .build_query_as::<Lemma>()
            .fetch_all(&self.pool)
            .await?;
        Ok(lemmas)
    }

    /// Lemmas of one site among the given texts
    pub async fn lemmas_by_site_and_texts(
        &self,
        site_id: i64,
        texts: &[String],
    ) -> Result<Vec<Lemma>> {
        self.lemmas_by_sites_and_texts(&[site_id], texts).await
    }

    /// Lemmas of the given sites among the given texts
    pub async fn lemmas_by_sites_and_texts(
        &self,
        site_ids: &[i64],
        texts: &[String],
    ) -> Result<Vec<Lemma>> {
        if site_ids.is_empty() || texts.is_empty() {
            return Ok(Vec::new());
        }
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM lemmas WHERE site_id IN");
        push_in_list(&mut builder, site_ids);
        builder.push(" AND lemma IN");
        push_in_list(&mut builder, texts);
        let lemmas = builder
            .build_query_as::<Lemma>()
            .fetch_all(&self.pool)
            .await?;
        Ok(lemmas)
    }

    // ===== Index Operations =====

    /// Index rows of a page
    pub async fn index_by_page(&self, page_id: i64) -> Result<Vec<IndexEntry>> {
        let rows = sqlx::query_as::<_, IndexEntry>("SELECT * FROM indexes WHERE page_id = ?")
            .bind(page_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Index rows of a lemma
    pub async fn index_by_lemma(&self, lemma_id: i64) -> Result<Vec<IndexEntry>> {
        let rows = sqlx::query_as::<_, IndexEntry>("SELECT * FROM indexes WHERE lemma_id = ?")
            .bind(lemma_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Index rows of a lemma restricted to the given pages
    pub async fn index_by_lemma_and_pages(
        &self,
        lemma_id: i64,
        page_ids: &[i64],
    ) -> Result<Vec<IndexEntry>> {
        if page_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM indexes WHERE lemma_id = ");
        builder.push_bind(lemma_id);
        builder.push(" AND page_id IN");
        push_in_list(&mut builder, page_ids);
        let rows = builder
            .build_query_as::<IndexEntry>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Persist the lemmas of a freshly fetched page
    ///
    /// Every lemma is created or has its frequency bumped by one, then the
    /// page's index rows are inserted. Must be called once per page row.
    pub async fn save_page_index(
        &self,
        site_id: i64,
        page_id: i64,
        ranks: &HashMap<String, f64>,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for (lemma, rank) in ranks {
            let lemma_id: i64 = sqlx::query_scalar(
                r#"
                INSERT INTO lemmas (site_id, lemma, frequency) VALUES (?, ?, 1)
                ON CONFLICT(site_id, lemma) DO UPDATE SET frequency = frequency + 1
                RETURNING id
                "#,
            )
            .bind(site_id)
            .bind(lemma)
            .fetch_one(&mut *tx)
            .await?;

            sqlx::query("INSERT INTO indexes (page_id, lemma_id, rank) VALUES (?, ?, ?)")
                .bind(page_id)
                .bind(lemma_id)
                .bind(rank)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        debug!("Indexed {} lemmas of page {}", ranks.len(), page_id);
        Ok(())
    }

    /// Remove a page together with its lemma contributions
    ///
    /// Frequencies of the page's lemmas drop by one and lemmas left on no
    /// page are deleted. The page and its index rows go last.
    pub async fn delete_page_contributions(&self, page_id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            UPDATE lemmas SET frequency = frequency - 1
            WHERE id IN (SELECT lemma_id FROM indexes WHERE page_id = ?)
            "#,
        )
        .bind(page_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            DELETE FROM lemmas
            WHERE frequency <= 0 AND site_id = (SELECT site_id FROM pages WHERE id = ?)
            "#,
        )
        .bind(page_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM indexes WHERE page_id = ?")
            .bind(page_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM pages WHERE id = ?")
            .bind(page_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    // ===== Statistics =====

    /// Page and lemma counts of a site
    pub async fn site_counts(&self, site_id: i64) -> Result<SiteCounts> {
        let pages: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pages WHERE site_id = ?")
            .bind(site_id)
            .fetch_one(&self.pool)
            .await?;

        let lemmas: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM lemmas WHERE site_id = ?")
            .bind(site_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(SiteCounts {
            pages: pages as usize,
            lemmas: lemmas as usize,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn setup_test_store() -> (IndexStore, TempDir) {
        let tmp = TempDir::new().unwrap();
        let store = IndexStore::new(&tmp.path().join("test.db")).await.unwrap();
        (store, tmp)
    }

    fn ranks(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
        pairs.iter().map(|(l, r)| (l.to_string(), *r)).collect()
    }

    /// Every lemma's frequency equals the number of index rows pointing at it
    async fn assert_frequencies_consistent(store: &IndexStore, site_id: i64) {
        for lemma in store.lemmas_by_sites(&[site_id]).await.unwrap() {
            let rows = store.index_by_lemma(lemma.id).await.unwrap();
            assert_eq!(lemma.frequency, rows.len() as i64, "lemma {}", lemma.lemma);
            assert!(lemma.frequency > 0);
        }
    }

    #[tokio::test]
    async fn test_site_crud() {
        let (store, _tmp) = setup_test_store().await;

        let site = store
            .insert_site("https://example.com", "Example", SiteStatus::Indexing)
            .await
            .unwrap();
        assert!(site.is_indexing());

        store
            .update_site_status(site.id, SiteStatus::Failed, Some("boom"))
            .await
            .unwrap();
        let loaded = store.get_site_by_url("https://example.com").await.unwrap().unwrap();
        assert_eq!(loaded.get_status().unwrap(), SiteStatus::Failed);
        assert_eq!(loaded.last_error.as_deref(), Some("boom"));

        assert!(store
            .sites_with_status(SiteStatus::Indexing)
            .await
            .unwrap()
            .is_empty());

        store.delete_site(site.id).await.unwrap();
        assert!(store.list_sites().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_claim_page_once() {
        let (store, _tmp) = setup_test_store().await;
        let site = store
            .insert_site("https://example.com", "Example", SiteStatus::Indexing)
            .await
            .unwrap();

        let page = store.claim_page(site.id, "/a").await.unwrap().unwrap();
        assert!(page.is_in_progress());
        assert!(store.claim_page(site.id, "/a").await.unwrap().is_none());

        store.update_page(page.id, 200, "<p>a</p>").await.unwrap();
        let loaded = store.get_page_by_path(site.id, "/a").await.unwrap().unwrap();
        assert_eq!(loaded.code, 200);

        let found = store
            .pages_by_paths(site.id, &["/a".to_string(), "/b".to_string()])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn test_frequency_tracks_pages() {
        let (store, _tmp) = setup_test_store().await;
        let site = store
            .insert_site("https://example.com", "Example", SiteStatus::Indexing)
            .await
            .unwrap();

        let p1 = store.insert_page(site.id, "/1", 200, "x").await.unwrap();
        let p2 = store.insert_page(site.id, "/2", 200, "x").await.unwrap();
        store
            .save_page_index(site.id, p1.id, &ranks(&[("cat", 2.0), ("dog", 1.0)]))
            .await
            .unwrap();
        store
            .save_page_index(site.id, p2.id, &ranks(&[("cat", 1.0)]))
            .await
            .unwrap();

        let lemmas = store
            .lemmas_by_site_and_texts(site.id, &["cat".to_string(), "dog".to_string()])
            .await
            .unwrap();
        let cat = lemmas.iter().find(|l| l.lemma == "cat").unwrap();
        assert_eq!(cat.frequency, 2);
        assert_frequencies_consistent(&store, site.id).await;

        store.delete_page_contributions(p1.id).await.unwrap();
        let lemmas = store.lemmas_by_sites(&[site.id]).await.unwrap();
        assert_eq!(lemmas.len(), 1);
        assert_eq!(lemmas[0].lemma, "cat");
        assert_eq!(lemmas[0].frequency, 1);
        assert!(store.get_page(p1.id).await.unwrap().is_none());
        assert_frequencies_consistent(&store, site.id).await;

        let rows = store
            .index_by_lemma_and_pages(lemmas[0].id, &[p1.id, p2.id])
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].page_id, p2.id);
    }

    #[tokio::test]
    async fn test_reindexing_page_is_idempotent() {
        let (store, _tmp) = setup_test_store().await;
        let site = store
            .insert_site("https://example.com", "Example", SiteStatus::Indexed)
            .await
            .unwrap();
        let other = store.insert_page(site.id, "/other", 200, "x").await.unwrap();
        store
            .save_page_index(site.id, other.id, &ranks(&[("cat", 1.0)]))
            .await
            .unwrap();

        let page_ranks = ranks(&[("cat", 3.0), ("bird", 1.0)]);
        let mut snapshots = Vec::new();
        for _ in 0..2 {
            if let Some(old) = store.get_page_by_path(site.id, "/p").await.unwrap() {
                store.delete_page_contributions(old.id).await.unwrap();
            }
            let page = store.insert_page(site.id, "/p", 200, "x").await.unwrap();
            store.save_page_index(site.id, page.id, &page_ranks).await.unwrap();

            let mut state: Vec<(String, i64)> = store
                .lemmas_by_sites(&[site.id])
                .await
                .unwrap()
                .into_iter()
                .map(|l| (l.lemma, l.frequency))
                .collect();
            state.sort();
            snapshots.push(state);
        }

        assert_eq!(snapshots[0], snapshots[1]);
        assert_eq!(
            snapshots[1],
            vec![("bird".to_string(), 1), ("cat".to_string(), 2)]
        );
        assert_frequencies_consistent(&store, site.id).await;
    }

    #[tokio::test]
    async fn test_recreate_sites_and_cascade() {
        let (store, _tmp) = setup_test_store().await;
        let configured = vec![
            SiteConfig::new("https://a.example.com", "A"),
            SiteConfig::new("https://b.example.com", "B"),
        ];

        let first = store.recreate_sites(&configured).await.unwrap();
        assert_eq!(first.len(), 2);
        let (site_a, root_a) = &first[0];
        assert_eq!(root_a.path, "/");
        assert!(root_a.is_in_progress());

        let page = store.insert_page(site_a.id, "/x", 200, "x").await.unwrap();
        store
            .save_page_index(site_a.id, page.id, &ranks(&[("cat", 1.0)]))
            .await
            .unwrap();
        assert_eq!(store.site_counts(site_a.id).await.unwrap().pages, 2);

        let second = store.recreate_sites(&configured).await.unwrap();
        assert_eq!(store.list_sites().await.unwrap().len(), 2);
        assert!(store.get_site(site_a.id).await.unwrap().is_none());
        assert!(store.lemmas_by_sites(&[site_a.id]).await.unwrap().is_empty());

        let counts = store.site_counts(second[0].0.id).await.unwrap();
        assert_eq!(counts.pages, 1);
        assert_eq!(counts.lemmas, 0);
    }
}
