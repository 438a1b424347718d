//! Indexing runs
//!
//! The [`IndexCoordinator`] owns the process-wide indexing state: the crawl
//! tasks of the current run and whether a stop is draining them. Its three
//! operations decide and register work under one lock and leave the long
//! running parts to background routines:
//! - full indexing of every configured site
//! - stopping a full run
//! - re-indexing a single page

mod page;
mod rank;

pub use page::*;
pub use rank::*;

use crate::config::Config;
use crate::crawl::{normalize_path, CrawlTask, Crawler, TaskPhase};
use crate::crawl::task::TaskLimits;
use crate::error::{Error, Result};
use crate::lemma::Lemmatizer;
use crate::store::{IndexStore, SiteStatus, PAGE_IN_PROGRESS};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Error recorded on sites whose run was stopped
pub const STOPPED_BY_USER: &str = "Indexing stopped by user";

/// `{result, error}` envelope of the indexing operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexingResponse {
    pub result: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

impl IndexingResponse {
    pub fn ok() -> Self {
        Self {
            result: true,
            error: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            result: false,
            error: Some(message.into()),
        }
    }

    /// Turn guard and validation failures into a failed envelope
    ///
    /// Infrastructure errors are passed through.
    pub fn from_result(result: Result<()>) -> Result<Self> {
        match result {
            Ok(()) => Ok(Self::ok()),
            Err(e) if e.is_user_facing() => Ok(Self::failure(e.to_string())),
            Err(e) => Err(e),
        }
    }
}

/// Totals over the configured sites
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TotalStatistics {
    pub sites: usize,
    pub pages: usize,
    pub lemmas: usize,
    pub indexing: bool,
}

/// State of one configured site
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedStatistics {
    pub url: String,
    pub name: String,
    /// `None` for sites that were never indexed
    pub status: Option<SiteStatus>,
    /// Milliseconds since the Unix epoch
    pub status_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
    pub pages: usize,
    pub lemmas: usize,
}

/// Index statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statistics {
    pub total: TotalStatistics,
    pub detailed: Vec<DetailedStatistics>,
}

#[derive(Default)]
struct RunState {
    tasks: Vec<Arc<CrawlTask>>,
    stopping: bool,
    background: Vec<JoinHandle<()>>,
}

impl RunState {
    fn has_active_tasks(&self) -> bool {
        self.tasks.iter().any(|t| !t.is_done())
    }

    fn track(&mut self, handle: JoinHandle<()>) {
        self.background.retain(|h| !h.is_finished());
        self.background.push(handle);
    }
}

/// Starts, stops and tracks indexing work
#[derive(Clone)]
pub struct IndexCoordinator {
    config: Arc<Config>,
    store: IndexStore,
    indexer: Arc<PageIndexer>,
    workers: Arc<Semaphore>,
    state: Arc<Mutex<RunState>>,
}

impl IndexCoordinator {
    pub fn new(config: Arc<Config>, store: IndexStore, lemmatizer: Arc<Lemmatizer>) -> Result<Self> {
        let crawler = Crawler::new(config.crawl.clone())?;
        let indexer = PageIndexer::new(
            crawler,
            store.clone(),
            lemmatizer,
            RankScorer::new(&config.rank),
            SiteLocks::new(),
        );
        let workers = Arc::new(Semaphore::new(config.indexing.max_parallel_sites.max(1)));

        Ok(Self {
            config,
            store,
            indexer: Arc::new(indexer),
            workers,
            state: Arc::new(Mutex::new(RunState::default())),
        })
    }

    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    fn task_limits(&self) -> TaskLimits {
        TaskLimits {
            max_pages: self.config.crawl.max_pages_per_site as usize,
            concurrency: self.config.crawl.concurrency,
        }
    }

    /// Recreate every configured site and crawl them in the background
    pub async fn start_full_indexing(&self) -> Result<()> {
        let mut state = self.state.lock().await;

        if state.stopping {
            return Err(Error::StopInProgress);
        }
        let indexing = !self
            .store
            .sites_with_status(SiteStatus::Indexing)
            .await?
            .is_empty();
        if state.has_active_tasks() || (indexing && !state.tasks.is_empty()) {
            return Err(Error::AlreadyRunning);
        }

        let created = self.store.recreate_sites(&self.config.sites).await?;
        let limits = self.task_limits();
        let tasks: Vec<Arc<CrawlTask>> = created
            .into_iter()
            .map(|(site, root)| {
                Arc::new(CrawlTask::new(site, root, self.indexer.clone(), limits))
            })
            .collect();
        state.tasks = tasks.clone();

        info!("Starting indexing of {} sites", tasks.len());
        let workers = self.workers.clone();
        let handle = tokio::spawn(async move {
            let start = Instant::now();
            let runs: Vec<_> = tasks
                .into_iter()
                .map(|task| {
                    let workers = workers.clone();
                    tokio::spawn(async move {
                        let _permit = workers.acquire_owned().await.ok();
                        task.run().await
                    })
                })
                .collect();

            let mut done = 0usize;
            for run in futures::future::join_all(runs).await {
                match run {
                    Ok(TaskPhase::Done) => done += 1,
                    Ok(_) => {}
                    Err(e) => error!("Crawl task panicked: {}", e),
                }
            }
            info!(
                "Indexing finished in {} ms ({} sites completed)",
                start.elapsed().as_millis(),
                done
            );
        });
        state.track(handle);

        Ok(())
    }

    /// Cancel the current run and mark its sites as failed
    pub async fn stop_full_indexing(&self) -> Result<()> {
        let mut state = self.state.lock().await;

        if self
            .store
            .sites_with_status(SiteStatus::Indexing)
            .await?
            .is_empty()
        {
            return Err(Error::NotRunning);
        }
        if state.stopping {
            return Err(Error::AlreadyStopping);
        }

        state.stopping = true;
        let tasks = state.tasks.clone();
        let store = self.store.clone();
        let shared = self.state.clone();

        info!("Stopping indexing");
        let handle = tokio::spawn(async move {
            for task in &tasks {
                task.cancel();
            }
            for task in &tasks {
                task.join().await;
                // Tasks cancelled while waiting for a worker never fetched their root
                if let Err(e) = task.release_root().await {
                    error!("Failed to release root of {}: {}", task.site().url, e);
                }
            }

            match store.sites_with_status(SiteStatus::Indexing).await {
                Ok(sites) => {
                    for site in sites {
                        if let Err(e) = store
                            .update_site_status(site.id, SiteStatus::Failed, Some(STOPPED_BY_USER))
                            .await
                        {
                            error!("Failed to mark {} as stopped: {}", site.url, e);
                        }
                    }
                }
                Err(e) => error!("Failed to list indexing sites: {}", e),
            }

            let mut state = shared.lock().await;
            state.tasks.clear();
            state.stopping = false;
            info!("Indexing stopped");
        });
        state.track(handle);

        Ok(())
    }

    /// Re-index one page of a configured site
    ///
    /// The page's old lemma contributions are removed before this returns;
    /// the fetch itself runs in the background.
    pub async fn index_single_page(&self, url: &str) -> Result<()> {
        let mut state = self.state.lock().await;

        let url = url.trim();
        if url.is_empty() {
            return Err(Error::BlankUrl);
        }
        let url = url.to_lowercase();
        let site_config = self
            .config
            .find_site(&url)
            .ok_or(Error::SiteNotConfigured)?
            .clone();
        let path = normalize_path(&url)?;

        let existing = self.store.get_site_by_url(&site_config.url).await?;
        if let Some(site) = &existing {
            if let Some(old) = self.store.get_page_by_path(site.id, &path).await? {
                if old.is_in_progress() {
                    debug!("{} is already being indexed", url);
                    return Ok(());
                }
            }
        }

        let (site, created) = match existing {
            Some(site) => {
                self.store.touch_site(site.id).await?;
                (site, false)
            }
            None => {
                let site = self
                    .store
                    .insert_site(&site_config.url, &site_config.name, SiteStatus::Indexing)
                    .await?;
                (site, true)
            }
        };

        let page = {
            let _site_guard = self.indexer.site_locks().lock(&site.url).await;
            if let Some(old) = self.store.get_page_by_path(site.id, &path).await? {
                self.store.delete_page_contributions(old.id).await?;
            }
            self.store
                .insert_page(site.id, &path, PAGE_IN_PROGRESS, "")
                .await?
        };

        info!("Re-indexing {}", url);
        let indexer = self.indexer.clone();
        let handle = tokio::spawn(async move {
            let store = indexer.store();
            let failure = match indexer.index_page(&site, &page).await {
                Ok(outcome) if (200..300).contains(&outcome.code) => None,
                Ok(outcome) => Some(
                    outcome
                        .error
                        .unwrap_or_else(|| format!("HTTP {}", outcome.code)),
                ),
                Err(e) => {
                    error!("Failed to index {}{}: {}", site.url, page.path, e);
                    Some(e.to_string())
                }
            };

            if created {
                let result = match &failure {
                    None => store.update_site_status(site.id, SiteStatus::Indexed, None).await,
                    Some(message) => {
                        store
                            .update_site_status(site.id, SiteStatus::Failed, Some(message))
                            .await
                    }
                };
                if let Err(e) = result {
                    error!("Failed to update status of {}: {}", site.url, e);
                }
            }
        });
        state.track(handle);

        Ok(())
    }

    /// Whether a run is in progress or any site is being indexed
    pub async fn is_indexing(&self) -> Result<bool> {
        if self.state.lock().await.has_active_tasks() {
            return Ok(true);
        }
        Ok(!self
            .store
            .sites_with_status(SiteStatus::Indexing)
            .await?
            .is_empty())
    }

    /// Phases of the tasks of the current run
    pub async fn task_phases(&self) -> Vec<(String, TaskPhase)> {
        self.state
            .lock()
            .await
            .tasks
            .iter()
            .map(|t| (t.site().url.clone(), t.phase()))
            .collect()
    }

    /// Wait for all background work started so far
    pub async fn wait(&self) {
        loop {
            let handles = std::mem::take(&mut self.state.lock().await.background);
            if handles.is_empty() {
                break;
            }
            for handle in handles {
                if let Err(e) = handle.await {
                    error!("Background indexing routine panicked: {}", e);
                }
            }
        }
    }

    /// Statistics over the configured sites
    pub async fn statistics(&self) -> Result<Statistics> {
        let mut total = TotalStatistics {
            sites: self.config.sites.len(),
            indexing: self.state.lock().await.has_active_tasks(),
            ..TotalStatistics::default()
        };
        let mut detailed = Vec::with_capacity(self.config.sites.len());

        for site_config in &self.config.sites {
            let item = match self.store.get_site_by_url(&site_config.url).await? {
                Some(site) => {
                    let counts = self.store.site_counts(site.id).await?;
                    let status = site.get_status().ok();
                    if status == Some(SiteStatus::Indexing) {
                        total.indexing = true;
                    }
                    DetailedStatistics {
                        url: site.url.clone(),
                        name: site.name.clone(),
                        status,
                        status_time: site.status_time_millis(),
                        error: site.last_error.clone(),
                        pages: counts.pages,
                        lemmas: counts.lemmas,
                    }
                }
                None => DetailedStatistics {
                    url: site_config.url.clone(),
                    name: site_config.name.clone(),
                    status: None,
                    status_time: None,
                    error: None,
                    pages: 0,
                    lemmas: 0,
                },
            };
            total.pages += item.pages;
            total.lemmas += item.lemmas;
            detailed.push(item);
        }

        Ok(Statistics { total, detailed })
    }
}
