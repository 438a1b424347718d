//! Site crawl tasks
//!
//! A [`CrawlTask`] walks one site's link graph starting from its root page,
//! indexing every page it reaches. Its lifecycle is an explicit state
//! machine:
//!
//! ```text
//! Pending ──run──> Running ──finish──> Done | Failed
//!    │                │
//!  cancel           cancel
//!    │                v
//!    └──────> Cancelled <── Cancelling
//! ```
//!
//! Cancellation is cooperative: the fetch loop stops scheduling new pages
//! as soon as it sees the request and only waits for fetches already in
//! flight.

use super::normalize_path;
use crate::error::{Error, Result};
use crate::indexing::{PageIndexer, PageOutcome};
use crate::store::{Page, Site, SiteStatus};
use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Lifecycle phase of a crawl task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPhase {
    Pending,
    Running,
    Cancelling,
    Done,
    Cancelled,
    Failed,
}

impl TaskPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskPhase::Done | TaskPhase::Cancelled | TaskPhase::Failed)
    }
}

/// Crawl limits of a task
#[derive(Debug, Clone, Copy)]
pub struct TaskLimits {
    /// Maximum number of pages recorded for the site
    pub max_pages: usize,
    /// Pages fetched in parallel
    pub concurrency: usize,
}

/// A cancellable crawl of one site
pub struct CrawlTask {
    site: Site,
    root: Page,
    indexer: Arc<PageIndexer>,
    limits: TaskLimits,
    cancelled: AtomicBool,
    phase: watch::Sender<TaskPhase>,
    last_error: Mutex<Option<String>>,
}

impl CrawlTask {
    /// Create a task bound to a site's root page
    pub fn new(site: Site, root: Page, indexer: Arc<PageIndexer>, limits: TaskLimits) -> Self {
        let (phase, _) = watch::channel(TaskPhase::Pending);
        Self {
            site,
            root,
            indexer,
            limits,
            cancelled: AtomicBool::new(false),
            phase,
            last_error: Mutex::new(None),
        }
    }

    pub fn site(&self) -> &Site {
        &self.site
    }

    pub fn phase(&self) -> TaskPhase {
        *self.phase.borrow()
    }

    pub fn is_done(&self) -> bool {
        self.phase().is_terminal()
    }

    /// Error that failed the task, if any
    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().ok().and_then(|e| e.clone())
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Request cancellation
    ///
    /// A pending task is cancelled at once; a running one moves to
    /// `Cancelling` and finishes after its in-flight fetches.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.phase.send_if_modified(|phase| match *phase {
            TaskPhase::Pending => {
                *phase = TaskPhase::Cancelled;
                true
            }
            TaskPhase::Running => {
                *phase = TaskPhase::Cancelling;
                true
            }
            _ => false,
        });
    }

    /// Wait until the task reaches a terminal phase
    pub async fn join(&self) -> TaskPhase {
        let mut rx = self.phase.subscribe();
        let phase = match rx.wait_for(|phase| phase.is_terminal()).await {
            Ok(phase) => *phase,
            // The sender lives in `self`, so this is unreachable while borrowed
            Err(_) => self.phase(),
        };
        phase
    }

    /// Delete the root page if it was never fetched
    ///
    /// A task cancelled while pending leaves its root claimed with the
    /// in-progress code; this releases it.
    pub async fn release_root(&self) -> Result<()> {
        let store = self.indexer.store();
        if let Some(root) = store.get_page(self.root.id).await? {
            if root.is_in_progress() {
                debug!("Releasing unfetched root of {}", self.site.url);
                store.delete_page_contributions(root.id).await?;
            }
        }
        Ok(())
    }

    /// Crawl the site and record its final status
    ///
    /// Returns the terminal phase. A task cancelled before it started
    /// returns immediately.
    pub async fn run(&self) -> TaskPhase {
        let started = self.phase.send_if_modified(|phase| {
            if *phase == TaskPhase::Pending {
                *phase = TaskPhase::Running;
                true
            } else {
                false
            }
        });
        if !started {
            if let Err(e) = self.release_root().await {
                error!("Failed to release root of {}: {}", self.site.url, e);
            }
            return self.phase();
        }

        let start = Instant::now();
        info!("Crawling {}", self.site.url);

        let result = self.crawl().await;
        let store = self.indexer.store();

        let terminal = match result {
            _ if self.is_cancelled() => {
                info!("Crawl of {} cancelled", self.site.url);
                TaskPhase::Cancelled
            }
            Ok(pages) => {
                info!(
                    "Crawled {} pages of {} in {} ms",
                    pages,
                    self.site.url,
                    start.elapsed().as_millis()
                );
                match store
                    .update_site_status(self.site.id, SiteStatus::Indexed, None)
                    .await
                {
                    Ok(()) => TaskPhase::Done,
                    Err(e) => {
                        error!("Failed to update status of {}: {}", self.site.url, e);
                        self.record_error(e.to_string());
                        TaskPhase::Failed
                    }
                }
            }
            Err(e) => {
                error!("Crawl of {} failed: {}", self.site.url, e);
                let message = e.to_string();
                if let Err(e) = store
                    .update_site_status(self.site.id, SiteStatus::Failed, Some(&message))
                    .await
                {
                    error!("Failed to update status of {}: {}", self.site.url, e);
                }
                self.record_error(message);
                TaskPhase::Failed
            }
        };

        self.phase.send_replace(terminal);
        terminal
    }

    fn record_error(&self, message: String) {
        if let Ok(mut last_error) = self.last_error.lock() {
            *last_error = Some(message);
        }
    }

    /// Fetch pages breadth-first until the frontier is empty, the page
    /// limit is reached or cancellation is requested
    ///
    /// On failure no new pages are scheduled, fetches in flight are
    /// awaited and every page left unfetched is deleted before the error
    /// is returned.
    async fn crawl(&self) -> Result<usize> {
        let store = self.indexer.store();
        let concurrency = self.limits.concurrency.max(1);

        let mut frontier: VecDeque<Page> = VecDeque::new();
        frontier.push_back(self.root.clone());
        let mut recorded = 1usize;
        let mut fetched = 0usize;
        let mut in_flight = FuturesUnordered::new();
        let mut unfinished: Vec<Page> = Vec::new();
        let mut failure: Option<Error> = None;

        loop {
            while failure.is_none() && in_flight.len() < concurrency && !self.is_cancelled() {
                let Some(page) = frontier.pop_front() else {
                    break;
                };
                in_flight.push(self.fetch_page(page));
            }

            let Some((page, outcome)) = in_flight.next().await else {
                break;
            };
            let outcome = match outcome {
                Ok(outcome) => outcome,
                Err(e) => {
                    unfinished.push(page);
                    failure.get_or_insert(e);
                    continue;
                }
            };
            fetched += 1;
            if failure.is_some() {
                continue;
            }

            if page.id == self.root.id && !(200..300).contains(&outcome.code) {
                let reason = outcome
                    .error
                    .unwrap_or_else(|| format!("HTTP {}", outcome.code));
                failure = Some(Error::Crawl(format!("Root page unavailable: {}", reason)));
                continue;
            }

            for link in outcome.links {
                if self.is_cancelled() || recorded >= self.limits.max_pages {
                    break;
                }
                let Ok(path) = normalize_path(&link) else {
                    continue;
                };
                match store.claim_page(self.site.id, &path).await {
                    Ok(Some(page)) => {
                        recorded += 1;
                        frontier.push_back(page);
                    }
                    Ok(None) => {}
                    Err(e) => {
                        failure = Some(e);
                        break;
                    }
                }
            }
        }

        // Pages claimed but never fetched must not stay in progress
        unfinished.extend(frontier);
        let released = self.discard_pages(&unfinished).await;

        match failure {
            Some(e) => Err(e),
            None => released.map(|()| fetched),
        }
    }

    /// Delete pages with their contributions, trying every page
    async fn discard_pages(&self, pages: &[Page]) -> Result<()> {
        let store = self.indexer.store();
        let mut first_error = None;
        for page in pages {
            if let Err(e) = store.delete_page_contributions(page.id).await {
                error!("Failed to discard {}{}: {}", self.site.url, page.path, e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    async fn fetch_page(&self, page: Page) -> (Page, Result<PageOutcome>) {
        debug!("Indexing {}{}", self.site.url, page.path);
        let outcome = self.indexer.index_page(&self.site, &page).await;
        if let Ok(outcome) = &outcome {
            if let Some(error) = &outcome.error {
                warn!("Failed to fetch {}{}: {}", self.site.url, page.path, error);
            }
        }
        (page, outcome)
    }
}
