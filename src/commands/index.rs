//! Indexing commands

use super::Services;
use crate::error::Result;
use crate::indexing::{IndexingResponse, Statistics};
use crate::progress::sites_progress_bar;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

/// Outcome of a foreground indexing run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexRunSummary {
    #[serde(flatten)]
    pub response: IndexingResponse,
    /// Whether the run was interrupted
    pub stopped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statistics: Option<Statistics>,
}

/// Start a full indexing run in the background
pub async fn cmd_start_indexing(services: &Services) -> Result<IndexingResponse> {
    IndexingResponse::from_result(services.coordinator.start_full_indexing().await)
}

/// Stop the current indexing run
pub async fn cmd_stop_indexing(services: &Services) -> Result<IndexingResponse> {
    IndexingResponse::from_result(services.coordinator.stop_full_indexing().await)
}

/// Re-index one page, optionally waiting until it is stored
pub async fn cmd_index_page(services: &Services, url: &str, wait: bool) -> Result<IndexingResponse> {
    let response = IndexingResponse::from_result(services.coordinator.index_single_page(url).await)?;
    if response.result && wait {
        services.coordinator.wait().await;
    }
    Ok(response)
}

/// Index every configured site in the foreground
///
/// Ctrl-C stops the run; sites that did not finish are marked failed.
pub async fn cmd_index(services: &Services, show_progress: bool) -> Result<IndexRunSummary> {
    let response = cmd_start_indexing(services).await?;
    if !response.result {
        return Ok(IndexRunSummary {
            response,
            stopped: false,
            statistics: None,
        });
    }

    let bar = show_progress.then(|| sites_progress_bar(services.config.sites.len() as u64));
    let mut ticker = tokio::time::interval(Duration::from_millis(250));
    let finished = services.coordinator.wait();
    tokio::pin!(finished);
    let mut stopped = false;

    loop {
        tokio::select! {
            _ = &mut finished => break,
            _ = ticker.tick() => {
                if let Some(bar) = &bar {
                    let phases = services.coordinator.task_phases().await;
                    let done = phases.iter().filter(|(_, phase)| phase.is_terminal()).count();
                    bar.set_position(done as u64);
                    bar.set_message(format!("({} crawling)", phases.len() - done));
                }
            }
            signal = tokio::signal::ctrl_c(), if !stopped => {
                stopped = true;
                if let Err(e) = signal {
                    warn!("Failed to listen for Ctrl-C: {}", e);
                    continue;
                }
                warn!("Interrupted, stopping indexing");
                let stop = cmd_stop_indexing(services).await?;
                if let Some(error) = stop.error {
                    info!("{}", error);
                }
            }
        }
    }

    if let Some(bar) = bar {
        bar.finish_and_clear();
    }

    Ok(IndexRunSummary {
        response,
        stopped,
        statistics: Some(services.coordinator.statistics().await?),
    })
}

pub fn print_indexing_response(response: &IndexingResponse) {
    match &response.error {
        None => println!("✓ Done"),
        Some(error) => println!("✗ {}", error),
    }
}

pub fn print_index_summary(summary: &IndexRunSummary) {
    if !summary.response.result {
        print_indexing_response(&summary.response);
        return;
    }

    if summary.stopped {
        println!("✗ Indexing stopped");
    } else {
        println!("✓ Indexing complete");
    }
    if let Some(statistics) = &summary.statistics {
        super::print_statistics(statistics);
    }
}
