//! Statistics command implementation

use super::Services;
use crate::error::Result;
use crate::indexing::Statistics;
use chrono::{Local, TimeZone};

/// Index statistics over the configured sites
pub async fn cmd_statistics(services: &Services) -> Result<Statistics> {
    services.coordinator.statistics().await
}

fn format_time(millis: Option<i64>) -> String {
    millis
        .and_then(|m| Local.timestamp_millis_opt(m).single())
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "never".to_string())
}

pub fn print_statistics(statistics: &Statistics) {
    let total = &statistics.total;
    println!("Index Statistics");
    println!("================");
    println!("  Sites:    {}", total.sites);
    println!("  Pages:    {}", total.pages);
    println!("  Lemmas:   {}", total.lemmas);
    println!("  Indexing: {}", if total.indexing { "yes" } else { "no" });

    if statistics.detailed.is_empty() {
        return;
    }

    println!();
    for site in &statistics.detailed {
        let status = site
            .status
            .map(|s| s.to_string())
            .unwrap_or_else(|| "NOT INDEXED".to_string());
        println!("{} ({})", site.name, site.url);
        println!("  Status:  {} at {}", status, format_time(site.status_time));
        println!("  Pages:   {}", site.pages);
        println!("  Lemmas:  {}", site.lemmas);
        if let Some(error) = &site.error {
            println!("  Error:   {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(None), "never");
        assert_ne!(format_time(Some(0)), "never");
    }
}
