//! Per-page lemma ranks
//!
//! The rank of a lemma on a page is a weighted occurrence count:
//!
//! ```text
//! rank = body_count * body_weight
//!      + title_count * title_weight
//!      + heading_count * heading_weight
//! ```
//!
//! Headings are part of the body, so a heading word counts in both terms.
//! With the default weights a word that only appears in running text gets
//! its plain occurrence count. Sections weighted zero contribute no lemmas.

use crate::config::RankConfig;
use crate::lemma::Lemmatizer;
use crate::parse::ParsedPage;
use std::collections::HashMap;

/// Lemma to rank on one page
pub type LemmaRanks = HashMap<String, f64>;

/// Weighted occurrence scorer
#[derive(Debug, Clone, Copy)]
pub struct RankScorer {
    title_weight: f64,
    heading_weight: f64,
    body_weight: f64,
}

impl RankScorer {
    pub fn new(config: &RankConfig) -> Self {
        Self {
            title_weight: f64::from(config.title_weight),
            heading_weight: f64::from(config.heading_weight),
            body_weight: f64::from(config.body_weight),
        }
    }

    /// Ranks of every lemma found on the page
    pub fn score(&self, lemmatizer: &Lemmatizer, page: &ParsedPage) -> LemmaRanks {
        let mut ranks = LemmaRanks::new();

        let mut add = |text: &str, weight: f64| {
            if weight <= 0.0 {
                return;
            }
            for (lemma, count) in lemmatizer.extract_lemmas(text) {
                *ranks.entry(lemma).or_insert(0.0) += count as f64 * weight;
            }
        };

        add(&page.whole_text, self.body_weight);
        if let Some(title) = &page.title {
            add(title, self.title_weight);
        }
        add(&page.headings.join("\n"), self.heading_weight);

        ranks
    }
}

impl Default for RankScorer {
    fn default() -> Self {
        Self::new(&RankConfig::default())
    }
}
