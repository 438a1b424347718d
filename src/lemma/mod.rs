//! Lemmatization: raw text to normalized term frequencies
//!
//! This module handles:
//! - Stripping tokens to their searchable core
//! - Discarding function words (prepositions, conjunctions, particles, ...)
//! - Normalizing words with the first analyzer that recognizes them
//! - Counting normal forms ("lemmas") per text

mod analyzer;
mod dictionary;

pub use analyzer::*;

use crate::parse::html_to_text;
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Lemma to occurrence count
pub type LemmaCounts = HashMap<String, usize>;

fn core_regex() -> &'static Regex {
    static CORE: OnceLock<Regex> = OnceLock::new();
    CORE.get_or_init(|| {
        Regex::new(
            r"^[^a-zA-Zа-яёА-ЯЁ\d]*(?P<word>[a-zA-Zа-яёА-ЯЁ]+|[а-яёА-ЯЁ]+[а-яёА-ЯЁ\-]*[а-яёА-ЯЁ]+)[^a-zA-Zа-яёА-ЯЁ\d]*$",
        )
        .expect("word core pattern is valid")
    })
}

/// Strip leading/trailing punctuation from a token
///
/// Returns the letter run the token is built around, keeping internal
/// hyphens of Cyrillic words. Tokens with digits, mixed scripts or
/// punctuation inside the word have no core.
pub fn searchable_core(token: &str) -> Option<&str> {
    core_regex()
        .captures(token)
        .and_then(|caps| caps.name("word"))
        .map(|m| m.as_str())
}

/// Turns text into lemma frequencies
pub struct Lemmatizer {
    analyzers: Vec<Box<dyn MorphAnalyzer>>,
}

impl Lemmatizer {
    /// Lemmatizer for Russian and English, tried in that order
    pub fn new() -> Self {
        Self::with_analyzers(vec![
            Box::new(RussianAnalyzer::new()),
            Box::new(EnglishAnalyzer::new()),
        ])
    }

    pub fn with_analyzers(analyzers: Vec<Box<dyn MorphAnalyzer>>) -> Self {
        Self { analyzers }
    }

    fn analyzer_for(&self, word: &str) -> Option<&dyn MorphAnalyzer> {
        self.analyzers
            .iter()
            .find(|a| a.recognizes(word))
            .map(|a| a.as_ref())
    }

    /// Normal form of a word, whether or not it is a function word
    pub fn normalize(&self, word: &str) -> Option<String> {
        let word = word.to_lowercase();
        self.analyzer_for(&word).map(|a| a.normalize(&word))
    }

    /// Whether a word is recognized and carries meaning of its own
    pub fn is_significant(&self, word: &str) -> bool {
        let word = word.to_lowercase();
        self.analyzer_for(&word)
            .is_some_and(|a| !a.tags(&word).iter().any(|t| t.is_function_word()))
    }

    /// Lemma of an already stripped word
    ///
    /// `None` when no analyzer recognizes the word or when it is a
    /// function word.
    pub fn lemma_of(&self, core: &str) -> Option<String> {
        if core.is_empty() || !self.is_significant(core) {
            return None;
        }
        self.normalize(core)
    }

    /// Lemma of a raw token (stripping punctuation first)
    pub fn lemma_of_token(&self, token: &str) -> Option<String> {
        searchable_core(token).and_then(|core| self.lemma_of(core))
    }

    /// Count lemmas in plain text
    pub fn extract_lemmas(&self, text: &str) -> LemmaCounts {
        let mut lemmas = LemmaCounts::new();
        for token in text.split_whitespace() {
            if let Some(lemma) = self.lemma_of_token(token) {
                *lemmas.entry(lemma).or_insert(0) += 1;
            }
        }
        lemmas
    }

    /// Count lemmas in an HTML document's visible text
    pub fn extract_lemmas_from_html(&self, html: &str) -> LemmaCounts {
        self.extract_lemmas(&html_to_text(html))
    }
}

impl Default for Lemmatizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_searchable_core() {
        assert_eq!(searchable_core("«Привет,»"), Some("Привет"));
        assert_eq!(searchable_core("(fox)."), Some("fox"));
        assert_eq!(searchable_core("пол-года!"), Some("пол-года"));
        assert_eq!(searchable_core("abc123"), None);
        assert_eq!(searchable_core("hello-world"), None);
        assert_eq!(searchable_core("—"), None);
        assert_eq!(searchable_core(""), None);
    }

    #[test]
    fn test_extract_lemmas_counts_inflections_together() {
        let lemmatizer = Lemmatizer::new();
        let lemmas = lemmatizer.extract_lemmas(
            "Повторное появление леопарда в Осетии позволяет предположить, \
             что леопард постоянно обитает в некоторых районах Северного Кавказа.",
        );

        let leopard = RussianAnalyzer::new().normalize("леопард");
        assert_eq!(lemmas.get(&leopard), Some(&2));
        // "в" and "что" are function words
        assert!(!lemmas.contains_key("в"));
        assert!(!lemmas.contains_key("что"));
    }

    #[test]
    fn test_counts_sum_to_surviving_tokens() {
        let lemmatizer = Lemmatizer::new();
        let text = "The cats and the dogs were running, with 42 birds!";
        let lemmas = lemmatizer.extract_lemmas(text);

        // surviving: the, cats, the, dogs, running, birds
        let total: usize = lemmas.values().sum();
        assert_eq!(total, 6);
        assert_eq!(lemmas.get("the"), Some(&2));
        assert_eq!(lemmas.get("cat"), Some(&1));
        assert!(!lemmas.contains_key("and"));
        assert!(!lemmas.contains_key("were"));
        assert!(!lemmas.contains_key("with"));
    }

    #[test]
    fn test_mixed_script_tokens_are_skipped() {
        let lemmatizer = Lemmatizer::new();
        let lemmas = lemmatizer.extract_lemmas("abcабв x1 ...");
        assert!(lemmas.is_empty());
    }

    #[test]
    fn test_extract_lemmas_from_html() {
        let lemmatizer = Lemmatizer::new();
        let html = "<html><head><title>Fox</title><style>p { color: red }</style></head>\
                    <body><p>quick</p><p>fox</p><script>var fox = 1;</script></body></html>";
        let lemmas = lemmatizer.extract_lemmas_from_html(html);
        assert_eq!(lemmas.get("fox"), Some(&2));
        assert_eq!(lemmas.get("quick"), Some(&1));
        assert!(!lemmas.contains_key("color"));
        assert!(!lemmas.contains_key("var"));
    }

    #[test]
    fn test_significance_and_normal_form() {
        let lemmatizer = Lemmatizer::new();
        assert!(lemmatizer.is_significant("Foxes"));
        assert!(!lemmatizer.is_significant("and"));
        assert!(!lemmatizer.is_significant("В"));
        assert!(!lemmatizer.is_significant("x1"));
        assert_eq!(lemmatizer.normalize("Foxes").as_deref(), Some("fox"));
        assert_eq!(lemmatizer.normalize("and").as_deref(), Some("and"));
        assert_eq!(lemmatizer.lemma_of("and"), None);
    }

    #[test]
    fn test_extract_is_deterministic() {
        let lemmatizer = Lemmatizer::new();
        let text = "Дом домов домами house houses";
        assert_eq!(lemmatizer.extract_lemmas(text), lemmatizer.extract_lemmas(text));
    }
}
