//! Morphological analyzers
//!
//! An analyzer decides whether it can handle a word, reports the word's
//! grammatical categories and reduces it to the normal form used as the
//! index key. Normal forms come from the Snowball stemmer of the language;
//! closed-class words are looked up in the tables of [`super::dictionary`].

use super::dictionary::{english_tables, lookup, russian_tables};
use rust_stemmers::{Algorithm, Stemmer};
use serde::Serialize;

/// Grammatical category of a word
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WordTag {
    Preposition,
    Conjunction,
    Particle,
    Interjection,
    /// English forms of "to be"
    AuxiliaryBe,
    /// Any open-class word (noun, verb, adjective, ...)
    Content,
}

impl WordTag {
    /// Function words carry no meaning of their own and are never indexed
    pub fn is_function_word(self) -> bool {
        !matches!(self, WordTag::Content)
    }
}

/// A single-language morphological analyzer
///
/// All methods receive a lower-cased word that already passed
/// [`super::searchable_core`].
pub trait MorphAnalyzer: Send + Sync {
    /// Short language identifier, used in logs
    fn language(&self) -> &'static str;

    /// Whether the word is written in this analyzer's language
    fn recognizes(&self, word: &str) -> bool;

    /// Normal form of a recognized word
    fn normalize(&self, word: &str) -> String;

    /// Grammatical categories of a recognized word
    fn tags(&self, word: &str) -> Vec<WordTag>;
}

/// Russian analyzer (Cyrillic words, internal hyphens allowed)
pub struct RussianAnalyzer {
    stemmer: Stemmer,
}

impl RussianAnalyzer {
    pub fn new() -> Self {
        Self {
            stemmer: Stemmer::create(Algorithm::Russian),
        }
    }
}

impl Default for RussianAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

fn is_cyrillic(c: char) -> bool {
    matches!(c, 'а'..='я' | 'ё')
}

impl MorphAnalyzer for RussianAnalyzer {
    fn language(&self) -> &'static str {
        "ru"
    }

    fn recognizes(&self, word: &str) -> bool {
        !word.is_empty()
            && !word.starts_with('-')
            && !word.ends_with('-')
            && word.chars().all(|c| is_cyrillic(c) || c == '-')
    }

    fn normalize(&self, word: &str) -> String {
        let word = word.replace('ё', "е");
        if !lookup(&word, &russian_tables()).is_empty() {
            return word;
        }
        // Stem every part of a hyphenated compound so "северо-запада"
        // and "северо-запад" share a key.
        word.split('-')
            .map(|part| self.stemmer.stem(part).into_owned())
            .collect::<Vec<_>>()
            .join("-")
    }

    fn tags(&self, word: &str) -> Vec<WordTag> {
        let mut tags = lookup(word, &russian_tables());
        if tags.is_empty() {
            let plain = word.replace('ё', "е");
            tags = lookup(&plain, &russian_tables());
        }
        if tags.is_empty() {
            tags.push(WordTag::Content);
        }
        tags
    }
}

/// English analyzer (ASCII Latin words)
pub struct EnglishAnalyzer {
    stemmer: Stemmer,
}

impl EnglishAnalyzer {
    pub fn new() -> Self {
        Self {
            stemmer: Stemmer::create(Algorithm::English),
        }
    }
}

impl Default for EnglishAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl MorphAnalyzer for EnglishAnalyzer {
    fn language(&self) -> &'static str {
        "en"
    }

    fn recognizes(&self, word: &str) -> bool {
        !word.is_empty() && word.chars().all(|c| c.is_ascii_lowercase())
    }

    fn normalize(&self, word: &str) -> String {
        if !lookup(word, &english_tables()).is_empty() {
            return word.to_string();
        }
        self.stemmer.stem(word).into_owned()
    }

    fn tags(&self, word: &str) -> Vec<WordTag> {
        let mut tags = lookup(word, &english_tables());
        if tags.is_empty() {
            tags.push(WordTag::Content);
        }
        tags
    }
}
