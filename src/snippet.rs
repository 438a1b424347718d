//! Highlighted excerpts of page text
//!
//! Query hits are wrapped in `<b>`, surrounded by up to `words_range`
//! context words, and gaps are marked with `...`. Once the excerpt grows
//! past [`SNIPPET_SPOILER_THRESHOLD`] characters the remaining hits go
//! into a collapsed `<details>` section. Page text is HTML-escaped.

use crate::lemma::{searchable_core, Lemmatizer};
use std::collections::HashSet;

/// Excerpt length (in characters) after which hits are folded away
pub const SNIPPET_SPOILER_THRESHOLD: usize = 270;

const ELLIPSIS: &str = "...";
const OPEN_HIT: &str = "<b>";
const CLOSE_HIT: &str = "</b>";
const OPEN_SPOILER: &str = "<details>";
const CLOSE_SPOILER: &str = "</details>";

/// Builds snippets for a fixed context window
pub struct SnippetBuilder<'a> {
    lemmatizer: &'a Lemmatizer,
    words_range: usize,
}

/// Per-line cursor
struct LineState<'l> {
    words: Vec<&'l str>,
    /// Positions (in `words`) of words that have a lemma
    significant: Vec<usize>,
    /// Index into `significant` of the last hit
    last_hit: Option<usize>,
    /// Position of the last word written to the snippet
    last_emitted: Option<usize>,
}

impl<'a> SnippetBuilder<'a> {
    pub fn new(lemmatizer: &'a Lemmatizer, words_range: usize) -> Self {
        Self {
            lemmatizer,
            words_range,
        }
    }

    /// Build an HTML excerpt of `text` highlighting words whose lemma is in `lemmas`
    pub fn build(&self, text: &str, lemmas: &HashSet<String>) -> String {
        if text.trim().is_empty() {
            return String::new();
        }

        let mut snippet = String::new();
        let mut spoiler_open = false;

        for line in text.split(|c: char| c == '\r' || c == '\n') {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            self.add_line(line, lemmas, &mut snippet, &mut spoiler_open);
        }

        if spoiler_open {
            snippet.push_str(CLOSE_SPOILER);
        }

        snippet.trim().to_string()
    }

    fn add_line(
        &self,
        line: &str,
        lemmas: &HashSet<String>,
        snippet: &mut String,
        spoiler_open: &mut bool,
    ) {
        let mut state = LineState {
            words: line.split_whitespace().collect(),
            significant: Vec::new(),
            last_hit: None,
            last_emitted: None,
        };

        for pos in 0..state.words.len() {
            let word = state.words[pos];
            let Some(core) = searchable_core(word) else {
                continue;
            };
            let Some(lemma) = self.lemmatizer.lemma_of(core) else {
                continue;
            };

            let significant_index = state.significant.len();
            state.significant.push(pos);

            if !lemmas.contains(&lemma) {
                self.add_context(snippet, &mut state, pos);
                continue;
            }

            if !*spoiler_open && snippet.chars().count() > SNIPPET_SPOILER_THRESHOLD {
                snippet.push_str(OPEN_SPOILER);
                *spoiler_open = true;
            }
            let may_merge = self.add_lead_in(snippet, &state, pos);
            add_hit(snippet, &state, pos, core, may_merge);

            state.last_emitted = Some(pos);
            state.last_hit = Some(significant_index);
        }

        if state.last_emitted != Some(state.words.len() - 1)
            && snippet.len() >= ELLIPSIS.len()
            && !snippet.ends_with(ELLIPSIS)
        {
            snippet.push(' ');
            snippet.push_str(ELLIPSIS);
        }
    }

    /// Emit a non-hit word if it falls into the window after the last hit
    fn add_context(&self, snippet: &mut String, state: &mut LineState<'_>, pos: usize) {
        let Some(last_hit) = state.last_hit else {
            return;
        };
        let current = state.significant.len() - 1;
        let window_end = last_hit + self.words_range;

        if current <= window_end {
            let hit_pos = state.significant[last_hit];
            let start = state.last_emitted.map_or(hit_pos, |e| e.max(hit_pos)) + 1;
            for word in &state.words[start..=pos] {
                push_word(snippet, word);
            }
            state.last_emitted = Some(pos);
        } else if current == window_end + 1 {
            snippet.push(' ');
            snippet.push_str(ELLIPSIS);
        }
    }

    /// Emit the ellipsis and preceding context before a hit
    ///
    /// Returns whether the hit directly follows the previous one, so its
    /// emphasis can be merged.
    fn add_lead_in(&self, snippet: &mut String, state: &LineState<'_>, pos: usize) -> bool {
        if pos == 0 {
            return true;
        }

        if state.last_hit.is_none() && !snippet.ends_with(ELLIPSIS) {
            snippet.push_str(ELLIPSIS);
        }

        let contiguous = state.last_emitted.is_some_and(|e| e + 1 >= pos);
        if contiguous {
            return true;
        }

        let current = state.significant.len() - 1;
        let mut start = state.significant[current.saturating_sub(self.words_range)];
        if let Some(e) = state.last_emitted {
            start = start.max(e + 1);
        }
        for word in &state.words[start..pos] {
            push_word(snippet, word);
        }
        false
    }
}

/// Emit a hit, keeping punctuation around its core outside the emphasis
fn add_hit(snippet: &mut String, state: &LineState<'_>, pos: usize, core: &str, may_merge: bool) {
    let word = state.words[pos];
    let before = snippet.len();
    let mut merge = may_merge
        && state
            .last_hit
            .is_some_and(|h| state.significant[h] + 1 == pos)
        && snippet.ends_with(CLOSE_HIT);

    snippet.push(' ');

    let prefix_end = word.find(core).unwrap_or(0);
    if prefix_end > 0 {
        snippet.push_str(&escape_html(&word[..prefix_end]));
        merge = false;
    }

    if merge {
        snippet.replace_range(before - CLOSE_HIT.len()..before, "");
    } else {
        snippet.push_str(OPEN_HIT);
    }

    snippet.push_str(&escape_html(core));
    snippet.push_str(CLOSE_HIT);

    let postfix_start = prefix_end + core.len();
    if postfix_start < word.len() {
        snippet.push_str(&escape_html(&word[postfix_start..]));
    }
}

fn push_word(snippet: &mut String, word: &str) {
    snippet.push(' ');
    snippet.push_str(&escape_html(word));
}

/// Escape text for inclusion in HTML
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
