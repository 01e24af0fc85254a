//! Full-text index.
//!
//! The text index maps normalized tokens to the entries containing them,
//! with per-entry term frequencies used for ranking:
//! - Tokenization (whitespace, punctuation splitting)
//! - Case-insensitive matching (configurable)
//! - Prefix terms (`rust*`)
//! - Multi-token queries (OR semantics, scored by summed term frequency)

use crate::index::entry::Slot;
use std::collections::{HashMap, HashSet};

/// Configuration for the text tokenizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenizerConfig {
    /// Minimum token length to index.
    pub min_token_length: usize,
    /// Maximum token length to index.
    pub max_token_length: usize,
    /// Whether to perform case-insensitive matching.
    pub case_insensitive: bool,
    /// Additional characters to treat as separators.
    pub extra_separators: Vec<char>,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            min_token_length: 1,
            max_token_length: 256,
            case_insensitive: true,
            extra_separators: vec![],
        }
    }
}

impl TokenizerConfig {
    /// Creates a new tokenizer configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets minimum token length.
    #[must_use]
    pub fn min_length(mut self, len: usize) -> Self {
        self.min_token_length = len;
        self
    }

    /// Sets maximum token length.
    #[must_use]
    pub fn max_length(mut self, len: usize) -> Self {
        self.max_token_length = len;
        self
    }

    /// Sets case sensitivity.
    #[must_use]
    pub fn case_sensitive(mut self) -> Self {
        self.case_insensitive = false;
        self
    }

    /// Adds extra separator characters.
    #[must_use]
    pub fn with_separators(mut self, chars: &[char]) -> Self {
        self.extra_separators.extend_from_slice(chars);
        self
    }
}

/// Token frequencies of one entry.
pub(crate) type TermFreqs = HashMap<String, u32>;

/// One term of a text query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum QueryTerm {
    Exact(String),
    Prefix(String),
}

/// Splits text into normalized tokens.
#[derive(Debug, Clone, Default)]
pub(crate) struct Tokenizer {
    config: TokenizerConfig,
}

impl Tokenizer {
    pub(crate) fn new(config: TokenizerConfig) -> Self {
        Self { config }
    }

    fn is_separator(&self, c: char) -> bool {
        c.is_whitespace() || c.is_ascii_punctuation() || self.config.extra_separators.contains(&c)
    }

    fn normalize(&self, token: &str) -> Option<String> {
        let len = token.chars().count();
        if token.is_empty()
            || len < self.config.min_token_length
            || len > self.config.max_token_length
        {
            return None;
        }
        Some(if self.config.case_insensitive {
            token.to_lowercase()
        } else {
            token.to_string()
        })
    }

    pub(crate) fn tokenize(&self, text: &str) -> Vec<String> {
        text.split(|c: char| self.is_separator(c))
            .filter_map(|token| self.normalize(token))
            .collect()
    }

    /// Counts token occurrences over every fragment.
    pub(crate) fn term_frequencies(&self, fragments: &[String]) -> TermFreqs {
        let mut freqs = TermFreqs::new();
        for fragment in fragments {
            for token in self.tokenize(fragment) {
                *freqs.entry(token).or_insert(0) += 1;
            }
        }
        freqs
    }

    /// Parses a text query.
    ///
    /// A word ending in `*` becomes a prefix term; everything else is
    /// tokenized like indexed text.
    pub(crate) fn query_terms(&self, query: &str) -> Vec<QueryTerm> {
        let mut terms = Vec::new();
        for word in query.split_whitespace() {
            if let Some(prefix) = word.strip_suffix('*') {
                let mut tokens = self.tokenize(prefix);
                let last = tokens.pop();
                terms.extend(tokens.into_iter().map(QueryTerm::Exact));
                if let Some(last) = last {
                    terms.push(QueryTerm::Prefix(last));
                }
            } else {
                terms.extend(self.tokenize(word).into_iter().map(QueryTerm::Exact));
            }
        }
        let mut seen = HashSet::new();
        terms.retain(|term| seen.insert(term.clone()));
        terms
    }
}

/// Inverted index over the text of one type.
#[derive(Debug, Default)]
pub(crate) struct TextIndex {
    /// Inverted index: token → slot → occurrences.
    inverted: HashMap<String, HashMap<Slot, u32>>,
    /// Forward index: slot → token frequencies (for updates).
    forward: HashMap<Slot, TermFreqs>,
}

impl TextIndex {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn entry_count(&self) -> usize {
        self.forward.len()
    }

    pub(crate) fn unique_token_count(&self) -> usize {
        self.inverted.len()
    }

    /// Indexes the terms of a slot, replacing what it held before.
    pub(crate) fn insert(&mut self, slot: Slot, terms: TermFreqs) {
        self.remove(slot);
        if terms.is_empty() {
            return;
        }
        for (token, count) in &terms {
            self.inverted
                .entry(token.clone())
                .or_default()
                .insert(slot, *count);
        }
        self.forward.insert(slot, terms);
    }

    pub(crate) fn remove(&mut self, slot: Slot) -> Option<TermFreqs> {
        let terms = self.forward.remove(&slot)?;
        for token in terms.keys() {
            if let Some(slots) = self.inverted.get_mut(token) {
                slots.remove(&slot);
                if slots.is_empty() {
                    self.inverted.remove(token);
                }
            }
        }
        Some(terms)
    }

    /// Returns the terms indexed for a slot.
    pub(crate) fn terms(&self, slot: Slot) -> Option<&TermFreqs> {
        self.forward.get(&slot)
    }

    /// Scores every slot matching at least one term.
    ///
    /// The score is the summed frequency of the distinct index tokens the
    /// terms match; a token matched by several terms counts once.
    pub(crate) fn search(&self, terms: &[QueryTerm]) -> HashMap<Slot, u32> {
        let mut matched: HashSet<&str> = HashSet::new();
        for term in terms {
            match term {
                QueryTerm::Exact(token) => {
                    if let Some((token, _)) = self.inverted.get_key_value(token) {
                        matched.insert(token);
                    }
                }
                QueryTerm::Prefix(prefix) => matched.extend(
                    self.inverted
                        .keys()
                        .filter(|token| token.starts_with(prefix.as_str()))
                        .map(String::as_str),
                ),
            }
        }

        let mut scores: HashMap<Slot, u32> = HashMap::new();
        for token in matched {
            if let Some(slots) = self.inverted.get(token) {
                for (slot, count) in slots {
                    *scores.entry(*slot).or_insert(0) += count;
                }
            }
        }
        scores
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenizer() -> Tokenizer {
        Tokenizer::new(TokenizerConfig::default())
    }

    fn indexed(texts: &[&str]) -> (Tokenizer, TextIndex) {
        let tokenizer = tokenizer();
        let mut index = TextIndex::new();
        for (slot, text) in texts.iter().enumerate() {
            index.insert(slot, tokenizer.term_frequencies(&[text.to_string()]));
        }
        (tokenizer, index)
    }

    #[test]
    fn tokenize_with_punctuation() {
        let tokens = tokenizer().tokenize("Hello, World! How are you?");
        assert_eq!(tokens, vec!["hello", "world", "how", "are", "you"]);
    }

    #[test]
    fn tokenize_case_sensitive() {
        let tokenizer = Tokenizer::new(TokenizerConfig::new().case_sensitive());
        assert_eq!(tokenizer.tokenize("Hello World HELLO"), vec!["Hello", "World", "HELLO"]);
    }

    #[test]
    fn tokenize_min_length_and_separators() {
        let tokenizer = Tokenizer::new(TokenizerConfig::new().min_length(3).with_separators(&['|']));
        assert_eq!(tokenizer.tokenize("I am|a robot"), vec!["robot"]);
    }

    #[test]
    fn term_frequencies_count_repeats() {
        let freqs = tokenizer().term_frequencies(&["rust rust".into(), "Rust go".into()]);
        assert_eq!(freqs.get("rust"), Some(&3));
        assert_eq!(freqs.get("go"), Some(&1));
    }

    #[test]
    fn query_terms_with_prefix() {
        let terms = tokenizer().query_terms("Hello rus*");
        assert_eq!(
            terms,
            vec![QueryTerm::Exact("hello".into()), QueryTerm::Prefix("rus".into())]
        );
    }

    #[test]
    fn search_scores_by_frequency() {
        let (tokenizer, index) = indexed(&["rust rust rust", "rust is great", "go is fine"]);
        let scores = index.search(&tokenizer.query_terms("rust great"));
        assert_eq!(scores.get(&0), Some(&3));
        assert_eq!(scores.get(&1), Some(&2));
        assert_eq!(scores.get(&2), None);
    }

    #[test]
    fn repeated_terms_count_once() {
        let (tokenizer, index) = indexed(&["rust", "data data"]);
        assert_eq!(
            tokenizer.query_terms("rust data rust"),
            vec![QueryTerm::Exact("rust".into()), QueryTerm::Exact("data".into())]
        );
        let scores = index.search(&tokenizer.query_terms("rust data rust"));
        assert_eq!(scores.get(&0), Some(&1));
        assert_eq!(scores.get(&1), Some(&2));
    }

    #[test]
    fn prefix_overlapping_exact_term_counts_once() {
        let (tokenizer, index) = indexed(&["rust", "rusty rust"]);
        let scores = index.search(&tokenizer.query_terms("rust rust*"));
        assert_eq!(scores.get(&0), Some(&1));
        assert_eq!(scores.get(&1), Some(&2));
    }

    #[test]
    fn search_prefix() {
        let (tokenizer, index) = indexed(&["rust", "rusty", "ruby"]);
        let scores = index.search(&tokenizer.query_terms("rus*"));
        assert_eq!(scores.len(), 2);
        assert!(scores.contains_key(&0) && scores.contains_key(&1));
    }

    #[test]
    fn reinsert_replaces_terms() {
        let (tokenizer, mut index) = indexed(&["Hello world"]);
        index.insert(0, tokenizer.term_frequencies(&["Goodbye world".into()]));

        assert!(index.search(&tokenizer.query_terms("hello")).is_empty());
        assert_eq!(index.search(&tokenizer.query_terms("goodbye")).len(), 1);
        assert_eq!(index.unique_token_count(), 2);
    }

    #[test]
    fn remove_cleans_inverted_lists() {
        let (tokenizer, mut index) = indexed(&["Hello world", "World of rust"]);
        assert!(index.remove(0).is_some());
        assert!(index.remove(0).is_none());

        assert!(index.search(&tokenizer.query_terms("hello")).is_empty());
        assert_eq!(index.search(&tokenizer.query_terms("world")).len(), 1);
        assert_eq!(index.entry_count(), 1);
    }

    #[test]
    fn empty_query_matches_nothing() {
        let (tokenizer, index) = indexed(&["Hello world"]);
        assert!(index.search(&tokenizer.query_terms("   ")).is_empty());
    }

    #[test]
    fn unicode_text() {
        let (tokenizer, index) = indexed(&["こんにちは世界", "Привет мир"]);
        let scores = index.search(&tokenizer.query_terms("привет"));
        assert_eq!(scores.len(), 1);
        assert!(scores.contains_key(&1));
    }
}
