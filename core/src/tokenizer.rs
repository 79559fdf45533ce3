use crate::config::AnalyzerConfig;
use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::HashSet;
use std::fmt;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref RE: Regex = Regex::new(r"[\p{L}\p{M}\p{N}]+").expect("valid regex");
}

/// The classic English analyzer stop list.
pub const ENGLISH_STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "if", "in", "into", "is", "it",
    "no", "not", "of", "on", "or", "such", "that", "the", "their", "then", "there", "these",
    "they", "this", "to", "was", "will", "with",
];

/// Case-insensitive stop-word set. Entries are stored NFKC-normalized and lowercased,
/// the same way tokens are, so lookups compare like with like.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StopWords {
    words: HashSet<String>,
}

impl StopWords {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let words = words
            .into_iter()
            .map(|w| w.as_ref().trim().nfkc().collect::<String>().to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();
        Self { words }
    }

    pub fn none() -> Self { Self::default() }

    pub fn english() -> Self { Self::new(ENGLISH_STOP_WORDS.iter()) }

    /// `token` must already be lowercased.
    pub fn contains(&self, token: &str) -> bool { self.words.contains(token) }

    pub fn len(&self) -> usize { self.words.len() }

    pub fn is_empty(&self) -> bool { self.words.is_empty() }
}

/// Tokenize text into (term, position) using NFKC normalization, lowercasing and stop-word removal.
/// Positions count every word, removed stop words included, so phrase gaps survive.
pub fn tokenize_with_positions(text: &str, stop_words: &StopWords) -> Vec<(String, u32)> {
    let normalized = text.nfkc().collect::<String>().to_lowercase();
    let mut tokens = Vec::new();
    for (pos, mat) in RE.find_iter(&normalized).enumerate() {
        let token = mat.as_str();
        if stop_words.contains(token) { continue; }
        tokens.push((token.to_string(), pos as u32));
    }
    tokens
}

pub fn tokenize(text: &str, stop_words: &StopWords) -> Vec<String> {
    tokenize_with_positions(text, stop_words).into_iter().map(|(t, _)| t).collect()
}

/// Absent text has no tokens.
pub fn tokenize_opt(text: Option<&str>, stop_words: &StopWords) -> Vec<String> {
    text.map(|t| tokenize(t, stop_words)).unwrap_or_default()
}

/// Tokenizer plus the per-index options layered on top of it. Indexing and querying
/// must go through the same analyzer for terms to line up.
pub struct Analyzer {
    stop_words: StopWords,
    stemmer: Option<Stemmer>,
}

impl Analyzer {
    pub fn new(config: &AnalyzerConfig) -> Self {
        let stop_words = match &config.stop_words {
            Some(words) => StopWords::new(words),
            None => StopWords::english(),
        };
        let stemmer = config.stem.then(|| Stemmer::create(Algorithm::English));
        Self { stop_words, stemmer }
    }

    pub fn stop_words(&self) -> &StopWords { &self.stop_words }

    pub fn stems(&self) -> bool { self.stemmer.is_some() }

    pub fn analyze(&self, text: &str) -> Vec<(String, u32)> {
        let tokens = tokenize_with_positions(text, &self.stop_words);
        match &self.stemmer {
            Some(stemmer) => tokens
                .into_iter()
                .map(|(t, pos)| (stemmer.stem(&t).into_owned(), pos))
                .collect(),
            None => tokens,
        }
    }

    pub fn analyze_terms(&self, text: &str) -> Vec<String> {
        self.analyze(text).into_iter().map(|(t, _)| t).collect()
    }
}

impl Default for Analyzer {
    fn default() -> Self { Self::new(&AnalyzerConfig::default()) }
}

impl fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Analyzer")
            .field("stop_words", &self.stop_words.len())
            .field("stem", &self.stems())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_splits_on_punctuation() {
        let t = tokenize("Access-Control: ROLE_based, v2!", &StopWords::none());
        assert_eq!(t, vec!["access", "control", "role", "based", "v2"]);
    }

    #[test]
    fn stop_words_are_case_insensitive() {
        let stop = StopWords::new(["The", "AND"]);
        let t = tokenize("THE fox and The hound", &stop);
        assert_eq!(t, vec!["fox", "hound"]);
    }

    #[test]
    fn positions_keep_gaps_for_removed_words() {
        let t = tokenize_with_positions("the quick fox", &StopWords::english());
        assert_eq!(t, vec![("quick".to_string(), 1), ("fox".to_string(), 2)]);
    }

    #[test]
    fn empty_and_absent_input() {
        assert!(tokenize("", &StopWords::english()).is_empty());
        assert!(tokenize("  ,;  ", &StopWords::english()).is_empty());
        assert!(tokenize_opt(None, &StopWords::english()).is_empty());
    }

    #[test]
    fn unicode_words_stay_whole() {
        let t = tokenize("Café Ünïcode naïve 東京", &StopWords::none());
        assert_eq!(t, vec!["café", "ünïcode", "naïve", "東京"]);
    }

    #[test]
    fn stemming_is_opt_in() {
        let plain = Analyzer::default();
        assert_eq!(plain.analyze_terms("running controls"), vec!["running", "controls"]);

        let stemming = Analyzer::new(&AnalyzerConfig { stem: true, ..Default::default() });
        assert_eq!(stemming.analyze_terms("running controls"), vec!["run", "control"]);
    }

    #[test]
    fn custom_stop_list_replaces_default() {
        let analyzer = Analyzer::new(&AnalyzerConfig { stop_words: Some(vec!["fox".into()]), ..Default::default() });
        assert_eq!(analyzer.analyze_terms("the fox"), vec!["the"]);
    }
}
