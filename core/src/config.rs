//! Engine configuration.
//!
//! Compile-time limits live here as constants. Everything tunable at runtime is a
//! plain serde struct with defaults, so a partial JSON file only overrides what it names.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Hard cap on the number of results a single search returns.
pub const MAX_RESULTS: usize = 1000;

/// Largest edit distance a fuzzy leaf may use.
pub const MAX_FUZZY_EDITS: u8 = 2;

/// Edit distance used by `term~` without an explicit number.
pub const DEFAULT_FUZZY_EDITS: u8 = 2;

/// Number of terms a More-Like-This query keeps.
pub const DEFAULT_MAX_QUERY_TERMS: usize = 25;

/// Stored keyword field holding a document's category.
pub const DEFAULT_CATEGORY_FIELD: &str = "type";

/// Deepest group nesting the query parser accepts.
pub const MAX_QUERY_DEPTH: usize = 64;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub analyzer: AnalyzerConfig,
    pub search: SearchConfig,
    pub more_like_this: MoreLikeThisConfig,
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::InvalidConfig(format!("{}: {e}", path.display())))?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<()> {
        self.search.validate()?;
        self.more_like_this.validate()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Replaces the English stop list when set. An empty list disables stop words.
    pub stop_words: Option<Vec<String>>,
    /// English Snowball stemming of every token.
    pub stem: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefaultOperator {
    And,
    #[default]
    Or,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Field used by query clauses without a `field:` prefix.
    pub default_field: String,
    pub default_operator: DefaultOperator,
    /// Result limit; `None` means up to `MAX_RESULTS`.
    pub limit: Option<usize>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { default_field: "text".to_string(), default_operator: DefaultOperator::Or, limit: None }
    }
}

impl SearchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.default_field.trim().is_empty() {
            return Err(Error::InvalidConfig("search.default_field must not be empty".into()));
        }
        if self.limit == Some(0) {
            return Err(Error::InvalidConfig("search.limit must be at least 1".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MoreLikeThisConfig {
    /// Tokens seen fewer times than this in the reference text are ignored.
    pub min_term_freq: u32,
    /// Tokens found in fewer documents than this are ignored.
    pub min_doc_freq: u32,
    /// Tokens found in more documents than this are ignored.
    pub max_doc_freq: Option<u32>,
    pub max_query_terms: usize,
    /// Token length bounds in characters; 0 disables the bound.
    pub min_word_len: usize,
    pub max_word_len: usize,
    /// Boost each term clause by its weight relative to the best term.
    pub boost: bool,
    pub category_field: String,
}

impl Default for MoreLikeThisConfig {
    fn default() -> Self {
        Self {
            min_term_freq: 1,
            min_doc_freq: 1,
            max_doc_freq: None,
            max_query_terms: DEFAULT_MAX_QUERY_TERMS,
            min_word_len: 0,
            max_word_len: 0,
            boost: false,
            category_field: DEFAULT_CATEGORY_FIELD.to_string(),
        }
    }
}

impl MoreLikeThisConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_query_terms == 0 {
            return Err(Error::InvalidConfig("more_like_this.max_query_terms must be at least 1".into()));
        }
        if self.max_word_len > 0 && self.min_word_len > self.max_word_len {
            return Err(Error::InvalidConfig(format!(
                "more_like_this.min_word_len ({}) exceeds max_word_len ({})",
                self.min_word_len, self.max_word_len
            )));
        }
        if let Some(max) = self.max_doc_freq {
            if max < self.min_doc_freq {
                return Err(Error::InvalidConfig(format!(
                    "more_like_this.max_doc_freq ({max}) is below min_doc_freq ({})",
                    self.min_doc_freq
                )));
            }
        }
        if self.category_field.trim().is_empty() {
            return Err(Error::InvalidConfig("more_like_this.category_field must not be empty".into()));
        }
        Ok(())
    }
}
