//! In-memory full-text search core: analysis, an append-only inverted index,
//! a boolean/phrase/fuzzy query engine with TF-IDF ranking, and "more like this"
//! query construction.

pub mod config;
pub mod document;
pub mod error;
pub mod index;
pub mod normalize;
pub mod parser;
pub mod query;
pub mod similarity;
pub mod tokenizer;

pub use config::EngineConfig;
pub use document::{Document, FieldKind, FieldValue, StoredDocument, StoredField};
pub use error::{Error, ParseError, Result};
pub use index::{DocId, IndexStats, InvertedIndex, Posting, Term};
pub use normalize::{Passthrough, TagStripper, TextNormalizer};
pub use parser::QueryParser;
pub use query::{Clause, Occur, Query, ScoredResult, SearchResults};
pub use similarity::{InterestingTerm, MoreLikeThis};
pub use tokenizer::{tokenize, Analyzer, StopWords};
