use crate::document::{Document, FieldKind, FieldValue, StoredDocument, StoredField};
use crate::error::{Error, Result};
use crate::normalize::{Passthrough, TextNormalizer};
use crate::tokenizer::Analyzer;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

pub type DocId = u32;

/// Index key: a token within a field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Term {
    pub field: String,
    pub token: String,
}

impl Term {
    pub fn new(field: impl Into<String>, token: impl Into<String>) -> Self {
        Self { field: field.into(), token: token.into() }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}:{}", self.field, self.token) }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub doc_id: DocId,
    pub term_frequency: u32,
    /// Token positions within the field, ascending.
    pub positions: Vec<u32>,
}

/// Dictionary entry for one term. `doc_freq` always equals `postings.len()`:
/// both are only ever touched together in `FieldIndex::push`.
#[derive(Debug, Clone, Default)]
pub struct TermInfo {
    pub doc_freq: u32,
    pub postings: Vec<Posting>, // sorted by doc_id
}

#[derive(Debug, Clone)]
struct FieldIndex {
    kind: FieldKind,
    terms: BTreeMap<String, TermInfo>,
}

impl FieldIndex {
    fn new(kind: FieldKind) -> Self { Self { kind, terms: BTreeMap::new() } }

    /// Records the first and only occurrence of `token` for `doc_id`. Ids grow
    /// monotonically so appending keeps postings sorted.
    fn push(&mut self, doc_id: DocId, token: String, positions: Vec<u32>) {
        let info = self.terms.entry(token).or_default();
        info.doc_freq += 1;
        info.postings.push(Posting { doc_id, term_frequency: positions.len() as u32, positions });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub num_docs: u32,
    pub num_fields: usize,
    pub num_terms: usize,
    pub num_postings: usize,
}

/// Append-only in-memory inverted index. Built once with `add_document`/`build`,
/// then queried through shared references.
pub struct InvertedIndex {
    analyzer: Analyzer,
    normalizer: Arc<dyn TextNormalizer>,
    docs: Vec<StoredDocument>,
    keys: HashMap<String, DocId>,
    fields: BTreeMap<String, FieldIndex>,
}

impl InvertedIndex {
    pub fn new(analyzer: Analyzer) -> Self {
        Self {
            analyzer,
            normalizer: Arc::new(Passthrough),
            docs: Vec::new(),
            keys: HashMap::new(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_normalizer(mut self, normalizer: Arc<dyn TextNormalizer>) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Builds a whole index generation from a document source. The first source error
    /// aborts the build and the partial index is dropped.
    pub fn build<I, E>(analyzer: Analyzer, normalizer: Arc<dyn TextNormalizer>, docs: I) -> std::result::Result<Self, E>
    where
        I: IntoIterator<Item = std::result::Result<Document, E>>,
        E: From<Error>,
    {
        let mut index = Self::new(analyzer).with_normalizer(normalizer);
        for doc in docs {
            index.add_document(doc?)?;
        }
        let stats = index.stats();
        tracing::info!(num_docs = stats.num_docs, num_terms = stats.num_terms, num_fields = stats.num_fields, "index built");
        Ok(index)
    }

    /// Adds a document and returns its id. A field whose kind disagrees with earlier
    /// documents rejects the whole document before anything is recorded.
    pub fn add_document(&mut self, doc: Document) -> Result<DocId> {
        for (name, value) in &doc.fields {
            if let Some(existing) = self.fields.get(name) {
                if existing.kind != value.kind() {
                    return Err(Error::FieldKindMismatch {
                        field: name.clone(),
                        existing: existing.kind.as_str(),
                        supplied: value.kind().as_str(),
                    });
                }
            }
        }

        let doc_id = self.docs.len() as DocId;
        let mut stored = BTreeMap::new();
        for (name, value) in doc.fields {
            let kind = value.kind();
            let text = match value {
                FieldValue::Keyword(v) | FieldValue::Text(v) => v,
                FieldValue::Html(raw) => self.normalizer.normalize(&raw),
            };
            let mut grouped: BTreeMap<String, Vec<u32>> = BTreeMap::new();
            match kind {
                FieldKind::Keyword => { grouped.insert(text.clone(), vec![0]); }
                FieldKind::Text => {
                    for (token, pos) in self.analyzer.analyze(&text) {
                        grouped.entry(token).or_default().push(pos);
                    }
                }
            }
            let field = self.fields.entry(name.clone()).or_insert_with(|| FieldIndex::new(kind));
            for (token, positions) in grouped {
                field.push(doc_id, token, positions);
            }
            stored.insert(name, StoredField { kind, value: text });
        }

        if self.keys.contains_key(&doc.key) {
            tracing::warn!(key = %doc.key, doc_id, "duplicate document key, lookups keep the first");
        } else {
            self.keys.insert(doc.key.clone(), doc_id);
        }
        self.docs.push(StoredDocument { key: doc.key, fields: stored });
        Ok(doc_id)
    }

    pub fn num_docs(&self) -> u32 { self.docs.len() as u32 }

    pub fn analyzer(&self) -> &Analyzer { &self.analyzer }

    pub fn document_frequency(&self, term: &Term) -> u32 {
        self.term_info(term).map_or(0, |info| info.doc_freq)
    }

    pub fn postings(&self, term: &Term) -> &[Posting] {
        self.term_info(term).map(|info| info.postings.as_slice()).unwrap_or(&[])
    }

    pub fn term_info(&self, term: &Term) -> Option<&TermInfo> {
        self.fields.get(&term.field)?.terms.get(&term.token)
    }

    pub fn stored_fields(&self, doc_id: DocId) -> Result<&StoredDocument> {
        self.docs.get(doc_id as usize).ok_or(Error::NotFound(doc_id))
    }

    pub fn doc_id_for_key(&self, key: &str) -> Result<DocId> {
        self.keys.get(key).copied().ok_or_else(|| Error::UnknownKey(key.to_string()))
    }

    pub fn field_kind(&self, field: &str) -> Option<FieldKind> {
        self.fields.get(field).map(|f| f.kind)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.fields.keys().map(String::as_str)
    }

    /// Every token of `field` in ascending order; empty for unknown fields.
    pub fn terms<'a>(&'a self, field: &str) -> Box<dyn Iterator<Item = (&'a str, &'a TermInfo)> + 'a> {
        match self.fields.get(field) {
            Some(f) => Box::new(f.terms.iter().map(|(t, info)| (t.as_str(), info))),
            None => Box::new(std::iter::empty()),
        }
    }

    /// Smoothed inverse document frequency: ln(1 + N / (1 + df)).
    pub fn idf(&self, doc_freq: u32) -> f32 {
        let n = self.num_docs() as f32;
        (1.0 + n / (1.0 + doc_freq as f32)).ln()
    }

    pub fn stats(&self) -> IndexStats {
        let mut num_terms = 0;
        let mut num_postings = 0;
        for field in self.fields.values() {
            num_terms += field.terms.len();
            num_postings += field.terms.values().map(|t| t.postings.len()).sum::<usize>();
        }
        IndexStats { num_docs: self.num_docs(), num_fields: self.fields.len(), num_terms, num_postings }
    }
}

impl Default for InvertedIndex {
    fn default() -> Self { Self::new(Analyzer::default()) }
}

impl fmt::Debug for InvertedIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvertedIndex")
            .field("analyzer", &self.analyzer)
            .field("stats", &self.stats())
            .finish()
    }
}
