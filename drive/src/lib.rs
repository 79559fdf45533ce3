//! Test drive for the search core: populate an index from record files, run a
//! keyword query, and find documents similar to a reference.

pub mod html;
pub mod source;

use anyhow::{anyhow, bail, Context, Result};
use serde::Serialize;
use sift_core::{
    Analyzer, DocId, EngineConfig, InterestingTerm, InvertedIndex, MoreLikeThis, QueryParser, ScoredResult, StoredDocument,
};
use source::RecordSource;
use std::sync::Arc;
use std::time::Instant;
use time::format_description::well_known::Rfc3339;

pub use html::HtmlNormalizer;
pub use source::{FileSource, Record};

/// Loads the whole snapshot first, then indexes it. Any source or indexing error
/// leaves no index behind.
pub fn build_index(source: &dyn RecordSource, config: &EngineConfig) -> Result<InvertedIndex> {
    let records = source.records()?;
    let docs = records.into_iter().map(|r| Ok::<_, anyhow::Error>(r.into_document()));
    InvertedIndex::build(Analyzer::new(&config.analyzer), Arc::new(HtmlNormalizer), docs)
}

#[derive(Debug, Serialize)]
pub struct Hit {
    pub doc_id: DocId,
    pub key: String,
    pub score: f32,
    pub category: Option<String>,
    pub title: String,
}

impl Hit {
    fn from_result(r: &ScoredResult<'_>, category_field: &str) -> Self {
        Self {
            doc_id: r.doc_id,
            key: r.document.key.clone(),
            score: r.score,
            category: r.document.get(category_field).map(str::to_string),
            title: title_of(r.document),
        }
    }
}

/// "Policy / Section" or "Standard / Component"; falls back to the key.
pub fn title_of(doc: &StoredDocument) -> String {
    let pairs = [("policyName", "sectionName"), ("standardName", "componentName")];
    for (outer, inner) in pairs {
        match (doc.get(outer), doc.get(inner)) {
            (Some(o), Some(i)) => return format!("{o} / {i}"),
            (Some(one), None) | (None, Some(one)) => return one.to_string(),
            (None, None) => {}
        }
    }
    doc.key.clone()
}

fn check_limit(limit: usize) -> Result<()> {
    if limit == 0 {
        bail!("limit must be at least 1");
    }
    Ok(())
}

fn now() -> String { time::OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default() }

#[derive(Debug, Serialize)]
pub struct SearchReport {
    pub query: String,
    pub generated_at: String,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<Hit>,
}

pub fn run_search(index: &InvertedIndex, config: &EngineConfig, query: &str, limit: Option<usize>) -> Result<SearchReport> {
    if let Some(limit) = limit {
        check_limit(limit)?;
    }
    let start = Instant::now();
    let parsed = QueryParser::from_config(index, &config.search)
        .parse(query)
        .with_context(|| format!("invalid query {query:?}"))?;
    let results = index.search(&parsed, limit.or(config.search.limit));
    let category_field = config.more_like_this.category_field.as_str();
    Ok(SearchReport {
        query: parsed.to_string(),
        generated_at: now(),
        took_s: start.elapsed().as_secs_f64(),
        total_hits: results.total_hits,
        results: results.hits.iter().map(|r| Hit::from_result(r, category_field)).collect(),
    })
}

/// What a similarity search starts from.
#[derive(Debug, Clone)]
pub enum Reference {
    /// A stored document, looked up by key; it is left out of its own results.
    Key(String),
    Text(String),
}

#[derive(Debug, Serialize)]
pub struct SimilarReport {
    pub reference: String,
    pub query: String,
    pub interesting_terms: Vec<InterestingTerm>,
    pub generated_at: String,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<Hit>,
}

pub fn run_similar(
    index: &InvertedIndex,
    config: &EngineConfig,
    reference: &Reference,
    fields: &[String],
    exclude_category: Option<&str>,
    limit: usize,
) -> Result<SimilarReport> {
    check_limit(limit)?;
    let start = Instant::now();
    let mlt = MoreLikeThis::new(index, config.more_like_this.clone());
    let (label, text, self_id) = match reference {
        Reference::Key(key) => {
            let doc_id = index.doc_id_for_key(key)?;
            let doc = index.stored_fields(doc_id)?;
            let text: Vec<&str> = fields.iter().filter_map(|f| doc.get(f)).collect();
            (key.clone(), text.join("\n"), Some(doc_id))
        }
        Reference::Text(text) => ("text".to_string(), text.clone(), None),
    };

    let cfg = &config.more_like_this;
    let query = mlt.find_similar(&text, fields, exclude_category, cfg.min_doc_freq, cfg.min_term_freq);
    let interesting_terms = mlt.interesting_terms(&text, fields);
    let results = index.search(&query, None);
    let hits: Vec<Hit> = results
        .hits
        .iter()
        .filter(|h| Some(h.doc_id) != self_id)
        .take(limit)
        .map(|r| Hit::from_result(r, cfg.category_field.as_str()))
        .collect();
    let total_hits = results.total_hits - usize::from(self_id.is_some_and(|id| results.hits.iter().any(|h| h.doc_id == id)));

    Ok(SimilarReport {
        reference: label,
        query: query.to_string(),
        interesting_terms,
        generated_at: now(),
        took_s: start.elapsed().as_secs_f64(),
        total_hits,
        results: hits,
    })
}

#[derive(Debug, Serialize)]
pub struct MatchEntry {
    pub key: String,
    pub title: String,
    pub results: Vec<Hit>,
}

#[derive(Debug, Serialize)]
pub struct MatchReport {
    pub from: String,
    pub to: String,
    pub generated_at: String,
    pub took_s: f64,
    pub matches: Vec<MatchEntry>,
}

/// For every document of category `from`, the most similar documents of category `to`.
pub fn run_match(
    index: &InvertedIndex,
    config: &EngineConfig,
    from: &str,
    to: &str,
    fields: &[String],
    limit: usize,
) -> Result<MatchReport> {
    if from == to {
        return Err(anyhow!("--from and --to must name different categories"));
    }
    check_limit(limit)?;
    let start = Instant::now();
    let category_field = config.more_like_this.category_field.as_str();
    let mlt = MoreLikeThis::new(index, config.more_like_this.clone());
    let mut matches = Vec::new();
    for doc_id in 0..index.num_docs() {
        let doc = index.stored_fields(doc_id)?;
        if doc.get(category_field) != Some(from) { continue; }
        let query = mlt.like_document(doc_id, fields, Some(from))?;
        let results = index.search(&query, None);
        let hits = results
            .hits
            .iter()
            .filter(|h| h.document.get(category_field) == Some(to))
            .take(limit)
            .map(|r| Hit::from_result(r, category_field))
            .collect();
        matches.push(MatchEntry { key: doc.key.clone(), title: title_of(doc), results: hits });
    }
    tracing::info!(from, to, sources = matches.len(), "matched categories");
    Ok(MatchReport {
        from: from.to_string(),
        to: to.to_string(),
        generated_at: now(),
        took_s: start.elapsed().as_secs_f64(),
        matches,
    })
}
