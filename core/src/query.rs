//! Query tree and its evaluation against an [`InvertedIndex`].
//!
//! Leaves look up postings and score each matching document with tf × idf. Boolean
//! nodes combine the per-document scores of their children: MUST intersects, SHOULD
//! unions, MUST_NOT removes. Scores are accumulated in ordered maps so the same query
//! over the same index always sums in the same order and ranks identically.

use crate::config::{MAX_FUZZY_EDITS, MAX_RESULTS};
use crate::document::StoredDocument;
use crate::index::{DocId, InvertedIndex, Term};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Occur {
    Must,
    Should,
    MustNot,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub occur: Occur,
    pub query: Query,
}

impl Clause {
    pub fn must(query: Query) -> Self { Self { occur: Occur::Must, query } }
    pub fn should(query: Query) -> Self { Self { occur: Occur::Should, query } }
    pub fn must_not(query: Query) -> Self { Self { occur: Occur::MustNot, query } }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Term(Term),
    /// Tokens with their offsets relative to each other; gaps left by stop words are kept.
    Phrase { field: String, terms: Vec<(String, u32)> },
    Fuzzy { term: Term, max_edits: u8 },
    Boost { query: Box<Query>, boost: f32 },
    Boolean(Vec<Clause>),
}

impl Query {
    pub fn term(field: impl Into<String>, token: impl Into<String>) -> Self {
        Query::Term(Term::new(field, token))
    }

    /// Phrase of consecutive tokens.
    pub fn phrase<I, S>(field: impl Into<String>, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let terms = tokens.into_iter().enumerate().map(|(i, t)| (t.into(), i as u32)).collect();
        Query::Phrase { field: field.into(), terms }
    }

    pub fn fuzzy(field: impl Into<String>, token: impl Into<String>, max_edits: u8) -> Self {
        Query::Fuzzy { term: Term::new(field, token), max_edits: max_edits.min(MAX_FUZZY_EDITS) }
    }

    pub fn boosted(self, boost: f32) -> Self {
        Query::Boost { query: Box::new(self), boost }
    }

    /// Disjunction of `queries`.
    pub fn any_of<I: IntoIterator<Item = Query>>(queries: I) -> Self {
        Query::Boolean(queries.into_iter().map(Clause::should).collect())
    }

    /// Conjunction of `queries`.
    pub fn all_of<I: IntoIterator<Item = Query>>(queries: I) -> Self {
        Query::Boolean(queries.into_iter().map(Clause::must).collect())
    }

    /// `self` minus anything matching `excluded`.
    pub fn excluding(self, excluded: Query) -> Self {
        Query::Boolean(vec![Clause::must(self), Clause::must_not(excluded)])
    }
}

fn write_value(f: &mut fmt::Formatter<'_>, value: &str) -> fmt::Result {
    let plain = !value.is_empty()
        && value.chars().all(|c| !c.is_whitespace() && !"():\"+-^~\\".contains(c))
        && !matches!(value, "AND" | "OR" | "NOT" | "&&" | "||" | "!");
    if plain {
        f.write_str(value)
    } else {
        write!(f, "\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
    }
}

/// Renders the query in the classic syntax accepted by [`crate::parser::QueryParser`].
impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::Term(t) => {
                write!(f, "{}:", t.field)?;
                write_value(f, &t.token)
            }
            Query::Phrase { field, terms } => {
                let words: Vec<&str> = terms.iter().map(|(t, _)| t.as_str()).collect();
                write!(f, "{field}:\"{}\"", words.join(" "))
            }
            Query::Fuzzy { term, max_edits } => {
                write!(f, "{}:", term.field)?;
                write_value(f, &term.token)?;
                write!(f, "~{max_edits}")
            }
            Query::Boost { query, boost } => write!(f, "({query})^{boost}"),
            Query::Boolean(clauses) => {
                f.write_str("(")?;
                for (i, clause) in clauses.iter().enumerate() {
                    if i > 0 { f.write_str(" ")?; }
                    match clause.occur {
                        Occur::Must => f.write_str("+")?,
                        Occur::MustNot => f.write_str("-")?,
                        Occur::Should => {}
                    }
                    write!(f, "{}", clause.query)?;
                }
                f.write_str(")")
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoredResult<'a> {
    pub doc_id: DocId,
    pub score: f32,
    pub document: &'a StoredDocument,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResults<'a> {
    /// Matching documents before the limit was applied.
    pub total_hits: usize,
    pub hits: Vec<ScoredResult<'a>>,
}

type Matches = BTreeMap<DocId, f32>;

impl InvertedIndex {
    /// Evaluates `query` and returns the best hits, highest score first and ties by
    /// ascending doc id. `limit` defaults to, and is clamped at, `MAX_RESULTS`.
    pub fn search<'a>(&'a self, query: &Query, limit: Option<usize>) -> SearchResults<'a> {
        let limit = limit.unwrap_or(MAX_RESULTS).min(MAX_RESULTS);
        let mut scored: Vec<(DocId, f32)> = evaluate(self, query).into_iter().collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        let total_hits = scored.len();
        let hits = scored
            .into_iter()
            .take(limit)
            .filter_map(|(doc_id, score)| {
                let document = self.stored_fields(doc_id).ok()?;
                Some(ScoredResult { doc_id, score, document })
            })
            .collect::<Vec<_>>();
        tracing::debug!(%query, total_hits, returned = hits.len(), "search");
        SearchResults { total_hits, hits }
    }
}

fn evaluate(index: &InvertedIndex, query: &Query) -> Matches {
    match query {
        Query::Term(term) => score_term(index, term),
        Query::Phrase { field, terms } => score_phrase(index, field, terms),
        Query::Fuzzy { term, max_edits } => score_fuzzy(index, term, *max_edits),
        Query::Boost { query, boost } => {
            let mut m = evaluate(index, query);
            m.values_mut().for_each(|s| *s *= boost);
            m
        }
        Query::Boolean(clauses) => score_boolean(index, clauses),
    }
}

fn score_term(index: &InvertedIndex, term: &Term) -> Matches {
    let Some(info) = index.term_info(term) else { return Matches::new() };
    let idf = index.idf(info.doc_freq);
    info.postings.iter().map(|p| (p.doc_id, p.term_frequency as f32 * idf)).collect()
}

fn score_phrase(index: &InvertedIndex, field: &str, terms: &[(String, u32)]) -> Matches {
    match terms {
        [] => return Matches::new(),
        [(token, _)] => return score_term(index, &Term::new(field, token.as_str())),
        _ => {}
    }
    let mut infos = Vec::with_capacity(terms.len());
    for (token, offset) in terms {
        match index.term_info(&Term::new(field, token.as_str())) {
            Some(info) => infos.push((info, *offset as i64)),
            None => return Matches::new(),
        }
    }
    let idf_sum: f32 = infos.iter().map(|(info, _)| index.idf(info.doc_freq)).sum();

    let (first, first_offset) = infos[0];
    let mut matches = Matches::new();
    'docs: for lead in &first.postings {
        let mut others = Vec::with_capacity(infos.len() - 1);
        for (info, offset) in &infos[1..] {
            match info.postings.binary_search_by_key(&lead.doc_id, |p| p.doc_id) {
                Ok(i) => others.push((&info.postings[i].positions, *offset)),
                Err(_) => continue 'docs,
            }
        }
        let freq = lead
            .positions
            .iter()
            .filter(|&&pos| {
                let anchor = pos as i64 - first_offset;
                others.iter().all(|(positions, offset)| {
                    let want = anchor + offset;
                    want >= 0 && positions.binary_search(&(want as u32)).is_ok()
                })
            })
            .count();
        if freq > 0 {
            matches.insert(lead.doc_id, freq as f32 * idf_sum);
        }
    }
    matches
}

fn score_fuzzy(index: &InvertedIndex, term: &Term, max_edits: u8) -> Matches {
    let max = max_edits.min(MAX_FUZZY_EDITS) as usize;
    let mut matches = Matches::new();
    for (token, info) in index.terms(&term.field) {
        if !levenshtein_within(token, &term.token, max) { continue; }
        let idf = index.idf(info.doc_freq);
        for p in &info.postings {
            *matches.entry(p.doc_id).or_insert(0.0) += p.term_frequency as f32 * idf;
        }
    }
    matches
}

fn score_boolean(index: &InvertedIndex, clauses: &[Clause]) -> Matches {
    let mut musts = Vec::new();
    let mut shoulds = Vec::new();
    let mut nots = Vec::new();
    for clause in clauses {
        match clause.occur {
            Occur::Must => musts.push(&clause.query),
            Occur::Should => shoulds.push(&clause.query),
            Occur::MustNot => nots.push(&clause.query),
        }
    }
    if musts.is_empty() && shoulds.is_empty() {
        return Matches::new();
    }

    let mut acc = if musts.is_empty() {
        let mut acc = Matches::new();
        for q in &shoulds {
            for (doc, s) in evaluate(index, q) {
                *acc.entry(doc).or_insert(0.0) += s;
            }
        }
        acc
    } else {
        let mut acc = evaluate(index, musts[0]);
        for q in &musts[1..] {
            if acc.is_empty() { break; }
            let other = evaluate(index, q);
            acc.retain(|doc, s| match other.get(doc) {
                Some(o) => { *s += o; true }
                None => false,
            });
        }
        for q in &shoulds {
            for (doc, s) in evaluate(index, q) {
                if let Some(total) = acc.get_mut(&doc) { *total += s; }
            }
        }
        acc
    };

    for q in &nots {
        if acc.is_empty() { break; }
        let excluded = evaluate(index, q);
        acc.retain(|doc, _| !excluded.contains_key(doc));
    }
    acc
}

/// Character-level Levenshtein distance.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() { return b.len(); }
    if b.is_empty() { return a.len(); }
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut cur = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        cur[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            cur[j + 1] = (prev[j + 1] + 1).min(cur[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[b.len()]
}

pub fn levenshtein_within(a: &str, b: &str, max: usize) -> bool {
    let (la, lb) = (a.chars().count(), b.chars().count());
    if la.abs_diff(lb) > max { return false; }
    levenshtein(a, b) <= max
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;

    fn index(docs: &[(&str, &str, &str)]) -> InvertedIndex {
        let mut idx = InvertedIndex::default();
        for (key, category, text) in docs {
            idx.add_document(Document::new(*key).keyword("type", *category).text("text", *text)).unwrap();
        }
        idx
    }

    fn ids(results: &SearchResults<'_>) -> Vec<DocId> {
        results.hits.iter().map(|h| h.doc_id).collect()
    }

    #[test]
    fn term_scores_are_tf_times_idf() {
        let idx = index(&[("a", "x", "audit audit log"), ("b", "x", "audit"), ("c", "x", "log")]);
        let res = idx.search(&Query::term("text", "audit"), None);
        assert_eq!(ids(&res), vec![0, 1]);
        let idf = (1.0f32 + 3.0 / 3.0).ln();
        assert!((res.hits[0].score - 2.0 * idf).abs() < 1e-6);
        assert!((res.hits[1].score - idf).abs() < 1e-6);
    }

    #[test]
    fn must_intersects_and_sums() {
        let idx = index(&[("a", "x", "audit log"), ("b", "x", "audit"), ("c", "x", "log")]);
        let q = Query::all_of([Query::term("text", "audit"), Query::term("text", "log")]);
        let res = idx.search(&q, None);
        assert_eq!(ids(&res), vec![0]);
        let single = idx.search(&Query::term("text", "audit"), None).hits[0].score;
        assert!(res.hits[0].score > single);
    }

    #[test]
    fn should_unions() {
        let idx = index(&[("a", "x", "audit log"), ("b", "x", "audit"), ("c", "x", "log"), ("d", "x", "other")]);
        let res = idx.search(&Query::any_of([Query::term("text", "audit"), Query::term("text", "log")]), None);
        assert_eq!(res.total_hits, 3);
        assert_eq!(res.hits[0].doc_id, 0);
    }

    #[test]
    fn should_only_adds_score_next_to_must() {
        let idx = index(&[("a", "x", "audit log"), ("b", "x", "audit"), ("c", "x", "log")]);
        let q = Query::Boolean(vec![Clause::must(Query::term("text", "audit")), Clause::should(Query::term("text", "log"))]);
        let res = idx.search(&q, None);
        assert_eq!(ids(&res), vec![0, 1]);
    }

    #[test]
    fn must_not_excludes_even_when_other_clauses_match() {
        let idx = index(&[("a", "policy", "audit log"), ("b", "standard", "audit"), ("c", "policy", "audit")]);
        let q = Query::any_of([Query::term("text", "audit"), Query::term("text", "log")])
            .excluding(Query::term("type", "policy"));
        let res = idx.search(&q, None);
        assert_eq!(ids(&res), vec![1]);
    }

    #[test]
    fn only_negative_clauses_match_nothing() {
        let idx = index(&[("a", "policy", "audit")]);
        let q = Query::Boolean(vec![Clause::must_not(Query::term("text", "log"))]);
        assert_eq!(idx.search(&q, None).total_hits, 0);
    }

    #[test]
    fn phrase_requires_adjacent_positions() {
        let idx = index(&[("a", "x", "access control policy"), ("b", "x", "control of access"), ("c", "x", "access the control")]);
        let res = idx.search(&Query::phrase("text", ["access", "control"]), None);
        assert_eq!(ids(&res), vec![0]);

        // "the" is dropped at analysis time but its position is kept
        let gap = Query::Phrase { field: "text".into(), terms: vec![("access".into(), 0), ("control".into(), 2)] };
        assert_eq!(ids(&idx.search(&gap, None)), vec![2]);
    }

    #[test]
    fn fuzzy_matches_close_variants() {
        let idx = index(&[("a", "x", "encryption"), ("b", "x", "encryptions"), ("c", "x", "decryption"), ("d", "x", "backup")]);
        let res = idx.search(&Query::fuzzy("text", "encryptoin", 2), None);
        assert_eq!(ids(&res), vec![0]);
        let wide = idx.search(&Query::fuzzy("text", "encryption", 2), None);
        assert_eq!(wide.total_hits, 3);
        assert_eq!(wide.hits[0].doc_id, 0);
    }

    #[test]
    fn fuzzy_edits_are_clamped() {
        assert_eq!(Query::fuzzy("text", "x", 9), Query::Fuzzy { term: Term::new("text", "x"), max_edits: MAX_FUZZY_EDITS });
    }

    #[test]
    fn boost_scales_scores() {
        let idx = index(&[("a", "x", "audit")]);
        let plain = idx.search(&Query::term("text", "audit"), None).hits[0].score;
        let boosted = idx.search(&Query::term("text", "audit").boosted(3.0), None).hits[0].score;
        assert!((boosted - 3.0 * plain).abs() < 1e-6);
    }

    #[test]
    fn unknown_fields_and_terms_match_nothing() {
        let idx = index(&[("a", "x", "audit")]);
        assert_eq!(idx.search(&Query::term("missing", "audit"), None).total_hits, 0);
        assert_eq!(idx.search(&Query::term("text", "missing"), None).total_hits, 0);
        assert_eq!(idx.search(&Query::fuzzy("missing", "audit", 1), None).total_hits, 0);
    }

    #[test]
    fn ties_break_by_ascending_id_and_limit_truncates() {
        let docs: Vec<(String, &str, &str)> = (0..20).map(|i| (format!("d{i}"), "x", "same words")).collect();
        let refs: Vec<(&str, &str, &str)> = docs.iter().map(|(k, c, t)| (k.as_str(), *c, *t)).collect();
        let idx = index(&refs);
        let res = idx.search(&Query::term("text", "same"), Some(5));
        assert_eq!(res.total_hits, 20);
        assert_eq!(ids(&res), vec![0, 1, 2, 3, 4]);
        assert_eq!(idx.search(&Query::term("text", "same"), Some(MAX_RESULTS * 10)).hits.len(), 20);
    }

    #[test]
    fn levenshtein_distances() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("café", "cafe"), 1);
        assert!(levenshtein_within("audit", "audits", 1));
        assert!(!levenshtein_within("audit", "au", 2));
    }

    #[test]
    fn display_round_trips_through_the_parser_syntax() {
        let q = Query::any_of([Query::term("text", "audit"), Query::phrase("text", ["access", "control"])])
            .excluding(Query::term("type", "policy"));
        assert_eq!(q.to_string(), "(+(text:audit text:\"access control\") -type:policy)");
        assert_eq!(Query::term("sectionName", "Access Control").to_string(), "sectionName:\"Access Control\"");
        assert_eq!(Query::fuzzy("text", "audit", 1).to_string(), "text:audit~1");
    }
}
