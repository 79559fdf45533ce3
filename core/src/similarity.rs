//! "More like this": turns a reference text into a query for similar documents.
//!
//! The reference is analyzed like indexed text, its tokens are weighted by
//! tf × idf against the corpus, and the strongest ones become a disjunction over
//! the candidate fields. Building the query never runs it.

use crate::config::MoreLikeThisConfig;
use crate::error::Result;
use crate::index::{DocId, InvertedIndex, Term};
use crate::query::{Clause, Query};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// A reference token that survived the filters, with the numbers behind its rank.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterestingTerm {
    pub token: String,
    /// Occurrences in the reference text.
    pub term_frequency: u32,
    /// Largest document frequency across the candidate fields.
    pub doc_freq: u32,
    pub idf: f32,
    pub weight: f32,
}

pub struct MoreLikeThis<'a> {
    index: &'a InvertedIndex,
    config: MoreLikeThisConfig,
}

fn field_set<I, S>(fields: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    fields.into_iter().map(|f| f.as_ref().to_string()).collect()
}

impl<'a> MoreLikeThis<'a> {
    pub fn new(index: &'a InvertedIndex, config: MoreLikeThisConfig) -> Self {
        Self { index, config }
    }

    pub fn config(&self) -> &MoreLikeThisConfig { &self.config }

    /// Similarity query with explicit frequency thresholds; every other knob comes from the config.
    pub fn find_similar<I, S>(
        &self,
        reference_text: &str,
        candidate_fields: I,
        exclude_category: Option<&str>,
        min_doc_freq: u32,
        min_term_freq: u32,
    ) -> Query
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let config = MoreLikeThisConfig { min_doc_freq, min_term_freq, ..self.config.clone() };
        self.build(reference_text, &field_set(candidate_fields), exclude_category, &config)
    }

    /// Similarity query using the configured thresholds.
    pub fn like_text<I, S>(&self, reference_text: &str, candidate_fields: I, exclude_category: Option<&str>) -> Query
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.build(reference_text, &field_set(candidate_fields), exclude_category, &self.config)
    }

    /// Uses the stored values of `candidate_fields` in `doc_id` as the reference text.
    pub fn like_document<I, S>(&self, doc_id: DocId, candidate_fields: I, exclude_category: Option<&str>) -> Result<Query>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let fields = field_set(candidate_fields);
        let text = self.reference_text(doc_id, &fields)?;
        Ok(self.build(&text, &fields, exclude_category, &self.config))
    }

    /// The weighted tokens a query for `reference_text` would use, best first.
    pub fn interesting_terms<I, S>(&self, reference_text: &str, candidate_fields: I) -> Vec<InterestingTerm>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.select_terms(reference_text, &field_set(candidate_fields), &self.config)
    }

    fn reference_text(&self, doc_id: DocId, fields: &BTreeSet<String>) -> Result<String> {
        let doc = self.index.stored_fields(doc_id)?;
        let parts: Vec<&str> = fields.iter().filter_map(|f| doc.get(f)).collect();
        Ok(parts.join("\n"))
    }

    fn select_terms(&self, text: &str, fields: &BTreeSet<String>, config: &MoreLikeThisConfig) -> Vec<InterestingTerm> {
        let mut freqs: BTreeMap<String, u32> = BTreeMap::new();
        for (token, _) in self.index.analyzer().analyze(text) {
            *freqs.entry(token).or_insert(0) += 1;
        }

        let mut terms = Vec::new();
        for (token, tf) in freqs {
            if tf < config.min_term_freq { continue; }
            let len = token.chars().count();
            if config.min_word_len > 0 && len < config.min_word_len { continue; }
            if config.max_word_len > 0 && len > config.max_word_len { continue; }

            let doc_freq = fields
                .iter()
                .map(|f| self.index.document_frequency(&Term::new(f.as_str(), token.as_str())))
                .max()
                .unwrap_or(0);
            // a token no candidate field contains cannot match anything
            if doc_freq == 0 || doc_freq < config.min_doc_freq { continue; }
            if config.max_doc_freq.is_some_and(|max| doc_freq > max) { continue; }

            let idf = self.index.idf(doc_freq);
            terms.push(InterestingTerm { token, term_frequency: tf, doc_freq, idf, weight: tf as f32 * idf });
        }

        terms.sort_by(|a, b| b.weight.total_cmp(&a.weight).then_with(|| a.token.cmp(&b.token)));
        terms.truncate(config.max_query_terms);
        terms
    }

    fn build(&self, text: &str, fields: &BTreeSet<String>, exclude_category: Option<&str>, config: &MoreLikeThisConfig) -> Query {
        let terms = self.select_terms(text, fields, config);
        tracing::debug!(
            kept = terms.len(),
            fields = fields.len(),
            top = terms.first().map(|t| t.token.as_str()).unwrap_or(""),
            "more like this"
        );

        let top_weight = terms.first().map_or(1.0, |t| t.weight);
        let mut clauses = Vec::with_capacity(terms.len() * fields.len());
        for term in &terms {
            for field in fields {
                let q = Query::term(field.as_str(), term.token.as_str());
                let q = if config.boost && top_weight > 0.0 { q.boosted(term.weight / top_weight) } else { q };
                clauses.push(Clause::should(q));
            }
        }

        let similar = Query::Boolean(clauses);
        match exclude_category {
            Some(category) => similar.excluding(Query::term(config.category_field.as_str(), category)),
            None => similar,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::error::Error;
    use crate::query::Occur;

    fn corpus() -> InvertedIndex {
        let mut idx = InvertedIndex::default();
        idx.add_document(Document::new("a").keyword("type", "policy").text("text", "fox jumps high").text("comments", "fox"))
            .unwrap();
        idx.add_document(Document::new("b").keyword("type", "standard").text("text", "fox sleeps")).unwrap();
        idx
    }

    fn mlt(idx: &InvertedIndex) -> MoreLikeThis<'_> {
        MoreLikeThis::new(idx, MoreLikeThisConfig::default())
    }

    #[test]
    fn rarer_terms_get_higher_idf() {
        let idx = corpus();
        let terms = mlt(&idx).interesting_terms("fox fox jumps", ["text"]);
        let fox = terms.iter().find(|t| t.token == "fox").unwrap();
        let jumps = terms.iter().find(|t| t.token == "jumps").unwrap();
        assert_eq!((fox.term_frequency, fox.doc_freq), (2, 2));
        assert_eq!((jumps.term_frequency, jumps.doc_freq), (1, 1));
        assert!(jumps.idf > fox.idf);
        assert!((fox.weight - 2.0 * fox.idf).abs() < 1e-6);
    }

    #[test]
    fn thresholds_filter_terms() {
        let idx = corpus();
        let m = mlt(&idx);
        let q = m.find_similar("fox fox jumps", ["text"], None, 2, 1);
        assert_eq!(q, Query::Boolean(vec![Clause::should(Query::term("text", "fox"))]));
        let q = m.find_similar("fox fox jumps", ["text"], None, 1, 2);
        assert_eq!(q, Query::Boolean(vec![Clause::should(Query::term("text", "fox"))]));
        // "unicorn" is absent from the corpus and never kept
        let q = m.find_similar("unicorn", ["text"], None, 0, 0);
        assert_eq!(q, Query::Boolean(vec![]));
    }

    #[test]
    fn doc_freq_is_max_over_fields() {
        let idx = corpus();
        let terms = mlt(&idx).interesting_terms("fox", ["comments", "text"]);
        assert_eq!(terms[0].doc_freq, 2);
    }

    #[test]
    fn expands_each_term_over_every_field() {
        let idx = corpus();
        let q = mlt(&idx).find_similar("fox jumps", ["text", "comments"], None, 1, 1);
        let Query::Boolean(clauses) = q else { panic!("expected boolean") };
        assert_eq!(clauses.len(), 4);
        assert!(clauses.iter().all(|c| c.occur == Occur::Should));
        // jumps outranks fox at equal tf, fields in name order
        assert_eq!(clauses[0].query, Query::term("comments", "jumps"));
        assert_eq!(clauses[1].query, Query::term("text", "jumps"));
    }

    #[test]
    fn keeps_only_top_terms() {
        let idx = corpus();
        let config = MoreLikeThisConfig { max_query_terms: 1, ..Default::default() };
        let terms = MoreLikeThis::new(&idx, config).interesting_terms("fox fox jumps sleeps", ["text"]);
        assert_eq!(terms.len(), 1);
        assert_eq!(terms[0].token, "fox");
    }

    #[test]
    fn max_doc_freq_and_word_length() {
        let idx = corpus();
        let config = MoreLikeThisConfig { max_doc_freq: Some(1), ..Default::default() };
        let tokens: Vec<String> =
            MoreLikeThis::new(&idx, config).interesting_terms("fox jumps", ["text"]).into_iter().map(|t| t.token).collect();
        assert_eq!(tokens, vec!["jumps"]);

        let config = MoreLikeThisConfig { min_word_len: 4, ..Default::default() };
        let tokens: Vec<String> =
            MoreLikeThis::new(&idx, config).interesting_terms("fox jumps", ["text"]).into_iter().map(|t| t.token).collect();
        assert_eq!(tokens, vec!["jumps"]);
    }

    #[test]
    fn exclude_category_wraps_in_must_not() {
        let idx = corpus();
        let q = mlt(&idx).find_similar("jumps", ["text"], Some("policy"), 1, 1);
        assert_eq!(
            q,
            Query::Boolean(vec![Clause::should(Query::term("text", "jumps"))]).excluding(Query::term("type", "policy"))
        );
    }

    #[test]
    fn boost_is_relative_to_best_term() {
        let idx = corpus();
        let config = MoreLikeThisConfig { boost: true, ..Default::default() };
        let Query::Boolean(clauses) = MoreLikeThis::new(&idx, config).like_text("fox jumps", ["text"], None) else {
            panic!("expected boolean")
        };
        assert!(matches!(&clauses[0].query, Query::Boost { boost, .. } if (*boost - 1.0).abs() < 1e-6));
        assert!(matches!(&clauses[1].query, Query::Boost { boost, .. } if *boost < 1.0));
    }

    #[test]
    fn like_document_reads_stored_fields() {
        let idx = corpus();
        let m = mlt(&idx);
        let q = m.like_document(1, ["text"], None).unwrap();
        let hits = idx.search(&q, None);
        assert_eq!(hits.hits[0].doc_id, 1);
        assert!(matches!(m.like_document(9, ["text"], None), Err(Error::NotFound(9))));
    }
}
