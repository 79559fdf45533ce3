//! Property-based tests using proptest.

use proptest::prelude::*;
use sift_core::tokenizer::{tokenize, StopWords, ENGLISH_STOP_WORDS};
use sift_core::{Document, InvertedIndex, Query, Term};
use std::collections::BTreeSet;

fn word_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z]{1,6}").unwrap()
}

fn text_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![word_strategy(), prop::sample::select(ENGLISH_STOP_WORDS.to_vec()).prop_map(|w| w.to_uppercase())],
        0..12,
    )
    .prop_map(|words| words.join(" "))
}

/// (category, text) pairs.
fn corpus_strategy() -> impl Strategy<Value = Vec<(bool, String)>> {
    prop::collection::vec((any::<bool>(), text_strategy()), 1..8)
}

fn build(corpus: &[(bool, String)]) -> InvertedIndex {
    let mut idx = InvertedIndex::default();
    for (i, (is_policy, text)) in corpus.iter().enumerate() {
        let category = if *is_policy { "policy" } else { "standard" };
        idx.add_document(Document::new(i.to_string()).keyword("type", category).text("text", text.as_str()))
            .unwrap();
    }
    idx
}

proptest! {
    #[test]
    fn prop_tokens_are_lowercase_and_never_stop_words(text in text_strategy()) {
        let stop = StopWords::english();
        for token in tokenize(&text, &stop) {
            prop_assert_eq!(token.to_lowercase(), token.clone());
            prop_assert!(!stop.contains(&token));
            prop_assert!(!token.is_empty());
        }
    }

    #[test]
    fn prop_doc_freq_matches_postings(corpus in corpus_strategy()) {
        let idx = build(&corpus);
        let stop = StopWords::english();
        let tokens: BTreeSet<String> = corpus.iter().flat_map(|(_, t)| tokenize(t, &stop)).collect();
        for token in tokens {
            let term = Term::new("text", token);
            let postings = idx.postings(&term);
            let distinct: BTreeSet<u32> = postings.iter().map(|p| p.doc_id).collect();
            prop_assert_eq!(idx.document_frequency(&term) as usize, distinct.len());
            prop_assert_eq!(distinct.len(), postings.len());
            prop_assert!(idx.document_frequency(&term) <= idx.num_docs());
            prop_assert!(postings.windows(2).all(|w| w[0].doc_id < w[1].doc_id));
        }
    }

    #[test]
    fn prop_must_not_never_leaks(corpus in corpus_strategy(), word in word_strategy()) {
        let idx = build(&corpus);
        let token = word.to_lowercase();
        let q = Query::any_of([Query::term("text", token.as_str()), Query::term("type", "standard")])
            .excluding(Query::term("type", "policy"));
        for hit in idx.search(&q, None).hits {
            prop_assert_eq!(hit.document.get("type"), Some("standard"));
        }
    }

    #[test]
    fn prop_results_sorted_and_deterministic(corpus in corpus_strategy(), words in prop::collection::vec(word_strategy(), 1..4)) {
        let idx = build(&corpus);
        let q = Query::any_of(words.iter().map(|w| Query::term("text", w.to_lowercase())));
        let first = idx.search(&q, None);
        for pair in first.hits.windows(2) {
            prop_assert!(pair[0].score > pair[1].score || (pair[0].score == pair[1].score && pair[0].doc_id < pair[1].doc_id));
        }
        let second = idx.search(&q, None);
        let a: Vec<(u32, u32)> = first.hits.iter().map(|h| (h.doc_id, h.score.to_bits())).collect();
        let b: Vec<(u32, u32)> = second.hits.iter().map(|h| (h.doc_id, h.score.to_bits())).collect();
        prop_assert_eq!(a, b);
    }
}
