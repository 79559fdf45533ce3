use sift_core::tokenizer::{tokenize, tokenize_opt, tokenize_with_positions, StopWords};

#[test]
fn it_lowercases_and_normalizes() {
    // NFKC folds the ligature and full-width forms before lowercasing
    let words = tokenize("ＡＵＤＩＴ ﬁrewall Logs", &StopWords::none());
    assert_eq!(words, vec!["audit", "firewall", "logs"]);
}

#[test]
fn it_filters_stopwords() {
    let words = tokenize("The quick brown fox and the lazy dog", &StopWords::english());
    assert!(!words.contains(&"the".to_string()));
    assert!(!words.contains(&"and".to_string()));
    assert!(words.contains(&"fox".to_string()));
}

#[test]
fn it_handles_empty_and_absent_input() {
    assert!(tokenize("", &StopWords::english()).is_empty());
    assert!(tokenize_opt(None, &StopWords::english()).is_empty());
    assert_eq!(tokenize_opt(Some("Fox"), &StopWords::english()), vec!["fox"]);
}

#[test]
fn it_counts_positions_across_stopwords() {
    let toks = tokenize_with_positions("Review of the access logs", &StopWords::english());
    let positions: Vec<u32> = toks.iter().map(|(_, p)| *p).collect();
    assert_eq!(positions, vec![0, 3, 4]);
}
