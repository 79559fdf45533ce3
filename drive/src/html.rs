use scraper::node::Node;
use scraper::Html;
use sift_core::normalize::is_block_element;
use sift_core::TextNormalizer;

/// Plain text of an HTML fragment: markup dropped, entities decoded, script and
/// style bodies skipped, whitespace collapsed. Text runs are separated only where
/// a block element starts or ends, so inline markup never splits a word.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlNormalizer;

impl TextNormalizer for HtmlNormalizer {
    fn normalize(&self, raw: &str) -> String {
        let fragment = Html::parse_fragment(raw);
        let mut out = String::new();
        let mut prev_block = None;
        let mut pending_break = false;
        for node in fragment.root_element().descendants() {
            match node.value() {
                Node::Element(e) if is_block_element(e.name()) => pending_break = true,
                Node::Text(text) => {
                    let hidden = node
                        .ancestors()
                        .filter_map(|a| a.value().as_element())
                        .any(|e| matches!(e.name(), "script" | "style"));
                    if hidden { continue; }
                    let block = node
                        .ancestors()
                        .find(|a| a.value().as_element().is_some_and(|e| is_block_element(e.name())))
                        .map(|a| a.id());
                    if !out.is_empty() && (pending_break || prev_block != Some(block)) {
                        out.push(' ');
                    }
                    out.push_str(text);
                    prev_block = Some(block);
                    pending_break = false;
                }
                _ => {}
            }
        }
        out.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}
