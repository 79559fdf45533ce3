use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref TAG: Regex = Regex::new(r"(?s)<\s*/?\s*([a-zA-Z][a-zA-Z0-9]*)?[^>]*>").expect("valid regex");
    static ref ENTITY: Regex = Regex::new(r"&(#[0-9]+|#[xX][0-9a-fA-F]+|[a-zA-Z]+);").expect("valid regex");
    static ref SPACE: Regex = Regex::new(r"\s+").expect("valid regex");
}

/// Elements that end a run of text. Any other tag sits inside a word as far as
/// tokenization is concerned.
pub const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption", "figure", "footer",
    "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main", "nav", "ol", "p", "pre", "section", "table",
    "tbody", "td", "tfoot", "th", "thead", "tr", "ul",
];

pub fn is_block_element(name: &str) -> bool {
    BLOCK_ELEMENTS.iter().any(|b| b.eq_ignore_ascii_case(name))
}

/// Turns raw rich-text field values into plain text before they are analyzed.
pub trait TextNormalizer: Send + Sync {
    fn normalize(&self, raw: &str) -> String;
}

/// Leaves text untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl TextNormalizer for Passthrough {
    fn normalize(&self, raw: &str) -> String { raw.to_string() }
}

/// Drops anything that looks like a tag, decodes the common entities and collapses whitespace.
/// Good enough for fragments; documents with scripts or comments need a real HTML parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct TagStripper;

impl TextNormalizer for TagStripper {
    fn normalize(&self, raw: &str) -> String {
        let text = TAG.replace_all(raw, |caps: &regex::Captures| match caps.get(1) {
            Some(name) if is_block_element(name.as_str()) => " ",
            _ => "",
        });
        let text = ENTITY.replace_all(&text, |caps: &regex::Captures| decode_entity(&caps[1]).unwrap_or_else(|| caps[0].to_string()));
        SPACE.replace_all(text.trim(), " ").into_owned()
    }
}

fn decode_entity(name: &str) -> Option<String> {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse().ok()?,
        };
        return char::from_u32(code).map(String::from);
    }
    let s = match name {
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        "nbsp" => " ",
        _ => return None,
    };
    Some(s.to_string())
}
