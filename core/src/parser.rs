//! Parser for the classic keyword query syntax.
//!
//! ```text
//! text:lorem                      term in a field
//! audit logging                   default field, default operator
//! +encryption -"key escrow"       required / prohibited clauses
//! backup AND (offsite OR cloud)   boolean operators and groups
//! retention~1 policy^2            fuzzy term, boosted term
//! type:policy                     keyword fields match the raw value
//! ```
//!
//! Values for analyzed fields go through the index's analyzer, so they line up
//! with indexed tokens: no tokens drops the clause, one token is a term, more
//! become a phrase. Keyword fields are matched verbatim.

use crate::config::{DefaultOperator, SearchConfig, DEFAULT_FUZZY_EDITS, MAX_QUERY_DEPTH};
use crate::document::FieldKind;
use crate::error::ParseError;
use crate::index::InvertedIndex;
use crate::query::{Clause, Occur, Query};

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Word(String),
    Quoted(String),
    LParen,
    RParen,
    Colon,
    Plus,
    Minus,
    Caret,
    Tilde,
    And,
    Or,
    Not,
}

#[derive(Debug, Clone)]
struct Lexed {
    tok: Tok,
    start: usize,
    end: usize,
    text: String,
}

fn lex(input: &str) -> Result<Vec<Lexed>, ParseError> {
    let mut out = Vec::new();
    let mut chars = input.char_indices().peekable();
    while let Some(&(start, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        let single = match c {
            '(' => Some(Tok::LParen),
            ')' => Some(Tok::RParen),
            ':' => Some(Tok::Colon),
            '^' => Some(Tok::Caret),
            '~' => Some(Tok::Tilde),
            '+' => Some(Tok::Plus),
            '-' => Some(Tok::Minus),
            _ => None,
        };
        if let Some(tok) = single {
            chars.next();
            out.push(Lexed { tok, start, end: start + c.len_utf8(), text: c.to_string() });
            continue;
        }

        if c == '"' {
            chars.next();
            let mut value = String::new();
            let mut end = None;
            while let Some((i, c)) = chars.next() {
                match c {
                    '\\' => {
                        if let Some((_, escaped)) = chars.next() { value.push(escaped); }
                    }
                    '"' => {
                        end = Some(i + 1);
                        break;
                    }
                    _ => value.push(c),
                }
            }
            let Some(end) = end else {
                return Err(ParseError::new(start, &input[start..], "unterminated quote"));
            };
            out.push(Lexed { tok: Tok::Quoted(value), start, end, text: input[start..end].to_string() });
            continue;
        }

        let mut value = String::new();
        let mut escaped_any = false;
        let mut end = start;
        while let Some(&(i, c)) = chars.peek() {
            if c.is_whitespace() || "():^~\"".contains(c) { break; }
            chars.next();
            if c == '\\' {
                let Some((j, escaped)) = chars.next() else {
                    return Err(ParseError::new(i, "\\", "dangling escape character"));
                };
                value.push(escaped);
                escaped_any = true;
                end = j + escaped.len_utf8();
                continue;
            }
            value.push(c);
            end = i + c.len_utf8();
        }
        let tok = match value.as_str() {
            "AND" | "&&" if !escaped_any => Tok::And,
            "OR" | "||" if !escaped_any => Tok::Or,
            "NOT" | "!" if !escaped_any => Tok::Not,
            _ => Tok::Word(value),
        };
        out.push(Lexed { tok, start, end, text: input[start..end].to_string() });
    }
    Ok(out)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Conj {
    None,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Modifier {
    None,
    Required,
    Prohibited,
}

struct Cursor<'t> {
    toks: &'t [Lexed],
    i: usize,
    input_len: usize,
    depth: usize,
}

impl<'t> Cursor<'t> {
    fn peek(&self) -> Option<&'t Lexed> { self.toks.get(self.i) }

    fn next(&mut self) -> Option<&'t Lexed> {
        let t = self.toks.get(self.i);
        if t.is_some() { self.i += 1; }
        t
    }

    /// Next token only if it starts exactly where `prev` ended.
    fn adjacent(&self, prev: &Lexed) -> Option<&'t Lexed> {
        self.peek().filter(|t| t.start == prev.end)
    }

    fn at_clause_end(&self) -> bool {
        matches!(self.peek().map(|t| &t.tok), None | Some(Tok::RParen) | Some(Tok::And) | Some(Tok::Or))
    }

    fn error_here(&self, message: &str) -> ParseError {
        match self.peek() {
            Some(t) => ParseError::new(t.start, t.text.clone(), message),
            None => ParseError::new(self.input_len, "", message),
        }
    }
}

/// Parses query strings against one index, so field kinds and the analyzer match what was indexed.
pub struct QueryParser<'a> {
    index: &'a InvertedIndex,
    default_field: String,
    default_operator: DefaultOperator,
}

impl<'a> QueryParser<'a> {
    pub fn new(index: &'a InvertedIndex, default_field: impl Into<String>) -> Self {
        Self { index, default_field: default_field.into(), default_operator: DefaultOperator::Or }
    }

    pub fn from_config(index: &'a InvertedIndex, config: &SearchConfig) -> Self {
        Self::new(index, config.default_field.clone()).with_default_operator(config.default_operator)
    }

    pub fn with_default_operator(mut self, operator: DefaultOperator) -> Self {
        self.default_operator = operator;
        self
    }

    pub fn parse(&self, input: &str) -> Result<Query, ParseError> {
        let toks = lex(input)?;
        if toks.is_empty() {
            return Err(ParseError::new(0, "", "empty query"));
        }
        let mut cur = Cursor { toks: &toks, i: 0, input_len: input.len(), depth: 0 };
        let clauses = self.parse_clauses(&mut cur, &self.default_field)?;
        if let Some(t) = cur.peek() {
            return Err(ParseError::new(t.start, t.text.clone(), "unbalanced ')'"));
        }
        Ok(collapse(clauses))
    }

    fn parse_clauses(&self, cur: &mut Cursor<'_>, field: &str) -> Result<Vec<Clause>, ParseError> {
        let mut clauses: Vec<Clause> = Vec::new();
        let mut first = true;
        loop {
            let Some(t) = cur.peek() else { break };
            if t.tok == Tok::RParen { break; }

            let mut conj = Conj::None;
            if matches!(t.tok, Tok::And | Tok::Or) {
                if first {
                    return Err(ParseError::new(t.start, t.text.clone(), "operator without a left-hand clause"));
                }
                conj = if t.tok == Tok::And { Conj::And } else { Conj::Or };
                cur.next();
                if cur.at_clause_end() {
                    return Err(ParseError::new(t.start, t.text.clone(), "operator without a right-hand clause"));
                }
            }

            let modifier = match cur.peek().map(|t| &t.tok) {
                Some(Tok::Plus) => Modifier::Required,
                Some(Tok::Minus) | Some(Tok::Not) => Modifier::Prohibited,
                _ => Modifier::None,
            };
            if modifier != Modifier::None {
                if let Some(op) = cur.next() {
                    if cur.at_clause_end() {
                        return Err(ParseError::new(op.start, op.text.clone(), "modifier without a clause"));
                    }
                }
            }

            let query = self.parse_primary(cur, field)?;
            self.add_clause(&mut clauses, conj, modifier, query);
            first = false;
        }
        Ok(clauses)
    }

    fn add_clause(&self, clauses: &mut Vec<Clause>, conj: Conj, modifier: Modifier, query: Option<Query>) {
        if let Some(last) = clauses.last_mut() {
            if conj == Conj::And && last.occur == Occur::Should {
                last.occur = Occur::Must;
            }
            if conj == Conj::Or && self.default_operator == DefaultOperator::And && last.occur == Occur::Must {
                last.occur = Occur::Should;
            }
        }
        let Some(query) = query else { return };
        let occur = match modifier {
            Modifier::Required => Occur::Must,
            Modifier::Prohibited => Occur::MustNot,
            Modifier::None => match (conj, self.default_operator) {
                (Conj::And, _) => Occur::Must,
                (Conj::None, DefaultOperator::And) => Occur::Must,
                _ => Occur::Should,
            },
        };
        clauses.push(Clause { occur, query });
    }

    /// One clause body. `None` when a value analyzes to nothing (all stop words).
    fn parse_primary(&self, cur: &mut Cursor<'_>, field: &str) -> Result<Option<Query>, ParseError> {
        let Some(t) = cur.next() else {
            return Err(cur.error_here("expected a clause"));
        };
        let (field, value_tok) = match &t.tok {
            Tok::Word(name) if matches!(cur.peek().map(|n| &n.tok), Some(Tok::Colon)) => {
                cur.next();
                if name.is_empty() {
                    return Err(ParseError::new(t.start, t.text.clone(), "empty field name"));
                }
                match cur.next() {
                    Some(v) if matches!(v.tok, Tok::Word(_) | Tok::Quoted(_) | Tok::LParen) => (name.as_str(), v),
                    _ => return Err(ParseError::new(t.start, t.text.clone(), "missing value after field")),
                }
            }
            _ => (field, t),
        };

        let query = match &value_tok.tok {
            Tok::Word(word) => {
                let mut last = value_tok;
                let fuzzy = match cur.adjacent(last) {
                    Some(tilde) if tilde.tok == Tok::Tilde => {
                        cur.next();
                        last = tilde;
                        let mut edits = DEFAULT_FUZZY_EDITS;
                        if let Some(num) = cur.adjacent(tilde) {
                            if let Tok::Word(n) = &num.tok {
                                edits = n
                                    .parse::<u8>()
                                    .map_err(|_| ParseError::new(num.start, num.text.clone(), "invalid fuzzy distance"))?;
                                cur.next();
                                last = num;
                            }
                        }
                        Some(edits)
                    }
                    _ => None,
                };
                let query = match fuzzy {
                    Some(edits) => self.fuzzy_leaf(field, word, edits),
                    None => self.leaf(field, word),
                };
                self.parse_boost(cur, last, query)?
            }
            Tok::Quoted(text) => {
                if let Some(tilde) = cur.adjacent(value_tok).filter(|n| n.tok == Tok::Tilde) {
                    return Err(ParseError::new(tilde.start, tilde.text.clone(), "proximity search is not supported"));
                }
                let query = self.leaf(field, text);
                self.parse_boost(cur, value_tok, query)?
            }
            Tok::LParen => {
                if matches!(cur.peek(), Some(t) if t.tok == Tok::RParen) {
                    return Err(ParseError::new(value_tok.start, "()", "empty group"));
                }
                if cur.depth >= MAX_QUERY_DEPTH {
                    return Err(ParseError::new(value_tok.start, "(", "query nested too deeply"));
                }
                cur.depth += 1;
                let clauses = self.parse_clauses(cur, field)?;
                cur.depth -= 1;
                let close = match cur.next() {
                    Some(c) if c.tok == Tok::RParen => c,
                    _ => return Err(ParseError::new(value_tok.start, "(", "missing ')'")),
                };
                let query = (!clauses.is_empty()).then(|| collapse(clauses));
                self.parse_boost(cur, close, query)?
            }
            _ => return Err(ParseError::new(value_tok.start, value_tok.text.clone(), "unexpected token")),
        };
        Ok(query)
    }

    fn parse_boost(&self, cur: &mut Cursor<'_>, prev: &Lexed, query: Option<Query>) -> Result<Option<Query>, ParseError> {
        let Some(caret) = cur.adjacent(prev).filter(|n| n.tok == Tok::Caret) else {
            return Ok(query);
        };
        cur.next();
        let boost = match cur.adjacent(caret) {
            Some(Lexed { tok: Tok::Word(n), .. }) => n.parse::<f32>().ok().filter(|b| b.is_finite() && *b > 0.0),
            _ => None,
        };
        let Some(boost) = boost else {
            let at = cur.adjacent(caret).unwrap_or(caret);
            return Err(ParseError::new(at.start, at.text.clone(), "invalid boost"));
        };
        cur.next();
        Ok(query.map(|q| q.boosted(boost)))
    }

    fn leaf(&self, field: &str, value: &str) -> Option<Query> {
        if self.index.field_kind(field) == Some(FieldKind::Keyword) {
            return Some(Query::term(field, value));
        }
        let tokens = self.index.analyzer().analyze(value);
        match tokens.as_slice() {
            [] => None,
            [(token, _)] => Some(Query::term(field, token.as_str())),
            [(_, first), ..] => {
                let base = *first;
                let terms = tokens.iter().map(|(t, pos)| (t.clone(), pos - base)).collect();
                Some(Query::Phrase { field: field.to_string(), terms })
            }
        }
    }

    fn fuzzy_leaf(&self, field: &str, value: &str, edits: u8) -> Option<Query> {
        if self.index.field_kind(field) == Some(FieldKind::Keyword) {
            return Some(Query::fuzzy(field, value, edits));
        }
        let mut fuzzies: Vec<Query> = self
            .index
            .analyzer()
            .analyze_terms(value)
            .into_iter()
            .map(|t| Query::fuzzy(field, t, edits))
            .collect();
        match fuzzies.len() {
            0 => None,
            1 => fuzzies.pop(),
            _ => Some(Query::all_of(fuzzies)),
        }
    }
}

fn collapse(mut clauses: Vec<Clause>) -> Query {
    if clauses.len() == 1 && clauses[0].occur != Occur::MustNot {
        if let Some(only) = clauses.pop() {
            return only.query;
        }
    }
    Query::Boolean(clauses)
}
