use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How a field is indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// Stored and indexed as one verbatim term.
    Keyword,
    /// Stored and analyzed.
    Text,
}

impl FieldKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FieldKind::Keyword => "keyword",
            FieldKind::Text => "text",
        }
    }
}

/// A field value as supplied by a document source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Keyword(String),
    Text(String),
    /// Rich text, normalized to plain text by the index before analysis.
    Html(String),
}

impl FieldValue {
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::Keyword(_) => FieldKind::Keyword,
            FieldValue::Text(_) | FieldValue::Html(_) => FieldKind::Text,
        }
    }
}

/// A document ready to be indexed: an opaque key and its fields.
/// Absent values are never added, so there is no "null" field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    pub key: String,
    pub fields: BTreeMap<String, FieldValue>,
}

impl Document {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into(), fields: BTreeMap::new() }
    }

    pub fn keyword(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), FieldValue::Keyword(value.into()));
        self
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), FieldValue::Text(value.into()));
        self
    }

    pub fn html(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), FieldValue::Html(value.into()));
        self
    }

    pub fn text_opt<S: Into<String>>(self, name: impl Into<String>, value: Option<S>) -> Self {
        match value {
            Some(v) => self.text(name, v),
            None => self,
        }
    }

    pub fn html_opt<S: Into<String>>(self, name: impl Into<String>, value: Option<S>) -> Self {
        match value {
            Some(v) => self.html(name, v),
            None => self,
        }
    }

    pub fn keyword_opt<S: Into<String>>(self, name: impl Into<String>, value: Option<S>) -> Self {
        match value {
            Some(v) => self.keyword(name, v),
            None => self,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredField {
    pub kind: FieldKind,
    pub value: String,
}

/// What the index keeps of a document for retrieval. Html values are stored normalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub key: String,
    pub fields: BTreeMap<String, StoredField>,
}

impl StoredDocument {
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(|f| f.value.as_str())
    }
}
