//! Record sources: typed policy and standard rows read from JSON/JSONL files.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use sift_core::Document;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PolicySection {
    pub id: i64,
    pub section_name: String,
    pub policy_name: String,
    pub comments: Option<String>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StandardComponent {
    pub id: i64,
    pub standard_name: String,
    pub component_name: String,
    pub guidance: Option<String>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Record {
    Policy(PolicySection),
    Standard(StandardComponent),
}

/// Analyzed fields across both record kinds.
pub const TEXT_FIELDS: &[&str] = &["comments", "guidance", "text"];

impl Record {
    pub fn category(&self) -> &'static str {
        match self {
            Record::Policy(_) => "policy",
            Record::Standard(_) => "standard",
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            Record::Policy(p) => p.id,
            Record::Standard(s) => s.id,
        }
    }

    pub fn key(&self) -> String { format!("{}:{}", self.category(), self.id()) }

    /// Names are stored verbatim; free text is rich text and goes through the normalizer.
    pub fn into_document(self) -> Document {
        let doc = Document::new(self.key()).keyword("id", self.id().to_string()).keyword("type", self.category());
        match self {
            Record::Policy(p) => doc
                .keyword("sectionName", p.section_name)
                .keyword("policyName", p.policy_name)
                .html_opt("comments", p.comments)
                .html_opt("text", p.text),
            Record::Standard(s) => doc
                .keyword("standardName", s.standard_name)
                .keyword("componentName", s.component_name)
                .html_opt("guidance", s.guidance)
                .html_opt("text", s.text),
        }
    }
}

/// Supplies the full snapshot of records for one index build.
pub trait RecordSource {
    fn records(&self) -> Result<Vec<Record>>;
}

impl RecordSource for Vec<Record> {
    fn records(&self) -> Result<Vec<Record>> { Ok(self.clone()) }
}

/// A `.json`/`.jsonl` file, or a directory tree of them.
#[derive(Debug, Clone)]
pub struct FileSource {
    pub path: PathBuf,
}

impl FileSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self { Self { path: path.as_ref().to_path_buf() } }

    fn files(&self) -> Result<Vec<PathBuf>> {
        let mut files: Vec<PathBuf> = Vec::new();
        if self.path.is_dir() {
            for entry in WalkDir::new(&self.path).sort_by_file_name().into_iter() {
                let entry = entry.with_context(|| format!("walking {}", self.path.display()))?;
                let p = entry.path();
                if p.is_file() && matches!(p.extension().and_then(|s| s.to_str()), Some("json" | "jsonl")) {
                    files.push(p.to_path_buf());
                }
            }
        } else if self.path.is_file() {
            files.push(self.path.clone());
        } else {
            return Err(anyhow!("input path {} does not exist", self.path.display()));
        }
        Ok(files)
    }
}

impl RecordSource for FileSource {
    fn records(&self) -> Result<Vec<Record>> {
        let mut records = Vec::new();
        for file in self.files()? {
            if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
                read_jsonl(&file, &mut records)?;
            } else {
                read_json(&file, &mut records)?;
            }
        }
        let policies = records.iter().filter(|r| matches!(r, Record::Policy(_))).count();
        tracing::info!(path = %self.path.display(), policies, standards = records.len() - policies, "loaded records");
        Ok(records)
    }
}

fn read_jsonl(file: &Path, records: &mut Vec<Record>) -> Result<()> {
    let f = File::open(file).with_context(|| format!("opening {}", file.display()))?;
    for (n, line) in BufReader::new(f).lines().enumerate() {
        let line = line.with_context(|| format!("reading {}", file.display()))?;
        if line.trim().is_empty() { continue; }
        let record: Record =
            serde_json::from_str(&line).with_context(|| format!("{}:{}: invalid record", file.display(), n + 1))?;
        records.push(record);
    }
    Ok(())
}

fn read_json(file: &Path, records: &mut Vec<Record>) -> Result<()> {
    let f = File::open(file).with_context(|| format!("opening {}", file.display()))?;
    let json: serde_json::Value =
        serde_json::from_reader(BufReader::new(f)).with_context(|| format!("parsing {}", file.display()))?;
    match json {
        serde_json::Value::Array(arr) => {
            for (i, v) in arr.into_iter().enumerate() {
                let record: Record =
                    serde_json::from_value(v).with_context(|| format!("{}[{i}]: invalid record", file.display()))?;
                records.push(record);
            }
        }
        serde_json::Value::Object(_) => {
            let record: Record = serde_json::from_value(json).with_context(|| format!("{}: invalid record", file.display()))?;
            records.push(record);
        }
        _ => return Err(anyhow!("{}: expected a record or an array of records", file.display())),
    }
    Ok(())
}
