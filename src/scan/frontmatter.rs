//! YAML front-matter extraction.
//!
//! A document may begin with a metadata block fenced by `---` lines:
//!
//! ```text
//! ---
//! title: Alpha
//! date: 2021-01-01
//! keywords: [x, y]
//! categories: notes, rust
//! ---
//! Body text...
//! ```
//!
//! The closing fence may also be `...`. Field extraction is lenient: a
//! list-valued field accepts a YAML sequence or a comma-separated string,
//! and a field of an unexpected type is reported as an issue instead of
//! failing the whole block.

use serde_yaml::{Mapping, Value};
use thiserror::Error;

const FENCE: &str = "---";
const ALT_CLOSE: &str = "...";

#[derive(Debug, Error)]
pub enum FrontMatterError {
    #[error("no front-matter block")]
    Missing,

    #[error("front-matter block has no closing `---`")]
    Unterminated,

    #[error("malformed front-matter: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("front-matter is not a key/value mapping")]
    NotMapping,
}

/// Recognized metadata of one document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrontMatter {
    pub title: Option<String>,
    /// Raw date text; parsing is the scanner's job.
    pub date: Option<String>,
    pub keywords: Vec<String>,
    pub categories: Vec<String>,
    /// Comment byline.
    pub author: Option<String>,
    /// Fields present but of an unusable type.
    pub issues: Vec<String>,
}

/// Split `text` into the YAML block (if any) and the body.
pub fn split(text: &str) -> Result<(Option<&str>, &str), FrontMatterError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut lines = text.split_inclusive('\n');
    let Some(first) = lines.next() else {
        return Ok((None, text));
    };
    if first.trim_end() != FENCE {
        return Ok((None, text));
    }

    let yaml_start = first.len();
    let mut offset = yaml_start;
    for line in lines {
        let trimmed = line.trim_end();
        if trimmed == FENCE || trimmed == ALT_CLOSE {
            let yaml = &text[yaml_start..offset];
            let body = &text[offset + line.len()..];
            return Ok((Some(yaml), body));
        }
        offset += line.len();
    }

    Err(FrontMatterError::Unterminated)
}

/// Parse the front-matter of a document that is expected to have one.
pub fn parse(text: &str) -> Result<(FrontMatter, &str), FrontMatterError> {
    match split(text)? {
        (Some(yaml), body) => Ok((parse_block(yaml)?, body)),
        (None, _) => Err(FrontMatterError::Missing),
    }
}

/// Parse front-matter if present; a document without a block yields
/// empty metadata and the whole text as body.
pub fn parse_optional(text: &str) -> Result<(FrontMatter, &str), FrontMatterError> {
    match split(text)? {
        (Some(yaml), body) => Ok((parse_block(yaml)?, body)),
        (None, body) => Ok((FrontMatter::default(), body)),
    }
}

fn parse_block(yaml: &str) -> Result<FrontMatter, FrontMatterError> {
    let mapping = match serde_yaml::from_str::<Value>(yaml)? {
        Value::Mapping(mapping) => mapping,
        Value::Null => Mapping::new(),
        _ => return Err(FrontMatterError::NotMapping),
    };

    let mut fm = FrontMatter::default();
    fm.title = scalar(&mapping, "title", &mut fm.issues);
    fm.date = scalar(&mapping, "date", &mut fm.issues);
    fm.author = scalar(&mapping, "author", &mut fm.issues);
    fm.keywords = list(&mapping, "keywords", &mut fm.issues);
    fm.categories = list(&mapping, "categories", &mut fm.issues);
    Ok(fm)
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_owned()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn scalar(mapping: &Mapping, key: &str, issues: &mut Vec<String>) -> Option<String> {
    match mapping.get(key) {
        None | Some(Value::Null) => None,
        Some(value) => match scalar_text(value) {
            Some(text) if !text.is_empty() => Some(text),
            Some(_) => None,
            None => {
                issues.push(format!("`{key}` must be a plain value"));
                None
            }
        },
    }
}

fn list(mapping: &Mapping, key: &str, issues: &mut Vec<String>) -> Vec<String> {
    let items: Vec<String> = match mapping.get(key) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::String(s)) => s.split(',').map(str::to_owned).collect(),
        Some(Value::Sequence(seq)) => {
            let mut out = Vec::with_capacity(seq.len());
            for value in seq {
                match scalar_text(value) {
                    Some(text) => out.push(text),
                    None => issues.push(format!("`{key}` entries must be plain values")),
                }
            }
            out
        }
        Some(value) => match scalar_text(value) {
            Some(text) => vec![text],
            None => {
                issues.push(format!("`{key}` must be a list or a comma-separated string"));
                Vec::new()
            }
        },
    };

    items
        .into_iter()
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
        .collect()
}
