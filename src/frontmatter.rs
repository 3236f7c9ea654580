//! Markdown frontmatter and the `imports:` field
//!
//! Frontmatter is the YAML block between a leading `---` line and the next
//! `---` line. A file without one has no imports.

use std::path::Path;

use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use tracing::warn;

use crate::error::{Result, WfrefError};

const FENCE: &str = "---";
const IMPORTS_KEY: &str = "imports";

/// One entry of an `imports:` list (serde auto-detects via untagged)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ImportEntry {
    /// `- shared/tools.md#Section`
    Path(String),
    /// `- path: shared/tools.md`
    Object { path: String },
}

impl ImportEntry {
    pub fn path(&self) -> &str {
        match self {
            ImportEntry::Path(p) | ImportEntry::Object { path: p } => p,
        }
    }
}

/// Raw YAML text between the fences, if the document opens with one.
///
/// Tolerates a UTF-8 BOM and CRLF line endings. An unclosed fence means
/// no frontmatter.
pub fn extract_frontmatter(content: &str) -> Option<&str> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let rest = content.strip_prefix(FENCE)?;
    let body = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))?;

    let mut offset = 0;
    for line in body.split_inclusive('\n') {
        if line.trim_end_matches(['\r', '\n']) == FENCE {
            return Some(&body[..offset]);
        }
        offset += line.len();
    }
    None
}

/// Parse the frontmatter of `content` into a mapping.
///
/// `Ok(None)` when there is no frontmatter; an empty block is an empty
/// mapping.
pub fn parse_frontmatter(path: &Path, content: &str) -> Result<Option<Mapping>> {
    let Some(yaml) = extract_frontmatter(content) else {
        return Ok(None);
    };

    let value: Value = serde_yaml::from_str(yaml).map_err(|e| WfrefError::FrontmatterParse {
        path: path.display().to_string(),
        details: e.to_string(),
    })?;

    match value {
        Value::Null => Ok(Some(Mapping::new())),
        Value::Mapping(map) => Ok(Some(map)),
        other => Err(WfrefError::FrontmatterParse {
            path: path.display().to_string(),
            details: format!("expected a mapping, found {}", value_kind(&other)),
        }),
    }
}

/// Entries of the `imports:` list. Items of any other shape are skipped
/// with a warning, as is a non-list `imports` value.
pub fn import_entries(path: &Path, frontmatter: &Mapping) -> Vec<ImportEntry> {
    let Some(imports) = frontmatter.get(IMPORTS_KEY) else {
        return Vec::new();
    };

    let items = match imports {
        Value::Null => return Vec::new(),
        Value::Sequence(items) => items,
        other => {
            warn!(
                file = %path.display(),
                found = value_kind(other),
                "imports must be a list, ignoring"
            );
            return Vec::new();
        }
    };

    items
        .iter()
        .filter_map(|item| match ImportEntry::deserialize(item.clone()) {
            Ok(entry) => Some(entry),
            Err(_) => {
                warn!(
                    file = %path.display(),
                    found = value_kind(item),
                    "import entry must be a path or {{path: ...}}, skipping"
                );
                None
            }
        })
        .collect()
}

/// Drop a `#Section` suffix from an import path
pub fn strip_section(import: &str) -> &str {
    match import.split_once('#') {
        Some((path, _)) => path,
        None => import,
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "list",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}
