//! Gerber job file adapter.
//!
//! Job files (`.gbrjob`) are JSON. Elements are addressed by dotted key
//! paths such as `Header.ProjectId` or `GeneralSpecs.Size.X`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use super::{ElementValue, FormatAdapter, FormatKind};
use crate::error::Result;
use crate::io::read_file;

/// A parsed job file.
#[derive(Debug, Clone)]
pub struct GerberJobFile {
    path: PathBuf,
    root: Value,
}

impl GerberJobFile {
    /// Parse job file JSON that belongs to `path`.
    pub fn parse(path: impl Into<PathBuf>, content: &str) -> Result<Self> {
        let path = path.into();
        let root = serde_json::from_str(content)?;
        Ok(Self { path, root })
    }

    /// Read and parse a job file.
    pub fn open(path: &Path) -> Result<Self> {
        let content = read_file(path)?;
        Self::parse(path, &content)
    }

    /// The file this job file was read from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Resolve a dotted path by key descent through nested objects. Any
    /// missing key, or a non-object on the way, yields `None`.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let mut current = &self.root;
        for key in path.split('.') {
            current = current.as_object()?.get(key)?;
        }
        Some(current)
    }

    /// Recursively collect `path -> value` pairs whose key contains any of
    /// `keywords`, inside the given top-level `sections`. Array elements are
    /// addressed as `key[i]`. Missing sections are skipped.
    pub fn search_keywords(
        &self,
        sections: &[&str],
        keywords: &[&str],
    ) -> BTreeMap<String, BTreeMap<String, Value>> {
        let mut found = BTreeMap::new();
        for section in sections {
            let Some(data) = self.root.get(*section) else {
                warn!(section, file = %self.path.display(), "Section not found in job file");
                continue;
            };
            let mut section_data = BTreeMap::new();
            collect_keywords(data, keywords, "", &mut section_data);
            debug!(section, matches = section_data.len(), "Searched job file section");
            found.insert(section.to_string(), section_data);
        }
        found
    }
}

fn collect_keywords(
    data: &Value,
    keywords: &[&str],
    parent: &str,
    out: &mut BTreeMap<String, Value>,
) {
    match data {
        Value::Object(map) => {
            for (key, value) in map {
                let path = if parent.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", parent, key)
                };
                if keywords.iter().any(|k| key.contains(k)) {
                    out.insert(path.clone(), value.clone());
                }
                collect_keywords(value, keywords, &path, out);
            }
        }
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                collect_keywords(item, keywords, &format!("{}[{}]", parent, i), out);
            }
        }
        _ => {}
    }
}

/// Render a JSON scalar as element text. Strings lose their quotes;
/// objects and arrays are rendered as compact JSON.
pub fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

impl FormatAdapter for GerberJobFile {
    fn kind(&self) -> FormatKind {
        FormatKind::GerberJobFile
    }

    fn get_value(&self, path: &str) -> Result<Option<ElementValue>> {
        Ok(self
            .lookup(path)
            .map(|v| ElementValue::new(render_scalar(v), "")))
    }
}
