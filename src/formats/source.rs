//! Annotated-source adapter.
//!
//! Source files carry machine-generated tags of a fixed shape:
//!
//! ```text
//! @metadata("max_width", "70", "mm", "int", "PCB", "FlightController.max_width")
//! ```
//!
//! The six arguments are name, value, unit, declared datatype, group tag and
//! element path. Lookups match the element path exactly.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{ElementValue, FormatAdapter, FormatKind};
use crate::error::{Error, Result};
use crate::io::read_file;
use crate::validate::DataType;

static TAG_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@metadata\s*\(").expect("valid regex"));

const TAG_ARITY: usize = 6;

/// One `@metadata(...)` tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceTag {
    pub name: String,
    pub value: String,
    pub unit: String,
    /// Datatype as declared in the tag (`int`, `float`, `string`, ...).
    pub data_type: String,
    pub group_tag: String,
    pub element_path: String,
    /// 1-based line of the tag.
    pub line: usize,
}

impl SourceTag {
    /// The declared datatype mapped onto the validator's types.
    pub fn declared_type(&self) -> DataType {
        DataType::parse_declared(&self.data_type)
    }
}

/// A source file and the tags it carries.
#[derive(Debug, Clone)]
pub struct AnnotatedSource {
    path: PathBuf,
    tags: Vec<SourceTag>,
}

impl AnnotatedSource {
    /// Scan source text that belongs to `path`. Tags with the wrong number
    /// of arguments are skipped.
    pub fn parse(path: impl Into<PathBuf>, content: &str) -> Self {
        let path = path.into();
        let mut tags = Vec::new();

        for m in TAG_START.find_iter(content) {
            let line = content[..m.start()].matches('\n').count() + 1;
            match parse_arguments(&content[m.end()..]) {
                Some(args) if args.len() == TAG_ARITY => {
                    let mut args = args.into_iter();
                    let mut next = || args.next().unwrap_or_default();
                    tags.push(SourceTag {
                        name: next(),
                        value: next(),
                        unit: next(),
                        data_type: next(),
                        group_tag: next(),
                        element_path: next(),
                        line,
                    });
                }
                _ => {
                    warn!(file = %path.display(), line, "Skipping malformed @metadata tag");
                }
            }
        }

        debug!(file = %path.display(), tags = tags.len(), "Scanned annotated source");
        Self { path, tags }
    }

    /// Read and scan a source file.
    pub fn open(path: &Path) -> Result<Self> {
        let content = read_file(path)?;
        Ok(Self::parse(path, &content))
    }

    /// The file this source was read from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every well-formed tag, in file order.
    pub fn list_tags(&self) -> &[SourceTag] {
        &self.tags
    }

    /// First tag whose element path equals `path`.
    pub fn find_tag(&self, path: &str) -> Option<&SourceTag> {
        self.tags.iter().find(|t| t.element_path == path)
    }
}

impl FormatAdapter for AnnotatedSource {
    fn kind(&self) -> FormatKind {
        FormatKind::SourceCode
    }

    /// Tags are generated from the model, so a missing one is an error
    /// rather than a miss.
    fn get_value(&self, path: &str) -> Result<Option<ElementValue>> {
        self.find_tag(path)
            .map(|t| Some(ElementValue::new(t.value.clone(), t.unit.clone())))
            .ok_or_else(|| Error::TagNotFound {
                file: self.path.clone(),
                path: path.to_string(),
            })
    }
}

/// Parse a comma-separated list of quoted strings up to the closing `)`.
/// `None` if anything other than a string literal appears.
fn parse_arguments(rest: &str) -> Option<Vec<String>> {
    let mut chars = rest.chars().peekable();
    let mut args = Vec::new();

    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        match chars.next()? {
            ')' if args.is_empty() => return Some(args),
            quote @ ('"' | '\'') => {
                let mut arg = String::new();
                loop {
                    match chars.next()? {
                        '\\' => arg.push(chars.next()?),
                        c if c == quote => break,
                        c => arg.push(c),
                    }
                }
                args.push(arg);
            }
            _ => return None,
        }
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        match chars.next()? {
            ',' => continue,
            ')' => return Some(args),
            _ => return None,
        }
    }
}
