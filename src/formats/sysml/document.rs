//! A parsed SysML v2 file: path resolution, value reads and in-place writes.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::lexer::{escape, tokenize, TokenKind};
use super::parser::{parse, Statement, StatementKind, Terminator, ValueSlot};
use crate::error::{Error, Result};
use crate::formats::{ElementValue, FormatAdapter, FormatKind};
use crate::io::{read_file, write_atomic};
use crate::validate::is_numeric;

/// An immutable parse of one modeling file.
///
/// Documents are built per operation; nothing is cached between calls, so
/// two callers never observe each other's stale content.
#[derive(Debug, Clone)]
pub struct SysmlDocument {
    path: PathBuf,
    source: String,
    statements: Vec<Statement>,
}

/// Result of [`SysmlDocument::write_value`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    /// Full document text after the edit.
    pub content: String,
    /// Whether the text differs from the original.
    pub changed: bool,
    /// 1-based line that was (or would have been) edited.
    pub line: usize,
}

impl SysmlDocument {
    /// Parse modeling text that belongs to `path`.
    pub fn parse(path: impl Into<PathBuf>, source: impl Into<String>) -> Result<Self> {
        let source = source.into();
        let statements = parse(&source)?;
        Ok(Self {
            path: path.into(),
            source,
            statements,
        })
    }

    /// Read and parse a modeling file.
    pub fn open(path: &Path) -> Result<Self> {
        let source = read_file(path)?;
        Self::parse(path, source)
    }

    /// The file this document was read from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The raw source text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Top-level statements.
    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    /// All statements, depth-first in document order.
    pub fn walk(&self) -> Vec<&Statement> {
        fn visit<'s>(statements: &'s [Statement], out: &mut Vec<&'s Statement>) {
            for statement in statements {
                out.push(statement);
                visit(statement.children(), out);
            }
        }
        let mut out = Vec::new();
        visit(&self.statements, &mut out);
        out
    }

    /// Find the first `part def <name>` anywhere in the document.
    pub fn find_part_def(&self, name: &str) -> Option<&Statement> {
        self.walk()
            .into_iter()
            .find(|s| s.kind == StatementKind::PartDef && s.name.as_deref() == Some(name))
    }

    /// Resolve a dotted element path to its statement.
    ///
    /// The first segment may name a structural element at any depth; each
    /// further segment must be a direct child inside the previous segment's
    /// `{ }` body. Every candidate for the first segment is tried in document
    /// order and the first complete resolution wins.
    pub fn resolve(&self, path: &str) -> Result<&Statement> {
        let segments: Vec<&str> = path.split('.').map(str::trim).collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(Error::not_found(&self.path, path));
        }

        let mut last_err = None;
        for anchor in self.walk().into_iter().filter(|s| {
            s.kind.is_structural() && s.name.as_deref() == Some(segments[0])
        }) {
            match self.descend(anchor, path, &segments[1..]) {
                Ok(found) => return Ok(found),
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| Error::not_found(&self.path, path)))
    }

    fn descend<'s>(
        &self,
        current: &'s Statement,
        path: &str,
        rest: &[&str],
    ) -> Result<&'s Statement> {
        let Some((next, remaining)) = rest.split_first() else {
            return Ok(current);
        };
        let segment = current.name.clone().unwrap_or_default();
        if current.body.is_none() {
            return Err(Error::structural(
                path,
                segment,
                "non-terminal segment has no opening brace",
            ));
        }
        match current.child(next, StatementKind::is_structural) {
            Some(child) => self.descend(child, path, remaining),
            None => Err(Error::not_found(&self.path, path)),
        }
    }

    /// Check that a path names a leaf element: every non-terminal segment
    /// opens exactly one block, and the final segment either ends with `;`
    /// or is an attribute.
    pub fn validate_path(&self, path: &str) -> bool {
        match self.resolve(path) {
            Ok(statement) => {
                statement.terminator == Terminator::Semicolon
                    || statement.kind == StatementKind::Attribute
            }
            Err(e) => {
                debug!(path, error = %e, "Element path rejected");
                false
            }
        }
    }

    /// Read an attribute value. `None` when the path does not resolve to an
    /// attribute carrying a value.
    pub fn get_value(&self, path: &str) -> Option<ElementValue> {
        let statement = self.resolve(path).ok()?;
        if statement.kind != StatementKind::Attribute {
            return None;
        }
        let slot = statement.value.as_ref()?;
        Some(ElementValue::new(
            slot.text.clone(),
            slot.unit.clone().unwrap_or_default(),
        ))
    }

    /// Replace an attribute's value in the source text.
    ///
    /// Only the bytes of the value (and its unit) change; the rest of the
    /// line, neighbouring lines and the line count are untouched. The unit is
    /// written as ` [unit]` only when the new value is numeric and a unit was
    /// supplied. String literals stay quoted, and any value that is not a
    /// bare number or identifier is written quoted and escaped. When the
    /// attribute already holds the requested value and unit the content is
    /// returned unchanged.
    pub fn write_value(&self, path: &str, value: &str, unit: &str) -> Result<WriteOutcome> {
        let statement = self.resolve(path)?;
        let segment = path.rsplit('.').next().unwrap_or(path);
        if statement.kind != StatementKind::Attribute {
            return Err(Error::structural(path, segment, "not an attribute"));
        }
        let slot = statement
            .value
            .as_ref()
            .ok_or_else(|| Error::structural(path, segment, "attribute has no value"))?;

        let value = value.trim();
        let numeric = is_numeric(value);
        let new_unit = if numeric { unit.trim() } else { "" };
        let old_unit = slot.unit.as_deref().unwrap_or("");

        if slot.text == value && old_unit == new_unit {
            return Ok(WriteOutcome {
                content: self.source.clone(),
                changed: false,
                line: statement.line,
            });
        }

        let mut replacement = if writes_bare(value, slot) {
            value.to_string()
        } else {
            format!("\"{}\"", escape(value))
        };
        if !new_unit.is_empty() {
            let separator = match slot.unit_span {
                Some(unit_span) => &self.source[slot.span.end..unit_span.start],
                None => " ",
            };
            replacement.push_str(separator);
            replacement.push('[');
            replacement.push_str(new_unit);
            replacement.push(']');
        }

        let range = slot.full_span();
        let mut content = String::with_capacity(self.source.len() + replacement.len());
        content.push_str(&self.source[..range.start]);
        content.push_str(&replacement);
        content.push_str(&self.source[range.end..]);

        let changed = content != self.source;
        Ok(WriteOutcome {
            content,
            changed,
            line: statement.line,
        })
    }
}

impl FormatAdapter for SysmlDocument {
    fn kind(&self) -> FormatKind {
        FormatKind::SysMLv2
    }

    fn get_value(&self, path: &str) -> Result<Option<ElementValue>> {
        Ok(SysmlDocument::get_value(self, path))
    }
}

/// Whether `value` can replace the slot without quotes: it must lex as a
/// single number (optionally signed) or, in a slot that is neither quoted nor
/// numeric, a single plain identifier. Anything else is written as a string
/// literal so it cannot change the surrounding structure.
fn writes_bare(value: &str, slot: &ValueSlot) -> bool {
    if slot.quoted {
        return false;
    }
    let Ok(tokens) = tokenize(value) else {
        return false;
    };
    let covers_value = tokens.first().is_some_and(|t| t.span.start == 0)
        && tokens.last().is_some_and(|t| t.span.end == value.len())
        && tokens.windows(2).all(|w| w[0].span.end == w[1].span.start);
    if !covers_value {
        return false;
    }
    match tokens.as_slice() {
        [n] if n.kind == TokenKind::Number => true,
        [sign, n] => {
            (sign.is_symbol("-") || sign.is_symbol("+")) && n.kind == TokenKind::Number
        }
        [ident] => {
            ident.kind == TokenKind::Ident && !value.starts_with('\'') && !slot.numeric
        }
        _ => false,
    }
}

/// Apply one value write to a modeling file on disk. The file is replaced
/// atomically and only when its content changes. Returns whether it did.
pub fn rewrite_file(path: &Path, element_path: &str, value: &str, unit: &str) -> Result<bool> {
    let document = SysmlDocument::open(path)?;
    let outcome = document.write_value(element_path, value, unit)?;
    if outcome.changed {
        write_atomic(path, &outcome.content)?;
        info!(
            file = %path.display(),
            element_path,
            line = outcome.line,
            "Rewrote modeling attribute"
        );
    }
    Ok(outcome.changed)
}
