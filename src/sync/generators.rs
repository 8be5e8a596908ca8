//! Annotated-source generation from modeling-file tags.
//!
//! Renders one Python class stub per tagged element, preceded by one
//! `@metadata(...)` decorator per attribute, so the result can be read back
//! through the annotated-source adapter and mapped like any other domain
//! file.

use std::path::Path;

use tracing::info;

use crate::error::Result;
use crate::formats::sysml::{MetadataTag, SysmlDocument, TaggedAttribute, TaggedElement};
use crate::io::write_atomic;
use crate::validate::DataType;

const PRELUDE: &str = r#"# Generated from SysMLv2 model
from typing import Any

def metadata(name: str, value: Any, unit: str, dataType: str, metadataTag: str = None, elementPath: str = None):
    def wrapper(cls):
        if not hasattr(cls, 'metadata'):
            cls.metadata = []
        cls.metadata.append({
            "name": name,
            "value": value,
            "unit": unit,
            "dataType": dataType,
            "metadata_tag": metadataTag,
            "elementPath": elementPath or f"{cls.__name__}.{name}",
        })
        return cls
    return wrapper
"#;

/// Generator for annotated source modules.
pub struct SourceGenerator {
    /// Indentation string.
    indent: String,
}

impl SourceGenerator {
    pub fn new() -> Self {
        Self {
            indent: "    ".to_string(),
        }
    }

    /// Set the indentation used inside class bodies.
    pub fn with_indent(mut self, indent: impl Into<String>) -> Self {
        self.indent = indent.into();
        self
    }

    /// Render a complete module for every element the tags mark.
    /// Elements without a matching `part def` are skipped.
    pub fn generate(&self, tags: &[MetadataTag]) -> String {
        let mut out = String::from(PRELUDE);
        for tag in tags {
            for element in tag.elements.iter().filter(|e| e.line.is_some()) {
                out.push_str("\n\n");
                out.push_str(&self.generate_class(&tag.name, element));
            }
        }
        out
    }

    /// Render the decorators and class stub for one element.
    pub fn generate_class(&self, tag: &str, element: &TaggedElement) -> String {
        let mut lines = Vec::new();
        for attribute in &element.attributes {
            lines.push(decorator(tag, attribute));
        }
        if !element.attributes.is_empty() {
            lines.push(String::new());
        }

        lines.push(format!("class {}:", element.name));
        if element.attributes.is_empty() {
            lines.push(format!("{}pass", self.indent));
        } else {
            lines.push(format!("{}def __init__(self, **kwargs):", self.indent));
            for attribute in &element.attributes {
                lines.push(format!(
                    "{}{}self.{} = \"{}\"",
                    self.indent,
                    self.indent,
                    attribute.name,
                    escape(&attribute.value)
                ));
            }
        }
        lines.push(String::new());
        lines.join("\n")
    }

    /// Generate from a modeling file and write the module atomically.
    /// Returns the number of tagged attributes written.
    pub fn generate_file(&self, model: &Path, output: &Path) -> Result<usize> {
        let document = SysmlDocument::open(model)?;
        let tags = document.metadata_tags();
        let count = tags.iter().map(|t| t.attributes().count()).sum();
        write_atomic(output, &self.generate(&tags))?;
        info!(
            model = %model.display(),
            output = %output.display(),
            attributes = count,
            "Generated annotated source"
        );
        Ok(count)
    }
}

impl Default for SourceGenerator {
    fn default() -> Self {
        Self::new()
    }
}

fn decorator(tag: &str, attribute: &TaggedAttribute) -> String {
    format!(
        "@metadata(\"{}\", \"{}\", \"{}\", \"{}\", \"{}\", \"{}\")",
        escape(&attribute.name),
        escape(&attribute.value),
        escape(&attribute.unit),
        declared_type(&attribute.value, attribute.data_type),
        escape(tag),
        escape(&attribute.metadata_path)
    )
}

/// Declared type name for a generated tag: numbers become `int` or `float`
/// depending on whether the text is integral.
fn declared_type(value: &str, data_type: DataType) -> &'static str {
    match data_type {
        DataType::Real | DataType::Integer => {
            if value.trim().parse::<i64>().is_ok() {
                "int"
            } else {
                "float"
            }
        }
        DataType::Boolean => "bool",
        DataType::String => "string",
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
