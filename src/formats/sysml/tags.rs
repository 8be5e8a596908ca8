//! Metadata tag discovery.
//!
//! A tag is declared with `metadata def <Tag>` (with or without a body) and
//! applied with `@<Tag> about a, b;` or `metadata <Tag> about a, b;`. Each
//! referenced element is looked up as a `part def` and its attributes are
//! extracted. Tags are derived on every read and never stored on their own.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::document::SysmlDocument;
use super::parser::{StatementKind, Terminator};
use crate::error::Result;
use crate::validate::{infer_type, DataType};

/// One attribute extracted from a tagged part definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedAttribute {
    pub name: String,
    pub value: String,
    pub unit: String,
    pub data_type: DataType,
    /// `<Part>.<attribute>`
    pub metadata_path: String,
    /// Name of the tag that selected the part.
    pub metadata_tag: String,
    /// 1-based line of the attribute statement.
    pub line: usize,
}

/// An element referenced by an `about` clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedElement {
    /// Reference as written, possibly namespace-qualified.
    pub reference: String,
    /// Last `::` segment of the reference.
    pub name: String,
    /// Line of the matching `part def`, if one exists.
    pub line: Option<usize>,
    /// Line of the closing brace of the `part def` body.
    pub end_line: Option<usize>,
    pub attributes: Vec<TaggedAttribute>,
}

/// A declared metadata tag and everything it marks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataTag {
    pub name: String,
    /// Line of the `metadata def`.
    pub line: usize,
    /// Whether the definition has a `{ }` body.
    pub has_body: bool,
    pub elements: Vec<TaggedElement>,
}

impl MetadataTag {
    /// All attributes across all tagged elements.
    pub fn attributes(&self) -> impl Iterator<Item = &TaggedAttribute> {
        self.elements.iter().flat_map(|e| e.attributes.iter())
    }
}

/// Strip namespace qualifiers, keeping the last `::` segment.
pub fn strip_qualifier(reference: &str) -> &str {
    reference.rsplit("::").next().unwrap_or(reference).trim()
}

impl SysmlDocument {
    /// Discover every metadata tag and the attributes of the elements it
    /// marks. Tags without any `about` usage are returned with no elements.
    pub fn metadata_tags(&self) -> Vec<MetadataTag> {
        let all = self.walk();
        let mut tags = Vec::new();

        for def in all.iter().filter(|s| s.kind == StatementKind::MetadataDef) {
            let Some(tag_name) = def.name.clone() else {
                continue;
            };
            let mut elements = Vec::new();

            for usage in all.iter().filter(|s| {
                s.kind == StatementKind::MetadataUsage
                    && s.name.as_deref().map(strip_qualifier) == Some(tag_name.as_str())
            }) {
                for reference in &usage.targets {
                    elements.push(self.tagged_element(reference, &tag_name));
                }
            }

            debug!(tag = %tag_name, elements = elements.len(), "Discovered metadata tag");
            tags.push(MetadataTag {
                name: tag_name,
                line: def.line,
                has_body: def.terminator == Terminator::Body,
                elements,
            });
        }
        tags
    }

    fn tagged_element(&self, reference: &str, tag_name: &str) -> TaggedElement {
        let name = strip_qualifier(reference).to_string();
        let Some(part) = self.find_part_def(&name) else {
            warn!(tag = tag_name, element = %name, "Tagged element has no part def");
            return TaggedElement {
                reference: reference.to_string(),
                name,
                line: None,
                end_line: None,
                attributes: Vec::new(),
            };
        };

        let attributes = part
            .children()
            .iter()
            .filter(|s| s.kind == StatementKind::Attribute)
            .filter_map(|s| {
                let attr_name = s.name.clone()?;
                let slot = s.value.as_ref().filter(|v| v.assigned)?;
                Some(TaggedAttribute {
                    metadata_path: format!("{}.{}", name, attr_name),
                    name: attr_name,
                    value: slot.text.clone(),
                    unit: slot.unit.clone().unwrap_or_default(),
                    data_type: infer_type(&slot.text),
                    metadata_tag: tag_name.to_string(),
                    line: s.line,
                })
            })
            .collect();

        let end_line = self.source()[..part.span.end].lines().count();
        TaggedElement {
            reference: reference.to_string(),
            line: Some(part.line),
            end_line: Some(end_line),
            name,
            attributes,
        }
    }

    /// 1-based line numbers covered by tagged part definitions, sorted and
    /// deduplicated. Used by viewers to highlight tagged content.
    pub fn tagged_lines(&self) -> Vec<usize> {
        let mut lines: Vec<usize> = self
            .metadata_tags()
            .iter()
            .flat_map(|tag| tag.elements.iter())
            .filter_map(|e| Some(e.line?..=e.end_line?))
            .flatten()
            .collect();
        lines.sort_unstable();
        lines.dedup();
        lines
    }
}

/// Tags discovered across a directory of modeling files.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkspaceTags {
    /// Tags per file, keyed by path relative to the scan root.
    pub files: BTreeMap<PathBuf, Vec<MetadataTag>>,
    /// Files that could not be read or parsed, with the reason.
    pub failures: Vec<(PathBuf, String)>,
}

impl WorkspaceTags {
    /// Total number of tags found.
    pub fn tag_count(&self) -> usize {
        self.files.values().map(Vec::len).sum()
    }
}

/// Scan every modeling file matching `patterns` under `root`
/// (default pattern `**/*.sysml`) and collect their tags.
pub fn scan_workspace(root: &Path, patterns: &[&str]) -> Result<WorkspaceTags> {
    let patterns: Vec<&str> = if patterns.is_empty() {
        vec!["**/*.sysml"]
    } else {
        patterns.to_vec()
    };
    let mut result = WorkspaceTags::default();

    for pattern in patterns {
        let full_pattern = root.join(pattern);
        let Ok(entries) = glob::glob(full_pattern.to_str().unwrap_or("")) else {
            warn!(pattern, "Invalid glob pattern");
            continue;
        };
        for entry in entries.flatten() {
            let rel_path = entry.strip_prefix(root).unwrap_or(&entry).to_path_buf();
            match SysmlDocument::open(&entry) {
                Ok(document) => {
                    result.files.insert(rel_path, document.metadata_tags());
                }
                Err(e) => {
                    warn!(file = %entry.display(), error = %e, "Skipping unreadable model");
                    result.failures.push((rel_path, e.to_string()));
                }
            }
        }
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const MODEL: &str = r#"package Drone {
    metadata def PCB;
    metadata def Mechanical {
        attribute owner : String;
    }
    metadata def Unused;

    part def FlightController {
        attribute id = "fc-001";
        attribute max_width = 70 [mm];
        attribute mass = 60.5[g];
    }
    part def ElectronicSpeedController {
        attribute max_current = 30 [A];
    }
    part def Frame {
        attribute material = "carbon";
    }

    @PCB about FlightController, Drone::ElectronicSpeedController;
    metadata Mechanical about Drone::Frame, Ghost;
}
"#;

    fn doc() -> SysmlDocument {
        SysmlDocument::parse("drone.sysml", MODEL).unwrap()
    }

    #[test]
    fn test_metadata_tags() {
        let tags = doc().metadata_tags();
        let names: Vec<&str> = tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["PCB", "Mechanical", "Unused"]);

        let pcb = &tags[0];
        assert!(!pcb.has_body);
        assert_eq!(pcb.elements.len(), 2);
        assert_eq!(pcb.elements[1].reference, "Drone::ElectronicSpeedController");
        assert_eq!(pcb.elements[1].name, "ElectronicSpeedController");

        let attrs: Vec<&TaggedAttribute> = pcb.attributes().collect();
        assert_eq!(attrs.len(), 4);
        assert_eq!(attrs[0].value, "fc-001");
        assert_eq!(attrs[0].data_type, DataType::String);
        assert_eq!(attrs[1].metadata_path, "FlightController.max_width");
        assert_eq!(attrs[1].unit, "mm");
        assert_eq!(attrs[1].data_type, DataType::Real);
        assert_eq!(attrs[2].value, "60.5");
        assert_eq!(attrs[3].metadata_tag, "PCB");

        let mechanical = &tags[1];
        assert!(mechanical.has_body);
        assert_eq!(mechanical.elements[0].attributes[0].value, "carbon");
        assert!(mechanical.elements[1].line.is_none());

        assert!(tags[2].elements.is_empty());
    }

    #[test]
    fn test_typed_attributes_are_not_tagged() {
        let source = r#"metadata def PCB;
part def Board {
    attribute layers : Real;
    attribute width = 70 [mm];
}
@PCB about Board;
"#;
        let document = SysmlDocument::parse("board.sysml", source).unwrap();
        let tags = document.metadata_tags();
        let attrs: Vec<&TaggedAttribute> = tags[0].attributes().collect();
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs[0].name, "width");
        assert_eq!(attrs[0].value, "70");
    }

    #[test]
    fn test_tagged_lines() {
        let lines = doc().tagged_lines();
        // FlightController (8-12), ESC (13-15), Frame (16-18)
        assert_eq!(lines, (8..=18).collect::<Vec<_>>());
    }

    #[test]
    fn test_strip_qualifier() {
        assert_eq!(strip_qualifier("A::B::Motor"), "Motor");
        assert_eq!(strip_qualifier("Motor"), "Motor");
    }

    #[test]
    fn test_scan_workspace() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("se")).unwrap();
        std::fs::write(temp.path().join("se/drone.sysml"), MODEL).unwrap();
        std::fs::write(temp.path().join("broken.sysml"), "part def A {").unwrap();
        std::fs::write(temp.path().join("notes.txt"), "metadata def X;").unwrap();

        let result = scan_workspace(temp.path(), &[]).unwrap();
        assert_eq!(result.files.len(), 1);
        assert_eq!(result.tag_count(), 3);
        assert_eq!(result.failures.len(), 1);
        assert!(result.files.contains_key(Path::new("se/drone.sysml")));
    }
}
