//! Store document types.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::formats::FormatKind;
use crate::validate::{infer_type, DataType};

/// One tracked element in one format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementRecord {
    pub uuid: Uuid,
    /// Last segment of the element path.
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub unit: String,
    pub datatype: DataType,
    pub element_path: String,
    pub file_path: PathBuf,
    /// Pinned argument position, STEP data records only.
    #[serde(default)]
    pub index: Option<usize>,
    pub created_at: DateTime<Utc>,
    #[serde(rename = "lastModified")]
    pub last_modified: DateTime<Utc>,
}

impl ElementRecord {
    /// Create a record with a fresh id and inferred datatype.
    pub fn new(
        file_path: impl Into<PathBuf>,
        element_path: impl Into<String>,
        value: impl Into<String>,
        unit: impl Into<String>,
    ) -> Self {
        let element_path = element_path.into();
        let value = value.into();
        let now = Utc::now();
        Self {
            uuid: Uuid::new_v4(),
            name: element_path
                .rsplit('.')
                .next()
                .unwrap_or(&element_path)
                .to_string(),
            datatype: infer_type(&value),
            value,
            unit: unit.into(),
            element_path,
            file_path: file_path.into(),
            index: None,
            created_at: now,
            last_modified: now,
        }
    }

    /// Set the pinned index.
    pub fn with_index(mut self, index: Option<usize>) -> Self {
        self.index = index;
        self
    }

    /// Whether this record tracks `element_path` in `file_path`.
    pub fn is_at(&self, file_path: &Path, element_path: &str) -> bool {
        self.file_path == file_path && self.element_path == element_path
    }

    /// Store a new value and unit. Returns whether anything changed;
    /// `last_modified` only moves when it did.
    pub fn set_value(&mut self, value: &str, unit: &str) -> bool {
        if self.value == value && self.unit == unit {
            return false;
        }
        self.value = value.to_string();
        self.unit = unit.to_string();
        self.datatype = infer_type(value);
        self.last_modified = Utc::now();
        true
    }
}

/// A directed link from a domain element to a modeling element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mapping {
    #[serde(rename = "sourceUUID")]
    pub source_uuid: Uuid,
    #[serde(rename = "targetUUID")]
    pub target_uuid: Uuid,
    pub created: DateTime<Utc>,
}

impl Mapping {
    pub fn new(source_uuid: Uuid, target_uuid: Uuid) -> Self {
        Self {
            source_uuid,
            target_uuid,
            created: Utc::now(),
        }
    }
}

/// Result of a registration attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum RegisterOutcome {
    /// Both records and the mapping were stored.
    Registered(Mapping),
    /// A record for this location already exists; nothing was stored.
    Duplicate {
        format: FormatKind,
        file_path: PathBuf,
        element_path: String,
    },
}

impl RegisterOutcome {
    pub fn is_registered(&self) -> bool {
        matches!(self, RegisterOutcome::Registered(_))
    }
}

/// The persisted store: one bucket of records per format plus the mappings.
///
/// Buckets missing from an older document deserialize as empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreDocument {
    #[serde(rename = "SysMLv2", default)]
    pub sysml: Vec<ElementRecord>,
    #[serde(rename = "GerberJobFile", default)]
    pub gerber: Vec<ElementRecord>,
    #[serde(rename = "STEP", default)]
    pub step: Vec<ElementRecord>,
    #[serde(rename = "Source Code", default)]
    pub source_code: Vec<ElementRecord>,
    #[serde(rename = "Mappings", default)]
    pub mappings: Vec<Mapping>,
}

impl StoreDocument {
    /// Records of one format.
    pub fn bucket(&self, kind: FormatKind) -> &[ElementRecord] {
        match kind {
            FormatKind::SysMLv2 => &self.sysml,
            FormatKind::GerberJobFile => &self.gerber,
            FormatKind::Step => &self.step,
            FormatKind::SourceCode => &self.source_code,
        }
    }

    pub fn bucket_mut(&mut self, kind: FormatKind) -> &mut Vec<ElementRecord> {
        match kind {
            FormatKind::SysMLv2 => &mut self.sysml,
            FormatKind::GerberJobFile => &mut self.gerber,
            FormatKind::Step => &mut self.step,
            FormatKind::SourceCode => &mut self.source_code,
        }
    }

    /// Find a record by id in any bucket.
    pub fn find_record(&self, uuid: Uuid) -> Option<(FormatKind, &ElementRecord)> {
        FormatKind::ALL.into_iter().find_map(|kind| {
            self.bucket(kind)
                .iter()
                .find(|r| r.uuid == uuid)
                .map(|r| (kind, r))
        })
    }

    pub fn find_record_mut(&mut self, uuid: Uuid) -> Option<&mut ElementRecord> {
        let kind = self.find_record(uuid)?.0;
        self.bucket_mut(kind).iter_mut().find(|r| r.uuid == uuid)
    }

    /// Find the record tracking a location in one format.
    pub fn find_at(
        &self,
        kind: FormatKind,
        file_path: &Path,
        element_path: &str,
    ) -> Option<&ElementRecord> {
        self.bucket(kind)
            .iter()
            .find(|r| r.is_at(file_path, element_path))
    }

    /// Insert both records and a mapping between them, unless either
    /// location is already tracked in its bucket.
    pub fn insert_mapping(
        &mut self,
        source_kind: FormatKind,
        source: ElementRecord,
        target_kind: FormatKind,
        target: ElementRecord,
    ) -> RegisterOutcome {
        for (kind, record) in [(source_kind, &source), (target_kind, &target)] {
            if self.find_at(kind, &record.file_path, &record.element_path).is_some() {
                return RegisterOutcome::Duplicate {
                    format: kind,
                    file_path: record.file_path.clone(),
                    element_path: record.element_path.clone(),
                };
            }
        }
        let mapping = Mapping::new(source.uuid, target.uuid);
        self.bucket_mut(source_kind).push(source);
        self.bucket_mut(target_kind).push(target);
        self.mappings.push(mapping.clone());
        RegisterOutcome::Registered(mapping)
    }

    /// Total number of records across all buckets.
    pub fn record_count(&self) -> usize {
        FormatKind::ALL.iter().map(|k| self.bucket(*k).len()).sum()
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            records: FormatKind::ALL
                .iter()
                .map(|k| (*k, self.bucket(*k).len()))
                .collect(),
            mappings: self.mappings.len(),
        }
    }
}

/// Record counts per bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub records: BTreeMap<FormatKind, usize>,
    pub mappings: usize,
}

impl StoreStats {
    pub fn count(&self, kind: FormatKind) -> usize {
        self.records.get(&kind).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_new() {
        let r = ElementRecord::new("drone.sysml", "FlightController.max_width", "70", "mm");
        assert_eq!(r.name, "max_width");
        assert_eq!(r.datatype, DataType::Real);
        assert_eq!(r.index, None);
        assert!(r.is_at(Path::new("drone.sysml"), "FlightController.max_width"));
        assert!(!r.is_at(Path::new("other.sysml"), "FlightController.max_width"));

        let s = ElementRecord::new("uav.stp", "DATA.#12", "Motor", "").with_index(Some(1));
        assert_eq!(s.name, "#12");
        assert_eq!(s.datatype, DataType::String);
        assert_eq!(s.index, Some(1));
    }

    #[test]
    fn test_set_value() {
        let mut r = ElementRecord::new("a.gbrjob", "GeneralSpecs.Size.X", "70", "mm");
        let before = r.last_modified;
        assert!(!r.set_value("70", "mm"));
        assert_eq!(r.last_modified, before);
        assert!(r.set_value("abc", ""));
        assert_eq!(r.datatype, DataType::String);
        assert!(r.last_modified >= before);
    }

    #[test]
    fn test_insert_mapping_rejects_duplicates() {
        let mut doc = StoreDocument::default();
        let source = ElementRecord::new("a.gbrjob", "GeneralSpecs.LayerNumber", "4", "");
        let target = ElementRecord::new("d.sysml", "FlightController.layers", "4", "");
        let outcome =
            doc.insert_mapping(FormatKind::GerberJobFile, source, FormatKind::SysMLv2, target);
        assert!(outcome.is_registered());

        let again = ElementRecord::new("a.gbrjob", "GeneralSpecs.LayerNumber", "5", "");
        let other = ElementRecord::new("d.sysml", "FlightController.layer_count", "5", "");
        let outcome =
            doc.insert_mapping(FormatKind::GerberJobFile, again, FormatKind::SysMLv2, other);
        assert_eq!(
            outcome,
            RegisterOutcome::Duplicate {
                format: FormatKind::GerberJobFile,
                file_path: PathBuf::from("a.gbrjob"),
                element_path: "GeneralSpecs.LayerNumber".to_string(),
            }
        );

        // Same path in a different format is a different location.
        let step = ElementRecord::new("a.gbrjob", "GeneralSpecs.LayerNumber", "4", "");
        let target = ElementRecord::new("d.sysml", "FlightController.other", "4", "");
        assert!(doc
            .insert_mapping(FormatKind::Step, step, FormatKind::SysMLv2, target)
            .is_registered());

        let stats = doc.stats();
        assert_eq!(stats.count(FormatKind::GerberJobFile), 1);
        assert_eq!(stats.count(FormatKind::Step), 1);
        assert_eq!(stats.count(FormatKind::SysMLv2), 2);
        assert_eq!(stats.mappings, 2);
        assert_eq!(doc.record_count(), 4);
    }

    #[test]
    fn test_find_record() {
        let mut doc = StoreDocument::default();
        let source = ElementRecord::new("a.py", "FlightController.id", "fc", "");
        let id = source.uuid;
        let target = ElementRecord::new("d.sysml", "FlightController.id", "fc", "");
        doc.insert_mapping(FormatKind::SourceCode, source, FormatKind::SysMLv2, target);

        let (kind, record) = doc.find_record(id).unwrap();
        assert_eq!(kind, FormatKind::SourceCode);
        assert_eq!(record.value, "fc");
        doc.find_record_mut(id).unwrap().set_value("fc2", "");
        assert_eq!(doc.find_record(id).unwrap().1.value, "fc2");
        assert!(doc.find_record(Uuid::new_v4()).is_none());
    }

    #[test]
    fn test_document_json_shape() {
        let mut doc = StoreDocument::default();
        let source = ElementRecord::new("uav.stp", "DATA.#4", "Motor", "").with_index(Some(0));
        let target = ElementRecord::new("d.sysml", "Motor.name", "Motor", "");
        doc.insert_mapping(FormatKind::Step, source, FormatKind::SysMLv2, target);

        let json: serde_json::Value = serde_json::to_value(&doc).unwrap();
        for key in ["SysMLv2", "GerberJobFile", "STEP", "Source Code", "Mappings"] {
            assert!(json.get(key).is_some(), "missing bucket {}", key);
        }
        let record = &json["STEP"][0];
        assert_eq!(record["datatype"], "string");
        assert_eq!(record["index"], 0);
        assert!(record.get("lastModified").is_some());
        assert!(record.get("created_at").is_some());
        assert!(json["Mappings"][0].get("sourceUUID").is_some());

        let legacy: StoreDocument =
            serde_json::from_str(r#"{"SysMLv2": [], "Mappings": []}"#).unwrap();
        assert_eq!(legacy, StoreDocument::default());
    }
}
