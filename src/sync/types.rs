//! Type definitions for the synchronization engine.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::formats::FormatKind;
use crate::store::ElementRecord;
use crate::validate::Candidate;

/// One side of a mapping as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementDescriptor {
    pub format: FormatKind,
    pub file_path: PathBuf,
    pub element_path: String,
    pub value: String,
    /// Empty when unitless.
    #[serde(default)]
    pub unit: String,
}

impl ElementDescriptor {
    /// Create a descriptor with an empty value.
    pub fn new(
        format: FormatKind,
        file_path: impl Into<PathBuf>,
        element_path: impl Into<String>,
    ) -> Self {
        Self {
            format,
            file_path: file_path.into(),
            element_path: element_path.into(),
            value: String::new(),
            unit: String::new(),
        }
    }

    /// Set the value and unit.
    pub fn with_value(mut self, value: impl Into<String>, unit: impl Into<String>) -> Self {
        self.value = value.into();
        self.unit = unit.into();
        self
    }

    /// The fields the validator compares.
    pub fn candidate(&self) -> Candidate<'_> {
        Candidate::new(&self.element_path, &self.value, &self.unit)
    }

    /// A fresh store record for this element.
    pub fn to_record(&self) -> ElementRecord {
        ElementRecord::new(
            self.file_path.clone(),
            self.element_path.clone(),
            self.value.trim(),
            self.unit.trim(),
        )
    }
}

/// A stored value that changed during a resync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueChange {
    pub uuid: Uuid,
    pub format: FormatKind,
    pub file_path: PathBuf,
    pub element_path: String,
    pub old_value: String,
    pub new_value: String,
    pub old_unit: String,
    pub new_unit: String,
}

/// A record or mapping that could not be processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedItem {
    /// Record the failure belongs to, when known.
    pub uuid: Option<Uuid>,
    pub file_path: PathBuf,
    pub element_path: String,
    pub reason: String,
}

impl SkippedItem {
    pub fn new(
        uuid: Option<Uuid>,
        file_path: impl Into<PathBuf>,
        element_path: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            uuid,
            file_path: file_path.into(),
            element_path: element_path.into(),
            reason: reason.into(),
        }
    }
}

/// Outcome of one resync pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResyncReport {
    /// Domain records whose value could be read.
    pub records_checked: usize,
    /// Domain values that differed from the store.
    pub changes: Vec<ValueChange>,
    /// Modeling files that were rewritten.
    pub files_written: Vec<PathBuf>,
    /// Mappings whose value was applied to the target file, changed or not.
    pub mappings_applied: usize,
    /// Records and mappings that were skipped.
    pub skipped: Vec<SkippedItem>,
    /// Indices pinned during this pass, by record id.
    pub indices_resolved: Vec<(Uuid, usize)>,
    /// Problems that did not stop a record from being processed.
    pub warnings: Vec<String>,
    /// Whether the store document was saved.
    pub store_saved: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ResyncReport {
    pub(crate) fn new() -> Self {
        let now = Utc::now();
        Self {
            records_checked: 0,
            changes: Vec::new(),
            files_written: Vec::new(),
            mappings_applied: 0,
            skipped: Vec::new(),
            indices_resolved: Vec::new(),
            warnings: Vec::new(),
            store_saved: false,
            started_at: now,
            finished_at: now,
        }
    }

    /// Whether any stored value or file changed.
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty() || !self.files_written.is_empty()
    }

    /// Whether nothing was skipped.
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Kind of drift found by a dry run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriftKind {
    /// The domain file holds a different value than the store.
    ValueChanged,
    /// The domain element or its file could not be read.
    Unresolvable,
    /// The modeling element differs from its mapped source.
    TargetOutOfDate,
}

impl DriftKind {
    pub fn description(&self) -> &'static str {
        match self {
            Self::ValueChanged => "value changed",
            Self::Unresolvable => "unresolvable",
            Self::TargetOutOfDate => "target out of date",
        }
    }
}

impl std::fmt::Display for DriftKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// One drift item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Drift {
    pub kind: DriftKind,
    pub uuid: Uuid,
    pub file_path: PathBuf,
    pub element_path: String,
    /// Value the comparison expected.
    pub expected: String,
    /// Value found, if any.
    pub found: Option<String>,
    pub description: String,
}

/// Result of a dry run over all records and mappings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftReport {
    pub drifts: Vec<Drift>,
    pub records_checked: usize,
    pub mappings_checked: usize,
    pub generated_at: DateTime<Utc>,
}

impl DriftReport {
    pub(crate) fn new() -> Self {
        Self {
            drifts: Vec::new(),
            records_checked: 0,
            mappings_checked: 0,
            generated_at: Utc::now(),
        }
    }

    pub fn has_drift(&self) -> bool {
        !self.drifts.is_empty()
    }

    /// Drifts of one kind.
    pub fn by_kind(&self, kind: DriftKind) -> Vec<&Drift> {
        self.drifts.iter().filter(|d| d.kind == kind).collect()
    }
}
