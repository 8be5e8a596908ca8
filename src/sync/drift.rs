//! Drift detection between the mapping store and the files it tracks.
//!
//! A dry run of resync: every domain record is re-read and every mapping
//! target compared with its source, without writing to the store or any
//! file.

use std::collections::HashMap;

use tracing::debug;
use uuid::Uuid;

use super::engine::AdapterCache;
use super::types::{Drift, DriftKind, DriftReport};
use crate::config::EngineConfig;
use crate::formats::FormatKind;
use crate::store::{ElementRecord, StoreDocument};

/// Drift detector for one store document.
pub struct DriftDetector<'a> {
    config: &'a EngineConfig,
    adapters: AdapterCache,
}

impl<'a> DriftDetector<'a> {
    /// Create a detector resolving relative paths through `config`.
    pub fn new(config: &'a EngineConfig) -> Self {
        Self {
            config,
            adapters: AdapterCache::default(),
        }
    }

    /// Compare every record and mapping in `document` with the files on disk.
    pub fn detect(mut self, document: &StoreDocument) -> DriftReport {
        let mut report = DriftReport::new();
        let mut current: HashMap<Uuid, String> = HashMap::new();

        for kind in FormatKind::DOMAIN {
            for record in document.bucket(kind) {
                match self.read_domain(kind, record) {
                    Ok(Some(value)) => {
                        report.records_checked += 1;
                        if value != record.value {
                            report.drifts.push(drift(
                                DriftKind::ValueChanged,
                                record,
                                &record.value,
                                Some(value.clone()),
                                format!("{} now holds '{}'", record.element_path, value),
                            ));
                        }
                        current.insert(record.uuid, value);
                    }
                    Ok(None) => report.drifts.push(drift(
                        DriftKind::Unresolvable,
                        record,
                        &record.value,
                        None,
                        "element not found in current content".to_string(),
                    )),
                    Err(reason) => report.drifts.push(drift(
                        DriftKind::Unresolvable,
                        record,
                        &record.value,
                        None,
                        reason,
                    )),
                }
            }
        }

        for mapping in &document.mappings {
            let (Some((_, source)), Some((_, target))) = (
                document.find_record(mapping.source_uuid),
                document.find_record(mapping.target_uuid),
            ) else {
                continue;
            };
            report.mappings_checked += 1;
            let expected = current
                .get(&source.uuid)
                .cloned()
                .unwrap_or_else(|| source.value.clone());

            let path = self.config.resolve(&target.file_path);
            let found = match self.adapters.get(FormatKind::SysMLv2, &path) {
                Ok(adapter) => adapter.get_value(&target.element_path).map_err(|e| e.to_string()),
                Err(reason) => Err(reason.to_string()),
            };
            match found {
                Ok(Some(value)) if value.value == expected => {}
                Ok(found) => {
                    let found = found.map(|v| v.value);
                    let description = match &found {
                        Some(value) => {
                            format!("target holds '{}', source holds '{}'", value, expected)
                        }
                        None => "target attribute not found".to_string(),
                    };
                    report.drifts.push(drift(
                        DriftKind::TargetOutOfDate,
                        target,
                        &expected,
                        found,
                        description,
                    ));
                }
                Err(reason) => report
                    .drifts
                    .push(drift(DriftKind::Unresolvable, target, &expected, None, reason)),
            }
        }

        debug!(
            records = report.records_checked,
            mappings = report.mappings_checked,
            drifts = report.drifts.len(),
            "Drift detection complete"
        );
        report
    }

    fn read_domain(
        &mut self,
        kind: FormatKind,
        record: &ElementRecord,
    ) -> Result<Option<String>, String> {
        let path = self.config.resolve(&record.file_path);
        let adapter = self.adapters.get(kind, &path).map_err(str::to_string)?;
        let index = match record.index {
            Some(index) => Some(index),
            None => adapter
                .resolve_index(&record.element_path, &record.value)
                .ok()
                .flatten(),
        };
        adapter
            .get_indexed_value(&record.element_path, index)
            .map(|v| v.map(|v| v.value.trim().to_string()))
            .map_err(|e| e.to_string())
    }
}

fn drift(
    kind: DriftKind,
    record: &ElementRecord,
    expected: &str,
    found: Option<String>,
    description: String,
) -> Drift {
    Drift {
        kind,
        uuid: record.uuid,
        file_path: record.file_path.clone(),
        element_path: record.element_path.clone(),
        expected: expected.to_string(),
        found,
        description,
    }
}

/// Render a drift report as markdown.
pub fn generate_drift_report(report: &DriftReport) -> String {
    let mut lines = Vec::new();

    lines.push("# Drift Report".to_string());
    lines.push(String::new());
    lines.push(format!("Generated: {}", report.generated_at.to_rfc3339()));
    lines.push(String::new());

    lines.push("## Summary".to_string());
    lines.push(format!("- Records checked: {}", report.records_checked));
    lines.push(format!("- Mappings checked: {}", report.mappings_checked));
    for kind in [
        DriftKind::ValueChanged,
        DriftKind::TargetOutOfDate,
        DriftKind::Unresolvable,
    ] {
        lines.push(format!("- {}: {}", kind, report.by_kind(kind).len()));
    }
    lines.push(String::new());

    if report.has_drift() {
        lines.push("## Details".to_string());
        lines.push(String::new());
        for d in &report.drifts {
            lines.push(format!(
                "- [{}] `{}` in {}: {}",
                d.kind,
                d.element_path,
                d.file_path.display(),
                d.description
            ));
        }
        lines.push(String::new());
    } else {
        lines.push("No drift detected.".to_string());
    }

    lines.join("\n")
}
