//! Synchronization engine.
//!
//! Registers mappings between domain elements and modeling elements, and
//! propagates domain values into the modeling files on resync.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::drift::DriftDetector;
use super::types::{DriftReport, ElementDescriptor, ResyncReport, SkippedItem, ValueChange};
use crate::config::EngineConfig;
use crate::constraint::{ConstraintVerifier, VerificationOutcome};
use crate::error::{Error, Result};
use crate::formats::step::{StepFile, StepPath};
use crate::formats::sysml::{scan_workspace, SysmlDocument, WorkspaceTags};
use crate::formats::{open_adapter, FormatAdapter, FormatKind};
use crate::io::{read_file, write_atomic};
use crate::store::{ElementRecord, MappingStore, RegisterOutcome, StoreDocument};
use crate::validate::{self, is_numeric};

type OpenResult = std::result::Result<Box<dyn FormatAdapter>, String>;

/// Adapters opened during one pass, one per distinct file. Open failures
/// are remembered so a broken file is reported once per record without
/// being re-read.
#[derive(Default)]
pub(super) struct AdapterCache {
    adapters: HashMap<(FormatKind, PathBuf), OpenResult>,
}

impl AdapterCache {
    pub(super) fn get(
        &mut self,
        kind: FormatKind,
        path: &Path,
    ) -> std::result::Result<&dyn FormatAdapter, &str> {
        let entry = self
            .adapters
            .entry((kind, path.to_path_buf()))
            .or_insert_with(|| {
                open_adapter(kind, path).map_err(|e| {
                    warn!(
                        format = %kind,
                        file = %path.display(),
                        error = %e,
                        "Could not open file"
                    );
                    e.to_string()
                })
            });
        match entry {
            Ok(adapter) => Ok(&**adapter),
            Err(reason) => Err(reason.as_str()),
        }
    }
}

/// A modeling-file edit queued for one mapping.
struct PendingWrite {
    target_uuid: Uuid,
    element_path: String,
    value: String,
    unit: String,
}

/// The synchronization engine.
///
/// Holds no parsed file state between calls; every operation reads the
/// store and the files it needs afresh.
#[derive(Debug, Clone)]
pub struct SyncEngine {
    config: EngineConfig,
    store: MappingStore,
}

impl SyncEngine {
    /// Create an engine using the store at `config.store_path`.
    pub fn new(config: EngineConfig) -> Self {
        let store = MappingStore::new(config.resolved_store_path());
        Self { config, store }
    }

    /// Use a different store.
    pub fn with_store(mut self, store: MappingStore) -> Self {
        self.store = store;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &MappingStore {
        &self.store
    }

    /// Link a domain element to a modeling element.
    ///
    /// The source must be a domain format and the target a modeling element.
    /// Both values are validated before anything is stored; a location that
    /// is already tracked yields [`RegisterOutcome::Duplicate`] without
    /// modifying the store.
    ///
    /// # Errors
    /// - `InvalidMapping` for the wrong formats on either side.
    /// - `EmptyValue`, `TypeMismatch`, `UnitMismatch` from validation.
    #[instrument(
        skip(self, source, target),
        fields(source = %source.element_path, target = %target.element_path)
    )]
    pub fn register(
        &self,
        source: &ElementDescriptor,
        target: &ElementDescriptor,
    ) -> Result<RegisterOutcome> {
        if !source.format.is_domain() {
            return Err(Error::InvalidMapping(format!(
                "source must be a domain element, got {}",
                source.format
            )));
        }
        if target.format != FormatKind::SysMLv2 {
            return Err(Error::InvalidMapping(format!(
                "target must be a {} element, got {}",
                FormatKind::SysMLv2,
                target.format
            )));
        }
        validate::check(source.candidate(), target.candidate())?;

        let mut source_record = source.to_record();
        if source.format == FormatKind::Step {
            source_record.index = self.pin_index(source);
        }

        let outcome = self
            .store
            .register(source.format, source_record, target.format, target.to_record())?;
        match &outcome {
            RegisterOutcome::Registered(mapping) => info!(
                source_uuid = %mapping.source_uuid,
                target_uuid = %mapping.target_uuid,
                "Registered mapping"
            ),
            RegisterOutcome::Duplicate {
                format,
                file_path,
                element_path,
            } => warn!(
                format = %format,
                file = %file_path.display(),
                element_path = %element_path,
                "Element already tracked, mapping not registered"
            ),
        }
        Ok(outcome)
    }

    /// Pin the argument position of a STEP data record. Left unset when the
    /// file cannot be read or the value is not found exactly once; resync
    /// retries later.
    fn pin_index(&self, source: &ElementDescriptor) -> Option<usize> {
        if !matches!(StepPath::parse(&source.element_path), Some(StepPath::Data { .. })) {
            return None;
        }
        let path = self.config.resolve(&source.file_path);
        let resolved = StepFile::open(&path)
            .and_then(|f| f.resolve_index(&source.element_path, source.value.trim()));
        match resolved {
            Ok(index) => index,
            Err(e) => {
                warn!(element_path = %source.element_path, error = %e, "Index not pinned");
                None
            }
        }
    }

    /// Re-read every domain element and propagate values into the modeling
    /// files.
    ///
    /// Every domain record is refreshed from its file. Then, for each
    /// mapping, the target attribute is set to the source's current value.
    /// Each modeling file is read once and written at most once, and only
    /// when its content changes, so running resync again without domain
    /// changes touches nothing. Failures are recorded in the report and
    /// skipped; only store I/O errors abort the pass.
    #[instrument(skip(self), fields(store = %self.store.path().display()))]
    pub fn resync(&self) -> Result<ResyncReport> {
        self.store.create_if_absent()?;
        let mut document = self.store.load()?;
        let mut report = ResyncReport::new();
        let mut adapters = AdapterCache::default();
        let mut dirty = false;

        for kind in FormatKind::DOMAIN {
            for record in document.bucket_mut(kind).iter_mut() {
                dirty |= self.refresh_record(kind, record, &mut adapters, &mut report);
            }
        }
        dirty |= self.apply_mappings(&mut document, &mut report);

        if dirty {
            self.store.save(&document)?;
            report.store_saved = true;
        }
        report.finished_at = Utc::now();
        info!(
            checked = report.records_checked,
            changed = report.changes.len(),
            files_written = report.files_written.len(),
            skipped = report.skipped.len(),
            "Resync complete"
        );
        Ok(report)
    }

    /// Refresh one domain record. Returns whether the record changed.
    fn refresh_record(
        &self,
        kind: FormatKind,
        record: &mut ElementRecord,
        adapters: &mut AdapterCache,
        report: &mut ResyncReport,
    ) -> bool {
        let path = self.config.resolve(&record.file_path);
        let adapter = match adapters.get(kind, &path) {
            Ok(adapter) => adapter,
            Err(reason) => {
                report.skipped.push(SkippedItem::new(
                    Some(record.uuid),
                    &record.file_path,
                    &record.element_path,
                    reason,
                ));
                return false;
            }
        };

        let mut changed = false;
        if kind == FormatKind::Step && record.index.is_none() {
            match adapter.resolve_index(&record.element_path, &record.value) {
                Ok(Some(index)) => {
                    record.index = Some(index);
                    report.indices_resolved.push((record.uuid, index));
                    changed = true;
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(element_path = %record.element_path, error = %e, "Index not pinned");
                    report
                        .warnings
                        .push(format!("{}: {}", record.element_path, e));
                }
            }
        }

        match adapter.get_indexed_value(&record.element_path, record.index) {
            Ok(Some(current)) => {
                report.records_checked += 1;
                let value = current.value.trim();
                // Formats without unit information keep the registered unit.
                let unit = if current.unit.is_empty() {
                    record.unit.clone()
                } else {
                    current.unit
                };
                let (old_value, old_unit) = (record.value.clone(), record.unit.clone());
                if record.set_value(value, &unit) {
                    info!(
                        file = %record.file_path.display(),
                        element_path = %record.element_path,
                        old = %old_value,
                        new = %value,
                        "Domain value changed"
                    );
                    report.changes.push(ValueChange {
                        uuid: record.uuid,
                        format: kind,
                        file_path: record.file_path.clone(),
                        element_path: record.element_path.clone(),
                        old_value,
                        new_value: record.value.clone(),
                        old_unit,
                        new_unit: record.unit.clone(),
                    });
                    changed = true;
                }
            }
            Ok(None) => {
                warn!(
                    file = %path.display(),
                    element_path = %record.element_path,
                    "Element not found"
                );
                report.skipped.push(SkippedItem::new(
                    Some(record.uuid),
                    &record.file_path,
                    &record.element_path,
                    "element not found in current content",
                ));
            }
            Err(e) => {
                warn!(
                    file = %path.display(),
                    element_path = %record.element_path,
                    error = %e,
                    "Element lookup failed"
                );
                report.skipped.push(SkippedItem::new(
                    Some(record.uuid),
                    &record.file_path,
                    &record.element_path,
                    e.to_string(),
                ));
            }
        }
        changed
    }

    /// Write current source values into the mapped modeling attributes.
    /// Returns whether any target record changed.
    fn apply_mappings(&self, document: &mut StoreDocument, report: &mut ResyncReport) -> bool {
        let mut by_file: BTreeMap<PathBuf, Vec<PendingWrite>> = BTreeMap::new();
        for mapping in &document.mappings {
            let source = document.find_record(mapping.source_uuid);
            let target = document.find_record(mapping.target_uuid);
            let (Some((_, source)), Some((FormatKind::SysMLv2, target))) = (source, target) else {
                warn!(
                    source_uuid = %mapping.source_uuid,
                    target_uuid = %mapping.target_uuid,
                    "Mapping references a missing record"
                );
                report.skipped.push(SkippedItem::new(
                    Some(mapping.source_uuid),
                    PathBuf::new(),
                    String::new(),
                    "mapping references a missing record",
                ));
                continue;
            };
            let unit = if is_numeric(&source.value) {
                source.unit.clone()
            } else {
                String::new()
            };
            by_file
                .entry(self.config.resolve(&target.file_path))
                .or_default()
                .push(PendingWrite {
                    target_uuid: target.uuid,
                    element_path: target.element_path.clone(),
                    value: source.value.clone(),
                    unit,
                });
        }

        let mut dirty = false;
        for (path, writes) in by_file {
            let original = match read_file(&path) {
                Ok(content) => content,
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "Modeling file unavailable");
                    for write in &writes {
                        report.skipped.push(SkippedItem::new(
                            Some(write.target_uuid),
                            &path,
                            &write.element_path,
                            e.to_string(),
                        ));
                    }
                    continue;
                }
            };

            let mut content = original.clone();
            let mut applied = Vec::new();
            for write in writes {
                let outcome = SysmlDocument::parse(&path, content.clone()).and_then(|doc| {
                    doc.write_value(&write.element_path, &write.value, &write.unit)
                });
                match outcome {
                    Ok(outcome) => {
                        debug!(
                            element_path = %write.element_path,
                            changed = outcome.changed,
                            line = outcome.line,
                            "Applied mapping"
                        );
                        if outcome.changed {
                            content = outcome.content;
                        }
                        applied.push(write);
                    }
                    Err(e) => {
                        warn!(
                            file = %path.display(),
                            element_path = %write.element_path,
                            error = %e,
                            "Could not apply mapping"
                        );
                        report.skipped.push(SkippedItem::new(
                            Some(write.target_uuid),
                            &path,
                            &write.element_path,
                            e.to_string(),
                        ));
                    }
                }
            }

            if content != original {
                if let Err(e) = write_atomic(&path, &content) {
                    warn!(file = %path.display(), error = %e, "Could not write modeling file");
                    for write in &applied {
                        report.skipped.push(SkippedItem::new(
                            Some(write.target_uuid),
                            &path,
                            &write.element_path,
                            e.to_string(),
                        ));
                    }
                    continue;
                }
                info!(file = %path.display(), mappings = applied.len(), "Rewrote modeling file");
                report.files_written.push(path.clone());
            }

            report.mappings_applied += applied.len();
            for write in applied {
                if let Some(target) = document.find_record_mut(write.target_uuid) {
                    dirty |= target.set_value(&write.value, &write.unit);
                }
            }
        }
        dirty
    }

    /// Report what a resync would change, without writing anything.
    #[instrument(skip(self), fields(store = %self.store.path().display()))]
    pub fn detect_drift(&self) -> Result<DriftReport> {
        let document = if self.store.path().exists() {
            self.store.load()?
        } else {
            StoreDocument::default()
        };
        Ok(DriftDetector::new(&self.config).detect(&document))
    }

    /// Discover metadata tags in every modeling file under `base_dir`.
    pub fn scan_tags(&self, patterns: &[&str]) -> Result<WorkspaceTags> {
        scan_workspace(&self.config.base_dir, patterns)
    }

    /// Verify a constraint in a modeling file using the configured part
    /// lookup settings.
    pub fn verify_constraint(&self, model: &Path, name: &str) -> Result<VerificationOutcome> {
        ConstraintVerifier::new(self.config.verifier.clone())
            .verify_file(&self.config.resolve(model), name)
    }

    /// Render a resync report as markdown.
    pub fn generate_report(&self, report: &ResyncReport) -> String {
        let mut lines = Vec::new();

        lines.push("# Resync Report".to_string());
        lines.push(String::new());

        lines.push("## Summary".to_string());
        lines.push(format!("- Records checked: {}", report.records_checked));
        lines.push(format!("- Values changed: {}", report.changes.len()));
        lines.push(format!("- Mappings applied: {}", report.mappings_applied));
        lines.push(format!("- Files written: {}", report.files_written.len()));
        lines.push(format!("- Skipped: {}", report.skipped.len()));
        lines.push(format!("- Warnings: {}", report.warnings.len()));
        lines.push(format!(
            "- Duration: {} ms",
            (report.finished_at - report.started_at).num_milliseconds()
        ));
        lines.push(String::new());

        if !report.changes.is_empty() {
            lines.push("## Changed Values".to_string());
            lines.push(String::new());
            for change in &report.changes {
                lines.push(format!(
                    "- [{}] `{}` in {}: {} -> {}",
                    change.format,
                    change.element_path,
                    change.file_path.display(),
                    with_unit(&change.old_value, &change.old_unit),
                    with_unit(&change.new_value, &change.new_unit),
                ));
            }
            lines.push(String::new());
        }

        if !report.files_written.is_empty() {
            lines.push("## Files Written".to_string());
            lines.push(String::new());
            for file in &report.files_written {
                lines.push(format!("- {}", file.display()));
            }
            lines.push(String::new());
        }

        if !report.warnings.is_empty() {
            lines.push("## Warnings".to_string());
            lines.push(String::new());
            for warning in &report.warnings {
                lines.push(format!("- {}", warning));
            }
            lines.push(String::new());
        }

        if !report.skipped.is_empty() {
            lines.push("## Skipped".to_string());
            lines.push(String::new());
            for item in &report.skipped {
                lines.push(format!(
                    "- `{}` in {}: {}",
                    item.element_path,
                    item.file_path.display(),
                    item.reason
                ));
            }
            lines.push(String::new());
        }

        lines.join("\n")
    }
}

fn with_unit(value: &str, unit: &str) -> String {
    if unit.is_empty() {
        value.to_string()
    } else {
        format!("{} [{}]", value, unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::ElementValue;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;
    use tempfile::TempDir;

    const MODEL: &str = r#"package Drone {
    part def FlightController {
        attribute id = "fc-000";
        attribute max_width = 60 [mm]; // board width
        attribute layers = 2;
        attribute vendor = "unknown";
    }
    part def Motor {
        attribute name = "M0";
    }
}
"#;

    const JOB: &str = r#"{
        "Header": {"ProjectId": {"Name": "Hades_project"}},
        "GeneralSpecs": {"Size": {"X": 70, "Y": 55}, "LayerNumber": 4}
    }"#;

    const STEP: &str = "ISO-10303-21;
HEADER;
FILE_NAME('Agri_UAV2','Jane','',(''),'','FreeCAD','');
ENDSEC;
DATA;
#4 = PRODUCT('M2207','Motor','',(#5));
ENDSEC;
END-ISO-10303-21;
";

    const SOURCE: &str = r#"@metadata("id", "fc-001", "", "string", "PCB", "FlightController.id")
class FlightController:
    pass
"#;

    struct Fixture {
        temp: TempDir,
        engine: SyncEngine,
    }

    impl Fixture {
        fn new() -> Self {
            let temp = TempDir::new().unwrap();
            std::fs::create_dir_all(temp.path().join("se")).unwrap();
            std::fs::write(temp.path().join("se/drone.sysml"), MODEL).unwrap();
            std::fs::write(temp.path().join("board.gbrjob"), JOB).unwrap();
            std::fs::write(temp.path().join("uav.stp"), STEP).unwrap();
            std::fs::write(temp.path().join("fc.py"), SOURCE).unwrap();
            let config = EngineConfig {
                store_path: PathBuf::from("metadata/metadata.json"),
                base_dir: temp.path().to_path_buf(),
                ..Default::default()
            };
            Self {
                temp,
                engine: SyncEngine::new(config),
            }
        }

        fn model(&self) -> String {
            std::fs::read_to_string(self.temp.path().join("se/drone.sysml")).unwrap()
        }

        fn target(path: &str, value: &str, unit: &str) -> ElementDescriptor {
            ElementDescriptor::new(FormatKind::SysMLv2, "se/drone.sysml", path)
                .with_value(value, unit)
        }

        fn gerber(path: &str, value: &str, unit: &str) -> ElementDescriptor {
            ElementDescriptor::new(FormatKind::GerberJobFile, "board.gbrjob", path)
                .with_value(value, unit)
        }
    }

    #[test]
    fn test_register_rejects_wrong_sides() {
        let f = Fixture::new();
        let model = Fixture::target("FlightController.layers", "2", "");
        let job = Fixture::gerber("GeneralSpecs.LayerNumber", "4", "");
        assert!(matches!(f.engine.register(&model, &model), Err(Error::InvalidMapping(_))));
        assert!(matches!(f.engine.register(&job, &job), Err(Error::InvalidMapping(_))));
        assert!(!f.engine.store().path().exists());
    }

    #[test]
    fn test_register_validation_leaves_store_unchanged() {
        let f = Fixture::new();
        f.engine
            .register(
                &Fixture::gerber("GeneralSpecs.LayerNumber", "4", ""),
                &Fixture::target("FlightController.layers", "2", ""),
            )
            .unwrap();
        let before = f.engine.store().stats().unwrap();

        let err = f
            .engine
            .register(
                &Fixture::gerber("Header.ProjectId.Name", "Hades_project", ""),
                &Fixture::target("FlightController.max_width", "60", "mm"),
            )
            .unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));

        let err = f
            .engine
            .register(
                &Fixture::gerber("GeneralSpecs.Size.X", "70", ""),
                &Fixture::target("FlightController.max_width", "60", "mm"),
            )
            .unwrap_err();
        assert!(matches!(err, Error::UnitMismatch { .. }));

        assert_eq!(f.engine.store().stats().unwrap(), before);
    }

    #[test]
    fn test_resync_propagates_and_is_idempotent() {
        let f = Fixture::new();
        f.engine
            .register(
                &Fixture::gerber("GeneralSpecs.Size.X", "60", "mm"),
                &Fixture::target("FlightController.max_width", "60", "mm"),
            )
            .unwrap();
        f.engine
            .register(
                &Fixture::gerber("GeneralSpecs.LayerNumber", "2", ""),
                &Fixture::target("FlightController.layers", "2", ""),
            )
            .unwrap();

        let report = f.engine.resync().unwrap();
        assert_eq!(report.records_checked, 2);
        assert_eq!(report.changes.len(), 2);
        assert_eq!(report.mappings_applied, 2);
        assert_eq!(report.files_written.len(), 1);
        assert!(report.is_complete());
        assert!(report.store_saved);

        let model = f.model();
        assert!(model.contains("        attribute max_width = 70 [mm]; // board width\n"));
        assert!(model.contains("        attribute layers = 4;\n"));
        assert_eq!(model.lines().count(), MODEL.lines().count());

        let targets = f.engine.store().records(FormatKind::SysMLv2).unwrap();
        assert!(targets
            .iter()
            .any(|r| r.element_path == "FlightController.max_width" && r.value == "70"));

        let again = f.engine.resync().unwrap();
        assert!(!again.has_changes());
        assert!(!again.store_saved);
        assert_eq!(again.mappings_applied, 2);
        assert_eq!(f.model(), model);
    }

    #[test]
    fn test_resync_all_domain_formats() {
        let f = Fixture::new();
        let step =
            ElementDescriptor::new(FormatKind::Step, "uav.stp", "DATA.#4").with_value("M2207", "");
        f.engine
            .register(&step, &Fixture::target("Motor.name", "M0", ""))
            .unwrap();
        let author = ElementDescriptor::new(FormatKind::Step, "uav.stp", "FILE_NAME.author")
            .with_value("Jane", "");
        f.engine
            .register(&author, &Fixture::target("FlightController.vendor", "unknown", ""))
            .unwrap();
        let source =
            ElementDescriptor::new(FormatKind::SourceCode, "fc.py", "FlightController.id")
                .with_value("fc-001", "");
        f.engine
            .register(&source, &Fixture::target("FlightController.id", "fc-000", ""))
            .unwrap();

        let records = f.engine.store().records(FormatKind::Step).unwrap();
        let pinned = records.iter().find(|r| r.element_path == "DATA.#4").unwrap();
        assert_eq!(pinned.index, Some(0));

        let report = f.engine.resync().unwrap();
        assert!(report.is_complete(), "{:?}", report.skipped);
        let model = f.model();
        assert!(model.contains(r#"attribute name = "M2207";"#));
        assert!(model.contains(r#"attribute vendor = "Jane";"#));
        assert!(model.contains(r#"attribute id = "fc-001";"#));
    }

    #[test]
    fn test_resync_picks_up_domain_change() {
        let f = Fixture::new();
        f.engine
            .register(
                &Fixture::gerber("GeneralSpecs.Size.X", "70", "mm"),
                &Fixture::target("FlightController.max_width", "60", "mm"),
            )
            .unwrap();
        f.engine.resync().unwrap();

        std::fs::write(
            f.temp.path().join("board.gbrjob"),
            JOB.replace("\"X\": 70", "\"X\": 12.5"),
        )
        .unwrap();
        let report = f.engine.resync().unwrap();
        assert_eq!(report.changes.len(), 1);
        assert_eq!(report.changes[0].old_value, "70");
        assert_eq!(report.changes[0].new_value, "12.5");
        assert_eq!(report.changes[0].new_unit, "mm");

        let doc = SysmlDocument::open(&f.temp.path().join("se/drone.sysml")).unwrap();
        let value = doc.get_value("FlightController.max_width").unwrap();
        assert_eq!(value.value, "12.5");
        assert_eq!(value.unit, "mm");

        let text = f.engine.generate_report(&report);
        assert!(text.contains("# Resync Report"));
        assert!(text.contains("`GeneralSpecs.Size.X` in board.gbrjob: 70 [mm] -> 12.5 [mm]"));
    }

    #[test]
    fn test_resync_skips_failures_and_continues() {
        let f = Fixture::new();
        f.engine
            .register(
                &Fixture::gerber("GeneralSpecs.LayerNumber", "4", ""),
                &Fixture::target("FlightController.layers", "2", ""),
            )
            .unwrap();
        let gone =
            ElementDescriptor::new(FormatKind::GerberJobFile, "gone.gbrjob", "GeneralSpecs.Size.Y")
                .with_value("55", "");
        f.engine
            .register(&gone, &Fixture::target("FlightController.vendor_id", "1", ""))
            .unwrap();
        let missing_target = ElementDescriptor::new(FormatKind::SysMLv2, "se/missing.sysml", "A.b")
            .with_value("55", "");
        f.engine
            .register(&Fixture::gerber("GeneralSpecs.Size.Y", "55", ""), &missing_target)
            .unwrap();

        let report = f.engine.resync().unwrap();
        assert!(f.model().contains("attribute layers = 4;"));
        assert_eq!(report.files_written.len(), 1);
        // Missing domain file, unresolvable target attribute, missing target file.
        assert_eq!(report.skipped.len(), 3);
        assert!(report
            .skipped
            .iter()
            .any(|s| s.file_path == Path::new("gone.gbrjob")));
    }

    #[test]
    fn test_duplicate_registration() {
        let f = Fixture::new();
        let source = Fixture::gerber("GeneralSpecs.LayerNumber", "4", "");
        let outcome = f
            .engine
            .register(&source, &Fixture::target("FlightController.layers", "2", ""))
            .unwrap();
        assert!(outcome.is_registered());
        let outcome = f
            .engine
            .register(&source, &Fixture::target("FlightController.other", "2", ""))
            .unwrap();
        assert!(matches!(
            outcome,
            RegisterOutcome::Duplicate {
                format: FormatKind::GerberJobFile,
                ..
            }
        ));
        assert_eq!(f.engine.store().stats().unwrap().count(FormatKind::GerberJobFile), 1);
    }

    #[test]
    fn test_thousand_registrations() {
        let f = Fixture::new();
        for i in 0..1000 {
            let source =
                Fixture::gerber(&format!("Stackup.Layer{}.Thickness", i), &i.to_string(), "mm");
            let target = Fixture::target(&format!("Board.layer{}", i), &i.to_string(), "mm");
            assert!(f.engine.register(&source, &target).unwrap().is_registered());
        }
        let document = f.engine.store().load().unwrap();
        assert_eq!(document.gerber.len(), 1000);
        assert_eq!(document.sysml.len(), 1000);
        assert_eq!(document.mappings.len(), 1000);

        let ids: HashSet<Uuid> = document
            .gerber
            .iter()
            .chain(document.sysml.iter())
            .map(|r| r.uuid)
            .collect();
        assert_eq!(ids.len(), 2000);
    }

    #[test]
    fn test_adapter_cache_reuses_open_results() {
        let f = Fixture::new();
        let job = f.temp.path().join("board.gbrjob");
        let mut cache = AdapterCache::default();

        let first = cache.get(FormatKind::GerberJobFile, &job).map(|a| a.kind());
        assert_eq!(first, Ok(FormatKind::GerberJobFile));
        std::fs::remove_file(&job).unwrap();
        let again = cache
            .get(FormatKind::GerberJobFile, &job)
            .map(|a| a.get_value("GeneralSpecs.LayerNumber").unwrap());
        assert_eq!(again, Ok(Some(ElementValue::new("4", ""))));

        let missing = f.temp.path().join("gone.gbrjob");
        assert!(cache.get(FormatKind::GerberJobFile, &missing).is_err());
        std::fs::write(&missing, "{}").unwrap();
        assert!(cache.get(FormatKind::GerberJobFile, &missing).is_err());
    }

    #[test]
    fn test_scan_tags() {
        let f = Fixture::new();
        std::fs::write(
            f.temp.path().join("se/tagged.sysml"),
            concat!(
                "package P {\n",
                "    metadata def PCB;\n",
                "    part def Board {\n",
                "        attribute layers = 4;\n",
                "    }\n",
                "    @PCB about Board;\n",
                "}\n",
            ),
        )
        .unwrap();
        let tags = f.engine.scan_tags(&["se/*.sysml"]).unwrap();
        assert_eq!(tags.files.len(), 2);
        assert_eq!(tags.tag_count(), 1);
        assert!(tags.failures.is_empty());
    }

    #[test]
    fn test_verify_constraint_through_engine() {
        let f = Fixture::new();
        std::fs::write(
            f.temp.path().join("se/mass.sysml"),
            r#"package Drone {
    part def Motor {
        attribute mass = 50 [g];
    }
    constraint def Limit {
        in parts : MassValue[*];
        in max : MassValue;
        sum(parts) <= max
    }
    constraint limit : Limit {
        in parts = (m, m);
        in max = 100 [g];
    }
}
"#,
        )
        .unwrap();
        let outcome = f.engine.verify_constraint(Path::new("se/mass.sysml"), "Limit").unwrap();
        assert_eq!(outcome.satisfied(), Some(false));
    }
}
