//! Property-based tests for registration and resync using proptest.
//!
//! These tests exercise the engine against real files in a temporary
//! directory and check that:
//!
//! - A registered value reaches the modeling file, and resync is idempotent
//! - Rejected registrations leave the store untouched
//! - A unit on only one side is always rejected
//! - A tracked location is stored once however often it is registered
//! - Value writes never disturb neighbouring lines
//! - Arbitrary text written into a bare identifier slot reads back intact

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use proptest::prelude::*;
    use tempfile::TempDir;

    use crate::config::EngineConfig;
    use crate::error::Error;
    use crate::formats::{FormatKind, SysmlDocument};
    use crate::store::RegisterOutcome;
    use crate::sync::{ElementDescriptor, SyncEngine};

    const MODEL: &str = concat!(
        "package Board {\n",
        "    part def PCB {\n",
        "        attribute label = \"none\";\n",
        "        attribute width = 1 [mm]; // outline\n",
        "        attribute count = 0;\n",
        "        attribute finish = hasl;\n",
        "    }\n",
        "}\n",
    );

    fn engine(temp: &TempDir, job: &str) -> SyncEngine {
        std::fs::write(temp.path().join("board.sysml"), MODEL).unwrap();
        std::fs::write(temp.path().join("job.gbrjob"), job).unwrap();
        SyncEngine::new(EngineConfig {
            base_dir: temp.path().to_path_buf(),
            store_path: PathBuf::from("metadata.json"),
            ..Default::default()
        })
    }

    fn gerber(path: &str, value: &str, unit: &str) -> ElementDescriptor {
        ElementDescriptor::new(FormatKind::GerberJobFile, "job.gbrjob", path)
            .with_value(value, unit)
    }

    fn model(path: &str, value: &str, unit: &str) -> ElementDescriptor {
        ElementDescriptor::new(FormatKind::SysMLv2, "board.sysml", path).with_value(value, unit)
    }

    // Strategy for decimal values as a job file would hold them
    fn number() -> impl Strategy<Value = f64> {
        prop_oneof![
            Just(0.0),
            (1u32..100_000).prop_map(f64::from),
            (1u32..100_000).prop_map(|n| f64::from(n) / 8.0),
        ]
    }

    // Strategy for plain text values that never parse as numbers
    fn text() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_-]{0,12}".prop_filter("not a number", |s| s.parse::<f64>().is_err())
    }

    // Strategy for any single line of printable text, as a user might type it
    fn printable() -> impl Strategy<Value = String> {
        "[ -~]{1,24}".prop_filter("trimmed and non-empty", |s| {
            let trimmed = s.trim();
            !trimmed.is_empty() && trimmed == s
        })
    }

    fn unit() -> impl Strategy<Value = String> {
        prop_oneof![Just("mm".to_string()), Just("g".to_string()), Just("V".to_string())]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        /// Resync writes the source value into the target, and a second
        /// resync changes nothing.
        #[test]
        fn resync_propagates_and_is_idempotent(width in number(), unit in unit()) {
            let temp = TempDir::new().unwrap();
            let job = format!(r#"{{"GeneralSpecs": {{"Size": {{"X": {}}}}}}}"#, width);
            let engine = engine(&temp, &job);
            let current = width.to_string();

            engine
                .register(
                    &gerber("GeneralSpecs.Size.X", &current, &unit),
                    &model("PCB.width", "1", &unit),
                )
                .unwrap();
            engine.resync().unwrap();

            let path = temp.path().join("board.sysml");
            let written = std::fs::read_to_string(&path).unwrap();
            let value = SysmlDocument::parse(&path, written.clone())
                .unwrap()
                .get_value("PCB.width")
                .unwrap();
            prop_assert_eq!(value.value, current);
            prop_assert_eq!(value.unit, unit);
            prop_assert_eq!(written.lines().count(), MODEL.lines().count());

            let again = engine.resync().unwrap();
            prop_assert!(again.files_written.is_empty());
            prop_assert!(!again.store_saved);
            prop_assert_eq!(std::fs::read_to_string(&path).unwrap(), written);
        }

        /// A datatype mismatch is rejected and nothing is stored.
        #[test]
        fn type_mismatch_leaves_store_unchanged(
            number in number(),
            label in text(),
            flip in any::<bool>(),
        ) {
            let temp = TempDir::new().unwrap();
            let engine = engine(&temp, "{}");
            engine.register(&gerber("Seed.A", "1", ""), &model("PCB.count", "0", "")).unwrap();
            let before = engine.store().stats().unwrap();

            let number = number.to_string();
            let (source, target) = if flip { (&number, &label) } else { (&label, &number) };
            let err = engine
                .register(&gerber("Header.Value", source, ""), &model("PCB.label", target, ""))
                .unwrap_err();
            let is_type_mismatch = matches!(err, Error::TypeMismatch { .. });
            prop_assert!(is_type_mismatch);
            prop_assert_eq!(engine.store().stats().unwrap(), before);
        }

        /// A unit on exactly one side is rejected in either direction.
        #[test]
        fn one_sided_unit_is_rejected(
            number in number(),
            unit in unit(),
            on_source in any::<bool>(),
        ) {
            let temp = TempDir::new().unwrap();
            let engine = engine(&temp, "{}");
            let value = number.to_string();
            let (source_unit, target_unit) = if on_source {
                (unit.as_str(), "")
            } else {
                ("", unit.as_str())
            };
            let err = engine
                .register(
                    &gerber("GeneralSpecs.Size.Y", &value, source_unit),
                    &model("PCB.width", &value, target_unit),
                )
                .unwrap_err();
            let is_unit_mismatch = matches!(err, Error::UnitMismatch { .. });
            prop_assert!(is_unit_mismatch);
        }

        /// Registering the same location repeatedly stores it once.
        #[test]
        fn duplicate_location_stored_once(repeats in 2usize..5, value in number()) {
            let temp = TempDir::new().unwrap();
            let engine = engine(&temp, "{}");
            let value = value.to_string();
            let source = gerber("GeneralSpecs.Thickness", &value, "mm");

            let mut registered = 0;
            for i in 0..repeats {
                let target = model(&format!("PCB.thickness{}", i), &value, "mm");
                if let RegisterOutcome::Registered(_) = engine.register(&source, &target).unwrap() {
                    registered += 1;
                }
            }
            prop_assert_eq!(registered, 1);
            prop_assert_eq!(engine.store().stats().unwrap().count(FormatKind::GerberJobFile), 1);
            prop_assert_eq!(engine.store().stats().unwrap().mappings, 1);
        }

        /// Writing a value changes only the line that holds it.
        #[test]
        fn write_value_preserves_other_lines(value in number(), unit in unit()) {
            let document = SysmlDocument::parse("board.sysml", MODEL).unwrap();
            let value = value.to_string();
            let outcome = document.write_value("PCB.width", &value, &unit).unwrap();

            let before: Vec<&str> = MODEL.lines().collect();
            let after: Vec<&str> = outcome.content.lines().collect();
            prop_assert_eq!(before.len(), after.len());
            for (i, (b, a)) in before.iter().zip(after.iter()).enumerate() {
                if i + 1 != outcome.line {
                    prop_assert_eq!(b, a);
                }
            }
            let expected = format!("        attribute width = {} [{}]; // outline", value, unit);
            prop_assert_eq!(after[outcome.line - 1], expected.as_str());
        }

        /// Any printable text written over a bare identifier reads back
        /// exactly, and the rest of the model keeps its structure.
        #[test]
        fn written_text_reads_back_intact(value in printable()) {
            let document = SysmlDocument::parse("board.sysml", MODEL).unwrap();
            let outcome = document.write_value("PCB.finish", &value, "").unwrap();
            prop_assert_eq!(outcome.content.lines().count(), MODEL.lines().count());

            let reread = SysmlDocument::parse("board.sysml", outcome.content).unwrap();
            let finish = reread.get_value("PCB.finish").unwrap();
            prop_assert_eq!(finish.value, value);
            prop_assert_eq!(finish.unit, "");
            for path in ["PCB.label", "PCB.width", "PCB.count"] {
                prop_assert_eq!(reread.get_value(path), document.get_value(path));
            }
            prop_assert!(!reread.validate_path("PCB.evil"));
        }
    }
}
