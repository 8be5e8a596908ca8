//! File-backed mapping store.
//!
//! Every mutation is a full load-mutate-save of one JSON document. Saves go
//! through a temporary file and an atomic rename, so a crash leaves either
//! the old or the new document on disk.

use std::path::{Path, PathBuf};

use tracing::{debug, info};
use uuid::Uuid;

use super::types::{ElementRecord, Mapping, RegisterOutcome, StoreDocument, StoreStats};
use crate::error::Result;
use crate::formats::FormatKind;
use crate::io::{read_file, write_atomic};

/// Handle to the store document at a fixed path.
///
/// The store assumes exclusive access; concurrent writers must be
/// serialized by the caller.
#[derive(Debug, Clone)]
pub struct MappingStore {
    path: PathBuf,
}

impl MappingStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the empty template if no document exists yet. Returns whether
    /// one was created.
    pub fn create_if_absent(&self) -> Result<bool> {
        if self.path.exists() {
            return Ok(false);
        }
        self.save(&StoreDocument::default())?;
        info!(path = %self.path.display(), "Created mapping store");
        Ok(true)
    }

    /// Load the document. An empty file reads as the empty template.
    pub fn load(&self) -> Result<StoreDocument> {
        let json = read_file(&self.path)?;
        if json.trim().is_empty() {
            return Ok(StoreDocument::default());
        }
        Ok(serde_json::from_str(&json)?)
    }

    /// Replace the document on disk.
    pub fn save(&self, document: &StoreDocument) -> Result<()> {
        let json = serde_json::to_string_pretty(document)?;
        write_atomic(&self.path, &json)?;
        debug!(
            path = %self.path.display(),
            records = document.record_count(),
            mappings = document.mappings.len(),
            "Saved mapping store"
        );
        Ok(())
    }

    /// Load, mutate and save in one cycle. Nothing is written when `f`
    /// fails.
    pub fn update<T>(&self, f: impl FnOnce(&mut StoreDocument) -> Result<T>) -> Result<T> {
        self.create_if_absent()?;
        let mut document = self.load()?;
        let out = f(&mut document)?;
        self.save(&document)?;
        Ok(out)
    }

    /// Store both records and a mapping between them. A location that is
    /// already tracked yields [`RegisterOutcome::Duplicate`] and the document
    /// is left untouched.
    pub fn register(
        &self,
        source_kind: FormatKind,
        source: ElementRecord,
        target_kind: FormatKind,
        target: ElementRecord,
    ) -> Result<RegisterOutcome> {
        self.create_if_absent()?;
        let mut document = self.load()?;
        let outcome = document.insert_mapping(source_kind, source, target_kind, target);
        if outcome.is_registered() {
            self.save(&document)?;
        }
        Ok(outcome)
    }

    pub fn find_record(&self, uuid: Uuid) -> Result<Option<(FormatKind, ElementRecord)>> {
        Ok(self
            .load()?
            .find_record(uuid)
            .map(|(kind, record)| (kind, record.clone())))
    }

    pub fn records(&self, kind: FormatKind) -> Result<Vec<ElementRecord>> {
        Ok(self.load()?.bucket(kind).to_vec())
    }

    pub fn mappings(&self) -> Result<Vec<Mapping>> {
        Ok(self.load()?.mappings)
    }

    pub fn stats(&self) -> Result<StoreStats> {
        Ok(self.load()?.stats())
    }
}
