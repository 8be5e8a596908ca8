//! Synchronization between domain files and the modeling files.
//!
//! A mapping links one domain element (job file, CAD exchange file or
//! annotated source) to one modeling attribute. [`SyncEngine::register`]
//! validates and stores such a link; [`SyncEngine::resync`] re-reads every
//! domain element and writes the current values into the mapped attributes.
//!
//! ```text
//! ┌──────────────┐   register    ┌────────────┐   resync    ┌──────────────┐
//! │ domain files │ ────────────► │ store JSON │ ──────────► │ .sysml files │
//! └──────────────┘               └────────────┘             └──────────────┘
//! ```
//!
//! - [`SyncEngine::detect_drift`]: read-only comparison
//! - [`SourceGenerator`]: annotated source from tagged model elements
//! - [`publish_resync`]: commit the files a resync rewrote

mod drift;
mod engine;
mod generators;
mod proptest;
mod publish;
mod types;

pub use drift::{generate_drift_report, DriftDetector};
pub use engine::SyncEngine;
pub use generators::SourceGenerator;
pub use publish::{publish_resync, VersionControl};
pub use types::{
    Drift, DriftKind, DriftReport, ElementDescriptor, ResyncReport, SkippedItem, ValueChange,
};
