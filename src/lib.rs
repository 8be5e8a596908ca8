//! # metasync-core
//!
//! Engineering metadata mapping and synchronization. Values held in domain
//! files (PCB job files, CAD exchange files, annotated source) are linked to
//! attributes of a SysML v2 textual model and kept in step with it.
//!
//! ## Core Components
//!
//! - **Formats**: adapters resolving dotted element paths in each file format
//! - **Store**: JSON document of tracked elements and the mappings between them
//! - **Validate**: datatype and unit agreement checks for new mappings
//! - **Sync**: registration, resync, drift detection and code generation
//! - **Constraint**: evaluation of mass-sum constraints declared in the model
//!
//! ## Example
//!
//! ```rust,ignore
//! use metasync_core::{ElementDescriptor, EngineConfig, FormatKind, SyncEngine};
//!
//! let engine = SyncEngine::new(EngineConfig::from_env());
//! let source =
//!     ElementDescriptor::new(FormatKind::GerberJobFile, "pcb/board.gbrjob", "GeneralSpecs.Size.X")
//!         .with_value("70", "mm");
//! let target =
//!     ElementDescriptor::new(FormatKind::SysMLv2, "se/drone.sysml", "FlightController.max_width")
//!         .with_value("70", "mm");
//! engine.register(&source, &target)?;
//!
//! let report = engine.resync()?;
//! println!("{}", engine.generate_report(&report));
//! ```

pub mod config;
pub mod constraint;
pub mod error;
pub mod formats;
pub mod io;
pub mod store;
pub mod sync;
pub mod validate;

// Re-exports for convenience
pub use config::EngineConfig;
pub use constraint::{ConstraintVerdict, ConstraintVerifier, VerificationOutcome, VerifierConfig};
pub use error::{Error, Result};
pub use formats::{
    open_adapter, AnnotatedSource, ElementValue, FormatAdapter, FormatKind, GerberJobFile,
    StepFile, SysmlDocument,
};
pub use store::{ElementRecord, Mapping, MappingStore, RegisterOutcome, StoreDocument};
pub use sync::{
    publish_resync, DriftReport, ElementDescriptor, ResyncReport, SourceGenerator, SyncEngine,
    VersionControl,
};
pub use validate::DataType;
