//! Mapping store.
//!
//! A single JSON document holding one bucket of [`ElementRecord`]s per
//! format and the list of [`Mapping`]s between them:
//!
//! ```json
//! {
//!   "SysMLv2": [ ... ],
//!   "GerberJobFile": [ ... ],
//!   "STEP": [ ... ],
//!   "Source Code": [ ... ],
//!   "Mappings": [ { "sourceUUID": "...", "targetUUID": "...", "created": "..." } ]
//! }
//! ```
//!
//! A `(file_path, element_path)` pair is unique within a bucket; registering
//! it again is rejected, never overwritten.

mod file;
mod types;

pub use file::MappingStore;
pub use types::{ElementRecord, Mapping, RegisterOutcome, StoreDocument, StoreStats};
