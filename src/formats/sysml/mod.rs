//! SysML v2 textual notation adapter.
//!
//! Recognizes the subset of the notation needed for tagging, reading and
//! in-place value substitution:
//!
//! ```text
//! package Drone {
//!     metadata def PCB;
//!     part def FlightController {
//!         attribute max_width = 70 [mm];
//!     }
//!     @PCB about FlightController;
//! }
//! ```
//!
//! - [`lexer`]: tokens with byte spans
//! - [`parser`]: statement tree
//! - [`document`]: path resolution, `get_value`, `validate_path`, `write_value`
//! - [`tags`]: metadata tag discovery and workspace scans

pub mod document;
pub mod lexer;
pub mod parser;
pub mod tags;

pub use document::{rewrite_file, SysmlDocument, WriteOutcome};
pub use parser::{Statement, StatementKind, Terminator, ValueSlot};
pub use tags::{
    scan_workspace, strip_qualifier, MetadataTag, TaggedAttribute, TaggedElement, WorkspaceTags,
};
