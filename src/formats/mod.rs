//! Format adapters.
//!
//! One adapter per supported file format. Every adapter resolves a dotted
//! element path against a file's current content and returns its scalar
//! value; only the modeling-notation adapter can write values back.
//!
//! Adapters are built per operation with [`open_adapter`] and hold no
//! mutable state, so a resolution always reflects the file as it was read.
//!
//! - [`sysml`]: SysML v2 textual notation (target format)
//! - [`gerber`]: Gerber job files (JSON)
//! - [`step`]: STEP CAD exchange files
//! - [`source`]: source code carrying `@metadata(...)` tags

pub mod gerber;
pub mod source;
pub mod step;
pub mod sysml;

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub use gerber::GerberJobFile;
pub use source::{AnnotatedSource, SourceTag};
pub use step::StepFile;
pub use sysml::SysmlDocument;

/// The closed set of supported file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FormatKind {
    /// SysML v2 textual notation. Always the target side of a mapping.
    #[serde(rename = "SysMLv2")]
    SysMLv2,
    /// Gerber job file (`.gbrjob`).
    #[serde(rename = "GerberJobFile")]
    GerberJobFile,
    /// STEP exchange file (`.stp`, `.step`).
    #[serde(rename = "STEP")]
    Step,
    /// Annotated source code.
    #[serde(rename = "Source Code")]
    SourceCode,
}

impl FormatKind {
    /// Every format, in store bucket order.
    pub const ALL: [FormatKind; 4] = [
        FormatKind::SysMLv2,
        FormatKind::GerberJobFile,
        FormatKind::Step,
        FormatKind::SourceCode,
    ];

    /// Domain formats, which may appear as the source of a mapping.
    pub const DOMAIN: [FormatKind; 3] = [
        FormatKind::GerberJobFile,
        FormatKind::Step,
        FormatKind::SourceCode,
    ];

    /// Key of this format's bucket in the store document.
    pub fn bucket_name(&self) -> &'static str {
        match self {
            FormatKind::SysMLv2 => "SysMLv2",
            FormatKind::GerberJobFile => "GerberJobFile",
            FormatKind::Step => "STEP",
            FormatKind::SourceCode => "Source Code",
        }
    }

    /// Whether this is a domain (source-side) format.
    pub fn is_domain(&self) -> bool {
        !matches!(self, FormatKind::SysMLv2)
    }

    /// Guess the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(|e| e.parse().ok())
    }
}

impl fmt::Display for FormatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.bucket_name())
    }
}

impl FromStr for FormatKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sysmlv2" | "sysml" => Ok(FormatKind::SysMLv2),
            "gerberjobfile" | "gerber" | "gbrjob" => Ok(FormatKind::GerberJobFile),
            "step" | "stp" => Ok(FormatKind::Step),
            "source code" | "sourcecode" | "source" | "py" | "rs" | "c" | "h" | "cpp" => {
                Ok(FormatKind::SourceCode)
            }
            other => Err(Error::InvalidMapping(format!("unknown format '{}'", other))),
        }
    }
}

/// A scalar read from a file: text value plus optional unit (empty when
/// unitless).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementValue {
    pub value: String,
    pub unit: String,
}

impl ElementValue {
    pub fn new(value: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            unit: unit.into(),
        }
    }
}

/// Read access shared by every format.
///
/// `Ok(None)` means the path does not resolve in the current content.
/// `Err` is reserved for failures the caller did not expect, such as an
/// annotated-source tag that should exist.
pub trait FormatAdapter {
    /// The format this adapter reads.
    fn kind(&self) -> FormatKind;

    /// Resolve `path` and return its value.
    fn get_value(&self, path: &str) -> Result<Option<ElementValue>>;

    /// Resolve `path` using a previously pinned positional index. Only
    /// meaningful for formats with multi-value records.
    fn get_indexed_value(&self, path: &str, index: Option<usize>) -> Result<Option<ElementValue>> {
        let _ = index;
        self.get_value(path)
    }

    /// Find the positional index at which `expected` appears in the record
    /// `path` points to. `Ok(None)` for formats without positional records.
    fn resolve_index(&self, path: &str, expected: &str) -> Result<Option<usize>> {
        let _ = (path, expected);
        Ok(None)
    }
}

/// Read and parse `path` as `kind`.
pub fn open_adapter(kind: FormatKind, path: &Path) -> Result<Box<dyn FormatAdapter>> {
    Ok(match kind {
        FormatKind::SysMLv2 => Box::new(SysmlDocument::open(path)?),
        FormatKind::GerberJobFile => Box::new(GerberJobFile::open(path)?),
        FormatKind::Step => Box::new(StepFile::open(path)?),
        FormatKind::SourceCode => Box::new(AnnotatedSource::open(path)?),
    })
}
