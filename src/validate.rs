//! Consistency validation between the two sides of a mapping.
//!
//! Values are carried as text everywhere in the engine; the datatype is
//! inferred from the text. A mapping is only accepted when both sides infer to
//! the same datatype and agree on their unit.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Datatype tag attached to element records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Real,
    Integer,
    Boolean,
    String,
}

impl DataType {
    /// Get the lowercase name used in the store document.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Real => "real",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::String => "string",
        }
    }

    /// Map a declared datatype name (as written in annotated source tags or
    /// model files) onto a tag. Unknown names fall back to `String`.
    pub fn parse_declared(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "float" | "double" | "real" | "f32" | "f64" | "number" => Self::Real,
            "int" | "integer" | "i32" | "i64" | "u32" | "u64" | "natural" => Self::Integer,
            "bool" | "boolean" => Self::Boolean,
            _ => Self::String,
        }
    }

    /// Whether values of this type compare numerically.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Real | Self::Integer)
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Infer the datatype of a textual value: `Real` iff it parses as a
/// floating-point number, otherwise `String`.
pub fn infer_type(value: &str) -> DataType {
    if is_numeric(value) {
        DataType::Real
    } else {
        DataType::String
    }
}

/// Whether the text parses as a finite floating-point number.
pub fn is_numeric(value: &str) -> bool {
    let trimmed = value.trim();
    !trimmed.is_empty() && trimmed.parse::<f64>().map(|v| v.is_finite()).unwrap_or(false)
}

/// The part of an element record the validator looks at.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub element_path: &'a str,
    pub value: &'a str,
    pub unit: &'a str,
}

impl<'a> Candidate<'a> {
    pub fn new(element_path: &'a str, value: &'a str, unit: &'a str) -> Self {
        Self {
            element_path,
            value,
            unit,
        }
    }
}

/// Check that a source and target element may be linked.
///
/// # Errors
/// - `EmptyValue` when either value is blank.
/// - `TypeMismatch` when the inferred datatypes differ.
/// - `UnitMismatch` when exactly one side has a unit, or both have different
///   units. Two empty units agree.
pub fn check(source: Candidate<'_>, target: Candidate<'_>) -> Result<()> {
    for side in [&source, &target] {
        if side.value.trim().is_empty() {
            return Err(Error::EmptyValue {
                element_path: side.element_path.to_string(),
            });
        }
    }

    let source_type = infer_type(source.value);
    let target_type = infer_type(target.value);
    if source_type != target_type {
        return Err(Error::TypeMismatch {
            source_value: source.value.to_string(),
            source_type: source_type.to_string(),
            target_value: target.value.to_string(),
            target_type: target_type.to_string(),
        });
    }

    check_units(source.unit, target.unit)
}

/// Unit agreement on its own. Units compare after trimming, case-sensitively
/// (`mm` and `Mm` are different units).
pub fn check_units(source_unit: &str, target_unit: &str) -> Result<()> {
    let (s, t) = (source_unit.trim(), target_unit.trim());
    if s != t {
        return Err(Error::UnitMismatch {
            source_unit: s.to_string(),
            target_unit: t.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_type() {
        assert_eq!(infer_type("12.5"), DataType::Real);
        assert_eq!(infer_type("70"), DataType::Real);
        assert_eq!(infer_type("-1e3"), DataType::Real);
        assert_eq!(infer_type("abc"), DataType::String);
        assert_eq!(infer_type("12.5mm"), DataType::String);
        assert_eq!(infer_type(""), DataType::String);
        assert_eq!(infer_type("NaN"), DataType::String);
    }

    #[test]
    fn test_parse_declared() {
        assert_eq!(DataType::parse_declared("float"), DataType::Real);
        assert_eq!(DataType::parse_declared("int"), DataType::Integer);
        assert_eq!(DataType::parse_declared("Boolean"), DataType::Boolean);
        assert_eq!(DataType::parse_declared("string"), DataType::String);
        assert_eq!(DataType::parse_declared("whatever"), DataType::String);
    }

    #[test]
    fn test_check_accepts_matching() {
        let source = Candidate::new("GeneralSpecs.Size.X", "12.5", "mm");
        let target = Candidate::new("package.partA.len", "12.5", "mm");
        assert!(check(source, target).is_ok());

        let source = Candidate::new("Header.ProjectId", "Hades", "");
        let target = Candidate::new("Board.project", "Other", "");
        assert!(check(source, target).is_ok());
    }

    #[test]
    fn test_check_type_mismatch() {
        let source = Candidate::new("GeneralSpecs.Size.X", "abc", "mm");
        let target = Candidate::new("package.partA.len", "123", "mm");
        let err = check(source, target).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
        assert!(err.to_string().contains("Datatype mismatch"));
    }

    #[test]
    fn test_check_unit_mismatch() {
        let source = Candidate::new("a", "12.5", "cm");
        let target = Candidate::new("b", "12.5", "mm");
        assert!(matches!(
            check(source, target),
            Err(Error::UnitMismatch { .. })
        ));
    }

    #[test]
    fn test_check_asymmetric_unit() {
        let source = Candidate::new("a", "12.5", "");
        let target = Candidate::new("b", "12.5", "mm");
        assert!(matches!(
            check(source, target),
            Err(Error::UnitMismatch { .. })
        ));
        assert!(matches!(
            check(target, source),
            Err(Error::UnitMismatch { .. })
        ));
    }

    #[test]
    fn test_check_empty_value() {
        let source = Candidate::new("a", "", "mm");
        let target = Candidate::new("b", "", "mm");
        assert!(matches!(
            check(source, target),
            Err(Error::EmptyValue { .. })
        ));
    }
}
