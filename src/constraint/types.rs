//! Types for constraint extraction and verification.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Part lookup settings for mass-sum constraints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierConfig {
    /// Short names used in constraint usages, mapped to `part def` names.
    pub abbreviations: BTreeMap<String, String>,
    /// How many of a part the assembly contains, by abbreviation.
    /// Abbreviations not listed count once.
    pub multiplicities: BTreeMap<String, u32>,
    /// Attribute holding a part's mass.
    pub mass_attribute: String,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        let abbreviations = [
            ("fc", "FlightController"),
            ("esc", "ElectronicSpeedController"),
            ("m", "Motor"),
            ("p", "Propeller"),
            ("bat", "Battery"),
            ("fr", "Frame"),
            ("cam", "Camera"),
            ("gps", "GPSModule"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let multiplicities = [("m", 4), ("p", 4), ("esc", 4)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();

        Self {
            abbreviations,
            multiplicities,
            mass_attribute: "mass".to_string(),
        }
    }
}

impl VerifierConfig {
    /// Part name for an abbreviation. Unknown abbreviations are taken as the
    /// part name itself.
    pub fn part_name<'a>(&'a self, abbreviation: &'a str) -> &'a str {
        self.abbreviations
            .get(abbreviation)
            .map(String::as_str)
            .unwrap_or(abbreviation)
    }

    pub fn multiplicity(&self, abbreviation: &str) -> u32 {
        self.multiplicities.get(abbreviation).copied().unwrap_or(1)
    }
}

/// Comparison operators allowed in constraint equations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparison {
    Le,
    Ge,
    Lt,
    Gt,
    Eq,
    Ne,
}

impl Comparison {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Some(match symbol {
            "<=" => Self::Le,
            ">=" => Self::Ge,
            "<" => Self::Lt,
            ">" => Self::Gt,
            "=" | "==" => Self::Eq,
            "!=" => Self::Ne,
            _ => return None,
        })
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Le => "<=",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::Eq => "=",
            Self::Ne => "!=",
        }
    }

    pub fn evaluate(&self, lhs: f64, rhs: f64) -> bool {
        match self {
            Self::Le => lhs <= rhs,
            Self::Ge => lhs >= rhs,
            Self::Lt => lhs < rhs,
            Self::Gt => lhs > rhs,
            Self::Eq => (lhs - rhs).abs() < f64::EPSILON * lhs.abs().max(rhs.abs()).max(1.0),
            Self::Ne => !Self::Eq.evaluate(lhs, rhs),
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A `constraint def` block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub name: String,
    /// Formal `in` parameters, in declaration order.
    pub parameters: Vec<String>,
    /// The equation line, when the body has one.
    pub equation: Option<String>,
    pub line: usize,
}

/// A value bound to a constraint parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Binding {
    Scalar { value: String, unit: Option<String> },
    /// `(a, b, c)`
    List(Vec<String>),
}

/// A `constraint <usage> : <Def> { ... }` block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintUsage {
    pub name: String,
    pub definition: String,
    pub bindings: BTreeMap<String, Binding>,
    pub line: usize,
}

/// A constraint as listed for selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintSummary {
    pub name: String,
    pub parameters: Vec<String>,
    pub equation: Option<String>,
    /// Names of the usages bound to this definition.
    pub usages: Vec<String>,
}

/// One resolved list element of a sum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MassTerm {
    pub abbreviation: String,
    pub part: String,
    /// Mass of one part, in grams.
    pub unit_mass: f64,
    pub multiplicity: u32,
    /// `unit_mass * multiplicity`, in grams.
    pub subtotal: f64,
}

/// Everything involved in evaluating a constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintVerdict {
    pub constraint: String,
    pub usage: String,
    pub equation: String,
    pub terms: Vec<MassTerm>,
    /// Sum of all subtotals, in grams.
    pub total: f64,
    /// Right-hand side, in grams.
    pub bound: f64,
    pub operator: Comparison,
    pub satisfied: bool,
}

impl fmt::Display for ConstraintVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} ({}): {}", self.constraint, self.usage, self.equation)?;
        for term in &self.terms {
            writeln!(
                f,
                "  {} -> {}: {} g x {} = {} g",
                term.abbreviation, term.part, term.unit_mass, term.multiplicity, term.subtotal
            )?;
        }
        write!(
            f,
            "  total {} g {} {} g: {}",
            self.total,
            self.operator,
            self.bound,
            if self.satisfied { "satisfied" } else { "violated" }
        )
    }
}

/// Result of verifying one constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VerificationOutcome {
    Evaluated(ConstraintVerdict),
    /// The equation is not of the form `sum(<list>) <op> <scalar>`.
    UnsupportedEquation { constraint: String, equation: String },
}

impl VerificationOutcome {
    /// `Some(satisfied)` for evaluated constraints.
    pub fn satisfied(&self) -> Option<bool> {
        match self {
            Self::Evaluated(verdict) => Some(verdict.satisfied),
            Self::UnsupportedEquation { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = VerifierConfig::default();
        assert_eq!(config.part_name("fc"), "FlightController");
        assert_eq!(config.part_name("gps"), "GPSModule");
        assert_eq!(config.part_name("Gimbal"), "Gimbal");
        assert_eq!(config.multiplicity("m"), 4);
        assert_eq!(config.multiplicity("bat"), 1);
    }

    #[test]
    fn test_config_partial_json() {
        let config: VerifierConfig =
            serde_json::from_str(r#"{"mass_attribute": "weight"}"#).unwrap();
        assert_eq!(config.mass_attribute, "weight");
        assert_eq!(config.multiplicity("p"), 4);
    }

    #[test]
    fn test_comparison() {
        assert_eq!(Comparison::from_symbol("<="), Some(Comparison::Le));
        assert_eq!(Comparison::from_symbol("=="), Some(Comparison::Eq));
        assert_eq!(Comparison::from_symbol("=>"), None);
        assert!(Comparison::Le.evaluate(400.0, 1000.0));
        assert!(!Comparison::Gt.evaluate(400.0, 1000.0));
        assert!(Comparison::Eq.evaluate(0.1 + 0.2, 0.3));
        assert!(Comparison::Ne.evaluate(1.0, 2.0));
    }
}
