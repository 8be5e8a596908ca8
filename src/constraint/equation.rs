//! The restricted equation grammar.
//!
//! Only `sum(<list>) <op> <scalar>` is evaluated. Anything else is reported
//! back as unsupported.

use std::sync::LazyLock;

use regex::Regex;

use super::types::Comparison;

static SUM_BOUND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*sum\s*\(\s*(\w+)\s*\)\s*(<=|>=|!=|==|<|>|=)\s*(\w+)\s*;?\s*$")
        .expect("valid regex")
});

static LEADING_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([-+]?(?:\d+\.?\d*|\.\d+)(?:[eE][-+]?\d+)?)").expect("valid regex")
});

static UNIT_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\s*([^\]]*?)\s*\]\s*$").expect("valid regex"));

/// A recognized `sum(list) <op> bound` equation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SumBound {
    pub list: String,
    pub operator: Comparison,
    pub bound: String,
}

impl SumBound {
    /// Recognize the equation shape. `None` for anything else.
    pub fn parse(equation: &str) -> Option<Self> {
        let caps = SUM_BOUND.captures(equation)?;
        Some(Self {
            list: caps[1].to_string(),
            operator: Comparison::from_symbol(&caps[2])?,
            bound: caps[3].to_string(),
        })
    }
}

/// Parse the leading numeric literal of a value such as `1000`, `1000[g]`
/// or `1.5 kg`.
pub fn leading_number(value: &str) -> Option<f64> {
    LEADING_NUMBER.captures(value)?[1].parse().ok()
}

/// A trailing `[unit]`, if present.
pub fn unit_suffix(value: &str) -> Option<&str> {
    UNIT_SUFFIX
        .captures(value)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Factor that converts a mass in `unit` to grams. Missing or unknown units
/// are taken as grams.
pub fn grams_per(unit: Option<&str>) -> f64 {
    match unit.map(str::trim) {
        Some("kg") => 1000.0,
        Some("mg") => 0.001,
        _ => 1.0,
    }
}
