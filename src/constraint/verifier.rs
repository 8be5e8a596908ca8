//! Constraint verification against part masses in the model.

use std::path::Path;

use tracing::{debug, info, instrument};

use super::equation::{grams_per, leading_number, unit_suffix, SumBound};
use super::extract::{definitions, find_definition, find_usage, usages};
use super::types::{
    Binding, ConstraintSummary, ConstraintUsage, ConstraintVerdict, MassTerm, VerificationOutcome,
    VerifierConfig,
};
use crate::error::{Error, Result};
use crate::formats::sysml::{StatementKind, SysmlDocument};

/// Evaluates mass-sum constraints declared in a model.
#[derive(Debug, Clone, Default)]
pub struct ConstraintVerifier {
    config: VerifierConfig,
}

impl ConstraintVerifier {
    pub fn new(config: VerifierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    /// All constraint definitions with the usages bound to them.
    pub fn list_constraints(&self, document: &SysmlDocument) -> Vec<ConstraintSummary> {
        let usages = usages(document);
        definitions(document)
            .into_iter()
            .map(|c| ConstraintSummary {
                usages: usages
                    .iter()
                    .filter(|u| u.definition == c.name)
                    .map(|u| u.name.clone())
                    .collect(),
                name: c.name,
                parameters: c.parameters,
                equation: c.equation,
            })
            .collect()
    }

    /// Open a model file and verify one constraint in it.
    pub fn verify_file(&self, path: &Path, name: &str) -> Result<VerificationOutcome> {
        let document = SysmlDocument::open(path)?;
        self.verify(&document, name)
    }

    /// Verify the constraint definition `name` using its first usage.
    ///
    /// # Errors
    /// - `ConstraintNotFound` / `ConstraintUsageNotFound` when either block
    ///   is missing.
    /// - `UnresolvedReference` when a binding or part mass cannot be found.
    #[instrument(skip(self, document), fields(file = %document.path().display()))]
    pub fn verify(&self, document: &SysmlDocument, name: &str) -> Result<VerificationOutcome> {
        let constraint = find_definition(document, name)?;
        let usage = find_usage(document, name)?;

        let Some(equation) = constraint.equation.clone() else {
            return Ok(VerificationOutcome::UnsupportedEquation {
                constraint: constraint.name,
                equation: String::new(),
            });
        };
        let Some(shape) = SumBound::parse(&equation) else {
            info!(constraint = %constraint.name, equation = %equation, "Unsupported equation");
            return Ok(VerificationOutcome::UnsupportedEquation {
                constraint: constraint.name,
                equation,
            });
        };

        let items = match usage.bindings.get(&shape.list) {
            Some(Binding::List(items)) => items.clone(),
            Some(Binding::Scalar { value, .. }) => vec![value.clone()],
            None => return Err(Error::unresolved(&shape.list, "no binding in constraint usage")),
        };
        let terms = items
            .iter()
            .map(|abbreviation| self.mass_term(document, abbreviation))
            .collect::<Result<Vec<_>>>()?;
        let total: f64 = terms.iter().map(|t| t.subtotal).sum();
        let bound = self.bound_value(&usage, &shape.bound)?;
        let satisfied = shape.operator.evaluate(total, bound);

        debug!(total, bound, satisfied, "Evaluated constraint");
        Ok(VerificationOutcome::Evaluated(ConstraintVerdict {
            constraint: constraint.name,
            usage: usage.name,
            equation,
            terms,
            total,
            bound,
            operator: shape.operator,
            satisfied,
        }))
    }

    fn mass_term(&self, document: &SysmlDocument, abbreviation: &str) -> Result<MassTerm> {
        let part = self.config.part_name(abbreviation);
        let definition = document
            .find_part_def(part)
            .ok_or_else(|| Error::unresolved(abbreviation, format!("no part def {}", part)))?;
        let slot = definition
            .child(&self.config.mass_attribute, |k| *k == StatementKind::Attribute)
            .and_then(|s| s.value.as_ref())
            .ok_or_else(|| {
                Error::unresolved(
                    abbreviation,
                    format!("part def {} has no {} attribute", part, self.config.mass_attribute),
                )
            })?;
        let mass = leading_number(&slot.text).ok_or_else(|| {
            Error::unresolved(abbreviation, format!("non-numeric mass '{}'", slot.text))
        })?;

        let unit_mass = mass * grams_per(slot.unit.as_deref());
        let multiplicity = self.config.multiplicity(abbreviation);
        Ok(MassTerm {
            abbreviation: abbreviation.to_string(),
            part: part.to_string(),
            unit_mass,
            multiplicity,
            subtotal: unit_mass * f64::from(multiplicity),
        })
    }

    fn bound_value(&self, usage: &ConstraintUsage, variable: &str) -> Result<f64> {
        let (value, unit) = match usage.bindings.get(variable) {
            Some(Binding::Scalar { value, unit }) => (value.as_str(), unit.as_deref()),
            Some(Binding::List(_)) => return Err(Error::unresolved(variable, "bound is a list")),
            None => return Err(Error::unresolved(variable, "no binding in constraint usage")),
        };
        let number = leading_number(value)
            .ok_or_else(|| Error::unresolved(variable, format!("non-numeric bound '{}'", value)))?;
        Ok(number * grams_per(unit.or_else(|| unit_suffix(value))))
    }
}
