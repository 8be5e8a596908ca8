//! Constraint definitions and usages from a parsed model.

use std::collections::BTreeMap;

use tracing::debug;

use super::types::{Binding, Constraint, ConstraintUsage};
use crate::error::{Error, Result};
use crate::formats::sysml::parser::{join_tokens, Statement};
use crate::formats::sysml::{strip_qualifier, StatementKind, SysmlDocument};

/// Every `constraint def` in the document.
pub fn definitions(document: &SysmlDocument) -> Vec<Constraint> {
    document
        .walk()
        .into_iter()
        .filter(|s| s.kind == StatementKind::ConstraintDef)
        .filter_map(to_constraint)
        .collect()
}

/// Every constraint usage in the document.
pub fn usages(document: &SysmlDocument) -> Vec<ConstraintUsage> {
    document
        .walk()
        .into_iter()
        .filter(|s| s.kind == StatementKind::Constraint)
        .filter_map(to_usage)
        .collect()
}

/// Locate a definition by name.
pub fn find_definition(document: &SysmlDocument, name: &str) -> Result<Constraint> {
    definitions(document)
        .into_iter()
        .find(|c| c.name == name)
        .ok_or_else(|| Error::ConstraintNotFound(name.to_string()))
}

/// Locate the first usage bound to the definition `name`.
pub fn find_usage(document: &SysmlDocument, name: &str) -> Result<ConstraintUsage> {
    usages(document)
        .into_iter()
        .find(|u| u.definition == name)
        .ok_or_else(|| Error::ConstraintUsageNotFound(name.to_string()))
}

fn to_constraint(statement: &Statement) -> Option<Constraint> {
    let name = statement.name.clone()?;
    let parameters = statement
        .children()
        .iter()
        .filter(|s| s.kind == StatementKind::Parameter)
        .filter_map(|s| s.name.clone())
        .collect();
    Some(Constraint {
        name,
        parameters,
        equation: equation_text(statement),
        line: statement.line,
    })
}

/// The last body statement that is not a parameter and contains a
/// comparison operator.
fn equation_text(definition: &Statement) -> Option<String> {
    definition
        .children()
        .iter()
        .rev()
        .filter(|s| s.kind != StatementKind::Parameter)
        .find(|s| s.comparison_operator().is_some())
        .map(render)
}

/// Header tokens joined with single spaces, tight around parentheses.
fn render(statement: &Statement) -> String {
    let mut out = String::new();
    let mut prev: Option<&str> = None;
    for token in &statement.header {
        let text = token.text.as_str();
        let tight = matches!(text, "(" | ")" | "," | "[" | "]" | "::")
            || matches!(prev, Some("(" | "[" | "::"))
            || prev.is_none();
        if !tight {
            out.push(' ');
        }
        out.push_str(text);
        prev = Some(text);
    }
    out
}

fn to_usage(statement: &Statement) -> Option<ConstraintUsage> {
    let definition = strip_qualifier(statement.type_name.as_deref()?).to_string();
    let name = statement.name.clone().unwrap_or_else(|| definition.clone());
    let mut bindings = BTreeMap::new();

    for parameter in statement
        .children()
        .iter()
        .filter(|s| s.kind == StatementKind::Parameter)
    {
        let (Some(var), Some(slot)) = (parameter.name.clone(), parameter.value.as_ref()) else {
            continue;
        };
        let binding = match slot.list_items() {
            Some(items) => Binding::List(items),
            None => Binding::Scalar {
                value: if slot.quoted {
                    slot.text.clone()
                } else {
                    join_tokens(&slot.tokens)
                },
                unit: slot.unit.clone(),
            },
        };
        bindings.insert(var, binding);
    }

    debug!(
        usage = %name,
        definition = %definition,
        bindings = bindings.len(),
        "Extracted constraint usage"
    );
    Some(ConstraintUsage {
        name,
        definition,
        bindings,
        line: statement.line,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODEL: &str = r#"package Drone {
    constraint def MassLimit {
        doc /* total mass of the listed parts */
        in partMasses : MassValue[*];
        in massLimit : MassValue;
        sum(partMasses) <= massLimit
    }
    constraint def Unused {
        in x : Real;
    }
    constraint massCheck : Drone::MassLimit {
        in partMasses = (fc, m, p, bat);
        in massLimit = 1000 [g];
    }
}
"#;

    fn doc() -> SysmlDocument {
        SysmlDocument::parse("drone.sysml", MODEL).unwrap()
    }

    #[test]
    fn test_definitions() {
        let defs = definitions(&doc());
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[0].name, "MassLimit");
        assert_eq!(defs[0].parameters, vec!["partMasses", "massLimit"]);
        assert_eq!(defs[0].equation.as_deref(), Some("sum(partMasses) <= massLimit"));
        assert_eq!(defs[1].equation, None);
    }

    #[test]
    fn test_find_usage_bindings() {
        let usage = find_usage(&doc(), "MassLimit").unwrap();
        assert_eq!(usage.name, "massCheck");
        assert_eq!(
            usage.bindings["partMasses"],
            Binding::List(vec!["fc".into(), "m".into(), "p".into(), "bat".into()])
        );
        assert_eq!(
            usage.bindings["massLimit"],
            Binding::Scalar {
                value: "1000".into(),
                unit: Some("g".into())
            }
        );
    }

    #[test]
    fn test_missing_definition_and_usage() {
        let d = doc();
        assert!(matches!(find_definition(&d, "Nope"), Err(Error::ConstraintNotFound(_))));
        assert!(matches!(find_usage(&d, "Unused"), Err(Error::ConstraintUsageNotFound(_))));
    }
}
