//! Constraint verification.
//!
//! Extracts `constraint def` blocks and their usages from a model, resolves
//! the bound values and evaluates the equation:
//!
//! ```text
//! constraint def MassLimit {
//!     in partMasses : MassValue[*];
//!     in massLimit : MassValue;
//!     sum(partMasses) <= massLimit
//! }
//! constraint massCheck : MassLimit {
//!     in partMasses = (fc, m, p, bat);
//!     in massLimit = 1000 [g];
//! }
//! ```
//!
//! List entries are abbreviations mapped to `part def` names through
//! [`VerifierConfig`]; each part's `mass` attribute is multiplied by the
//! abbreviation's multiplicity and summed. Only the `sum(<list>) <op>
//! <scalar>` shape is evaluated; other equations come back as
//! [`VerificationOutcome::UnsupportedEquation`].

mod equation;
mod extract;
mod types;
mod verifier;

pub use equation::SumBound;
pub use extract::{definitions, find_definition, find_usage, usages};
pub use types::{
    Binding, Comparison, Constraint, ConstraintSummary, ConstraintUsage, ConstraintVerdict,
    MassTerm, VerificationOutcome, VerifierConfig,
};
pub use verifier::ConstraintVerifier;
