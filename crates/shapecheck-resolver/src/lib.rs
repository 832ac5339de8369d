//! Validator override resolution.
//!
//! Given a field name, its default validator and the name of the
//! enclosing declaration, pick the override that applies. Tiers, first
//! match wins:
//!
//! 1. context-exact: `[contexts.User] email = ...`
//! 2. context-pattern: `[contexts."^Admin.*"] pattern = true`, in table order
//! 3. field-exact: `[validators] email = ...`
//! 4. field-pattern: `{ validator = ..., pattern = true }`, in table order
//! 5. default: the base validator, unchanged
//!
//! Resolution is pure. [`explain`] walks the same candidates for tooling.

pub mod explain;
pub mod resolve;
pub mod rules;

pub use explain::{ExplainedCandidate, Explanation, explain};
pub use resolve::{Candidate, Outcome, Resolution, RuleSource, Tier, candidates, resolve};
pub use rules::{ContextRuleSpec, FieldRuleSpec, PatternError, Rule, RuleSet, RuleSpec};
