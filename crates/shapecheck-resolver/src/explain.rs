//! Read-only rule explanations for tooling.
//!
//! Runs the same candidate walk as [`crate::resolve`], but without
//! stopping at the first match, so a caller can show every rule that was
//! considered and why it did or did not apply.

use crate::resolve::{Outcome, RuleSource, candidates};
use crate::rules::RuleSet;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Serialize)]
pub struct ExplainedCandidate {
    pub source: RuleSource,
    pub outcome: Outcome,
    pub expression: Option<String>,
    pub message: Option<String>,
    /// Whether this candidate is the one resolution picks.
    pub selected: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Explanation {
    pub field: String,
    pub context: Option<String>,
    pub candidates: Vec<ExplainedCandidate>,
    /// Source of the winning rule, or `Default`.
    pub winner: RuleSource,
}

impl Explanation {
    pub fn selected(&self) -> Option<&ExplainedCandidate> {
        self.candidates.iter().find(|c| c.selected)
    }
}

/// Explain which rule applies to `field` inside `context`.
pub fn explain(rules: &RuleSet, field: &str, context: Option<&str>) -> Explanation {
    let mut winner = RuleSource::Default;
    let mut found = false;

    let explained = candidates(rules, field, context)
        .map(|c| {
            let selected = !found && c.outcome == Outcome::Matched;
            if selected {
                found = true;
                winner = c.source.clone();
            }
            ExplainedCandidate {
                expression: c.rule.map(|r| r.expression.clone()),
                message: c.rule.and_then(|r| r.message.clone()),
                source: c.source,
                outcome: c.outcome,
                selected,
            }
        })
        .collect();

    Explanation {
        field: field.to_string(),
        context: context.map(String::from),
        candidates: explained,
        winner,
    }
}

impl fmt::Display for Explanation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.context {
            Some(ctx) => writeln!(f, "{}.{}", ctx, self.field)?,
            None => writeln!(f, "{}", self.field)?,
        }
        for c in &self.candidates {
            let mark = if c.selected { "*" } else { " " };
            let outcome = match c.outcome {
                Outcome::Matched if c.selected => "matched",
                Outcome::Matched => "shadowed",
                Outcome::KeyMismatch => "no match",
                Outcome::FieldNotListed => "field not listed",
                Outcome::InvalidPattern => "invalid pattern",
            };
            write!(f, "{} {} ({})", mark, c.source, outcome)?;
            if let Some(expr) = &c.expression {
                write!(f, " => {}", expr)?;
            }
            writeln!(f)?;
        }
        write!(f, "resolved by: {}", self.winner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve;
    use shapecheck_config::OverrideConfig;
    use shapecheck_ir::Validator;

    #[test]
    fn test_explain_lists_shadowed_rules() {
        let config = OverrideConfig::default()
            .field("email", "generic")
            .field_pattern("mail$", "pattern")
            .context_field("User", "email", "company");
        let rules = RuleSet::compile(&config);
        let explanation = explain(&rules, "email", Some("User"));

        assert_eq!(explanation.candidates.len(), 3);
        assert_eq!(explanation.winner.to_string(), "context-exact:User.email");
        let selected = explanation.selected().unwrap();
        assert_eq!(selected.expression.as_deref(), Some("company"));
        assert_eq!(
            explanation
                .candidates
                .iter()
                .filter(|c| c.outcome == Outcome::Matched)
                .count(),
            3
        );
    }

    #[test]
    fn test_explain_agrees_with_resolve() {
        let config = OverrideConfig::default()
            .field_pattern("^(", "broken")
            .field_pattern("Id$", "id")
            .context_pattern("^Admin", "role", "admin");
        let rules = RuleSet::compile(&config);
        for (field, context) in [("userId", None), ("role", Some("AdminUser")), ("name", Some("User"))] {
            let explanation = explain(&rules, field, context);
            let resolution = resolve(&rules, field, Validator::string(), context);
            assert_eq!(explanation.winner, resolution.source);
        }
    }

    #[test]
    fn test_json_shape() {
        let rules = RuleSet::compile(&OverrideConfig::default().field("email", "E"));
        let value = serde_json::to_value(explain(&rules, "email", None)).unwrap();
        assert_eq!(value["winner"]["tier"], "field-exact");
        assert_eq!(value["winner"]["key"], "email");
        assert_eq!(value["candidates"][0]["outcome"], "matched");

        let value = serde_json::to_value(explain(&rules, "name", None)).unwrap();
        assert_eq!(value["winner"]["tier"], "default");
    }

    #[test]
    fn test_display_marks_winner() {
        let rules = RuleSet::compile(&OverrideConfig::default().field("email", "E"));
        let text = explain(&rules, "email", None).to_string();
        assert!(text.contains("* field-exact:email (matched) => E"));
        assert!(text.ends_with("resolved by: field-exact:email"));

        let text = explain(&rules, "name", None).to_string();
        assert!(text.ends_with("resolved by: default"));
    }
}
