//! Priority-ordered override resolution.

use crate::rules::{Rule, RuleSet};
use serde::Serialize;
use shapecheck_ir::Validator;
use std::fmt;

/// Resolution tiers, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Tier {
    ContextExact,
    ContextPattern,
    FieldExact,
    FieldPattern,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::ContextExact => "context-exact",
            Tier::ContextPattern => "context-pattern",
            Tier::FieldExact => "field-exact",
            Tier::FieldPattern => "field-pattern",
        }
    }
}

/// Which rule produced a resolved validator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "tier", content = "key", rename_all = "kebab-case")]
pub enum RuleSource {
    ContextExact { context: String, field: String },
    ContextPattern { pattern: String, field: String },
    FieldExact(String),
    FieldPattern(String),
    Default,
}

impl RuleSource {
    pub fn tier(&self) -> Option<Tier> {
        match self {
            RuleSource::ContextExact { .. } => Some(Tier::ContextExact),
            RuleSource::ContextPattern { .. } => Some(Tier::ContextPattern),
            RuleSource::FieldExact(_) => Some(Tier::FieldExact),
            RuleSource::FieldPattern(_) => Some(Tier::FieldPattern),
            RuleSource::Default => None,
        }
    }

    pub fn is_default(&self) -> bool {
        matches!(self, RuleSource::Default)
    }
}

impl fmt::Display for RuleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleSource::ContextExact { context, field } => {
                write!(f, "context-exact:{}.{}", context, field)
            }
            RuleSource::ContextPattern { pattern, field } => {
                write!(f, "context-pattern:/{}/.{}", pattern, field)
            }
            RuleSource::FieldExact(key) => write!(f, "field-exact:{}", key),
            RuleSource::FieldPattern(pattern) => write!(f, "field-pattern:/{}/", pattern),
            RuleSource::Default => f.write_str("default"),
        }
    }
}

/// Why a candidate rule did or did not apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Outcome {
    Matched,
    /// The key (context name or field name) does not match.
    KeyMismatch,
    /// The context matched but has no entry for this field.
    FieldNotListed,
    /// The pattern failed to compile and never matches.
    InvalidPattern,
}

/// One rule considered during resolution.
#[derive(Debug, Clone)]
pub struct Candidate<'a> {
    pub source: RuleSource,
    pub outcome: Outcome,
    pub rule: Option<&'a Rule>,
}

/// Outcome of resolving one field.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub validator: Validator,
    pub source: RuleSource,
    pub message: Option<String>,
}

/// Every rule that could apply to `field` in `context`, in priority
/// order. Lazy: resolution stops at the first match.
pub fn candidates<'a>(
    rules: &'a RuleSet,
    field: &'a str,
    context: Option<&'a str>,
) -> impl Iterator<Item = Candidate<'a>> + 'a {
    let context_exact = context
        .and_then(|ctx| rules.context_exact.get_key_value(ctx))
        .map(move |(ctx, fields)| {
            let rule = fields.get(field);
            Candidate {
                source: RuleSource::ContextExact {
                    context: ctx.clone(),
                    field: field.to_string(),
                },
                outcome: if rule.is_some() {
                    Outcome::Matched
                } else {
                    Outcome::FieldNotListed
                },
                rule,
            }
        });

    let context_patterns = context.into_iter().flat_map(move |ctx| {
        rules.context_patterns.iter().map(move |entry| {
            let source = RuleSource::ContextPattern {
                pattern: entry.pattern.source.clone(),
                field: field.to_string(),
            };
            match &entry.pattern.regex {
                None => Candidate {
                    source,
                    outcome: Outcome::InvalidPattern,
                    rule: None,
                },
                Some(regex) if !regex.is_match(ctx) => Candidate {
                    source,
                    outcome: Outcome::KeyMismatch,
                    rule: None,
                },
                Some(_) => {
                    let rule = entry.fields.get(field);
                    Candidate {
                        source,
                        outcome: if rule.is_some() {
                            Outcome::Matched
                        } else {
                            Outcome::FieldNotListed
                        },
                        rule,
                    }
                }
            }
        })
    });

    let field_exact = rules
        .field_exact
        .get_key_value(field)
        .map(|(key, rule)| Candidate {
            source: RuleSource::FieldExact(key.clone()),
            outcome: Outcome::Matched,
            rule: Some(rule),
        });

    let field_patterns = rules.field_patterns.iter().map(move |entry| {
        let source = RuleSource::FieldPattern(entry.pattern.source.clone());
        match &entry.pattern.regex {
            None => Candidate {
                source,
                outcome: Outcome::InvalidPattern,
                rule: None,
            },
            Some(regex) if regex.is_match(field) => Candidate {
                source,
                outcome: Outcome::Matched,
                rule: Some(&entry.rule),
            },
            Some(_) => Candidate {
                source,
                outcome: Outcome::KeyMismatch,
                rule: None,
            },
        }
    });

    context_exact
        .into_iter()
        .chain(context_patterns)
        .chain(field_exact)
        .chain(field_patterns)
}

/// Resolve the validator for `field` given its default `base`.
///
/// The first matching rule in tier order replaces the base validator
/// (or wraps it, for `{base}` templates). A custom error message is
/// attached as a message annotation. Without a match the base validator
/// is returned unchanged with [`RuleSource::Default`].
pub fn resolve(
    rules: &RuleSet,
    field: &str,
    base: Validator,
    context: Option<&str>,
) -> Resolution {
    let winner = candidates(rules, field, context).find(|c| c.outcome == Outcome::Matched);

    match winner.and_then(|c| c.rule.map(|rule| (c.source, rule))) {
        Some((source, rule)) => {
            let mut validator = Validator::expression(&rule.expression, base);
            if let Some(message) = &rule.message {
                validator = validator.with_message(message.clone());
            }
            Resolution {
                validator,
                source,
                message: rule.message.clone(),
            }
        }
        None => Resolution {
            validator: base,
            source: RuleSource::Default,
            message: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shapecheck_config::{ContextOverride, ContextRecord, DetailedOverride, FieldOverride, OverrideConfig};
    use shapecheck_ir::{Modifier, ValidatorKind};

    fn expr(v: &Validator) -> &str {
        match &v.kind {
            ValidatorKind::Expression(e) => e,
            other => panic!("expected expression, got {:?}", other),
        }
    }

    #[test]
    fn test_field_exact() {
        let rules = RuleSet::compile(&OverrideConfig::default().field("email", "emailValidator"));
        let r = resolve(&rules, "email", Validator::string(), None);
        assert_eq!(expr(&r.validator), "emailValidator");
        assert_eq!(r.source, RuleSource::FieldExact("email".into()));
        assert_eq!(r.source.to_string(), "field-exact:email");
    }

    #[test]
    fn test_field_pattern_is_case_sensitive() {
        let rules =
            RuleSet::compile(&OverrideConfig::default().field_pattern("^.*Email$", "emailValidator"));
        let work = resolve(&rules, "workEmail", Validator::string(), None);
        assert_eq!(expr(&work.validator), "emailValidator");
        assert_eq!(work.source.to_string(), "field-pattern:/^.*Email$/");

        let plain = resolve(&rules, "email", Validator::string(), None);
        assert_eq!(plain.validator, Validator::string());
        assert!(plain.source.is_default());
    }

    #[test]
    fn test_context_beats_field() {
        let config = OverrideConfig::default()
            .field("email", "genericEmail")
            .context_field("User", "email", "companyEmail");
        let rules = RuleSet::compile(&config);

        let user = resolve(&rules, "email", Validator::string(), Some("User"));
        assert_eq!(expr(&user.validator), "companyEmail");
        assert_eq!(user.source.to_string(), "context-exact:User.email");

        let other = resolve(&rules, "email", Validator::string(), Some("Order"));
        assert_eq!(expr(&other.validator), "genericEmail");
    }

    #[test]
    fn test_exact_beats_pattern_in_each_tier() {
        let config = OverrideConfig::default()
            .field_pattern("^e", "P")
            .field("email", "E")
            .context_pattern("^Us", "email", "CP")
            .context_field("User", "email", "CE");
        let rules = RuleSet::compile(&config);
        let r = resolve(&rules, "email", Validator::string(), Some("User"));
        assert_eq!(expr(&r.validator), "CE");

        let r = resolve(&rules, "email", Validator::string(), Some("Usher"));
        assert_eq!(expr(&r.validator), "CP");

        let r = resolve(&rules, "email", Validator::string(), None);
        assert_eq!(expr(&r.validator), "E");
    }

    #[test]
    fn test_patterns_follow_insertion_order() {
        let config = OverrideConfig::default()
            .field_pattern("Id$", "first")
            .field_pattern("^user", "second")
            .context_pattern("^Ad", "role", "ctx-first")
            .context_pattern("min$", "role", "ctx-second");
        let rules = RuleSet::compile(&config);
        let r = resolve(&rules, "userId", Validator::string(), None);
        assert_eq!(expr(&r.validator), "first");

        let r = resolve(&rules, "role", Validator::string(), Some("Admin"));
        assert_eq!(expr(&r.validator), "ctx-first");
    }

    #[test]
    fn test_context_without_field_falls_through() {
        let config = OverrideConfig::default()
            .context_field("User", "name", "N")
            .field("email", "E");
        let rules = RuleSet::compile(&config);
        let r = resolve(&rules, "email", Validator::string(), Some("User"));
        assert_eq!(expr(&r.validator), "E");
    }

    #[test]
    fn test_invalid_pattern_never_matches() {
        let config = OverrideConfig::default()
            .field_pattern("(", "broken")
            .field_pattern(".*", "fallback");
        let rules = RuleSet::compile(&config);
        let r = resolve(&rules, "(", Validator::string(), None);
        assert_eq!(expr(&r.validator), "fallback");

        let outcomes: Vec<Outcome> = candidates(&rules, "x", None).map(|c| c.outcome).collect();
        assert_eq!(outcomes, vec![Outcome::InvalidPattern, Outcome::Matched]);
    }

    #[test]
    fn test_invalid_context_pattern_is_skipped() {
        let mut config = OverrideConfig::default();
        config.contexts.insert(
            "[".into(),
            ContextOverride::Record(ContextRecord {
                pattern: true,
                fields: [("email".to_string(), FieldOverride::Expression("bad".into()))]
                    .into_iter()
                    .collect(),
            }),
        );
        let config = config.field("email", "E");
        let rules = RuleSet::compile(&config);
        assert_eq!(rules.diagnostics().len(), 1);
        let r = resolve(&rules, "email", Validator::string(), Some("["));
        assert_eq!(expr(&r.validator), "E");
    }

    #[test]
    fn test_error_message_wraps_validator() {
        let mut config = OverrideConfig::default();
        config.validators.insert(
            "age".into(),
            FieldOverride::Detailed(DetailedOverride {
                validator: "z.number().int()".into(),
                error_message: Some("bad age".into()),
                pattern: false,
            }),
        );
        let rules = RuleSet::compile(&config);
        let r = resolve(&rules, "age", Validator::any(), None);
        assert_eq!(r.message.as_deref(), Some("bad age"));
        assert_eq!(
            r.validator.modifiers,
            vec![Modifier::Message("bad age".into())]
        );
    }

    #[test]
    fn test_template_keeps_base() {
        let rules = RuleSet::compile(&OverrideConfig::default().field("email", "{base}.email()"));
        let r = resolve(&rules, "email", Validator::string(), None);
        match r.validator.kind {
            ValidatorKind::Template { base, .. } => assert_eq!(*base, Validator::string()),
            other => panic!("expected template, got {:?}", other),
        }
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let config = OverrideConfig::default()
            .field_pattern("mail", "P1")
            .field_pattern("^e", "P2")
            .context_pattern(".*", "email", "C");
        let rules = RuleSet::compile(&config);
        let first = resolve(&rules, "email", Validator::string(), Some("Any"));
        for _ in 0..20 {
            let again = resolve(&rules, "email", Validator::string(), Some("Any"));
            assert_eq!(again, first);
        }
        let rebuilt = RuleSet::rebuild(rules.spec().clone());
        assert_eq!(resolve(&rebuilt, "email", Validator::string(), Some("Any")), first);
    }
}
