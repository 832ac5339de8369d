//! Compiled override rules.

use regex::Regex;
use serde::{Deserialize, Serialize};
use shapecheck_config::OverrideConfig;
use shapecheck_ir::{Diagnostic, DiagnosticKind};
use std::collections::HashMap;

#[derive(Debug, thiserror::Error)]
pub enum PatternError {
    #[error("invalid {table} pattern `{pattern}`: {source}")]
    Invalid {
        table: &'static str,
        pattern: String,
        source: regex::Error,
    },
}

/// What an override replaces a field's validator with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub expression: String,
    pub message: Option<String>,
}

/// A field-table entry in plain form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRuleSpec {
    pub key: String,
    pub pattern: bool,
    pub rule: Rule,
}

/// A context-table entry in plain form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextRuleSpec {
    pub key: String,
    pub pattern: bool,
    pub fields: Vec<(String, Rule)>,
}

/// The override tables flattened to plain, ordered data.
///
/// This is the minimal configuration a worker needs to rebuild an
/// identical [`RuleSet`]; unlike [`OverrideConfig`] it has no untagged
/// enums, so it survives non-self-describing encodings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSpec {
    pub fields: Vec<FieldRuleSpec>,
    pub contexts: Vec<ContextRuleSpec>,
}

impl RuleSpec {
    pub fn from_config(config: &OverrideConfig) -> Self {
        let fields = config
            .validators
            .iter()
            .map(|(key, over)| FieldRuleSpec {
                key: key.clone(),
                pattern: over.is_pattern(),
                rule: Rule {
                    expression: over.validator().to_string(),
                    message: over.error_message().map(String::from),
                },
            })
            .collect();
        let contexts = config
            .contexts
            .iter()
            .map(|(key, over)| ContextRuleSpec {
                key: key.clone(),
                pattern: over.is_pattern(),
                fields: over
                    .fields()
                    .iter()
                    .map(|(field, f)| {
                        (
                            field.clone(),
                            Rule {
                                expression: f.validator().to_string(),
                                message: f.error_message().map(String::from),
                            },
                        )
                    })
                    .collect(),
            })
            .collect();
        Self { fields, contexts }
    }
}

/// A key compiled as a regular expression. `None` when it failed to
/// compile; such a pattern never matches.
#[derive(Debug, Clone)]
pub(crate) struct Pattern {
    pub(crate) source: String,
    pub(crate) regex: Option<Regex>,
}

#[derive(Debug, Clone)]
pub(crate) struct FieldPattern {
    pub(crate) pattern: Pattern,
    pub(crate) rule: Rule,
}

#[derive(Debug, Clone)]
pub(crate) struct ContextPattern {
    pub(crate) pattern: Pattern,
    pub(crate) fields: HashMap<String, Rule>,
}

/// Compiled override tables.
///
/// Exact keys live in hash maps (exactness needs no tie-break); pattern
/// rules keep configuration order, which is their priority. Patterns are
/// compiled once here, never per lookup.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    pub(crate) field_exact: HashMap<String, Rule>,
    pub(crate) field_patterns: Vec<FieldPattern>,
    pub(crate) context_exact: HashMap<String, HashMap<String, Rule>>,
    pub(crate) context_patterns: Vec<ContextPattern>,
    spec: RuleSpec,
    diagnostics: Vec<Diagnostic>,
}

impl RuleSet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Compile the override tables of a configuration.
    pub fn compile(config: &OverrideConfig) -> Self {
        Self::from_spec(RuleSpec::from_config(config))
    }

    /// Compile a rule spec, logging each pattern that fails to compile.
    pub fn from_spec(spec: RuleSpec) -> Self {
        let set = Self::build(spec);
        for diagnostic in &set.diagnostics {
            tracing::warn!("{}; rule ignored", diagnostic.message);
        }
        set
    }

    /// Compile a rule spec already reported on elsewhere (workers rebuilding
    /// the coordinator's rule set). Diagnostics are kept, not logged.
    pub fn rebuild(spec: RuleSpec) -> Self {
        Self::build(spec)
    }

    fn build(spec: RuleSpec) -> Self {
        let mut set = RuleSet::default();

        for entry in &spec.fields {
            if entry.pattern {
                let pattern = set.compile_pattern("field", &entry.key);
                set.field_patterns.push(FieldPattern {
                    pattern,
                    rule: entry.rule.clone(),
                });
            } else {
                set.field_exact
                    .insert(entry.key.clone(), entry.rule.clone());
            }
        }

        for entry in &spec.contexts {
            let fields: HashMap<String, Rule> = entry.fields.iter().cloned().collect();
            if entry.pattern {
                let pattern = set.compile_pattern("context", &entry.key);
                set.context_patterns.push(ContextPattern { pattern, fields });
            } else {
                set.context_exact.insert(entry.key.clone(), fields);
            }
        }

        set.spec = spec;
        set
    }

    fn compile_pattern(&mut self, table: &'static str, source: &str) -> Pattern {
        let regex = match Regex::new(source) {
            Ok(regex) => Some(regex),
            Err(source_err) => {
                let err = PatternError::Invalid {
                    table,
                    pattern: source.to_string(),
                    source: source_err,
                };
                self.diagnostics
                    .push(Diagnostic::warning(DiagnosticKind::Configuration, err.to_string()));
                None
            }
        };
        Pattern {
            source: source.to_string(),
            regex,
        }
    }

    /// The rule spec this set was compiled from.
    pub fn spec(&self) -> &RuleSpec {
        &self.spec
    }

    /// Configuration diagnostics (invalid patterns).
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn is_empty(&self) -> bool {
        self.field_exact.is_empty()
            && self.field_patterns.is_empty()
            && self.context_exact.is_empty()
            && self.context_patterns.is_empty()
    }

    /// Number of rules across all tables.
    pub fn len(&self) -> usize {
        self.field_exact.len()
            + self.field_patterns.len()
            + self
                .context_exact
                .values()
                .map(HashMap::len)
                .sum::<usize>()
            + self
                .context_patterns
                .iter()
                .map(|p| p.fields.len())
                .sum::<usize>()
    }
}
