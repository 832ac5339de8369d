//! Override tables: field-level and context-level validator overrides.
//!
//! Example:
//! ```toml
//! [validators]
//! email = "z.string().email()"
//! "^.*Email$" = { validator = "z.string().email()", pattern = true }
//!
//! [contexts.User]
//! email = { validator = "companyEmail", errorMessage = "use a company address" }
//!
//! [contexts."^Admin.*"]
//! pattern = true
//! fields = { role = "z.literal(\"admin\")" }
//! ```
//!
//! Table order matters: pattern rules are tried in the order they appear.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Right-hand side of a field override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldOverride {
    /// Bare validator expression.
    Expression(String),
    Detailed(DetailedOverride),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailedOverride {
    pub validator: String,
    #[serde(
        default,
        rename = "errorMessage",
        alias = "error_message",
        skip_serializing_if = "Option::is_none"
    )]
    pub error_message: Option<String>,
    /// Treat the key as a regular expression over field names.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub pattern: bool,
}

impl FieldOverride {
    pub fn validator(&self) -> &str {
        match self {
            FieldOverride::Expression(expr) => expr,
            FieldOverride::Detailed(d) => &d.validator,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            FieldOverride::Expression(_) => None,
            FieldOverride::Detailed(d) => d.error_message.as_deref(),
        }
    }

    pub fn is_pattern(&self) -> bool {
        matches!(self, FieldOverride::Detailed(d) if d.pattern)
    }
}

/// Right-hand side of a context override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContextOverride {
    /// `{ pattern = true, fields = { ... } }`
    Record(ContextRecord),
    /// Direct map of field name to override.
    Fields(IndexMap<String, FieldOverride>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContextRecord {
    #[serde(default)]
    pub pattern: bool,
    pub fields: IndexMap<String, FieldOverride>,
}

impl ContextOverride {
    /// Whether the context key is a regular expression over type names.
    pub fn is_pattern(&self) -> bool {
        matches!(self, ContextOverride::Record(r) if r.pattern)
    }

    pub fn fields(&self) -> &IndexMap<String, FieldOverride> {
        match self {
            ContextOverride::Record(r) => &r.fields,
            ContextOverride::Fields(fields) => fields,
        }
    }
}

/// Both override tables, in configuration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverrideConfig {
    /// Field-level table: field name or pattern -> override.
    pub validators: IndexMap<String, FieldOverride>,
    /// Context-level table: type name or pattern -> field overrides.
    pub contexts: IndexMap<String, ContextOverride>,
}

impl OverrideConfig {
    pub fn is_empty(&self) -> bool {
        self.validators.is_empty() && self.contexts.is_empty()
    }

    pub fn field(mut self, name: &str, validator: &str) -> Self {
        self.validators.insert(
            name.to_string(),
            FieldOverride::Expression(validator.to_string()),
        );
        self
    }

    pub fn field_pattern(mut self, pattern: &str, validator: &str) -> Self {
        self.validators.insert(
            pattern.to_string(),
            FieldOverride::Detailed(DetailedOverride {
                validator: validator.to_string(),
                error_message: None,
                pattern: true,
            }),
        );
        self
    }

    pub fn context_field(mut self, context: &str, field: &str, validator: &str) -> Self {
        let entry = self
            .contexts
            .entry(context.to_string())
            .or_insert_with(|| ContextOverride::Fields(IndexMap::new()));
        let fields = match entry {
            ContextOverride::Record(r) => &mut r.fields,
            ContextOverride::Fields(fields) => fields,
        };
        fields.insert(
            field.to_string(),
            FieldOverride::Expression(validator.to_string()),
        );
        self
    }

    pub fn context_pattern(mut self, pattern: &str, field: &str, validator: &str) -> Self {
        let entry = self
            .contexts
            .entry(pattern.to_string())
            .or_insert_with(|| {
                ContextOverride::Record(ContextRecord {
                    pattern: true,
                    fields: IndexMap::new(),
                })
            });
        if let ContextOverride::Record(r) = entry {
            r.pattern = true;
            r.fields.insert(
                field.to_string(),
                FieldOverride::Expression(validator.to_string()),
            );
        }
        self
    }
}
