//! Validator combinator AST.
//!
//! Generation builds these trees; only [`crate::render`] turns them into
//! target-language text. A validator is a base kind plus an ordered list
//! of modifiers applied on top of it.

use crate::{Literal, Primitive};
use serde::{Deserialize, Serialize};

/// One entry of an object validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectEntry {
    pub name: String,
    pub validator: Validator,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidatorKind {
    Primitive(Primitive),
    Literal(Literal),
    Array(Box<Validator>),
    Tuple(Vec<Validator>),
    Object(Vec<ObjectEntry>),
    Union(Vec<Validator>),
    Intersection(Vec<Validator>),
    Record {
        key: Box<Validator>,
        value: Box<Validator>,
    },
    Function {
        params: Vec<Validator>,
        returns: Box<Validator>,
    },
    /// Named reference to another declaration's validator.
    Ref { name: String, args: Vec<Validator> },
    /// Reference resolved at validation time; breaks reference cycles.
    Lazy { name: String, args: Vec<Validator> },
    /// Parameterized validator: a function of one validator per parameter.
    Generic {
        params: Vec<String>,
        body: Box<Validator>,
    },
    /// A bound type parameter inside a generic body.
    Param(String),
    /// Verbatim expression from an override rule.
    Expression(String),
    /// Override expression with `{base}` standing for the default validator.
    Template {
        template: String,
        base: Box<Validator>,
    },
}

/// Modifiers layered on a base validator, applied in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modifier {
    Optional,
    Nullable,
    Readonly,
    Partial,
    Required,
    Pick(Vec<String>),
    Omit(Vec<String>),
    Bounds { min: Option<f64>, max: Option<f64> },
    Pattern(String),
    /// Custom error message for any failure of the validator so far.
    Message(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Validator {
    pub kind: ValidatorKind,
    #[serde(default)]
    pub modifiers: Vec<Modifier>,
}

/// Token substituted with the default validator in override templates.
pub const BASE_TOKEN: &str = "{base}";

impl Validator {
    pub fn new(kind: ValidatorKind) -> Self {
        Self {
            kind,
            modifiers: Vec::new(),
        }
    }

    pub fn primitive(p: Primitive) -> Self {
        Self::new(ValidatorKind::Primitive(p))
    }

    /// The permissive fallback used wherever generation cannot proceed.
    pub fn any() -> Self {
        Self::primitive(Primitive::Any)
    }

    pub fn string() -> Self {
        Self::primitive(Primitive::String)
    }

    pub fn literal(lit: Literal) -> Self {
        Self::new(ValidatorKind::Literal(lit))
    }

    pub fn array(element: Validator) -> Self {
        Self::new(ValidatorKind::Array(Box::new(element)))
    }

    pub fn object(entries: Vec<ObjectEntry>) -> Self {
        Self::new(ValidatorKind::Object(entries))
    }

    /// Union of members; a single member stands for itself.
    pub fn union(mut members: Vec<Validator>) -> Self {
        if members.len() == 1 {
            return members.remove(0);
        }
        Self::new(ValidatorKind::Union(members))
    }

    pub fn intersection(mut members: Vec<Validator>) -> Self {
        if members.len() == 1 {
            return members.remove(0);
        }
        Self::new(ValidatorKind::Intersection(members))
    }

    pub fn reference(name: impl Into<String>, args: Vec<Validator>) -> Self {
        Self::new(ValidatorKind::Ref {
            name: name.into(),
            args,
        })
    }

    pub fn lazy(name: impl Into<String>, args: Vec<Validator>) -> Self {
        Self::new(ValidatorKind::Lazy {
            name: name.into(),
            args,
        })
    }

    /// Validator from an override expression. Expressions containing
    /// [`BASE_TOKEN`] wrap the default validator.
    pub fn expression(expression: &str, base: Validator) -> Self {
        if expression.contains(BASE_TOKEN) {
            Self::new(ValidatorKind::Template {
                template: expression.to_string(),
                base: Box::new(base),
            })
        } else {
            Self::new(ValidatorKind::Expression(expression.to_string()))
        }
    }

    pub fn with(mut self, modifier: Modifier) -> Self {
        self.modifiers.push(modifier);
        self
    }

    pub fn is_optional(&self) -> bool {
        self.modifiers.contains(&Modifier::Optional)
    }

    /// Mark optional once; repeated marking is a no-op.
    pub fn optional(self) -> Self {
        if self.is_optional() {
            self
        } else {
            self.with(Modifier::Optional)
        }
    }

    pub fn nullable(self) -> Self {
        if self.modifiers.contains(&Modifier::Nullable) {
            self
        } else {
            self.with(Modifier::Nullable)
        }
    }

    pub fn with_message(self, message: impl Into<String>) -> Self {
        self.with(Modifier::Message(message.into()))
    }

    /// Whether any part of the tree carries an error message.
    pub fn has_message(&self) -> bool {
        self.modifiers
            .iter()
            .any(|m| matches!(m, Modifier::Message(_)))
            || self.children().iter().any(|child| child.has_message())
    }

    /// Whether any part of the tree is a lazy reference.
    pub fn has_lazy(&self) -> bool {
        matches!(self.kind, ValidatorKind::Lazy { .. })
            || self.children().iter().any(|child| child.has_lazy())
    }

    /// Names of declarations this validator refers to eagerly.
    pub fn eager_refs(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_eager_refs(&mut out);
        out
    }

    fn collect_eager_refs(&self, out: &mut Vec<String>) {
        match &self.kind {
            ValidatorKind::Ref { name, .. } => {
                if !out.contains(name) {
                    out.push(name.clone());
                }
            }
            // Arguments of a lazy reference are still evaluated eagerly.
            ValidatorKind::Lazy { args, .. } => {
                for arg in args {
                    arg.collect_eager_refs(out);
                }
                return;
            }
            _ => {}
        }
        for child in self.children() {
            child.collect_eager_refs(out);
        }
    }

    fn children(&self) -> Vec<&Validator> {
        match &self.kind {
            ValidatorKind::Primitive(_)
            | ValidatorKind::Literal(_)
            | ValidatorKind::Param(_)
            | ValidatorKind::Expression(_) => Vec::new(),
            ValidatorKind::Array(inner) => vec![inner],
            ValidatorKind::Tuple(items)
            | ValidatorKind::Union(items)
            | ValidatorKind::Intersection(items) => items.iter().collect(),
            ValidatorKind::Object(entries) => entries.iter().map(|e| &e.validator).collect(),
            ValidatorKind::Record { key, value } => vec![key, value],
            ValidatorKind::Function { params, returns } => {
                let mut out: Vec<&Validator> = params.iter().collect();
                out.push(returns);
                out
            }
            ValidatorKind::Ref { args, .. } => args.iter().collect(),
            // Lazy arguments are visited by the callers that care.
            ValidatorKind::Lazy { args, .. } => args.iter().collect(),
            ValidatorKind::Generic { body, .. } => vec![body],
            ValidatorKind::Template { base, .. } => vec![base],
        }
    }
}
