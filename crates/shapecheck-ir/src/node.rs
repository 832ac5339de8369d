//! Type representation nodes.
//!
//! Children are referenced by [`TypeId`], never by pointer, so recursive
//! declarations are representable without cycles in memory.

use crate::TypeId;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Built-in primitive types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Primitive {
    String,
    Number,
    Integer,
    Boolean,
    BigInt,
    Null,
    Undefined,
    Any,
    Unknown,
    Never,
    Date,
    Symbol,
}

impl Primitive {
    pub fn as_str(self) -> &'static str {
        match self {
            Primitive::String => "string",
            Primitive::Number => "number",
            Primitive::Integer => "integer",
            Primitive::Boolean => "boolean",
            Primitive::BigInt => "bigint",
            Primitive::Null => "null",
            Primitive::Undefined => "undefined",
            Primitive::Any => "any",
            Primitive::Unknown => "unknown",
            Primitive::Never => "never",
            Primitive::Date => "date",
            Primitive::Symbol => "symbol",
        }
    }
}

/// A literal type, checked by equality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Literal {
    String(String),
    Number(f64),
    Boolean(bool),
    Null,
}

impl Literal {
    /// Literal text in the target syntax.
    pub fn to_source(&self) -> String {
        match self {
            Literal::String(s) => quote(s),
            Literal::Number(n) => format_number(*n),
            Literal::Boolean(b) => b.to_string(),
            Literal::Null => "null".to_string(),
        }
    }
}

/// An object member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub ty: TypeId,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub readonly: bool,
}

/// A function or method parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub ty: TypeId,
    #[serde(default)]
    pub optional: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FunctionKind {
    #[default]
    Function,
    Method,
    Constructor,
}

impl FunctionKind {
    /// Methods and constructors belong to the enclosing class, not to the
    /// data shape, and are emitted as separate member signatures.
    pub fn is_member(self) -> bool {
        matches!(self, FunctionKind::Method | FunctionKind::Constructor)
    }
}

/// Value-side transform of a per-key mapped type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerKeyValue {
    /// `{ [K in keyof T]?: T[K] }`
    Optional,
    /// `{ [K in keyof T]: T[K] | null }`
    Nullable,
    /// `{ [K in keyof T]: T[K][] }`
    Array,
    /// `{ readonly [K in keyof T]: T[K] }`
    Readonly,
    /// `{ [K in keyof T]: U }`
    Replace(TypeId),
}

/// Mapped type transform kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappedTransform {
    /// `Partial<T>`
    Partial,
    /// `Required<T>`
    Required,
    /// `Pick<T, K>`
    Pick(Vec<String>),
    /// `Omit<T, K>`
    Omit(Vec<String>),
    /// `Record<K, V>`; the mapped source is the key type.
    Record { value: TypeId },
    /// `DeepReadonly<T>`
    Readonly,
    /// Any other transform applied per key.
    PerKey { name: String, value: PerKeyValue },
}

/// Bounds and pattern attached to a refined type. Bounds apply to the
/// value for numbers and to the length for strings and arrays.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Constraint {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub pattern: Option<String>,
}

/// A node in the type arena.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeNode {
    Primitive(Primitive),
    Literal(Literal),
    Array(TypeId),
    Tuple(Vec<TypeId>),
    Object(Vec<Field>),
    Union(Vec<TypeId>),
    Intersection(Vec<TypeId>),
    Generic {
        params: Vec<String>,
        body: TypeId,
    },
    /// Use of a type parameter by name.
    Param(String),
    Mapped {
        source: TypeId,
        transform: MappedTransform,
    },
    Reference {
        target: TypeId,
        args: Vec<TypeId>,
    },
    Function {
        kind: FunctionKind,
        params: Vec<Param>,
        returns: TypeId,
    },
    /// A base type narrowed by documented constraints (JSDoc tags such
    /// as `@minimum` or `@pattern`).
    Refined {
        base: TypeId,
        constraint: Constraint,
    },
    /// A name the host could not resolve.
    Unresolved(String),
    /// A shape with no validator equivalent (conditional types, etc.).
    Unsupported(String),
}

impl TypeNode {
    /// Canonical textual form. Children appear as their ids, so the form
    /// is cheap to compute and stable across sessions.
    pub fn canonical(&self) -> String {
        let mut out = String::new();
        match self {
            TypeNode::Primitive(p) => out.push_str(p.as_str()),
            TypeNode::Literal(lit) => {
                let _ = write!(out, "lit({})", lit.to_source());
            }
            TypeNode::Array(elem) => {
                let _ = write!(out, "array({})", elem);
            }
            TypeNode::Tuple(elems) => {
                let _ = write!(out, "tuple({})", join_ids(elems));
            }
            TypeNode::Object(fields) => {
                out.push_str("object{");
                for field in fields {
                    let _ = write!(
                        out,
                        "{}{}{}:{};",
                        if field.readonly { "readonly " } else { "" },
                        quote(&field.name),
                        if field.optional { "?" } else { "" },
                        field.ty
                    );
                }
                out.push('}');
            }
            TypeNode::Union(members) => {
                let _ = write!(out, "union({})", join_ids(members));
            }
            TypeNode::Intersection(members) => {
                let _ = write!(out, "intersection({})", join_ids(members));
            }
            TypeNode::Generic { params, body } => {
                let _ = write!(out, "generic<{}>({})", params.join(","), body);
            }
            TypeNode::Param(name) => {
                let _ = write!(out, "param({})", name);
            }
            TypeNode::Mapped { source, transform } => {
                let _ = write!(out, "mapped({},{:?})", source, transform);
            }
            TypeNode::Reference { target, args } => {
                let _ = write!(out, "ref({}<{}>)", target, join_ids(args));
            }
            TypeNode::Function {
                kind,
                params,
                returns,
            } => {
                let _ = write!(out, "fn:{:?}(", kind);
                for param in params {
                    let _ = write!(
                        out,
                        "{}{}:{};",
                        param.name,
                        if param.optional { "?" } else { "" },
                        param.ty
                    );
                }
                let _ = write!(out, ")=>{}", returns);
            }
            TypeNode::Refined { base, constraint } => {
                let _ = write!(out, "refined({},{:?})", base, constraint);
            }
            TypeNode::Unresolved(name) => {
                let _ = write!(out, "unresolved({})", name);
            }
            TypeNode::Unsupported(text) => {
                let _ = write!(out, "unsupported({})", text);
            }
        }
        out
    }

    /// Ids this node refers to directly, in declaration order.
    pub fn children(&self) -> Vec<TypeId> {
        match self {
            TypeNode::Primitive(_)
            | TypeNode::Literal(_)
            | TypeNode::Param(_)
            | TypeNode::Unresolved(_)
            | TypeNode::Unsupported(_) => Vec::new(),
            TypeNode::Array(elem) => vec![*elem],
            TypeNode::Tuple(ids) | TypeNode::Union(ids) | TypeNode::Intersection(ids) => {
                ids.clone()
            }
            TypeNode::Object(fields) => fields.iter().map(|f| f.ty).collect(),
            TypeNode::Generic { body, .. } => vec![*body],
            TypeNode::Refined { base, .. } => vec![*base],
            TypeNode::Mapped { source, transform } => {
                let mut ids = vec![*source];
                match transform {
                    MappedTransform::Record { value } => ids.push(*value),
                    MappedTransform::PerKey {
                        value: PerKeyValue::Replace(id),
                        ..
                    } => ids.push(*id),
                    _ => {}
                }
                ids
            }
            TypeNode::Reference { target, args } => {
                let mut ids = vec![*target];
                ids.extend(args.iter().copied());
                ids
            }
            TypeNode::Function {
                params, returns, ..
            } => {
                let mut ids: Vec<TypeId> = params.iter().map(|p| p.ty).collect();
                ids.push(*returns);
                ids
            }
        }
    }
}

fn join_ids(ids: &[TypeId]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Double-quoted string literal with JSON escaping.
pub fn quote(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{}\"", s))
}

pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}
