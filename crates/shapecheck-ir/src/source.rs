//! Declaration documents: the host's view of declared types.
//!
//! The host compiler walks its own AST and hands over each compilation
//! unit as a [`DeclarationDocument`], a nested JSON tree where references
//! are by name. [`lower_documents`] interns documents into a
//! [`TypeArena`], resolving names to stable ids.
//!
//! ```json
//! {
//!   "file": "src/user.ts",
//!   "declarations": [
//!     {
//!       "name": "User",
//!       "kind": "interface",
//!       "exported": true,
//!       "type": {
//!         "kind": "object",
//!         "fields": [{ "name": "email", "type": { "kind": "string" } }]
//!       }
//!     }
//!   ]
//! }
//! ```

use crate::{
    Constraint, DeclKind, Field, FunctionKind, Literal, MappedTransform, Param, PerKeyValue,
    Primitive, TypeArena, TypeId, TypeNode,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid declaration document {path}: {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum LowerError {
    #[error("{file}: `{name}` is declared more than once")]
    DuplicateDeclaration { file: String, name: String },
}

/// One compilation unit's declared types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeclarationDocument {
    pub file: String,
    #[serde(default)]
    pub declarations: Vec<DeclarationExpr>,
}

impl DeclarationDocument {
    pub fn from_path(path: &Path) -> Result<Self, DocumentError> {
        let text = std::fs::read_to_string(path).map_err(|source| DocumentError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| DocumentError::Json {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn from_json_str(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeclarationExpr {
    pub name: String,
    #[serde(default)]
    pub kind: DeclKind,
    #[serde(default)]
    pub exported: bool,
    /// Type parameters of a generic declaration.
    #[serde(default)]
    pub params: Vec<String>,
    #[serde(rename = "type")]
    pub ty: TypeExpr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldExpr {
    pub name: String,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub readonly: bool,
    #[serde(rename = "type")]
    pub ty: TypeExpr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamExpr {
    pub name: String,
    #[serde(default)]
    pub optional: bool,
    #[serde(rename = "type")]
    pub ty: TypeExpr,
}

/// Nested type expression as supplied by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeExpr {
    String,
    Number,
    Integer,
    Boolean,
    #[serde(rename = "bigint")]
    BigInt,
    Null,
    Undefined,
    Any,
    Unknown,
    Never,
    Date,
    Symbol,
    Literal {
        value: serde_json::Value,
    },
    Array {
        element: Box<TypeExpr>,
    },
    Tuple {
        elements: Vec<TypeExpr>,
    },
    Object {
        #[serde(default)]
        fields: Vec<FieldExpr>,
    },
    Union {
        members: Vec<TypeExpr>,
    },
    Intersection {
        members: Vec<TypeExpr>,
    },
    Generic {
        params: Vec<String>,
        body: Box<TypeExpr>,
    },
    Param {
        name: String,
    },
    Mapped {
        source: Box<TypeExpr>,
        transform: TransformExpr,
    },
    Ref {
        name: String,
        #[serde(default)]
        args: Vec<TypeExpr>,
    },
    Function {
        #[serde(default)]
        function: FunctionKind,
        #[serde(default)]
        params: Vec<ParamExpr>,
        returns: Box<TypeExpr>,
    },
    Refined {
        base: Box<TypeExpr>,
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
        #[serde(default)]
        pattern: Option<String>,
    },
    Unsupported {
        text: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransformExpr {
    Partial,
    Required,
    Pick { keys: Vec<String> },
    Omit { keys: Vec<String> },
    Record { value: Box<TypeExpr> },
    Readonly,
    PerKey { name: String, value: PerKeyExpr },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PerKeyExpr {
    Optional,
    Nullable,
    Array,
    Readonly,
    Replace { value: Box<TypeExpr> },
}

/// Lower documents into one arena so references resolve across files.
///
/// A name resolves to a declaration in the same file first, then to the
/// first declaration of that name in document order. Unknown names lower
/// to [`TypeNode::Unresolved`].
pub fn lower_documents(documents: &[DeclarationDocument]) -> Result<TypeArena, LowerError> {
    let mut arena = TypeArena::new();
    let mut names: HashMap<String, Vec<(String, TypeId)>> = HashMap::new();

    for doc in documents {
        for decl in &doc.declarations {
            let taken = names
                .get(&decl.name)
                .is_some_and(|ids| ids.iter().any(|(file, _)| file == &doc.file));
            if taken {
                return Err(LowerError::DuplicateDeclaration {
                    file: doc.file.clone(),
                    name: decl.name.clone(),
                });
            }
            let id = arena.declare(&doc.file, &decl.name, decl.kind, decl.exported);
            names
                .entry(decl.name.clone())
                .or_default()
                .push((doc.file.clone(), id));
        }
    }

    for doc in documents {
        for decl in &doc.declarations {
            let id = TypeId::declaration(&doc.file, &decl.name);
            let mut lowerer = Lowerer {
                arena: &mut arena,
                names: &names,
                file: &doc.file,
                context: &decl.name,
                scopes: Vec::new(),
            };
            let node = if decl.params.is_empty() {
                lowerer.lower_node(&decl.ty)
            } else {
                lowerer.scopes.push(decl.params.clone());
                let body = lowerer.lower(&decl.ty);
                lowerer.scopes.pop();
                TypeNode::Generic {
                    params: decl.params.clone(),
                    body,
                }
            };
            arena.define(id, node);
        }
    }

    Ok(arena)
}

struct Lowerer<'a> {
    arena: &'a mut TypeArena,
    names: &'a HashMap<String, Vec<(String, TypeId)>>,
    file: &'a str,
    context: &'a str,
    /// Type parameters in scope, innermost last.
    scopes: Vec<Vec<String>>,
}

impl Lowerer<'_> {
    fn lower(&mut self, expr: &TypeExpr) -> TypeId {
        let node = self.lower_node(expr);
        self.arena.intern(self.file, self.context, node)
    }

    fn lower_all(&mut self, exprs: &[TypeExpr]) -> Vec<TypeId> {
        exprs.iter().map(|e| self.lower(e)).collect()
    }

    fn lower_node(&mut self, expr: &TypeExpr) -> TypeNode {
        match expr {
            TypeExpr::String => TypeNode::Primitive(Primitive::String),
            TypeExpr::Number => TypeNode::Primitive(Primitive::Number),
            TypeExpr::Integer => TypeNode::Primitive(Primitive::Integer),
            TypeExpr::Boolean => TypeNode::Primitive(Primitive::Boolean),
            TypeExpr::BigInt => TypeNode::Primitive(Primitive::BigInt),
            TypeExpr::Null => TypeNode::Primitive(Primitive::Null),
            TypeExpr::Undefined => TypeNode::Primitive(Primitive::Undefined),
            TypeExpr::Any => TypeNode::Primitive(Primitive::Any),
            TypeExpr::Unknown => TypeNode::Primitive(Primitive::Unknown),
            TypeExpr::Never => TypeNode::Primitive(Primitive::Never),
            TypeExpr::Date => TypeNode::Primitive(Primitive::Date),
            TypeExpr::Symbol => TypeNode::Primitive(Primitive::Symbol),
            TypeExpr::Literal { value } => match literal_from_json(value) {
                Some(lit) => TypeNode::Literal(lit),
                None => TypeNode::Unsupported(format!("literal {}", value)),
            },
            TypeExpr::Array { element } => TypeNode::Array(self.lower(element)),
            TypeExpr::Tuple { elements } => TypeNode::Tuple(self.lower_all(elements)),
            TypeExpr::Object { fields } => TypeNode::Object(
                fields
                    .iter()
                    .map(|f| Field {
                        name: f.name.clone(),
                        ty: self.lower(&f.ty),
                        optional: f.optional,
                        readonly: f.readonly,
                    })
                    .collect(),
            ),
            TypeExpr::Union { members } => TypeNode::Union(self.lower_all(members)),
            TypeExpr::Intersection { members } => TypeNode::Intersection(self.lower_all(members)),
            TypeExpr::Generic { params, body } => {
                self.scopes.push(params.clone());
                let body = self.lower(body);
                self.scopes.pop();
                TypeNode::Generic {
                    params: params.clone(),
                    body,
                }
            }
            TypeExpr::Param { name } => TypeNode::Param(name.clone()),
            TypeExpr::Mapped { source, transform } => {
                let source = self.lower(source);
                let transform = self.lower_transform(transform);
                TypeNode::Mapped { source, transform }
            }
            TypeExpr::Ref { name, args } => self.lower_ref(name, args),
            TypeExpr::Function {
                function,
                params,
                returns,
            } => TypeNode::Function {
                kind: *function,
                params: params
                    .iter()
                    .map(|p| Param {
                        name: p.name.clone(),
                        ty: self.lower(&p.ty),
                        optional: p.optional,
                    })
                    .collect(),
                returns: self.lower(returns),
            },
            TypeExpr::Refined {
                base,
                min,
                max,
                pattern,
            } => TypeNode::Refined {
                base: self.lower(base),
                constraint: Constraint {
                    min: *min,
                    max: *max,
                    pattern: pattern.clone(),
                },
            },
            TypeExpr::Unsupported { text } => TypeNode::Unsupported(text.clone()),
        }
    }

    fn lower_transform(&mut self, transform: &TransformExpr) -> MappedTransform {
        match transform {
            TransformExpr::Partial => MappedTransform::Partial,
            TransformExpr::Required => MappedTransform::Required,
            TransformExpr::Pick { keys } => MappedTransform::Pick(keys.clone()),
            TransformExpr::Omit { keys } => MappedTransform::Omit(keys.clone()),
            TransformExpr::Record { value } => MappedTransform::Record {
                value: self.lower(value),
            },
            TransformExpr::Readonly => MappedTransform::Readonly,
            TransformExpr::PerKey { name, value } => MappedTransform::PerKey {
                name: name.clone(),
                value: match value {
                    PerKeyExpr::Optional => PerKeyValue::Optional,
                    PerKeyExpr::Nullable => PerKeyValue::Nullable,
                    PerKeyExpr::Array => PerKeyValue::Array,
                    PerKeyExpr::Readonly => PerKeyValue::Readonly,
                    PerKeyExpr::Replace { value } => PerKeyValue::Replace(self.lower(value)),
                },
            },
        }
    }

    fn lower_ref(&mut self, name: &str, args: &[TypeExpr]) -> TypeNode {
        if args.is_empty() && self.scopes.iter().any(|scope| scope.iter().any(|p| p == name)) {
            return TypeNode::Param(name.to_string());
        }
        if let Some(target) = self.resolve(name) {
            return TypeNode::Reference {
                target,
                args: self.lower_all(args),
            };
        }
        if let Some(node) = self.lower_builtin(name, args) {
            return node;
        }
        TypeNode::Unresolved(name.to_string())
    }

    fn resolve(&self, name: &str) -> Option<TypeId> {
        let candidates = self.names.get(name)?;
        candidates
            .iter()
            .find(|(file, _)| file == self.file)
            .or_else(|| candidates.first())
            .map(|(_, id)| *id)
    }

    /// Utility types the host may pass through unexpanded.
    fn lower_builtin(&mut self, name: &str, args: &[TypeExpr]) -> Option<TypeNode> {
        let node = match (name, args) {
            ("Array" | "ReadonlyArray", [element]) => TypeNode::Array(self.lower(element)),
            ("Date", []) => TypeNode::Primitive(Primitive::Date),
            ("Partial", [source]) => TypeNode::Mapped {
                source: self.lower(source),
                transform: MappedTransform::Partial,
            },
            ("Required", [source]) => TypeNode::Mapped {
                source: self.lower(source),
                transform: MappedTransform::Required,
            },
            ("Readonly", [source]) => TypeNode::Mapped {
                source: self.lower(source),
                transform: MappedTransform::Readonly,
            },
            ("Record", [key, value]) => TypeNode::Mapped {
                source: self.lower(key),
                transform: MappedTransform::Record {
                    value: self.lower(value),
                },
            },
            ("Pick" | "Omit", [source, keys]) => {
                let keys = literal_keys(keys)?;
                let source = self.lower(source);
                let transform = if name == "Pick" {
                    MappedTransform::Pick(keys)
                } else {
                    MappedTransform::Omit(keys)
                };
                TypeNode::Mapped { source, transform }
            }
            _ => return None,
        };
        Some(node)
    }
}

fn literal_from_json(value: &serde_json::Value) -> Option<Literal> {
    match value {
        serde_json::Value::String(s) => Some(Literal::String(s.clone())),
        serde_json::Value::Number(n) => n.as_f64().map(Literal::Number),
        serde_json::Value::Bool(b) => Some(Literal::Boolean(*b)),
        serde_json::Value::Null => Some(Literal::Null),
        _ => None,
    }
}

/// Keys named by a string literal or a union of string literals.
fn literal_keys(expr: &TypeExpr) -> Option<Vec<String>> {
    match expr {
        TypeExpr::Literal {
            value: serde_json::Value::String(s),
        } => Some(vec![s.clone()]),
        TypeExpr::Union { members } => members
            .iter()
            .map(|m| match m {
                TypeExpr::Literal {
                    value: serde_json::Value::String(s),
                } => Some(s.clone()),
                _ => None,
            })
            .collect(),
        _ => None,
    }
}
