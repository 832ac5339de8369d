//! Generated output for one declaration.

use crate::{DeclKind, Diagnostic, FunctionKind, TypeId, Validator};
use serde::{Deserialize, Serialize};

/// Parameter and return validators of a class method or constructor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberSignature {
    pub member: String,
    pub kind: FunctionKind,
    /// Tuple validator over the parameters.
    pub params: Validator,
    pub returns: Validator,
}

/// Which override rule produced a field's validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSource {
    /// Dotted path from the declaration, e.g. `address.city`.
    pub path: String,
    /// Resolver source tag, e.g. `context-exact:User.email` or `default`.
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedSchema {
    pub id: TypeId,
    pub name: String,
    pub file: String,
    pub kind: DeclKind,
    pub exported: bool,
    pub validator: Validator,
    pub members: Vec<MemberSignature>,
    /// Declarations this one refers to by name, in first-use order.
    pub dependencies: Vec<TypeId>,
    pub field_sources: Vec<FieldSource>,
    pub diagnostics: Vec<Diagnostic>,
    /// [`TypeArena::fingerprint`](crate::TypeArena::fingerprint) of the
    /// declaration when this schema was generated.
    pub fingerprint: u64,
}

impl GeneratedSchema {
    pub fn source_of(&self, path: &str) -> Option<&str> {
        self.field_sources
            .iter()
            .find(|s| s.path == path)
            .map(|s| s.source.as_str())
    }
}
