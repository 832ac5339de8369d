//! Core data model for shapecheck.
//!
//! `shapecheck-ir` holds the two representations the rest of the
//! workspace passes around:
//!
//! ```text
//! Host declarations        Type arena              Validators
//! ─────────────────     ────────────────     ──────────────────────
//! DeclarationDocument ─> TypeArena ────────> Validator (combinator AST)
//!   (source.rs)          TypeId -> TypeNode     └─> render.rs -> Zod text
//! ```
//!
//! Type nodes live in an arena keyed by a stable [`TypeId`], so recursive
//! declarations need no cyclic pointers. Validators are a small AST of a
//! base kind plus modifiers and are rendered to text only at the end.
//!
//! # Example
//!
//! ```
//! use shapecheck_ir::{render, RenderOptions, Validator};
//!
//! let v = Validator::array(Validator::string()).optional();
//! assert_eq!(render(&v, &RenderOptions::default()), "z.array(z.string()).optional()");
//! ```

pub mod arena;
pub mod cycles;
pub mod diagnostic;
pub mod id;
pub mod node;
pub mod render;
pub mod schema;
pub mod source;
pub mod validator;

pub use arena::{DeclKind, Declaration, TypeArena};
pub use cycles::CycleIndex;
pub use diagnostic::{Diagnostic, DiagnosticKind, DiagnosticLevel};
pub use id::TypeId;
pub use node::{
    Constraint, Field, FunctionKind, Literal, MappedTransform, Param, PerKeyValue, Primitive,
    TypeNode,
};
pub use render::{RenderOptions, WITH_MESSAGE_HELPER, object_key, render, schema_name};
pub use schema::{FieldSource, GeneratedSchema, MemberSignature};
pub use source::{
    DeclarationDocument, DeclarationExpr, DocumentError, FieldExpr, LowerError, ParamExpr,
    PerKeyExpr, TransformExpr, TypeExpr, lower_documents,
};
pub use validator::{BASE_TOKEN, Modifier, ObjectEntry, Validator, ValidatorKind};
