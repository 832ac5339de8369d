//! Schema generation: type arena in, validator trees out.
//!
//! [`SchemaGenerator`] walks the [`TypeArena`](shapecheck_ir::TypeArena)
//! one named declaration at a time, asking the resolver for each object
//! field whether an override applies. [`emit`] turns the results for one
//! source file into a TypeScript module.
//!
//! Nothing here fails a run: shapes that cannot be translated become
//! `z.any()` with a diagnostic on the schema.

mod error;
pub mod emit;
pub mod generator;

pub use emit::{emit_module, module_path, module_specifier};
pub use error::GenerationError;
pub use generator::{GenerateOptions, GeneratorStats, SchemaGenerator, select_declarations};
