use shapecheck_ir::TypeId;

/// A type shape the generator cannot turn into a validator.
///
/// Never returned from generation of a declaration body: the failing
/// position becomes `z.any()` and the error is kept as a diagnostic.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GenerationError {
    #[error("`{0}` is not a declaration")]
    NotADeclaration(TypeId),
    #[error("type node {0} is missing from the arena")]
    MissingNode(TypeId),
    #[error("cannot resolve type `{0}`")]
    Unresolved(String),
    #[error("unsupported type shape: {0}")]
    Unsupported(String),
    #[error("type parameter `{0}` is not bound here")]
    UnboundParam(String),
    #[error("anonymous type {0} refers to itself and has no name to defer to")]
    AnonymousRecursion(TypeId),
    #[error("per-key transform `{0}` needs an object type")]
    NotAnObject(String),
}
