//! The type-to-validator compiler.

use crate::GenerationError;
use serde::{Deserialize, Serialize};
use shapecheck_cache::SchemaCache;
use shapecheck_ir::{
    CycleIndex, Declaration, Diagnostic, DiagnosticKind, Field, FieldSource, GeneratedSchema,
    Literal, MappedTransform, MemberSignature, Modifier, ObjectEntry, Param, PerKeyValue,
    Primitive, RenderOptions, TypeArena, TypeId, TypeNode, Validator, ValidatorKind,
};
use shapecheck_resolver::{RuleSet, resolve};
use std::collections::HashSet;
use std::ops::AddAssign;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerateOptions {
    /// Fallbacks are reported as errors rather than warnings.
    pub strict: bool,
    /// Only exported declarations and what they reference.
    pub export_only: bool,
    pub schema_suffix: String,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            strict: false,
            export_only: false,
            schema_suffix: RenderOptions::default().schema_suffix,
        }
    }
}

impl GenerateOptions {
    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            schema_suffix: self.schema_suffix.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorStats {
    /// Type nodes visited.
    pub types_processed: u64,
    pub declarations_generated: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    /// Positions that fell back to `z.any()`.
    pub fallbacks: u64,
    pub lazy_references: u64,
}

impl AddAssign for GeneratorStats {
    fn add_assign(&mut self, other: Self) {
        self.types_processed += other.types_processed;
        self.declarations_generated += other.declarations_generated;
        self.cache_hits += other.cache_hits;
        self.cache_misses += other.cache_misses;
        self.fallbacks += other.fallbacks;
        self.lazy_references += other.lazy_references;
    }
}

/// Declarations to generate, in declaration order.
///
/// With `export_only`, exported declarations plus every declaration they
/// reach by reference; otherwise all of them.
pub fn select_declarations(arena: &TypeArena, export_only: bool) -> Vec<TypeId> {
    if !export_only {
        return arena.declarations().map(|d| d.id).collect();
    }
    let mut wanted: HashSet<TypeId> = HashSet::new();
    let mut stack: Vec<TypeId> = arena
        .declarations()
        .filter(|d| d.exported)
        .map(|d| d.id)
        .collect();
    while let Some(id) = stack.pop() {
        if wanted.insert(id) {
            stack.extend(arena.referenced_declarations(id));
        }
    }
    arena
        .declarations()
        .map(|d| d.id)
        .filter(|id| wanted.contains(id))
        .collect()
}

/// Per-declaration generation state.
struct Scope {
    id: TypeId,
    name: String,
    /// Declaration plus anonymous nodes on the current path.
    in_progress: HashSet<TypeId>,
    /// Bound type parameters, innermost last.
    params: Vec<Vec<String>>,
    /// Field path below the declaration.
    path: Vec<String>,
    dependencies: Vec<TypeId>,
    field_sources: Vec<FieldSource>,
    members: Vec<MemberSignature>,
    diagnostics: Vec<Diagnostic>,
}

impl Scope {
    fn new(decl: &Declaration) -> Self {
        Self {
            id: decl.id,
            name: decl.name.clone(),
            in_progress: HashSet::from([decl.id]),
            params: Vec::new(),
            path: Vec::new(),
            dependencies: Vec::new(),
            field_sources: Vec::new(),
            members: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    fn field_path(&self) -> String {
        self.path.join(".")
    }

    /// `User` or `User.address.city`.
    fn location(&self) -> String {
        if self.path.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.name, self.field_path())
        }
    }

    fn is_bound(&self, param: &str) -> bool {
        self.params
            .iter()
            .any(|scope| scope.iter().any(|p| p == param))
    }
}

/// Generates validators for the declarations of one arena.
///
/// Every named declaration is generated on its own: references to other
/// declarations become named references, never inlined copies. A
/// reference back into the declaration's own reference cycle is deferred
/// with a lazy reference, so the output for a declaration does not depend
/// on what was generated before it.
pub struct SchemaGenerator<'a> {
    arena: &'a TypeArena,
    rules: &'a RuleSet,
    cycles: CycleIndex,
    options: GenerateOptions,
    stats: GeneratorStats,
}

impl<'a> SchemaGenerator<'a> {
    pub fn new(arena: &'a TypeArena, rules: &'a RuleSet, options: GenerateOptions) -> Self {
        Self {
            arena,
            rules,
            cycles: CycleIndex::build(arena),
            options,
            stats: GeneratorStats::default(),
        }
    }

    pub fn arena(&self) -> &'a TypeArena {
        self.arena
    }

    pub fn options(&self) -> &GenerateOptions {
        &self.options
    }

    pub fn stats(&self) -> GeneratorStats {
        self.stats
    }

    /// Generate the schema for one named declaration.
    pub fn generate(&mut self, id: TypeId) -> Result<GeneratedSchema, GenerationError> {
        let arena = self.arena;
        let decl = arena
            .declaration(id)
            .ok_or(GenerationError::NotADeclaration(id))?;
        let mut scope = Scope::new(decl);

        let validator = match arena.get(id) {
            Some(node) => {
                self.stats.types_processed += 1;
                self.node_validator(&mut scope, node)
            }
            None => self.fallback(&mut scope, GenerationError::MissingNode(id)),
        };
        self.stats.declarations_generated += 1;
        tracing::debug!(declaration = %decl.name, %id, "generated schema");

        Ok(GeneratedSchema {
            id,
            name: decl.name.clone(),
            file: decl.file.clone(),
            kind: decl.kind,
            exported: decl.exported,
            validator,
            members: scope.members,
            dependencies: scope.dependencies,
            field_sources: scope.field_sources,
            diagnostics: scope.diagnostics,
            fingerprint: arena.fingerprint(id),
        })
    }

    /// [`generate`](Self::generate) through the schema cache.
    pub fn generate_cached(
        &mut self,
        id: TypeId,
        cache: &mut SchemaCache,
    ) -> Result<GeneratedSchema, GenerationError> {
        if let Some(schema) = cache.get_current(id, self.arena.fingerprint(id)) {
            self.stats.cache_hits += 1;
            return Ok(schema.clone());
        }
        self.stats.cache_misses += 1;
        let schema = self.generate(id)?;
        cache.insert(schema.clone());
        Ok(schema)
    }

    /// Generate every selected declaration, in declaration order.
    pub fn generate_all(&mut self, mut cache: Option<&mut SchemaCache>) -> Vec<GeneratedSchema> {
        let ids = select_declarations(self.arena, self.options.export_only);
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            let result = match cache.as_deref_mut() {
                Some(cache) => self.generate_cached(id, cache),
                None => self.generate(id),
            };
            match result {
                Ok(schema) => out.push(schema),
                Err(err) => tracing::warn!("{err}"),
            }
        }
        out
    }

    fn validator_for(&mut self, scope: &mut Scope, id: TypeId) -> Validator {
        if self.arena.declaration(id).is_some() {
            return self.reference(scope, id, &[]);
        }
        let arena = self.arena;
        let Some(node) = arena.get(id) else {
            return self.fallback(scope, GenerationError::MissingNode(id));
        };
        if !scope.in_progress.insert(id) {
            return self.fallback(scope, GenerationError::AnonymousRecursion(id));
        }
        self.stats.types_processed += 1;
        let validator = self.node_validator(scope, node);
        scope.in_progress.remove(&id);
        validator
    }

    fn node_validator(&mut self, scope: &mut Scope, node: &'a TypeNode) -> Validator {
        match node {
            TypeNode::Primitive(p) => Validator::primitive(*p),
            TypeNode::Literal(lit) => Validator::literal(lit.clone()),
            TypeNode::Array(element) => Validator::array(self.validator_for(scope, *element)),
            TypeNode::Tuple(elements) => Validator::new(ValidatorKind::Tuple(
                elements
                    .iter()
                    .map(|e| self.validator_for(scope, *e))
                    .collect(),
            )),
            TypeNode::Object(fields) => self.object_validator(scope, fields),
            TypeNode::Union(members) => self.union_validator(scope, members),
            TypeNode::Intersection(members) => Validator::intersection(
                members
                    .iter()
                    .map(|m| self.validator_for(scope, *m))
                    .collect(),
            ),
            TypeNode::Generic { params, body } => {
                scope.params.push(params.clone());
                let body = self.validator_for(scope, *body);
                scope.params.pop();
                Validator::new(ValidatorKind::Generic {
                    params: params.clone(),
                    body: Box::new(body),
                })
            }
            TypeNode::Param(name) => {
                if scope.is_bound(name) {
                    Validator::new(ValidatorKind::Param(name.clone()))
                } else {
                    self.fallback(scope, GenerationError::UnboundParam(name.clone()))
                }
            }
            TypeNode::Mapped { source, transform } => {
                self.mapped_validator(scope, *source, transform)
            }
            TypeNode::Reference { target, args } => self.reference(scope, *target, args),
            TypeNode::Function {
                params, returns, ..
            } => {
                let params = self.param_validators(scope, params);
                let returns = self.validator_for(scope, *returns);
                Validator::new(ValidatorKind::Function {
                    params,
                    returns: Box::new(returns),
                })
            }
            TypeNode::Refined { base, constraint } => {
                let mut validator = self.validator_for(scope, *base);
                if constraint.min.is_some() || constraint.max.is_some() {
                    validator = validator.with(Modifier::Bounds {
                        min: constraint.min,
                        max: constraint.max,
                    });
                }
                if let Some(pattern) = &constraint.pattern {
                    validator = validator.with(Modifier::Pattern(pattern.clone()));
                }
                validator
            }
            TypeNode::Unresolved(name) => {
                self.fallback(scope, GenerationError::Unresolved(name.clone()))
            }
            TypeNode::Unsupported(text) => {
                self.fallback(scope, GenerationError::Unsupported(text.clone()))
            }
        }
    }

    fn object_validator(&mut self, scope: &mut Scope, fields: &'a [Field]) -> Validator {
        let arena = self.arena;
        let mut entries = Vec::with_capacity(fields.len());
        for field in fields {
            scope.path.push(field.name.clone());

            let member = arena
                .get(field.ty)
                .filter(|_| arena.declaration(field.ty).is_none());
            if let Some(TypeNode::Function {
                kind,
                params,
                returns,
            }) = member.filter(|node| {
                matches!(node, TypeNode::Function { kind, .. } if kind.is_member())
            }) {
                let params = Validator::new(ValidatorKind::Tuple(
                    self.param_validators(scope, params),
                ));
                let returns = self.validator_for(scope, *returns);
                scope.members.push(MemberSignature {
                    member: scope.field_path(),
                    kind: *kind,
                    params,
                    returns,
                });
                scope.path.pop();
                continue;
            }

            let base = self.validator_for(scope, field.ty);
            let validator = self.resolve_field(scope, &field.name, base);
            entries.push(ObjectEntry {
                name: field.name.clone(),
                validator: if field.optional {
                    validator.optional()
                } else {
                    validator
                },
            });
            scope.path.pop();
        }
        Validator::object(entries)
    }

    fn resolve_field(&mut self, scope: &mut Scope, field: &str, base: Validator) -> Validator {
        let resolution = resolve(self.rules, field, base, Some(scope.name.as_str()));
        if !resolution.source.is_default() {
            tracing::trace!(field = %scope.location(), source = %resolution.source, "override applied");
        }
        scope.field_sources.push(FieldSource {
            path: scope.field_path(),
            source: resolution.source.to_string(),
        });
        resolution.validator
    }

    /// `null` and `undefined` members become `.nullable()` and
    /// `.optional()` on the union of the rest.
    fn union_validator(&mut self, scope: &mut Scope, members: &'a [TypeId]) -> Validator {
        let arena = self.arena;
        let mut nullable = false;
        let mut optional = false;
        let mut rest = Vec::with_capacity(members.len());
        for member in members {
            let anonymous = arena.declaration(*member).is_none();
            match arena.get(*member) {
                Some(TypeNode::Primitive(Primitive::Null) | TypeNode::Literal(Literal::Null))
                    if anonymous =>
                {
                    nullable = true
                }
                Some(TypeNode::Primitive(Primitive::Undefined)) if anonymous => optional = true,
                _ => rest.push(*member),
            }
        }
        if rest.is_empty() {
            rest = members.to_vec();
            nullable = false;
            optional = false;
        }

        let mut validator = Validator::union(
            rest.iter()
                .map(|m| self.validator_for(scope, *m))
                .collect(),
        );
        if nullable {
            validator = validator.nullable();
        }
        if optional {
            validator = validator.optional();
        }
        validator
    }

    fn mapped_validator(
        &mut self,
        scope: &mut Scope,
        source: TypeId,
        transform: &'a MappedTransform,
    ) -> Validator {
        match transform {
            MappedTransform::Partial => self.validator_for(scope, source).with(Modifier::Partial),
            MappedTransform::Required => self.validator_for(scope, source).with(Modifier::Required),
            MappedTransform::Pick(keys) => self
                .validator_for(scope, source)
                .with(Modifier::Pick(keys.clone())),
            MappedTransform::Omit(keys) => self
                .validator_for(scope, source)
                .with(Modifier::Omit(keys.clone())),
            MappedTransform::Record { value } => {
                let key = self.validator_for(scope, source);
                let value = self.validator_for(scope, *value);
                Validator::new(ValidatorKind::Record {
                    key: Box::new(key),
                    value: Box::new(value),
                })
            }
            MappedTransform::Readonly => {
                self.validator_for(scope, source).with(Modifier::Readonly)
            }
            MappedTransform::PerKey { name, value } => self.per_key(scope, source, name, value),
        }
    }

    /// Synthesize an object by applying `value` to each field of `source`.
    fn per_key(
        &mut self,
        scope: &mut Scope,
        source: TypeId,
        name: &str,
        value: &'a PerKeyValue,
    ) -> Validator {
        let Some(fields) = self.object_fields(source) else {
            return self.fallback(scope, GenerationError::NotAnObject(name.to_string()));
        };
        let mut entries = Vec::with_capacity(fields.len());
        for field in fields {
            scope.path.push(field.name.clone());
            let base = self.validator_for(scope, field.ty);
            let mapped = match value {
                PerKeyValue::Optional => base.optional(),
                PerKeyValue::Nullable => base.nullable(),
                PerKeyValue::Array => Validator::array(base),
                PerKeyValue::Readonly => base.with(Modifier::Readonly),
                PerKeyValue::Replace(id) => self.validator_for(scope, *id),
            };
            let validator = self.resolve_field(scope, &field.name, mapped);
            entries.push(ObjectEntry {
                name: field.name.clone(),
                validator: if field.optional {
                    validator.optional()
                } else {
                    validator
                },
            });
            scope.path.pop();
        }
        Validator::object(entries)
    }

    /// Fields of the object `id` denotes, following plain references.
    fn object_fields(&self, id: TypeId) -> Option<&'a [Field]> {
        let arena = self.arena;
        let mut seen = HashSet::new();
        let mut current = id;
        loop {
            if !seen.insert(current) {
                return None;
            }
            match arena.get(current)? {
                TypeNode::Object(fields) => return Some(fields),
                TypeNode::Reference { target, .. } => current = *target,
                _ => return None,
            }
        }
    }

    fn param_validators(&mut self, scope: &mut Scope, params: &'a [Param]) -> Vec<Validator> {
        params
            .iter()
            .map(|p| {
                let validator = self.validator_for(scope, p.ty);
                if p.optional {
                    validator.optional()
                } else {
                    validator
                }
            })
            .collect()
    }

    /// Named reference to a declaration; lazy when it points back into
    /// the current declaration's reference cycle.
    fn reference(&mut self, scope: &mut Scope, target: TypeId, args: &'a [TypeId]) -> Validator {
        let arena = self.arena;
        let Some(decl) = arena.declaration(target) else {
            return self.validator_for(scope, target);
        };

        let mut args: Vec<Validator> = args.iter().map(|a| self.validator_for(scope, *a)).collect();
        match arena.get(target) {
            // missing arguments default to z.any()
            Some(TypeNode::Generic { params, .. }) => {
                args.truncate(params.len());
                args.resize_with(params.len(), Validator::any);
            }
            _ => args.clear(),
        }

        if !scope.dependencies.contains(&target) {
            scope.dependencies.push(target);
        }
        if scope.in_progress.contains(&target) || self.cycles.same_cycle(scope.id, target) {
            self.stats.lazy_references += 1;
            Validator::lazy(decl.name.clone(), args)
        } else {
            Validator::reference(decl.name.clone(), args)
        }
    }

    fn fallback(&mut self, scope: &mut Scope, error: GenerationError) -> Validator {
        self.stats.fallbacks += 1;
        let location = scope.location();
        tracing::warn!(at = %location, "{error}; falling back to z.any()");
        let diagnostic = if self.options.strict {
            Diagnostic::error(DiagnosticKind::Generation, error.to_string())
        } else {
            Diagnostic::warning(DiagnosticKind::Generation, error.to_string())
        };
        scope.diagnostics.push(diagnostic.in_context(location));
        Validator::any()
    }
}
