//! Work units: self-contained generation jobs that can cross to a worker.

use serde::{Deserialize, Serialize};
use shapecheck_gen::{GenerateOptions, GeneratorStats, SchemaGenerator};
use shapecheck_ir::{GeneratedSchema, TypeArena, TypeId};
use shapecheck_resolver::{RuleSet, RuleSpec};
use std::fmt;

/// Identifier the coordinator assigns to each dispatched unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Why a unit did not produce a result in its worker.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkerError {
    #[error("failed to encode work unit: {0}")]
    Encode(String),
    #[error("failed to decode work unit: {0}")]
    Decode(String),
    #[error("task {task} failed: {message}")]
    Failed { task: TaskId, message: String },
    #[error("worker panicked: {0}")]
    Panicked(String),
    #[error("no result within {0} ms")]
    TimedOut(u64),
    #[error("cancelled before it started")]
    Cancelled,
}

/// Everything a worker needs to generate a batch of declarations.
///
/// The arena is the subset reachable from `roots`, and rules travel as
/// their source [`RuleSpec`]; the worker recompiles them. Nothing in a
/// unit refers back to coordinator state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkUnit {
    pub task_id: TaskId,
    pub arena: TypeArena,
    pub roots: Vec<TypeId>,
    pub rules: RuleSpec,
    pub options: GenerateOptions,
}

impl WorkUnit {
    pub fn new(
        task_id: TaskId,
        arena: &TypeArena,
        roots: Vec<TypeId>,
        rules: &RuleSet,
        options: GenerateOptions,
    ) -> Self {
        Self {
            task_id,
            arena: arena.subset(&roots),
            roots,
            rules: rules.spec().clone(),
            options,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, WorkerError> {
        bincode::serialize(self).map_err(|e| WorkerError::Encode(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, WorkerError> {
        bincode::deserialize(bytes).map_err(|e| WorkerError::Decode(e.to_string()))
    }
}

/// Schemas produced for a unit's roots, in root order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnitOutput {
    pub schemas: Vec<GeneratedSchema>,
    pub stats: GeneratorStats,
}

/// Message a worker sends back to the coordinator.
#[derive(Debug)]
pub struct WorkResult {
    pub task_id: TaskId,
    pub outcome: Result<UnitOutput, WorkerError>,
}

/// Generate a unit in the current thread.
///
/// Used by workers and by the coordinator's synchronous fallback, so both
/// paths produce identical schemas.
pub fn generate_unit(unit: &WorkUnit) -> UnitOutput {
    let rules = RuleSet::rebuild(unit.rules.clone());
    let mut generator = SchemaGenerator::new(&unit.arena, &rules, unit.options.clone());
    let mut schemas = Vec::with_capacity(unit.roots.len());
    for id in &unit.roots {
        match generator.generate(*id) {
            Ok(schema) => schemas.push(schema),
            Err(err) => tracing::warn!(task = %unit.task_id, "{err}"),
        }
    }
    UnitOutput {
        schemas,
        stats: generator.stats(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shapecheck_config::OverrideConfig;
    use shapecheck_ir::{DeclarationDocument, lower_documents, render, RenderOptions};

    fn arena() -> TypeArena {
        let doc = DeclarationDocument::from_json_str(
            r#"{"file": "user.ts", "declarations": [
                {"name": "User", "exported": true, "type": {"kind": "object", "fields": [
                    {"name": "email", "type": {"kind": "string"}},
                    {"name": "address", "type": {"kind": "ref", "name": "Address"}}
                ]}},
                {"name": "Address", "type": {"kind": "object", "fields": [
                    {"name": "city", "type": {"kind": "string"}}
                ]}},
                {"name": "Unrelated", "type": {"kind": "number"}}
            ]}"#,
        )
        .unwrap();
        lower_documents(&[doc]).unwrap()
    }

    #[test]
    fn test_unit_carries_reachable_subset() {
        let arena = arena();
        let user = arena.find_declaration("User").unwrap().id;
        let unit = WorkUnit::new(
            TaskId(1),
            &arena,
            vec![user],
            &RuleSet::empty(),
            GenerateOptions::default(),
        );
        assert!(unit.arena.find_declaration("Address").is_some());
        assert!(unit.arena.find_declaration("Unrelated").is_none());
    }

    #[test]
    fn test_decoded_unit_generates_same_schemas() {
        let arena = arena();
        let rules = RuleSet::compile(&OverrideConfig::default().field("email", "z.string().email()"));
        let roots: Vec<TypeId> = arena.declarations().map(|d| d.id).collect();
        let unit = WorkUnit::new(TaskId(7), &arena, roots, &rules, GenerateOptions::default());

        let bytes = unit.encode().unwrap();
        let decoded = WorkUnit::decode(&bytes).unwrap();
        assert_eq!(decoded, unit);

        let direct = generate_unit(&unit);
        let remote = generate_unit(&decoded);
        assert_eq!(direct, remote);
        assert_eq!(
            render(&remote.schemas[0].validator, &RenderOptions::default()),
            "z.object({ email: z.string().email(), address: AddressSchema })"
        );
    }

    #[test]
    fn test_garbage_does_not_decode() {
        assert!(matches!(
            WorkUnit::decode(&[0xff, 0x01]),
            Err(WorkerError::Decode(_))
        ));
    }

    #[test]
    fn test_task_id_display() {
        assert_eq!(TaskId(5).to_string(), "#5");
    }
}
