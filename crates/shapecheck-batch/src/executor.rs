//! What a worker runs for a unit.

use crate::unit::{UnitOutput, WorkUnit, WorkerError, generate_unit};

/// Runs decoded work units on a worker thread.
///
/// Implementations must be shareable across the pool. An `Err` (or a
/// panic) is not fatal: the coordinator generates the unit again in
/// process.
pub trait UnitExecutor: Send + Sync + 'static {
    fn execute(&self, unit: &WorkUnit) -> Result<UnitOutput, WorkerError>;
}

/// The default executor: schema generation.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeneratorExecutor;

impl UnitExecutor for GeneratorExecutor {
    fn execute(&self, unit: &WorkUnit) -> Result<UnitOutput, WorkerError> {
        Ok(generate_unit(unit))
    }
}
