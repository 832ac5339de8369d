//! Parallel schema generation for shapecheck.
//!
//! Declarations are split into [`WorkUnit`]s that carry everything a
//! worker needs: the reachable slice of the type arena, the rule
//! specification, and generation options. The [`BatchCoordinator`] sends
//! encoded units to a `rayon` pool and merges results into the session's
//! schema cache.
//!
//! ```text
//! coordinator thread                  worker threads
//! ──────────────────                  ──────────────
//! plan ─> WorkUnit ─bincode─> spawn ─> decode ─> UnitExecutor
//!                                                   │
//! wait <─ merge <─────── mpsc <── WorkResult{task_id, outcome}
//!   └─ on error, panic or timeout: generate_unit in process
//! ```
//!
//! Parallel output is identical to synchronous output: both run the
//! same generator over the same reachable declarations.

pub mod coordinator;
pub mod executor;
pub mod unit;

pub use coordinator::{
    BatchCoordinator, BatchError, CoordinatorConfig, CoordinatorStats, ShutdownReport, TaskHandle,
};
pub use executor::{GeneratorExecutor, UnitExecutor};
pub use unit::{TaskId, UnitOutput, WorkResult, WorkUnit, WorkerError, generate_unit};
