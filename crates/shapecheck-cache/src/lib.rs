//! Session caches for shapecheck.
//!
//! - [`SchemaCache`]: bounded LRU of generated schemas by stable type id.
//! - [`FileTracker`]: per-file digest and mtime records deciding whether
//!   a source needs generating at all, optionally persisted between runs.
//!
//! Both are plain values owned by the session's coordinating thread.

pub mod file_tracker;
pub mod schema_cache;

pub use file_tracker::{CacheIoError, ChangeReason, FileRecord, FileStatus, FileTracker};
pub use schema_cache::{CacheStats, SchemaCache};
