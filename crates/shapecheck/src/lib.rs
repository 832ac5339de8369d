//! shapecheck: compile type declarations into Zod runtime validators.
//!
//! The pipeline lives in the member crates; this crate ties them into a
//! [`Session`] and the `shapecheck` command line.
//!
//! - `shapecheck-ir`: type arena, validator combinators, rendering
//! - `shapecheck-resolver`: override rules and their priority order
//! - `shapecheck-gen`: the type-to-validator compiler
//! - `shapecheck-cache`: schema cache and file change tracking
//! - `shapecheck-batch`: worker pool coordination
//!
//! ```no_run
//! use shapecheck::Session;
//! use shapecheck_config::ShapecheckConfig;
//! use std::path::PathBuf;
//!
//! let mut session = Session::new(ShapecheckConfig::default());
//! let report = session.generate_paths(&[PathBuf::from("user.json")])?;
//! for module in &report.modules {
//!     println!("{}", module.text);
//! }
//! session.finish();
//! # Ok::<(), shapecheck::SessionError>(())
//! ```

pub mod commands;
pub mod session;

pub use session::{
    GenerateReport, ModuleOutput, Session, SessionError, SessionStats, SessionSummary,
};
