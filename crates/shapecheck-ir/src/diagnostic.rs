//! Diagnostics collected during a session.
//!
//! Nothing in shapecheck aborts the host's run. Every failure degrades to
//! a local fallback and leaves one of these behind, alongside a log line.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which part of the pipeline produced the diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// An override rule was skipped (e.g. its pattern does not compile).
    Configuration,
    /// A type shape fell back to a permissive validator.
    Generation,
    /// A dispatched unit failed and was re-run in process.
    Worker,
    /// The persisted cache could not be read or written.
    CacheIo,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DiagnosticKind::Configuration => "configuration",
            DiagnosticKind::Generation => "generation",
            DiagnosticKind::Worker => "worker",
            DiagnosticKind::CacheIo => "cache-io",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticLevel {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub level: DiagnosticLevel,
    pub message: String,
    /// Declaration (and field path) the diagnostic is about.
    pub context: Option<String>,
}

impl Diagnostic {
    pub fn warning(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            level: DiagnosticLevel::Warning,
            message: message.into(),
            context: None,
        }
    }

    pub fn error(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Error,
            ..Self::warning(kind, message)
        }
    }

    pub fn in_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.level == DiagnosticLevel::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.level {
            DiagnosticLevel::Warning => "warning",
            DiagnosticLevel::Error => "error",
        };
        match &self.context {
            Some(context) => write!(f, "{}[{}] {}: {}", level, self.kind, context, self.message),
            None => write!(f, "{}[{}] {}", level, self.kind, self.message),
        }
    }
}
