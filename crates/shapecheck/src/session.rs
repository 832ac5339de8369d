//! One compilation session: configuration, rules, caches and workers.
//!
//! A [`Session`] is built once from a [`ShapecheckConfig`] and owns every
//! piece of mutable state the pipeline needs. Nothing is process-global;
//! two sessions never see each other's caches.

use serde::Serialize;
use shapecheck_batch::{BatchCoordinator, CoordinatorConfig, ShutdownReport};
use shapecheck_cache::{FileRecord, FileTracker, SchemaCache};
use shapecheck_config::ShapecheckConfig;
use shapecheck_gen::{
    GenerateOptions, GeneratorStats, SchemaGenerator, emit_module, module_path, select_declarations,
};
use shapecheck_ir::{
    DeclarationDocument, Diagnostic, DocumentError, GeneratedSchema, LowerError, TypeArena, TypeId,
    lower_documents,
};
use shapecheck_resolver::{Explanation, RuleSet, explain};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error(transparent)]
    Lower(#[from] LowerError),
}

/// Generated module for one source file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleOutput {
    /// Source file the declarations came from.
    pub file: String,
    /// Where the module should be written, e.g. `src/user.schema.ts`.
    pub path: String,
    pub text: String,
    pub schemas: Vec<GeneratedSchema>,
}

impl ModuleOutput {
    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.schemas.iter().flat_map(|s| s.diagnostics.iter())
    }

    pub fn schema(&self, name: &str) -> Option<&GeneratedSchema> {
        self.schemas.iter().find(|s| s.name == name)
    }
}

/// Result of [`Session::generate_paths`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GenerateReport {
    pub modules: Vec<ModuleOutput>,
    /// Inputs the file tracker reported unchanged.
    pub skipped: Vec<PathBuf>,
}

impl GenerateReport {
    pub fn has_errors(&self) -> bool {
        self.modules
            .iter()
            .any(|m| m.diagnostics().any(Diagnostic::is_error))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub documents: u64,
    pub documents_skipped: u64,
    pub modules: u64,
    /// Declarations served from the schema cache.
    pub cache_hits: u64,
    pub cache_misses: u64,
    /// Misses handed to the worker pool.
    pub parallel_declarations: u64,
    pub generator: GeneratorStats,
}

/// Returned by [`Session::finish`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub stats: SessionStats,
    /// Whether file records were persisted; `None` without a store.
    pub saved: Option<bool>,
    pub shutdown: Option<ShutdownReport>,
}

pub struct Session {
    config: ShapecheckConfig,
    options: GenerateOptions,
    rules: RuleSet,
    cache: SchemaCache,
    tracker: FileTracker,
    coordinator: Option<BatchCoordinator>,
    stats: SessionStats,
}

impl Session {
    pub fn new(config: ShapecheckConfig) -> Self {
        let options = GenerateOptions {
            strict: config.strict,
            export_only: config.export_only,
            ..GenerateOptions::default()
        };
        let rules = RuleSet::compile(&config.overrides);
        let cache = SchemaCache::new(if config.cache.enabled {
            config.cache.max_size
        } else {
            0
        });
        let tracker = match &config.incremental.cache_path {
            Some(path) if config.incremental.enabled => FileTracker::open(path.clone()),
            _ => FileTracker::in_memory(),
        };
        let coordinator = config
            .parallel
            .enabled
            .then(|| BatchCoordinator::new(CoordinatorConfig::from(&config.parallel)));
        tracing::debug!(
            rules = rules.len(),
            parallel = coordinator.is_some(),
            incremental = config.incremental.enabled,
            "session started"
        );
        Self {
            config,
            options,
            rules,
            cache,
            tracker,
            coordinator,
            stats: SessionStats::default(),
        }
    }

    pub fn config(&self) -> &ShapecheckConfig {
        &self.config
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn cache(&self) -> &SchemaCache {
        &self.cache
    }

    pub fn tracker(&self) -> &FileTracker {
        &self.tracker
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Which rule a field resolves to, and every candidate considered.
    pub fn explain(&self, field: &str, context: Option<&str>) -> Explanation {
        explain(&self.rules, field, context)
    }

    /// Configuration, cache and worker diagnostics collected so far.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        let mut out: Vec<Diagnostic> = self.rules.diagnostics().to_vec();
        out.extend(self.tracker.diagnostics().iter().cloned());
        if let Some(coordinator) = &self.coordinator {
            out.extend(coordinator.diagnostics().iter().cloned());
        }
        out
    }

    /// Generate modules for every file of `documents`.
    pub fn generate(
        &mut self,
        documents: &[DeclarationDocument],
    ) -> Result<Vec<ModuleOutput>, SessionError> {
        let files: HashSet<&str> = documents.iter().map(|d| d.file.as_str()).collect();
        self.generate_files(documents, &files)
    }

    /// Load declaration documents from disk and generate the changed ones.
    ///
    /// Every document is loaded so references across files resolve, but
    /// in incremental mode only documents the file tracker reports as
    /// changed are generated. File records are only updated once the call
    /// succeeds, so after an error every changed file is still changed.
    pub fn generate_paths(&mut self, paths: &[PathBuf]) -> Result<GenerateReport, SessionError> {
        let mut documents = Vec::with_capacity(paths.len());
        let mut changed: HashSet<String> = HashSet::new();
        let mut skipped = Vec::new();
        let mut observed = Vec::new();
        for path in paths {
            let document = DeclarationDocument::from_path(path)?;
            if self.needs_generating(path, &mut observed) {
                changed.insert(document.file.clone());
            } else {
                tracing::debug!(path = %path.display(), "unchanged, skipping");
                skipped.push(path.clone());
            }
            documents.push(document);
        }

        let files: HashSet<&str> = changed.iter().map(String::as_str).collect();
        let modules = self.generate_files(&documents, &files)?;
        for record in observed {
            self.tracker.commit(record);
        }
        self.stats.documents_skipped += skipped.len() as u64;
        Ok(GenerateReport { modules, skipped })
    }

    /// Persist file records and stop the worker pool.
    pub fn finish(mut self) -> SessionSummary {
        let saved = self
            .tracker
            .store_path()
            .is_some()
            .then(|| self.tracker.try_save());
        let shutdown = self
            .coordinator
            .as_mut()
            .map(|coordinator| coordinator.shutdown(&mut self.cache));
        tracing::info!(
            modules = self.stats.modules,
            skipped = self.stats.documents_skipped,
            cache_hits = self.stats.cache_hits,
            fallbacks = self.stats.generator.fallbacks,
            "session finished"
        );
        SessionSummary {
            stats: self.stats,
            saved,
            shutdown,
        }
    }

    /// Whether `path` has to be generated. The record to commit for a
    /// changed path is pushed onto `observed`.
    fn needs_generating(&self, path: &Path, observed: &mut Vec<FileRecord>) -> bool {
        if !self.config.incremental.enabled {
            return true;
        }
        let (status, record) = self.tracker.observe(path);
        observed.extend(record);
        status.is_changed()
    }

    fn generate_files(
        &mut self,
        documents: &[DeclarationDocument],
        files: &HashSet<&str>,
    ) -> Result<Vec<ModuleOutput>, SessionError> {
        if !self.config.enabled {
            tracing::info!("generation disabled by configuration");
            return Ok(Vec::new());
        }
        let arena = lower_documents(documents)?;
        self.stats.documents += documents.len() as u64;

        let ids: Vec<TypeId> = select_declarations(&arena, self.options.export_only)
            .into_iter()
            .filter(|id| {
                arena
                    .declaration(*id)
                    .is_some_and(|d| files.contains(d.file.as_str()))
            })
            .collect();
        let mut schemas = self.generate_ids(&arena, &ids);

        let render = self.options.render_options();
        let mut modules = Vec::new();
        for document in documents {
            if !files.contains(document.file.as_str()) {
                continue;
            }
            let (own, rest): (Vec<GeneratedSchema>, Vec<GeneratedSchema>) =
                schemas.into_iter().partition(|s| s.file == document.file);
            schemas = rest;
            if own.is_empty() {
                continue;
            }
            modules.push(ModuleOutput {
                file: document.file.clone(),
                path: module_path(&document.file),
                text: emit_module(&document.file, &own, &arena, &render),
                schemas: own,
            });
        }
        self.stats.modules += modules.len() as u64;
        Ok(modules)
    }

    /// Schemas for `ids` in the same order, from the cache where possible.
    ///
    /// A cached schema is only reused while its fingerprint matches the
    /// arena, so edits to anything it was generated from regenerate it.
    fn generate_ids(&mut self, arena: &TypeArena, ids: &[TypeId]) -> Vec<GeneratedSchema> {
        let parallel = self.coordinator.as_ref().is_some_and(|coordinator| {
            let misses = ids
                .iter()
                .filter(|id| !self.cache.is_current(**id, arena.fingerprint(**id)))
                .count();
            misses > coordinator.config().batch_size
        });
        if parallel {
            self.generate_parallel(arena, ids)
        } else {
            self.generate_in_process(arena, ids)
        }
    }

    fn generate_in_process(&mut self, arena: &TypeArena, ids: &[TypeId]) -> Vec<GeneratedSchema> {
        let mut generator = SchemaGenerator::new(arena, &self.rules, self.options.clone());
        let mut out = Vec::with_capacity(ids.len());
        for &id in ids {
            match generator.generate_cached(id, &mut self.cache) {
                Ok(schema) => out.push(schema),
                Err(err) => tracing::warn!("{err}"),
            }
        }
        let stats = generator.stats();
        self.stats.cache_hits += stats.cache_hits;
        self.stats.cache_misses += stats.cache_misses;
        self.stats.generator += stats;
        out
    }

    fn generate_parallel(&mut self, arena: &TypeArena, ids: &[TypeId]) -> Vec<GeneratedSchema> {
        let mut done: HashMap<TypeId, GeneratedSchema> = HashMap::with_capacity(ids.len());
        let mut misses = Vec::new();
        for &id in ids {
            match self.cache.get_current(id, arena.fingerprint(id)) {
                Some(schema) => {
                    done.insert(id, schema.clone());
                }
                None => misses.push(id),
            }
        }
        self.stats.cache_hits += (ids.len() - misses.len()) as u64;
        self.stats.cache_misses += misses.len() as u64;
        self.stats.parallel_declarations += misses.len() as u64;

        if let Some(coordinator) = self.coordinator.as_mut() {
            let units = coordinator.plan(arena, &misses, &self.rules, &self.options);
            for result in coordinator.run(units, &mut self.cache) {
                match result {
                    Ok(output) => {
                        self.stats.generator += output.stats;
                        done.extend(output.schemas.into_iter().map(|s| (s.id, s)));
                    }
                    Err(err) => tracing::warn!("{err}"),
                }
            }
        }

        ids.iter().filter_map(|id| done.remove(id)).collect()
    }
}
