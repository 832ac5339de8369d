//! `shapecheck generate`: declaration documents in, schema modules out.

use crate::Session;
use anyhow::Context;
use clap::Args;
use std::path::{Path, PathBuf};

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Declaration documents (JSON)
    #[arg(required = true)]
    pub documents: Vec<PathBuf>,

    /// Directory to write modules into (stdout if not specified)
    #[arg(short, long)]
    pub out_dir: Option<PathBuf>,

    /// Print the summary as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run_generate(args: &GenerateArgs, config: Option<&Path>) -> anyhow::Result<u8> {
    let config = super::load_config(config)?;
    let strict = config.strict;
    let mut session = Session::new(config);

    let report = session.generate_paths(&args.documents)?;
    for module in &report.modules {
        match &args.out_dir {
            Some(dir) => {
                let target = dir.join(&module.path);
                if let Some(parent) = target.parent() {
                    std::fs::create_dir_all(parent)
                        .with_context(|| format!("creating {}", parent.display()))?;
                }
                std::fs::write(&target, &module.text)
                    .with_context(|| format!("writing {}", target.display()))?;
                tracing::info!(path = %target.display(), "wrote module");
            }
            None => print!("{}", module.text),
        }
        for diagnostic in module.diagnostics() {
            eprintln!("{diagnostic}");
        }
    }
    for diagnostic in session.diagnostics() {
        eprintln!("{diagnostic}");
    }

    let summary = session.finish();
    if args.json {
        eprintln!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        let stats = summary.stats;
        eprintln!(
            "{} module(s), {} declaration(s), {} skipped, {} fallback(s)",
            stats.modules,
            stats.generator.declarations_generated + stats.cache_hits,
            stats.documents_skipped,
            stats.generator.fallbacks
        );
    }

    Ok(if strict && report.has_errors() { 1 } else { 0 })
}
