//! Subcommands of the `shapecheck` binary.
//!
//! Each command returns the process exit code; errors bubble up to
//! `main` as `anyhow::Error`.

pub mod check_config;
pub mod explain;
pub mod generate;

use anyhow::Context;
use shapecheck_config::ShapecheckConfig;
use std::path::Path;

/// Load `path`, or discover a config file in the current directory.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<ShapecheckConfig> {
    match path {
        Some(path) => ShapecheckConfig::load(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => {
            let cwd = std::env::current_dir().context("reading current directory")?;
            ShapecheckConfig::discover(&cwd).context("discovering config")
        }
    }
}
