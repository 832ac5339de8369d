//! `shapecheck check-config`: load the config and report bad rules.

use clap::Args;
use shapecheck_resolver::{RuleSet, RuleSpec};
use std::path::Path;

#[derive(Args, Debug)]
pub struct CheckConfigArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Exits 1 when any rule is unusable.
pub fn run_check_config(args: &CheckConfigArgs, config: Option<&Path>) -> anyhow::Result<u8> {
    let config = super::load_config(config)?;
    // rebuild rather than compile: diagnostics are printed below
    let rules = RuleSet::rebuild(RuleSpec::from_config(&config.overrides));
    let diagnostics = rules.diagnostics();

    if args.json {
        let report = serde_json::json!({
            "rules": rules.len(),
            "diagnostics": diagnostics,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{} rule(s)", rules.len());
        for diagnostic in diagnostics {
            println!("{diagnostic}");
        }
    }
    Ok(if diagnostics.is_empty() { 0 } else { 1 })
}
