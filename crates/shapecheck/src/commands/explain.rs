//! `shapecheck explain`: which override rule applies to a field.

use crate::Session;
use clap::Args;
use std::path::Path;

#[derive(Args, Debug)]
pub struct ExplainArgs {
    /// Field name
    pub field: String,

    /// Enclosing declaration name
    #[arg(short, long)]
    pub context: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run_explain(args: &ExplainArgs, config: Option<&Path>) -> anyhow::Result<u8> {
    let session = Session::new(super::load_config(config)?);
    let explanation = session.explain(&args.field, args.context.as_deref());
    if args.json {
        println!("{}", serde_json::to_string_pretty(&explanation)?);
    } else {
        println!("{explanation}");
    }
    Ok(0)
}
