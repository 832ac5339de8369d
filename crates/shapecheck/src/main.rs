//! `shapecheck` command line.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use shapecheck::commands::check_config::{CheckConfigArgs, run_check_config};
use shapecheck::commands::explain::{ExplainArgs, run_explain};
use shapecheck::commands::generate::{GenerateArgs, run_generate};

/// Compile type declarations into Zod runtime validators.
#[derive(Parser, Debug)]
#[command(name = "shapecheck", version, about, long_about = None)]
struct Cli {
    /// Verbose logging. Repeat for more (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Config file (shapecheck.toml or shapecheck.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate schema modules from declaration documents
    Generate(GenerateArgs),

    /// Show which override rule a field resolves to
    Explain(ExplainArgs),

    /// Validate the override tables
    #[command(name = "check-config")]
    CheckConfig(CheckConfigArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // SHAPECHECK_LOG wins over -v
    let filter = EnvFilter::try_from_env("SHAPECHECK_LOG").unwrap_or_else(|_| {
        EnvFilter::new(match cli.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = cli.config.as_deref();
    let result = match &cli.command {
        Commands::Generate(args) => run_generate(args, config),
        Commands::Explain(args) => run_explain(args, config),
        Commands::CheckConfig(args) => run_check_config(args, config),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_generate() {
        let cli = Cli::try_parse_from([
            "shapecheck",
            "generate",
            "a.json",
            "b.json",
            "--out-dir",
            "out",
            "--config",
            "shapecheck.toml",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("shapecheck.toml")));
        let Commands::Generate(args) = cli.command else {
            panic!("expected generate");
        };
        assert_eq!(args.documents.len(), 2);
        assert_eq!(args.out_dir, Some(PathBuf::from("out")));
    }

    #[test]
    fn test_parse_explain() {
        let cli = Cli::try_parse_from(["shapecheck", "-vv", "explain", "email", "-c", "User"]).unwrap();
        assert_eq!(cli.verbose, 2);
        let Commands::Explain(args) = cli.command else {
            panic!("expected explain");
        };
        assert_eq!(args.field, "email");
        assert_eq!(args.context.as_deref(), Some("User"));
    }

    #[test]
    fn test_generate_requires_documents() {
        assert!(Cli::try_parse_from(["shapecheck", "generate"]).is_err());
    }

    #[test]
    fn test_parse_check_config() {
        let cli = Cli::try_parse_from(["shapecheck", "check-config", "--json"]).unwrap();
        assert!(matches!(cli.command, Commands::CheckConfig(CheckConfigArgs { json: true })));
    }
}
