mod repl;

use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// log interpreter activity at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// run a file
    Run {
        #[arg(name = "FILE")]
        file: PathBuf,
    },
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        return;
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_level(true))
        .with(filter)
        .init();
}

fn run_file(file: PathBuf) -> Result<()> {
    let source = fs::read_to_string(&file)
        .with_context(|| format!("could not read {}", file.display()))?;

    let env = nutlang::Environment::new();
    let (result, errors) = nutlang::run(&source, &env);

    if errors.is_empty() {
        println!("{}", result);
        return Ok(());
    }

    for error in &errors {
        eprintln!("{}", error);
    }
    anyhow::bail!("{} failed with {} error(s)", file.display(), errors.len())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Some(Commands::Run { file }) => run_file(file),
        None => repl::start(),
    }
}
