use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use conflux::{export_symbols, ProgramSummary};
use conflux_checker::{SymbolImporter, TypeError};
use conflux_loader::{Config, Program, FROM_ARGS_USAGE};

#[derive(Parser)]
#[command(name = "conflux")]
#[command(about = "Load and type check whole conflux programs", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the initial packages and everything they import
    #[command(after_help = FROM_ARGS_USAGE)]
    Check {
        #[command(flatten)]
        load: LoadArgs,

        /// Print a JSON summary of the loaded program
        #[arg(long)]
        json: bool,
    },

    /// Print every loaded package, dependencies first
    #[command(after_help = FROM_ARGS_USAGE)]
    Order {
        #[command(flatten)]
        load: LoadArgs,
    },

    /// Write symbol data for every package loaded from source
    #[command(after_help = FROM_ARGS_USAGE)]
    Export {
        #[command(flatten)]
        load: LoadArgs,

        /// Output directory for symbol files
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[derive(Args)]
struct LoadArgs {
    /// Directory holding package sources, one directory per import path
    #[arg(short, long, env = "CONFLUX_ROOT", default_value = ".")]
    root: PathBuf,

    /// Directory holding symbol files; defaults to the source root
    #[arg(short, long, env = "CONFLUX_SYMBOLS")]
    symbols: Option<PathBuf>,

    /// Load every dependency from source instead of symbol data
    #[arg(long)]
    source_imports: bool,

    /// Import paths whose function bodies are not type checked
    #[arg(long, value_delimiter = ',')]
    skip_bodies: Vec<String>,

    /// Initial packages: import paths or comma-separated file lists
    #[arg(required = true)]
    args: Vec<String>,
}

impl LoadArgs {
    fn load(self) -> Result<Program> {
        let mut conf = Config::new(&self.root)
            .with_source_imports(self.source_imports)
            .with_error_sink(Arc::new(|err: &TypeError| eprintln!("{}", err)));
        if let Some(symbols) = &self.symbols {
            conf = conf.with_binary_importer(Arc::new(SymbolImporter::new(symbols)));
        }
        if !self.skip_bodies.is_empty() {
            let skipped = self.skip_bodies;
            conf = conf.with_func_body_filter(move |path| !skipped.iter().any(|p| p == path));
        }

        let rest = conf
            .from_args(&self.args)
            .context("Failed to read initial packages")?;
        if !rest.is_empty() {
            debug!("ignoring arguments after '--': {:?}", rest);
        }

        conf.load()
            .with_context(|| format!("Failed to load program from {}", self.root.display()))
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.debug {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(cli.debug)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Check { load, json } => {
            let program = load.load()?;
            let summary = ProgramSummary::new(&program);
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                for pkg in &summary.initial {
                    println!("ok {} ({} files)", pkg.path, pkg.files.len());
                }
                info!("{} packages loaded", summary.packages.len());
            }
        }
        Commands::Order { load } => {
            let program = load.load()?;
            for info in program.dependency_order() {
                println!("{}", info.path());
            }
        }
        Commands::Export { load, output } => {
            let program = load.load()?;
            let written = export_symbols(&program, &output)?;
            println!("exported {} packages to {}", written.len(), output.display());
        }
    }
    Ok(())
}
