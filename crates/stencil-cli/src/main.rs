//! Stencil CLI - render and validate Kubernetes manifest templates

use clap::{ArgAction, Parser, Subcommand};
use miette::Result;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod display;
mod error;
mod exit_codes;

use commands::template::TemplateArgs;
use commands::validate::ValidateArgs;

/// Environment variable holding a tracing filter, e.g. `STENCIL_LOG=stencil_engine=trace`
const LOG_ENV: &str = "STENCIL_LOG";

#[derive(Parser)]
#[command(name = "stencil")]
#[command(version)]
#[command(about = "Render and validate Kubernetes manifest templates", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Render bundle templates locally
    Template(TemplateArgs),

    /// Create a new deployment bundle
    Create {
        /// Bundle name
        name: String,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// Lint a bundle: structure, values, schema and every template
    Lint {
        /// Bundle path
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Fail on undefined values even if the bundle disables strict mode
        #[arg(long)]
        strict: bool,

        /// Skip schema validation even if schema exists
        #[arg(long)]
        skip_schema: bool,
    },

    /// Validate values against schema
    Validate(ValidateArgs),
}

fn init_logging(debug: bool, verbose: u8) {
    let level = match (debug, verbose) {
        (true, _) | (_, 2) => "debug",
        (_, 0) => "warn",
        (_, 1) => "info",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(debug)
        .without_time()
        .init();
}

fn main() -> Result<()> {
    miette::set_panic_hook();

    let cli = Cli::parse();
    init_logging(cli.debug, cli.verbose);

    let result = match &cli.command {
        Commands::Template(args) => commands::template::run(args),
        Commands::Create { name, output } => commands::create::run(name, output),
        Commands::Lint {
            path,
            strict,
            skip_schema,
        } => commands::lint::run(path, *strict, *skip_schema),
        Commands::Validate(args) => commands::validate::run(args, cli.verbose > 0),
    };

    if let Err(err) = result {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }

    Ok(())
}
