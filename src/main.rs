use clap::{CommandFactory, FromArgMatches, Parser, Subcommand};
use geneforge::error::ForgeResult;
use std::process;
use tracing_subscriber::EnvFilter;

mod cmd;
mod reports;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(global = true, long, default_value_t = false)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Design, evaluate and iteratively optimize a circuit
    Optimize(cmd::optimize::OptimizeArgs),
    /// Apply a customization request to a constraint library
    Customize(cmd::customize::CustomizeArgs),
    /// Check a constraint library's structure and parts
    Validate(cmd::validate::ValidateArgs),
    /// Extract performance metrics from a synthesis output directory
    Metrics(cmd::metrics::MetricsArgs),
}

fn init_tracing(debug: bool) {
    let default = if debug { "geneforge=debug" } else { "geneforge=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() {
    // 1. Parse Raw Matches (to distinguish user input from defaults)
    let matches = Cli::command().get_matches();

    // 2. Construct CLI struct (populated with defaults)
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());

    init_tracing(cli.debug);
    println!("\n🚀 Initializing GeneForge...");

    // 3. Execute
    let outcome: ForgeResult<bool> = match cli.command {
        Commands::Optimize(args) => {
            cmd::optimize::run(args, matches.subcommand_matches("optimize"))
        }
        Commands::Customize(args) => cmd::customize::run(args),
        Commands::Validate(args) => cmd::validate::run(args),
        Commands::Metrics(args) => cmd::metrics::run(args),
    };

    match outcome {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("\n❌ FATAL ERROR:");
            eprintln!("   {}", e);
            process::exit(1);
        }
    }
}
