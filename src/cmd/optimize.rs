use crate::reports;
use clap::{ArgMatches, Args};
use geneforge::config::Config;
use geneforge::error::ForgeResult;
use geneforge::library::LibraryDocument;
use geneforge::optimizer::collaborators::{CommandSequenceOptimizer, CommandSynthesis};
use geneforge::optimizer::history::OptimizationIteration;
use geneforge::optimizer::{read_circuit, Controller, ControllerOptions, IterationObserver};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug, Clone)]
pub struct OptimizeArgs {
    #[command(flatten)]
    pub config: Config,

    /// Constraint library (JSON array of collection records)
    #[arg(short, long)]
    pub library: PathBuf,

    /// Circuit description handed to the synthesis tool
    #[arg(short = 'i', long)]
    pub circuit: PathBuf,

    /// JSON config file; flags typed on the command line override it
    #[arg(long = "config")]
    pub config_file: Option<PathBuf>,
}

struct ConsoleObserver;

impl IterationObserver for ConsoleObserver {
    fn on_iteration(&self, iteration: &OptimizationIteration, best: &OptimizationIteration) -> bool {
        reports::print_iteration(iteration, best.index);
        true
    }
}

/// Returns `Ok(false)` when not even the initial design could be produced.
pub fn run(args: OptimizeArgs, matches: Option<&ArgMatches>) -> ForgeResult<bool> {
    let config = match (&args.config_file, matches) {
        (Some(path), Some(m)) => {
            let mut file_config = Config::load_from_file(path)?;
            file_config.merge_from_cli(&args.config, m);
            file_config
        }
        (Some(path), None) => Config::load_from_file(path)?,
        (None, _) => args.config.clone(),
    };
    config.check()?;

    let library = LibraryDocument::load(&args.library)?;
    let circuit = read_circuit(&args.circuit)?;

    println!(
        "\n🧬 Optimizing {} with up to {} iterations",
        args.circuit.display(),
        config.optimizer.max_iterations
    );

    let synthesis = Arc::new(CommandSynthesis::new(config.collaborators.clone()));
    let sequencer = Arc::new(CommandSequenceOptimizer::new(&config.collaborators));
    let mut controller = Controller::new(synthesis, sequencer, ControllerOptions::from(&config));

    match controller.run(&circuit, &library, &ConsoleObserver) {
        Ok(report) => {
            reports::print_run_report(&report);
            Ok(true)
        }
        Err(e) => {
            eprintln!("\n❌ No design produced: {}", e);
            Ok(false)
        }
    }
}
