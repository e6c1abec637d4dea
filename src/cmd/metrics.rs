use crate::reports;
use clap::Args;
use geneforge::config::PerformanceThresholds;
use geneforge::error::ForgeResult;
use geneforge::metrics::{self, outputs};
use std::path::PathBuf;
use tracing::warn;

#[derive(Args, Debug, Clone)]
pub struct MetricsArgs {
    #[command(flatten)]
    pub thresholds: PerformanceThresholds,

    /// Synthesis output directory
    pub dir: PathBuf,

    /// Print metrics as JSON instead of a table
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

pub fn run(args: MetricsArgs) -> ForgeResult<bool> {
    let files = outputs::discover(&args.dir);
    if files.is_empty() {
        warn!("⚠️  No synthesis tables found under {}", args.dir.display());
    }
    let metrics = metrics::evaluate(&files, &args.thresholds);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&metrics)?);
    } else {
        reports::print_metrics(&metrics);
    }
    Ok(true)
}
