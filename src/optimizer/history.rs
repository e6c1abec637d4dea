use super::compare::Comparison;
use crate::error::ForgeResult;
use crate::library::{HillParameters, LinkSource};
use crate::metrics::PerformanceMetrics;
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use strum::Display;
use tracing::info;

pub const SUMMARY_FILE: &str = "optimization_summary.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum IterationKind {
    Initial,
    Optimization,
}

/// What happened to one part during an optimization iteration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartOptimization {
    pub name: String,
    pub iteration: usize,
    pub original_sequence: String,
    pub optimized_sequence: String,
    pub target_strength: f64,
    pub original_strength: Option<f64>,
    pub predicted_strength: f64,
    pub strength_change_pct: Option<f64>,
    pub gate: Option<String>,
    pub link_source: Option<LinkSource>,
    pub original_parameters: Option<HillParameters>,
    pub predicted_parameters: Option<HillParameters>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizationIteration {
    pub index: usize,
    pub kind: IterationKind,
    pub library_path: PathBuf,
    pub synthesis_output_path: PathBuf,
    pub metrics: PerformanceMetrics,
    pub optimized_parts: Vec<PartOptimization>,
    /// Vote against the best iteration at the time this one ran.
    pub comparison: Option<Comparison>,
}

/// Append-only record of a run. The best iteration is tracked by index.
#[derive(Debug, Clone, Default)]
pub struct History {
    iterations: Vec<OptimizationIteration>,
    best: Option<usize>,
}

impl History {
    pub fn push(&mut self, iteration: OptimizationIteration) -> usize {
        self.iterations.push(iteration);
        self.iterations.len() - 1
    }

    pub fn mark_best(&mut self, position: usize) {
        if position < self.iterations.len() {
            self.best = Some(position);
        }
    }

    pub fn iterations(&self) -> &[OptimizationIteration] {
        &self.iterations
    }

    pub fn best(&self) -> Option<&OptimizationIteration> {
        self.best.and_then(|i| self.iterations.get(i))
    }

    pub fn initial(&self) -> Option<&OptimizationIteration> {
        self.iterations.first()
    }

    pub fn latest(&self) -> Option<&OptimizationIteration> {
        self.iterations.last()
    }

    pub fn len(&self) -> usize {
        self.iterations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.iterations.is_empty()
    }
}

/// Why the loop ended. Only `Failed` before any design exists is an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    NoTargets,
    NoPartsOptimized,
    NoImprovement,
    MaxIterations,
    Cancelled,
    Failed(String),
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::NoTargets => write!(f, "no targets"),
            StopReason::NoPartsOptimized => write!(f, "no parts optimized"),
            StopReason::NoImprovement => write!(f, "no improvement"),
            StopReason::MaxIterations => write!(f, "max iterations"),
            StopReason::Cancelled => write!(f, "cancelled"),
            StopReason::Failed(msg) => write!(f, "failed: {}", msg),
        }
    }
}

impl Serialize for StopReason {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    /// A design was produced, whether or not targets were met.
    pub success: bool,
    pub stop_reason: StopReason,
    pub iterations: Vec<OptimizationIteration>,
    pub best_iteration: Option<usize>,
    pub initial_metrics: Option<PerformanceMetrics>,
    pub best_metrics: Option<PerformanceMetrics>,
    pub optimized_parts: Vec<PartOptimization>,
}

impl RunReport {
    pub fn from_history(history: &History, stop_reason: StopReason) -> Self {
        let best = history.best();
        Self {
            success: !history.is_empty(),
            stop_reason,
            iterations: history.iterations().to_vec(),
            best_iteration: best.map(|b| b.index),
            initial_metrics: history.initial().map(|i| i.metrics.clone()),
            best_metrics: best.map(|b| b.metrics.clone()),
            optimized_parts: history
                .iterations()
                .iter()
                .flat_map(|i| i.optimized_parts.iter().cloned())
                .collect(),
        }
    }

    pub fn best(&self) -> Option<&OptimizationIteration> {
        let index = self.best_iteration?;
        self.iterations.iter().find(|i| i.index == index)
    }

    /// Writes `optimization_summary.json` into `dir`.
    pub fn write_summary<P: AsRef<Path>>(&self, dir: P) -> ForgeResult<PathBuf> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let path = dir.join(SUMMARY_FILE);
        fs::write(&path, serde_json::to_string_pretty(self)?)?;
        info!("📝 Optimization summary saved to {}", path.display());
        Ok(path)
    }
}
