pub mod collaborators;
pub mod compare;
pub mod history;
pub mod params;
pub mod targets;

use self::collaborators::{SequenceOptimizer, SequenceRequest, SynthesisEngine, SynthesisRequest};
use self::compare::compare;
use self::history::{
    History, IterationKind, OptimizationIteration, PartOptimization, RunReport, StopReason,
};
use self::targets::{select_targets, target_strength, Target};
use crate::config::{Config, OptimizerParams, PerformanceThresholds};
use crate::customize::{CustomizationRequest, Customizer, PartPatch};
use crate::error::{ForgeError, ForgeResult};
use crate::library::{LibraryDocument, LibraryIndex};
use crate::metrics::{self, outputs, PerformanceMetrics};
use rayon::prelude::*;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use strum::Display;
use tracing::{debug, error, info, warn};

pub use self::history::SUMMARY_FILE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ControllerState {
    Idle,
    DesigningInitial,
    Evaluating,
    SelectingTargets,
    OptimizingSequence,
    Rebuilding,
    Comparing,
    Done,
    Failed,
}

pub struct ControllerOptions {
    pub optimizer: OptimizerParams,
    pub thresholds: PerformanceThresholds,
    pub output_dir: PathBuf,
}

impl From<&Config> for ControllerOptions {
    fn from(cfg: &Config) -> Self {
        Self {
            optimizer: cfg.optimizer.clone(),
            thresholds: cfg.thresholds,
            output_dir: PathBuf::from(&cfg.optimizer.output_dir),
        }
    }
}

/// Receives every completed iteration. Returning `false` stops the loop
/// before the next iteration starts; calls in flight are never interrupted.
pub trait IterationObserver: Send + Sync {
    fn on_iteration(&self, iteration: &OptimizationIteration, best: &OptimizationIteration) -> bool;
}

/// Observer that never stops the loop.
pub struct Unobserved;

impl IterationObserver for Unobserved {
    fn on_iteration(&self, _: &OptimizationIteration, _: &OptimizationIteration) -> bool {
        true
    }
}

/// Shared cancellation switch, checked between iterations.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl IterationObserver for CancelFlag {
    fn on_iteration(&self, _: &OptimizationIteration, _: &OptimizationIteration) -> bool {
        !self.is_cancelled()
    }
}

pub fn initial_library_name() -> String {
    "library_iter_0.UCF.json".to_string()
}

pub fn optimized_library_name(iteration: usize) -> String {
    format!("optimized_library_iter_{}.UCF.json", iteration)
}

/// Outcome of optimizing one target.
enum Attempt {
    Optimized(PartOptimization),
    Skipped,
}

/// Drives the design, evaluate, optimize, rebuild and compare loop.
pub struct Controller {
    synthesis: Arc<dyn SynthesisEngine>,
    sequencer: Arc<dyn SequenceOptimizer>,
    options: ControllerOptions,
    state: ControllerState,
}

impl Controller {
    pub fn new(
        synthesis: Arc<dyn SynthesisEngine>,
        sequencer: Arc<dyn SequenceOptimizer>,
        options: ControllerOptions,
    ) -> Self {
        Self {
            synthesis,
            sequencer,
            options,
            state: ControllerState::Idle,
        }
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    fn enter(&mut self, state: ControllerState) {
        debug!("Controller: {} -> {}", self.state, state);
        self.state = state;
    }

    fn design(
        &self,
        circuit: &str,
        library: &LibraryDocument,
        library_path: PathBuf,
        iteration: usize,
    ) -> ForgeResult<(PathBuf, PathBuf, PerformanceMetrics)> {
        library.save(&library_path)?;
        let output_dir = self.options.output_dir.join(format!("iter_{}", iteration));
        let output = self.synthesis.synthesize(&SynthesisRequest {
            circuit,
            library_path: &library_path,
            output_dir: &output_dir,
        })?;
        let files = outputs::resolve(&output.raw_files, &output.output_path);
        let metrics = metrics::evaluate(&files, &self.options.thresholds);
        Ok((library_path, output.output_path, metrics))
    }

    /// Runs the loop. Returns `Err` only when the initial design could not be
    /// produced; every other stop is reported in the [`RunReport`]. The run
    /// summary is written to the output directory in both cases.
    pub fn run<O: IterationObserver>(
        &mut self,
        circuit: &str,
        library: &LibraryDocument,
        observer: &O,
    ) -> ForgeResult<RunReport> {
        let out_dir = self.options.output_dir.clone();
        let mut history = History::default();

        // 1. Initial Design
        self.enter(ControllerState::DesigningInitial);
        let initial = self.design(circuit, library, out_dir.join(initial_library_name()), 0);
        let (library_path, output_path, initial_metrics) = match initial {
            Ok(v) => v,
            Err(e) => {
                self.enter(ControllerState::Failed);
                error!("❌ Initial design failed: {}", e);
                let report = RunReport::from_history(&history, StopReason::Failed(e.to_string()));
                if let Err(write_err) = report.write_summary(&out_dir) {
                    warn!("⚠️  Could not write summary: {}", write_err);
                }
                return Err(e);
            }
        };

        self.enter(ControllerState::Evaluating);
        log_metrics(0, &initial_metrics);
        let first = history.push(OptimizationIteration {
            index: 0,
            kind: IterationKind::Initial,
            library_path,
            synthesis_output_path: output_path,
            metrics: initial_metrics,
            optimized_parts: Vec::new(),
            comparison: None,
        });
        history.mark_best(first);

        // 2. Optimization Loop
        let mut current = library.clone();
        let mut stop = StopReason::MaxIterations;
        let mut keep_going = match (history.latest(), history.best()) {
            (Some(latest), Some(best)) => observer.on_iteration(latest, best),
            _ => true,
        };

        for i in 1..=self.options.optimizer.max_iterations {
            if !keep_going {
                stop = StopReason::Cancelled;
                break;
            }

            let Some(latest_metrics) = history.latest().map(|it| it.metrics.clone()) else {
                break;
            };
            match self.iterate(i, circuit, &current, &latest_metrics) {
                Ok(Step::Stop(reason)) => {
                    stop = reason;
                    break;
                }
                Ok(Step::Continue { document, iteration }) => {
                    self.enter(ControllerState::Comparing);
                    let Some(best) = history.best() else { break };
                    let comparison = compare(&best.metrics, &iteration.metrics);
                    info!(
                        "⚖️  Iteration {}: {} improvements, {} regressions vs best",
                        i, comparison.improvements, comparison.regressions
                    );
                    let improved = comparison.improved;
                    let position = history.push(OptimizationIteration {
                        comparison: Some(comparison),
                        ..iteration
                    });
                    if improved {
                        info!("🏆 Iteration {} is the new best", i);
                        history.mark_best(position);
                    }
                    current = document;

                    if let (Some(latest), Some(best)) = (history.latest(), history.best()) {
                        keep_going = observer.on_iteration(latest, best);
                    }
                    if !improved && i >= self.options.optimizer.min_iterations_before_stop {
                        stop = StopReason::NoImprovement;
                        break;
                    }
                }
                Err(e) => {
                    error!("❌ Iteration {} failed: {}", i, e);
                    stop = StopReason::Failed(e.to_string());
                    break;
                }
            }
        }

        // 3. Report
        self.enter(ControllerState::Done);
        info!("🏁 Optimization finished: {}", stop);
        let report = RunReport::from_history(&history, stop);
        if let Err(e) = report.write_summary(&out_dir) {
            warn!("⚠️  Could not write summary: {}", e);
        }
        Ok(report)
    }

    fn iterate(
        &mut self,
        i: usize,
        circuit: &str,
        current: &LibraryDocument,
        metrics: &PerformanceMetrics,
    ) -> ForgeResult<Step> {
        let index = current.index();

        // A. Select Targets
        self.enter(ControllerState::SelectingTargets);
        let targets = select_targets(&index, metrics, &self.options.optimizer);
        if targets.is_empty() {
            info!("🎯 No parts to optimize");
            return Ok(Step::Stop(StopReason::NoTargets));
        }
        info!(
            "🎯 Iteration {}: optimizing {}",
            i,
            targets
                .iter()
                .map(|t| t.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        // B. Optimize Sequences (in parallel, merged by name)
        self.enter(ControllerState::OptimizingSequence);
        let attempts: Vec<ForgeResult<Attempt>> = targets
            .par_iter()
            .map(|t| self.optimize_target(i, t, &index, metrics))
            .collect();
        let mut optimized = Vec::new();
        for attempt in attempts {
            if let Attempt::Optimized(part) = attempt? {
                optimized.push(part);
            }
        }
        if optimized.is_empty() {
            warn!("⚠️  No parts were optimized in iteration {}", i);
            return Ok(Step::Stop(StopReason::NoPartsOptimized));
        }
        optimized.sort_by(|a, b| a.name.cmp(&b.name));

        // C. Rebuild Library
        self.enter(ControllerState::Rebuilding);
        let mut request = CustomizationRequest::default();
        for part in &optimized {
            let mut patch = PartPatch::new();
            patch.insert(
                "dnasequence".to_string(),
                Value::from(part.optimized_sequence.as_str()),
            );
            request.modified_parts.insert(part.name.clone(), patch);
            if let (Some(gate), Some(params)) = (&part.gate, &part.predicted_parameters) {
                request
                    .response_parameters
                    .insert(gate.clone(), params.clone());
            }
        }
        let customized =
            Customizer::new(self.options.optimizer.strict).customize(current, &request)?;
        for w in &customized.report.warnings {
            debug!("Rebuild: {}", w);
        }

        // D. Re-run Synthesis
        self.enter(ControllerState::DesigningInitial);
        let path = self.options.output_dir.join(optimized_library_name(i));
        let (library_path, output_path, new_metrics) =
            self.design(circuit, &customized.document, path, i)?;
        self.enter(ControllerState::Evaluating);
        log_metrics(i, &new_metrics);

        Ok(Step::Continue {
            document: customized.document,
            iteration: OptimizationIteration {
                index: i,
                kind: IterationKind::Optimization,
                library_path,
                synthesis_output_path: output_path,
                metrics: new_metrics,
                optimized_parts: optimized,
                comparison: None,
            },
        })
    }

    fn optimize_target(
        &self,
        i: usize,
        target: &Target,
        index: &LibraryIndex<'_>,
        metrics: &PerformanceMetrics,
    ) -> ForgeResult<Attempt> {
        let opts = &self.options.optimizer;
        let Some(sequence) = target.sequence.as_deref() else {
            warn!("⚠️  '{}' has no sequence; skipping", target.name);
            return Ok(Attempt::Skipped);
        };

        let strength = target_strength(metrics, target.output.as_deref(), opts);
        let original_strength = Some(params::predict_strength(sequence));
        let result = self.sequencer.optimize(&SequenceRequest {
            sequence: sequence.to_string(),
            target_strength: strength,
            iterations: opts.sequence_iterations,
        })?;
        if !result.success || result.optimized_sequence.is_empty() {
            warn!(
                "⚠️  Sequence optimization of '{}' failed: {}",
                target.name,
                result.error.as_deref().unwrap_or("no sequence returned")
            );
            return Ok(Attempt::Skipped);
        }

        let link = index
            .gate_link(&target.name)
            .filter(|l| targets::link_allowed(l.source, opts.allow_heuristic_links));
        let gate = link.map(|l| l.gate.clone());
        let original_parameters = gate.as_deref().and_then(|g| index.gate_parameters(g));
        let ratio = params::strength_ratio(original_strength, result.predicted_strength);
        let predicted_parameters = original_parameters
            .as_ref()
            .map(|p| params::scale_parameters(p, ratio));
        if gate.is_some() && original_parameters.is_none() {
            warn!("⚠️  No parameters for gate of '{}'", target.name);
        }

        let strength_change_pct = original_strength
            .filter(|o| *o != 0.0)
            .map(|o| (result.predicted_strength - o) / o * 100.0);
        debug!(
            "'{}': strength {:.3} -> {:.3}",
            target.name,
            original_strength.unwrap_or_default(),
            result.predicted_strength
        );

        Ok(Attempt::Optimized(PartOptimization {
            name: target.name.clone(),
            iteration: i,
            original_sequence: sequence.to_string(),
            optimized_sequence: result.optimized_sequence,
            target_strength: strength,
            original_strength,
            predicted_strength: result.predicted_strength,
            strength_change_pct,
            gate,
            link_source: link.map(|l| l.source),
            original_parameters,
            predicted_parameters,
        }))
    }
}

enum Step {
    Stop(StopReason),
    Continue {
        document: LibraryDocument,
        iteration: OptimizationIteration,
    },
}

fn log_metrics(iteration: usize, m: &PerformanceMetrics) {
    info!(
        "📊 Iteration {}: score {:.4}, avg ON/OFF {}, avg leakage {}",
        iteration,
        m.overall_score,
        m.average_on_off_ratio
            .map(|v| format!("{:.2}", v))
            .unwrap_or_else(|| "n/a".to_string()),
        m.average_leakage
            .map(|v| format!("{:.2}%", v))
            .unwrap_or_else(|| "n/a".to_string()),
    );
}

/// Reads a circuit description from disk for [`Controller::run`].
pub fn read_circuit<P: AsRef<Path>>(path: P) -> ForgeResult<String> {
    let path = path.as_ref();
    std::fs::read_to_string(path).map_err(|e| {
        ForgeError::Config(format!(
            "Could not read circuit description '{}': {}",
            path.display(),
            e
        ))
    })
}
