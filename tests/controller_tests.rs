mod common;

use common::{
    sibling_library, BrokenOptimizer, EchoOptimizer, MissingSynthesis, RefusingOptimizer,
    ScriptedSynthesis, PAMTR_SEQ,
};
use geneforge::config::{Config, PerformanceThresholds};
use geneforge::library::{LibraryDocument, LinkSource};
use geneforge::metrics::PerformanceMetrics;
use geneforge::error::ForgeError;
use geneforge::optimizer::collaborators::{run_with_timeout, SequenceOptimizer};
use geneforge::optimizer::history::{IterationKind, StopReason};
use geneforge::optimizer::targets::{select_targets, target_strength, TargetReason};
use geneforge::optimizer::{
    CancelFlag, Controller, ControllerOptions, ControllerState, Unobserved, SUMMARY_FILE,
};
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::tempdir;

const CIRCUIT: &str = "module and_circuit(input a, b, output y); assign y = a & b; endmodule";

type Script = Vec<(f64, [f64; 2], [f64; 2])>;

fn options(dir: &Path, primary: &str) -> ControllerOptions {
    let mut config = Config::default();
    config.optimizer.primary_target = primary.to_string();
    config.optimizer.output_dir = dir.to_string_lossy().to_string();
    ControllerOptions::from(&config)
}

fn controller<S: SequenceOptimizer + 'static>(
    script: Script,
    sequencer: S,
    options: ControllerOptions,
) -> (Controller, Arc<ScriptedSynthesis>) {
    let synthesis = Arc::new(ScriptedSynthesis::new(script));
    let c = Controller::new(synthesis.clone(), Arc::new(sequencer), options);
    (c, synthesis)
}

#[test]
fn test_no_targets_stops_after_initial_design() {
    let dir = tempdir().unwrap();
    let mut opts = options(dir.path(), "");
    opts.thresholds = PerformanceThresholds {
        min_on_off_ratio: 5.0,
        max_leakage_pct: 20.0,
    };
    let script = vec![(3.0, [10.0, 10.0], [1.0, 1.0])];
    let (mut c, synthesis) = controller(script, EchoOptimizer { strength: 0.8 }, opts);

    let report = c.run(CIRCUIT, &sibling_library(), &Unobserved).unwrap();
    assert!(report.success);
    assert_eq!(report.stop_reason, StopReason::NoTargets);
    assert_eq!(report.stop_reason.to_string(), "no targets");
    assert_eq!(report.best_iteration, Some(0));
    assert_eq!(report.iterations.len(), 1);
    assert_eq!(report.iterations[0].kind, IterationKind::Initial);
    assert_eq!(synthesis.calls(), 1);
    assert_eq!(c.state(), ControllerState::Done);
}

#[test]
fn test_stops_after_three_non_improving_iterations() {
    let dir = tempdir().unwrap();
    let opts = options(dir.path(), "pAmtR");
    assert_eq!(opts.optimizer.max_iterations, 5);
    let script = vec![
        (3.0, [10.0, 10.0], [1.0, 1.0]),
        (2.0, [5.0, 5.0], [1.0, 1.0]),
    ];
    let (mut c, synthesis) = controller(script, EchoOptimizer { strength: 0.9 }, opts);

    let report = c.run(CIRCUIT, &sibling_library(), &Unobserved).unwrap();
    assert_eq!(report.stop_reason, StopReason::NoImprovement);
    assert_eq!(report.iterations.len(), 4);
    assert_eq!(report.iterations.last().unwrap().index, 3);
    assert_eq!(report.best_iteration, Some(0));
    assert_eq!(synthesis.calls(), 4);
    for it in &report.iterations[1..] {
        assert!(!it.comparison.as_ref().unwrap().improved);
    }
}

#[test]
fn test_improvement_becomes_best_and_builds_on_latest_library() {
    let dir = tempdir().unwrap();
    let opts = options(dir.path(), "pAmtR");
    let script = vec![
        (3.0, [10.0, 10.0], [1.0, 1.0]),
        (4.0, [20.0, 20.0], [1.0, 1.0]),
    ];
    let (mut c, synthesis) = controller(script, EchoOptimizer { strength: 0.9 }, opts);

    let report = c.run(CIRCUIT, &sibling_library(), &Unobserved).unwrap();
    assert_eq!(report.best_iteration, Some(1));
    assert_eq!(report.stop_reason, StopReason::NoImprovement);
    assert_eq!(report.initial_metrics.as_ref().unwrap().overall_score, 3.0);
    assert_eq!(report.best_metrics.as_ref().unwrap().overall_score, 4.0);

    let part = &report.iterations[1].optimized_parts[0];
    assert_eq!(part.name, "pAmtR");
    assert_eq!(part.original_sequence, PAMTR_SEQ);
    assert!(part.optimized_sequence.starts_with('G'));
    assert_eq!(part.gate.as_deref(), Some("A1_AmtR"));
    assert_eq!(part.link_source, Some(LinkSource::Structure));
    assert!(part.predicted_parameters.is_some());

    // The library sent to synthesis in iteration 1 carries the new sequence
    // and the rescaled model parameters
    let libraries = synthesis.libraries.lock().unwrap();
    let idx = libraries[1].index();
    assert_eq!(
        idx.part("pAmtR").unwrap()["dnasequence"].as_str(),
        Some(part.optimized_sequence.as_str())
    );
    let written = idx.gate_parameters("A1_AmtR").unwrap()["ymax"];
    let predicted = part.predicted_parameters.as_ref().unwrap()["ymax"];
    assert!((written - predicted).abs() < 1e-9);
    assert!((written - 3.8).abs() > 1e-9);

    // Later iterations start from the latest library, not the original
    let second = &report.iterations[2].optimized_parts[0];
    assert_eq!(second.original_sequence, part.optimized_sequence);
}

#[test]
fn test_max_iterations_bound() {
    let dir = tempdir().unwrap();
    let mut opts = options(dir.path(), "pAmtR");
    opts.optimizer.max_iterations = 2;
    let script = vec![
        (3.0, [10.0, 10.0], [1.0, 1.0]),
        (4.0, [20.0, 20.0], [1.0, 1.0]),
        (5.0, [40.0, 40.0], [1.0, 1.0]),
    ];
    let (mut c, _) = controller(script, EchoOptimizer { strength: 0.9 }, opts);

    let report = c.run(CIRCUIT, &sibling_library(), &Unobserved).unwrap();
    assert_eq!(report.stop_reason, StopReason::MaxIterations);
    assert_eq!(report.iterations.len(), 3);
    assert_eq!(report.best_iteration, Some(2));
    assert_eq!(report.optimized_parts.len(), 2);
}

#[test]
fn test_soft_optimizer_failure_ends_with_no_parts_optimized() {
    let dir = tempdir().unwrap();
    let opts = options(dir.path(), "pAmtR");
    let script = vec![(3.0, [10.0, 10.0], [1.0, 1.0])];
    let (mut c, synthesis) = controller(script, RefusingOptimizer, opts);

    let report = c.run(CIRCUIT, &sibling_library(), &Unobserved).unwrap();
    assert_eq!(report.stop_reason, StopReason::NoPartsOptimized);
    assert_eq!(report.best_iteration, Some(0));
    assert_eq!(synthesis.calls(), 1);
}

#[test]
fn test_cancel_flag_stops_before_next_iteration() {
    let dir = tempdir().unwrap();
    let opts = options(dir.path(), "pAmtR");
    let script = vec![(3.0, [10.0, 10.0], [1.0, 1.0])];
    let (mut c, synthesis) = controller(script, EchoOptimizer { strength: 0.9 }, opts);

    let flag = CancelFlag::new();
    flag.cancel();
    let report = c.run(CIRCUIT, &sibling_library(), &flag).unwrap();
    assert_eq!(report.stop_reason, StopReason::Cancelled);
    assert_eq!(synthesis.calls(), 1);
}

#[test]
fn test_initial_failure_is_an_error_with_summary() {
    let dir = tempdir().unwrap();
    let mut c = Controller::new(
        Arc::new(MissingSynthesis),
        Arc::new(EchoOptimizer { strength: 0.5 }),
        options(dir.path(), ""),
    );

    let err = c.run(CIRCUIT, &sibling_library(), &Unobserved).unwrap_err();
    assert!(err.is_collaborator());
    assert_eq!(c.state(), ControllerState::Failed);

    let summary: Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join(SUMMARY_FILE)).unwrap()).unwrap();
    assert_eq!(summary["success"], false);
    assert!(summary["stop_reason"].as_str().unwrap().starts_with("failed"));
}

#[test]
fn test_summary_and_libraries_written() {
    let dir = tempdir().unwrap();
    let opts = options(dir.path(), "pAmtR");
    let mut opts_short = opts;
    opts_short.optimizer.max_iterations = 1;
    let script = vec![
        (3.0, [10.0, 10.0], [1.0, 1.0]),
        (4.0, [20.0, 20.0], [1.0, 1.0]),
    ];
    let (mut c, _) = controller(script, EchoOptimizer { strength: 0.9 }, opts_short);
    c.run(CIRCUIT, &sibling_library(), &Unobserved).unwrap();

    assert!(dir.path().join("library_iter_0.UCF.json").exists());
    assert!(dir.path().join("optimized_library_iter_1.UCF.json").exists());
    assert!(dir.path().join("iter_1").is_dir());
    let summary: Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join(SUMMARY_FILE)).unwrap()).unwrap();
    assert_eq!(summary["best_iteration"], 1);
    assert_eq!(summary["stop_reason"], "max iterations");
}

fn read_summary(dir: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(dir.join(SUMMARY_FILE)).unwrap()).unwrap()
}

#[test]
fn test_synthesis_failure_mid_loop_keeps_best_so_far() {
    let dir = tempdir().unwrap();
    let script = vec![(3.0, [10.0, 10.0], [1.0, 1.0])];
    let synthesis = Arc::new(ScriptedSynthesis::failing_from(script, 1));
    let mut c = Controller::new(
        synthesis.clone(),
        Arc::new(EchoOptimizer { strength: 0.9 }),
        options(dir.path(), "pAmtR"),
    );

    let report = c.run(CIRCUIT, &sibling_library(), &Unobserved).unwrap();
    assert!(report.success);
    assert!(matches!(&report.stop_reason, StopReason::Failed(msg) if msg.contains("boom")));
    assert_eq!(report.iterations.len(), 1);
    assert_eq!(report.best_iteration, Some(0));
    assert_eq!(synthesis.calls(), 2);
    assert_eq!(c.state(), ControllerState::Done);

    let summary = read_summary(dir.path());
    assert_eq!(summary["success"], true);
    assert_eq!(summary["best_iteration"], 0);
    assert!(summary["stop_reason"].as_str().unwrap().starts_with("failed"));
}

#[test]
fn test_sequence_optimizer_error_stops_the_loop() {
    let dir = tempdir().unwrap();
    let script = vec![(3.0, [10.0, 10.0], [1.0, 1.0])];
    let (mut c, synthesis) = controller(script, BrokenOptimizer, options(dir.path(), "pAmtR"));

    let report = c.run(CIRCUIT, &sibling_library(), &Unobserved).unwrap();
    assert!(matches!(report.stop_reason, StopReason::Failed(_)));
    assert_eq!(report.iterations.len(), 1);
    assert_eq!(report.best_iteration, Some(0));
    assert!(report.optimized_parts.is_empty());
    assert_eq!(synthesis.calls(), 1);
    assert!(dir.path().join(SUMMARY_FILE).exists());
}

#[cfg(unix)]
#[test]
fn test_collaborator_timeout_kills_the_process() {
    let started = Instant::now();
    let mut cmd = Command::new("sleep");
    cmd.arg("5");

    let err = run_with_timeout("sleeper", &mut cmd, None, Duration::from_secs(1)).unwrap_err();
    assert!(err.is_collaborator());
    match err {
        ForgeError::Timeout { tool, seconds } => {
            assert_eq!(tool, "sleeper");
            assert_eq!(seconds, 1);
        }
        other => panic!("expected a timeout, got {:?}", other),
    }
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[cfg(unix)]
#[test]
fn test_collaborator_output_is_captured() {
    let mut cmd = Command::new("cat");
    let out = run_with_timeout("cat", &mut cmd, Some(b"ACGT"), Duration::from_secs(5)).unwrap();
    assert!(out.status.success());
    assert_eq!(out.stdout, b"ACGT");
}

#[test]
fn test_disabled_heuristic_link_leaves_gate_parameters_alone() {
    let doc = LibraryDocument::new(vec![
        json!({"collection": "header"}),
        json!({"collection": "gates", "name": "S1_SrpR", "regulator": "SrpR"}),
        json!({"collection": "parts", "name": "pSrpR", "type": "promoter", "dnasequence": "ACGT"}),
    ]);
    let script = vec![
        (3.0, [10.0, 10.0], [1.0, 1.0]),
        (4.0, [20.0, 20.0], [1.0, 1.0]),
    ];

    let run = |allow: bool| {
        let dir = tempdir().unwrap();
        let mut opts = options(dir.path(), "pSrpR");
        opts.optimizer.max_iterations = 1;
        opts.optimizer.allow_heuristic_links = allow;
        let (mut c, _) = controller(script.clone(), EchoOptimizer { strength: 0.9 }, opts);
        c.run(CIRCUIT, &doc, &Unobserved).unwrap()
    };

    let linked = run(true);
    assert_eq!(linked.optimized_parts[0].gate.as_deref(), Some("S1_SrpR"));
    assert_eq!(linked.optimized_parts[0].link_source, Some(LinkSource::RegulatorName));

    let unlinked = run(false);
    assert_eq!(unlinked.optimized_parts[0].name, "pSrpR");
    assert_eq!(unlinked.optimized_parts[0].gate, None);
    assert_eq!(unlinked.optimized_parts[0].link_source, None);
    assert_eq!(unlinked.optimized_parts[0].predicted_parameters, None);
}

// --- TARGET SELECTION ---

fn failing(output: &str, ratio: f64) -> PerformanceMetrics {
    let mut m = PerformanceMetrics::default();
    m.on_off_ratios.insert(output.to_string(), ratio);
    m.leakage.insert(output.to_string(), 50.0);
    m.meets_standards.insert(
        output.to_string(),
        geneforge::metrics::Standards {
            on_off_ratio: false,
            leakage: false,
        },
    );
    m
}

#[test]
fn test_failing_output_implicates_named_parts_and_gate_promoters() {
    let mut records = sibling_library().into_records();
    records.push(json!({"collection": "parts", "type": "cds", "name": "YFP", "dnasequence": "ATG"}));
    let doc = LibraryDocument::new(records);
    let idx = doc.index();
    let config = Config::default();

    let targets = select_targets(&idx, &failing("YFP", 3.0), &config.optimizer);
    assert_eq!(targets.len(), 1);
    assert_eq!(targets[0].name, "YFP");
    assert_eq!(targets[0].reason, TargetReason::FailingOutput);

    let by_gate = select_targets(&idx, &failing("A1_AmtR", 3.0), &config.optimizer);
    let names: Vec<&str> = by_gate.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["pAmtR"]);
}

#[test]
fn test_heuristic_links_can_be_disabled() {
    let doc = LibraryDocument::new(vec![
        json!({"collection": "header"}),
        json!({"collection": "gates", "name": "S1_SrpR", "regulator": "SrpR"}),
        json!({"collection": "parts", "name": "pSrpR", "type": "promoter", "dnasequence": "ACGT"}),
    ]);
    let idx = doc.index();
    let mut config = Config::default();

    assert_eq!(select_targets(&idx, &failing("S1_SrpR", 1.0), &config.optimizer).len(), 1);
    config.optimizer.allow_heuristic_links = false;
    assert!(select_targets(&idx, &failing("S1_SrpR", 1.0), &config.optimizer).is_empty());
}

#[test]
fn test_target_strength_levels() {
    let params = Config::default().optimizer;
    assert_eq!(target_strength(&PerformanceMetrics::default(), None, &params), 0.7);
    assert_eq!(target_strength(&failing("YFP", 20.0), Some("YFP"), &params), 0.8);
    assert_eq!(target_strength(&failing("YFP", 200.0), Some("YFP"), &params), 0.5);
    // Unknown output falls back to the first ratio
    assert_eq!(target_strength(&failing("YFP", 20.0), Some("RFP"), &params), 0.8);
}
