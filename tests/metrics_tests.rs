mod common;

use common::write_synthesis_tables;
use geneforge::config::PerformanceThresholds;
use geneforge::metrics::loader::{on_off, parse_activity_table, parse_part_usage, parse_score};
use geneforge::metrics::{self, discover, dynamic_range_db, extract_score, RawFileKind};
use rstest::rstest;
use std::fs;
use std::io::Cursor;
use tempfile::{tempdir, NamedTempFile};

const ACTIVITY: &str = "\
scores
,00,01,10,11
YFP,1,1,10,10
RFP,0.5,4,4,0.5

binary
,00,01,10,11
YFP,0,0,1,1
RFP,0,1,1,0
";

// --- SCORE ---

#[rstest]
#[case("circuit_score,42.5\n", 42.5)]
#[case("metric,value\nCircuit Score,7\n", 7.0)]
#[case("12.25\n", 12.25)]
#[case("metric,value\nother,3\n", 0.0)]
#[case("", 0.0)]
#[case("circuit_score,not-a-number\n", 0.0)]
fn test_parse_score(#[case] table: &str, #[case] expected: f64) {
    assert_eq!(parse_score(Cursor::new(table)), expected);
}

#[test]
fn test_missing_score_table_is_zero() {
    let dir = tempdir().unwrap();
    assert_eq!(extract_score(dir.path().join("absent.csv")), 0.0);
}

// --- ACTIVITY ---

#[test]
fn test_activity_table_sections() {
    let table = parse_activity_table(Cursor::new(ACTIVITY)).unwrap();
    assert_eq!(table.states, vec!["00", "01", "10", "11"]);
    assert_eq!(table.scores["YFP"], vec![1.0, 1.0, 10.0, 10.0]);
    assert_eq!(table.binary["RFP"], vec![0.0, 1.0, 1.0, 0.0]);
}

#[test]
fn test_ratio_leakage_and_dynamic_range() {
    let summary = parse_activity_table(Cursor::new(ACTIVITY))
        .unwrap()
        .summarize();
    assert_eq!(summary.on_off_ratios["YFP"], 10.0);
    assert_eq!(summary.leakage["YFP"], 10.0);
    assert_eq!(summary.on_off_ratios["RFP"], 8.0);
    assert!((dynamic_range_db(summary.on_off_ratios["YFP"]) - 20.0).abs() < 1e-9);
}

#[test]
fn test_zero_means() {
    assert_eq!(on_off(&[5.0], &[0.0]), Some((f64::INFINITY, 0.0)));
    assert_eq!(on_off(&[0.0], &[0.0]), Some((f64::INFINITY, 0.0)));
    let (ratio, leak) = on_off(&[0.0], &[2.0]).unwrap();
    assert_eq!(ratio, 0.0);
    assert_eq!(leak, 0.0);
    assert_eq!(on_off(&[], &[1.0]), None);
}

#[test]
fn test_non_numeric_rows_are_skipped() {
    let text = "scores\n,0,1\nYFP,1,abc\nRFP,1,2\n\nbinary\n,0,1\nRFP,0,1\n";
    let table = parse_activity_table(Cursor::new(text)).unwrap();
    assert!(!table.scores.contains_key("YFP"));
    assert_eq!(table.summarize().on_off_ratios["RFP"], 2.0);
}

#[test]
fn test_component_without_states_is_not_an_output() {
    let text = "scores\n,0,1\nAmtR,1,2\nYFP,1,2\n\nbinary\n,0,1\nYFP,0,1\n";
    let summary = parse_activity_table(Cursor::new(text)).unwrap().summarize();
    assert_eq!(summary.on_off_ratios.len(), 1);
}

// --- PART USAGE ---

#[test]
fn test_part_usage_sections() {
    let text = "Promoters:\npAmtR\npPhlF\nRBS:\nB1\nCDS:\nAmtR\nTerminators:\nL3S2P55\n";
    let usage = parse_part_usage(Cursor::new(text)).unwrap();
    assert_eq!(usage.promoters, vec!["pAmtR", "pPhlF"]);
    assert_eq!(usage.rbs, vec!["B1"]);
    assert_eq!(usage.total(), 5);
}

// --- DISCOVERY AND EVALUATION ---

#[test]
fn test_discover_finds_tables_recursively() {
    let dir = tempdir().unwrap();
    write_synthesis_tables(&dir.path().join("run"), 3.0, [10.0, 10.0], [1.0, 1.0]);
    fs::write(dir.path().join("notes.txt"), "ignore me").unwrap();

    let files = discover(dir.path());
    assert_eq!(files.len(), 2);
    assert!(files.contains_key(&RawFileKind::CircuitScore));
    assert!(files.contains_key(&RawFileKind::ActivityTable));
}

#[test]
fn test_evaluate_applies_thresholds() {
    let dir = tempdir().unwrap();
    write_synthesis_tables(dir.path(), 3.0, [10.0, 10.0], [1.0, 1.0]);
    let files = discover(dir.path());

    let strict = metrics::evaluate(&files, &PerformanceThresholds::default());
    assert_eq!(strict.overall_score, 3.0);
    assert_eq!(strict.on_off_ratios["YFP"], 10.0);
    assert_eq!(strict.leakage["YFP"], 10.0);
    assert!((strict.dynamic_range["YFP"] - 20.0).abs() < 1e-9);
    assert_eq!(strict.failing_outputs(), vec!["YFP"]);
    assert_eq!(strict.average_on_off_ratio, Some(10.0));

    let loose = PerformanceThresholds {
        min_on_off_ratio: 5.0,
        max_leakage_pct: 20.0,
    };
    let relaxed = metrics::evaluate(&files, &loose);
    assert!(relaxed.meets_standards["YFP"].passed());
    assert!(relaxed.failing_outputs().is_empty());
}

#[test]
fn test_evaluate_without_tables_degrades() {
    let dir = tempdir().unwrap();
    let m = metrics::evaluate(&discover(dir.path()), &PerformanceThresholds::default());
    assert_eq!(m.overall_score, 0.0);
    assert!(!m.has_outputs());
    assert_eq!(m.average_on_off_ratio, None);
}

#[test]
fn test_metrics_serialize_to_json() {
    let mut file = NamedTempFile::new().unwrap();
    std::io::Write::write_all(&mut file, b"circuit_score,1.5\n").unwrap();
    let mut files = metrics::RawFiles::new();
    files.insert(RawFileKind::CircuitScore, file.path().to_path_buf());

    let m = metrics::evaluate(&files, &PerformanceThresholds::default());
    let json = serde_json::to_value(&m).unwrap();
    assert_eq!(json["overall_score"], 1.5);
}
