use crate::error::ForgeResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use tracing::{debug, warn};

const SCORE_LABEL: &str = "circuit_score";

fn normalize_label(cell: &str) -> String {
    cell.trim().to_ascii_lowercase().replace(['-', ' '], "_")
}

fn reader<R: Read>(data: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .flexible(true)
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_reader(data)
}

/// Reads the circuit score from a score table. Missing or malformed tables
/// yield 0.0.
pub fn extract_score<P: AsRef<Path>>(path: P) -> f64 {
    let path = path.as_ref();
    match File::open(path) {
        Ok(file) => parse_score(file),
        Err(e) => {
            warn!("⚠️  Could not open score table '{}': {}", path.display(), e);
            0.0
        }
    }
}

/// The value next to a `circuit_score` label, or the only value of a
/// one-column table.
pub fn parse_score<R: Read>(data: R) -> f64 {
    let mut rdr = reader(data);
    let mut single_column = true;
    let mut values = Vec::new();

    for (row_idx, result) in rdr.records().enumerate() {
        let rec = match result {
            Ok(rec) => rec,
            Err(e) => {
                debug!("[Row {}] CSV Parse Error: {}", row_idx + 1, e);
                continue;
            }
        };
        let cells: Vec<&str> = rec.iter().filter(|c| !c.is_empty()).collect();
        if cells.is_empty() {
            continue;
        }

        if normalize_label(cells[0]) == SCORE_LABEL {
            if let Some(v) = cells.get(1).and_then(|c| c.parse::<f64>().ok()) {
                return v;
            }
        }
        if cells.len() > 1 {
            single_column = false;
        }
        values.extend(cells.iter().filter_map(|c| c.parse::<f64>().ok()));
    }

    match values.as_slice() {
        [only] if single_column => *only,
        _ => {
            warn!("⚠️  Score table has no circuit_score entry; using 0.0");
            0.0
        }
    }
}

/// The two labeled sections of an activity table, keyed by component.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActivityTable {
    pub states: Vec<String>,
    pub scores: BTreeMap<String, Vec<f64>>,
    pub binary: BTreeMap<String, Vec<f64>>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Section {
    Scores,
    Binary,
}

impl Section {
    fn from_label(cell: &str) -> Option<Self> {
        match normalize_label(cell).as_str() {
            "scores" => Some(Section::Scores),
            "binary" => Some(Section::Binary),
            _ => None,
        }
    }
}

pub fn parse_activity_table<R: Read>(data: R) -> ForgeResult<ActivityTable> {
    let mut rdr = reader(data);
    let mut table = ActivityTable::default();
    let mut section: Option<Section> = None;
    let mut expecting_header = false;
    let mut skipped = 0;

    for result in rdr.records() {
        let rec = result?;
        if rec.iter().all(str::is_empty) {
            section = None;
            continue;
        }

        if let Some(next) = Section::from_label(&rec[0]) {
            section = Some(next);
            expecting_header = true;
            continue;
        }
        let Some(current) = section else {
            continue;
        };

        if expecting_header {
            expecting_header = false;
            if table.states.is_empty() {
                table.states = rec.iter().skip(1).map(str::to_string).collect();
            }
            continue;
        }

        let component = rec[0].to_string();
        let values: Result<Vec<f64>, _> = rec
            .iter()
            .skip(1)
            .filter(|c| !c.is_empty())
            .map(str::parse::<f64>)
            .collect();
        let Ok(values) = values else {
            skipped += 1;
            continue;
        };
        let target = match current {
            Section::Scores => &mut table.scores,
            Section::Binary => &mut table.binary,
        };
        target.insert(component, values);
    }

    if skipped > 0 {
        warn!("⚠️  Skipped {} non-numeric activity rows", skipped);
    }
    Ok(table)
}

/// Per-output ON/OFF ratio and leakage percentage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivitySummary {
    pub states: Vec<String>,
    pub on_off_ratios: BTreeMap<String, f64>,
    pub leakage: BTreeMap<String, f64>,
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Splits readings by expected state and returns `(ratio, leakage %)`.
/// Ratio is infinite when the OFF mean is zero; leakage is zero when the ON
/// mean is zero.
pub fn on_off(on: &[f64], off: &[f64]) -> Option<(f64, f64)> {
    if on.is_empty() || off.is_empty() {
        return None;
    }
    let (mean_on, mean_off) = (mean(on), mean(off));
    let ratio = if mean_off == 0.0 {
        f64::INFINITY
    } else {
        mean_on / mean_off
    };
    let leakage = if mean_on == 0.0 {
        0.0
    } else {
        100.0 * mean_off / mean_on
    };
    Some((ratio, leakage))
}

impl ActivityTable {
    pub fn summarize(&self) -> ActivitySummary {
        let mut summary = ActivitySummary {
            states: self.states.clone(),
            ..Default::default()
        };

        for (component, readings) in &self.scores {
            let Some(expected) = self.binary.get(component) else {
                debug!("No logic states for '{}'; not an output", component);
                continue;
            };
            let mut on = Vec::new();
            let mut off = Vec::new();
            for (value, state) in readings.iter().zip(expected) {
                if *state > 0.5 {
                    on.push(*value);
                } else {
                    off.push(*value);
                }
            }
            match on_off(&on, &off) {
                Some((ratio, leak)) => {
                    summary.on_off_ratios.insert(component.clone(), ratio);
                    summary.leakage.insert(component.clone(), leak);
                }
                None => warn!(
                    "⚠️  '{}' lacks ON or OFF readings; skipping",
                    component
                ),
            }
        }
        summary
    }
}

/// Soft-fail wrapper: unreadable tables produce an empty summary.
pub fn extract_activity_table<P: AsRef<Path>>(path: P) -> ActivitySummary {
    let path = path.as_ref();
    let parsed = File::open(path)
        .map_err(Into::into)
        .and_then(parse_activity_table);
    match parsed {
        Ok(table) => table.summarize(),
        Err(e) => {
            warn!("⚠️  Could not read activity table '{}': {}", path.display(), e);
            ActivitySummary::default()
        }
    }
}

/// Parts placed by synthesis, grouped by kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartUsage {
    pub promoters: Vec<String>,
    pub ribozymes: Vec<String>,
    pub rbs: Vec<String>,
    pub cds: Vec<String>,
    pub terminators: Vec<String>,
}

impl PartUsage {
    pub fn total(&self) -> usize {
        self.promoters.len()
            + self.ribozymes.len()
            + self.rbs.len()
            + self.cds.len()
            + self.terminators.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum UsageSection {
    Promoters,
    Ribozymes,
    Rbs,
    Cds,
    Terminators,
}

pub fn parse_part_usage<R: BufRead>(data: R) -> ForgeResult<PartUsage> {
    let mut usage = PartUsage::default();
    let mut current: Option<UsageSection> = None;

    for line in data.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.contains(':') {
            let next = match line.split(':').next().map(str::trim) {
                Some("Promoters") => Some(UsageSection::Promoters),
                Some("Ribozymes") => Some(UsageSection::Ribozymes),
                Some("RBS") => Some(UsageSection::Rbs),
                Some("CDS") => Some(UsageSection::Cds),
                Some("Terminators") => Some(UsageSection::Terminators),
                _ => None,
            };
            if next.is_some() || line.ends_with(':') {
                current = next;
                continue;
            }
        }
        let Some(section) = current else { continue };
        let list = match section {
            UsageSection::Promoters => &mut usage.promoters,
            UsageSection::Ribozymes => &mut usage.ribozymes,
            UsageSection::Rbs => &mut usage.rbs,
            UsageSection::Cds => &mut usage.cds,
            UsageSection::Terminators => &mut usage.terminators,
        };
        list.push(line.trim_end_matches(',').to_string());
    }
    Ok(usage)
}

pub fn extract_part_usage<P: AsRef<Path>>(path: P) -> Option<PartUsage> {
    let path = path.as_ref();
    let parsed = File::open(path)
        .map_err(Into::into)
        .and_then(|f| parse_part_usage(BufReader::new(f)));
    match parsed {
        Ok(usage) => Some(usage),
        Err(e) => {
            warn!("⚠️  Could not read part usage '{}': {}", path.display(), e);
            None
        }
    }
}
