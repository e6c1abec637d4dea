pub mod loader;
pub mod outputs;

pub use self::loader::{
    extract_activity_table, extract_part_usage, extract_score, ActivitySummary, PartUsage,
};
pub use self::outputs::{discover, RawFileKind, RawFiles};

use crate::config::PerformanceThresholds;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Whether one output meets each threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Standards {
    pub on_off_ratio: bool,
    pub leakage: bool,
}

impl Standards {
    pub fn passed(&self) -> bool {
        self.on_off_ratio && self.leakage
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub overall_score: f64,
    pub states: Vec<String>,
    pub on_off_ratios: BTreeMap<String, f64>,
    pub leakage: BTreeMap<String, f64>,
    pub dynamic_range: BTreeMap<String, f64>,
    pub average_on_off_ratio: Option<f64>,
    pub average_leakage: Option<f64>,
    pub meets_standards: BTreeMap<String, Standards>,
    #[serde(default)]
    pub part_usage: Option<PartUsage>,
}

fn average<'a>(values: impl Iterator<Item = &'a f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

/// `20·log10(ratio)`, or 0 for non-positive ratios.
pub fn dynamic_range_db(ratio: f64) -> f64 {
    if ratio > 0.0 {
        20.0 * ratio.log10()
    } else {
        0.0
    }
}

impl PerformanceMetrics {
    /// Builds the derived fields from a score and an activity summary.
    pub fn derive(
        overall_score: f64,
        activity: ActivitySummary,
        thresholds: &PerformanceThresholds,
    ) -> Self {
        let dynamic_range = activity
            .on_off_ratios
            .iter()
            .map(|(k, r)| (k.clone(), dynamic_range_db(*r)))
            .collect();

        let meets_standards = activity
            .on_off_ratios
            .iter()
            .map(|(k, ratio)| {
                let leak = activity.leakage.get(k).copied().unwrap_or(f64::INFINITY);
                (
                    k.clone(),
                    Standards {
                        on_off_ratio: *ratio >= thresholds.min_on_off_ratio,
                        leakage: leak <= thresholds.max_leakage_pct,
                    },
                )
            })
            .collect();

        Self {
            overall_score,
            average_on_off_ratio: average(activity.on_off_ratios.values()),
            average_leakage: average(activity.leakage.values()),
            states: activity.states,
            on_off_ratios: activity.on_off_ratios,
            leakage: activity.leakage,
            dynamic_range,
            meets_standards,
            part_usage: None,
        }
    }

    /// Outputs failing any threshold, in name order.
    pub fn failing_outputs(&self) -> Vec<&str> {
        self.meets_standards
            .iter()
            .filter(|(_, s)| !s.passed())
            .map(|(k, _)| k.as_str())
            .collect()
    }

    pub fn has_outputs(&self) -> bool {
        !self.on_off_ratios.is_empty()
    }
}

/// Reads every raw table synthesis produced into metrics. Missing tables
/// degrade to zero or empty values.
pub fn evaluate(files: &RawFiles, thresholds: &PerformanceThresholds) -> PerformanceMetrics {
    let score = match files.get(&RawFileKind::CircuitScore) {
        Some(path) => extract_score(path),
        None => {
            warn!("⚠️  No circuit score table; score is 0.0");
            0.0
        }
    };
    let activity = match files.get(&RawFileKind::ActivityTable) {
        Some(path) => extract_activity_table(path),
        None => {
            warn!("⚠️  No activity table; no ON/OFF ratios");
            ActivitySummary::default()
        }
    };

    let mut metrics = PerformanceMetrics::derive(score, activity, thresholds);
    metrics.part_usage = files
        .get(&RawFileKind::PartInformation)
        .and_then(extract_part_usage);
    debug!(
        "Evaluated metrics: score {:.3}, {} outputs",
        metrics.overall_score,
        metrics.on_off_ratios.len()
    );
    metrics
}
