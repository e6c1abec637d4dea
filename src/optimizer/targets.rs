use crate::config::OptimizerParams;
use crate::library::types::{record_id, PART_COLLECTIONS};
use crate::library::{LibraryIndex, LinkSource};
use crate::metrics::PerformanceMetrics;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetReason {
    Primary,
    FailingOutput,
}

/// A part chosen for sequence optimization in one iteration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Target {
    pub name: String,
    pub sequence: Option<String>,
    /// The output whose ON/OFF ratio drives the target strength.
    pub output: Option<String>,
    pub reason: TargetReason,
}

pub(crate) fn link_allowed(source: LinkSource, allow_heuristic: bool) -> bool {
    allow_heuristic || source != LinkSource::RegulatorName
}

/// Parts an output implicates: the part it names, parts carrying its name in
/// any field, and promoters linked to the gate of that name.
pub fn implicated_parts(index: &LibraryIndex<'_>, output: &str, allow_heuristic: bool) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();

    for collection in PART_COLLECTIONS {
        for part in index.items(collection) {
            let Some(name) = record_id(part) else { continue };
            let mentions = name == output
                || part
                    .as_object()
                    .map(|o| {
                        o.iter()
                            .filter(|(k, _)| k.as_str() != "collection")
                            .any(|(_, v)| v.as_str() == Some(output))
                    })
                    .unwrap_or(false);
            if mentions {
                names.push(name.to_string());
            }
        }
    }

    for promoter in index.promoters_for_gate(output) {
        let allowed = index
            .gate_link(promoter)
            .map(|l| link_allowed(l.source, allow_heuristic))
            .unwrap_or(false);
        if allowed && index.part(promoter).is_some() {
            names.push(promoter.to_string());
        }
    }

    names.sort();
    names.dedup();
    names
}

/// The primary target when present, then every part implicated by an output
/// that fails the performance thresholds. Sorted by part name.
pub fn select_targets(
    index: &LibraryIndex<'_>,
    metrics: &PerformanceMetrics,
    params: &OptimizerParams,
) -> Vec<Target> {
    let mut chosen: BTreeMap<String, Target> = BTreeMap::new();
    let sequence_of = |name: &str| {
        index
            .part(name)
            .and_then(|p| p.get("dnasequence"))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    if let Some(primary) = params.primary_target() {
        if index.part(primary).is_some() {
            chosen.insert(
                primary.to_string(),
                Target {
                    name: primary.to_string(),
                    sequence: sequence_of(primary),
                    output: None,
                    reason: TargetReason::Primary,
                },
            );
        } else {
            warn!("⚠️  Primary target '{}' is not in the library", primary);
        }
    }

    for output in metrics.failing_outputs() {
        let parts = implicated_parts(index, output, params.allow_heuristic_links);
        debug!("Output '{}' fails thresholds; implicates {:?}", output, parts);
        for name in parts {
            chosen
                .entry(name.clone())
                .and_modify(|t| {
                    t.output.get_or_insert_with(|| output.to_string());
                })
                .or_insert_with(|| Target {
                    sequence: sequence_of(&name),
                    name,
                    output: Some(output.to_string()),
                    reason: TargetReason::FailingOutput,
                });
        }
    }

    chosen.into_values().collect()
}

/// Pushes for strength when the relevant ON/OFF ratio is low, aims moderate
/// otherwise. The relevant ratio is the target's output, else the first one.
pub fn target_strength(metrics: &PerformanceMetrics, output: Option<&str>, params: &OptimizerParams) -> f64 {
    let ratio = output
        .and_then(|o| metrics.on_off_ratios.get(o))
        .or_else(|| metrics.on_off_ratios.values().next());
    match ratio {
        None => params.target_strength_default,
        Some(r) if *r < params.low_ratio_threshold => params.target_strength_high,
        Some(_) => params.target_strength_moderate,
    }
}
