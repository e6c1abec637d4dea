use super::{Customized, ValidationReport};
use crate::library::types::{self, nested_items_field, record_collection, record_id, GateRecord};
use crate::library::LibraryDocument;
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, info};

/// Removes items of `collection` whose identifier is not in `keep`.
///
/// Sibling records are dropped whole; array-shaped records lose elements. An
/// empty `keep` removes every item.
pub fn filter_collection(
    doc: &LibraryDocument,
    collection: &str,
    keep: &HashSet<String>,
) -> Customized {
    let mut report = ValidationReport::default();
    let found: HashSet<String> = doc
        .index()
        .items(collection)
        .iter()
        .filter_map(|v| record_id(v))
        .map(str::to_string)
        .collect();

    let mut requested: Vec<&String> = keep.difference(&found).collect();
    requested.sort();
    for id in requested {
        report.warn(format!("'{}' is not in collection '{}'", id, collection));
    }

    let mut document = doc.clone();
    let removed = retain_items(document.records_mut(), collection, |item| {
        record_id(item).map(|id| keep.contains(id)).unwrap_or(false)
    });

    info!(
        "Filtered '{}': kept {}, removed {}",
        collection,
        found.intersection(keep).count(),
        removed
    );
    Customized { document, report }
}

/// Drops records orphaned by part filtering: structures whose outputs name a
/// part that no longer exists, gates built on those structures, and the
/// models, gate_parts and response functions of those gates.
pub fn prune_dependents(doc: &LibraryDocument) -> Customized {
    let mut report = ValidationReport::default();
    let index = doc.index();

    let mut dead_structures = HashSet::new();
    for s in index.items(types::STRUCTURES) {
        let Some(name) = record_id(s) else { continue };
        let outputs = s.get("outputs").and_then(Value::as_array);
        let missing = outputs
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
            .find(|o| index.part(o).is_none());
        if let Some(missing) = missing {
            report.warn(format!(
                "structure '{}' removed: output '{}' no longer exists",
                name, missing
            ));
            dead_structures.insert(name.to_string());
        }
    }

    let mut dead_gates = HashSet::new();
    let mut dead_models = HashSet::new();
    for g in index.items(types::GATES) {
        let Ok(gate) = serde_json::from_value::<GateRecord>((*g).clone()) else {
            continue;
        };
        let orphaned = gate
            .structure
            .as_ref()
            .map(|s| dead_structures.contains(s))
            .unwrap_or(false);
        if !orphaned {
            continue;
        }
        if let Some(id) = gate.id() {
            report.warn(format!("gate '{}' removed with its structure", id));
            dead_gates.insert(id.to_string());
        }
        if let Some(model) = gate.model {
            dead_models.insert(model);
        }
    }

    let mut document = doc.clone();
    if dead_structures.is_empty() {
        return Customized { document, report };
    }

    let records = document.records_mut();
    let by_gate = |item: &Value| {
        !item
            .get("gate_name")
            .and_then(Value::as_str)
            .map(|g| dead_gates.contains(g))
            .unwrap_or(false)
    };

    let mut removed = retain_items(records, types::STRUCTURES, not_in(&dead_structures));
    removed += retain_items(records, types::GATES, not_in(&dead_gates));
    removed += retain_items(records, types::MODELS, not_in(&dead_models));
    removed += retain_items(records, types::GATE_PARTS, by_gate);
    removed += retain_items(records, types::RESPONSE_FUNCTIONS, by_gate);

    debug!("Pruned {} dependent records", removed);
    Customized { document, report }
}

fn not_in(dead: &HashSet<String>) -> impl Fn(&Value) -> bool + '_ {
    move |item: &Value| !record_id(item).map(|id| dead.contains(id)).unwrap_or(false)
}

/// Keeps the items of `collection` matching `keep`, in both storage shapes.
/// Returns how many items were removed.
pub(crate) fn retain_items<F>(records: &mut Vec<Value>, collection: &str, mut keep: F) -> usize
where
    F: FnMut(&Value) -> bool,
{
    let mut removed = 0;
    for record in records.iter_mut() {
        if record_collection(record) != Some(collection) {
            continue;
        }
        let Some(field) = nested_items_field(record, collection) else {
            continue;
        };
        if let Some(Value::Array(items)) = record.get_mut(field.as_str()) {
            let before = items.len();
            items.retain(|item| keep(item));
            removed += before - items.len();
        }
    }

    let before = records.len();
    records.retain(|record| {
        record_collection(record) != Some(collection)
            || nested_items_field(record, collection).is_some()
            || keep(record)
    });
    removed + (before - records.len())
}
