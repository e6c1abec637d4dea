use super::{Customized, ValidationReport};
use crate::library::types::{self, record_id, HillParameters, PART_COLLECTIONS};
use crate::library::LibraryDocument;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info};

/// Field-level changes for one part. `parameters` merges; other keys replace.
pub type PartPatch = Map<String, Value>;

/// Applies `modifications` to every matching part in `parts`, `ribozymes`
/// and `terminators`. Applying the same patches twice equals applying once.
pub fn modify_parts(doc: &LibraryDocument, modifications: &BTreeMap<String, PartPatch>) -> Customized {
    let mut report = ValidationReport::default();
    let mut document = doc.clone();
    let mut touched: HashSet<String> = HashSet::new();

    for collection in PART_COLLECTIONS {
        for item in document.items_mut(collection) {
            let Some(id) = record_id(item).map(str::to_string) else {
                continue;
            };
            if let Some(patch) = modifications.get(&id) {
                apply_patch(item, patch);
                touched.insert(id);
            }
        }
    }

    for id in modifications.keys().filter(|id| !touched.contains(*id)) {
        report.warn(format!("no part named '{}' to modify", id));
    }
    info!("Modified {} of {} requested parts", touched.len(), modifications.len());
    Customized { document, report }
}

fn apply_patch(item: &mut Value, patch: &PartPatch) {
    let Some(obj) = item.as_object_mut() else {
        return;
    };
    for (key, value) in patch {
        match key.as_str() {
            "parameters" => match obj.get_mut("parameters") {
                Some(existing) => merge_parameters(existing, value),
                None => {
                    obj.insert(key.clone(), value.clone());
                }
            },
            "sequence" if !patch.contains_key("dnasequence") => {
                obj.insert("dnasequence".to_string(), value.clone());
            }
            _ => {
                obj.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Merges `patch` into `existing` key by key, for map- and list-shaped parameters.
fn merge_parameters(existing: &mut Value, patch: &Value) {
    match (existing, patch) {
        (Value::Object(current), Value::Object(update)) => {
            for (k, v) in update {
                current.insert(k.clone(), v.clone());
            }
        }
        (Value::Array(current), Value::Object(update)) => {
            for (k, v) in update {
                set_named(current, k, v.clone());
            }
        }
        (Value::Array(current), Value::Array(update)) => {
            for entry in update {
                if let Some(name) = entry.get("name").and_then(Value::as_str) {
                    let v = entry.get("value").cloned().unwrap_or(Value::Null);
                    set_named(current, name, v);
                }
            }
        }
        (existing, patch) => *existing = patch.clone(),
    }
}

fn set_named(entries: &mut Vec<Value>, name: &str, value: Value) {
    let slot = entries
        .iter_mut()
        .find(|e| e.get("name").and_then(Value::as_str) == Some(name));
    match slot {
        Some(Value::Object(entry)) => {
            entry.insert("value".to_string(), value);
        }
        _ => {
            let mut entry = Map::new();
            entry.insert("name".to_string(), Value::from(name));
            entry.insert("value".to_string(), value);
            entries.push(Value::Object(entry));
        }
    }
}

/// Writes Hill parameters onto each gate's response function, or onto the
/// `models` record the gate references when it has none.
pub fn modify_response_parameters(
    doc: &LibraryDocument,
    updates: &BTreeMap<String, HillParameters>,
) -> Customized {
    let mut report = ValidationReport::default();
    let index = doc.index();

    let mut targets: HashMap<&str, (&'static str, String)> = HashMap::new();
    for gate in updates.keys() {
        if index.response_function(gate).is_some() {
            targets.insert(gate.as_str(), (types::RESPONSE_FUNCTIONS, gate.clone()));
            continue;
        }
        let model = index
            .gate(gate)
            .and_then(|g| g.get("model"))
            .and_then(Value::as_str)
            .filter(|m| index.get(types::MODELS, m).is_some());
        match model {
            Some(m) => {
                targets.insert(gate.as_str(), (types::MODELS, m.to_string()));
            }
            None => report.warn(format!("gate '{}' has no response function or model", gate)),
        }
    }

    let mut document = doc.clone();
    for (gate, params) in updates {
        let Some((collection, key)) = targets.get(gate.as_str()) else {
            continue;
        };
        let finite: HillParameters = params
            .iter()
            .filter(|(name, v)| {
                let ok = v.is_finite();
                if !ok {
                    report.warn(format!("{}: ignoring non-finite '{}'", gate, name));
                }
                ok
            })
            .map(|(k, v)| (k.clone(), *v))
            .collect();

        let matches = |item: &Value| match *collection {
            types::RESPONSE_FUNCTIONS => {
                item.get("gate_name").and_then(Value::as_str) == Some(key.as_str())
            }
            _ => record_id(item) == Some(key.as_str()),
        };
        if let Some(record) = document.items_mut(collection).into_iter().find(|i| matches(i)) {
            write_parameters(record, &finite);
            debug!("Updated {} parameters of {} '{}'", finite.len(), collection, key);
        }
    }

    Customized { document, report }
}

fn write_parameters(record: &mut Value, params: &HillParameters) {
    let Some(obj) = record.as_object_mut() else {
        return;
    };
    let slot = obj
        .entry("parameters")
        .or_insert_with(|| Value::Array(Vec::new()));
    match slot {
        Value::Array(entries) => {
            for (name, value) in params {
                set_named(entries, name, Value::from(*value));
            }
        }
        Value::Object(map) => {
            for (name, value) in params {
                map.insert(name.clone(), Value::from(*value));
            }
        }
        other => {
            *other = Value::Array(
                params
                    .iter()
                    .map(|(name, value)| {
                        let mut entry = Map::new();
                        entry.insert("name".to_string(), Value::from(name.as_str()));
                        entry.insert("value".to_string(), Value::from(*value));
                        Value::Object(entry)
                    })
                    .collect(),
            );
        }
    }
}
