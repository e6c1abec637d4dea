use super::validate::{is_minimally_complete, validate_part};
use super::{Customized, ValidationReport};
use crate::error::{ForgeError, ForgeResult};
use crate::library::types::{
    self, nested_items_field, record_collection, record_id, PartType, PART_COLLECTIONS,
};
use crate::library::{json_kind, LibraryDocument};
use serde_json::{Map, Value};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Renames `id` to `name` and `sequence` to `dnasequence` when the canonical
/// field is absent.
pub fn align_fields(part: &mut Map<String, Value>) {
    for (alias, canonical) in [("id", "name"), ("sequence", "dnasequence")] {
        if part.contains_key(canonical) {
            continue;
        }
        if let Some(v) = part.shift_remove(alias) {
            part.insert(canonical.to_string(), v);
        }
    }
}

/// Fills in the type's default parameters that the part does not set.
pub fn apply_default_parameters(part: &mut Map<String, Value>) {
    let Some(type_name) = part.get("type").and_then(Value::as_str) else {
        return;
    };
    let defaults = PartType::default_parameters(type_name);
    if defaults.is_empty() {
        return;
    }

    let params = part
        .entry("parameters")
        .or_insert_with(|| Value::Object(Map::new()));
    if let Value::Object(map) = params {
        for (name, value) in defaults {
            map.entry(name.to_string())
                .or_insert_with(|| Value::from(*value));
        }
    }
}

/// Collection a part is stored in, by its type. Unknown types go to `parts`.
pub fn route(part: &Map<String, Value>) -> &'static str {
    part.get("type")
        .and_then(Value::as_str)
        .and_then(|t| t.parse::<PartType>().ok())
        .map(|t| t.collection())
        .unwrap_or(types::PARTS)
}

/// Aligns, defaults, validates and inserts `new_parts`.
///
/// In strict mode the first invalid part fails the call. Otherwise invalid
/// parts that still have `name`, `type` and `dnasequence` are kept with a
/// warning and the rest are dropped.
pub fn add_parts(doc: &LibraryDocument, new_parts: &[Value], strict: bool) -> ForgeResult<Customized> {
    let mut report = ValidationReport::default();
    let mut document = doc.clone();

    let index = doc.index();
    let mut taken: HashSet<String> = PART_COLLECTIONS
        .iter()
        .flat_map(|c| index.items(c).iter().filter_map(|p| record_id(p)))
        .map(str::to_string)
        .collect();

    let mut added = 0;
    for (i, raw) in new_parts.iter().enumerate() {
        let Value::Object(fields) = raw else {
            let msg = format!("new part {} is {}, not an object", i, json_kind(raw));
            if strict {
                return Err(ForgeError::Validation(msg));
            }
            debug!("{}", msg);
            report.dropped.push(format!("#{}", i));
            continue;
        };

        let mut part = fields.clone();
        align_fields(&mut part);
        apply_default_parameters(&mut part);
        let label = part
            .get("name")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("#{}", i));

        let part_value = Value::Object(part);
        let mut checked = validate_part(&part_value);
        if taken.contains(&label) {
            checked.error(format!("a part named '{}' already exists", label));
        }

        if !checked.valid {
            let duplicate = taken.contains(&label);
            if strict {
                return Err(ForgeError::Validation(format!(
                    "part '{}' rejected: {}",
                    label,
                    checked.errors.join("; ")
                )));
            }
            if duplicate || !is_minimally_complete(&part_value) {
                warn!("Dropping part '{}': {}", label, checked.errors.join("; "));
                report.dropped.push(label);
                continue;
            }
            warn!("Keeping part '{}' despite: {}", label, checked.errors.join("; "));
            checked = checked.demote_errors();
        }
        for w in checked.warnings {
            report.warn(format!("{}: {}", label, w));
        }

        let Value::Object(mut part) = part_value else {
            continue;
        };
        let collection = route(&part);
        part.insert("collection".to_string(), Value::from(collection));
        insert_item(document.records_mut(), collection, part);
        taken.insert(label);
        added += 1;
    }

    info!(
        "Added {} new parts ({} dropped)",
        added,
        report.dropped.len()
    );
    Ok(Customized { document, report })
}

/// Appends into an array-shaped record of `collection`, else after its last
/// sibling record, else as a new record at the end.
fn insert_item(records: &mut Vec<Value>, collection: &str, mut item: Map<String, Value>) {
    for record in records.iter_mut() {
        if record_collection(record) != Some(collection) {
            continue;
        }
        if let Some(field) = nested_items_field(record, collection) {
            if let Some(Value::Array(items)) = record.get_mut(field.as_str()) {
                item.shift_remove("collection");
                items.push(Value::Object(item));
                return;
            }
        }
    }

    let last = records
        .iter()
        .rposition(|r| record_collection(r) == Some(collection));
    match last {
        Some(pos) => records.insert(pos + 1, Value::Object(item)),
        None => {
            debug!("Creating collection '{}'", collection);
            records.push(Value::Object(item));
        }
    }
}
