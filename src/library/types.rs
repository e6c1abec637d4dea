use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};

// === COLLECTION NAMES ===
pub const HEADER: &str = "header";
pub const MEASUREMENT_STD: &str = "measurement_std";
pub const LOGIC_CONSTRAINTS: &str = "logic_constraints";
pub const PARTS: &str = "parts";
pub const GATES: &str = "gates";
pub const GATE_PARTS: &str = "gate_parts";
pub const RESPONSE_FUNCTIONS: &str = "response_functions";
pub const MODELS: &str = "models";
pub const STRUCTURES: &str = "structures";
pub const RIBOZYMES: &str = "ribozymes";
pub const TERMINATORS: &str = "terminators";

/// Collections that hold exactly one object rather than a sequence of items.
pub const SINGLETON_COLLECTIONS: [&str; 3] = [HEADER, MEASUREMENT_STD, LOGIC_CONSTRAINTS];

/// Collections searched when modifying parts.
pub const PART_COLLECTIONS: [&str; 3] = [PARTS, RIBOZYMES, TERMINATORS];

/// Record fields consulted, in order, for a record's identifier.
pub const ID_FIELDS: [&str; 3] = ["name", "id", "gate_name"];

pub fn is_singleton(collection: &str) -> bool {
    SINGLETON_COLLECTIONS.contains(&collection)
}

/// The array field names under which a collection may nest its items.
pub fn array_field_names(collection: &str) -> [String; 2] {
    [collection.to_string(), format!("{}s", collection)]
}

/// Returns the record's identifier, checking `name`, then `id`, then `gate_name`.
pub fn record_id(record: &Value) -> Option<&str> {
    let obj = record.as_object()?;
    ID_FIELDS
        .iter()
        .find_map(|f| obj.get(*f).and_then(Value::as_str))
}

pub fn record_collection(record: &Value) -> Option<&str> {
    record.get("collection").and_then(Value::as_str)
}

/// If `record` is the array-shaped form of `collection`, returns the items field name.
pub fn nested_items_field(record: &Value, collection: &str) -> Option<String> {
    let obj = record.as_object()?;
    array_field_names(collection)
        .into_iter()
        .find(|f| obj.get(f).map(Value::is_array).unwrap_or(false))
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, AsRefStr, EnumIter, Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PartType {
    Promoter,
    Cds,
    Rbs,
    Terminator,
    Ribozyme,
    Scar,
    Spacer,
    ModifiedPromoter,
}

impl PartType {
    pub fn vocabulary() -> Vec<String> {
        PartType::iter().map(|t| t.to_string()).collect()
    }

    /// Collection a new part of this type is stored in.
    pub fn collection(&self) -> &'static str {
        match self {
            PartType::Ribozyme => RIBOZYMES,
            PartType::Terminator => TERMINATORS,
            _ => PARTS,
        }
    }

    /// Parameter names expected for this type, with default values.
    pub fn default_parameters(type_name: &str) -> &'static [(&'static str, f64)] {
        match type_name {
            "promoter" => &[("strength", 1.0), ("leak", 0.01)],
            "cds" | "repressor" => &[("repression", 0.9), ("cooperativity", 2.0)],
            "terminator" => &[("efficiency", 0.95)],
            _ => &[],
        }
    }
}

pub fn is_dna(sequence: &str) -> bool {
    sequence
        .bytes()
        .all(|b| matches!(b, b'A' | b'C' | b'G' | b'T' | b'a' | b'c' | b'g' | b't'))
}

// --- Typed views ---
// Deserialized on demand from the raw records; never written back.

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct PartRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub part_type: String,
    #[serde(default)]
    pub dnasequence: Option<String>,
    #[serde(default)]
    pub parameters: Option<Value>,
}

impl PartRecord {
    pub fn kind(&self) -> Option<PartType> {
        self.part_type.parse().ok()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct GateRecord {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub gate_name: Option<String>,
    #[serde(default)]
    pub regulator: Option<String>,
    #[serde(default)]
    pub gate_type: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub structure: Option<String>,
}

impl GateRecord {
    pub fn id(&self) -> Option<&str> {
        self.name.as_deref().or(self.gate_name.as_deref())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct NamedValue {
    pub name: String,
    pub value: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ResponseFunctionRecord {
    pub gate_name: String,
    #[serde(default)]
    pub parameters: Vec<NamedValue>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct GatePartsRecord {
    pub gate_name: String,
    #[serde(default)]
    pub promoter: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct StructureRecord {
    pub name: String,
    #[serde(default)]
    pub outputs: Vec<String>,
}

/// Hill-function parameters keyed by name (`ymax`, `ymin`, `K`, `n`, ...).
pub type HillParameters = BTreeMap<String, f64>;

/// Reads `[{name, value}]` or `{name: value}` parameter shapes into a map.
pub fn read_parameters(value: &Value) -> HillParameters {
    let mut out = HillParameters::new();
    match value {
        Value::Array(entries) => {
            for entry in entries {
                let name = entry.get("name").and_then(Value::as_str);
                let v = entry.get("value").and_then(Value::as_f64);
                if let (Some(name), Some(v)) = (name, v) {
                    out.entry(name.to_string()).or_insert(v);
                }
            }
        }
        Value::Object(map) => {
            for (k, v) in map {
                if let Some(v) = v.as_f64() {
                    out.insert(k.clone(), v);
                }
            }
        }
        _ => {}
    }
    out
}
