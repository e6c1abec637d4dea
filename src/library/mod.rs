pub mod index;
pub mod types;

pub use self::index::{CollectionEntry, GateLink, LibraryIndex, LinkSource};
pub use self::types::{HillParameters, PartType};

use self::types::{nested_items_field, record_collection};
use crate::error::{ForgeError, ForgeResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, info};

/// A constraint library: the ordered list of collection records exactly as
/// stored on disk. Transformations never mutate a document in place; they
/// clone it and return the new one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LibraryDocument {
    records: Vec<Value>,
}

impl LibraryDocument {
    pub fn new(records: Vec<Value>) -> Self {
        Self { records }
    }

    pub fn from_value(value: Value) -> ForgeResult<Self> {
        match value {
            Value::Array(records) => Ok(Self { records }),
            other => Err(ForgeError::Validation(format!(
                "library must be a JSON array of collection records, got {}",
                json_kind(&other)
            ))),
        }
    }

    pub fn from_reader<R: Read>(reader: R) -> ForgeResult<Self> {
        let value: Value = serde_json::from_reader(reader)?;
        Self::from_value(value)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> ForgeResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            ForgeError::Config(format!(
                "Could not open constraint library at '{}': {}",
                path.display(),
                e
            ))
        })?;
        let doc = Self::from_reader(BufReader::new(file))?;
        info!(
            "📚 Loaded constraint library '{}' ({} records)",
            path.display(),
            doc.len()
        );
        Ok(doc)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> ForgeResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, self.to_json_string()?)?;
        debug!("Wrote constraint library to {}", path.display());
        Ok(())
    }

    pub fn to_json_string(&self) -> ForgeResult<String> {
        Ok(serde_json::to_string_pretty(&self.records)?)
    }

    pub fn records(&self) -> &[Value] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Value> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The first record, when it is the library header.
    pub fn header(&self) -> Option<&Value> {
        self.records
            .first()
            .filter(|r| record_collection(r) == Some(types::HEADER))
    }

    /// Distinct collection names in first-seen order.
    pub fn collection_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for name in self.records.iter().filter_map(record_collection) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    pub fn has_collection(&self, name: &str) -> bool {
        self.records
            .iter()
            .any(|r| record_collection(r) == Some(name))
    }

    pub fn index(&self) -> LibraryIndex<'_> {
        LibraryIndex::build(self)
    }

    pub(crate) fn records_mut(&mut self) -> &mut Vec<Value> {
        &mut self.records
    }

    /// Mutable access to every item of `collection`, whether stored as sibling
    /// records or nested inside an array field.
    pub(crate) fn items_mut(&mut self, collection: &str) -> Vec<&mut Value> {
        let mut out = Vec::new();
        for record in self.records.iter_mut() {
            if record_collection(record) != Some(collection) {
                continue;
            }
            match nested_items_field(record, collection) {
                Some(field) => {
                    if let Some(Value::Array(items)) = record.get_mut(field.as_str()) {
                        out.extend(items.iter_mut());
                    }
                }
                None => out.push(record),
            }
        }
        out
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
