//! Best-effort checks against JSON-schema files describing each collection.
//!
//! Understands `type`, `required`, `enum`, `properties`, `items`, the
//! `allOf`/`anyOf`/`oneOf` combinators and `$ref` into the same file or into
//! another schema of the set. A `ucf` schema is checked against the whole
//! document. Everything reported here is a warning: partially conformant
//! libraries must stay usable.

use crate::error::{ForgeError, ForgeResult};
use crate::library::types::record_collection;
use crate::library::LibraryDocument;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Schema describing the whole document rather than one collection.
pub const ROOT_SCHEMA: &str = "ucf";
const MAX_REF_DEPTH: usize = 32;

#[derive(Debug, Clone, Default)]
pub struct SchemaSet {
    schemas: HashMap<String, Value>,
}

impl SchemaSet {
    /// Reads every `<name>.schema.json` in `dir`, keyed by `<name>`.
    pub fn load_dir<P: AsRef<Path>>(dir: P) -> ForgeResult<Self> {
        let dir = dir.as_ref();
        let entries = fs::read_dir(dir).map_err(|e| {
            ForgeError::Config(format!(
                "Could not read schema directory '{}': {}",
                dir.display(),
                e
            ))
        })?;

        let mut schemas = HashMap::new();
        for entry in entries {
            let path = entry?.path();
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(stem) = file_name.strip_suffix(".schema.json") else {
                continue;
            };
            match fs::read_to_string(&path)
                .map_err(ForgeError::from)
                .and_then(|s| serde_json::from_str::<Value>(&s).map_err(ForgeError::from))
            {
                Ok(schema) => {
                    schemas.insert(stem.to_string(), schema);
                }
                Err(e) => warn!("Skipping unreadable schema '{}': {}", path.display(), e),
            }
        }

        if schemas.is_empty() {
            warn!("No schema files found in {}", dir.display());
        } else {
            debug!("Loaded {} collection schemas", schemas.len());
        }
        Ok(Self { schemas })
    }

    pub fn insert(&mut self, name: impl Into<String>, schema: Value) {
        self.schemas.insert(name.into(), schema);
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Schema for a collection name or its singular form.
    pub fn for_collection(&self, collection: &str) -> Option<&Value> {
        self.schemas.get(collection).or_else(|| {
            collection
                .strip_suffix('s')
                .and_then(|singular| self.schemas.get(singular))
        })
    }

    pub fn check_document(&self, doc: &LibraryDocument) -> Vec<String> {
        let mut findings = Vec::new();
        if let Some(root) = self.schemas.get(ROOT_SCHEMA) {
            let whole = Value::Array(doc.records().to_vec());
            self.check(&whole, root, root, "$", 0, &mut findings);
        }
        for (i, record) in doc.records().iter().enumerate() {
            let Some(collection) = record_collection(record) else {
                continue;
            };
            if let Some(schema) = self.for_collection(collection) {
                self.check(record, schema, schema, &format!("[{}]", i), 0, &mut findings);
            }
        }
        findings
    }

    /// Resolves `#/pointer`, `file:name.schema.json` and `name.schema.json#/pointer`.
    /// Returns the target and the schema it lives in.
    fn resolve<'s>(&'s self, reference: &str, root: &'s Value) -> Option<(&'s Value, &'s Value)> {
        let reference = reference.strip_prefix("file:").unwrap_or(reference);
        let (file, fragment) = reference.split_once('#').unwrap_or((reference, ""));
        let base = if file.is_empty() {
            root
        } else {
            let name = file.rsplit('/').next().unwrap_or(file);
            let stem = name
                .strip_suffix(".schema.json")
                .or_else(|| name.strip_suffix(".json"))
                .unwrap_or(name);
            self.schemas.get(stem)?
        };
        let target = if fragment.is_empty() {
            base
        } else {
            base.pointer(fragment)?
        };
        Some((target, base))
    }

    fn check<'s>(
        &'s self,
        value: &Value,
        schema: &'s Value,
        root: &'s Value,
        path: &str,
        depth: usize,
        out: &mut Vec<String>,
    ) {
        let Some(schema) = schema.as_object() else {
            return;
        };

        // Siblings of `$ref` are ignored.
        if let Some(reference) = schema.get("$ref").and_then(Value::as_str) {
            if depth >= MAX_REF_DEPTH {
                out.push(format!("{}: $ref chain deeper than {}", path, MAX_REF_DEPTH));
                return;
            }
            match self.resolve(reference, root) {
                Some((target, base)) => self.check(value, target, base, path, depth + 1, out),
                None => out.push(format!("{}: unresolved $ref '{}'", path, reference)),
            }
            return;
        }

        if let Some(expected) = schema.get("type") {
            let ok = match expected {
                Value::String(t) => type_matches(value, t),
                Value::Array(ts) => ts
                    .iter()
                    .filter_map(Value::as_str)
                    .any(|t| type_matches(value, t)),
                _ => true,
            };
            if !ok {
                out.push(format!("{}: expected type {}", path, expected));
                return;
            }
        }

        if let Some(Value::Array(allowed)) = schema.get("enum") {
            if !allowed.contains(value) {
                out.push(format!("{}: {} is not an allowed value", path, value));
            }
        }

        if let Some(obj) = value.as_object() {
            if let Some(Value::Array(required)) = schema.get("required") {
                for key in required.iter().filter_map(Value::as_str) {
                    if !obj.contains_key(key) {
                        out.push(format!("{}: missing required property '{}'", path, key));
                    }
                }
            }
            if let Some(Value::Object(props)) = schema.get("properties") {
                for (key, sub) in props {
                    if let Some(v) = obj.get(key) {
                        self.check(v, sub, root, &format!("{}.{}", path, key), depth, out);
                    }
                }
            }
        }

        if let (Some(items), Some(item_schema)) = (value.as_array(), schema.get("items")) {
            for (i, item) in items.iter().enumerate() {
                self.check(item, item_schema, root, &format!("{}[{}]", path, i), depth, out);
            }
        }

        if let Some(Value::Array(all)) = schema.get("allOf") {
            for sub in all {
                self.check(value, sub, root, path, depth, out);
            }
        }
        for (keyword, exactly_one) in [("anyOf", false), ("oneOf", true)] {
            let Some(Value::Array(alternatives)) = schema.get(keyword) else {
                continue;
            };
            let matching = alternatives
                .iter()
                .filter(|sub| {
                    let mut scratch = Vec::new();
                    self.check(value, sub, root, path, depth, &mut scratch);
                    scratch.is_empty()
                })
                .count();
            let ok = if exactly_one { matching == 1 } else { matching > 0 };
            if !ok {
                out.push(format!(
                    "{}: matches {} of {} {} alternatives",
                    path,
                    matching,
                    alternatives.len(),
                    keyword
                ));
            }
        }
    }
}

fn type_matches(value: &Value, expected: &str) -> bool {
    match expected {
        "object" => value.is_object(),
        "array" => value.is_array(),
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "null" => value.is_null(),
        _ => true,
    }
}
