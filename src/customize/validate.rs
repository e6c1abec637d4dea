use crate::library::types::{self, is_dna, record_collection, PartType};
use crate::library::{json_kind, LibraryDocument};
use serde::Serialize;
use serde_json::Value;

/// Collections every library must contain unless the caller asks for others.
pub const DEFAULT_REQUIRED: [&str; 1] = [types::HEADER];

/// Outcome of a validation or customization step. Errors make the report
/// invalid; warnings never do. `dropped` names parts discarded in lenient mode.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub dropped: Vec<String>,
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
            dropped: Vec::new(),
        }
    }
}

impl ValidationReport {
    pub fn error(&mut self, msg: impl Into<String>) {
        self.valid = false;
        self.errors.push(msg.into());
    }

    pub fn warn(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    pub fn merge(&mut self, other: ValidationReport) {
        self.valid &= other.valid;
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
        self.dropped.extend(other.dropped);
    }

    /// Reports only warnings: errors are demoted, validity restored.
    pub fn demote_errors(mut self) -> Self {
        let errors = std::mem::take(&mut self.errors);
        self.warnings.extend(errors);
        self.valid = true;
        self
    }
}

const REQUIRED_PART_FIELDS: [&str; 3] = ["name", "type", "dnasequence"];

/// Checks one part record. Missing type-specific parameters are warnings.
pub fn validate_part(part: &Value) -> ValidationReport {
    let mut report = ValidationReport::default();

    let Some(obj) = part.as_object() else {
        report.error(format!("part must be an object, got {}", json_kind(part)));
        return report;
    };

    for field in REQUIRED_PART_FIELDS {
        if !obj.contains_key(field) {
            report.error(format!("missing required field '{}'", field));
        }
    }

    let type_name = obj.get("type").and_then(Value::as_str);
    match (obj.get("type"), type_name) {
        (None, _) => {}
        (Some(_), Some(t)) if t.parse::<PartType>().is_ok() => {}
        (Some(other), _) => report.error(format!(
            "invalid part type {} (expected one of: {})",
            other,
            PartType::vocabulary().join(", ")
        )),
    }

    if let Some(seq) = obj.get("dnasequence") {
        match seq.as_str() {
            Some(s) if is_dna(s) => {}
            Some(_) => report.error("dnasequence contains characters other than A, C, G, T"),
            None => report.error(format!("dnasequence must be a string, got {}", json_kind(seq))),
        }
    }

    match obj.get("parameters") {
        Some(Value::Object(params)) => {
            if let Some(t) = type_name {
                for (name, _) in PartType::default_parameters(t) {
                    if !params.contains_key(*name) {
                        report.warn(format!("{} part is missing parameter '{}'", t, name));
                    }
                }
            }
        }
        Some(other) => report.error(format!(
            "parameters must be a mapping, got {}",
            json_kind(other)
        )),
        None => {}
    }

    report
}

/// True when the part has the fields a lenient caller needs to keep it.
pub fn is_minimally_complete(part: &Value) -> bool {
    part.as_object()
        .map(|o| REQUIRED_PART_FIELDS.iter().all(|f| o.contains_key(*f)))
        .unwrap_or(false)
}

/// Checks raw JSON before it becomes a document.
pub fn validate_value(value: &Value, required: &[&str]) -> ValidationReport {
    match value {
        Value::Array(records) => {
            validate_document(&LibraryDocument::new(records.clone()), required)
        }
        other => {
            let mut report = ValidationReport::default();
            report.error(format!(
                "library must be a sequence of records, got {}",
                json_kind(other)
            ));
            report
        }
    }
}

pub fn validate_document(doc: &LibraryDocument, required: &[&str]) -> ValidationReport {
    let mut report = ValidationReport::default();

    for name in required {
        if !doc.has_collection(name) {
            report.error(format!("library is missing required collection '{}'", name));
        }
    }

    if doc.has_collection(types::HEADER) && doc.header().is_none() {
        report.warn("header is not the first record");
    }

    for (i, record) in doc.records().iter().enumerate() {
        if !record.is_object() {
            report.error(format!("record {} is {}, not an object", i, json_kind(record)));
            continue;
        }
        match record_collection(record) {
            Some(c) if !c.is_empty() => {}
            _ => report.warn(format!("record {} has no collection name", i)),
        }
    }

    report
}
