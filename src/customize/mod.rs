pub mod add;
pub mod filter;
pub mod modify;
pub mod schema;
pub mod validate;

pub use self::add::add_parts;
pub use self::filter::{filter_collection, prune_dependents};
pub use self::modify::{modify_parts, modify_response_parameters, PartPatch};
pub use self::schema::SchemaSet;
pub use self::validate::{validate_document, validate_part, validate_value, ValidationReport};

use crate::error::{ForgeError, ForgeResult};
use crate::library::types::{self, HillParameters};
use crate::library::LibraryDocument;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// A transformed copy of a library and what happened while producing it.
#[derive(Debug, Clone)]
pub struct Customized {
    pub document: LibraryDocument,
    pub report: ValidationReport,
}

impl Customized {
    /// Folds this step's report into `report` and yields the document.
    pub fn absorb_into(self, report: &mut ValidationReport) -> LibraryDocument {
        report.merge(self.report);
        self.document
    }
}

/// Everything `create_custom_document` can do to a library in one call.
/// `None` selections mean "keep everything".
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomizationRequest {
    pub selected_gates: Option<Vec<String>>,
    pub selected_parts: Option<Vec<String>>,
    pub modified_parts: BTreeMap<String, PartPatch>,
    pub response_parameters: BTreeMap<String, HillParameters>,
    pub new_parts: Vec<Value>,
    /// Remove structures, gates and models orphaned by part filtering.
    /// On unless a request turns it off.
    pub cascade: bool,
}

impl Default for CustomizationRequest {
    fn default() -> Self {
        Self {
            selected_gates: None,
            selected_parts: None,
            modified_parts: BTreeMap::new(),
            response_parameters: BTreeMap::new(),
            new_parts: Vec::new(),
            cascade: true,
        }
    }
}

impl CustomizationRequest {
    pub fn load<P: AsRef<Path>>(path: P) -> ForgeResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ForgeError::Config(format!(
                "Could not read customization request '{}': {}",
                path.display(),
                e
            ))
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn is_empty(&self) -> bool {
        self.selected_gates.is_none()
            && self.selected_parts.is_none()
            && self.modified_parts.is_empty()
            && self.response_parameters.is_empty()
            && self.new_parts.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Customizer {
    required: Vec<String>,
    schemas: Option<SchemaSet>,
    strict: bool,
}

impl Default for Customizer {
    fn default() -> Self {
        Self {
            required: validate::DEFAULT_REQUIRED
                .iter()
                .map(|s| s.to_string())
                .collect(),
            schemas: None,
            strict: false,
        }
    }
}

impl Customizer {
    pub fn new(strict: bool) -> Self {
        Self {
            strict,
            ..Self::default()
        }
    }

    pub fn with_schemas(mut self, schemas: SchemaSet) -> Self {
        self.schemas = Some(schemas);
        self
    }

    pub fn with_required(mut self, required: Vec<String>) -> Self {
        self.required = required;
        self
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Filter gates, filter parts, cascade, modify, add, then validate.
    pub fn customize(
        &self,
        doc: &LibraryDocument,
        request: &CustomizationRequest,
    ) -> ForgeResult<Customized> {
        let mut report = ValidationReport::default();
        let mut current = doc.clone();

        if let Some(gates) = &request.selected_gates {
            let keep: HashSet<String> = gates.iter().cloned().collect();
            current = filter_collection(&current, types::GATES, &keep).absorb_into(&mut report);
        }
        if let Some(parts) = &request.selected_parts {
            let keep: HashSet<String> = parts.iter().cloned().collect();
            current = filter_collection(&current, types::PARTS, &keep).absorb_into(&mut report);
            if request.cascade {
                current = prune_dependents(&current).absorb_into(&mut report);
            }
        }
        if !request.modified_parts.is_empty() {
            current = modify_parts(&current, &request.modified_parts).absorb_into(&mut report);
        }
        if !request.response_parameters.is_empty() {
            current = modify_response_parameters(&current, &request.response_parameters)
                .absorb_into(&mut report);
        }
        if !request.new_parts.is_empty() {
            current =
                add_parts(&current, &request.new_parts, self.strict)?.absorb_into(&mut report);
        }

        let required: Vec<&str> = self.required.iter().map(String::as_str).collect();
        let checked = validate_document(&current, &required);
        if !checked.valid {
            if self.strict {
                return Err(ForgeError::Validation(checked.errors.join("; ")));
            }
            warn!("Customized library is incomplete: {}", checked.errors.join("; "));
        }
        report.merge(checked);

        if let Some(schemas) = &self.schemas {
            for finding in schemas.check_document(&current) {
                warn!("Schema: {}", finding);
                report.warn(finding);
            }
        }

        Ok(Customized {
            document: current,
            report,
        })
    }

    /// Customizes `doc` and writes the result to `output`.
    pub fn create_custom_document<P: AsRef<Path>>(
        &self,
        doc: &LibraryDocument,
        request: &CustomizationRequest,
        output: P,
    ) -> ForgeResult<(PathBuf, ValidationReport)> {
        let customized = self.customize(doc, request)?;
        let path = output.as_ref().to_path_buf();
        customized.document.save(&path)?;
        info!(
            "💾 Custom library written to {} ({} warnings)",
            path.display(),
            customized.report.warnings.len()
        );
        Ok((path, customized.report))
    }

    /// Like [`Self::create_custom_document`], choosing a fresh file name in `dir`.
    pub fn create_in_dir<P: AsRef<Path>>(
        &self,
        doc: &LibraryDocument,
        request: &CustomizationRequest,
        dir: P,
    ) -> ForgeResult<(PathBuf, ValidationReport)> {
        self.create_custom_document(doc, request, unique_library_path(dir))
    }
}

/// `custom_library_<8 hex>.UCF.json` inside `dir`.
pub fn unique_library_path<P: AsRef<Path>>(dir: P) -> PathBuf {
    let id = uuid::Uuid::new_v4().simple().to_string();
    dir.as_ref()
        .join(format!("custom_library_{}.UCF.json", &id[..8]))
}
