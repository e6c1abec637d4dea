use crate::reports;
use clap::Args;
use geneforge::customize::{validate_part, validate_value, SchemaSet};
use geneforge::error::{ForgeError, ForgeResult};
use geneforge::library::types::{record_id, PART_COLLECTIONS};
use geneforge::library::LibraryDocument;
use serde_json::Value;
use std::fs;
use std::path::PathBuf;

#[derive(Args, Debug, Clone)]
pub struct ValidateArgs {
    #[arg(short, long)]
    pub library: PathBuf,

    /// Collections that must be present
    #[arg(long, value_delimiter = ',', default_value = "header")]
    pub required: Vec<String>,

    /// Also validate every part record
    #[arg(long, default_value_t = false)]
    pub parts: bool,

    #[arg(long)]
    pub schema_dir: Option<PathBuf>,
}

pub fn run(args: ValidateArgs) -> ForgeResult<bool> {
    let content = fs::read_to_string(&args.library).map_err(|e| {
        ForgeError::Config(format!(
            "Could not read library '{}': {}",
            args.library.display(),
            e
        ))
    })?;
    let value: Value = serde_json::from_str(&content)?;

    let required: Vec<&str> = args.required.iter().map(String::as_str).collect();
    let mut report = validate_value(&value, &required);

    if let Ok(doc) = LibraryDocument::from_value(value) {
        if args.parts {
            let index = doc.index();
            for collection in PART_COLLECTIONS {
                for part in index.items(collection) {
                    let name = record_id(part).unwrap_or("<unnamed>").to_string();
                    let checked = validate_part(part);
                    for e in checked.errors {
                        report.error(format!("{}: {}", name, e));
                    }
                    for w in checked.warnings {
                        report.warn(format!("{}: {}", name, w));
                    }
                }
            }
        }
        if let Some(dir) = &args.schema_dir {
            for finding in SchemaSet::load_dir(dir)?.check_document(&doc) {
                report.warn(format!("schema {}", finding));
            }
        }
    }

    reports::print_validation_report(&args.library.display().to_string(), &report);
    Ok(report.valid)
}
