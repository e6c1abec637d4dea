use crate::reports;
use clap::Args;
use geneforge::customize::{CustomizationRequest, Customizer, SchemaSet};
use geneforge::error::ForgeResult;
use geneforge::library::LibraryDocument;
use std::path::PathBuf;

#[derive(Args, Debug, Clone)]
pub struct CustomizeArgs {
    #[arg(short, long)]
    pub library: PathBuf,

    /// JSON customization request (selected_gates, selected_parts, modified_parts, ...)
    #[arg(short, long)]
    pub request: PathBuf,

    /// Output file. Defaults to a fresh name inside --output-dir.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[arg(long, default_value = "outputs/custom_libraries")]
    pub output_dir: PathBuf,

    /// Directory of `<collection>.schema.json` files for best-effort checks
    #[arg(long)]
    pub schema_dir: Option<PathBuf>,

    /// Reject the whole request on the first invalid part
    #[arg(long, default_value_t = false)]
    pub strict: bool,
}

pub fn run(args: CustomizeArgs) -> ForgeResult<bool> {
    let library = LibraryDocument::load(&args.library)?;
    let request = CustomizationRequest::load(&args.request)?;
    if request.is_empty() {
        println!("⚠️  Request changes nothing; writing an unmodified copy.");
    }

    let mut customizer = Customizer::new(args.strict);
    if let Some(dir) = &args.schema_dir {
        customizer = customizer.with_schemas(SchemaSet::load_dir(dir)?);
    }

    let (path, report) = match &args.output {
        Some(path) => customizer.create_custom_document(&library, &request, path)?,
        None => customizer.create_in_dir(&library, &request, &args.output_dir)?,
    };

    reports::print_validation_report("Customization", &report);
    println!("💾 Wrote {}", path.display());
    Ok(true)
}
