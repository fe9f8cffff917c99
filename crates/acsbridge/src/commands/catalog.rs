//! `catalog`: logical keys and their candidate paths. Needs no ACS.

use tabled::Tabled;

use acsbridge_core::{CatalogEntry, PathCatalog};

use crate::cli::{CatalogArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct CatalogRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Type")]
    wire_type: String,
    #[tabled(rename = "RW")]
    rw: &'static str,
    #[tabled(rename = "Description")]
    label: String,
    #[tabled(rename = "Paths")]
    paths: usize,
}

impl From<&CatalogEntry> for CatalogRow {
    fn from(e: &CatalogEntry) -> Self {
        Self {
            key: e.key.to_string(),
            category: e.category.to_string(),
            wire_type: e.value.wire_type.to_string(),
            rw: if e.is_writable() { "rw" } else { "ro" },
            label: e.label.clone(),
            paths: e.read.len(),
        }
    }
}

pub fn handle(catalog: &PathCatalog, args: &CatalogArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let entries: Vec<&CatalogEntry> = catalog
        .entries()
        .filter(|e| args.category.is_none_or(|c| e.category == c))
        .collect();

    let out = output::render_list(
        &global.output,
        &entries,
        |e| CatalogRow::from(*e),
        |e| e.key.to_string(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
