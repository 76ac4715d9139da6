use dealsheet_core::config::{load_options, ExtractOptions};
use dealsheet_core::display::to_line_item_view;
use dealsheet_core::error::DealsheetError;
use dealsheet_core::extraction::XlsxReader;
use std::path::PathBuf;

use crate::output;

pub fn run(
    input_file: PathBuf,
    output_format: &str,
    output_file: Option<PathBuf>,
    config: Option<PathBuf>,
    lines: bool,
) -> Result<(), DealsheetError> {
    let options = match config {
        Some(path) => load_options(&path)?,
        None => ExtractOptions::default(),
    };

    let bytes = std::fs::read(&input_file)?;
    let result = dealsheet_core::extract_bytes(&bytes, &XlsxReader, &options)?;

    if let Some(path) = output_file {
        // Always write JSON when saving to file
        let json = serde_json::to_string_pretty(&result)?;
        std::fs::write(&path, json)?;
        eprintln!(
            "Extracted {} facilities from {} sheets, written to {}",
            result.resolution.facilities.len(),
            result.sheets.len(),
            path.display()
        );
        for w in &result.warnings {
            eprintln!("  warning: {w}");
        }
        return Ok(());
    }

    match (output_format, lines) {
        ("json", true) => output::json::print(&to_line_item_view(&result))?,
        ("json", false) => output::json::print(&result)?,
        (_, true) => output::table::print_line_items(&to_line_item_view(&result)),
        (_, false) => output::table::print_extraction(&result),
    }

    Ok(())
}
