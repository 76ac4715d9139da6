use dealsheet_core::classify::classify_sheets;
use dealsheet_core::error::DealsheetError;
use dealsheet_core::extraction::{WorkbookReader, XlsxReader};
use dealsheet_core::rules::builtin;
use std::path::PathBuf;

use crate::output;

pub fn run(input_file: PathBuf, output_format: &str, verbose: bool) -> Result<(), DealsheetError> {
    let bytes = std::fs::read(&input_file)?;
    let mut sheets = XlsxReader.read_workbook(&bytes)?;
    let results = classify_sheets(&mut sheets, builtin::default_vocabulary());

    match output_format {
        "json" => output::json::print(&results)?,
        _ => output::table::print_classifications(&results, verbose),
    }

    Ok(())
}
