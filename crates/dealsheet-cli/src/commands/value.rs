use dealsheet_core::error::DealsheetError;
use dealsheet_core::valuation::{run_request, ValuationRequest};
use std::path::PathBuf;

use crate::output;

pub fn run(request_file: PathBuf, output_format: &str) -> Result<(), DealsheetError> {
    let json = std::fs::read(&request_file)?;
    let request: ValuationRequest = serde_json::from_slice(&json)?;
    let summary = run_request(&request)?;

    match output_format {
        "json" => output::json::print(&summary)?,
        _ => output::table::print_valuation(&summary),
    }

    Ok(())
}
