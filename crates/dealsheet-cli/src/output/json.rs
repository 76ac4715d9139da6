use dealsheet_core::error::DealsheetError;
use serde::Serialize;

pub fn print<T: Serialize>(value: &T) -> Result<(), DealsheetError> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{json}");
    Ok(())
}
