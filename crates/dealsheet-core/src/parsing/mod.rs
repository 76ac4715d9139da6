pub mod census;
pub mod layout;
pub mod normalize;
pub mod portfolio;
pub mod statement;
pub mod valuation;
pub mod values;

use crate::model::Worksheet;

/// "Total ...", "Subtotal ...", "Grand total ..." rows.
pub fn is_total_label(label: &str) -> bool {
    let lower = label.trim().to_lowercase();
    lower.starts_with("total")
        || lower.starts_with("subtotal")
        || lower.starts_with("sub-total")
        || lower.starts_with("sub total")
        || lower.starts_with("grand total")
}

/// Label of a row: the text at `label_col`, else the first text cell left of
/// `limit` that is not a ledger code.
pub fn row_label(sheet: &Worksheet, row: usize, label_col: Option<usize>, limit: usize) -> Option<&str> {
    if let Some(col) = label_col {
        let cell = sheet.cell(row, col);
        if let Some(text) = cell.as_text() {
            if cell.as_number().is_none() {
                return Some(text);
            }
        }
    }
    (0..limit.min(sheet.column_count)).find_map(|c| {
        let cell = sheet.cell(row, c);
        cell.as_text().filter(|t| {
            cell.as_number().is_none() && crate::ledger::normalize_code(t).is_none()
        })
    })
}

/// Rightmost numeric cell of a row, as (column, value).
pub fn last_number(sheet: &Worksheet, row: usize) -> Option<(usize, rust_decimal::Decimal)> {
    (0..sheet.column_count)
        .rev()
        .find_map(|c| sheet.number(row, c).map(|n| (c, n)))
}
