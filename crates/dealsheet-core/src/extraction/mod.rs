pub mod xlsx;

use crate::error::DealsheetError;
use crate::model::{CellValue, SheetMetadata, Worksheet};

pub use xlsx::XlsxReader;

/// Rows searched for the reader's header guess.
const HEADER_GUESS_ROWS: usize = 15;

const MONTHS: &[&str] = &[
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "sept", "oct", "nov", "dec",
    "january", "february", "march", "april", "june", "july", "august", "september", "october",
    "november", "december",
];

const PERIOD_MARKERS: &[&str] = &["t12", "t13", "ttm", "ytd"];

/// Trait for workbook backends that turn file bytes into worksheets.
pub trait WorkbookReader: Send + Sync {
    /// Read every worksheet, in workbook order.
    fn read_workbook(&self, bytes: &[u8]) -> Result<Vec<Worksheet>, DealsheetError>;

    /// Name of this backend (for diagnostics).
    fn backend_name(&self) -> &str;
}

/// Assemble a worksheet record from a cell matrix, filling in the header
/// guess, headers, detected periods and first data row.
pub fn build_worksheet(
    name: impl Into<String>,
    cells: Vec<Vec<CellValue>>,
    has_formulas: bool,
    has_merged_cells: bool,
) -> Worksheet {
    let mut sheet = Worksheet::new(name, cells);
    let header_row = guess_header_row(&sheet);
    sheet.header_row = header_row;
    if let Some(row) = header_row {
        sheet.headers = sheet.row(row).iter().map(|c| c.to_string()).collect();
    }
    sheet.periods = detect_periods(&sheet, header_row.unwrap_or(0));
    sheet.metadata = SheetMetadata {
        has_formulas,
        has_merged_cells,
        first_data_row: first_data_row(&sheet, header_row),
    };
    sheet
}

/// First row within the leading rows holding at least two text cells.
pub fn guess_header_row(sheet: &Worksheet) -> Option<usize> {
    (0..sheet.row_count.min(HEADER_GUESS_ROWS)).find(|&row| {
        sheet
            .row(row)
            .iter()
            .filter(|c| c.as_text().is_some() && c.as_number().is_none())
            .count()
            >= 2
    })
}

fn first_data_row(sheet: &Worksheet, header_row: Option<usize>) -> Option<usize> {
    let start = header_row.map_or(0, |r| r + 1);
    (start..sheet.row_count).find(|&row| sheet.row(row).iter().any(|c| c.as_number().is_some()))
}

/// Period labels found in the rows up to and including `through_row`:
/// month names, trailing-period markers and fiscal years, in first-seen order.
pub fn detect_periods(sheet: &Worksheet, through_row: usize) -> Vec<String> {
    let mut periods: Vec<String> = Vec::new();
    for row in 0..=through_row.min(sheet.row_count.saturating_sub(1)) {
        for cell in sheet.row(row) {
            let Some(text) = cell.as_text() else { continue };
            for label in period_labels(text) {
                if !periods.contains(&label) {
                    periods.push(label);
                }
            }
        }
    }
    periods
}

fn period_labels(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let tokens: Vec<&str> = lower
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();

    let mut labels = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i];
        if MONTHS.contains(&token) {
            // "Jan 2024" / "Jan-24" keep their year
            match tokens.get(i + 1).filter(|next| is_year_suffix(next)) {
                Some(year) => {
                    labels.push(format!("{} {}", capitalize(token), year));
                    i += 1;
                }
                None => labels.push(capitalize(token)),
            }
        } else if PERIOD_MARKERS.contains(&token) {
            labels.push(token.to_uppercase());
        } else if let Some(year) = fiscal_year(token) {
            labels.push(year);
        }
        i += 1;
    }
    labels
}

fn is_year_suffix(token: &str) -> bool {
    (token.len() == 2 || token.len() == 4) && token.chars().all(|c| c.is_ascii_digit())
}

/// "2024" or "fy2024"/"fy24" as "FY2024"/"FY24"; plain years stay bare.
fn fiscal_year(token: &str) -> Option<String> {
    let (prefix, digits) = match token.strip_prefix("fy") {
        Some(rest) => ("FY", rest),
        None => ("", token),
    };
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    match digits.len() {
        4 => {
            let year: u32 = digits.parse().ok()?;
            (1990..=2100).contains(&year).then(|| format!("{prefix}{digits}"))
        }
        2 if !prefix.is_empty() => Some(format!("{prefix}{digits}")),
        _ => None,
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_guess_and_first_data_row() {
        let sheet = build_worksheet(
            "T12",
            Worksheet::from_rows(
                "T12",
                &[
                    &["Sunrise SNF", "", ""],
                    &["Code", "Description", "Jan 2024"],
                    &["400110", "Medicare", "100,000"],
                ],
            )
            .cells,
            false,
            false,
        );
        assert_eq!(sheet.header_row, Some(1));
        assert_eq!(sheet.headers, vec!["Code", "Description", "Jan 2024"]);
        assert_eq!(sheet.metadata.first_data_row, Some(2));
    }

    #[test]
    fn test_period_labels() {
        assert_eq!(period_labels("Jan-24"), vec!["Jan 24"]);
        assert_eq!(period_labels("T12 Total"), vec!["T12"]);
        assert_eq!(period_labels("FY2023 vs FY24"), vec!["FY2023", "FY24"]);
        assert_eq!(period_labels("2024 EBITDA"), vec!["2024"]);
        assert!(period_labels("Beds 120").is_empty());
        assert!(period_labels("Account 400110").is_empty());
    }

    #[test]
    fn test_detect_periods_dedupes() {
        let sheet = Worksheet::from_rows(
            "P",
            &[&["", "March", "April", "YTD"], &["", "2024", "2024", ""]],
        );
        assert_eq!(detect_periods(&sheet, 1), vec!["March", "April", "YTD", "2024"]);
    }
}
