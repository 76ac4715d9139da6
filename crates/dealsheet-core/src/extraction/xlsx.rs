use std::io::Cursor;

use calamine::{Data, Reader, Xlsx};
use log::{debug, info};
use rust_decimal::Decimal;

use crate::error::DealsheetError;
use crate::extraction::{build_worksheet, WorkbookReader};
use crate::model::{CellValue, Worksheet};

/// `.xlsx` reader backed by calamine.
#[derive(Debug, Clone, Copy, Default)]
pub struct XlsxReader;

impl WorkbookReader for XlsxReader {
    fn read_workbook(&self, bytes: &[u8]) -> Result<Vec<Worksheet>, DealsheetError> {
        let cursor = Cursor::new(bytes);
        let mut workbook: Xlsx<_> = calamine::open_workbook_from_rs(cursor)
            .map_err(|e| DealsheetError::WorkbookRead(format!("failed to open xlsx: {e}")))?;

        let merged_loaded = match workbook.load_merged_regions() {
            Ok(()) => true,
            Err(e) => {
                debug!("xlsx: merged regions unavailable: {e}");
                false
            }
        };

        let mut sheets = Vec::new();
        for name in workbook.sheet_names() {
            let range = workbook.worksheet_range(&name).map_err(|e| {
                DealsheetError::WorkbookRead(format!("sheet '{name}' unreadable: {e}"))
            })?;

            // Ranges start at the first used cell; pad so indices match the sheet.
            let (top, left) = range
                .start()
                .map_or((0, 0), |(r, c)| (r as usize, c as usize));
            let mut cells: Vec<Vec<CellValue>> = vec![Vec::new(); top];
            for row in range.rows() {
                let mut out = vec![CellValue::Empty; left];
                out.extend(row.iter().map(convert_cell));
                cells.push(out);
            }

            let has_formulas = workbook
                .worksheet_formula(&name)
                .map(|formulas| formulas.used_cells().any(|(_, _, f)| !f.is_empty()))
                .unwrap_or(false);
            let has_merged_cells =
                merged_loaded && !workbook.merged_regions_by_sheet(&name).is_empty();

            let sheet = build_worksheet(name.clone(), cells, has_formulas, has_merged_cells);
            debug!(
                "xlsx: '{}' {}x{}, header row {:?}, periods {:?}",
                sheet.name, sheet.row_count, sheet.column_count, sheet.header_row, sheet.periods
            );
            sheets.push(sheet);
        }

        info!("xlsx: read {} worksheets", sheets.len());
        Ok(sheets)
    }

    fn backend_name(&self) -> &str {
        "calamine-xlsx"
    }
}

fn convert_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::from(s.as_str()),
        Data::Float(f) => CellValue::Number(f64_to_decimal(*f)),
        Data::Int(i) => CellValue::Number(Decimal::from(*i)),
        Data::Bool(b) => CellValue::Text(b.to_string()),
        Data::Error(_) => CellValue::Empty,
        other => CellValue::from(other.to_string().as_str()),
    }
}

/// Convert f64 to Decimal via its shortest string form, so 0.085 stays 0.085.
fn f64_to_decimal(f: f64) -> Decimal {
    format!("{f}")
        .parse::<Decimal>()
        .unwrap_or_else(|_| Decimal::try_from(f).unwrap_or_default())
}
