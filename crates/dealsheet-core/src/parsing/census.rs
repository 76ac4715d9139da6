use log::debug;

use crate::model::{FacilityClassification, Worksheet};
use crate::parsing::is_total_label;
use crate::parsing::layout::{
    ColumnSpec, ContentKind, ContentRule, ContentScan, HeaderScan, LayoutDetector,
};
use crate::parsing::normalize::canonical_facility_name;
use crate::parsing::values::{count_from_decimal, parse_count};
use crate::warnings::{push_warning, ExtractionWarning, Stage, WarningSeverity};

const CENSUS_SPECS: &[ColumnSpec] = &[
    ColumnSpec::required("beds", &["beds", "licensed", "units"])
        .excluding(&["per bed", "occupied", "available"]),
    ColumnSpec::required("name", &["facility", "property", "name", "community"])
        .excluding(&["type", "count"]),
];

/// Facility records from census-style listings.
pub fn parse_census_sheets(
    sheets: &[&Worksheet],
    header_rows: usize,
    warnings: &mut Vec<ExtractionWarning>,
) -> Vec<FacilityClassification> {
    sheets
        .iter()
        .flat_map(|sheet| parse_census_sheet(sheet, header_rows, warnings))
        .collect()
}

pub fn parse_census_sheet(
    sheet: &Worksheet,
    header_rows: usize,
    warnings: &mut Vec<ExtractionWarning>,
) -> Vec<FacilityClassification> {
    let layout = LayoutDetector::new()
        .then(HeaderScan {
            max_rows: header_rows,
        })
        .then(ContentScan::new(vec![
            ContentRule::new("beds", ContentKind::IntegerRange { min: 10, max: 500 }),
            ContentRule::new("name", ContentKind::LongText { min_len: 4 }),
        ]))
        .detect(sheet, CENSUS_SPECS);

    let Some(layout) = layout else {
        push_warning(
            warnings,
            Stage::Census,
            Some(&sheet.name),
            WarningSeverity::Info,
            "no facility listing columns found",
        );
        return Vec::new();
    };
    let (Some(name_col), Some(beds_col)) = (layout.get("name"), layout.get("beds")) else {
        return Vec::new();
    };

    let mut records = Vec::new();
    for row in layout.first_data_row..sheet.row_count {
        let Some(name) = sheet.text(row, name_col) else {
            continue;
        };
        if is_total_label(name) {
            continue;
        }
        let cell = sheet.cell(row, beds_col);
        let beds = cell
            .as_number()
            .and_then(count_from_decimal)
            .or_else(|| cell.as_text().and_then(parse_count))
            .filter(|b| *b > 0);
        // A listing row needs a bed count to tell it apart from notes.
        if beds.is_none() {
            continue;
        }
        records.push(FacilityClassification {
            facility_name: canonical_facility_name(name),
            sheet_name: sheet.name.clone(),
            beds,
        });
    }

    debug!(
        "census sheet '{}': {} facilities via {:?} layout",
        sheet.name,
        records.len(),
        layout.tier
    );
    records
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_listing() {
        let ws = Worksheet::from_rows(
            "Census",
            &[
                &["Facility", "State", "Licensed Beds", "Occupancy"],
                &["Sunrise SNF", "ID", "120", "88%"],
                &["Meadow View (OpCo)", "ID", "96", "91%"],
                &["Total", "", "216", ""],
            ],
        );
        let mut warnings = Vec::new();
        let records = parse_census_sheet(&ws, 15, &mut warnings);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].facility_name, "Sunrise SNF");
        assert_eq!(records[0].beds, Some(120));
        assert_eq!(records[1].facility_name, "Meadow View");
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_content_fallback() {
        let ws = Worksheet::from_rows(
            "Stats",
            &[&["Sunrise SNF", "120"], &["Meadow View", "96 beds"], &["notes", ""]],
        );
        let mut warnings = Vec::new();
        let records = parse_census_sheet(&ws, 15, &mut warnings);
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].beds, Some(96));
    }

    #[test]
    fn test_no_layout_warns() {
        let ws = Worksheet::from_rows("Census", &[&["x", "y"]]);
        let mut warnings = Vec::new();
        assert!(parse_census_sheet(&ws, 15, &mut warnings).is_empty());
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].stage, Stage::Census);
    }
}
