//! Integration tests for the extract() end-to-end pipeline.
//!
//! Uses a MockReader that returns pre-built worksheets, so these tests run
//! without any workbook files.

use dealsheet_core::config::ExtractOptions;
use dealsheet_core::error::DealsheetError;
use dealsheet_core::extraction::WorkbookReader;
use dealsheet_core::ledger::LedgerMappingCache;
use dealsheet_core::model::{LineCategory, PropertyType, RateBasis, SheetType, Worksheet};
use dealsheet_core::resolve::BedSource;
use dealsheet_core::valuation::{run_request, ValuationRequest};
use dealsheet_core::warnings::Stage;
use dealsheet_core::{extract, extract_bytes, extract_with_cache};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

struct MockReader {
    sheets: Vec<Worksheet>,
}

impl WorkbookReader for MockReader {
    fn read_workbook(&self, _bytes: &[u8]) -> Result<Vec<Worksheet>, DealsheetError> {
        Ok(self.sheets.clone())
    }

    fn backend_name(&self) -> &str {
        "mock"
    }
}

fn mapping_sheet() -> Worksheet {
    Worksheet::from_rows(
        "GL Mapping",
        &[
            &["GL Code", "Description"],
            &["400110", "Medicare Revenue"],
            &["400210", "Medicaid Revenue"],
            &["500100", "Nursing Wages"],
        ],
    )
}

fn statement_sheet() -> Worksheet {
    Worksheet::from_rows(
        "Sunrise SNF T12",
        &[
            &["Code", "Description", "T12 Total"],
            &["400110", "Medicare Part A", "1,200,000"],
            &["400210", "Medicaid", "800,000"],
            &["", "Total Revenue", "2,000,000"],
            &["500100", "Nursing", "1,100,000"],
            &["", "Total Operating Expenses", "1,100,000"],
        ],
    )
}

fn valuation_sheet() -> Worksheet {
    Worksheet::from_rows(
        "Valuation",
        &[
            &["Facility", "Beds", "EBITDA", "Cap Rate", "Value"],
            &["Owned – Skilled"],
            &["Sunrise SNF", "120 beds", "2,000,000", "0.085", "23,529,412"],
            &["Meadow View", "90", "900,000", "0.10", ""],
            &["Closed Wing", "0", "100,000", "0.10", ""],
        ],
    )
}

fn census_sheet() -> Worksheet {
    Worksheet::from_rows(
        "Census",
        &[
            &["Census Summary"],
            &["Facility", "Licensed Beds", "Occupancy"],
            &["Sunrise SNF", "122", "91%"],
            &["Meadow View", "90", "85%"],
        ],
    )
}

fn workbook() -> Vec<Worksheet> {
    vec![
        mapping_sheet(),
        statement_sheet(),
        valuation_sheet(),
        census_sheet(),
    ]
}

fn valuing_options() -> ExtractOptions {
    ExtractOptions {
        valuation: Some(Default::default()),
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// Ledger mapping flows into statement line items
// ---------------------------------------------------------------------------
#[test]
fn ledger_mapped_line_item_counted_once() {
    let result = extract(workbook(), &ExtractOptions::default()).unwrap();

    assert!(result.ledger_mapping.is_some());
    assert_eq!(result.statements.len(), 1);
    let section = &result.statements[0];
    assert_eq!(section.facility_name, "Sunrise SNF");

    let medicare: Vec<_> = section
        .line_items
        .iter()
        .filter(|i| i.ledger_code.as_deref() == Some("400110"))
        .collect();
    assert_eq!(medicare.len(), 1);
    assert_eq!(medicare[0].subcategory, "medicare_revenue");
    assert_eq!(medicare[0].annual, dec!(1200000));
    assert!(medicare[0].confidence >= dec!(0.9));

    assert_eq!(section.summary.total_revenue, Some(dec!(2000000)));
    let revenue_sum: Decimal = section
        .line_items
        .iter()
        .filter(|i| i.category == LineCategory::Revenue)
        .map(|i| i.annual)
        .sum();
    assert_eq!(revenue_sum, dec!(2000000));
}

// ---------------------------------------------------------------------------
// Valuation sheet: section headers, bed filter, rate basis
// ---------------------------------------------------------------------------
#[test]
fn valuation_entries_from_workbook() {
    let result = extract(workbook(), &ExtractOptions::default()).unwrap();
    let valuation = result.valuation.as_ref().unwrap();

    assert_eq!(valuation.entries.len(), 2);
    assert!(valuation.entries.iter().all(|e| e.beds > 0));

    let sunrise = &valuation.entries[0];
    assert_eq!(sunrise.property_type, PropertyType::OwnedSkilled);
    assert_eq!(sunrise.beds, 120);
    assert_eq!(sunrise.rate, RateBasis::CapRate(dec!(0.085)));
    let value = sunrise.current_year.value.unwrap();
    assert!((value - dec!(23529412)).abs() <= dec!(1));

    assert_eq!(valuation.portfolio_total.count, 2);
    assert_eq!(valuation.portfolio_total.beds, 210);
}

#[test]
fn rate_basis_is_exclusive() {
    let rates = [
        ("Alder House", "0.08"),
        ("Birchwood Manor", "0.5"),
        ("Cedar Ridge", "1"),
        ("Dogwood Terrace", "1.01"),
        ("Elmhurst", "7.5"),
        ("Fir Crest", "12"),
    ];
    let mut rows: Vec<Vec<String>> = vec![vec![
        "Facility".into(),
        "Beds".into(),
        "EBITDA".into(),
        "Rate".into(),
    ]];
    for (name, rate) in rates {
        rows.push(vec![
            name.to_string(),
            "100".into(),
            "1,000,000".into(),
            rate.to_string(),
        ]);
    }
    let row_refs: Vec<Vec<&str>> = rows
        .iter()
        .map(|r| r.iter().map(String::as_str).collect())
        .collect();
    let slices: Vec<&[&str]> = row_refs.iter().map(Vec::as_slice).collect();
    let sheet = Worksheet::from_rows("Valuation", &slices);

    let result = extract(vec![sheet], &ExtractOptions::default()).unwrap();
    let entries = &result.valuation.as_ref().unwrap().entries;
    assert_eq!(entries.len(), rates.len());
    for entry in entries {
        let cap = entry.rate.cap_rate();
        let mult = entry.rate.multiplier();
        assert!(cap.is_some() != mult.is_some());
        if let Some(m) = mult {
            assert!(m > Decimal::ONE);
        }
    }
    // 1 and 1.01 sit inside the default band
    let near_one = result
        .warnings
        .iter()
        .filter(|w| w.stage == Stage::ValuationEntry && w.message.contains("of 1.0"))
        .count();
    assert_eq!(near_one, 2);
}

// ---------------------------------------------------------------------------
// Identity resolution and bed precedence
// ---------------------------------------------------------------------------
#[test]
fn facilities_resolved_across_sheets() {
    let result = extract(workbook(), &ExtractOptions::default()).unwrap();
    let facilities = &result.resolution.facilities;
    assert_eq!(facilities.len(), 2);

    let sunrise = facilities.iter().find(|f| f.name == "Sunrise SNF").unwrap();
    assert_eq!(sunrise.beds, Some(122));
    assert_eq!(sunrise.bed_source, Some(BedSource::Classification));
    assert!(sunrise.summary.is_some());
    assert!(sunrise.valuation_entry.is_some());

    let meadow = facilities.iter().find(|f| f.name == "Meadow View").unwrap();
    assert_eq!(meadow.beds, Some(90));
    assert_eq!(meadow.property_type, Some(PropertyType::OwnedSkilled));
}

#[test]
fn unknown_sheet_with_mapped_codes_is_a_statement() {
    let harbor = Worksheet::from_rows(
        "Harbor Point",
        &[
            &["400110", "Medicare A", "500,000"],
            &["500100", "Nursing", "300,000"],
        ],
    );
    let result = extract(vec![mapping_sheet(), harbor], &ExtractOptions::default()).unwrap();
    assert_eq!(result.sheets[1].sheet_type, SheetType::Unknown);
    assert_eq!(result.statements.len(), 1);
    assert_eq!(result.statements[0].facility_name, "Harbor Point");
}

// ---------------------------------------------------------------------------
// Portfolio rollups and delegated facility sheets
// ---------------------------------------------------------------------------
#[test]
fn portfolio_scenario_with_delegated_facility() {
    let rollup = Worksheet::from_rows(
        "Current State",
        &[
            &["Portfolio Rollup"],
            &["Description", "Annual", "Monthly", "PPD"],
            &["ID - Owned SNF"],
            &["Medicare", "1,200,000", "100,000", "600"],
            &["Total Revenue", "1,200,000", "100,000", "600"],
            &["Nursing", "700,000", "58,333", "350"],
            &["EBITDA", "500,000", "41,667", "250"],
            &["Leased"],
            &["Medicaid", "1,000,000", "", ""],
            &["Total Revenue", "1,000,000", "", ""],
            &["Nursing", "900,000", "", ""],
            &["EBITDA", "100,000", "", ""],
        ],
    );
    let harbor = Worksheet::from_rows(
        "Harbor Point",
        &[
            &["Description", "Annual"],
            &["Medicare", "400,000"],
            &["Medicaid", "600,000"],
            &["Private Pay", "150,000"],
            &["Nursing", "500,000"],
            &["Dietary", "90,000"],
            &["Housekeeping", "40,000"],
            &["Laundry", "20,000"],
            &["Activities", "10,000"],
            &["Rent", "120,000"],
            &["Depreciation", "30,000"],
            &["Interest", "15,000"],
        ],
    );

    let result = extract(vec![rollup, harbor], &ExtractOptions::default()).unwrap();
    let portfolio = result.portfolio.as_ref().unwrap();
    assert_eq!(portfolio.scenarios.len(), 1);
    let scenario = &portfolio.scenarios[0];
    assert_eq!(scenario.groups.len(), 2);
    assert_eq!(scenario.groups[0].geography.as_deref(), Some("ID"));
    assert_eq!(scenario.groups[1].financials.ebitda.annual, dec!(100000));

    assert!(result
        .resolution
        .facilities
        .iter()
        .any(|f| f.name == "Harbor Point"));
}

// ---------------------------------------------------------------------------
// Valuation across resolved facilities
// ---------------------------------------------------------------------------
#[test]
fn facilities_valued_with_default_plan() {
    let result = extract(workbook(), &valuing_options()).unwrap();
    assert_eq!(result.valuations.len(), 2);
    for summary in &result.valuations {
        let min = summary.methods.iter().map(|m| m.value).min().unwrap();
        let max = summary.methods.iter().map(|m| m.value).max().unwrap();
        assert!(summary.recommended_value >= min);
        assert!(summary.recommended_value <= max);
        assert!(summary.value_low <= summary.recommended_value);
        assert!(summary.value_high >= summary.recommended_value);
    }
}

#[test]
fn cap_rate_request_and_sensitivity() {
    let request: ValuationRequest = serde_json::from_str(
        r#"{
            "inputs": { "noi": "1000000" },
            "methods": [{ "method": "cap_rate", "cap_rate": "0.10" }],
            "sensitivity": {}
        }"#,
    )
    .unwrap();
    let summary = run_request(&request).unwrap();
    assert_eq!(summary.recommended_value, dec!(10000000));

    let grid = &summary.sensitivity[0];
    let point = grid.points.iter().find(|p| p.input == dec!(0.095)).unwrap();
    assert!((point.value - dec!(10526316)).abs() < dec!(1));
}

// ---------------------------------------------------------------------------
// Warnings and structural failures
// ---------------------------------------------------------------------------
#[test]
fn empty_sheet_skipped_with_warning() {
    let mut sheets = workbook();
    sheets.push(Worksheet::from_rows("Notes", &[&["", ""]]));
    let result = extract(sheets, &ExtractOptions::default()).unwrap();
    assert!(result
        .warnings
        .iter()
        .any(|w| w.stage == Stage::Classify && w.sheet.as_deref() == Some("Notes")));
    assert_eq!(result.sheets.len(), 4);
}

#[test]
fn all_empty_sheets_is_an_error() {
    let sheets = vec![
        Worksheet::from_rows("A", &[&[""]]),
        Worksheet::new("B", Vec::new()),
    ];
    let err = extract(sheets, &ExtractOptions::default()).unwrap_err();
    assert!(matches!(err, DealsheetError::NoUsableSheets));
}

#[test]
fn unrecognised_sheet_still_returns_result() {
    let sheet = Worksheet::from_rows("Cover", &[&["Project Bluebird"], &["Confidential"]]);
    let result = extract(vec![sheet], &ExtractOptions::default()).unwrap();
    assert_eq!(result.sheets[0].sheet_type, SheetType::Unknown);
    assert!(result.statements.is_empty());
    assert!(result.resolution.facilities.is_empty());
}

#[test]
fn invalid_options_rejected_before_extraction() {
    let mut options = ExtractOptions::default();
    options.resolver.review_threshold = dec!(0.9);
    options.resolver.accept_threshold = dec!(0.5);
    assert!(matches!(
        extract(workbook(), &options),
        Err(DealsheetError::ConfigInvalid(_))
    ));
}

// ---------------------------------------------------------------------------
// Determinism and caching
// ---------------------------------------------------------------------------
#[test]
fn extraction_is_deterministic() {
    let reader = MockReader { sheets: workbook() };
    let options = valuing_options();
    let first = extract_bytes(&[], &reader, &options).unwrap();
    let second = extract_bytes(&[], &reader, &options).unwrap();
    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn classification_ignores_row_order() {
    let census = census_sheet();
    let mut reversed = census.clone();
    reversed.cells.reverse();
    let a = extract(vec![census], &ExtractOptions::default()).unwrap();
    let b = extract(vec![reversed], &ExtractOptions::default()).unwrap();
    assert_eq!(a.sheets[0].sheet_type, SheetType::Census);
    assert_eq!(a.sheets[0].sheet_type, b.sheets[0].sheet_type);
}

#[test]
fn mapping_cache_reused_until_sheet_changes() {
    let mut cache = LedgerMappingCache::new();
    let options = ExtractOptions::default();
    extract_with_cache(workbook(), &options, &mut cache).unwrap();
    extract_with_cache(workbook(), &options, &mut cache).unwrap();
    assert_eq!(cache.hits(), 1);

    let mut changed = workbook();
    changed[0] = Worksheet::from_rows(
        "GL Mapping",
        &[&["GL Code", "Description"], &["400110", "Medicare Part A Revenue"]],
    );
    extract_with_cache(changed, &options, &mut cache).unwrap();
    assert_eq!(cache.hits(), 1);
}
