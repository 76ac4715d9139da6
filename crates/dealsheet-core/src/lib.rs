pub mod classify;
pub mod config;
pub mod display;
pub mod error;
pub mod extraction;
pub mod ledger;
pub mod model;
pub mod parsing;
pub mod resolve;
pub mod rules;
pub mod valuation;
pub mod warnings;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use classify::{classify_sheets, SheetClassification};
use config::ExtractOptions;
use error::DealsheetError;
use extraction::WorkbookReader;
use ledger::{find_mapping_sheet, normalize_code, LedgerMapping, LedgerMappingCache};
use model::{
    FacilityClassification, FacilitySection, PortfolioModel, SheetType, ValuationWorkbook,
    Worksheet,
};
use parsing::census::parse_census_sheets;
use parsing::portfolio::{find_scenario_sheets, PortfolioParser};
use parsing::statement::StatementParser;
use parsing::valuation::ValuationParser;
use resolve::{FacilityResolver, Resolution};
use valuation::{run_valuation, ValuationInputs, ValuationSummary};
use warnings::{push_warning, ExtractionWarning, Stage, WarningSeverity};

/// Rows of an unclassified sheet that must carry a mapped ledger code before
/// it is parsed as a statement.
const MIN_MAPPED_ROWS: usize = 2;

/// Everything one extraction run produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Classifier verdict per non-empty sheet, in workbook order.
    pub sheets: Vec<SheetClassification>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ledger_mapping: Option<LedgerMapping>,
    pub statements: Vec<FacilitySection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valuation: Option<ValuationWorkbook>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub portfolio: Option<PortfolioModel>,
    pub classifications: Vec<FacilityClassification>,
    pub resolution: Resolution,
    /// One per resolved facility that could be valued, when a valuation plan
    /// is configured.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub valuations: Vec<ValuationSummary>,
    pub warnings: Vec<ExtractionWarning>,
}

/// Main API entry point: read a workbook with `reader` and extract it.
pub fn extract_bytes(
    bytes: &[u8],
    reader: &dyn WorkbookReader,
    options: &ExtractOptions,
) -> Result<ExtractionResult, DealsheetError> {
    let sheets = reader.read_workbook(bytes)?;
    debug!("{} read {} sheets", reader.backend_name(), sheets.len());
    extract(sheets, options)
}

/// Run the full pipeline over in-memory worksheets.
pub fn extract(
    sheets: Vec<Worksheet>,
    options: &ExtractOptions,
) -> Result<ExtractionResult, DealsheetError> {
    extract_with_cache(sheets, options, &mut LedgerMappingCache::new())
}

/// [`extract`], reusing a ledger mapping from `cache` while the mapping
/// sheet is unchanged.
pub fn extract_with_cache(
    sheets: Vec<Worksheet>,
    options: &ExtractOptions,
    cache: &mut LedgerMappingCache,
) -> Result<ExtractionResult, DealsheetError> {
    options.validate()?;
    let mut warnings = Vec::new();

    // Empty sheets
    let mut usable = Vec::with_capacity(sheets.len());
    for sheet in sheets {
        if sheet.is_empty() {
            push_warning(
                &mut warnings,
                Stage::Classify,
                Some(&sheet.name),
                WarningSeverity::Info,
                "empty sheet skipped",
            );
        } else {
            usable.push(sheet);
        }
    }
    if usable.is_empty() {
        return Err(DealsheetError::NoUsableSheets);
    }

    // Classification
    let vocab = options.effective_vocabulary();
    let classifications = classify_sheets(&mut usable, &vocab);
    let sheets = usable;

    // Ledger mapping
    let mapping_sheet = find_mapping_sheet(&sheets);
    let mapping = mapping_sheet
        .and_then(|sheet| cache.get_or_build(sheet, options.header_rows, &mut warnings));
    let mapping_name = mapping_sheet.map(|s| s.name.clone());

    // Valuation entries
    let valuation_parser = ValuationParser {
        header_rows: options.header_rows,
        rate_band: options.rate_band,
    };
    let valuation = valuation_parser.parse_workbook(&sheets, &mut warnings);

    // Statements
    let scenario_names: Vec<String> = find_scenario_sheets(&sheets)
        .iter()
        .map(|s| s.name.clone())
        .collect();
    let claimed = |name: &str| {
        mapping_name.as_deref() == Some(name)
            || valuation.as_ref().is_some_and(|v| v.sheet_name == name)
            || scenario_names.iter().any(|s| s == name)
    };
    let statement_sheets: Vec<&Worksheet> = sheets
        .iter()
        .filter(|s| !claimed(&s.name))
        .filter(|s| match s.sheet_type {
            SheetType::Statement => true,
            SheetType::Unknown => mapping
                .as_ref()
                .is_some_and(|m| mapped_rows(s, m) >= MIN_MAPPED_ROWS),
            _ => false,
        })
        .collect();
    let statements = StatementParser::new(mapping.as_ref())
        .with_header_rows(options.header_rows)
        .parse_sheets(&statement_sheets, &mut warnings);

    // Portfolio rollups
    let mut skip: Vec<String> = statement_sheets.iter().map(|s| s.name.clone()).collect();
    skip.extend(mapping_name.clone());
    skip.extend(valuation.as_ref().map(|v| v.sheet_name.clone()));
    let portfolio = PortfolioParser::new(mapping.as_ref())
        .with_header_rows(options.header_rows)
        .skipping(skip)
        .parse(&sheets, &mut warnings);

    // Census listings
    let census_sheets: Vec<&Worksheet> = sheets
        .iter()
        .filter(|s| s.sheet_type == SheetType::Census && !claimed(&s.name))
        .collect();
    let facility_records = parse_census_sheets(&census_sheets, options.header_rows, &mut warnings);

    // Identity resolution
    let mut sections: Vec<FacilitySection> = statements.clone();
    if let Some(p) = &portfolio {
        sections.extend(p.facilities.iter().cloned());
    }
    let entries = valuation
        .as_ref()
        .map(|v| v.entries.as_slice())
        .unwrap_or_default();
    let resolution = FacilityResolver::new(options.resolver.clone()).resolve(
        &sections,
        entries,
        &facility_records,
        &mut warnings,
    );

    // Valuation
    let mut valuations = Vec::new();
    if let Some(plan) = &options.valuation {
        for facility in &resolution.facilities {
            let inputs = ValuationInputs::from_facility(facility);
            match run_valuation(&inputs, plan) {
                Ok(summary) => valuations.push(summary),
                Err(e) => push_warning(
                    &mut warnings,
                    Stage::Valuation,
                    None,
                    WarningSeverity::Info,
                    format!("'{}' not valued: {e}", facility.name),
                ),
            }
        }
    }

    info!(
        "extracted {} sheets: {} statement sections, {} valuation entries, {} facilities, {} warnings",
        sheets.len(),
        statements.len(),
        entries.len(),
        resolution.facilities.len(),
        warnings.len()
    );

    Ok(ExtractionResult {
        sheets: classifications,
        ledger_mapping: mapping,
        statements,
        valuation,
        portfolio,
        classifications: facility_records,
        resolution,
        valuations,
        warnings,
    })
}

/// Rows whose leading cells hold a code the mapping knows.
fn mapped_rows(sheet: &Worksheet, mapping: &LedgerMapping) -> usize {
    (0..sheet.row_count)
        .filter(|&row| {
            sheet.row(row).iter().take(3).any(|cell| {
                normalize_code(&cell.to_string()).is_some_and(|code| mapping.lookup(&code).is_some())
            })
        })
        .count()
}
