//! Operating statements (T12/T13/YTD): per-facility line items, census and
//! summary metrics.
//!
//! Each data row is matched in three steps: a ledger code found in the row is
//! looked up in the mapping, then the label is matched against fixed
//! patterns, then the row inherits the category of the section header above
//! it. Total and summary rows never become line items; summary values feed
//! [`SummaryMetrics`] directly and missing ones are synthesized from the
//! items afterwards.

use log::debug;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::ledger::{normalize_code, LedgerMapping};
use crate::model::{
    Census, FacilitySection, LedgerCategory, LineCategory, LineItem, MatchSource, SummaryMetrics,
    Worksheet,
};
use crate::parsing::layout::{
    ColumnLayout, ColumnSpec, ContentKind, ContentRule, ContentScan, DetectionTier, FixedLayout,
    HeaderScan, LayoutDetector,
};
use crate::parsing::normalize::{canonical_facility_name, contains_word, facility_key, snake_label};
use crate::parsing::values::{count_from_decimal, parse_count};
use crate::parsing::{is_total_label, last_number, row_label};
use crate::warnings::{push_warning, ExtractionWarning, Stage, WarningSeverity};

pub const LEDGER_CONFIDENCE: Decimal = dec!(0.95);
pub const LABEL_CONFIDENCE: Decimal = dec!(0.60);
pub const SECTION_CONFIDENCE: Decimal = dec!(0.40);
pub const EXPLICIT_SUMMARY_CONFIDENCE: Decimal = dec!(0.90);
pub const SYNTHESIZED_SUMMARY_CONFIDENCE: Decimal = dec!(0.75);

const STATEMENT_SPECS: &[ColumnSpec] = &[
    ColumnSpec::optional(
        "code",
        &["code", "gl #", "gl acct", "gl account", "acct", "account #", "account no", "account number"],
    )
    .excluding(&["description", "name"]),
    ColumnSpec::optional("ppd", &["ppd", "per patient day", "per day", "prd"]),
    ColumnSpec::required(
        "value",
        &["total", "annual", "ytd", "t12", "t13", "ttm", "trailing", "amount", "actual"],
    )
    .excluding(&["ppd", "per patient", "per day", "%", "budget", "variance", "prior"]),
    ColumnSpec::required("label", &["description", "line item", "label", "account name", "item"])
        .excluding(&["code", "#", "number"]),
];

/// (keyword, account class, subcategory), first match wins.
const LABEL_PATTERNS: &[(&str, LedgerCategory, &str)] = &[
    ("provider tax", LedgerCategory::Admin, "provider_tax"),
    ("bed tax", LedgerCategory::Admin, "provider_tax"),
    ("bad debt", LedgerCategory::Admin, "bad_debt"),
    ("management fee", LedgerCategory::Admin, "management_fee"),
    ("mgmt fee", LedgerCategory::Admin, "management_fee"),
    ("interest income", LedgerCategory::Revenue, "other_revenue"),
    ("therapy revenue", LedgerCategory::Revenue, "therapy_revenue"),
    ("medicare", LedgerCategory::Revenue, "medicare_revenue"),
    ("medicaid", LedgerCategory::Revenue, "medicaid_revenue"),
    ("managed care", LedgerCategory::Revenue, "managed_care_revenue"),
    ("hmo", LedgerCategory::Revenue, "managed_care_revenue"),
    ("private pay", LedgerCategory::Revenue, "private_pay_revenue"),
    ("private", LedgerCategory::Revenue, "private_pay_revenue"),
    ("hospice", LedgerCategory::Revenue, "hospice_revenue"),
    ("veterans", LedgerCategory::Revenue, "veterans_revenue"),
    ("ancillary", LedgerCategory::Revenue, "ancillary_revenue"),
    ("other revenue", LedgerCategory::Revenue, "other_revenue"),
    ("other income", LedgerCategory::Revenue, "other_revenue"),
    ("rent", LedgerCategory::NonOperating, "lease_expense"),
    ("lease", LedgerCategory::NonOperating, "lease_expense"),
    ("agency", LedgerCategory::OperatingExpense, "contract_labor"),
    ("contract labor", LedgerCategory::OperatingExpense, "contract_labor"),
    ("nursing", LedgerCategory::OperatingExpense, "nursing"),
    ("dietary", LedgerCategory::OperatingExpense, "dietary"),
    ("food", LedgerCategory::OperatingExpense, "dietary"),
    ("housekeeping", LedgerCategory::OperatingExpense, "housekeeping"),
    ("laundry", LedgerCategory::OperatingExpense, "laundry"),
    ("maintenance", LedgerCategory::OperatingExpense, "plant_operations"),
    ("plant operations", LedgerCategory::OperatingExpense, "plant_operations"),
    ("activities", LedgerCategory::OperatingExpense, "activities"),
    ("social services", LedgerCategory::OperatingExpense, "social_services"),
    ("therapy", LedgerCategory::OperatingExpense, "therapy"),
    ("pharmacy", LedgerCategory::OperatingExpense, "pharmacy"),
    ("drugs", LedgerCategory::OperatingExpense, "pharmacy"),
    ("medical supplies", LedgerCategory::OperatingExpense, "medical_supplies"),
    ("supplies", LedgerCategory::OperatingExpense, "medical_supplies"),
    ("wages", LedgerCategory::OperatingExpense, "salaries_and_wages"),
    ("salaries", LedgerCategory::OperatingExpense, "salaries_and_wages"),
    ("payroll tax", LedgerCategory::OperatingExpense, "employee_benefits"),
    ("benefits", LedgerCategory::OperatingExpense, "employee_benefits"),
    ("insurance", LedgerCategory::Admin, "insurance"),
    ("property tax", LedgerCategory::Admin, "property_tax"),
    ("real estate tax", LedgerCategory::Admin, "property_tax"),
    ("utilities", LedgerCategory::Admin, "utilities"),
    ("marketing", LedgerCategory::Admin, "marketing"),
    ("professional fees", LedgerCategory::Admin, "professional_fees"),
    ("legal", LedgerCategory::Admin, "professional_fees"),
    ("administrative", LedgerCategory::Admin, "other_admin"),
    ("interest", LedgerCategory::NonOperating, "interest"),
    ("depreciation", LedgerCategory::NonOperating, "depreciation"),
    ("amortization", LedgerCategory::NonOperating, "amortization"),
    ("income tax", LedgerCategory::BelowTheLine, "income_tax"),
];

/// Subcategories that sit below EBITDA even when coded as admin.
const BELOW_EBITDA_SUBCATEGORIES: &[&str] = &[
    "interest",
    "depreciation",
    "amortization",
    "income_tax",
    "extraordinary_items",
    "other_non_operating",
];

const PAYOR_WORDS: &[&str] = &[
    "medicare", "medicaid", "private", "managed", "hmo", "hospice", "veterans", "va", "insurance",
    "other", "skilled", "respite",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SummaryField {
    TotalRevenue,
    TotalExpenses,
    Ebitdar,
    Ebitda,
    NetIncome,
    LeaseExpense,
    ManagementFee,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SummaryRow {
    Field(SummaryField),
    /// Recognised summary line with no field of its own (NOI, margins).
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CensusField {
    Beds,
    PatientDays,
    AverageDailyCensus,
    Occupancy,
    /// Payor-level day counts and similar statistics.
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bucket {
    Revenue,
    Operating,
    Lease,
    BelowEbitda,
}

/// A contiguous row range belonging to one facility.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FacilityBlock {
    name: String,
    start: usize,
    end: usize,
}

/// Parses statement sheets against an optional ledger mapping.
#[derive(Debug, Clone, Copy)]
pub struct StatementParser<'a> {
    mapping: Option<&'a LedgerMapping>,
    header_rows: usize,
}

impl<'a> StatementParser<'a> {
    pub fn new(mapping: Option<&'a LedgerMapping>) -> Self {
        StatementParser {
            mapping,
            header_rows: 15,
        }
    }

    /// Rows scanned for a header row and a facility title.
    pub fn with_header_rows(mut self, rows: usize) -> Self {
        self.header_rows = rows;
        self
    }

    pub fn parse_sheets(
        &self,
        sheets: &[&Worksheet],
        warnings: &mut Vec<ExtractionWarning>,
    ) -> Vec<FacilitySection> {
        sheets
            .iter()
            .flat_map(|sheet| self.parse_sheet(sheet, warnings))
            .collect()
    }

    /// Parse one sheet into one section per facility found on it.
    pub fn parse_sheet(
        &self,
        sheet: &Worksheet,
        warnings: &mut Vec<ExtractionWarning>,
    ) -> Vec<FacilitySection> {
        if sheet.is_empty() {
            push_warning(
                warnings,
                Stage::Statement,
                Some(&sheet.name),
                WarningSeverity::Info,
                "empty sheet skipped",
            );
            return Vec::new();
        }

        let Some(layout) = self.detect_layout(sheet) else {
            push_warning(
                warnings,
                Stage::Layout,
                Some(&sheet.name),
                WarningSeverity::Important,
                "could not detect label/value columns",
            );
            return Vec::new();
        };

        let mut sections = Vec::new();
        for block in facility_blocks(sheet, self.header_rows) {
            let section = self.parse_block(sheet, &layout, &block);
            debug!(
                "sheet '{}': facility '{}' with {} line items",
                sheet.name,
                section.facility_name,
                section.line_items.len()
            );
            sections.push(section);
        }

        let extracted = sections
            .iter()
            .any(|s| s.line_items.iter().any(|i| i.category != LineCategory::Metric) || has_summary(&s.summary));
        if !extracted {
            let message = if layout.tier == DetectionTier::Default {
                "could not detect label/value columns; no line items extracted"
            } else {
                "no line items extracted"
            };
            push_warning(
                warnings,
                Stage::Layout,
                Some(&sheet.name),
                WarningSeverity::Important,
                message,
            );
            return Vec::new();
        }

        sections
    }

    fn detect_layout(&self, sheet: &Worksheet) -> Option<ColumnLayout> {
        let last_col = sheet.column_count.checked_sub(1)?;
        LayoutDetector::new()
            .then(HeaderScan {
                max_rows: self.header_rows,
            })
            .then(ContentScan::new(vec![
                ContentRule::new("code", ContentKind::LedgerCode),
                ContentRule::new("label", ContentKind::LongText { min_len: 3 }),
                ContentRule::new(
                    "value",
                    ContentKind::Numeric {
                        prefer_rightmost: true,
                    },
                ),
            ]))
            .then(FixedLayout {
                columns: vec![("label", 0), ("value", last_col)],
                first_data_row: 0,
            })
            .detect(sheet, STATEMENT_SPECS)
    }

    fn parse_block(&self, sheet: &Worksheet, layout: &ColumnLayout, block: &FacilityBlock) -> FacilitySection {
        let label_col = layout.get("label");
        let value_col = layout.get("value").unwrap_or(sheet.column_count.saturating_sub(1));
        let code_col = layout.get("code");
        let ppd_col = layout.get("ppd");

        let mut census = Census::default();
        let mut explicit = SummaryMetrics::default();
        let mut items: Vec<LineItem> = Vec::new();
        let mut section: Option<LedgerCategory> = None;

        for row in block.start.max(layout.first_data_row)..block.end {
            if Some(row) == layout.header_row {
                continue;
            }
            let label = row_label(sheet, row, label_col, value_col);
            let code = row_code(sheet, row, code_col, label, value_col);
            let value = sheet.number(row, value_col);
            let lower = label.map(str::to_lowercase).unwrap_or_default();

            if code.is_none() {
                if let Some(field) = census_field(&lower) {
                    let figure = value.or_else(|| last_number(sheet, row).map(|(_, n)| n));
                    apply_census(&mut census, field, figure, sheet.text(row, value_col));
                    continue;
                }
            }

            if let Some(label) = label {
                let summary = summary_row(label);
                if summary.is_some() || is_total_label(label) {
                    if let (Some(SummaryRow::Field(field)), Some(v)) = (summary, value) {
                        set_if_none(&mut explicit, field, v);
                    }
                    continue;
                }
            }

            let Some(annual) = value else {
                if code.is_none() {
                    if let Some(category) = section_category(&lower) {
                        section = Some(category);
                    }
                }
                continue;
            };

            let entry = code.as_deref().and_then(|c| {
                self.mapping
                    .and_then(|m| m.lookup_for_facility(c, &block.name))
            });

            let item = if let Some(entry) = entry {
                Some(LineItem {
                    category: entry.category.line_category(),
                    account_class: Some(entry.category),
                    subcategory: entry.subcategory.clone(),
                    label: label.unwrap_or(entry.label.as_str()).to_string(),
                    ledger_code: Some(entry.code.clone()),
                    annual,
                    per_patient_day: None,
                    confidence: LEDGER_CONFIDENCE,
                    source: MatchSource::LedgerCode,
                })
            } else if let Some(label) = label {
                match_label(&lower)
                    .map(|(class, sub)| (class, sub.to_string(), LABEL_CONFIDENCE, MatchSource::LabelPattern))
                    .or_else(|| {
                        section.map(|class| {
                            (class, snake_label(label), SECTION_CONFIDENCE, MatchSource::SectionContext)
                        })
                    })
                    .map(|(class, subcategory, confidence, source)| LineItem {
                        category: class.line_category(),
                        account_class: Some(class),
                        subcategory,
                        label: label.to_string(),
                        ledger_code: code.clone(),
                        annual,
                        per_patient_day: None,
                        confidence,
                        source,
                    })
            } else {
                None
            };

            if let Some(mut item) = item {
                item.per_patient_day = ppd_col.and_then(|c| sheet.number(row, c));
                items.push(item);
            }
        }

        derive_occupancy(&mut census);
        if let Some(days) = census.total_patient_days.filter(|d| d.is_sign_positive() && !d.is_zero()) {
            for item in &mut items {
                if item.per_patient_day.is_none() {
                    item.per_patient_day = Some((item.annual / days).round_dp(2));
                }
            }
        }

        let (summary, explicit_fields) = synthesize_summary(&items, &explicit);
        let metrics = metric_items(&summary, &explicit_fields, census.total_patient_days);
        items.extend(metrics);

        FacilitySection {
            facility_name: block.name.clone(),
            sheet_name: sheet.name.clone(),
            census,
            line_items: items,
            summary,
        }
    }
}

/// Convenience wrapper over [`StatementParser`].
pub fn parse_statements(
    sheets: &[&Worksheet],
    mapping: Option<&LedgerMapping>,
    header_rows: usize,
    warnings: &mut Vec<ExtractionWarning>,
) -> Vec<FacilitySection> {
    StatementParser::new(mapping)
        .with_header_rows(header_rows)
        .parse_sheets(sheets, warnings)
}

fn has_summary(summary: &SummaryMetrics) -> bool {
    summary.total_revenue.is_some()
        || summary.total_expenses.is_some()
        || summary.ebitdar.is_some()
        || summary.ebitda.is_some()
        || summary.net_income.is_some()
        || summary.lease_expense.is_some()
        || summary.management_fee.is_some()
}

/// Split a sheet into facility blocks.
///
/// Several supplied facility names that each appear as a sparse standalone
/// row split the sheet at those rows. Otherwise the whole sheet belongs to
/// the single supplied name, a "Facility:" title cell, or the sheet name.
fn facility_blocks(sheet: &Worksheet, header_rows: usize) -> Vec<FacilityBlock> {
    let names: Vec<String> = sheet
        .facility_names
        .iter()
        .map(|n| canonical_facility_name(n))
        .filter(|n| !n.is_empty())
        .collect();

    if names.len() > 1 {
        let mut splits: Vec<(usize, &String)> = Vec::new();
        for row in 0..sheet.row_count {
            if sheet.populated_count(row) > 2 {
                continue;
            }
            let Some((_, text)) = sheet.first_text(row) else {
                continue;
            };
            let key = facility_key(text);
            if let Some(name) = names.iter().find(|n| facility_key(n) == key) {
                splits.push((row, name));
            }
        }
        if splits.len() > 1 {
            return splits
                .iter()
                .enumerate()
                .map(|(i, (row, name))| FacilityBlock {
                    name: (*name).clone(),
                    start: row + 1,
                    end: splits.get(i + 1).map_or(sheet.row_count, |(next, _)| *next),
                })
                .collect();
        }
    }

    let name = names
        .into_iter()
        .next()
        .or_else(|| title_facility(sheet, header_rows))
        .unwrap_or_else(|| canonical_facility_name(&sheet.name));
    vec![FacilityBlock {
        name,
        start: 0,
        end: sheet.row_count,
    }]
}

/// "Facility: Sunrise SNF" in one cell, or "Facility:" followed by the name.
fn title_facility(sheet: &Worksheet, header_rows: usize) -> Option<String> {
    for row in 0..header_rows.min(sheet.row_count) {
        for col in 0..sheet.column_count {
            let Some(text) = sheet.text(row, col) else {
                continue;
            };
            let lower = text.to_lowercase();
            for prefix in ["facility name:", "facility:"] {
                if !lower.starts_with(prefix) {
                    continue;
                }
                let rest = text.get(prefix.len()..).unwrap_or("").trim();
                let name = if rest.is_empty() {
                    sheet.text(row, col + 1).unwrap_or("")
                } else {
                    rest
                };
                let name = canonical_facility_name(name);
                if !name.is_empty() {
                    return Some(name);
                }
            }
        }
    }
    None
}

/// Ledger code of a row: the code column, else a leading code token in the
/// label, else the first code-shaped cell left of the value column.
fn row_code(
    sheet: &Worksheet,
    row: usize,
    code_col: Option<usize>,
    label: Option<&str>,
    value_col: usize,
) -> Option<String> {
    if let Some(code) = code_col.and_then(|c| normalize_code(&sheet.cell(row, c).to_string())) {
        return Some(code);
    }
    if let Some(code) = label
        .and_then(|l| l.split_whitespace().next())
        .and_then(normalize_code)
    {
        return Some(code);
    }
    (0..value_col).find_map(|c| normalize_code(&sheet.cell(row, c).to_string()))
}

fn census_field(lower: &str) -> Option<CensusField> {
    if lower.is_empty() {
        return None;
    }
    if lower.contains("occupancy") {
        return Some(CensusField::Occupancy);
    }
    if lower.contains("average daily census")
        || lower.contains("avg daily census")
        || contains_word(lower, "adc")
    {
        return Some(CensusField::AverageDailyCensus);
    }
    if lower.contains("patient days") || lower.contains("resident days") || lower.contains("census days") {
        let payor_specific = PAYOR_WORDS.iter().any(|w| contains_word(lower, w));
        return Some(if payor_specific {
            CensusField::Other
        } else {
            CensusField::PatientDays
        });
    }
    if contains_word(lower, "beds") || contains_word(lower, "bed count") {
        return Some(CensusField::Beds);
    }
    if contains_word(lower, "days") || lower.contains("census") {
        return Some(CensusField::Other);
    }
    None
}

fn apply_census(census: &mut Census, field: CensusField, value: Option<Decimal>, raw: Option<&str>) {
    match field {
        CensusField::Beds => {
            if census.beds.is_none() {
                census.beds = value
                    .and_then(count_from_decimal)
                    .or_else(|| raw.and_then(parse_count))
                    .filter(|b| *b > 0);
            }
        }
        CensusField::PatientDays => {
            if census.total_patient_days.is_none() {
                census.total_patient_days = value;
            }
        }
        CensusField::AverageDailyCensus => {
            if census.average_daily_census.is_none() {
                census.average_daily_census = value;
            }
        }
        CensusField::Occupancy => {
            if census.occupancy.is_none() {
                census.occupancy = value.map(|v| if v > Decimal::ONE { v / Decimal::ONE_HUNDRED } else { v });
            }
        }
        CensusField::Other => {}
    }
}

fn derive_occupancy(census: &mut Census) {
    if census.occupancy.is_some() {
        return;
    }
    if let (Some(adc), Some(beds)) = (census.average_daily_census, census.beds) {
        if beds > 0 {
            census.occupancy = Some((adc / Decimal::from(beds)).round_dp(4));
        }
    }
}

fn summary_row(label: &str) -> Option<SummaryRow> {
    let key = snake_label(label);
    if key.contains("margin") || key.contains("percent") || key.ends_with("_pct") {
        return Some(SummaryRow::Other);
    }
    let field = match key.as_str() {
        "total_revenue" => Some(SummaryField::TotalRevenue),
        "total_expenses" => Some(SummaryField::TotalExpenses),
        k if k == "ebitdar" || k.starts_with("ebitdar_") => Some(SummaryField::Ebitdar),
        k if k == "ebitda" || k.starts_with("ebitda_") => Some(SummaryField::Ebitda),
        k if k == "net_income" || k.starts_with("net_income_") => Some(SummaryField::NetIncome),
        _ => total_cost_field(&key),
    };
    if let Some(field) = field {
        return Some(SummaryRow::Field(field));
    }
    match key.as_str() {
        "noi" | "net_operating_income" | "operating_income" | "gross_profit" | "ebit" => {
            Some(SummaryRow::Other)
        }
        _ => None,
    }
}

/// "Total Lease Expense", "Total Rent", "Total Management Fees".
fn total_cost_field(key: &str) -> Option<SummaryField> {
    let stem = key.strip_prefix("total_")?;
    match stem {
        "lease" | "leases" | "lease_expense" | "lease_expenses" | "rent" | "rent_expense"
        | "rent_expenses" | "rent_and_lease" | "lease_and_rent" | "rent_and_lease_expense" => {
            Some(SummaryField::LeaseExpense)
        }
        "management_fee" | "management_fees" | "mgmt_fee" | "mgmt_fees" => {
            Some(SummaryField::ManagementFee)
        }
        _ => None,
    }
}

fn set_if_none(summary: &mut SummaryMetrics, field: SummaryField, value: Decimal) {
    let slot = match field {
        SummaryField::TotalRevenue => &mut summary.total_revenue,
        SummaryField::TotalExpenses => &mut summary.total_expenses,
        SummaryField::Ebitdar => &mut summary.ebitdar,
        SummaryField::Ebitda => &mut summary.ebitda,
        SummaryField::NetIncome => &mut summary.net_income,
        SummaryField::LeaseExpense => &mut summary.lease_expense,
        SummaryField::ManagementFee => &mut summary.management_fee,
    };
    slot.get_or_insert(value);
}

/// Category carried by a label-only section header row.
fn section_category(lower: &str) -> Option<LedgerCategory> {
    if lower.is_empty() || lower.contains("statement") || lower.contains("facility") {
        return None;
    }
    if lower.contains("non-operating") || lower.contains("non operating") || lower.contains("other expense") {
        Some(LedgerCategory::NonOperating)
    } else if contains_word(lower, "revenue") || contains_word(lower, "income") {
        Some(LedgerCategory::Revenue)
    } else if contains_word(lower, "administrative") || contains_word(lower, "g&a") || contains_word(lower, "overhead") {
        Some(LedgerCategory::Admin)
    } else if contains_word(lower, "expense") || contains_word(lower, "cost") {
        Some(LedgerCategory::OperatingExpense)
    } else {
        None
    }
}

fn match_label(lower: &str) -> Option<(LedgerCategory, &'static str)> {
    LABEL_PATTERNS
        .iter()
        .find(|(keyword, _, _)| contains_word(lower, keyword))
        .map(|(_, class, sub)| (*class, *sub))
}

fn bucket(item: &LineItem) -> Bucket {
    match item.account_class {
        Some(LedgerCategory::Revenue) => Bucket::Revenue,
        _ if item.subcategory == "lease_expense" => Bucket::Lease,
        _ if BELOW_EBITDA_SUBCATEGORIES.contains(&item.subcategory.as_str()) => Bucket::BelowEbitda,
        Some(LedgerCategory::NonOperating) | Some(LedgerCategory::BelowTheLine) => Bucket::BelowEbitda,
        _ => Bucket::Operating,
    }
}

/// Names of the summary fields read from explicit rows.
#[derive(Debug, Default)]
struct ExplicitFields(Vec<&'static str>);

impl ExplicitFields {
    fn contains(&self, name: &str) -> bool {
        self.0.contains(&name)
    }
}

/// Fill summary fields missing from explicit rows using the line items.
///
/// Cost-side totals are magnitudes, so expenses printed in parentheses net
/// against revenue the same way as unsigned ones.
fn synthesize_summary(items: &[LineItem], explicit: &SummaryMetrics) -> (SummaryMetrics, ExplicitFields) {
    let sum = |b: Bucket| -> Option<Decimal> {
        let mut total = None;
        for item in items.iter().filter(|i| bucket(i) == b) {
            *total.get_or_insert(Decimal::ZERO) += item.annual;
        }
        total
    };
    let sum_sub = |sub: &str| -> Option<Decimal> {
        let mut total = None;
        for item in items.iter().filter(|i| i.subcategory == sub) {
            *total.get_or_insert(Decimal::ZERO) += item.annual;
        }
        total
    };

    let mut fields = ExplicitFields::default();
    let mut mark = |name: &'static str, present: bool| {
        if present {
            fields.0.push(name);
        }
    };
    mark("total_revenue", explicit.total_revenue.is_some());
    mark("total_expenses", explicit.total_expenses.is_some());
    mark("ebitdar", explicit.ebitdar.is_some());
    mark("ebitda", explicit.ebitda.is_some());
    mark("net_income", explicit.net_income.is_some());
    mark("lease_expense", explicit.lease_expense.is_some());
    mark("management_fee", explicit.management_fee.is_some());

    let total_revenue = explicit.total_revenue.or_else(|| sum(Bucket::Revenue));
    let total_expenses = explicit
        .total_expenses
        .or_else(|| sum(Bucket::Operating))
        .map(|e| e.abs());
    let lease_expense = explicit
        .lease_expense
        .or_else(|| sum(Bucket::Lease))
        .map(|e| e.abs());
    let management_fee = explicit
        .management_fee
        .or_else(|| sum_sub("management_fee"))
        .map(|e| e.abs());
    let below_ebitda = sum(Bucket::BelowEbitda).map(|e| e.abs());

    let ebitdar = explicit.ebitdar.or(match (total_revenue, total_expenses) {
        (Some(r), Some(e)) => Some(r - e),
        _ => None,
    });
    let ebitda = explicit
        .ebitda
        .or_else(|| ebitdar.map(|e| e - lease_expense.unwrap_or(Decimal::ZERO)));
    let net_income = explicit
        .net_income
        .or_else(|| ebitda.map(|e| e - below_ebitda.unwrap_or(Decimal::ZERO)));

    (
        SummaryMetrics {
            total_revenue,
            total_expenses,
            ebitdar,
            ebitda,
            net_income,
            management_fee,
            lease_expense,
        },
        fields,
    )
}

fn metric_items(
    summary: &SummaryMetrics,
    explicit: &ExplicitFields,
    patient_days: Option<Decimal>,
) -> Vec<LineItem> {
    let fields = [
        ("total_revenue", "Total Revenue", summary.total_revenue),
        ("total_expenses", "Total Expenses", summary.total_expenses),
        ("ebitdar", "EBITDAR", summary.ebitdar),
        ("lease_expense", "Lease Expense", summary.lease_expense),
        ("ebitda", "EBITDA", summary.ebitda),
        ("management_fee", "Management Fee", summary.management_fee),
        ("net_income", "Net Income", summary.net_income),
    ];
    let days = patient_days.filter(|d| d.is_sign_positive() && !d.is_zero());

    fields
        .into_iter()
        .filter_map(|(key, label, value)| {
            let annual = value?;
            let is_explicit = explicit.contains(key);
            Some(LineItem {
                category: LineCategory::Metric,
                account_class: None,
                subcategory: key.to_string(),
                label: label.to_string(),
                ledger_code: None,
                annual,
                per_patient_day: days.map(|d| (annual / d).round_dp(2)),
                confidence: if is_explicit {
                    EXPLICIT_SUMMARY_CONFIDENCE
                } else {
                    SYNTHESIZED_SUMMARY_CONFIDENCE
                },
                source: if is_explicit {
                    MatchSource::Summary
                } else {
                    MatchSource::Synthesized
                },
            })
        })
        .collect()
}
