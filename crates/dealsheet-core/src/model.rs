use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::parsing::values::amount;

/// A single cell as delivered by the workbook reader.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(Decimal),
}

impl CellValue {
    /// Trimmed, non-empty text content. Numbers are not rendered.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed)
                }
            }
            _ => None,
        }
    }

    /// Numeric content. Text cells are parsed with US conventions
    /// ("$1,200,000", "(350)", "8.5%").
    pub fn as_number(&self) -> Option<Decimal> {
        match self {
            CellValue::Number(n) => Some(*n),
            CellValue::Text(s) => amount(s),
            CellValue::Empty => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            CellValue::Number(_) => false,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Text(s) => write!(f, "{}", s.trim()),
            CellValue::Number(n) => write!(f, "{n}"),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        if s.trim().is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(s.to_string())
        }
    }
}

impl From<Decimal> for CellValue {
    fn from(n: Decimal) -> Self {
        CellValue::Number(n)
    }
}

impl From<i64> for CellValue {
    fn from(n: i64) -> Self {
        CellValue::Number(Decimal::from(n))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SheetType {
    Statement,
    Census,
    RateSheet,
    RentRoll,
    Summary,
    #[default]
    Unknown,
}

impl fmt::Display for SheetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SheetType::Statement => write!(f, "statement"),
            SheetType::Census => write!(f, "census"),
            SheetType::RateSheet => write!(f, "rate_sheet"),
            SheetType::RentRoll => write!(f, "rent_roll"),
            SheetType::Summary => write!(f, "summary"),
            SheetType::Unknown => write!(f, "unknown"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetMetadata {
    pub has_formulas: bool,
    pub has_merged_cells: bool,
    pub first_data_row: Option<usize>,
}

/// One worksheet of an uploaded workbook. Produced by a
/// [`WorkbookReader`](crate::extraction::WorkbookReader) and never mutated by
/// the parsers, except that the classifier records its verdict in
/// `sheet_type`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Worksheet {
    pub name: String,
    #[serde(default)]
    pub sheet_type: SheetType,
    pub row_count: usize,
    pub column_count: usize,
    /// Reader's guess of the header row.
    #[serde(default)]
    pub header_row: Option<usize>,
    #[serde(default)]
    pub headers: Vec<String>,
    pub cells: Vec<Vec<CellValue>>,
    #[serde(default)]
    pub facility_names: Vec<String>,
    #[serde(default)]
    pub periods: Vec<String>,
    #[serde(default)]
    pub metadata: SheetMetadata,
}

static EMPTY_CELL: CellValue = CellValue::Empty;

impl Worksheet {
    pub fn new(name: impl Into<String>, cells: Vec<Vec<CellValue>>) -> Self {
        let row_count = cells.len();
        let column_count = cells.iter().map(|r| r.len()).max().unwrap_or(0);
        Worksheet {
            name: name.into(),
            row_count,
            column_count,
            cells,
            ..Default::default()
        }
    }

    /// Build a worksheet from string rows; blank strings become empty cells.
    pub fn from_rows(name: impl Into<String>, rows: &[&[&str]]) -> Self {
        let cells = rows
            .iter()
            .map(|r| r.iter().map(|s| CellValue::from(*s)).collect())
            .collect();
        Worksheet::new(name, cells)
    }

    pub fn cell(&self, row: usize, col: usize) -> &CellValue {
        self.cells
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY_CELL)
    }

    pub fn text(&self, row: usize, col: usize) -> Option<&str> {
        self.cell(row, col).as_text()
    }

    pub fn number(&self, row: usize, col: usize) -> Option<Decimal> {
        self.cell(row, col).as_number()
    }

    pub fn row(&self, row: usize) -> &[CellValue] {
        self.cells.get(row).map(|r| r.as_slice()).unwrap_or(&[])
    }

    /// Number of non-empty cells in a row.
    pub fn populated_count(&self, row: usize) -> usize {
        self.row(row).iter().filter(|c| !c.is_empty()).count()
    }

    /// First non-empty text cell in a row, with its column.
    pub fn first_text(&self, row: usize) -> Option<(usize, &str)> {
        self.row(row)
            .iter()
            .enumerate()
            .find_map(|(i, c)| c.as_text().map(|t| (i, t)))
    }

    /// Lowercased concatenation of every non-empty cell in a row.
    pub fn row_text(&self, row: usize) -> String {
        self.row(row)
            .iter()
            .filter(|c| !c.is_empty())
            .map(|c| c.to_string().to_lowercase())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn is_empty(&self) -> bool {
        self.cells.iter().all(|r| r.iter().all(|c| c.is_empty()))
    }
}

/// Ledger account class, from an explicit category column or the numeric
/// prefix of the code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerCategory {
    Revenue,
    OperatingExpense,
    Admin,
    NonOperating,
    BelowTheLine,
}

impl LedgerCategory {
    /// Category implied by the first digit of a six-digit ledger code.
    pub fn from_code_prefix(code: &str) -> Option<LedgerCategory> {
        match code.chars().next()? {
            '4' => Some(LedgerCategory::Revenue),
            '5' => Some(LedgerCategory::OperatingExpense),
            '6' => Some(LedgerCategory::Admin),
            '7' => Some(LedgerCategory::NonOperating),
            '8' => Some(LedgerCategory::BelowTheLine),
            _ => None,
        }
    }

    pub fn from_str_loose(s: &str) -> Option<LedgerCategory> {
        let lower = s.trim().to_lowercase();
        if lower.is_empty() {
            None
        } else if lower.contains("non-op") || lower.contains("non op") || lower.contains("nonop") {
            Some(LedgerCategory::NonOperating)
        } else if lower.contains("below")
            || lower.contains("tax")
            || lower.contains("depreciation")
            || lower.contains("interest")
        {
            Some(LedgerCategory::BelowTheLine)
        } else if lower.contains("revenue") || lower.contains("income") {
            Some(LedgerCategory::Revenue)
        } else if lower.contains("admin") || lower.contains("g&a") || lower.contains("overhead") {
            Some(LedgerCategory::Admin)
        } else if lower.contains("expense") || lower.contains("operating") || lower.contains("cost") {
            Some(LedgerCategory::OperatingExpense)
        } else {
            None
        }
    }

    /// Counts toward operating expenses (above EBITDAR).
    pub fn is_operating_expense(&self) -> bool {
        matches!(self, LedgerCategory::OperatingExpense | LedgerCategory::Admin)
    }

    pub fn line_category(&self) -> LineCategory {
        match self {
            LedgerCategory::Revenue => LineCategory::Revenue,
            _ => LineCategory::Expense,
        }
    }
}

impl fmt::Display for LedgerCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerCategory::Revenue => write!(f, "revenue"),
            LedgerCategory::OperatingExpense => write!(f, "operating_expense"),
            LedgerCategory::Admin => write!(f, "admin"),
            LedgerCategory::NonOperating => write!(f, "non_operating"),
            LedgerCategory::BelowTheLine => write!(f, "below_the_line"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineCategory {
    Revenue,
    Expense,
    Metric,
}

impl fmt::Display for LineCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineCategory::Revenue => write!(f, "revenue"),
            LineCategory::Expense => write!(f, "expense"),
            LineCategory::Metric => write!(f, "metric"),
        }
    }
}

/// How a line item's category was determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchSource {
    LedgerCode,
    LabelPattern,
    SectionContext,
    Summary,
    Synthesized,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub category: LineCategory,
    /// Ledger class; `None` for metric rows.
    pub account_class: Option<LedgerCategory>,
    pub subcategory: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ledger_code: Option<String>,
    pub annual: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_patient_day: Option<Decimal>,
    /// 0..=1; ledger-code matches score higher than label heuristics.
    pub confidence: Decimal,
    pub source: MatchSource,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Census {
    pub beds: Option<u32>,
    pub total_patient_days: Option<Decimal>,
    pub average_daily_census: Option<Decimal>,
    /// Fraction in 0..=1.
    pub occupancy: Option<Decimal>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryMetrics {
    pub total_revenue: Option<Decimal>,
    pub total_expenses: Option<Decimal>,
    pub ebitdar: Option<Decimal>,
    pub ebitda: Option<Decimal>,
    pub net_income: Option<Decimal>,
    pub management_fee: Option<Decimal>,
    pub lease_expense: Option<Decimal>,
}

/// Statement-parser output for one facility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacilitySection {
    pub facility_name: String,
    pub sheet_name: String,
    pub census: Census,
    pub line_items: Vec<LineItem>,
    pub summary: SummaryMetrics,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PropertyType {
    OwnedSkilled,
    Leased,
    AssistedSpecificNeeds,
    #[default]
    Unspecified,
}

/// Words a property-type section row may be made of.
const SECTION_WORDS: &[&str] = &[
    "owned", "own", "skilled", "nursing", "snf", "snfs", "leased", "lease", "leases", "opco",
    "assisted", "living", "alf", "alfs", "specific", "needs", "sn", "memory", "care", "senior",
    "housing", "facility", "facilities", "property", "properties", "home", "homes", "center",
    "centers", "and",
];

impl PropertyType {
    /// Recognise a section-header label such as "Owned – Skilled".
    pub fn from_header(s: &str) -> Option<PropertyType> {
        let words: String = s
            .to_lowercase()
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { ' ' })
            .collect();
        let words: Vec<&str> = words.split_whitespace().collect();
        let has = |w: &str| words.contains(&w);

        if has("assisted") || has("alf") || (has("specific") && has("needs")) || has("sn") {
            Some(PropertyType::AssistedSpecificNeeds)
        } else if has("leased") || has("lease") || has("opco") {
            Some(PropertyType::Leased)
        } else if has("skilled") || has("snf") || has("owned") {
            Some(PropertyType::OwnedSkilled)
        } else {
            None
        }
    }

    /// Like [`PropertyType::from_header`], but only when every word of the
    /// label is property-type vocabulary. "Harbor SNF (closed)" is a note,
    /// not a section.
    pub fn from_section_label(s: &str) -> Option<PropertyType> {
        let lower = s.to_lowercase();
        let all_vocabulary = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .all(|w| SECTION_WORDS.contains(&w));
        if all_vocabulary {
            PropertyType::from_header(s)
        } else {
            None
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyType::OwnedSkilled => write!(f, "owned-skilled"),
            PropertyType::Leased => write!(f, "leased"),
            PropertyType::AssistedSpecificNeeds => write!(f, "assisted-specific-needs"),
            PropertyType::Unspecified => write!(f, "unspecified"),
        }
    }
}

/// Exactly one of cap rate or multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "basis", content = "rate", rename_all = "snake_case")]
pub enum RateBasis {
    CapRate(Decimal),
    Multiplier(Decimal),
}

impl RateBasis {
    /// A parsed rate above 1 is a multiplier, otherwise a cap rate.
    pub fn from_parsed(rate: Decimal) -> RateBasis {
        if rate > Decimal::ONE {
            RateBasis::Multiplier(rate)
        } else {
            RateBasis::CapRate(rate)
        }
    }

    pub fn cap_rate(&self) -> Option<Decimal> {
        match self {
            RateBasis::CapRate(r) => Some(*r),
            RateBasis::Multiplier(_) => None,
        }
    }

    pub fn multiplier(&self) -> Option<Decimal> {
        match self {
            RateBasis::Multiplier(m) => Some(*m),
            RateBasis::CapRate(_) => None,
        }
    }

    /// Value implied by an earnings figure under this basis.
    pub fn apply(&self, earnings: Decimal) -> Option<Decimal> {
        match self {
            RateBasis::CapRate(r) if !r.is_zero() => Some(earnings / *r),
            RateBasis::CapRate(_) => None,
            RateBasis::Multiplier(m) => Some(earnings * *m),
        }
    }
}

/// Earnings and value figures for one fiscal year of a valuation entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearFigures {
    /// Fiscal-year label taken from the header, e.g. "2024".
    pub label: Option<String>,
    pub ebitda: Option<Decimal>,
    pub net_income: Option<Decimal>,
    pub value: Option<Decimal>,
    pub value_per_bed: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValuationEntry {
    pub facility_name: String,
    pub property_type: PropertyType,
    /// Always positive.
    pub beds: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specific_needs_pct: Option<Decimal>,
    pub rate: RateBasis,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prior_year: Option<YearFigures>,
    pub current_year: YearFigures,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    pub source_row: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryTotal {
    pub property_type: PropertyType,
    pub count: usize,
    pub beds: u32,
    pub value: Decimal,
    pub average_value_per_bed: Option<Decimal>,
}

/// Valuation-entry parser output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValuationWorkbook {
    pub sheet_name: String,
    pub entries: Vec<ValuationEntry>,
    pub category_totals: Vec<CategoryTotal>,
    pub portfolio_total: CategoryTotal,
}

/// A portfolio metric at several granularities.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricValue {
    pub annual: Decimal,
    pub monthly: Option<Decimal>,
    pub per_patient_day: Option<Decimal>,
    pub margin: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinancialLine {
    pub label: String,
    pub annual: Decimal,
    pub monthly: Option<Decimal>,
    pub per_patient_day: Option<Decimal>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortfolioFinancials {
    pub total_revenue: MetricValue,
    pub ebitdar: MetricValue,
    pub ebitda: MetricValue,
    pub total_expenses: Option<MetricValue>,
    pub revenue_lines: Vec<FinancialLine>,
    pub expense_lines: Vec<FinancialLine>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityGroup {
    pub name: String,
    pub geography: Option<String>,
    pub financials: PortfolioFinancials,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortfolioScenario {
    pub name: String,
    pub sheet_name: String,
    pub groups: Vec<EntityGroup>,
    pub totals: PortfolioFinancials,
}

/// Portfolio-model parser output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortfolioModel {
    pub scenarios: Vec<PortfolioScenario>,
    /// Individual-facility sheets delegated to the statement parser.
    pub facilities: Vec<FacilitySection>,
}

/// Facility classification record from a census-style listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacilityClassification {
    pub facility_name: String,
    pub sheet_name: String,
    pub beds: Option<u32>,
}
