//! Portfolio rollups: scenario sheets broken into entity groups, each with a
//! revenue/expense breakdown and summary metrics, plus portfolio totals.
//!
//! Sheets that are neither a scenario nor already handled elsewhere are
//! passed whole to the [`StatementParser`] as individual facilities.

use log::{debug, info};
use rust_decimal::Decimal;

use crate::ledger::LedgerMapping;
use crate::model::{
    EntityGroup, FinancialLine, MetricValue, PortfolioFinancials, PortfolioModel,
    PortfolioScenario, PropertyType, SheetType, Worksheet,
};
use crate::parsing::layout::{
    ColumnLayout, ColumnSpec, ContentKind, ContentRule, ContentScan, FixedLayout, HeaderScan,
    LayoutDetector,
};
use crate::parsing::normalize::{contains_word, state_code};
use crate::parsing::statement::StatementParser;
use crate::parsing::{is_total_label, row_label};
use crate::warnings::{push_warning, ExtractionWarning, Stage, WarningSeverity};

const SCENARIO_HINTS: &[&str] = &[
    "current state",
    "current-state",
    "target occupancy",
    "target",
    "stabilized",
    "stabilised",
    "pro forma",
    "pro-forma",
    "proforma",
    "scenario",
    "as-is",
];

const ROLLUP_HINTS: &[&str] = &["rollup", "roll-up", "roll up", "consolidated", "portfolio"];

const PORTFOLIO_TOTAL_MARKERS: &[&str] = &[
    "grand total",
    "portfolio total",
    "total portfolio",
    "consolidated total",
    "total consolidated",
];

/// Sheets shorter than this are notes or cover pages, not facilities.
const MIN_DELEGATED_ROWS: usize = 10;

/// Rows at the bottom of a sheet searched for portfolio EBITDA/EBITDAR.
const END_WINDOW: usize = 10;

const PORTFOLIO_SPECS: &[ColumnSpec] = &[
    ColumnSpec::optional("ppd", &["ppd", "per patient day", "per day", "prd"]),
    ColumnSpec::optional("monthly", &["monthly", "per month", "month"]),
    ColumnSpec::required("annual", &["annual", "annualized", "total", "year", "amount", "t12"])
        .excluding(&["ppd", "per patient", "per day", "%", "margin"]),
    ColumnSpec::optional("label", &["description", "line item", "label", "account", "item"]),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SummaryKind {
    TotalRevenue,
    TotalExpenses,
    Ebitdar,
    Ebitda,
}

fn summary_kind(label: &str) -> Option<SummaryKind> {
    let lower = label.trim().to_lowercase();
    if contains_word(&lower, "ebitdar") {
        Some(SummaryKind::Ebitdar)
    } else if contains_word(&lower, "ebitda") {
        Some(SummaryKind::Ebitda)
    } else if lower.contains("total revenue")
        || lower.contains("net revenue")
        || lower.contains("total operating revenue")
    {
        Some(SummaryKind::TotalRevenue)
    } else if lower.contains("total expense")
        || lower.contains("total operating expense")
        || lower.contains("total costs")
    {
        Some(SummaryKind::TotalExpenses)
    } else {
        None
    }
}

fn portfolio_total_marker(label: &str) -> bool {
    let lower = label.to_lowercase();
    PORTFOLIO_TOTAL_MARKERS.iter().any(|m| lower.contains(m))
}

/// One data row of a rollup.
#[derive(Debug, Clone)]
struct RollupRow<'s> {
    label: &'s str,
    annual: Decimal,
    monthly: Option<Decimal>,
    ppd: Option<Decimal>,
}

impl RollupRow<'_> {
    fn metric(&self) -> MetricValue {
        MetricValue {
            annual: self.annual,
            monthly: self.monthly,
            per_patient_day: self.ppd,
            margin: None,
        }
    }
}

/// Accumulates rows for one group (or the portfolio totals).
#[derive(Debug, Default)]
struct FinancialsBuilder {
    total_revenue: Option<MetricValue>,
    total_expenses: Option<MetricValue>,
    ebitdar: Option<MetricValue>,
    ebitda: Option<MetricValue>,
    revenue_lines: Vec<FinancialLine>,
    expense_lines: Vec<FinancialLine>,
    /// Lines after the first total-revenue marker are expenses.
    past_revenue: bool,
}

impl FinancialsBuilder {
    fn add(&mut self, row: &RollupRow<'_>) {
        if let Some(kind) = summary_kind(row.label) {
            let slot = match kind {
                SummaryKind::TotalRevenue => {
                    self.past_revenue = true;
                    &mut self.total_revenue
                }
                SummaryKind::TotalExpenses => &mut self.total_expenses,
                SummaryKind::Ebitdar => &mut self.ebitdar,
                SummaryKind::Ebitda => &mut self.ebitda,
            };
            slot.get_or_insert_with(|| row.metric());
            return;
        }
        if is_total_label(row.label) {
            return;
        }
        let line = FinancialLine {
            label: row.label.to_string(),
            annual: row.annual,
            monthly: row.monthly,
            per_patient_day: row.ppd,
        };
        if self.past_revenue {
            self.expense_lines.push(line);
        } else {
            self.revenue_lines.push(line);
        }
    }

    fn has_summary(&self) -> bool {
        self.total_revenue.is_some() || self.ebitdar.is_some() || self.ebitda.is_some()
    }

    fn is_empty(&self) -> bool {
        !self.has_summary()
            && self.total_expenses.is_none()
            && self.revenue_lines.is_empty()
            && self.expense_lines.is_empty()
    }

    fn finish(self) -> PortfolioFinancials {
        let mut total_revenue = self
            .total_revenue
            .unwrap_or_else(|| sum_lines(&self.revenue_lines));
        let mut total_expenses = self.total_expenses.or_else(|| {
            (!self.expense_lines.is_empty()).then(|| sum_lines(&self.expense_lines))
        });
        let mut ebitdar = self.ebitdar.unwrap_or_else(|| MetricValue {
            annual: total_revenue.annual
                - total_expenses.as_ref().map_or(Decimal::ZERO, |e| e.annual.abs()),
            ..Default::default()
        });
        let mut ebitda = self.ebitda.unwrap_or_else(|| MetricValue {
            annual: ebitdar.annual,
            ..Default::default()
        });

        let revenue = total_revenue.annual;
        for metric in [&mut ebitdar, &mut ebitda]
            .into_iter()
            .chain(total_expenses.as_mut())
        {
            metric.margin = margin(metric.annual, revenue);
        }
        total_revenue.margin = None;

        PortfolioFinancials {
            total_revenue,
            ebitdar,
            ebitda,
            total_expenses,
            revenue_lines: self.revenue_lines,
            expense_lines: self.expense_lines,
        }
    }
}

fn sum_lines(lines: &[FinancialLine]) -> MetricValue {
    let monthly = lines
        .iter()
        .map(|l| l.monthly)
        .sum::<Option<Decimal>>()
        .filter(|_| !lines.is_empty());
    MetricValue {
        annual: lines.iter().map(|l| l.annual).sum(),
        monthly,
        per_patient_day: None,
        margin: None,
    }
}

fn margin(value: Decimal, revenue: Decimal) -> Option<Decimal> {
    (revenue > Decimal::ZERO).then(|| (value / revenue).round_dp(4))
}

#[derive(Debug)]
struct GroupBuilder {
    name: String,
    geography: Option<String>,
    financials: FinancialsBuilder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Preamble,
    Group,
    Totals,
}

/// Parses scenario rollups and delegates leftover sheets to the statement
/// parser.
#[derive(Debug, Clone)]
pub struct PortfolioParser<'a> {
    mapping: Option<&'a LedgerMapping>,
    header_rows: usize,
    skip_sheets: Vec<String>,
}

impl<'a> PortfolioParser<'a> {
    pub fn new(mapping: Option<&'a LedgerMapping>) -> Self {
        PortfolioParser {
            mapping,
            header_rows: 15,
            skip_sheets: Vec::new(),
        }
    }

    pub fn with_header_rows(mut self, rows: usize) -> Self {
        self.header_rows = rows;
        self
    }

    /// Sheets already handled by another parser; never delegated.
    pub fn skipping(mut self, names: impl IntoIterator<Item = String>) -> Self {
        self.skip_sheets.extend(names);
        self
    }

    /// Parse every scenario sheet. Returns `None` when the workbook has no
    /// scenario or rollup sheet.
    pub fn parse(
        &self,
        sheets: &[Worksheet],
        warnings: &mut Vec<ExtractionWarning>,
    ) -> Option<PortfolioModel> {
        let scenario_sheets = find_scenario_sheets(sheets);
        if scenario_sheets.is_empty() {
            return None;
        }

        let mut model = PortfolioModel::default();
        for sheet in &scenario_sheets {
            if let Some(scenario) = self.parse_scenario(sheet, warnings) {
                model.scenarios.push(scenario);
            }
        }

        let statements = StatementParser::new(self.mapping).with_header_rows(self.header_rows);
        for sheet in sheets {
            let matched = scenario_sheets.iter().any(|s| s.name == sheet.name)
                || self.skip_sheets.contains(&sheet.name);
            let delegable = matches!(sheet.sheet_type, SheetType::Statement | SheetType::Unknown);
            if matched || !delegable || sheet.row_count <= MIN_DELEGATED_ROWS {
                continue;
            }
            debug!("portfolio: delegating sheet '{}' to the statement parser", sheet.name);
            model.facilities.extend(statements.parse_sheet(sheet, warnings));
        }

        info!(
            "portfolio: {} scenarios, {} delegated facilities",
            model.scenarios.len(),
            model.facilities.len()
        );
        Some(model)
    }

    /// Parse one scenario sheet into entity groups and totals.
    pub fn parse_scenario(
        &self,
        sheet: &Worksheet,
        warnings: &mut Vec<ExtractionWarning>,
    ) -> Option<PortfolioScenario> {
        if sheet.is_empty() {
            push_warning(
                warnings,
                Stage::Portfolio,
                Some(&sheet.name),
                WarningSeverity::Info,
                "empty scenario sheet skipped",
            );
            return None;
        }
        let Some(layout) = self.detect_layout(sheet) else {
            push_warning(
                warnings,
                Stage::Layout,
                Some(&sheet.name),
                WarningSeverity::Important,
                "could not detect rollup columns",
            );
            return None;
        };
        let annual_col = layout.get("annual")?;
        let numeric_cols: Vec<usize> = ["annual", "monthly", "ppd"]
            .iter()
            .filter_map(|c| layout.get(c))
            .collect();
        let label_limit = numeric_cols.iter().copied().min().unwrap_or(annual_col);

        let mut groups: Vec<GroupBuilder> = Vec::new();
        let mut preamble = FinancialsBuilder::default();
        let mut totals = FinancialsBuilder::default();
        let mut mode = Mode::Preamble;

        for row in layout.first_data_row..sheet.row_count {
            if Some(row) == layout.header_row {
                continue;
            }
            let Some(label) = row_label(sheet, row, layout.get("label"), label_limit) else {
                continue;
            };
            let annual = sheet.number(row, annual_col);

            if portfolio_total_marker(label) {
                mode = Mode::Totals;
                if let Some(annual) = annual {
                    if summary_kind(label).is_some() {
                        totals.add(&rollup_row(sheet, row, label, annual, &layout));
                    }
                }
                continue;
            }

            if annual.is_none() && is_label_row(sheet, row) {
                if let Some((name, geography)) = group_header(label) {
                    debug!(
                        "sheet '{}': row {} starts group '{}' ({:?})",
                        sheet.name, row, name, geography
                    );
                    groups.push(GroupBuilder {
                        name,
                        geography,
                        financials: FinancialsBuilder::default(),
                    });
                    mode = Mode::Group;
                    continue;
                }
            }

            let Some(annual) = annual else {
                continue;
            };
            let data = rollup_row(sheet, row, label, annual, &layout);
            match (mode, groups.last_mut()) {
                (Mode::Group, Some(group)) => group.financials.add(&data),
                (Mode::Totals, _) => totals.add(&data),
                _ => preamble.add(&data),
            }
        }

        if !totals.has_summary() {
            if groups.is_empty() {
                totals = preamble;
            } else {
                scan_sheet_end(sheet, &layout, label_limit, &mut totals);
                fill_from_groups(&mut totals, &groups);
            }
        }

        if groups.is_empty() && totals.is_empty() {
            push_warning(
                warnings,
                Stage::Portfolio,
                Some(&sheet.name),
                WarningSeverity::Important,
                "no rollup figures extracted",
            );
            return None;
        }

        let groups: Vec<EntityGroup> = groups
            .into_iter()
            .filter(|g| !g.financials.is_empty())
            .map(|g| EntityGroup {
                name: g.name,
                geography: g.geography,
                financials: g.financials.finish(),
            })
            .collect();
        debug!("sheet '{}': {} entity groups", sheet.name, groups.len());

        Some(PortfolioScenario {
            name: scenario_name(&sheet.name),
            sheet_name: sheet.name.clone(),
            groups,
            totals: totals.finish(),
        })
    }

    fn detect_layout(&self, sheet: &Worksheet) -> Option<ColumnLayout> {
        LayoutDetector::new()
            .then(HeaderScan {
                max_rows: self.header_rows,
            })
            .then(ContentScan::new(vec![
                ContentRule::new("label", ContentKind::LongText { min_len: 3 }),
                ContentRule::new(
                    "annual",
                    ContentKind::Numeric {
                        prefer_rightmost: false,
                    },
                ),
            ]))
            .then(FixedLayout {
                columns: vec![("label", 0), ("annual", 1)],
                first_data_row: 0,
            })
            .detect(sheet, PORTFOLIO_SPECS)
    }
}

/// Scenario sheets by name, else a single rollup sheet.
pub fn find_scenario_sheets(sheets: &[Worksheet]) -> Vec<&Worksheet> {
    let scenarios: Vec<&Worksheet> = sheets
        .iter()
        .filter(|s| {
            let name = s.name.to_lowercase();
            SCENARIO_HINTS.iter().any(|h| name.contains(h))
        })
        .collect();
    if !scenarios.is_empty() {
        return scenarios;
    }
    sheets
        .iter()
        .find(|s| {
            let name = s.name.to_lowercase();
            ROLLUP_HINTS.iter().any(|h| name.contains(h))
        })
        .into_iter()
        .collect()
}

fn scenario_name(sheet_name: &str) -> String {
    sheet_name.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn rollup_row<'s>(
    sheet: &Worksheet,
    row: usize,
    label: &'s str,
    annual: Decimal,
    layout: &ColumnLayout,
) -> RollupRow<'s> {
    RollupRow {
        label,
        annual,
        monthly: layout.get("monthly").and_then(|c| sheet.number(row, c)),
        ppd: layout.get("ppd").and_then(|c| sheet.number(row, c)),
    }
}

/// Few populated cells and no figures.
fn is_label_row(sheet: &Worksheet, row: usize) -> bool {
    sheet.populated_count(row) <= 2 && sheet.row(row).iter().all(|c| c.as_number().is_none())
}

/// A group header: "<state> - <group>" or a bare property-type label.
/// Returns the group name and its geography.
fn group_header(label: &str) -> Option<(String, Option<String>)> {
    let label = label.trim();
    if let Some(code) = geography_prefix(label) {
        return Some((label.to_string(), Some(code.to_string())));
    }
    PropertyType::from_header(label).map(|_| (label.to_string(), None))
}

fn geography_prefix(label: &str) -> Option<&'static str> {
    for sep in [" - ", " – ", ": ", " | "] {
        if let Some((left, right)) = label.split_once(sep) {
            if !right.trim().is_empty() {
                return state_code(left);
            }
        }
    }
    let words: Vec<&str> = label.split_whitespace().collect();
    if words.len() < 2 {
        return None;
    }
    // "New York Leased" before "Texas Owned".
    if words.len() >= 3 {
        if let Some(code) = state_code(&words[..2].join(" ")) {
            return Some(code);
        }
    }
    state_code(words[0])
}

/// EBITDA/EBITDAR rows in the last rows of the sheet, when no totals block
/// was found.
fn scan_sheet_end(
    sheet: &Worksheet,
    layout: &ColumnLayout,
    label_limit: usize,
    totals: &mut FinancialsBuilder,
) {
    let Some(annual_col) = layout.get("annual") else {
        return;
    };
    let start = sheet.row_count.saturating_sub(END_WINDOW).max(layout.first_data_row);
    for row in (start..sheet.row_count).rev() {
        let Some(label) = row_label(sheet, row, layout.get("label"), label_limit) else {
            continue;
        };
        let lower = label.to_lowercase();
        let portfolio_wide = ["total", "portfolio", "consolidated"]
            .iter()
            .any(|w| contains_word(&lower, w));
        if !portfolio_wide {
            continue;
        }
        let Some(annual) = sheet.number(row, annual_col) else {
            continue;
        };
        let data = rollup_row(sheet, row, label, annual, layout);
        match summary_kind(label) {
            Some(SummaryKind::Ebitdar) if totals.ebitdar.is_none() => {
                totals.ebitdar = Some(data.metric());
            }
            Some(SummaryKind::Ebitda) if totals.ebitda.is_none() => {
                totals.ebitda = Some(data.metric());
            }
            _ => {}
        }
    }
}

/// Sum group summaries into any portfolio metric still missing.
fn fill_from_groups(totals: &mut FinancialsBuilder, groups: &[GroupBuilder]) {
    fn sum(
        groups: &[GroupBuilder],
        pick: impl Fn(&FinancialsBuilder) -> Option<&MetricValue>,
    ) -> Option<MetricValue> {
        let metrics: Vec<&MetricValue> =
            groups.iter().filter_map(|g| pick(&g.financials)).collect();
        if metrics.is_empty() {
            return None;
        }
        Some(MetricValue {
            annual: metrics.iter().map(|m| m.annual).sum(),
            monthly: metrics.iter().map(|m| m.monthly).sum(),
            per_patient_day: None,
            margin: None,
        })
    }

    if totals.total_revenue.is_none() {
        totals.total_revenue = sum(groups, |f| f.total_revenue.as_ref());
    }
    if totals.total_expenses.is_none() {
        totals.total_expenses = sum(groups, |f| f.total_expenses.as_ref());
    }
    if totals.ebitdar.is_none() {
        totals.ebitdar = sum(groups, |f| f.ebitdar.as_ref());
    }
    if totals.ebitda.is_none() {
        totals.ebitda = sum(groups, |f| f.ebitda.as_ref());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn rollup() -> Worksheet {
        Worksheet::from_rows(
            "Current State",
            &[
                &["Portfolio Rollup"],
                &["Description", "Annual", "Monthly", "PPD"],
                &["ID - Owned SNF"],
                &["Medicare", "1,200,000", "100,000", "600"],
                &["Medicaid", "2,400,000", "200,000", "250"],
                &["Total Revenue", "3,600,000", "300,000", "320"],
                &["Nursing", "1,800,000", "150,000", "160"],
                &["Dietary", "300,000", "25,000", "27"],
                &["Total Expenses", "2,100,000", "175,000", "187"],
                &["EBITDAR", "1,500,000", "125,000", "133"],
                &["Rent", "500,000", "41,667", ""],
                &["EBITDA", "1,000,000", "83,333", "89"],
                &["Leased"],
                &["Medicaid", "1,000,000", "", ""],
                &["Total Revenue", "1,000,000", "", ""],
                &["Nursing", "900,000", "", ""],
                &["EBITDA", "100,000", "", ""],
                &["Portfolio Total"],
                &["Total Revenue", "4,600,000", "", ""],
                &["EBITDAR", "1,700,000", "", ""],
                &["EBITDA", "1,100,000", "", ""],
            ],
        )
    }

    #[test]
    fn test_groups_and_totals() {
        let mut warnings = Vec::new();
        let scenario = PortfolioParser::new(None)
            .parse_scenario(&rollup(), &mut warnings)
            .unwrap();
        assert_eq!(scenario.name, "Current State");
        assert_eq!(scenario.groups.len(), 2);

        let owned = &scenario.groups[0];
        assert_eq!(owned.name, "ID - Owned SNF");
        assert_eq!(owned.geography.as_deref(), Some("ID"));
        assert_eq!(owned.financials.revenue_lines.len(), 2);
        assert_eq!(owned.financials.expense_lines.len(), 3);
        assert_eq!(owned.financials.total_revenue.annual, dec!(3600000));
        assert_eq!(owned.financials.total_revenue.monthly, Some(dec!(300000)));
        assert_eq!(owned.financials.ebitdar.annual, dec!(1500000));
        assert_eq!(owned.financials.ebitdar.margin, Some(dec!(0.4167)));
        assert_eq!(owned.financials.ebitda.per_patient_day, Some(dec!(89)));

        let leased = &scenario.groups[1];
        assert_eq!(leased.name, "Leased");
        assert_eq!(leased.geography, None);
        assert_eq!(leased.financials.ebitda.annual, dec!(100000));
        assert_eq!(leased.financials.ebitda.margin, Some(dec!(0.1)));

        assert_eq!(scenario.totals.total_revenue.annual, dec!(4600000));
        assert_eq!(scenario.totals.ebitdar.annual, dec!(1700000));
        assert_eq!(scenario.totals.ebitda.annual, dec!(1100000));
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_summary_rows_not_in_breakdown() {
        let mut warnings = Vec::new();
        let scenario = PortfolioParser::new(None)
            .parse_scenario(&rollup(), &mut warnings)
            .unwrap();
        for group in &scenario.groups {
            let lines = group
                .financials
                .revenue_lines
                .iter()
                .chain(&group.financials.expense_lines);
            for line in lines {
                assert!(summary_kind(&line.label).is_none(), "{}", line.label);
            }
        }
    }

    #[test]
    fn test_totals_from_groups_and_sheet_end() {
        let ws = Worksheet::from_rows(
            "Stabilized",
            &[
                &["Description", "Annual"],
                &["TX - Owned"],
                &["Medicare", "1,000,000"],
                &["Total Revenue", "1,000,000"],
                &["EBITDA", "200,000"],
                &["Idaho Leased"],
                &["Medicaid", "500,000"],
                &["Total Revenue", "500,000"],
                &["EBITDA", "50,000"],
                &["Total EBITDA", "250,000"],
            ],
        );
        let mut warnings = Vec::new();
        let scenario = PortfolioParser::new(None)
            .parse_scenario(&ws, &mut warnings)
            .unwrap();
        assert_eq!(scenario.groups.len(), 2);
        assert_eq!(scenario.groups[1].geography.as_deref(), Some("ID"));
        assert_eq!(scenario.totals.total_revenue.annual, dec!(1500000));
        assert_eq!(scenario.totals.ebitda.annual, dec!(250000));
    }

    #[test]
    fn test_single_rollup_without_groups() {
        let ws = Worksheet::from_rows(
            "Portfolio Rollup",
            &[
                &["Description", "Annual"],
                &["Medicare", "1,000,000"],
                &["Total Revenue", "1,000,000"],
                &["Nursing", "600,000"],
                &["EBITDA", "400,000"],
            ],
        );
        let sheets = vec![ws];
        let mut warnings = Vec::new();
        let model = PortfolioParser::new(None).parse(&sheets, &mut warnings).unwrap();
        assert_eq!(model.scenarios.len(), 1);
        let totals = &model.scenarios[0].totals;
        assert_eq!(totals.total_revenue.annual, dec!(1000000));
        assert_eq!(totals.ebitda.margin, Some(dec!(0.4)));
        assert_eq!(totals.expense_lines.len(), 1);
    }

    #[test]
    fn test_parenthesised_expenses_reduce_ebitdar() {
        let ws = Worksheet::from_rows(
            "Portfolio Rollup",
            &[
                &["Description", "Annual"],
                &["Medicare", "1,000,000"],
                &["Total Revenue", "1,000,000"],
                &["Nursing", "(600,000)"],
                &["Dietary", "(100,000)"],
            ],
        );
        let sheets = vec![ws];
        let model = PortfolioParser::new(None).parse(&sheets, &mut Vec::new()).unwrap();
        let totals = &model.scenarios[0].totals;
        assert_eq!(totals.ebitdar.annual, dec!(300000));
        assert_eq!(totals.ebitda.annual, dec!(300000));
    }

    #[test]
    fn test_delegates_unmatched_sheets() {
        let mut rows: Vec<Vec<String>> = vec![vec!["Harbor Point T12".into()]];
        for i in 0..12 {
            rows.push(vec![format!("Medicare {i}"), "1,000".into()]);
        }
        let refs: Vec<Vec<&str>> = rows.iter().map(|r| r.iter().map(String::as_str).collect()).collect();
        let slices: Vec<&[&str]> = refs.iter().map(|r| r.as_slice()).collect();
        let mut facility = Worksheet::from_rows("Harbor Point", &slices);
        facility.sheet_type = SheetType::Statement;
        let short = Worksheet::from_rows("Notes", &[&["Medicare", "5"]]);
        let mut census = Worksheet::from_rows("Bed Census", &slices);
        census.sheet_type = SheetType::Census;

        let sheets = vec![rollup(), facility, short, census];
        let mut warnings = Vec::new();
        let model = PortfolioParser::new(None).parse(&sheets, &mut warnings).unwrap();
        assert_eq!(model.facilities.len(), 1);
        assert_eq!(model.facilities[0].sheet_name, "Harbor Point");

        let skipped = PortfolioParser::new(None)
            .skipping(["Harbor Point".to_string()])
            .parse(&sheets, &mut warnings)
            .unwrap();
        assert!(skipped.facilities.is_empty());
    }

    #[test]
    fn test_no_scenarios() {
        let sheets = vec![Worksheet::from_rows("T12", &[&["x"]])];
        let mut warnings = Vec::new();
        assert!(PortfolioParser::new(None).parse(&sheets, &mut warnings).is_none());
    }

    #[test]
    fn test_group_header_forms() {
        assert_eq!(
            group_header("ID - Owned SNF"),
            Some(("ID - Owned SNF".to_string(), Some("ID".to_string())))
        );
        assert_eq!(
            group_header("New York Leased Group"),
            Some(("New York Leased Group".to_string(), Some("NY".to_string())))
        );
        assert_eq!(group_header("Assisted Living"), Some(("Assisted Living".to_string(), None)));
        assert_eq!(group_header("Revenue"), None);
    }
}
