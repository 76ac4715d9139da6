//! Valuation worksheets: one entry per facility with beds, cap rate or
//! multiplier, paired fiscal-year earnings and the implied value.

use log::{debug, info};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

use crate::model::{
    CategoryTotal, PropertyType, RateBasis, SheetType, ValuationEntry, ValuationWorkbook,
    Worksheet, YearFigures,
};
use crate::parsing::is_total_label;
use crate::parsing::layout::{
    matching_columns, ColumnLayout, ColumnSpec, ContentKind, ContentRule, ContentScan,
    DetectionTier, FixedLayout, HeaderScan, LayoutDetector,
};
use crate::parsing::normalize::{canonical_facility_name, facility_key, state_code};
use crate::parsing::values::{count_from_decimal, parse_count};
use crate::warnings::{push_warning, ExtractionWarning, Stage, WarningSeverity};

const VALUATION_SHEET_HINTS: &[(&str, u32)] = &[
    ("valuation", 3),
    ("appraisal", 3),
    ("pricing", 2),
    ("value", 1),
];

const LISTING_SHEET_HINTS: &[&str] = &[
    "listing",
    "facility list",
    "facilities",
    "properties",
    "locations",
    "roster",
];

const NAME_SPEC: ColumnSpec = ColumnSpec::required("name", &["facility", "property", "name", "asset"])
    .excluding(&["type", "count", "value"]);
const BEDS_SPEC: ColumnSpec = ColumnSpec::required("beds", &["beds", "units", "licensed"])
    .excluding(&["per bed", "/bed", "per unit", "value"]);
const SN_SPEC: ColumnSpec =
    ColumnSpec::optional("sn_pct", &["sn %", "sn%", "% sn", "specific needs"]);
const PER_BED_SPEC: ColumnSpec =
    ColumnSpec::optional("value_per_bed", &["per bed", "/bed", "per unit"]);
const RATE_SPEC: ColumnSpec =
    ColumnSpec::optional("rate", &["cap rate", "cap", "multiple", "multiplier", "rate"])
        .excluding(&["per bed", "occupancy", "ebitda"]);
const EBITDA_SPEC: ColumnSpec =
    ColumnSpec::optional("ebitda", &["ebitda"]).excluding(&["ebitdar", "margin", "multiple"]);
const NET_INCOME_SPEC: ColumnSpec = ColumnSpec::optional("net_income", &["net income"]);
const VALUE_SPEC: ColumnSpec = ColumnSpec::optional("value", &["value", "price", "valuation"])
    .excluding(&["per bed", "/bed", "per unit"]);
const CITY_SPEC: ColumnSpec = ColumnSpec::optional("city", &["city"]);
const STATE_SPEC: ColumnSpec = ColumnSpec::optional("state", &["state"]).excluding(&["statement"]);

/// Claim order matters: narrower headers first.
const VALUATION_SPECS: &[ColumnSpec] = &[
    PER_BED_SPEC,
    SN_SPEC,
    BEDS_SPEC,
    RATE_SPEC,
    EBITDA_SPEC,
    NET_INCOME_SPEC,
    VALUE_SPEC,
    CITY_SPEC,
    STATE_SPEC,
    NAME_SPEC,
];

/// Prior/current columns for one metric.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct YearColumns {
    prior: Option<usize>,
    current: Option<usize>,
}

#[derive(Debug, Clone, Default)]
struct ValuationColumns {
    name: Option<usize>,
    beds: Option<usize>,
    sn_pct: Option<usize>,
    rate: Option<usize>,
    city: Option<usize>,
    state: Option<usize>,
    ebitda: YearColumns,
    net_income: YearColumns,
    value: YearColumns,
    value_per_bed: YearColumns,
    prior_label: Option<String>,
    current_label: Option<String>,
}

/// Parses a valuation worksheet into entries and totals.
#[derive(Debug, Clone, Copy)]
pub struct ValuationParser {
    pub header_rows: usize,
    /// Rates within this distance of 1.0 raise a warning.
    pub rate_band: Decimal,
}

impl Default for ValuationParser {
    fn default() -> Self {
        ValuationParser {
            header_rows: 15,
            rate_band: Decimal::new(10, 2),
        }
    }
}

impl ValuationParser {
    /// Locate the valuation sheet and parse it, enriching entries from a
    /// listing sheet when one exists.
    pub fn parse_workbook(
        &self,
        sheets: &[Worksheet],
        warnings: &mut Vec<ExtractionWarning>,
    ) -> Option<ValuationWorkbook> {
        let sheet = find_valuation_sheet(sheets)?;
        let listing = find_listing_sheet(sheets, &sheet.name);
        let workbook = self.parse_sheet(sheet, listing, warnings);
        info!(
            "valuation sheet '{}': {} entries across {} property types",
            workbook.sheet_name,
            workbook.entries.len(),
            workbook.category_totals.len()
        );
        Some(workbook)
    }

    pub fn parse_sheet(
        &self,
        sheet: &Worksheet,
        listing: Option<&Worksheet>,
        warnings: &mut Vec<ExtractionWarning>,
    ) -> ValuationWorkbook {
        let mut entries = Vec::new();

        let layout = LayoutDetector::new()
            .then(HeaderScan {
                max_rows: self.header_rows,
            })
            .then(ContentScan::new(vec![
                ContentRule::new("beds", ContentKind::IntegerRange { min: 10, max: 500 }),
                ContentRule::new("name", ContentKind::LongText { min_len: 4 }),
            ]))
            .then(FixedLayout {
                columns: vec![("name", 0), ("beds", 1), ("ebitda", 2), ("rate", 3), ("value", 4)],
                first_data_row: 1,
            })
            .detect(sheet, VALUATION_SPECS);

        let Some(layout) = layout else {
            push_warning(
                warnings,
                Stage::Layout,
                Some(&sheet.name),
                WarningSeverity::Important,
                "could not detect valuation columns",
            );
            return assemble(sheet, entries);
        };

        let columns = resolve_columns(sheet, &layout);
        debug!("valuation sheet '{}': columns {:?}", sheet.name, columns);

        let mut property_type = PropertyType::Unspecified;
        for row in layout.first_data_row..sheet.row_count {
            if Some(row) == layout.header_row {
                continue;
            }
            let name = columns
                .name
                .and_then(|c| sheet.text(row, c))
                .or_else(|| sheet.first_text(row).map(|(_, t)| t));
            let beds = columns.beds.and_then(|c| bed_count(sheet, row, c));

            let numeric = (0..sheet.column_count).any(|c| sheet.number(row, c).is_some());
            if beds.is_none() && !numeric && sheet.populated_count(row) <= 2 {
                if let Some(section) = name.and_then(PropertyType::from_section_label) {
                    debug!("valuation sheet '{}': row {} starts section {}", sheet.name, row, section);
                    property_type = section;
                    continue;
                }
            }

            let Some(name) = name else {
                continue;
            };
            let lower = name.to_lowercase();
            if is_total_label(name) || lower.contains("portfolio") {
                continue;
            }
            let Some(beds) = beds.filter(|b| *b > 0) else {
                continue;
            };

            if let Some(entry) = self.parse_row(sheet, row, name, beds, property_type, &columns, warnings) {
                entries.push(entry);
            }
        }

        if let Some(listing) = listing {
            enrich_geography(&mut entries, listing);
        }

        assemble(sheet, entries)
    }

    #[allow(clippy::too_many_arguments)]
    fn parse_row(
        &self,
        sheet: &Worksheet,
        row: usize,
        name: &str,
        beds: u32,
        property_type: PropertyType,
        columns: &ValuationColumns,
        warnings: &mut Vec<ExtractionWarning>,
    ) -> Option<ValuationEntry> {
        let num = |c: Option<usize>| c.and_then(|c| sheet.number(row, c));

        let mut current = YearFigures {
            label: columns.current_label.clone(),
            ebitda: num(columns.ebitda.current),
            net_income: num(columns.net_income.current),
            value: num(columns.value.current),
            value_per_bed: num(columns.value_per_bed.current),
        };
        let has_prior = [columns.ebitda, columns.net_income, columns.value, columns.value_per_bed]
            .iter()
            .any(|c| c.prior.is_some());
        let mut prior = has_prior.then(|| YearFigures {
            label: columns.prior_label.clone(),
            ebitda: num(columns.ebitda.prior),
            net_income: num(columns.net_income.prior),
            value: num(columns.value.prior),
            value_per_bed: num(columns.value_per_bed.prior),
        });

        let rate = match num(columns.rate).filter(|r| r.is_sign_positive() && !r.is_zero()) {
            Some(r) => {
                let basis = RateBasis::from_parsed(r);
                if (r - Decimal::ONE).abs() <= self.rate_band {
                    let side = match basis {
                        RateBasis::CapRate(_) => "cap rate",
                        RateBasis::Multiplier(_) => "multiplier",
                    };
                    push_warning(
                        warnings,
                        Stage::ValuationEntry,
                        Some(&sheet.name),
                        WarningSeverity::Important,
                        format!(
                            "row {} '{}': rate {} is within {} of 1.0; treated as {}",
                            row + 1,
                            name,
                            r,
                            self.rate_band,
                            side
                        ),
                    );
                }
                basis
            }
            None => match (current.ebitda, current.value) {
                (Some(e), Some(v)) if !v.is_zero() => RateBasis::CapRate((e / v).round_dp(4)),
                _ => {
                    push_warning(
                        warnings,
                        Stage::ValuationEntry,
                        Some(&sheet.name),
                        WarningSeverity::Important,
                        format!(
                            "row {} '{}': no rate and no EBITDA/value to derive one; skipped",
                            row + 1,
                            name
                        ),
                    );
                    return None;
                }
            },
        };

        complete_figures(&mut current, rate, beds);
        if let Some(prior) = prior.as_mut() {
            complete_figures(prior, rate, beds);
        }

        Some(ValuationEntry {
            facility_name: canonical_facility_name(name),
            property_type,
            beds,
            specific_needs_pct: num(columns.sn_pct),
            rate,
            prior_year: prior,
            current_year: current,
            city: columns
                .city
                .and_then(|c| sheet.text(row, c))
                .map(str::to_string),
            state: columns
                .state
                .and_then(|c| sheet.text(row, c))
                .and_then(state_code)
                .map(str::to_string),
            source_row: row,
        })
    }
}

/// Pick the worksheet most likely to hold per-facility valuations, by name.
pub fn find_valuation_sheet(sheets: &[Worksheet]) -> Option<&Worksheet> {
    let mut best: Option<(u32, &Worksheet)> = None;
    for sheet in sheets {
        let name = sheet.name.to_lowercase();
        let score: u32 = VALUATION_SHEET_HINTS
            .iter()
            .filter(|(hint, _)| name.contains(hint))
            .map(|(_, weight)| weight)
            .sum();
        if score > 0 && best.map_or(true, |(s, _)| score > s) {
            best = Some((score, sheet));
        }
    }
    best.map(|(_, sheet)| sheet)
}

/// A facility listing (other than the valuation sheet) used for geography:
/// a sheet named like a listing, else the first census sheet.
pub fn find_listing_sheet<'a>(sheets: &'a [Worksheet], exclude: &str) -> Option<&'a Worksheet> {
    let candidates = || sheets.iter().filter(move |s| s.name != exclude);
    candidates()
        .find(|s| {
            let name = s.name.to_lowercase();
            LISTING_SHEET_HINTS.iter().any(|h| name.contains(h))
        })
        .or_else(|| candidates().find(|s| s.sheet_type == SheetType::Census))
}

fn bed_count(sheet: &Worksheet, row: usize, col: usize) -> Option<u32> {
    let cell = sheet.cell(row, col);
    cell.as_number()
        .and_then(count_from_decimal)
        .or_else(|| cell.as_text().and_then(parse_count))
}

/// Fill value and value-per-bed from the rate where the sheet left them blank.
fn complete_figures(figures: &mut YearFigures, rate: RateBasis, beds: u32) {
    if figures.value.is_none() {
        figures.value = figures
            .ebitda
            .and_then(|e| rate.apply(e))
            .map(|v| v.round_dp(2));
    }
    if figures.value_per_bed.is_none() && beds > 0 {
        figures.value_per_bed = figures
            .value
            .map(|v| (v / Decimal::from(beds)).round_dp(2));
    }
}

fn resolve_columns(sheet: &Worksheet, layout: &ColumnLayout) -> ValuationColumns {
    let mut cols = ValuationColumns {
        name: layout.get("name"),
        beds: layout.get("beds"),
        sn_pct: layout.get("sn_pct"),
        rate: layout.get("rate"),
        city: layout.get("city"),
        state: layout.get("state"),
        ebitda: single(layout.get("ebitda")),
        net_income: single(layout.get("net_income")),
        value: single(layout.get("value")),
        value_per_bed: single(layout.get("value_per_bed")),
        ..Default::default()
    };

    if let Some(header) = layout.header_row {
        let mut labels: Vec<(u32, String)> = Vec::new();
        for (spec, slot) in [
            (&EBITDA_SPEC, &mut cols.ebitda),
            (&NET_INCOME_SPEC, &mut cols.net_income),
            (&VALUE_SPEC, &mut cols.value),
            (&PER_BED_SPEC, &mut cols.value_per_bed),
        ] {
            let found: Vec<usize> = matching_columns(sheet, header, spec)
                .into_iter()
                .filter(|c| Some(*c) != layout.get("rate") && Some(*c) != layout.get("name"))
                .collect();
            if found.len() >= 2 {
                let (pair, years) = pair_by_year(sheet, header, &found);
                *slot = pair;
                labels.extend(years);
            }
        }
        labels.sort();
        labels.dedup();
        if labels.len() >= 2 {
            cols.prior_label = labels.first().map(|(_, l)| l.clone());
            cols.current_label = labels.last().map(|(_, l)| l.clone());
        } else if let Some((_, l)) = labels.first() {
            cols.current_label = Some(l.clone());
        }
    } else if layout.tier != DetectionTier::Default {
        infer_numeric_columns(sheet, layout, &mut cols);
    }

    cols
}

fn single(col: Option<usize>) -> YearColumns {
    YearColumns {
        prior: None,
        current: col,
    }
}

/// Order candidate columns by the fiscal year in their header; the earliest
/// is prior, the latest current. Without years, left is prior.
fn pair_by_year(sheet: &Worksheet, header: usize, cols: &[usize]) -> (YearColumns, Vec<(u32, String)>) {
    let mut dated: Vec<(u32, usize, String)> = cols
        .iter()
        .filter_map(|&c| {
            let text = sheet.text(header, c)?;
            year_token(text).map(|(y, label)| (y, c, label))
        })
        .collect();
    dated.sort();

    if dated.len() >= 2 {
        let first = &dated[0];
        let last = &dated[dated.len() - 1];
        return (
            YearColumns {
                prior: Some(first.1),
                current: Some(last.1),
            },
            dated.iter().map(|(y, _, l)| (*y, l.clone())).collect(),
        );
    }
    (
        YearColumns {
            prior: cols.first().copied(),
            current: cols.last().copied(),
        },
        Vec::new(),
    )
}

/// Fiscal-year token in a header: "2024", "FY2024", "FY24".
fn year_token(text: &str) -> Option<(u32, String)> {
    for word in text.split(|c: char| !c.is_ascii_alphanumeric()) {
        let upper = word.to_ascii_uppercase();
        let digits = upper.strip_prefix("FY").unwrap_or(&upper);
        if !digits.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        match digits.len() {
            4 => {
                if let Ok(y) = digits.parse::<u32>() {
                    if (1900..=2199).contains(&y) {
                        return Some((y, digits.to_string()));
                    }
                }
            }
            2 if upper.starts_with("FY") => {
                if let Ok(y) = digits.parse::<u32>() {
                    return Some((2000 + y, upper.clone()));
                }
            }
            _ => {}
        }
    }
    None
}

/// Without a header: the first column right of the beds column whose numbers
/// all fall in (0, 30) is the rate, then the first two columns of large
/// amounts are EBITDA and value.
fn infer_numeric_columns(sheet: &Worksheet, layout: &ColumnLayout, cols: &mut ValuationColumns) {
    let Some(beds) = cols.beds else {
        return;
    };
    let rows = layout.first_data_row..sheet.row_count;
    let mut large = Vec::new();
    for col in beds + 1..sheet.column_count {
        let numbers: Vec<Decimal> = rows.clone().filter_map(|r| sheet.number(r, col)).collect();
        if numbers.is_empty() {
            continue;
        }
        let small = numbers.iter().all(|n| *n > Decimal::ZERO && *n < Decimal::from(30));
        if small && cols.rate.is_none() {
            cols.rate = Some(col);
        } else if numbers.iter().all(|n| n.abs() >= Decimal::from(1000)) {
            large.push(col);
        }
    }
    if cols.ebitda.current.is_none() {
        cols.ebitda.current = large.first().copied();
    }
    if cols.value.current.is_none() {
        cols.value.current = large.get(1).copied();
    }
}

/// Cross-reference a listing sheet for city and state.
fn enrich_geography(entries: &mut [ValuationEntry], listing: &Worksheet) {
    for entry in entries.iter_mut().filter(|e| e.city.is_none() || e.state.is_none()) {
        let key = facility_key(&entry.facility_name);
        if key.is_empty() {
            continue;
        }
        let found = (0..listing.row_count).find_map(|row| {
            (0..listing.column_count).find_map(|col| {
                let text = listing.text(row, col)?;
                (facility_key(text) == key).then_some((row, col))
            })
        });
        let Some((row, name_col)) = found else {
            continue;
        };

        let (city, state) = geography_near(listing, row, name_col);
        if entry.state.is_none() {
            entry.state = state;
        }
        if entry.city.is_none() {
            entry.city = city;
        }
    }
}

/// Scan the matched row and the two below it for a state token and a
/// capitalized city token.
fn geography_near(sheet: &Worksheet, row: usize, name_col: usize) -> (Option<String>, Option<String>) {
    let mut city = None;
    let mut state = None;

    for r in row..(row + 3).min(sheet.row_count) {
        for c in 0..sheet.column_count {
            if r == row && c == name_col {
                continue;
            }
            let Some(text) = sheet.text(r, c) else {
                continue;
            };
            if let Some((left, right)) = text.rsplit_once(',') {
                if let Some(code) = state_code(right) {
                    state.get_or_insert_with(|| code.to_string());
                    if is_city_token(left.trim()) {
                        city.get_or_insert_with(|| left.trim().to_string());
                    }
                    continue;
                }
            }
            if let Some(code) = state_code(text) {
                state.get_or_insert_with(|| code.to_string());
            } else if r == row && is_city_token(text) {
                city.get_or_insert_with(|| text.to_string());
            }
        }
        if state.is_some() {
            break;
        }
    }

    (city, state)
}

fn is_city_token(text: &str) -> bool {
    let words: Vec<&str> = text.split_whitespace().collect();
    !words.is_empty()
        && words.len() <= 3
        && words.iter().all(|w| {
            w.chars().next().is_some_and(|c| c.is_uppercase())
                && w.chars().all(|c| c.is_alphabetic() || c == '.' || c == '\'' || c == '-')
        })
        && PropertyType::from_header(text).is_none()
}

fn assemble(sheet: &Worksheet, entries: Vec<ValuationEntry>) -> ValuationWorkbook {
    let mut groups: BTreeMap<PropertyType, CategoryTotal> = BTreeMap::new();
    for entry in &entries {
        let total = groups.entry(entry.property_type).or_insert_with(|| empty_total(entry.property_type));
        add_entry(total, entry);
    }
    let mut portfolio_total = empty_total(PropertyType::Unspecified);
    for entry in &entries {
        add_entry(&mut portfolio_total, entry);
    }

    let mut category_totals: Vec<CategoryTotal> = groups.into_values().collect();
    for total in category_totals.iter_mut().chain(std::iter::once(&mut portfolio_total)) {
        total.average_value_per_bed = (total.beds > 0)
            .then(|| (total.value / Decimal::from(total.beds)).round_dp(2));
    }

    ValuationWorkbook {
        sheet_name: sheet.name.clone(),
        entries,
        category_totals,
        portfolio_total,
    }
}

fn empty_total(property_type: PropertyType) -> CategoryTotal {
    CategoryTotal {
        property_type,
        count: 0,
        beds: 0,
        value: Decimal::ZERO,
        average_value_per_bed: None,
    }
}

fn add_entry(total: &mut CategoryTotal, entry: &ValuationEntry) {
    total.count += 1;
    total.beds += entry.beds;
    total.value += entry.current_year.value.unwrap_or(Decimal::ZERO);
}
