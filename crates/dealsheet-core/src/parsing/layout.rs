//! Column/layout detection for unlabeled grids.
//!
//! A [`LayoutDetector`] runs an ordered chain of [`LayoutTier`]s and returns
//! the first layout any tier produces. The usual chain is an explicit header
//! scan, then a content heuristic, then a fixed default layout, but each tier
//! stands alone and parsers assemble the chain they need.

use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::ledger::normalize_code;
use crate::model::Worksheet;
use crate::parsing::values::count_from_decimal;

/// Header keywords for one logical column.
#[derive(Debug, Clone, Copy)]
pub struct ColumnSpec {
    pub name: &'static str,
    /// Lowercase substrings, any of which marks a header cell.
    pub keywords: &'static [&'static str],
    /// Lowercase substrings that disqualify an otherwise matching header.
    pub exclude: &'static [&'static str],
    pub required: bool,
}

impl ColumnSpec {
    pub const fn required(name: &'static str, keywords: &'static [&'static str]) -> Self {
        ColumnSpec {
            name,
            keywords,
            exclude: &[],
            required: true,
        }
    }

    pub const fn optional(name: &'static str, keywords: &'static [&'static str]) -> Self {
        ColumnSpec {
            name,
            keywords,
            exclude: &[],
            required: false,
        }
    }

    pub const fn excluding(mut self, exclude: &'static [&'static str]) -> Self {
        self.exclude = exclude;
        self
    }

    pub fn matches(&self, header: &str) -> bool {
        let lower = header.to_lowercase();
        self.keywords.iter().any(|k| lower.contains(k))
            && !self.exclude.iter().any(|e| lower.contains(e))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionTier {
    Header,
    Content,
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnLayout {
    pub tier: DetectionTier,
    pub header_row: Option<usize>,
    pub first_data_row: usize,
    pub columns: BTreeMap<&'static str, usize>,
}

impl ColumnLayout {
    pub fn get(&self, name: &str) -> Option<usize> {
        self.columns.get(name).copied()
    }
}

/// One strategy for locating columns.
pub trait LayoutTier: Send + Sync {
    fn tier(&self) -> DetectionTier;

    fn detect(&self, sheet: &Worksheet, specs: &[ColumnSpec]) -> Option<ColumnLayout>;
}

/// Ordered chain of tiers; the first tier to produce a layout wins.
#[derive(Default)]
pub struct LayoutDetector {
    tiers: Vec<Box<dyn LayoutTier>>,
}

impl LayoutDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(mut self, tier: impl LayoutTier + 'static) -> Self {
        self.tiers.push(Box::new(tier));
        self
    }

    /// Insert a tier at a position in the chain (clamped to the end).
    pub fn insert(&mut self, index: usize, tier: impl LayoutTier + 'static) {
        let index = index.min(self.tiers.len());
        self.tiers.insert(index, Box::new(tier));
    }

    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    pub fn detect(&self, sheet: &Worksheet, specs: &[ColumnSpec]) -> Option<ColumnLayout> {
        for tier in &self.tiers {
            if let Some(layout) = tier.detect(sheet, specs) {
                debug!(
                    "sheet '{}': layout via {:?} tier, columns {:?}",
                    sheet.name, layout.tier, layout.columns
                );
                return Some(layout);
            }
        }
        debug!("sheet '{}': no layout detected", sheet.name);
        None
    }
}

/// Tier 1: look for an explicit header row in the first rows of the sheet.
#[derive(Debug, Clone, Copy)]
pub struct HeaderScan {
    pub max_rows: usize,
}

impl Default for HeaderScan {
    fn default() -> Self {
        HeaderScan { max_rows: 15 }
    }
}

impl LayoutTier for HeaderScan {
    fn tier(&self) -> DetectionTier {
        DetectionTier::Header
    }

    fn detect(&self, sheet: &Worksheet, specs: &[ColumnSpec]) -> Option<ColumnLayout> {
        let limit = self.max_rows.min(sheet.row_count);
        for row in 0..limit {
            let columns = match_header_row(sheet, row, specs);
            let required_met = specs
                .iter()
                .filter(|s| s.required)
                .all(|s| columns.contains_key(s.name));
            // A lone keyword hit is usually a title row, not a header.
            if required_met && columns.len() >= 2.min(specs.len()) {
                return Some(ColumnLayout {
                    tier: DetectionTier::Header,
                    header_row: Some(row),
                    first_data_row: row + 1,
                    columns,
                });
            }
        }
        None
    }
}

/// Assign each spec to the first unclaimed header cell in `row` it matches.
pub fn match_header_row(
    sheet: &Worksheet,
    row: usize,
    specs: &[ColumnSpec],
) -> BTreeMap<&'static str, usize> {
    let mut columns = BTreeMap::new();
    let mut claimed = Vec::new();

    for spec in specs {
        for col in 0..sheet.column_count {
            if claimed.contains(&col) {
                continue;
            }
            if let Some(text) = sheet.text(row, col) {
                if spec.matches(text) {
                    columns.insert(spec.name, col);
                    claimed.push(col);
                    break;
                }
            }
        }
    }

    columns
}

/// Every column in `row` whose header matches the spec, left to right.
pub fn matching_columns(sheet: &Worksheet, row: usize, spec: &ColumnSpec) -> Vec<usize> {
    (0..sheet.column_count)
        .filter(|&col| sheet.text(row, col).is_some_and(|t| spec.matches(t)))
        .collect()
}

/// What the content of a column must look like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    /// Whole numbers within an inclusive range, e.g. bed counts.
    IntegerRange { min: u32, max: u32 },
    /// Text of at least this many characters that is not a number.
    LongText { min_len: usize },
    /// Six-digit ledger codes, optionally suffixed.
    LedgerCode,
    /// The column with the most numeric cells.
    Numeric { prefer_rightmost: bool },
}

#[derive(Debug, Clone, Copy)]
pub struct ContentRule {
    pub column: &'static str,
    pub kind: ContentKind,
}

impl ContentRule {
    pub const fn new(column: &'static str, kind: ContentKind) -> Self {
        ContentRule { column, kind }
    }
}

/// Tier 2: infer columns from what nearby data rows contain.
#[derive(Debug, Clone)]
pub struct ContentScan {
    pub rules: Vec<ContentRule>,
    pub window: usize,
}

impl ContentScan {
    pub fn new(rules: Vec<ContentRule>) -> Self {
        ContentScan { rules, window: 15 }
    }
}

impl LayoutTier for ContentScan {
    fn tier(&self) -> DetectionTier {
        DetectionTier::Content
    }

    fn detect(&self, sheet: &Worksheet, specs: &[ColumnSpec]) -> Option<ColumnLayout> {
        let rows = self.window.min(sheet.row_count);
        let mut columns = BTreeMap::new();
        let mut first_hits: Vec<usize> = Vec::new();
        let mut text_row = None;

        for rule in &self.rules {
            let found = match rule.kind {
                ContentKind::LongText { min_len } => {
                    let hit = find_long_text(sheet, rows, min_len, &columns);
                    if let Some((row, _)) = hit {
                        text_row.get_or_insert(row);
                    }
                    hit
                }
                kind => {
                    let hit = best_column(sheet, rows, kind, &columns);
                    if let Some((row, _)) = hit {
                        first_hits.push(row);
                    }
                    hit
                }
            };
            if let Some((_, col)) = found {
                columns.insert(rule.column, col);
            }
        }

        let required_met = specs
            .iter()
            .filter(|s| s.required)
            .all(|s| columns.contains_key(s.name));
        if !required_met || columns.is_empty() {
            return None;
        }

        let first_data_row = first_hits.into_iter().min().or(text_row).unwrap_or(0);
        Some(ColumnLayout {
            tier: DetectionTier::Content,
            header_row: None,
            first_data_row,
            columns,
        })
    }
}

/// First non-numeric text cell of at least `min_len` chars, scanning rows in
/// order. Returns (row, column).
fn find_long_text(
    sheet: &Worksheet,
    rows: usize,
    min_len: usize,
    claimed: &BTreeMap<&'static str, usize>,
) -> Option<(usize, usize)> {
    for row in 0..rows {
        for col in 0..sheet.column_count {
            if claimed.values().any(|&c| c == col) {
                continue;
            }
            let cell = sheet.cell(row, col);
            if let Some(text) = cell.as_text() {
                if text.chars().count() >= min_len
                    && cell.as_number().is_none()
                    && normalize_code(text).is_none()
                {
                    return Some((row, col));
                }
            }
        }
    }
    None
}

/// Column with the most cells satisfying `kind`. Returns (first hit row, column).
fn best_column(
    sheet: &Worksheet,
    rows: usize,
    kind: ContentKind,
    claimed: &BTreeMap<&'static str, usize>,
) -> Option<(usize, usize)> {
    let mut best: Option<(usize, usize, usize)> = None; // (hits, first_row, col)

    for col in 0..sheet.column_count {
        if claimed.values().any(|&c| c == col) {
            continue;
        }
        let mut hits = 0;
        let mut first_row = None;
        for row in 0..rows {
            let cell = sheet.cell(row, col);
            let hit = match kind {
                ContentKind::IntegerRange { min, max } => cell
                    .as_number()
                    .and_then(count_from_decimal)
                    .is_some_and(|n| n >= min && n <= max),
                ContentKind::LedgerCode => normalize_code(&cell.to_string()).is_some(),
                ContentKind::Numeric { .. } => cell.as_number().is_some(),
                ContentKind::LongText { .. } => false,
            };
            if hit {
                hits += 1;
                first_row.get_or_insert(row);
            }
        }
        let Some(first_row) = first_row else {
            continue;
        };

        let better = match best {
            None => true,
            Some((best_hits, _, _)) => match kind {
                ContentKind::Numeric {
                    prefer_rightmost: true,
                } => hits >= best_hits,
                _ => hits > best_hits,
            },
        };
        if better {
            best = Some((hits, first_row, col));
        }
    }

    best.map(|(_, row, col)| (row, col))
}

/// Tier 3: a fixed layout used when nothing else matched.
#[derive(Debug, Clone)]
pub struct FixedLayout {
    pub columns: Vec<(&'static str, usize)>,
    pub first_data_row: usize,
}

impl LayoutTier for FixedLayout {
    fn tier(&self) -> DetectionTier {
        DetectionTier::Default
    }

    fn detect(&self, _sheet: &Worksheet, _specs: &[ColumnSpec]) -> Option<ColumnLayout> {
        Some(ColumnLayout {
            tier: DetectionTier::Default,
            header_row: None,
            first_data_row: self.first_data_row,
            columns: self.columns.iter().copied().collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPECS: &[ColumnSpec] = &[
        ColumnSpec::required("name", &["facility", "property"]),
        ColumnSpec::required("beds", &["beds"]),
        ColumnSpec::optional("value", &["value"]).excluding(&["per bed"]),
        ColumnSpec::optional("value_per_bed", &["per bed"]),
    ];

    fn chain() -> LayoutDetector {
        LayoutDetector::new()
            .then(HeaderScan::default())
            .then(ContentScan::new(vec![
                ContentRule::new("beds", ContentKind::IntegerRange { min: 10, max: 500 }),
                ContentRule::new("name", ContentKind::LongText { min_len: 4 }),
            ]))
            .then(FixedLayout {
                columns: vec![("name", 0), ("beds", 1)],
                first_data_row: 1,
            })
    }

    #[test]
    fn test_header_tier() {
        let ws = Worksheet::from_rows(
            "Valuation",
            &[
                &["Portfolio Valuation", "", "", ""],
                &["Facility", "Beds", "Value / Per Bed", "Value"],
                &["Sunrise SNF", "120", "196,078", "23,529,412"],
            ],
        );
        let layout = chain().detect(&ws, SPECS).unwrap();
        assert_eq!(layout.tier, DetectionTier::Header);
        assert_eq!(layout.header_row, Some(1));
        assert_eq!(layout.first_data_row, 2);
        assert_eq!(layout.get("name"), Some(0));
        assert_eq!(layout.get("beds"), Some(1));
        assert_eq!(layout.get("value"), Some(3));
        assert_eq!(layout.get("value_per_bed"), Some(2));
    }

    #[test]
    fn test_title_row_is_not_header() {
        let ws = Worksheet::from_rows("V", &[&["Facility Listing"], &["Sunrise SNF", "120"]]);
        assert!(HeaderScan::default().detect(&ws, SPECS).is_none());
    }

    #[test]
    fn test_content_tier() {
        let ws = Worksheet::from_rows(
            "Valuation",
            &[
                &["", "", ""],
                &["2,000,000", "Sunrise SNF", "120"],
                &["1,500,000", "Meadow View", "96"],
            ],
        );
        let layout = chain().detect(&ws, SPECS).unwrap();
        assert_eq!(layout.tier, DetectionTier::Content);
        assert_eq!(layout.get("beds"), Some(2));
        assert_eq!(layout.get("name"), Some(1));
        assert_eq!(layout.first_data_row, 1);
    }

    #[test]
    fn test_default_tier() {
        let ws = Worksheet::from_rows("Empty-ish", &[&["x"], &["y"]]);
        let layout = chain().detect(&ws, SPECS).unwrap();
        assert_eq!(layout.tier, DetectionTier::Default);
        assert_eq!(layout.get("beds"), Some(1));
    }

    #[test]
    fn test_tiers_are_insertable() {
        let mut detector = LayoutDetector::new().then(FixedLayout {
            columns: vec![("name", 5)],
            first_data_row: 0,
        });
        detector.insert(0, HeaderScan { max_rows: 3 });
        assert_eq!(detector.len(), 2);
        let ws = Worksheet::from_rows("V", &[&["Facility", "Beds"], &["A", "10"]]);
        assert_eq!(detector.detect(&ws, SPECS).unwrap().tier, DetectionTier::Header);
    }

    #[test]
    fn test_numeric_prefers_rightmost_on_tie() {
        let ws = Worksheet::from_rows(
            "T12",
            &[&["Medicare", "100", "100", "1,200"], &["Medicaid", "50", "50", "600"]],
        );
        let scan = ContentScan::new(vec![ContentRule::new(
            "value",
            ContentKind::Numeric {
                prefer_rightmost: true,
            },
        )]);
        let layout = scan.detect(&ws, &[]).unwrap();
        assert_eq!(layout.get("value"), Some(3));
    }

    #[test]
    fn test_matching_columns() {
        let ws = Worksheet::from_rows("V", &[&["Facility", "2023 EBITDA", "2024 EBITDA", "EBITDAR"]]);
        let spec = ColumnSpec::optional("ebitda", &["ebitda"]).excluding(&["ebitdar"]);
        assert_eq!(matching_columns(&ws, 0, &spec), vec![1, 2]);
    }
}
