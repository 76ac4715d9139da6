//! Ledger-code crosswalk: raw general-ledger codes to canonical categories.

pub mod cache;
pub mod prefixes;

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::model::{LedgerCategory, Worksheet};
use crate::parsing::layout::{
    ColumnSpec, ContentKind, ContentRule, ContentScan, FixedLayout, HeaderScan, LayoutDetector,
};
use crate::parsing::normalize::{canonical_facility_name, facility_key, snake_label};
use crate::warnings::{push_warning, ExtractionWarning, Stage, WarningSeverity};
use prefixes::subcategory_for_code;

pub use cache::{sheet_fingerprint, LedgerMappingCache};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerMappingEntry {
    /// Normalized code: six digits, optionally "-NN".
    pub code: String,
    pub label: String,
    pub category: LedgerCategory,
    pub subcategory: String,
    /// Facility name -> that facility's own code for this account.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub facility_overrides: BTreeMap<String, String>,
}

/// Read-only lookup from ledger code to mapping entry, built once per workbook.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerMapping {
    pub source_sheet: String,
    /// SHA-256 of the source worksheet; see [`sheet_fingerprint`].
    pub fingerprint: String,
    entries: BTreeMap<String, LedgerMappingEntry>,
    /// facility key -> (facility code -> canonical code)
    facility_codes: BTreeMap<String, BTreeMap<String, String>>,
}

impl LedgerMapping {
    /// Look up a raw code, trying the full code before its base code.
    pub fn lookup(&self, raw: &str) -> Option<&LedgerMappingEntry> {
        let code = normalize_code(raw)?;
        self.entries
            .get(&code)
            .or_else(|| self.entries.get(base_code(&code)))
    }

    /// Look up a code as it appears in one facility's statement, honoring
    /// that facility's override column when present.
    pub fn lookup_for_facility(&self, raw: &str, facility: &str) -> Option<&LedgerMappingEntry> {
        let code = normalize_code(raw)?;
        let canonical = self
            .facility_codes
            .get(&facility_key(facility))
            .and_then(|codes| codes.get(&code).or_else(|| codes.get(base_code(&code))));
        match canonical {
            Some(canonical) => self.entries.get(canonical),
            None => self.lookup(&code),
        }
    }

    /// Number of indexed codes (explicit and base-code fallbacks).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &LedgerMappingEntry> {
        self.entries.values()
    }
}

/// Normalize a ledger code cell: "400110", "400110-01", "400110.01",
/// "400110 01" are accepted; anything else is `None`.
pub fn normalize_code(raw: &str) -> Option<String> {
    let s = raw.trim();
    let bytes = s.as_bytes();
    if bytes.len() < 6 || !bytes[..6].iter().all(u8::is_ascii_digit) {
        return None;
    }
    let base = &s[..6];
    let rest = &s[6..];
    if rest.is_empty() {
        return Some(base.to_string());
    }

    let mut chars = rest.chars();
    let sep = chars.next()?;
    if !matches!(sep, '-' | '.' | '_' | ' ') {
        return None;
    }
    let suffix: String = chars.collect();
    let suffix = suffix.trim();

    // Numeric cells render as "400110.0" or "400110.00".
    if sep == '.' && !suffix.is_empty() && suffix.chars().all(|c| c == '0') {
        return Some(base.to_string());
    }
    if suffix.len() == 2 && suffix.chars().all(|c| c.is_ascii_digit()) {
        Some(format!("{base}-{suffix}"))
    } else {
        None
    }
}

/// The six-digit base of a normalized code.
pub fn base_code(code: &str) -> &str {
    code.get(..6).unwrap_or(code)
}

const MAPPING_SHEET_HINTS: &[(&str, u32)] = &[
    ("mapping", 3),
    ("crosswalk", 3),
    ("chart of accounts", 3),
    ("gl map", 3),
    ("account map", 3),
    ("coa", 2),
    ("gl", 1),
    ("accounts", 1),
];

const CODE_KEYWORDS: &[&str] = &[
    "code",
    "acct",
    "gl #",
    "gl account",
    "account #",
    "account number",
    "account no",
];
const LABEL_KEYWORDS: &[&str] = &["description", "label", "name", "title", "line item"];
const CATEGORY_KEYWORDS: &[&str] = &["category", "type", "class", "group"];

const MAPPING_SPECS: &[ColumnSpec] = &[
    ColumnSpec::required("code", CODE_KEYWORDS).excluding(&["description", "name", "("]),
    ColumnSpec::required("label", LABEL_KEYWORDS).excluding(&["("]),
    ColumnSpec::optional("category", CATEGORY_KEYWORDS).excluding(&["sub", "("]),
];

/// Pick the worksheet most likely to hold the ledger crosswalk, by name.
pub fn find_mapping_sheet(sheets: &[Worksheet]) -> Option<&Worksheet> {
    let mut best: Option<(u32, &Worksheet)> = None;
    for sheet in sheets {
        let name = sheet.name.to_lowercase();
        let score: u32 = MAPPING_SHEET_HINTS
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

/// Build the ledger mapping from whichever sheet looks like a crosswalk.
pub fn build_ledger_mapping(
    sheets: &[Worksheet],
    header_rows: usize,
    warnings: &mut Vec<ExtractionWarning>,
) -> Option<LedgerMapping> {
    let sheet = find_mapping_sheet(sheets)?;
    build_from_sheet(sheet, header_rows, warnings)
}

/// Build a ledger mapping from a known crosswalk sheet.
pub fn build_from_sheet(
    sheet: &Worksheet,
    header_rows: usize,
    warnings: &mut Vec<ExtractionWarning>,
) -> Option<LedgerMapping> {
    let detector = LayoutDetector::new()
        .then(HeaderScan {
            max_rows: header_rows,
        })
        .then(ContentScan::new(vec![
            ContentRule::new("code", ContentKind::LedgerCode),
            ContentRule::new("label", ContentKind::LongText { min_len: 3 }),
        ]))
        .then(FixedLayout {
            columns: vec![("code", 0), ("label", 1)],
            first_data_row: 0,
        });

    let layout = detector.detect(sheet, MAPPING_SPECS)?;
    let code_col = layout.get("code")?;
    let label_col = layout.get("label");
    let category_col = layout.get("category");
    let overrides = layout
        .header_row
        .map(|row| override_columns(sheet, row, code_col, layout.first_data_row))
        .unwrap_or_default();

    let mut explicit: Vec<LedgerMappingEntry> = Vec::new();
    let mut skipped = 0usize;

    for row in layout.first_data_row..sheet.row_count {
        let Some(code) = normalize_code(&sheet.cell(row, code_col).to_string()) else {
            continue;
        };

        let label = label_col
            .and_then(|c| sheet.text(row, c))
            .map(str::to_string)
            .unwrap_or_else(|| code.clone());

        let category = category_col
            .and_then(|c| sheet.text(row, c))
            .and_then(LedgerCategory::from_str_loose)
            .or_else(|| LedgerCategory::from_code_prefix(&code));
        let Some(category) = category else {
            // Balance-sheet accounts (1xxxxx-3xxxxx) have no P&L category.
            skipped += 1;
            continue;
        };

        let subcategory = subcategory_for_code(&code)
            .map(str::to_string)
            .unwrap_or_else(|| snake_label(&label));

        let facility_overrides: BTreeMap<String, String> = overrides
            .iter()
            .filter_map(|(facility, col)| {
                normalize_code(&sheet.cell(row, *col).to_string()).map(|c| (facility.clone(), c))
            })
            .collect();

        if explicit.iter().any(|e| e.code == code) {
            debug!("mapping sheet '{}': duplicate code {} ignored", sheet.name, code);
            continue;
        }

        explicit.push(LedgerMappingEntry {
            code,
            label,
            category,
            subcategory,
            facility_overrides,
        });
    }

    if explicit.is_empty() {
        push_warning(
            warnings,
            Stage::LedgerMapping,
            Some(&sheet.name),
            WarningSeverity::Important,
            "mapping sheet contains no recognizable ledger codes; statements fall back to label matching",
        );
        return None;
    }

    let mut entries: BTreeMap<String, LedgerMappingEntry> = BTreeMap::new();
    let mut facility_codes: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();

    for entry in &explicit {
        entries.insert(entry.code.clone(), entry.clone());
        for (facility, facility_code) in &entry.facility_overrides {
            facility_codes
                .entry(facility_key(facility))
                .or_default()
                .entry(facility_code.clone())
                .or_insert_with(|| entry.code.clone());
        }
    }
    // Base codes only fill gaps; an explicit entry always wins.
    for entry in &explicit {
        entries
            .entry(base_code(&entry.code).to_string())
            .or_insert_with(|| entry.clone());
    }

    info!(
        "ledger mapping from '{}': {} explicit codes, {} indexed, {} skipped",
        sheet.name,
        explicit.len(),
        entries.len(),
        skipped
    );

    Some(LedgerMapping {
        source_sheet: sheet.name.clone(),
        fingerprint: sheet_fingerprint(sheet),
        entries,
        facility_codes,
    })
}

/// Columns whose header carries an "(OpCo)"-style suffix and hold codes.
/// Returns (facility name, column).
fn override_columns(
    sheet: &Worksheet,
    header_row: usize,
    code_col: usize,
    first_data_row: usize,
) -> Vec<(String, usize)> {
    let mut out = Vec::new();
    for col in 0..sheet.column_count {
        if col == code_col {
            continue;
        }
        let Some(header) = sheet.text(header_row, col) else {
            continue;
        };
        if !header.ends_with(')') || !header.contains('(') {
            continue;
        }
        let has_codes = (first_data_row..sheet.row_count)
            .any(|r| normalize_code(&sheet.cell(r, col).to_string()).is_some());
        if !has_codes {
            continue;
        }
        let facility = canonical_facility_name(header);
        if !facility.is_empty() {
            out.push((facility, col));
        }
    }
    out
}
