use log::debug;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::classify::outcome::{SheetClassification, VocabularyScore};
use crate::model::{SheetType, Worksheet};
use crate::parsing::normalize::contains_word;
use crate::rules::schema::VocabularyDef;

/// A number this large next to the word "total" reads as a financial statement.
const LARGE_AMOUNT: Decimal = dec!(100000);

/// Classify every worksheet, recording each verdict on the sheet itself.
pub fn classify_sheets(sheets: &mut [Worksheet], vocab: &VocabularyDef) -> Vec<SheetClassification> {
    sheets
        .iter_mut()
        .map(|sheet| {
            let result = classify_sheet(sheet, vocab);
            sheet.sheet_type = result.sheet_type;
            result
        })
        .collect()
}

/// Score one worksheet against the vocabulary and pick a type.
pub fn classify_sheet(sheet: &Worksheet, vocab: &VocabularyDef) -> SheetClassification {
    let scan_rows = vocab.scan_rows.min(sheet.row_count);
    let text = flatten_rows(sheet, scan_rows);
    let rules = vocab.rules();

    let mut scores: Vec<VocabularyScore> = vocab
        .sheet_types()
        .into_iter()
        .map(|sheet_type| VocabularyScore {
            sheet_type,
            score: 0,
            matched: Vec::new(),
        })
        .collect();

    for rule in &rules {
        if !contains_word(&text, &rule.pattern) {
            continue;
        }
        if let Some(entry) = scores.iter_mut().find(|s| s.sheet_type == rule.sheet_type) {
            if !entry.matched.contains(&rule.pattern) {
                entry.score += rule.weight;
                entry.matched.push(rule.pattern.clone());
            }
        }
    }

    // Strictly greater keeps the earlier vocabulary on ties.
    let mut best: Option<&VocabularyScore> = None;
    for entry in &scores {
        if best.map_or(true, |b| entry.score > b.score) {
            best = Some(entry);
        }
    }

    let (sheet_type, score, reason) = match best {
        Some(b) if b.score >= vocab.min_score => (
            b.sheet_type,
            b.score,
            format!(
                "{} scored {} ({}) >= {}",
                b.sheet_type,
                b.score,
                b.matched.join(", "),
                vocab.min_score
            ),
        ),
        _ if looks_like_statement(sheet, scan_rows, &text) => (
            SheetType::Statement,
            0,
            format!(
                "no vocabulary reached {}; amounts >= {} next to 'total' imply a statement",
                vocab.min_score, LARGE_AMOUNT
            ),
        ),
        _ => (
            SheetType::Unknown,
            0,
            format!("no vocabulary reached {}", vocab.min_score),
        ),
    };

    debug!(
        "classified '{}' as {} (scores: {})",
        sheet.name,
        sheet_type,
        scores
            .iter()
            .map(|s| format!("{}={}", s.sheet_type, s.score))
            .collect::<Vec<_>>()
            .join(" ")
    );

    SheetClassification {
        sheet_name: sheet.name.clone(),
        sheet_type,
        score,
        scores,
        reason,
    }
}

fn flatten_rows(sheet: &Worksheet, rows: usize) -> String {
    (0..rows)
        .map(|r| sheet.row_text(r))
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn looks_like_statement(sheet: &Worksheet, rows: usize, text: &str) -> bool {
    if !contains_word(text, "total") {
        return false;
    }
    (0..rows).any(|r| {
        sheet
            .row(r)
            .iter()
            .filter_map(|c| c.as_number())
            .any(|n| n.abs() >= LARGE_AMOUNT)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::builtin::default_vocabulary;

    #[test]
    fn test_statement_sheet() {
        let ws = Worksheet::from_rows(
            "Sunrise",
            &[
                &["Sunrise SNF - T12 Income Statement"],
                &["Medicare Revenue", "1,200,000"],
                &["Total Revenue", "1,200,000"],
                &["Nursing Expense", "600,000"],
                &["EBITDA", "600,000"],
            ],
        );
        let result = classify_sheet(&ws, default_vocabulary());
        assert_eq!(result.sheet_type, SheetType::Statement);
        assert!(result.score >= 2);
        assert!(result.reason.contains("statement"));
    }

    #[test]
    fn test_census_sheet() {
        let ws = Worksheet::from_rows(
            "Stats",
            &[
                &["Facility", "Beds", "Occupancy", "Patient Days"],
                &["Sunrise SNF", "120", "88%", "38,544"],
            ],
        );
        assert_eq!(classify_sheet(&ws, default_vocabulary()).sheet_type, SheetType::Census);
    }

    #[test]
    fn test_low_score_is_unknown() {
        let ws = Worksheet::from_rows("Notes", &[&["Prepared by"], &["Revenue"]]);
        let result = classify_sheet(&ws, default_vocabulary());
        assert_eq!(result.sheet_type, SheetType::Unknown);
        assert_eq!(result.score, 0);
    }

    #[test]
    fn test_large_total_fallback() {
        let ws = Worksheet::from_rows("Sheet3", &[&["Total", "2,450,000"], &["Other", "15"]]);
        assert_eq!(classify_sheet(&ws, default_vocabulary()).sheet_type, SheetType::Statement);
    }

    #[test]
    fn test_tie_goes_to_declaration_order() {
        // Two statement hits, two summary hits.
        let ws = Worksheet::from_rows("Mixed", &[&["Revenue", "EBITDA", "Portfolio", "Rollup"]]);
        assert_eq!(classify_sheet(&ws, default_vocabulary()).sheet_type, SheetType::Statement);
    }

    #[test]
    fn test_row_order_does_not_matter() {
        let rows: &[&[&str]] = &[
            &["Rent Roll"],
            &["Unit", "Tenant", "Monthly Rent", "Lease Start"],
            &["101", "Acme", "1,200", "2024-01-01"],
        ];
        let mut reversed = rows.to_vec();
        reversed.reverse();
        let a = classify_sheet(&Worksheet::from_rows("A", rows), default_vocabulary());
        let b = classify_sheet(&Worksheet::from_rows("A", &reversed), default_vocabulary());
        assert_eq!(a.sheet_type, SheetType::RentRoll);
        assert_eq!(a.sheet_type, b.sheet_type);
        assert_eq!(a.score, b.score);
    }

    #[test]
    fn test_classify_sheets_records_type() {
        let mut sheets = vec![Worksheet::from_rows(
            "Val",
            &[&["Portfolio Valuation"], &["Facility", "Cap Rate", "Value per Bed"]],
        )];
        let results = classify_sheets(&mut sheets, default_vocabulary());
        assert_eq!(results[0].sheet_type, SheetType::Summary);
        assert_eq!(sheets[0].sheet_type, SheetType::Summary);
    }
}
