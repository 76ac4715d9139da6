use dealsheet_core::classify::SheetClassification;
use dealsheet_core::display::LineItemView;
use dealsheet_core::valuation::ValuationSummary;
use dealsheet_core::ExtractionResult;
use rust_decimal::Decimal;

pub fn print_extraction(result: &ExtractionResult) {
    println!("=== Sheets ===\n");
    let width = result.sheets.iter().map(|s| s.sheet_name.len()).max().unwrap_or(10);
    for sheet in &result.sheets {
        println!("  {:<width$}  {}", sheet.sheet_name, sheet.sheet_type, width = width);
    }
    println!();

    if let Some(mapping) = &result.ledger_mapping {
        println!(
            "Ledger mapping: {} codes from '{}'\n",
            mapping.len(),
            mapping.source_sheet
        );
    }

    if !result.resolution.facilities.is_empty() {
        println!("=== Facilities ===\n");
        for f in &result.resolution.facilities {
            let location = match (&f.city, &f.state) {
                (Some(city), Some(state)) => format!(", {city}, {state}"),
                (None, Some(state)) => format!(", {state}"),
                _ => String::new(),
            };
            let beds = f.beds.map(|b| format!("{b} beds")).unwrap_or_else(|| "beds ?".into());
            println!("  {}{}  ({})", f.name, location, beds);

            if let Some(summary) = &f.summary {
                let metrics = [
                    ("Revenue", summary.total_revenue),
                    ("Expenses", summary.total_expenses),
                    ("EBITDAR", summary.ebitdar),
                    ("EBITDA", summary.ebitda),
                    ("Net income", summary.net_income),
                ];
                for (label, value) in metrics {
                    if let Some(v) = value {
                        println!("    {:<12} {:>16}", label, money(v));
                    }
                }
            }
            if let Some(entry) = &f.valuation_entry {
                let rate = match (entry.rate.cap_rate(), entry.rate.multiplier()) {
                    (Some(r), _) => format!("cap rate {r}"),
                    (_, Some(m)) => format!("{m}x"),
                    _ => String::new(),
                };
                let value = entry.current_year.value.map(money).unwrap_or_default();
                println!("    {:<12} {:>16}  ({}, {})", "Value", value, rate, entry.property_type);
            }
            if !f.aliases.is_empty() {
                println!("    also seen as: {}", f.aliases.join(", "));
            }
            println!();
        }
    }

    if !result.resolution.reviews.is_empty() {
        println!("Possible matches to confirm:");
        for r in &result.resolution.reviews {
            println!(
                "  '{}' ~ '{}' ({}, score {})",
                r.facility, r.candidate, r.candidate_source, r.score
            );
        }
        println!();
    }

    if let Some(portfolio) = &result.portfolio {
        for scenario in &portfolio.scenarios {
            println!("=== Scenario: {} ===\n", scenario.name);
            for group in &scenario.groups {
                println!(
                    "  {:<30} revenue {:>16}  EBITDA {:>16}",
                    group.name,
                    money(group.financials.total_revenue.annual),
                    money(group.financials.ebitda.annual)
                );
            }
            println!(
                "  {:<30} revenue {:>16}  EBITDA {:>16}\n",
                "Total",
                money(scenario.totals.total_revenue.annual),
                money(scenario.totals.ebitda.annual)
            );
        }
    }

    for summary in &result.valuations {
        print_valuation(summary);
    }

    if !result.warnings.is_empty() {
        println!("Warnings:");
        for w in &result.warnings {
            println!("  - {w}");
        }
    }
}

pub fn print_line_items(rows: &[LineItemView]) {
    let name_width = rows
        .iter()
        .map(|r| r.facility_or_group.len())
        .max()
        .unwrap_or(10);
    let label_width = rows.iter().map(|r| r.label.len()).max().unwrap_or(10);
    for row in rows {
        let confidence = row
            .confidence
            .map(|c| format!("{c}"))
            .unwrap_or_else(|| "-".into());
        let ppd = row.ppd.map(|p| p.to_string()).unwrap_or_default();
        println!(
            "  {:<nw$}  {:<8} {:<lw$} {:>16} {:>10}  {}",
            row.facility_or_group,
            row.category,
            row.label,
            money(row.annual),
            ppd,
            confidence,
            nw = name_width,
            lw = label_width
        );
    }
}

pub fn print_classifications(results: &[SheetClassification], verbose: bool) {
    let width = results.iter().map(|r| r.sheet_name.len()).max().unwrap_or(10);
    for r in results {
        println!(
            "  {:<width$}  {:<10} (score {})",
            r.sheet_name,
            r.sheet_type.to_string(),
            r.score,
            width = width
        );
        if verbose {
            println!("    {}", r.reason);
            for s in &r.scores {
                if s.score > 0 {
                    println!("    {:<10} {}  [{}]", s.sheet_type.to_string(), s.score, s.matched.join(", "));
                }
            }
            println!();
        }
    }
}

pub fn print_valuation(summary: &ValuationSummary) {
    let title = summary.facility_name.as_deref().unwrap_or("Valuation");
    println!("=== {title} ===\n");
    println!(
        "  Recommended: {}  (range {} - {}, confidence {}%)\n",
        money(summary.recommended_value),
        money(summary.value_low),
        money(summary.value_high),
        summary.confidence
    );
    for m in &summary.methods {
        println!("  {:<18} {:>16}  {}%", m.method.to_string(), money(m.value), m.confidence);
        for note in &m.notes {
            println!("    {note}");
        }
    }
    for s in &summary.skipped {
        println!("  {:<18} skipped: {}", s.method.to_string(), s.reason);
    }
    for table in &summary.sensitivity {
        println!("\n  Sensitivity ({:?}):", table.variable);
        for p in &table.points {
            let marker = if p.input == table.base_input { " *" } else { "" };
            println!("    {:>14} -> {:>16}{}", p.input, money(p.value), marker);
        }
    }
    println!();
}

/// "$1,234,567.89"; negatives in parentheses.
fn money(value: Decimal) -> String {
    let rounded = value.round_dp(2);
    let text = format!("{:.2}", rounded.abs());
    let (whole, frac) = text.split_once('.').unwrap_or((text.as_str(), "00"));
    let mut grouped = String::new();
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    if rounded.is_sign_negative() && !rounded.is_zero() {
        format!("(${grouped}.{frac})")
    } else {
        format!("${grouped}.{frac}")
    }
}
