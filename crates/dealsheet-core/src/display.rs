//! Flat line-item rows for grid-style display of an extraction result.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::model::{FacilitySection, MetricValue, PortfolioFinancials, ValuationEntry};
use crate::parsing::normalize::snake_label;
use crate::ExtractionResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewSource {
    Statement,
    Portfolio,
    Valuation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItemView {
    pub source: ViewSource,
    pub facility_or_group: String,
    pub category: String,
    pub subcategory: String,
    pub label: String,
    pub annual: Decimal,
    pub ppd: Option<Decimal>,
    /// Only statement lines carry a confidence.
    pub confidence: Option<Decimal>,
}

/// Reshape statement line items, portfolio group lines and valuation entries
/// into uniform rows, in that order.
pub fn to_line_item_view(result: &ExtractionResult) -> Vec<LineItemView> {
    let mut rows = Vec::new();

    let delegated = result.portfolio.iter().flat_map(|p| p.facilities.iter());
    for section in result.statements.iter().chain(delegated) {
        statement_rows(section, &mut rows);
    }

    if let Some(portfolio) = &result.portfolio {
        for scenario in &portfolio.scenarios {
            for group in &scenario.groups {
                let name = format!("{} / {}", scenario.name, group.name);
                portfolio_rows(&name, &group.financials, &mut rows);
            }
            let name = format!("{} / total", scenario.name);
            portfolio_rows(&name, &scenario.totals, &mut rows);
        }
    }

    if let Some(valuation) = &result.valuation {
        for entry in &valuation.entries {
            valuation_rows(entry, &mut rows);
        }
    }

    rows
}

fn statement_rows(section: &FacilitySection, rows: &mut Vec<LineItemView>) {
    rows.extend(section.line_items.iter().map(|item| LineItemView {
        source: ViewSource::Statement,
        facility_or_group: section.facility_name.clone(),
        category: item.category.to_string(),
        subcategory: item.subcategory.clone(),
        label: item.label.clone(),
        annual: item.annual,
        ppd: item.per_patient_day,
        confidence: Some(item.confidence),
    }));
}

fn portfolio_rows(name: &str, financials: &PortfolioFinancials, rows: &mut Vec<LineItemView>) {
    let line = |category: &str, label: &str, annual: Decimal, ppd: Option<Decimal>| LineItemView {
        source: ViewSource::Portfolio,
        facility_or_group: name.to_string(),
        category: category.to_string(),
        subcategory: snake_label(label),
        label: label.to_string(),
        annual,
        ppd,
        confidence: None,
    };

    for l in &financials.revenue_lines {
        rows.push(line("revenue", &l.label, l.annual, l.per_patient_day));
    }
    for l in &financials.expense_lines {
        rows.push(line("expense", &l.label, l.annual, l.per_patient_day));
    }
    let metrics: [(&str, Option<&MetricValue>); 4] = [
        ("Total Revenue", Some(&financials.total_revenue)),
        ("Total Expenses", financials.total_expenses.as_ref()),
        ("EBITDAR", Some(&financials.ebitdar)),
        ("EBITDA", Some(&financials.ebitda)),
    ];
    for (label, metric) in metrics {
        if let Some(m) = metric {
            rows.push(line("metric", label, m.annual, m.per_patient_day));
        }
    }
}

fn valuation_rows(entry: &ValuationEntry, rows: &mut Vec<LineItemView>) {
    let year = &entry.current_year;
    let figures = [
        ("EBITDA", year.ebitda),
        ("Net Income", year.net_income),
        ("Value", year.value),
    ];
    for (label, amount) in figures {
        let Some(annual) = amount else { continue };
        rows.push(LineItemView {
            source: ViewSource::Valuation,
            facility_or_group: entry.facility_name.clone(),
            category: "valuation".into(),
            subcategory: entry.property_type.to_string(),
            label: label.into(),
            annual,
            ppd: None,
            confidence: None,
        });
    }
}
