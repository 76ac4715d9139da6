//! Individual valuation methods. Each one either produces a result or says
//! which input it is missing.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use std::collections::BTreeMap;

use crate::error::DealsheetError;
use crate::valuation::outcome::{
    Comparable, MethodConfig, MethodKind, ValuationInputs, ValuationMethodResult,
};

/// Cap-rate range half-width used for the method's own low/high.
const CAP_RATE_BAND: Decimal = dec!(0.005);

/// Occupancy under which income-based methods lose confidence.
const WEAK_OCCUPANCY: Decimal = dec!(0.75);

/// Longest DCF projection accepted.
pub const MAX_DCF_YEARS: u32 = 50;

/// Why a method could not run.
pub type Missing = String;

/// Reject assumptions that make no sense regardless of the facility.
pub fn validate_method(config: &MethodConfig) -> Result<(), DealsheetError> {
    let positive = |name: &str, v: Decimal| {
        if v > Decimal::ZERO {
            Ok(())
        } else {
            Err(DealsheetError::InvalidValuationInput(format!(
                "{} {} must be positive, got {}",
                config.kind(),
                name,
                v
            )))
        }
    };
    let fraction = |name: &str, v: Decimal| {
        if (Decimal::ZERO..Decimal::ONE).contains(&v) {
            Ok(())
        } else {
            Err(DealsheetError::InvalidValuationInput(format!(
                "{} {} must be within [0, 1), got {}",
                config.kind(),
                name,
                v
            )))
        }
    };

    match config {
        MethodConfig::CapRate { cap_rate } => positive("cap_rate", *cap_rate),
        MethodConfig::PricePerBed {
            market_rate_per_bed,
        } => positive("market_rate_per_bed", *market_rate_per_bed),
        MethodConfig::Dcf {
            years,
            growth_rate,
            discount_rate,
            terminal_cap_rate,
            selling_cost_rate,
        } => {
            if !(1..=MAX_DCF_YEARS).contains(years) {
                return Err(DealsheetError::InvalidValuationInput(format!(
                    "dcf years must be within 1..={MAX_DCF_YEARS}, got {years}"
                )));
            }
            if *growth_rate <= dec!(-1) {
                return Err(DealsheetError::InvalidValuationInput(format!(
                    "dcf growth_rate must exceed -1, got {growth_rate}"
                )));
            }
            positive("discount_rate", *discount_rate)?;
            positive("terminal_cap_rate", *terminal_cap_rate)?;
            fraction("selling_cost_rate", *selling_cost_rate)
        }
        MethodConfig::NoiMultiple { multiple } => positive("multiple", *multiple),
        MethodConfig::ComparableSales { comparables } => {
            for comp in comparables {
                positive("price_per_bed", comp.price_per_bed)?;
            }
            Ok(())
        }
        MethodConfig::ReplacementCost {
            cost_per_bed,
            land_value,
            depreciation_rate,
        } => {
            positive("cost_per_bed", *cost_per_bed)?;
            if land_value.is_sign_negative() {
                return Err(DealsheetError::InvalidValuationInput(
                    "replacement_cost land_value must not be negative".into(),
                ));
            }
            fraction("depreciation_rate", *depreciation_rate)
        }
    }
}

/// Run one method. `Err` carries the reason it was skipped.
pub fn run_method(
    config: &MethodConfig,
    inputs: &ValuationInputs,
) -> Result<ValuationMethodResult, Missing> {
    let mut result = match config {
        MethodConfig::CapRate { cap_rate } => cap_rate_method(inputs, *cap_rate)?,
        MethodConfig::PricePerBed {
            market_rate_per_bed,
        } => price_per_bed(inputs, *market_rate_per_bed)?,
        MethodConfig::Dcf {
            years,
            growth_rate,
            discount_rate,
            terminal_cap_rate,
            selling_cost_rate,
        } => dcf(
            inputs,
            DcfAssumptions {
                years: *years,
                growth_rate: *growth_rate,
                discount_rate: *discount_rate,
                terminal_cap_rate: *terminal_cap_rate,
                selling_cost_rate: *selling_cost_rate,
            },
        )?,
        MethodConfig::NoiMultiple { multiple } => noi_multiple(inputs, *multiple)?,
        MethodConfig::ComparableSales { comparables } => comparable_sales(inputs, comparables)?,
        MethodConfig::ReplacementCost {
            cost_per_bed,
            land_value,
            depreciation_rate,
        } => replacement_cost(inputs, *cost_per_bed, *land_value, *depreciation_rate)?,
    };
    result.value = result.value.round_dp(2);
    result.low = result.low.map(|v| v.round_dp(2));
    result.high = result.high.map(|v| v.round_dp(2));
    Ok(result)
}

fn require_noi(inputs: &ValuationInputs) -> Result<Decimal, Missing> {
    match inputs.noi {
        Some(noi) if noi > Decimal::ZERO => Ok(noi),
        Some(noi) => Err(format!("NOI {noi} is not positive")),
        None => Err("NOI is unknown".into()),
    }
}

fn require_beds(inputs: &ValuationInputs) -> Result<u32, Missing> {
    match inputs.beds {
        Some(b) if b > 0 => Ok(b),
        _ => Err("bed count is unknown".into()),
    }
}

fn occupancy_penalty(inputs: &ValuationInputs, notes: &mut Vec<String>) -> u8 {
    match inputs.occupancy {
        Some(occ) if occ < WEAK_OCCUPANCY => {
            notes.push(format!("occupancy {occ} is below {WEAK_OCCUPANCY}"));
            15
        }
        _ => 0,
    }
}

fn result(kind: MethodKind, value: Decimal, confidence: u8) -> ValuationMethodResult {
    ValuationMethodResult {
        method: kind,
        value,
        low: None,
        high: None,
        confidence,
        inputs: BTreeMap::new(),
        notes: Vec::new(),
    }
}

/// Value = NOI / cap rate; low/high at the cap rate plus/minus half a point.
pub fn cap_rate_method(
    inputs: &ValuationInputs,
    cap_rate: Decimal,
) -> Result<ValuationMethodResult, Missing> {
    let noi = require_noi(inputs)?;
    if cap_rate <= Decimal::ZERO {
        return Err(format!("cap rate {cap_rate} is not positive"));
    }
    let mut out = result(MethodKind::CapRate, noi / cap_rate, 85);
    out.confidence -= occupancy_penalty(inputs, &mut out.notes);
    out.low = Some(noi / (cap_rate + CAP_RATE_BAND));
    if cap_rate > CAP_RATE_BAND {
        out.high = Some(noi / (cap_rate - CAP_RATE_BAND));
    }
    out.inputs.insert("noi".into(), noi);
    out.inputs.insert("cap_rate".into(), cap_rate);
    Ok(out)
}

pub fn price_per_bed(
    inputs: &ValuationInputs,
    rate: Decimal,
) -> Result<ValuationMethodResult, Missing> {
    let beds = require_beds(inputs)?;
    let mut out = result(MethodKind::PricePerBed, Decimal::from(beds) * rate, 70);
    out.inputs.insert("beds".into(), Decimal::from(beds));
    out.inputs.insert("market_rate_per_bed".into(), rate);
    Ok(out)
}

#[derive(Debug, Clone, Copy)]
pub struct DcfAssumptions {
    pub years: u32,
    pub growth_rate: Decimal,
    pub discount_rate: Decimal,
    pub terminal_cap_rate: Decimal,
    pub selling_cost_rate: Decimal,
}

/// Discounted NOI for each projection year plus a terminal sale priced off
/// the following year's NOI, net of selling costs.
pub fn dcf(inputs: &ValuationInputs, a: DcfAssumptions) -> Result<ValuationMethodResult, Missing> {
    let noi = require_noi(inputs)?;
    let growth = Decimal::ONE + a.growth_rate;
    let discount = Decimal::ONE + a.discount_rate;

    let overflow = || format!("{}-year projection overflows", a.years);
    let mut projected = noi;
    let mut factor = Decimal::ONE;
    let mut present_value = Decimal::ZERO;
    for _ in 0..a.years {
        projected = projected.checked_mul(growth).ok_or_else(overflow)?;
        factor = factor.checked_mul(discount).ok_or_else(overflow)?;
        present_value = projected
            .checked_div(factor)
            .and_then(|pv| present_value.checked_add(pv))
            .ok_or_else(overflow)?;
    }
    let terminal_pv = projected
        .checked_mul(growth)
        .and_then(|n| n.checked_div(a.terminal_cap_rate))
        .and_then(|v| v.checked_mul(Decimal::ONE - a.selling_cost_rate))
        .and_then(|v| v.checked_div(factor))
        .ok_or_else(overflow)?;
    let total = present_value.checked_add(terminal_pv).ok_or_else(overflow)?;
    if total.is_zero() {
        return Err("projected value is zero".into());
    }

    let mut out = result(MethodKind::Dcf, total, 75);
    if a.years < 5 {
        out.confidence -= 10;
        out.notes.push(format!("{}-year projection is short", a.years));
    }
    out.confidence -= occupancy_penalty(inputs, &mut out.notes);
    out.notes.push(format!(
        "terminal value is {} of total",
        (terminal_pv / out.value).round_dp(4)
    ));
    out.inputs.insert("noi".into(), noi);
    out.inputs.insert("years".into(), Decimal::from(a.years));
    out.inputs.insert("growth_rate".into(), a.growth_rate);
    out.inputs.insert("discount_rate".into(), a.discount_rate);
    out.inputs.insert("terminal_cap_rate".into(), a.terminal_cap_rate);
    out.inputs.insert("selling_cost_rate".into(), a.selling_cost_rate);
    Ok(out)
}

pub fn noi_multiple(
    inputs: &ValuationInputs,
    multiple: Decimal,
) -> Result<ValuationMethodResult, Missing> {
    let noi = require_noi(inputs)?;
    let mut out = result(MethodKind::NoiMultiple, noi * multiple, 65);
    out.confidence -= occupancy_penalty(inputs, &mut out.notes);
    out.inputs.insert("noi".into(), noi);
    out.inputs.insert("multiple".into(), multiple);
    Ok(out)
}

/// Similarity of a comparable to the subject, in [0.1, 1].
pub fn comparable_similarity(inputs: &ValuationInputs, comp: &Comparable) -> Decimal {
    let mut score = Decimal::ONE;
    if let (Some(a), Some(b)) = (inputs.property_type, comp.property_type) {
        if a != b {
            score -= dec!(0.3);
        }
    }
    if let (Some(a), Some(b)) = (&inputs.state, &comp.state) {
        if !a.eq_ignore_ascii_case(b) {
            score -= dec!(0.2);
        }
    }
    if let Some(beds) = inputs.beds.filter(|b| *b > 0) {
        let diff = Decimal::from(beds.abs_diff(comp.beds)) / Decimal::from(beds);
        score -= (diff * dec!(0.5)).min(dec!(0.3));
    }
    if let (Some(a), Some(b)) = (inputs.occupancy, comp.occupancy) {
        score -= (a - b).abs().min(dec!(0.2));
    }
    score.max(dec!(0.1)).round_dp(4)
}

/// Similarity-weighted price per bed across comparables, times beds.
pub fn comparable_sales(
    inputs: &ValuationInputs,
    comparables: &[Comparable],
) -> Result<ValuationMethodResult, Missing> {
    let beds = require_beds(inputs)?;
    if comparables.is_empty() {
        return Err("no comparables supplied".into());
    }

    let mut weight_sum = Decimal::ZERO;
    let mut weighted = Decimal::ZERO;
    let mut notes = Vec::new();
    for comp in comparables {
        let w = comparable_similarity(inputs, comp);
        weight_sum += w;
        weighted += w * comp.price_per_bed;
        notes.push(format!("{}: similarity {}", comp.name, w));
    }
    let per_bed = weighted / weight_sum;
    let beds_dec = Decimal::from(beds);

    let n = comparables.len().min(4) as u32;
    let avg_similarity = weight_sum / Decimal::from(comparables.len());
    let base = Decimal::from(50 + 10 * n);
    let confidence = (base * avg_similarity)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_u8()
        .unwrap_or(0);

    let mut out = result(MethodKind::ComparableSales, beds_dec * per_bed, confidence);
    out.low = comparables.iter().map(|c| c.price_per_bed).min().map(|p| p * beds_dec);
    out.high = comparables.iter().map(|c| c.price_per_bed).max().map(|p| p * beds_dec);
    out.notes = notes;
    out.inputs.insert("beds".into(), beds_dec);
    out.inputs.insert("weighted_price_per_bed".into(), per_bed.round_dp(2));
    out.inputs.insert("comparables".into(), Decimal::from(comparables.len()));
    Ok(out)
}

/// Depreciated construction cost per bed plus land.
pub fn replacement_cost(
    inputs: &ValuationInputs,
    cost_per_bed: Decimal,
    land_value: Decimal,
    depreciation_rate: Decimal,
) -> Result<ValuationMethodResult, Missing> {
    let beds = require_beds(inputs)?;
    let beds_dec = Decimal::from(beds);
    let building = beds_dec * cost_per_bed * (Decimal::ONE - depreciation_rate);
    let mut out = result(MethodKind::ReplacementCost, building + land_value, 50);
    out.inputs.insert("beds".into(), beds_dec);
    out.inputs.insert("cost_per_bed".into(), cost_per_bed);
    out.inputs.insert("land_value".into(), land_value);
    out.inputs.insert("depreciation_rate".into(), depreciation_rate);
    Ok(out)
}
