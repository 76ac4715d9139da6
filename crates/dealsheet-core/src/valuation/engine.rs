use log::{debug, info};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::error::DealsheetError;
use crate::resolve::ResolvedFacility;
use crate::valuation::methods::{run_method, validate_method};
use crate::valuation::outcome::{
    SkippedMethod, ValuationInputs, ValuationMethodResult, ValuationPlan, ValuationRequest,
    ValuationSummary,
};
use crate::valuation::sensitivity::{build_tables, MAX_SENSITIVITY_STEPS};

/// Default range padding below the lowest and above the highest method value.
const RANGE_LOW: Decimal = dec!(0.95);
const RANGE_HIGH: Decimal = dec!(1.05);

/// Method spread, relative to the blend, beyond which confidence drops.
const SPREAD_LIMIT: Decimal = dec!(0.30);
const SPREAD_PENALTY: u8 = 10;

impl ValuationInputs {
    /// Figures for a resolved facility: statement EBITDA as NOI, falling back
    /// to the valuation sheet's current-year EBITDA.
    pub fn from_facility(facility: &ResolvedFacility) -> Self {
        let summary = facility.summary.as_ref();
        ValuationInputs {
            facility_name: Some(facility.name.clone()),
            beds: facility.beds,
            noi: summary.and_then(|s| s.ebitda).or_else(|| {
                facility
                    .valuation_entry
                    .as_ref()
                    .and_then(|e| e.current_year.ebitda)
            }),
            revenue: summary.and_then(|s| s.total_revenue),
            occupancy: facility.census.as_ref().and_then(|c| c.occupancy),
            state: facility.state.clone(),
            property_type: facility.property_type,
        }
    }
}

pub fn validate_plan(plan: &ValuationPlan) -> Result<(), DealsheetError> {
    if plan.methods.is_empty() {
        return Err(DealsheetError::InvalidValuationInput(
            "no valuation methods selected".into(),
        ));
    }
    for method in &plan.methods {
        validate_method(method)?;
    }
    if let Some(s) = &plan.sensitivity {
        if s.cap_rate_step <= Decimal::ZERO || s.noi_step <= Decimal::ZERO {
            return Err(DealsheetError::InvalidValuationInput(
                "sensitivity steps must be positive".into(),
            ));
        }
        if s.steps > MAX_SENSITIVITY_STEPS {
            return Err(DealsheetError::InvalidValuationInput(format!(
                "sensitivity steps must be at most {MAX_SENSITIVITY_STEPS}, got {}",
                s.steps
            )));
        }
    }
    Ok(())
}

/// Run every method in the plan and blend the results.
///
/// Methods that lack an input they need are listed in `skipped`. Fails only
/// when the plan itself is invalid or no method produced a value.
pub fn run_valuation(
    inputs: &ValuationInputs,
    plan: &ValuationPlan,
) -> Result<ValuationSummary, DealsheetError> {
    validate_plan(plan)?;

    let mut methods = Vec::new();
    let mut skipped = Vec::new();
    for config in &plan.methods {
        match run_method(config, inputs) {
            Ok(result) => {
                debug!("valuation: {} = {} ({}%)", result.method, result.value, result.confidence);
                methods.push(result);
            }
            Err(reason) => {
                debug!("valuation: {} skipped: {}", config.kind(), reason);
                skipped.push(SkippedMethod {
                    method: config.kind(),
                    reason,
                });
            }
        }
    }

    if methods.is_empty() {
        let reasons: Vec<String> = skipped
            .iter()
            .map(|s| format!("{}: {}", s.method, s.reason))
            .collect();
        return Err(DealsheetError::InvalidValuationInput(format!(
            "no valuation method could run ({})",
            reasons.join("; ")
        )));
    }

    let recommended = blend(&methods);
    let (low, high) = value_range(&methods);
    let confidence = overall_confidence(&methods, recommended);
    let sensitivity = plan
        .sensitivity
        .as_ref()
        .map(|s| build_tables(inputs.noi, &plan.methods, s))
        .unwrap_or_default();

    info!(
        "valuation{}: {} from {} methods ({} skipped), confidence {}",
        inputs
            .facility_name
            .as_deref()
            .map(|n| format!(" '{n}'"))
            .unwrap_or_default(),
        recommended,
        methods.len(),
        skipped.len(),
        confidence
    );

    Ok(ValuationSummary {
        facility_name: inputs.facility_name.clone(),
        recommended_value: recommended,
        value_low: low,
        value_high: high,
        confidence,
        methods,
        skipped,
        sensitivity,
    })
}

/// Run a self-contained request.
pub fn run_request(request: &ValuationRequest) -> Result<ValuationSummary, DealsheetError> {
    run_valuation(&request.inputs, &request.plan)
}

/// Confidence-weighted mean; a plain mean when every confidence is zero.
pub fn blend(methods: &[ValuationMethodResult]) -> Decimal {
    let total_weight: Decimal = methods.iter().map(|m| Decimal::from(m.confidence)).sum();
    let value = if total_weight.is_zero() {
        methods.iter().map(|m| m.value).sum::<Decimal>() / Decimal::from(methods.len().max(1))
    } else {
        methods
            .iter()
            .map(|m| m.value * Decimal::from(m.confidence))
            .sum::<Decimal>()
            / total_weight
    };
    value.round_dp(2)
}

/// Lowest and highest bound across methods; a method without its own
/// low/high contributes its value padded by 5%.
pub fn value_range(methods: &[ValuationMethodResult]) -> (Decimal, Decimal) {
    let low = methods
        .iter()
        .map(|m| m.low.unwrap_or(m.value * RANGE_LOW))
        .min()
        .unwrap_or(Decimal::ZERO);
    let high = methods
        .iter()
        .map(|m| m.high.unwrap_or(m.value * RANGE_HIGH))
        .max()
        .unwrap_or(Decimal::ZERO);
    (low.round_dp(2), high.round_dp(2))
}

/// Mean method confidence, less a penalty when methods disagree widely.
pub fn overall_confidence(methods: &[ValuationMethodResult], blended: Decimal) -> u8 {
    if methods.is_empty() {
        return 0;
    }
    let total: u32 = methods.iter().map(|m| u32::from(m.confidence)).sum();
    let mean = total / methods.len() as u32;
    let min = methods.iter().map(|m| m.value).min().unwrap_or(Decimal::ZERO);
    let max = methods.iter().map(|m| m.value).max().unwrap_or(Decimal::ZERO);
    let spread_too_wide = blended > Decimal::ZERO && (max - min) > blended * SPREAD_LIMIT;
    let mean = mean.min(100).to_u8().unwrap_or(100);
    if spread_too_wide {
        mean.saturating_sub(SPREAD_PENALTY)
    } else {
        mean
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::valuation::outcome::{MethodConfig, MethodKind, SensitivityOptions};

    fn inputs() -> ValuationInputs {
        ValuationInputs {
            beds: Some(100),
            noi: Some(dec!(1000000)),
            ..Default::default()
        }
    }

    fn plan(methods: Vec<MethodConfig>) -> ValuationPlan {
        ValuationPlan {
            methods,
            sensitivity: Some(SensitivityOptions::default()),
        }
    }

    #[test]
    fn test_single_cap_rate_method() {
        let summary = run_valuation(
            &inputs(),
            &plan(vec![MethodConfig::CapRate { cap_rate: dec!(0.10) }]),
        )
        .unwrap();
        assert_eq!(summary.recommended_value, dec!(10000000));
        assert_eq!(summary.confidence, 85);
        assert_eq!(summary.value_low, dec!(9523809.52));
        assert_eq!(summary.value_high, dec!(10526315.79));
        assert_eq!(summary.sensitivity.len(), 2);
    }

    #[test]
    fn test_blend_within_method_bounds() {
        let summary = run_valuation(
            &inputs(),
            &plan(vec![
                MethodConfig::CapRate { cap_rate: dec!(0.10) },
                MethodConfig::PricePerBed {
                    market_rate_per_bed: dec!(85000),
                },
                MethodConfig::NoiMultiple { multiple: dec!(9) },
            ]),
        )
        .unwrap();
        let values: Vec<Decimal> = summary.methods.iter().map(|m| m.value).collect();
        let min = *values.iter().min().unwrap();
        let max = *values.iter().max().unwrap();
        assert!(summary.recommended_value >= min && summary.recommended_value <= max);
        // (10,000,000*85 + 8,500,000*70 + 9,000,000*65) / 220
        assert_eq!(summary.recommended_value, dec!(9227272.73));
        assert_eq!(summary.confidence, 73);
    }

    #[test]
    fn test_spread_penalty() {
        let summary = run_valuation(
            &inputs(),
            &plan(vec![
                MethodConfig::CapRate { cap_rate: dec!(0.10) },
                MethodConfig::PricePerBed {
                    market_rate_per_bed: dec!(40000),
                },
            ]),
        )
        .unwrap();
        // mean 77, spread 6,000,000 exceeds 30% of the blend
        assert_eq!(summary.confidence, 67);
    }

    #[test]
    fn test_missing_inputs_skip_methods() {
        let no_beds = ValuationInputs {
            noi: Some(dec!(500000)),
            ..Default::default()
        };
        let summary = run_valuation(
            &no_beds,
            &plan(vec![
                MethodConfig::CapRate { cap_rate: dec!(0.125) },
                MethodConfig::PricePerBed {
                    market_rate_per_bed: dec!(85000),
                },
            ]),
        )
        .unwrap();
        assert_eq!(summary.methods.len(), 1);
        assert_eq!(summary.skipped.len(), 1);
        assert_eq!(summary.skipped[0].method, MethodKind::PricePerBed);
        assert_eq!(summary.recommended_value, dec!(4000000));
    }

    #[test]
    fn test_nothing_runs_is_error() {
        let err = run_valuation(
            &ValuationInputs::default(),
            &plan(vec![MethodConfig::CapRate { cap_rate: dec!(0.1) }]),
        )
        .unwrap_err();
        assert!(matches!(err, DealsheetError::InvalidValuationInput(_)));
    }

    #[test]
    fn test_invalid_plan() {
        assert!(run_valuation(&inputs(), &plan(Vec::new())).is_err());
        let negative = plan(vec![MethodConfig::NoiMultiple { multiple: dec!(-1) }]);
        assert!(run_valuation(&inputs(), &negative).is_err());
    }

    #[test]
    fn test_sensitivity_steps_bounded() {
        let mut too_wide = plan(vec![MethodConfig::CapRate { cap_rate: dec!(0.1) }]);
        too_wide.sensitivity = Some(SensitivityOptions {
            steps: 4_000_000_000,
            ..Default::default()
        });
        let err = run_valuation(&inputs(), &too_wide).unwrap_err();
        assert!(err.to_string().contains("at most 50"));

        too_wide.sensitivity = Some(SensitivityOptions {
            steps: MAX_SENSITIVITY_STEPS,
            ..Default::default()
        });
        assert!(validate_plan(&too_wide).is_ok());
    }

    #[test]
    fn test_long_dcf_plan_rejected() {
        let long = plan(vec![MethodConfig::Dcf {
            years: 1000,
            growth_rate: dec!(0),
            discount_rate: dec!(0.12),
            terminal_cap_rate: dec!(0.10),
            selling_cost_rate: dec!(0),
        }]);
        assert!(matches!(
            run_valuation(&inputs(), &long),
            Err(DealsheetError::InvalidValuationInput(_))
        ));
    }

    #[test]
    fn test_default_range_padding() {
        let per_bed = MethodConfig::PricePerBed {
            market_rate_per_bed: dec!(100000),
        };
        let methods = vec![
            run_method(&per_bed, &inputs()).unwrap(),
            run_method(&MethodConfig::NoiMultiple { multiple: dec!(8) }, &inputs()).unwrap(),
        ];
        assert_eq!(value_range(&methods), (dec!(7600000), dec!(10500000)));
    }
}
