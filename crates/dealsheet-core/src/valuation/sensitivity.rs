use rust_decimal::Decimal;

use crate::valuation::outcome::{
    MethodConfig, SensitivityOptions, SensitivityPoint, SensitivityTable, SensitivityVariable,
};

/// Most steps accepted on each side of the base value.
pub const MAX_SENSITIVITY_STEPS: u32 = 50;

/// Symmetric grid `base + k * step` for `k` in `-steps..=steps`, dropping
/// non-positive points.
pub fn grid(base: Decimal, step: Decimal, steps: u32) -> Vec<Decimal> {
    let steps = i64::from(steps);
    (-steps..=steps)
        .filter_map(|k| step.checked_mul(Decimal::from(k))?.checked_add(base))
        .filter(|v| *v > Decimal::ZERO)
        .collect()
}

/// Value at each cap rate around `cap_rate`, NOI fixed.
pub fn cap_rate_table(
    noi: Decimal,
    cap_rate: Decimal,
    options: &SensitivityOptions,
) -> SensitivityTable {
    let points = grid(cap_rate, options.cap_rate_step, options.steps)
        .into_iter()
        .map(|rate| SensitivityPoint {
            input: rate,
            value: (noi / rate).round_dp(2),
        })
        .collect();
    SensitivityTable {
        variable: SensitivityVariable::CapRate,
        base_input: cap_rate,
        base_value: (noi / cap_rate).round_dp(2),
        points,
    }
}

/// Value at each NOI around `noi`, under a fixed capitalisation rule.
pub fn noi_table(
    noi: Decimal,
    capitalise: impl Fn(Decimal) -> Decimal,
    options: &SensitivityOptions,
) -> SensitivityTable {
    let steps = i64::from(options.steps);
    let points = (-steps..=steps)
        .filter_map(|k| {
            let shift = options.noi_step.checked_mul(Decimal::from(k))?;
            noi.checked_mul(Decimal::ONE.checked_add(shift)?)
        })
        .filter(|n| *n > Decimal::ZERO)
        .map(|n| SensitivityPoint {
            input: n.round_dp(2),
            value: capitalise(n).round_dp(2),
        })
        .collect();
    SensitivityTable {
        variable: SensitivityVariable::Noi,
        base_input: noi,
        base_value: capitalise(noi).round_dp(2),
        points,
    }
}

/// Tables for every variable the configured methods can be recomputed on.
/// Cap-rate tables use the first cap-rate method; NOI tables capitalise at
/// that cap rate, else the first NOI multiple.
pub fn build_tables(
    noi: Option<Decimal>,
    methods: &[MethodConfig],
    options: &SensitivityOptions,
) -> Vec<SensitivityTable> {
    let Some(noi) = noi.filter(|n| *n > Decimal::ZERO) else {
        return Vec::new();
    };
    let cap_rate = methods.iter().find_map(|m| match m {
        MethodConfig::CapRate { cap_rate } if *cap_rate > Decimal::ZERO => Some(*cap_rate),
        _ => None,
    });
    let multiple = methods.iter().find_map(|m| match m {
        MethodConfig::NoiMultiple { multiple } => Some(*multiple),
        _ => None,
    });

    let mut tables = Vec::new();
    if let Some(rate) = cap_rate {
        tables.push(cap_rate_table(noi, rate, options));
        tables.push(noi_table(noi, |n| n / rate, options));
    } else if let Some(multiple) = multiple {
        tables.push(noi_table(noi, |n| n * multiple, options));
    }
    tables
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_cap_rate_grid_point() {
        let table = cap_rate_table(dec!(1000000), dec!(0.10), &SensitivityOptions::default());
        assert_eq!(table.base_value, dec!(10000000));
        let inputs: Vec<Decimal> = table.points.iter().map(|p| p.input).collect();
        assert_eq!(
            inputs,
            vec![dec!(0.090), dec!(0.095), dec!(0.10), dec!(0.105), dec!(0.110)]
        );
        let at_95 = table.points.iter().find(|p| p.input == dec!(0.095)).unwrap();
        assert_eq!(at_95.value, dec!(10526315.79));
    }

    #[test]
    fn test_grid_drops_non_positive() {
        assert_eq!(
            grid(dec!(0.005), dec!(0.005), 2),
            vec![dec!(0.005), dec!(0.010), dec!(0.015)]
        );
    }

    #[test]
    fn test_grid_skips_overflowing_points() {
        let options = SensitivityOptions {
            steps: 1,
            cap_rate_step: dec!(0.005),
            noi_step: Decimal::MAX,
        };
        let table = noi_table(dec!(1000000), |n| n * dec!(8), &options);
        // both outer points overflow
        assert_eq!(table.points.len(), 1);
        assert_eq!(table.points[0].input, dec!(1000000));
    }

    #[test]
    fn test_noi_table_with_multiple() {
        let methods = vec![MethodConfig::NoiMultiple { multiple: dec!(8) }];
        let tables = build_tables(Some(dec!(1000000)), &methods, &SensitivityOptions::default());
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].variable, SensitivityVariable::Noi);
        assert_eq!(tables[0].points.first().unwrap().value, dec!(7200000));
        assert_eq!(tables[0].points.last().unwrap().value, dec!(8800000));
    }

    #[test]
    fn test_no_tables_without_noi() {
        let methods = vec![MethodConfig::CapRate { cap_rate: dec!(0.1) }];
        assert!(build_tables(None, &methods, &SensitivityOptions::default()).is_empty());
    }
}
