use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::model::PropertyType;

/// Valuation technique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodKind {
    CapRate,
    PricePerBed,
    Dcf,
    NoiMultiple,
    ComparableSales,
    ReplacementCost,
}

impl fmt::Display for MethodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MethodKind::CapRate => "cap_rate",
            MethodKind::PricePerBed => "price_per_bed",
            MethodKind::Dcf => "dcf",
            MethodKind::NoiMultiple => "noi_multiple",
            MethodKind::ComparableSales => "comparable_sales",
            MethodKind::ReplacementCost => "replacement_cost",
        };
        write!(f, "{s}")
    }
}

/// Normalised facility figures a valuation runs against.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValuationInputs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facility_name: Option<String>,
    pub beds: Option<u32>,
    /// Net operating income; EBITDA when taken from a statement.
    pub noi: Option<Decimal>,
    pub revenue: Option<Decimal>,
    /// Fraction in 0..=1.
    pub occupancy: Option<Decimal>,
    pub state: Option<String>,
    pub property_type: Option<PropertyType>,
}

/// A recent sale used by the comparable-sales method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comparable {
    pub name: String,
    pub price_per_bed: Decimal,
    pub beds: u32,
    #[serde(default)]
    pub occupancy: Option<Decimal>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub property_type: Option<PropertyType>,
}

/// One method and its assumptions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum MethodConfig {
    CapRate {
        cap_rate: Decimal,
    },
    PricePerBed {
        market_rate_per_bed: Decimal,
    },
    Dcf {
        years: u32,
        growth_rate: Decimal,
        discount_rate: Decimal,
        terminal_cap_rate: Decimal,
        #[serde(default)]
        selling_cost_rate: Decimal,
    },
    NoiMultiple {
        multiple: Decimal,
    },
    ComparableSales {
        comparables: Vec<Comparable>,
    },
    ReplacementCost {
        cost_per_bed: Decimal,
        #[serde(default)]
        land_value: Decimal,
        #[serde(default)]
        depreciation_rate: Decimal,
    },
}

impl MethodConfig {
    pub fn kind(&self) -> MethodKind {
        match self {
            MethodConfig::CapRate { .. } => MethodKind::CapRate,
            MethodConfig::PricePerBed { .. } => MethodKind::PricePerBed,
            MethodConfig::Dcf { .. } => MethodKind::Dcf,
            MethodConfig::NoiMultiple { .. } => MethodKind::NoiMultiple,
            MethodConfig::ComparableSales { .. } => MethodKind::ComparableSales,
            MethodConfig::ReplacementCost { .. } => MethodKind::ReplacementCost,
        }
    }
}

/// Grid shape for sensitivity tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensitivityOptions {
    /// Grid points on each side of the base value.
    pub steps: u32,
    pub cap_rate_step: Decimal,
    /// Fractional NOI change per step.
    pub noi_step: Decimal,
}

impl Default for SensitivityOptions {
    fn default() -> Self {
        SensitivityOptions {
            steps: 2,
            cap_rate_step: Decimal::new(5, 3),
            noi_step: Decimal::new(5, 2),
        }
    }
}

/// Methods and grid settings to apply to facility inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValuationPlan {
    #[serde(default = "crate::rules::builtin::default_methods")]
    pub methods: Vec<MethodConfig>,
    #[serde(default)]
    pub sensitivity: Option<SensitivityOptions>,
}

impl Default for ValuationPlan {
    fn default() -> Self {
        crate::rules::builtin::default_valuation_plan().clone()
    }
}

/// A complete valuation job: inputs plus a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValuationRequest {
    pub inputs: ValuationInputs,
    #[serde(flatten)]
    pub plan: ValuationPlan,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValuationMethodResult {
    pub method: MethodKind,
    pub value: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub low: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub high: Option<Decimal>,
    /// 0..=100.
    pub confidence: u8,
    pub inputs: BTreeMap<String, Decimal>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

/// A method that could not run, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedMethod {
    pub method: MethodKind,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensitivityVariable {
    CapRate,
    Noi,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensitivityPoint {
    pub input: Decimal,
    pub value: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensitivityTable {
    pub variable: SensitivityVariable,
    pub base_input: Decimal,
    pub base_value: Decimal,
    pub points: Vec<SensitivityPoint>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValuationSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facility_name: Option<String>,
    /// Confidence-weighted blend of the method values.
    pub recommended_value: Decimal,
    pub value_low: Decimal,
    pub value_high: Decimal,
    /// 0..=100.
    pub confidence: u8,
    pub methods: Vec<ValuationMethodResult>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedMethod>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sensitivity: Vec<SensitivityTable>,
}
