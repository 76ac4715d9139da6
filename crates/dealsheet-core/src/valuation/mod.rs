//! Multi-method valuation: run each selected method, blend the values by
//! confidence, and build sensitivity tables around the base inputs.

pub mod engine;
pub mod methods;
pub mod outcome;
pub mod sensitivity;

pub use engine::{run_request, run_valuation, validate_plan};
pub use outcome::{
    Comparable, MethodConfig, MethodKind, SensitivityOptions, SensitivityTable, SkippedMethod,
    ValuationInputs, ValuationMethodResult, ValuationPlan, ValuationRequest, ValuationSummary,
};
