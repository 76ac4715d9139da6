use std::sync::LazyLock;

use crate::error::DealsheetError;
use crate::rules::schema::{ValuationDefaultsDef, VocabularyDef};
use crate::valuation::outcome::{MethodConfig, ValuationPlan};

const SHEET_VOCABULARY_JSON: &str = include_str!("../../../../rules/sheet-vocabulary.json");
const VALUATION_DEFAULTS_JSON: &str = include_str!("../../../../rules/valuation-defaults.json");

/// Available predefined vocabularies.
pub const PRESETS: &[&str] = &["default"];

static DEFAULT_VOCABULARY: LazyLock<VocabularyDef> = LazyLock::new(|| {
    serde_json::from_str(SHEET_VOCABULARY_JSON).expect("embedded sheet-vocabulary.json is valid")
});

/// The vocabulary compiled into the crate.
pub fn default_vocabulary() -> &'static VocabularyDef {
    &DEFAULT_VOCABULARY
}

static VALUATION_DEFAULTS: LazyLock<ValuationDefaultsDef> = LazyLock::new(|| {
    serde_json::from_str(VALUATION_DEFAULTS_JSON)
        .expect("embedded valuation-defaults.json is valid")
});

static DEFAULT_PLAN: LazyLock<ValuationPlan> = LazyLock::new(|| ValuationPlan {
    methods: VALUATION_DEFAULTS.methods.clone(),
    sensitivity: Some(VALUATION_DEFAULTS.sensitivity.clone()),
});

pub fn valuation_defaults() -> &'static ValuationDefaultsDef {
    &VALUATION_DEFAULTS
}

/// Methods used when a plan omits its method list.
pub fn default_methods() -> Vec<MethodConfig> {
    VALUATION_DEFAULTS.methods.clone()
}

/// Default methods with sensitivity tables enabled.
pub fn default_valuation_plan() -> &'static ValuationPlan {
    &DEFAULT_PLAN
}

/// Load a predefined vocabulary by name.
pub fn load_preset(name: &str) -> Result<VocabularyDef, DealsheetError> {
    match name {
        "default" => Ok(default_vocabulary().clone()),
        _ => Err(DealsheetError::UnknownPreset {
            name: name.to_string(),
            available: PRESETS.join(", "),
        }),
    }
}
