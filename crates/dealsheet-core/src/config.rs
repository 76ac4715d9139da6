//! Extraction options, loadable from JSON.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::DealsheetError;
use crate::resolve::ResolverOptions;
use crate::rules::builtin::default_vocabulary;
use crate::rules::schema::VocabularyDef;
use crate::rules::validate_vocabulary;
use crate::valuation::{validate_plan, ValuationPlan};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractOptions {
    /// Overrides the vocabulary's minimum classifier score.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_score: Option<u32>,
    /// Overrides how many rows the classifier reads.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scan_rows: Option<usize>,
    /// Rows searched for a header row by the layout detector.
    pub header_rows: usize,
    /// Parsed rates within this distance of 1.0 raise a warning.
    pub rate_band: Decimal,
    pub resolver: ResolverOptions,
    /// Run for every resolved facility when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valuation: Option<ValuationPlan>,
    /// Replaces the built-in sheet vocabulary.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vocabulary: Option<VocabularyDef>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        ExtractOptions {
            min_score: None,
            scan_rows: None,
            header_rows: 15,
            rate_band: dec!(0.10),
            resolver: ResolverOptions::default(),
            valuation: None,
            vocabulary: None,
        }
    }
}

impl ExtractOptions {
    /// The classifier vocabulary with any score or depth overrides applied.
    pub fn effective_vocabulary(&self) -> VocabularyDef {
        let mut vocab = self
            .vocabulary
            .clone()
            .unwrap_or_else(|| default_vocabulary().clone());
        if let Some(min_score) = self.min_score {
            vocab.min_score = min_score;
        }
        if let Some(scan_rows) = self.scan_rows {
            vocab.scan_rows = scan_rows;
        }
        vocab
    }

    pub fn validate(&self) -> Result<(), DealsheetError> {
        if self.header_rows == 0 {
            return Err(DealsheetError::ConfigInvalid(
                "header_rows must be at least 1".into(),
            ));
        }
        if self.rate_band < Decimal::ZERO || self.rate_band >= Decimal::ONE {
            return Err(DealsheetError::ConfigInvalid(
                "rate_band must lie within 0..1".into(),
            ));
        }
        self.resolver.validate()?;
        validate_vocabulary(&self.effective_vocabulary())?;
        if let Some(plan) = &self.valuation {
            validate_plan(plan)
                .map_err(|e| DealsheetError::ConfigInvalid(format!("valuation: {e}")))?;
        }
        Ok(())
    }
}

/// Load and validate extraction options from a JSON file.
pub fn load_options(path: &Path) -> Result<ExtractOptions, DealsheetError> {
    let content = std::fs::read_to_string(path).map_err(|e| DealsheetError::ConfigLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let options: ExtractOptions =
        serde_json::from_str(&content).map_err(|e| DealsheetError::ConfigLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    options.validate()?;
    Ok(options)
}

pub fn parse_options_str(json: &str) -> Result<ExtractOptions, DealsheetError> {
    let options: ExtractOptions = serde_json::from_str(json)?;
    options.validate()?;
    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::MatchStrategy;
    use crate::valuation::MethodConfig;
    use std::io::Write;

    #[test]
    fn test_empty_object_is_default() {
        let options = parse_options_str("{}").unwrap();
        assert_eq!(options, ExtractOptions::default());
        assert_eq!(options.effective_vocabulary().min_score, 2);
    }

    #[test]
    fn test_overrides() {
        let options = parse_options_str(
            r#"{
                "min_score": 3,
                "scan_rows": 40,
                "rate_band": "0.05",
                "resolver": { "strategy": "prefix" },
                "valuation": { "methods": [{ "method": "cap_rate", "cap_rate": "0.11" }] }
            }"#,
        )
        .unwrap();
        let vocab = options.effective_vocabulary();
        assert_eq!(vocab.min_score, 3);
        assert_eq!(vocab.scan_rows, 40);
        assert_eq!(options.rate_band, dec!(0.05));
        assert_eq!(options.resolver.strategy, MatchStrategy::Prefix);
        assert_eq!(options.resolver.prefix_length, 10);
        let plan = options.valuation.unwrap();
        assert_eq!(
            plan.methods,
            vec![MethodConfig::CapRate {
                cap_rate: dec!(0.11)
            }]
        );
    }

    #[test]
    fn test_invalid_thresholds_rejected() {
        let err = parse_options_str(
            r#"{ "resolver": { "accept_threshold": "0.5", "review_threshold": "0.7" } }"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("accept_threshold"));
        assert!(parse_options_str(r#"{ "resolver": { "accept_threshold": "1.5" } }"#).is_err());
    }

    #[test]
    fn test_invalid_scan_depths_rejected() {
        assert!(parse_options_str(r#"{ "header_rows": 0 }"#).is_err());
        assert!(parse_options_str(r#"{ "scan_rows": 0 }"#).is_err());
        assert!(parse_options_str(r#"{ "min_score": 0 }"#).is_err());
    }

    #[test]
    fn test_invalid_valuation_rejected() {
        let err = parse_options_str(
            r#"{ "valuation": { "methods": [{ "method": "noi_multiple", "multiple": "-2" }] } }"#,
        )
        .unwrap_err();
        assert!(err.to_string().starts_with("invalid configuration: valuation"));
    }

    #[test]
    fn test_load_options_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"header_rows": 20}}"#).unwrap();
        let options = load_options(file.path()).unwrap();
        assert_eq!(options.header_rows, 20);
    }

    #[test]
    fn test_load_malformed_file_reports_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let err = load_options(file.path()).unwrap_err();
        assert!(matches!(err, DealsheetError::ConfigLoad { .. }));
    }
}
