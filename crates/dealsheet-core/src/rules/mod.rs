pub mod builtin;
pub mod schema;

use crate::error::DealsheetError;
use crate::model::SheetType;
use schema::VocabularyDef;
use std::path::Path;

/// Load a classifier vocabulary from a JSON file.
pub fn load_vocabulary(path: &Path) -> Result<VocabularyDef, DealsheetError> {
    let content = std::fs::read_to_string(path).map_err(|e| DealsheetError::ConfigLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    parse_vocabulary(&content, path)
}

/// Parse a vocabulary from a JSON string read from `source`.
pub fn parse_vocabulary(json: &str, source: &Path) -> Result<VocabularyDef, DealsheetError> {
    let vocab: VocabularyDef = serde_json::from_str(json).map_err(|e| DealsheetError::ConfigLoad {
        path: source.to_path_buf(),
        reason: e.to_string(),
    })?;
    validate_vocabulary(&vocab)?;
    Ok(vocab)
}

/// Parse a vocabulary from a JSON string (no file path context).
pub fn parse_vocabulary_str(json: &str) -> Result<VocabularyDef, DealsheetError> {
    let vocab: VocabularyDef = serde_json::from_str(json)?;
    validate_vocabulary(&vocab)?;
    Ok(vocab)
}

/// Validate that a vocabulary is well-formed.
pub fn validate_vocabulary(vocab: &VocabularyDef) -> Result<(), DealsheetError> {
    if vocab.vocabularies.is_empty() {
        return Err(DealsheetError::ConfigInvalid(
            "vocabularies must not be empty".into(),
        ));
    }
    if vocab.min_score == 0 {
        return Err(DealsheetError::ConfigInvalid(
            "min_score must be at least 1".into(),
        ));
    }
    if vocab.scan_rows == 0 {
        return Err(DealsheetError::ConfigInvalid(
            "scan_rows must be at least 1".into(),
        ));
    }

    for group in &vocab.vocabularies {
        if group.sheet_type == SheetType::Unknown {
            return Err(DealsheetError::ConfigInvalid(
                "'unknown' is the fallback type and cannot have a vocabulary".into(),
            ));
        }
        if group.weight == 0 {
            return Err(DealsheetError::ConfigInvalid(format!(
                "vocabulary '{}' has zero weight",
                group.sheet_type
            )));
        }
        if group.keywords.is_empty() {
            return Err(DealsheetError::ConfigInvalid(format!(
                "vocabulary '{}' has no keywords",
                group.sheet_type
            )));
        }
        if group.keywords.iter().any(|k| k.trim().is_empty()) {
            return Err(DealsheetError::ConfigInvalid(format!(
                "vocabulary '{}' contains an empty keyword",
                group.sheet_type
            )));
        }
    }

    Ok(())
}
