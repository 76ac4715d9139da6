use serde::{Deserialize, Serialize};

use crate::model::SheetType;

/// Score of one vocabulary against a sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabularyScore {
    pub sheet_type: SheetType,
    pub score: u32,
    /// Distinct keywords that hit, in rule order.
    pub matched: Vec<String>,
}

/// Classifier verdict for a single worksheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetClassification {
    pub sheet_name: String,
    pub sheet_type: SheetType,
    /// Score of the winning vocabulary (0 for fallbacks).
    pub score: u32,
    /// Every vocabulary's score, in declaration order.
    pub scores: Vec<VocabularyScore>,
    /// Human-readable explanation of the verdict.
    pub reason: String,
}
