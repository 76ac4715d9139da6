use serde::{Deserialize, Serialize};

use crate::model::SheetType;
use crate::valuation::outcome::{MethodConfig, SensitivityOptions};

/// Keyword vocabularies that drive the sheet classifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabularyDef {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub version: String,
    /// Minimum weighted hit count for a vocabulary to win.
    #[serde(default = "default_min_score")]
    pub min_score: u32,
    /// Rows flattened into the text the keywords are matched against.
    #[serde(default = "default_scan_rows")]
    pub scan_rows: usize,
    /// Declaration order breaks ties.
    pub vocabularies: Vec<VocabularyGroupDef>,
}

/// Keywords for one sheet type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabularyGroupDef {
    pub sheet_type: SheetType,
    /// Weight added per distinct keyword hit.
    #[serde(default = "default_weight")]
    pub weight: u32,
    pub keywords: Vec<String>,
}

/// One flattened (pattern, weight, target type) rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordRule {
    pub pattern: String,
    pub weight: u32,
    pub sheet_type: SheetType,
}

impl VocabularyDef {
    /// Flatten the vocabularies into an ordered rule table with lowercase patterns.
    pub fn rules(&self) -> Vec<KeywordRule> {
        self.vocabularies
            .iter()
            .flat_map(|group| {
                group.keywords.iter().map(move |k| KeywordRule {
                    pattern: k.trim().to_lowercase(),
                    weight: group.weight,
                    sheet_type: group.sheet_type,
                })
            })
            .collect()
    }

    /// Sheet types in declaration order, without duplicates.
    pub fn sheet_types(&self) -> Vec<SheetType> {
        let mut types = Vec::new();
        for group in &self.vocabularies {
            if !types.contains(&group.sheet_type) {
                types.push(group.sheet_type);
            }
        }
        types
    }
}

/// Valuation assumptions applied when a plan names no methods.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValuationDefaultsDef {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub version: String,
    pub methods: Vec<MethodConfig>,
    #[serde(default)]
    pub sensitivity: SensitivityOptions,
}

fn default_min_score() -> u32 {
    2
}

fn default_scan_rows() -> usize {
    30
}

fn default_weight() -> u32 {
    1
}
