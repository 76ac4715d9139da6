use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningSeverity {
    Critical,
    Important,
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Classify,
    LedgerMapping,
    Layout,
    Statement,
    ValuationEntry,
    Portfolio,
    Census,
    Resolve,
    Valuation,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Classify => "classify",
            Stage::LedgerMapping => "ledger_mapping",
            Stage::Layout => "layout",
            Stage::Statement => "statement",
            Stage::ValuationEntry => "valuation_entry",
            Stage::Portfolio => "portfolio",
            Stage::Census => "census",
            Stage::Resolve => "resolve",
            Stage::Valuation => "valuation",
        };
        write!(f, "{s}")
    }
}

/// A human-readable, non-fatal problem raised during extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionWarning {
    pub stage: Stage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheet: Option<String>,
    pub message: String,
    pub severity: WarningSeverity,
}

impl fmt::Display for ExtractionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.sheet {
            Some(sheet) => write!(f, "[{}] {}: {}", self.stage, sheet, self.message),
            None => write!(f, "[{}] {}", self.stage, self.message),
        }
    }
}

/// Append a warning to the shared list and mirror it to the log.
pub fn push_warning(
    warnings: &mut Vec<ExtractionWarning>,
    stage: Stage,
    sheet: Option<&str>,
    severity: WarningSeverity,
    message: impl Into<String>,
) {
    let warning = ExtractionWarning {
        stage,
        sheet: sheet.map(str::to_string),
        message: message.into(),
        severity,
    };
    warn!("{warning}");
    warnings.push(warning);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_warning_keeps_order() {
        let mut warnings = Vec::new();
        push_warning(&mut warnings, Stage::Layout, Some("T12"), WarningSeverity::Important, "no layout");
        push_warning(&mut warnings, Stage::Resolve, None, WarningSeverity::Info, "review");
        assert_eq!(warnings.len(), 2);
        assert_eq!(warnings[0].to_string(), "[layout] T12: no layout");
        assert_eq!(warnings[1].to_string(), "[resolve] review");
    }

    #[test]
    fn test_warning_serializes_snake_case() {
        let w = ExtractionWarning {
            stage: Stage::ValuationEntry,
            sheet: None,
            message: "m".into(),
            severity: WarningSeverity::Critical,
        };
        let json = serde_json::to_string(&w).unwrap();
        assert!(json.contains("\"valuation_entry\""));
        assert!(json.contains("\"critical\""));
        assert!(!json.contains("sheet"));
    }
}
