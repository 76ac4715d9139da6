use log::debug;
use sha2::{Digest, Sha256};

use super::{build_from_sheet, LedgerMapping};
use crate::model::Worksheet;
use crate::warnings::ExtractionWarning;

/// Hex SHA-256 over a worksheet's name and cell contents.
pub fn sheet_fingerprint(sheet: &Worksheet) -> String {
    let mut hasher = Sha256::new();
    hasher.update(sheet.name.as_bytes());
    for row in &sheet.cells {
        hasher.update([0x1e]);
        for cell in row {
            hasher.update(cell.to_string().as_bytes());
            hasher.update([0x1f]);
        }
    }
    format!("{:x}", hasher.finalize())
}

/// Holds the mapping built for the most recent mapping sheet, so repeated
/// extractions of the same workbook skip the rebuild. Keyed by the sheet
/// fingerprint and the header-row depth it was built with.
#[derive(Debug, Default)]
pub struct LedgerMappingCache {
    slot: Option<(usize, LedgerMapping)>,
    hits: usize,
}

impl LedgerMappingCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached mapping when the sheet's fingerprint and
    /// `header_rows` match, otherwise build and cache a fresh one.
    pub fn get_or_build(
        &mut self,
        sheet: &Worksheet,
        header_rows: usize,
        warnings: &mut Vec<ExtractionWarning>,
    ) -> Option<LedgerMapping> {
        let fingerprint = sheet_fingerprint(sheet);
        if let Some((rows, cached)) = &self.slot {
            if cached.fingerprint == fingerprint && *rows == header_rows {
                self.hits += 1;
                debug!("ledger mapping cache hit for '{}'", sheet.name);
                return Some(cached.clone());
            }
        }

        let mapping = build_from_sheet(sheet, header_rows, warnings)?;
        self.slot = Some((header_rows, mapping.clone()));
        Some(mapping)
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn clear(&mut self) {
        self.slot = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet(code: &str) -> Worksheet {
        Worksheet::from_rows("GL Mapping", &[&["Code", "Description"], &[code, "Medicare Revenue"]])
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        assert_eq!(sheet_fingerprint(&sheet("400110")), sheet_fingerprint(&sheet("400110")));
        assert_ne!(sheet_fingerprint(&sheet("400110")), sheet_fingerprint(&sheet("400120")));
        assert_eq!(sheet_fingerprint(&sheet("400110")).len(), 64);
    }

    #[test]
    fn test_cache_reuses_matching_sheet() {
        let mut cache = LedgerMappingCache::new();
        let mut warnings = Vec::new();
        let first = cache.get_or_build(&sheet("400110"), 10, &mut warnings).unwrap();
        let second = cache.get_or_build(&sheet("400110"), 10, &mut warnings).unwrap();
        assert_eq!(first, second);
        assert_eq!(cache.hits(), 1);

        let third = cache.get_or_build(&sheet("500100"), 10, &mut warnings).unwrap();
        assert!(third.lookup("500100").is_some());
        assert_eq!(cache.hits(), 1);
    }

    #[test]
    fn test_cache_rebuilds_for_other_header_depth() {
        let mut cache = LedgerMappingCache::new();
        let mut warnings = Vec::new();
        cache.get_or_build(&sheet("400110"), 10, &mut warnings).unwrap();
        cache.get_or_build(&sheet("400110"), 3, &mut warnings).unwrap();
        assert_eq!(cache.hits(), 0);
        cache.get_or_build(&sheet("400110"), 3, &mut warnings).unwrap();
        assert_eq!(cache.hits(), 1);
    }
}
