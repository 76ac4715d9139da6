//! Facility identity resolution across parser outputs.
//!
//! Statement sections seed the facility clusters. Valuation entries and
//! listing records then attach to their best-scoring cluster or start a new
//! one. Near misses are never merged; they are reported as [`MergeReview`]s
//! for someone to confirm.

use log::{debug, info};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::DealsheetError;
use crate::model::{
    Census, FacilityClassification, FacilitySection, PropertyType, SummaryMetrics, ValuationEntry,
};
use crate::parsing::normalize::{canonical_facility_name, facility_key, facility_tokens};
use crate::warnings::{push_warning, ExtractionWarning, Stage, WarningSeverity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    /// Case-insensitive equality of the first `prefix_length` characters.
    Prefix,
    /// Token overlap or edit distance over normalised names.
    Similarity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverOptions {
    pub strategy: MatchStrategy,
    pub prefix_length: usize,
    /// Scores at or above this merge.
    pub accept_threshold: Decimal,
    /// Scores in `[review_threshold, accept_threshold)` are flagged.
    pub review_threshold: Decimal,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        ResolverOptions {
            strategy: MatchStrategy::Similarity,
            prefix_length: 10,
            accept_threshold: dec!(0.85),
            review_threshold: dec!(0.60),
        }
    }
}

impl ResolverOptions {
    pub fn validate(&self) -> Result<(), DealsheetError> {
        let unit = Decimal::ZERO..=Decimal::ONE;
        if !unit.contains(&self.accept_threshold) || !unit.contains(&self.review_threshold) {
            return Err(DealsheetError::ConfigInvalid(
                "resolver thresholds must lie within 0..=1".into(),
            ));
        }
        if self.accept_threshold < self.review_threshold {
            return Err(DealsheetError::ConfigInvalid(
                "resolver accept_threshold must be >= review_threshold".into(),
            ));
        }
        if self.prefix_length == 0 {
            return Err(DealsheetError::ConfigInvalid(
                "resolver prefix_length must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Where a resolved bed count came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BedSource {
    Classification,
    ValuationEntry,
    StatementCensus,
}

/// One facility after merging every parser's view of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedFacility {
    pub name: String,
    /// Other spellings merged into this facility.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    pub sheets: Vec<String>,
    pub beds: Option<u32>,
    pub bed_source: Option<BedSource>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub property_type: Option<PropertyType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub census: Option<Census>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<SummaryMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valuation_entry: Option<ValuationEntry>,
}

/// A pair of names similar enough to look alike but below the merge bar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeReview {
    pub facility: String,
    pub candidate: String,
    pub candidate_source: String,
    pub score: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub facilities: Vec<ResolvedFacility>,
    pub reviews: Vec<MergeReview>,
}

#[derive(Debug, Default)]
struct Cluster {
    names: Vec<String>,
    sheets: Vec<String>,
    census: Option<Census>,
    summary: Option<SummaryMetrics>,
    valuation: Option<ValuationEntry>,
    classification_beds: Option<u32>,
}

impl Cluster {
    fn named(name: &str) -> Self {
        Cluster {
            names: vec![name.to_string()],
            ..Default::default()
        }
    }

    fn add_name(&mut self, name: &str) {
        if !self.names.iter().any(|n| n == name) {
            self.names.push(name.to_string());
        }
    }

    fn add_sheet(&mut self, sheet: &str) {
        if !self.sheets.iter().any(|s| s == sheet) {
            self.sheets.push(sheet.to_string());
        }
    }

    fn into_facility(self) -> ResolvedFacility {
        let (beds, bed_source) = if let Some(b) = self.classification_beds {
            (Some(b), Some(BedSource::Classification))
        } else if let Some(e) = &self.valuation {
            (Some(e.beds), Some(BedSource::ValuationEntry))
        } else if let Some(b) = self.census.as_ref().and_then(|c| c.beds) {
            (Some(b), Some(BedSource::StatementCensus))
        } else {
            (None, None)
        };

        let mut names = self.names.into_iter();
        let name = names.next().unwrap_or_default();
        ResolvedFacility {
            name,
            aliases: names.collect(),
            sheets: self.sheets,
            beds,
            bed_source,
            city: self.valuation.as_ref().and_then(|e| e.city.clone()),
            state: self.valuation.as_ref().and_then(|e| e.state.clone()),
            property_type: self.valuation.as_ref().map(|e| e.property_type),
            census: self.census,
            summary: self.summary,
            valuation_entry: self.valuation,
        }
    }
}

enum Placement {
    Merge(usize),
    New,
}

/// Merges facility records from every parser into one view per facility.
#[derive(Debug, Clone, Default)]
pub struct FacilityResolver {
    options: ResolverOptions,
}

impl FacilityResolver {
    pub fn new(options: ResolverOptions) -> Self {
        FacilityResolver { options }
    }

    /// Match score in 0..=1 between two raw facility names.
    pub fn score(&self, a: &str, b: &str) -> Decimal {
        match self.options.strategy {
            MatchStrategy::Prefix => prefix_score(a, b, self.options.prefix_length),
            MatchStrategy::Similarity => similarity_score(a, b),
        }
    }

    pub fn resolve(
        &self,
        sections: &[FacilitySection],
        entries: &[ValuationEntry],
        classifications: &[FacilityClassification],
        warnings: &mut Vec<ExtractionWarning>,
    ) -> Resolution {
        let mut clusters: Vec<Cluster> = Vec::new();
        let mut reviews: Vec<MergeReview> = Vec::new();

        for section in sections {
            let idx = self.place(&mut clusters, &mut reviews, &section.facility_name, "statement");
            let cluster = &mut clusters[idx];
            cluster.add_sheet(&section.sheet_name);
            if cluster.census.is_none() {
                cluster.census = Some(section.census.clone());
            }
            if cluster.summary.is_none() {
                cluster.summary = Some(section.summary.clone());
            }
        }

        for entry in entries {
            let idx = self.place(&mut clusters, &mut reviews, &entry.facility_name, "valuation_entry");
            let cluster = &mut clusters[idx];
            if cluster.valuation.is_none() {
                cluster.valuation = Some(entry.clone());
            } else {
                debug!(
                    "resolver: second valuation entry for '{}' ignored",
                    entry.facility_name
                );
            }
        }

        for record in classifications {
            let idx = self.place(&mut clusters, &mut reviews, &record.facility_name, "classification");
            let cluster = &mut clusters[idx];
            cluster.add_sheet(&record.sheet_name);
            if cluster.classification_beds.is_none() {
                cluster.classification_beds = record.beds;
            }
        }

        for review in &reviews {
            push_warning(
                warnings,
                Stage::Resolve,
                None,
                WarningSeverity::Info,
                format!(
                    "'{}' ({}) resembles '{}' (score {}); not merged",
                    review.candidate, review.candidate_source, review.facility, review.score
                ),
            );
        }

        let facilities: Vec<ResolvedFacility> =
            clusters.into_iter().map(Cluster::into_facility).collect();
        info!(
            "resolver: {} facilities, {} flagged for review",
            facilities.len(),
            reviews.len()
        );
        Resolution {
            facilities,
            reviews,
        }
    }

    /// Attach `name` to the best cluster, or open a new one. Returns the
    /// cluster index.
    fn place(
        &self,
        clusters: &mut Vec<Cluster>,
        reviews: &mut Vec<MergeReview>,
        name: &str,
        source: &str,
    ) -> usize {
        let name = canonical_facility_name(name);
        match self.placement(clusters, reviews, &name, source) {
            Placement::Merge(idx) => {
                clusters[idx].add_name(&name);
                idx
            }
            Placement::New => {
                clusters.push(Cluster::named(&name));
                clusters.len() - 1
            }
        }
    }

    fn placement(
        &self,
        clusters: &[Cluster],
        reviews: &mut Vec<MergeReview>,
        name: &str,
        source: &str,
    ) -> Placement {
        // Earliest cluster wins ties.
        let mut best: Option<(usize, Decimal)> = None;
        for (idx, cluster) in clusters.iter().enumerate() {
            let score = cluster
                .names
                .iter()
                .map(|n| self.score(n, name))
                .max()
                .unwrap_or(Decimal::ZERO);
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((idx, score));
            }
        }

        match best {
            Some((idx, score)) if score >= self.options.accept_threshold => {
                debug!("resolver: '{}' merged into '{}' ({})", name, clusters[idx].names[0], score);
                Placement::Merge(idx)
            }
            Some((idx, score)) if score >= self.options.review_threshold => {
                reviews.push(MergeReview {
                    facility: clusters[idx].names[0].clone(),
                    candidate: name.to_string(),
                    candidate_source: source.to_string(),
                    score,
                });
                Placement::New
            }
            _ => Placement::New,
        }
    }
}

/// 1 when the first `len` characters match ignoring case, else 0.
pub fn prefix_score(a: &str, b: &str, len: usize) -> Decimal {
    let head = |s: &str| -> String {
        canonical_facility_name(s)
            .chars()
            .take(len)
            .flat_map(char::to_lowercase)
            .collect()
    };
    let (a, b) = (head(a), head(b));
    if !a.is_empty() && a == b {
        Decimal::ONE
    } else {
        Decimal::ZERO
    }
}

/// Larger of token Jaccard overlap and normalised edit similarity, rounded
/// to four places.
pub fn similarity_score(a: &str, b: &str) -> Decimal {
    let (ta, tb) = (facility_tokens(a), facility_tokens(b));
    if ta.is_empty() || tb.is_empty() {
        return Decimal::ZERO;
    }
    let shared = ta.iter().filter(|t| tb.contains(t)).count();
    let union = ta.len() + tb.iter().filter(|t| !ta.contains(t)).count();
    let jaccard = Decimal::from(shared) / Decimal::from(union);

    let (ka, kb) = (facility_key(a), facility_key(b));
    let longest = ka.chars().count().max(kb.chars().count());
    let edit = Decimal::ONE - Decimal::from(levenshtein(&ka, &kb)) / Decimal::from(longest);

    jaccard.max(edit).round_dp(4)
}

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RateBasis, YearFigures};

    fn section(name: &str, beds: Option<u32>) -> FacilitySection {
        FacilitySection {
            facility_name: name.to_string(),
            sheet_name: format!("{name} T12"),
            census: Census {
                beds,
                ..Default::default()
            },
            line_items: Vec::new(),
            summary: SummaryMetrics {
                ebitda: Some(dec!(1000000)),
                ..Default::default()
            },
        }
    }

    fn entry(name: &str, beds: u32) -> ValuationEntry {
        ValuationEntry {
            facility_name: name.to_string(),
            property_type: PropertyType::OwnedSkilled,
            beds,
            specific_needs_pct: None,
            rate: RateBasis::CapRate(dec!(0.1)),
            prior_year: None,
            current_year: YearFigures::default(),
            city: Some("Boise".into()),
            state: Some("ID".into()),
            source_row: 3,
        }
    }

    fn listing(name: &str, beds: u32) -> FacilityClassification {
        FacilityClassification {
            facility_name: name.to_string(),
            sheet_name: "Census".into(),
            beds: Some(beds),
        }
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("sunrise", "sunrise"), 0);
    }

    #[test]
    fn test_similarity_ignores_corporate_suffix() {
        assert_eq!(similarity_score("Sunrise SNF, LLC", "sunrise snf"), Decimal::ONE);
        assert!(similarity_score("Sunrise SNF", "Sunset Manor") < dec!(0.6));
    }

    #[test]
    fn test_prefix_strategy_merges_shared_prefix() {
        assert_eq!(
            prefix_score("Sunrise Healthcare North", "SUNRISE HEALTHCARE South", 10),
            Decimal::ONE
        );
        assert_eq!(prefix_score("Sunrise", "Sunset", 10), Decimal::ZERO);
    }

    #[test]
    fn test_merge_and_precedence() {
        let resolver = FacilityResolver::default();
        let mut warnings = Vec::new();
        let resolution = resolver.resolve(
            &[section("Sunrise SNF", Some(118))],
            &[entry("Sunrise SNF LLC", 120)],
            &[listing("Sunrise SNF", 122)],
            &mut warnings,
        );
        assert_eq!(resolution.facilities.len(), 1);
        let f = &resolution.facilities[0];
        assert_eq!(f.name, "Sunrise SNF");
        assert_eq!(f.beds, Some(122));
        assert_eq!(f.bed_source, Some(BedSource::Classification));
        assert_eq!(f.state.as_deref(), Some("ID"));
        assert_eq!(f.property_type, Some(PropertyType::OwnedSkilled));
        assert!(f.summary.is_some());
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_bed_precedence_without_listing() {
        let resolver = FacilityResolver::default();
        let mut warnings = Vec::new();
        let with_entry = resolver.resolve(
            &[section("Harbor Point", Some(80))],
            &[entry("Harbor Point", 90)],
            &[],
            &mut warnings,
        );
        assert_eq!(with_entry.facilities[0].beds, Some(90));
        let census_only =
            resolver.resolve(&[section("Harbor Point", Some(80))], &[], &[], &mut warnings);
        assert_eq!(census_only.facilities[0].beds, Some(80));
        assert_eq!(census_only.facilities[0].bed_source, Some(BedSource::StatementCensus));
    }

    #[test]
    fn test_shared_prefix_flagged_not_merged() {
        let resolver = FacilityResolver::default();
        let mut warnings = Vec::new();
        let resolution = resolver.resolve(
            &[
                section("Sunrise Healthcare of Boise", None),
                section("Sunrise Healthcare of Nampa", None),
            ],
            &[],
            &[],
            &mut warnings,
        );
        assert_eq!(resolution.facilities.len(), 2);
        assert_eq!(resolution.reviews.len(), 1);
        assert_eq!(resolution.reviews[0].facility, "Sunrise Healthcare of Boise");
        assert_eq!(resolution.reviews[0].score, dec!(0.7917));
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].stage, Stage::Resolve);
    }

    #[test]
    fn test_prefix_strategy_auto_merges() {
        let resolver = FacilityResolver::new(ResolverOptions {
            strategy: MatchStrategy::Prefix,
            ..Default::default()
        });
        let mut warnings = Vec::new();
        let resolution = resolver.resolve(
            &[
                section("Sunrise Healthcare of Boise", None),
                section("Sunrise Healthcare of Nampa", None),
            ],
            &[],
            &[],
            &mut warnings,
        );
        assert_eq!(resolution.facilities.len(), 1);
        assert_eq!(resolution.facilities[0].aliases, vec!["Sunrise Healthcare of Nampa".to_string()]);
    }

    #[test]
    fn test_unmatched_entries_open_new_facilities() {
        let resolver = FacilityResolver::default();
        let mut warnings = Vec::new();
        let resolution = resolver.resolve(
            &[section("Sunrise SNF", None)],
            &[entry("Meadow View", 90)],
            &[],
            &mut warnings,
        );
        assert_eq!(resolution.facilities.len(), 2);
        assert_eq!(resolution.facilities[1].name, "Meadow View");
        assert!(resolution.facilities[1].summary.is_none());
    }

    #[test]
    fn test_options_validation() {
        assert!(ResolverOptions::default().validate().is_ok());
        let bad = ResolverOptions {
            accept_threshold: dec!(0.5),
            review_threshold: dec!(0.7),
            ..Default::default()
        };
        assert!(bad.validate().is_err());
        let out_of_range = ResolverOptions {
            accept_threshold: dec!(1.5),
            ..Default::default()
        };
        assert!(out_of_range.validate().is_err());
    }
}
