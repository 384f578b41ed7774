// ==============================================================================
// models.rs - SNP Extraction Data Models
// ==============================================================================
// Description: Variants, reference catalog entries and extraction results
// Author: Matt Barham
// Created: 2026-10-18
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Tool name embedded in every report
pub const TOOL_NAME: &str = "snp-extractor";

/// Tool version embedded in every report
pub const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Genotype sentinel for a failed read
pub const NO_CALL: &str = "--";

/// Full disclaimer used by the detailed report
pub const DISCLAIMER: &str = "This report lists raw genotype data for informational purposes only. \
It is not a medical diagnosis and must not be used to make health decisions without \
consulting a qualified professional.";

/// Short disclaimer used by the compact and minimal reports
pub const SHORT_DISCLAIMER: &str = "Not medical advice.";

/// Canonical chromosome name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Chromosome {
    /// Autosomes 1-22
    Autosome(u8),
    X,
    Y,
    /// Mitochondrial DNA
    MT,
}

impl Chromosome {
    /// Parse a chromosome name as written in a 23andMe export ("1"-"22", "X", "Y", "MT")
    pub fn from_name(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "X" => Some(Chromosome::X),
            "Y" => Some(Chromosome::Y),
            "MT" | "M" => Some(Chromosome::MT),
            other => other
                .parse::<u8>()
                .ok()
                .filter(|n| (1..=22).contains(n))
                .map(Chromosome::Autosome),
        }
    }

    /// Parse an AncestryDNA chromosome code (23=X, 24=Y, 25/26=MT)
    pub fn from_numeric_code(value: &str) -> Option<Self> {
        match value.trim() {
            "23" => Some(Chromosome::X),
            "24" => Some(Chromosome::Y),
            "25" | "26" => Some(Chromosome::MT),
            other => Self::from_name(other),
        }
    }
}

impl fmt::Display for Chromosome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Chromosome::Autosome(n) => write!(f, "{}", n),
            Chromosome::X => f.write_str("X"),
            Chromosome::Y => f.write_str("Y"),
            Chromosome::MT => f.write_str("MT"),
        }
    }
}

impl Serialize for Chromosome {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Single variant row recovered from a genome export
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenomicVariant {
    /// Lowercase identifier, "rs" or "i" prefixed
    pub rsid: String,
    pub chromosome: Chromosome,
    /// 1-based base pair position
    pub position: u64,
    /// Uppercase allele pair, or "--" for no-call
    pub genotype: String,
}

impl GenomicVariant {
    pub fn is_no_call(&self) -> bool {
        self.genotype == NO_CALL
    }
}

/// Returns true if `rsid` is an "rs"/"i" prefix followed by digits (case-insensitive)
pub fn is_valid_rsid(rsid: &str) -> bool {
    let lower = rsid.to_ascii_lowercase();
    let digits = lower
        .strip_prefix("rs")
        .or_else(|| lower.strip_prefix('i'));

    match digits {
        Some(d) => !d.is_empty() && d.bytes().all(|b| b.is_ascii_digit()),
        None => false,
    }
}

/// Reference catalog category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Methylation,
    Neurotransmitters,
    Cardiovascular,
    Metabolism,
    Detoxification,
    Inflammation,
    Nutrients,
    Fitness,
    Sleep,
    Cognition,
    Pharmacogenomics,
    Longevity,
    Other,
}

impl Category {
    pub const ALL: [Category; 13] = [
        Category::Methylation,
        Category::Neurotransmitters,
        Category::Cardiovascular,
        Category::Metabolism,
        Category::Detoxification,
        Category::Inflammation,
        Category::Nutrients,
        Category::Fitness,
        Category::Sleep,
        Category::Cognition,
        Category::Pharmacogenomics,
        Category::Longevity,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Methylation => "methylation",
            Category::Neurotransmitters => "neurotransmitters",
            Category::Cardiovascular => "cardiovascular",
            Category::Metabolism => "metabolism",
            Category::Detoxification => "detoxification",
            Category::Inflammation => "inflammation",
            Category::Nutrients => "nutrients",
            Category::Fitness => "fitness",
            Category::Sleep => "sleep",
            Category::Cognition => "cognition",
            Category::Pharmacogenomics => "pharmacogenomics",
            Category::Longevity => "longevity",
            Category::Other => "other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| format!("unknown category '{}'", s.trim()))
    }
}

/// Set of categories to extract; an unset filter selects everything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryFilter(Option<BTreeSet<Category>>);

impl CategoryFilter {
    pub fn all() -> Self {
        Self(None)
    }

    pub fn only<I: IntoIterator<Item = Category>>(categories: I) -> Self {
        Self(Some(categories.into_iter().collect()))
    }

    pub fn includes(&self, category: Category) -> bool {
        match &self.0 {
            None => true,
            Some(set) => set.contains(&category),
        }
    }

    pub fn is_all(&self) -> bool {
        self.0.is_none()
    }
}

/// Curated variant of interest
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferenceEntry {
    /// Lowercase "rs" identifier
    pub rsid: String,
    pub gene: String,
    pub category: Category,
    pub annotation: String,
    pub sources: Vec<String>,
    pub risk_allele: Option<String>,
    pub chromosome: Option<String>,
    pub position: Option<u64>,
}

/// Versioned list of reference entries (free or premium tier)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferenceCatalog {
    pub version: String,
    pub generated_at: DateTime<Utc>,
    /// Declared count; may disagree with `entries.len()`
    pub count: usize,
    pub entries: Vec<ReferenceEntry>,
}

impl ReferenceCatalog {
    /// Categories that occur in the catalog, in declaration order
    pub fn categories(&self) -> Vec<Category> {
        let present: BTreeSet<Category> = self.entries.iter().map(|e| e.category).collect();
        present.into_iter().collect()
    }
}

/// Outcome for a catalog entry found in the genome file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchStatus {
    Found,
    NoCall,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Found => "found",
            MatchStatus::NoCall => "no-call",
        }
    }
}

/// Catalog entry paired with the observed genotype
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchedVariant {
    #[serde(flatten)]
    pub entry: ReferenceEntry,
    pub genotype: String,
    pub status: MatchStatus,
}

/// Why a catalog entry has no match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnmatchedReason {
    NotInFile,
}

impl UnmatchedReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnmatchedReason::NotInFile => "not-in-file",
        }
    }
}

/// Catalog entry absent from the genome file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnmatchedEntry {
    pub rsid: String,
    pub gene: String,
    pub category: Category,
    pub reason: UnmatchedReason,
}

/// Provenance of an extraction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionMetadata {
    pub tool: String,
    pub version: String,
    /// Fixed when the result is created, never at serialize time
    pub timestamp: DateTime<Utc>,
    pub source_format: String,
    pub source_variant_count: usize,
    pub catalog_version: String,
    pub disclaimer: String,
    pub categories_included: Vec<Category>,
}

/// Tallies over the filtered catalog
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionSummary {
    pub found: usize,
    pub no_call: usize,
    pub missing: usize,
    /// Size of the filtered catalog, not of the genome file
    pub total: usize,
}

/// Immutable result of one extraction action
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionResult {
    pub metadata: ExtractionMetadata,
    pub matched: Vec<MatchedVariant>,
    pub unmatched: Vec<UnmatchedEntry>,
    pub summary: ExtractionSummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chromosome_names() {
        assert_eq!(Chromosome::from_name("1"), Some(Chromosome::Autosome(1)));
        assert_eq!(Chromosome::from_name("22"), Some(Chromosome::Autosome(22)));
        assert_eq!(Chromosome::from_name("x"), Some(Chromosome::X));
        assert_eq!(Chromosome::from_name("MT"), Some(Chromosome::MT));
        assert_eq!(Chromosome::from_name("23"), None);
        assert_eq!(Chromosome::from_name("0"), None);
        assert_eq!(Chromosome::from_name("chr1"), None);
    }

    #[test]
    fn test_chromosome_numeric_codes() {
        assert_eq!(Chromosome::from_numeric_code("23"), Some(Chromosome::X));
        assert_eq!(Chromosome::from_numeric_code("24"), Some(Chromosome::Y));
        assert_eq!(Chromosome::from_numeric_code("25"), Some(Chromosome::MT));
        assert_eq!(Chromosome::from_numeric_code("26"), Some(Chromosome::MT));
        assert_eq!(Chromosome::from_numeric_code("7"), Some(Chromosome::Autosome(7)));
        assert_eq!(Chromosome::from_numeric_code("27"), None);
    }

    #[test]
    fn test_chromosome_display() {
        assert_eq!(Chromosome::Autosome(9).to_string(), "9");
        assert_eq!(Chromosome::MT.to_string(), "MT");
    }

    #[test]
    fn test_rsid_shape() {
        assert!(is_valid_rsid("rs1801133"));
        assert!(is_valid_rsid("RS4680"));
        assert!(is_valid_rsid("i3000001"));
        assert!(!is_valid_rsid("rs"));
        assert!(!is_valid_rsid("rs12a"));
        assert!(!is_valid_rsid("snp123"));
        assert!(!is_valid_rsid(""));
    }

    #[test]
    fn test_category_round_trip_names() {
        for category in Category::ALL {
            assert_eq!(category.as_str().parse::<Category>().unwrap(), category);
        }
        assert!("vitamins".parse::<Category>().is_err());
        assert_eq!(" Methylation ".parse::<Category>().unwrap(), Category::Methylation);
    }

    #[test]
    fn test_category_filter() {
        let all = CategoryFilter::all();
        assert!(all.is_all());
        assert!(all.includes(Category::Sleep));

        let some = CategoryFilter::only([Category::Methylation]);
        assert!(some.includes(Category::Methylation));
        assert!(!some.includes(Category::Sleep));
    }

    #[test]
    fn test_status_strings() {
        assert_eq!(MatchStatus::NoCall.as_str(), "no-call");
        assert_eq!(
            serde_json::to_string(&MatchStatus::NoCall).unwrap(),
            "\"no-call\""
        );
        assert_eq!(UnmatchedReason::NotInFile.as_str(), "not-in-file");
    }
}
