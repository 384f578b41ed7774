// ==============================================================================
// extraction.rs - SNP Extraction Engine
// ==============================================================================
// Description: Reconciles reference catalog entries against parsed genome rows
// Author: Matt Barham
// Created: 2026-10-18
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================
// Duplicate policy: when an rsid occurs more than once in the genome file the
// LAST occurrence is indexed (later rows overwrite earlier ones).
// ==============================================================================

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

use crate::models::{
    Category, CategoryFilter, ExtractionMetadata, ExtractionResult, ExtractionSummary,
    GenomicVariant, MatchStatus, MatchedVariant, ReferenceCatalog, ReferenceEntry,
    UnmatchedEntry, UnmatchedReason, DISCLAIMER, NO_CALL, TOOL_NAME, TOOL_VERSION,
};
use crate::parsers::ParsedGenome;

/// Per-category preview tallies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CategoryEstimate {
    pub total: usize,
    pub found: usize,
    pub no_call: usize,
}

/// Aggregate match counts without the full matched/unmatched lists
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionEstimate {
    pub per_category: BTreeMap<Category, CategoryEstimate>,
    pub summary: ExtractionSummary,
}

/// Lookup index over one parsed genome
#[derive(Debug, Clone)]
pub struct ExtractionEngine {
    index: HashMap<String, String>,
    source_format: String,
    source_variant_count: usize,
}

enum Lookup<'a> {
    Found(&'a str),
    NoCall(&'a str),
    Missing,
}

impl ExtractionEngine {
    /// Build the rsid index for a parsed genome (last occurrence wins)
    pub fn new(genome: &ParsedGenome) -> Self {
        Self::from_variants(&genome.variants, genome.format.to_string())
    }

    pub fn from_variants(variants: &[GenomicVariant], source_format: impl Into<String>) -> Self {
        let mut index = HashMap::with_capacity(variants.len());
        for variant in variants {
            index.insert(variant.rsid.to_ascii_lowercase(), variant.genotype.clone());
        }

        debug!(
            "Indexed {} unique rsids from {} rows",
            index.len(),
            variants.len()
        );

        Self {
            index,
            source_format: source_format.into(),
            source_variant_count: variants.len(),
        }
    }

    /// Number of distinct rsids in the index
    pub fn indexed_rsids(&self) -> usize {
        self.index.len()
    }

    /// Genotype recorded for an rsid, case-insensitively
    pub fn genotype(&self, rsid: &str) -> Option<&str> {
        self.index.get(&rsid.to_ascii_lowercase()).map(String::as_str)
    }

    fn lookup(&self, entry: &ReferenceEntry) -> Lookup<'_> {
        match self.genotype(&entry.rsid) {
            None => Lookup::Missing,
            Some(genotype) if genotype == NO_CALL => Lookup::NoCall(genotype),
            Some(genotype) => Lookup::Found(genotype),
        }
    }

    /// Extract the filtered catalog, stamping the result with the current time
    pub fn extract(&self, catalog: &ReferenceCatalog, filter: &CategoryFilter) -> ExtractionResult {
        self.extract_at(catalog, filter, Utc::now())
    }

    /// Extract the filtered catalog with an explicit timestamp
    pub fn extract_at(
        &self,
        catalog: &ReferenceCatalog,
        filter: &CategoryFilter,
        timestamp: DateTime<Utc>,
    ) -> ExtractionResult {
        let mut matched = Vec::new();
        let mut unmatched = Vec::new();
        let mut summary = ExtractionSummary::default();

        for entry in catalog.entries.iter().filter(|e| filter.includes(e.category)) {
            summary.total += 1;
            match self.lookup(entry) {
                Lookup::Missing => {
                    summary.missing += 1;
                    unmatched.push(UnmatchedEntry {
                        rsid: entry.rsid.clone(),
                        gene: entry.gene.clone(),
                        category: entry.category,
                        reason: UnmatchedReason::NotInFile,
                    });
                }
                Lookup::NoCall(genotype) => {
                    summary.no_call += 1;
                    matched.push(matched_variant(entry, genotype, MatchStatus::NoCall));
                }
                Lookup::Found(genotype) => {
                    summary.found += 1;
                    matched.push(matched_variant(entry, genotype, MatchStatus::Found));
                }
            }
        }

        let categories_included = if filter.is_all() {
            catalog.categories()
        } else {
            Category::ALL
                .iter()
                .copied()
                .filter(|c| filter.includes(*c))
                .collect()
        };

        info!(
            "Extraction complete: {} found, {} no-call, {} missing of {}",
            summary.found, summary.no_call, summary.missing, summary.total
        );

        ExtractionResult {
            metadata: ExtractionMetadata {
                tool: TOOL_NAME.to_string(),
                version: TOOL_VERSION.to_string(),
                timestamp,
                source_format: self.source_format.clone(),
                source_variant_count: self.source_variant_count,
                catalog_version: catalog.version.clone(),
                disclaimer: DISCLAIMER.to_string(),
                categories_included,
            },
            matched,
            unmatched,
            summary,
        }
    }

    /// Aggregate counts for live previews, reusing the existing index
    pub fn estimate(&self, catalog: &ReferenceCatalog, filter: &CategoryFilter) -> ExtractionEstimate {
        let mut estimate = ExtractionEstimate::default();

        for entry in catalog.entries.iter().filter(|e| filter.includes(e.category)) {
            let bucket = estimate.per_category.entry(entry.category).or_default();
            bucket.total += 1;
            estimate.summary.total += 1;

            match self.lookup(entry) {
                Lookup::Found(_) => {
                    bucket.found += 1;
                    estimate.summary.found += 1;
                }
                Lookup::NoCall(_) => {
                    bucket.no_call += 1;
                    estimate.summary.no_call += 1;
                }
                Lookup::Missing => estimate.summary.missing += 1,
            }
        }

        estimate
    }
}

fn matched_variant(entry: &ReferenceEntry, genotype: &str, status: MatchStatus) -> MatchedVariant {
    MatchedVariant {
        entry: entry.clone(),
        genotype: genotype.to_string(),
        status,
    }
}
