// ==============================================================================
// genome23andme.rs - 23andMe Raw Data Parser
// ==============================================================================
// Description: Parser for 23andMe raw genome data files
// Author: Matt Barham
// Created: 2025-11-04
// Modified: 2026-10-18
// Version: 2.0.0
// ==============================================================================
// Format: Tab-delimited text with header comments
// Example:
//   # rsid    chromosome    position    genotype
//   rs548049170    1    69869    TT
//   rs13328684    1    74792    --
//   i3000001    MT    3000    A
// ==============================================================================

use super::{scan_lines, ChipVersion, FormatTag, LineParser, ParseError, ParsedGenome};
use crate::models::{is_valid_rsid, Chromosome, GenomicVariant, NO_CALL};

/// Parser for 23andMe raw genome files
#[derive(Debug, Clone)]
pub struct Genome23Parser {
    /// Chip generation reported on the parse result
    pub version: ChipVersion,
}

impl Default for Genome23Parser {
    fn default() -> Self {
        Self::new(ChipVersion::DEFAULT)
    }
}

impl Genome23Parser {
    pub fn new(version: ChipVersion) -> Self {
        Self { version }
    }

    /// Parse 23andMe export text
    ///
    /// The file is tab-delimited with 4 columns:
    /// - rsid: SNP identifier ("rs" or internal "i" prefix)
    /// - chromosome: "1"-"22", "X", "Y" or "MT"
    /// - position: Base pair position
    /// - genotype: Two-letter genotype, single letter for haploid calls, or "--"
    ///
    /// Malformed lines are skipped and recorded as warnings.
    pub fn parse_str(&self, text: &str) -> Result<ParsedGenome, ParseError> {
        scan_lines(self, text)
    }
}

impl LineParser for Genome23Parser {
    const COLUMNS: usize = 4;

    fn format(&self) -> FormatTag {
        FormatTag::TwentyThreeAndMe(self.version)
    }

    fn parse_fields(&self, fields: &[&str]) -> Result<GenomicVariant, String> {
        let rsid = fields[0];
        if !is_valid_rsid(rsid) {
            return Err(format!("invalid rsid '{}'", rsid));
        }

        let chromosome = Chromosome::from_name(fields[1])
            .ok_or_else(|| format!("invalid chromosome '{}'", fields[1]))?;

        let position = parse_position(fields[2])?;
        let genotype = normalize_genotype(fields[3])?;

        Ok(GenomicVariant {
            rsid: rsid.to_ascii_lowercase(),
            chromosome,
            position,
            genotype,
        })
    }
}

/// Parse a strictly positive base pair position
pub(crate) fn parse_position(value: &str) -> Result<u64, String> {
    match value.parse::<u64>() {
        Ok(position) if position > 0 => Ok(position),
        _ => Err(format!("invalid position '{}'", value)),
    }
}

/// Uppercase a genotype field, passing the no-call sentinel through
fn normalize_genotype(value: &str) -> Result<String, String> {
    if value == NO_CALL || value == "-" {
        return Ok(NO_CALL.to_string());
    }

    let upper = value.to_ascii_uppercase();
    let valid = (1..=2).contains(&upper.len())
        && upper.bytes().all(|b| matches!(b, b'A' | b'C' | b'G' | b'T' | b'D' | b'I'));

    if valid {
        Ok(upper)
    } else {
        Err(format!("invalid genotype '{}'", value))
    }
}
