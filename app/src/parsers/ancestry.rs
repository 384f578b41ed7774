// ==============================================================================
// ancestry.rs - AncestryDNA Raw Data Parser
// ==============================================================================
// Description: Parser for AncestryDNA raw genome data files
// Author: Matt Barham
// Created: 2026-10-18
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================
// Format: Tab-delimited text, comment preamble, then a column header line
// Example:
//   rsid    chromosome    position    allele1    allele2
//   rs3131972    1    752721    A    G
//   rs114525117    23    759036    0    0
// Chromosome codes: 23 = X, 24 = Y, 25 = MT (PAR), 26 = MT
// No-call allele: "0" or "-" on either side collapses to "--"
// ==============================================================================

use super::genome23andme::parse_position;
use super::{scan_lines, FormatTag, LineParser, ParseError, ParsedGenome};
use crate::models::{is_valid_rsid, Chromosome, GenomicVariant, NO_CALL};

/// Parser for AncestryDNA raw genome files
#[derive(Debug, Clone, Default)]
pub struct AncestryParser;

impl AncestryParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse AncestryDNA export text
    pub fn parse_str(&self, text: &str) -> Result<ParsedGenome, ParseError> {
        scan_lines(self, text)
    }
}

impl LineParser for AncestryParser {
    const COLUMNS: usize = 5;

    fn format(&self) -> FormatTag {
        FormatTag::AncestryDna
    }

    fn parse_fields(&self, fields: &[&str]) -> Result<GenomicVariant, String> {
        let rsid = fields[0];
        if !is_valid_rsid(rsid) {
            return Err(format!("invalid rsid '{}'", rsid));
        }

        let chromosome = Chromosome::from_numeric_code(fields[1])
            .ok_or_else(|| format!("invalid chromosome '{}'", fields[1]))?;

        let position = parse_position(fields[2])?;
        let genotype = combine_alleles(fields[3], fields[4])?;

        Ok(GenomicVariant {
            rsid: rsid.to_ascii_lowercase(),
            chromosome,
            position,
            genotype,
        })
    }
}

enum Allele {
    Base(char),
    NoCall,
}

fn parse_allele(value: &str) -> Result<Allele, String> {
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some('0' | '-'), None) => Ok(Allele::NoCall),
        (Some(c), None) if matches!(c.to_ascii_uppercase(), 'A' | 'C' | 'G' | 'T' | 'D' | 'I') => {
            Ok(Allele::Base(c.to_ascii_uppercase()))
        }
        _ => Err(format!("invalid allele '{}'", value)),
    }
}

/// Join two allele columns in file order; any no-call side yields "--"
fn combine_alleles(first: &str, second: &str) -> Result<String, String> {
    match (parse_allele(first)?, parse_allele(second)?) {
        (Allele::Base(a), Allele::Base(b)) => Ok([a, b].iter().collect()),
        _ => Ok(NO_CALL.to_string()),
    }
}
