// ==============================================================================
// detect.rs - Genome Export Format Detection
// ==============================================================================
// Description: Classifies raw export text into a vendor and chip version tag
// Author: Matt Barham
// Created: 2026-10-18
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================
// Only the head of the file is inspected (DETECTION_WINDOW bytes). Vendor
// signatures:
//   23andMe     - "23andMe" token, or "# rsid<TAB>...<TAB>genotype" header
//   AncestryDNA - "AncestryDNA" token, or "allele1<TAB>allele2" header
// ==============================================================================

use std::fmt;
use tracing::debug;

/// Number of leading bytes inspected for vendor signatures
pub const DETECTION_WINDOW: usize = 2048;

/// 23andMe genotyping chip generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChipVersion {
    V3,
    V4,
    V5,
}

impl ChipVersion {
    /// Used when a file is clearly 23andMe but carries no explicit marker
    pub const DEFAULT: ChipVersion = ChipVersion::V5;

    pub fn as_str(&self) -> &'static str {
        match self {
            ChipVersion::V3 => "v3",
            ChipVersion::V4 => "v4",
            ChipVersion::V5 => "v5",
        }
    }
}

/// Vendor + version classification of an export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatTag {
    TwentyThreeAndMe(ChipVersion),
    AncestryDna,
    /// Callers must treat this as an unsupported format
    Unknown,
}

impl FormatTag {
    pub fn is_known(&self) -> bool {
        !matches!(self, FormatTag::Unknown)
    }
}

impl fmt::Display for FormatTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatTag::TwentyThreeAndMe(version) => write!(f, "23andme-{}", version.as_str()),
            FormatTag::AncestryDna => f.write_str("ancestrydna"),
            FormatTag::Unknown => f.write_str("unknown"),
        }
    }
}

/// Detect the vendor format from the head of an export
pub fn detect_format(text: &str) -> FormatTag {
    let head = head_of(text, DETECTION_WINDOW);
    let lower = head.to_ascii_lowercase();

    let tag = if is_ancestry(&lower) {
        FormatTag::AncestryDna
    } else if is_23andme(&lower) {
        FormatTag::TwentyThreeAndMe(chip_version(&lower).unwrap_or(ChipVersion::DEFAULT))
    } else {
        FormatTag::Unknown
    };

    debug!("Detected genome format: {}", tag);
    tag
}

/// Longest prefix of `text` no longer than `limit` bytes that ends on a char boundary
fn head_of(text: &str, limit: usize) -> &str {
    if text.len() <= limit {
        return text;
    }
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

fn is_ancestry(lower: &str) -> bool {
    lower.contains("ancestrydna")
        || lower.lines().any(|line| {
            let columns: Vec<&str> = line.trim_start_matches('#').split('\t').map(str::trim).collect();
            columns.first() == Some(&"rsid")
                && columns.contains(&"allele1")
                && columns.contains(&"allele2")
        })
}

fn is_23andme(lower: &str) -> bool {
    lower.contains("23andme")
        || lower.lines().any(|line| {
            let columns: Vec<&str> = line.trim_start_matches('#').split('\t').map(str::trim).collect();
            columns == ["rsid", "chromosome", "position", "genotype"]
        })
}

/// Look for an explicit chip marker ("v3", "v4", "v5") on a comment line
fn chip_version(lower: &str) -> Option<ChipVersion> {
    lower
        .lines()
        .filter(|line| line.trim_start().starts_with('#'))
        .flat_map(|line| line.split(|c: char| !c.is_ascii_alphanumeric()))
        .find_map(|token| match token {
            "v3" => Some(ChipVersion::V3),
            "v4" => Some(ChipVersion::V4),
            "v5" => Some(ChipVersion::V5),
            _ => None,
        })
}
