// ==============================================================================
// parsers/mod.rs - Genome export parsers
// ==============================================================================
// Description: Format detection and vendor parsers for consumer DNA exports
// Author: Matt Barham
// Created: 2026-10-18
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================

pub mod ancestry;
pub mod detect;
pub mod genome23andme;

pub use ancestry::AncestryParser;
pub use detect::{detect_format, ChipVersion, FormatTag};
pub use genome23andme::Genome23Parser;

use regex::Regex;
use std::fmt;
use std::sync::OnceLock;
use tracing::{debug, info, warn};

use crate::models::GenomicVariant;

/// Maximum number of warnings retained per parse (all skips are still counted)
pub const MAX_RETAINED_WARNINGS: usize = 100;

/// Maximum characters of an offending line kept in a warning
const WARNING_CONTENT_CHARS: usize = 60;

/// Fatal parse failure category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// No vendor signature matched
    UnsupportedFormat,
    /// Every data line was rejected
    NoValidVariants,
}

impl ParseErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParseErrorKind::UnsupportedFormat => "unsupported-format",
            ParseErrorKind::NoValidVariants => "no-valid-variants",
        }
    }
}

/// Fatal parse error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}: {message}", kind.as_str())]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    pub line: Option<usize>,
    pub details: Option<String>,
}

impl ParseError {
    pub fn unsupported_format() -> Self {
        Self {
            kind: ParseErrorKind::UnsupportedFormat,
            message: "file is not a recognized 23andMe or AncestryDNA export".to_string(),
            line: None,
            details: None,
        }
    }

    pub fn no_valid_variants(lines_scanned: usize, skipped: usize) -> Self {
        Self {
            kind: ParseErrorKind::NoValidVariants,
            message: "no valid variant rows were found".to_string(),
            line: None,
            details: Some(format!(
                "scanned {} lines, skipped {} malformed data lines",
                lines_scanned, skipped
            )),
        }
    }
}

/// Non-fatal per-line skip
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseWarning {
    /// 1-based line number
    pub line: usize,
    /// Offending line, truncated
    pub content: String,
    pub reason: String,
}

impl ParseWarning {
    fn new(line: usize, raw: &str, reason: String) -> Self {
        let mut content: String = raw.chars().take(WARNING_CONTENT_CHARS).collect();
        if raw.chars().count() > WARNING_CONTENT_CHARS {
            content.push_str("...");
        }
        Self { line, content, reason }
    }
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {} ({})", self.line, self.reason, self.content)
    }
}

/// Metadata opportunistically recovered from comment lines
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileMetadata {
    pub generated_at: Option<String>,
    /// Normalized build name: GRCh37, GRCh38 or NCBI36
    pub reference_build: Option<String>,
    /// AncestryDNA array version (e.g. "V2.0")
    pub array_version: Option<String>,
}

/// Normalized output of a vendor parser
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedGenome {
    pub format: FormatTag,
    pub variants: Vec<GenomicVariant>,
    pub metadata: FileMetadata,
    /// First `MAX_RETAINED_WARNINGS` skipped lines
    pub warnings: Vec<ParseWarning>,
    /// Total number of skipped data lines
    pub skipped_lines: usize,
    pub total_lines: usize,
}

impl ParsedGenome {
    /// One-line user-facing summary of skipped lines, if any
    pub fn warning_summary(&self) -> Option<String> {
        let first = self.warnings.first()?;
        Some(format!(
            "Skipped {} malformed line{} (first at line {}: {})",
            self.skipped_lines,
            if self.skipped_lines == 1 { "" } else { "s" },
            first.line,
            first.reason
        ))
    }
}

/// Per-vendor data line handling
pub trait LineParser {
    /// Number of tab-separated columns in a data line
    const COLUMNS: usize;

    /// Format tag recorded on the parse result
    fn format(&self) -> FormatTag;

    /// Convert trimmed fields into a variant or a rejection reason
    fn parse_fields(&self, fields: &[&str]) -> Result<GenomicVariant, String>;

    /// Returns true for a column header line
    fn is_header(&self, line: &str) -> bool {
        line.trim_start().to_ascii_lowercase().starts_with("rsid")
    }
}

/// Parse a genome export, detecting its format first
pub fn parse_genome(text: &str) -> Result<ParsedGenome, ParseError> {
    match detect_format(text) {
        FormatTag::TwentyThreeAndMe(version) => Genome23Parser::new(version).parse_str(text),
        FormatTag::AncestryDna => AncestryParser::new().parse_str(text),
        FormatTag::Unknown => {
            warn!("Unsupported genome file format");
            Err(ParseError::unsupported_format())
        }
    }
}

/// Shared line scanner used by every vendor parser
pub(crate) fn scan_lines<P: LineParser>(parser: &P, text: &str) -> Result<ParsedGenome, ParseError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut variants = Vec::new();
    let mut warnings = Vec::new();
    let mut metadata = FileMetadata::default();
    let mut skipped_lines = 0;
    let mut header_seen = false;
    let total_lines = text.split('\n').count() - usize::from(text.ends_with('\n'));

    for (index, raw) in text.split('\n').enumerate() {
        let line_number = index + 1;
        let line = raw.strip_suffix('\r').unwrap_or(raw);
        let trimmed = line.trim();

        if trimmed.is_empty() {
            continue;
        }

        if let Some(comment) = trimmed.strip_prefix('#') {
            scan_comment(comment, &mut metadata);
            continue;
        }

        if !header_seen && parser.is_header(trimmed) {
            header_seen = true;
            continue;
        }

        let fields: Vec<&str> = line.split('\t').map(str::trim).collect();
        let outcome = if fields.len() != P::COLUMNS {
            Err(format!(
                "expected {} tab-delimited fields, found {}",
                P::COLUMNS,
                fields.len()
            ))
        } else {
            parser.parse_fields(&fields)
        };

        match outcome {
            Ok(variant) => variants.push(variant),
            Err(reason) => {
                skipped_lines += 1;
                if warnings.len() < MAX_RETAINED_WARNINGS {
                    warnings.push(ParseWarning::new(line_number, line, reason));
                }
            }
        }
    }

    if variants.is_empty() {
        warn!(
            "No valid variants recovered from {} lines ({} skipped)",
            total_lines, skipped_lines
        );
        return Err(ParseError::no_valid_variants(total_lines, skipped_lines));
    }

    if skipped_lines > 0 {
        warn!("Skipped {} malformed data lines", skipped_lines);
    }
    info!(
        "Parsed {} variants from {} export",
        variants.len(),
        parser.format()
    );
    debug!("File metadata: {:?}", metadata);

    Ok(ParsedGenome {
        format: parser.format(),
        variants,
        metadata,
        warnings,
        skipped_lines,
        total_lines,
    })
}

macro_rules! metadata_pattern {
    ($name:ident, $regex_str:expr) => {
        fn $name() -> Option<&'static Regex> {
            static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
            PATTERN.get_or_init(|| Regex::new($regex_str).ok()).as_ref()
        }
    };
}

metadata_pattern!(
    generated_at_pattern,
    r"(?i)generated\b[^:]*?\b(?:at|on)\s*:?\s*(.+?)\s*$"
);
metadata_pattern!(build_pattern, r"(?i)\b(?:build|grch|ncbi|hg)\s*(\d{2})");
metadata_pattern!(array_version_pattern, r"(?i)array version\s*[:=]?\s*(\S+)");

/// Normalize a build number or UCSC alias to an assembly name
fn normalize_build(number: &str) -> Option<&'static str> {
    match number {
        "36" | "18" => Some("NCBI36"),
        "37" | "19" => Some("GRCh37"),
        "38" => Some("GRCh38"),
        _ => None,
    }
}

fn scan_comment(comment: &str, metadata: &mut FileMetadata) {
    if metadata.generated_at.is_none() {
        if let Some(caps) = generated_at_pattern().and_then(|re| re.captures(comment)) {
            metadata.generated_at = Some(caps[1].to_string());
        }
    }

    if metadata.reference_build.is_none() {
        if let Some(build) = build_pattern()
            .and_then(|re| re.captures(comment))
            .and_then(|caps| normalize_build(&caps[1]))
        {
            metadata.reference_build = Some(build.to_string());
        }
    }

    if metadata.array_version.is_none() {
        if let Some(caps) = array_version_pattern().and_then(|re| re.captures(comment)) {
            metadata.array_version = Some(caps[1].to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Chromosome;

    #[test]
    fn test_metadata_patterns_compile() {
        assert!(generated_at_pattern().is_some());
        assert!(build_pattern().is_some());
        assert!(array_version_pattern().is_some());
    }

    #[test]
    fn test_parse_genome_dispatches_to_23andme() {
        let text = "# This data file generated by 23andMe at: Mon Jan 01 12:00:00 2024\n\
# rsid\tchromosome\tposition\tgenotype\n\
rs4680\t22\t19951271\tAG\n";
        let parsed = parse_genome(text).unwrap();
        assert_eq!(parsed.format, FormatTag::TwentyThreeAndMe(ChipVersion::V5));
        assert_eq!(parsed.variants.len(), 1);
        assert_eq!(
            parsed.metadata.generated_at.as_deref(),
            Some("Mon Jan 01 12:00:00 2024")
        );
    }

    #[test]
    fn test_parse_genome_dispatches_to_ancestry() {
        let text = "#AncestryDNA raw data download\n\
rsid\tchromosome\tposition\tallele1\tallele2\n\
rs4680\t22\t19951271\tA\tG\n\
rs1\t23\t100\tA\tA\n";
        let parsed = parse_genome(text).unwrap();
        assert_eq!(parsed.format, FormatTag::AncestryDna);
        assert_eq!(parsed.variants[1].chromosome, Chromosome::X);
    }

    #[test]
    fn test_unknown_format_is_fatal() {
        let err = parse_genome("chrom,pos,ref,alt\n1,100,A,G\n").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnsupportedFormat);
    }

    #[test]
    fn test_crlf_and_blank_lines() {
        let text = "# generated by 23andMe\r\n\r\nrs1\t1\t100\tAA\r\n\r\nrs2\t2\t200\tCT\r\n";
        let parsed = parse_genome(text).unwrap();
        assert_eq!(parsed.variants.len(), 2);
        assert_eq!(parsed.variants[1].genotype, "CT");
        assert_eq!(parsed.skipped_lines, 0);
    }

    #[test]
    fn test_metadata_extraction() {
        let text = "# This data file generated by 23andMe at: Tue Mar 05 08:00:00 2024\n\
# We are using reference human assembly build 37 (also known as Annotation Release 104).\n\
rs1\t1\t100\tAA\n";
        let parsed = parse_genome(text).unwrap();
        assert_eq!(parsed.metadata.reference_build.as_deref(), Some("GRCh37"));
        assert!(parsed.metadata.generated_at.is_some());
        assert!(parsed.metadata.array_version.is_none());
    }

    #[test]
    fn test_warning_summary_and_truncation() {
        let long_line = format!("rs1\t1\t{}", "9".repeat(120));
        let text = format!("# 23andMe\n{}\nrs2\t1\t200\tAG\n", long_line);
        let parsed = parse_genome(&text).unwrap();

        assert_eq!(parsed.skipped_lines, 1);
        assert_eq!(parsed.warnings[0].line, 2);
        assert!(parsed.warnings[0].content.ends_with("..."));
        assert!(parsed.warnings[0].content.len() <= WARNING_CONTENT_CHARS + 3);

        let summary = parsed.warning_summary().unwrap();
        assert!(summary.starts_with("Skipped 1 malformed line "));
    }

    #[test]
    fn test_warning_retention_is_capped() {
        let mut text = String::from("# 23andMe\n");
        for i in 0..(MAX_RETAINED_WARNINGS + 25) {
            text.push_str(&format!("bad line {}\n", i));
        }
        text.push_str("rs1\t1\t100\tAA\n");

        let parsed = parse_genome(&text).unwrap();
        assert_eq!(parsed.warnings.len(), MAX_RETAINED_WARNINGS);
        assert_eq!(parsed.skipped_lines, MAX_RETAINED_WARNINGS + 25);
    }

    #[test]
    fn test_zero_variants_is_fatal() {
        let err = parse_genome("# 23andMe\nnot\ta\tvariant\tline\n").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::NoValidVariants);
        assert!(err.details.unwrap().contains("skipped 1"));
    }

    #[test]
    fn test_bom_is_ignored() {
        let text = "\u{feff}# 23andMe\nrs1\t1\t100\tAA\n";
        assert_eq!(parse_genome(text).unwrap().variants.len(), 1);
    }
}
