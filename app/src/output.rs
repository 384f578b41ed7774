// ==============================================================================
// output.rs - Multi-Format Report Generation
// ==============================================================================
// Description: Render extraction results as detailed, compact or minimal text
// Author: Matt Barham
// Created: 2025-11-06
// Modified: 2026-10-18
// Version: 2.0.0
// ==============================================================================
// All formats are deterministic: the only time-varying field (the extraction
// timestamp) is fixed on the ExtractionResult, and variants are emitted in the
// filtered catalog's order.
// ==============================================================================

use chrono::{NaiveDate, SecondsFormat};
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::str::FromStr;
use thiserror::Error;

use crate::models::{ExtractionResult, MatchStatus, SHORT_DISCLAIMER};

/// Supported report formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Full metadata, summary and annotations (YAML)
    Detailed,
    /// Shortened metadata, rsid/gene/genotype only (YAML)
    Compact,
    /// Comment header plus CSV rows
    Minimal,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 3] = [
        OutputFormat::Detailed,
        OutputFormat::Compact,
        OutputFormat::Minimal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Detailed => "detailed",
            OutputFormat::Compact => "compact",
            OutputFormat::Minimal => "minimal",
        }
    }

    /// Get file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Detailed | OutputFormat::Compact => "yaml",
            OutputFormat::Minimal => "csv",
        }
    }

    /// Get MIME type for downloads
    pub fn mime_type(&self) -> &'static str {
        match self {
            OutputFormat::Detailed | OutputFormat::Compact => "application/yaml",
            OutputFormat::Minimal => "text/csv",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "detailed" => Ok(OutputFormat::Detailed),
            "compact" => Ok(OutputFormat::Compact),
            "minimal" => Ok(OutputFormat::Minimal),
            other => Err(format!("unknown output format '{}'", other)),
        }
    }
}

/// Errors that can occur while rendering a report
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Formatting error: {0}")]
    Fmt(#[from] std::fmt::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("CSV buffer error: {0}")]
    CsvBuffer(String),

    #[error("Output is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Size of a rendered report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputStats {
    pub bytes: usize,
    pub size_label: String,
    /// Rough language-model token count (4 bytes per token)
    pub approx_tokens: usize,
}

impl OutputStats {
    pub fn of(rendered: &str) -> Self {
        let bytes = rendered.len();
        Self {
            bytes,
            size_label: format_size(bytes as u64),
            approx_tokens: bytes.div_ceil(4),
        }
    }
}

/// Render a result in the requested format
pub fn serialize(result: &ExtractionResult, format: OutputFormat) -> Result<String, OutputError> {
    match format {
        OutputFormat::Detailed => render_detailed(result),
        OutputFormat::Compact => render_compact(result),
        OutputFormat::Minimal => render_minimal(result),
    }
}

/// Human-readable size: bytes below 1 KiB, one-decimal KB below 1 MiB, else MB
pub fn format_size(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * 1024;

    if bytes < KIB {
        format!("{} B", bytes)
    } else if bytes < MIB {
        format!("{:.1} KB", bytes as f64 / KIB as f64)
    } else {
        format!("{:.1} MB", bytes as f64 / MIB as f64)
    }
}

/// Download filename: genome-snps-<format>-<YYYY-MM-DD>.<ext>
pub fn output_filename(format: OutputFormat, date: NaiveDate) -> String {
    format!(
        "genome-snps-{}-{}.{}",
        format.as_str(),
        date.format("%Y-%m-%d"),
        format.extension()
    )
}

fn render_detailed(result: &ExtractionResult) -> Result<String, OutputError> {
    let meta = &result.metadata;
    let mut out = String::new();

    writeln!(out, "# Genome SNP extraction report")?;
    writeln!(out, "metadata:")?;
    writeln!(out, "  tool: {}", scalar(&meta.tool))?;
    writeln!(out, "  version: {}", scalar(&meta.version))?;
    writeln!(
        out,
        "  extraction_date: {}",
        scalar(&meta.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true))
    )?;
    writeln!(out, "  source_format: {}", scalar(&meta.source_format))?;
    writeln!(out, "  source_variant_count: {}", meta.source_variant_count)?;
    writeln!(out, "  snp_list_version: {}", scalar(&meta.catalog_version))?;
    let categories: Vec<&str> = meta.categories_included.iter().map(|c| c.as_str()).collect();
    writeln!(out, "  categories: [{}]", categories.join(", "))?;
    writeln!(out, "  disclaimer: {}", scalar(&meta.disclaimer))?;
    write_summary(&mut out, result)?;

    if result.matched.is_empty() {
        writeln!(out, "variants: []")?;
    } else {
        writeln!(out, "variants:")?;
        for variant in &result.matched {
            writeln!(out, "  - rsid: {}", scalar(&variant.entry.rsid))?;
            writeln!(out, "    gene: {}", scalar(&variant.entry.gene))?;
            writeln!(out, "    genotype: {}", scalar(&variant.genotype))?;
            writeln!(out, "    category: {}", variant.entry.category)?;
            writeln!(out, "    annotation: {}", scalar(&variant.entry.annotation))?;
            if variant.status == MatchStatus::NoCall {
                writeln!(out, "    status: {}", variant.status.as_str())?;
            }
        }
    }

    if !result.unmatched.is_empty() {
        writeln!(out, "missing_variants:")?;
        for missing in &result.unmatched {
            writeln!(out, "  - rsid: {}", scalar(&missing.rsid))?;
            writeln!(out, "    gene: {}", scalar(&missing.gene))?;
            writeln!(out, "    category: {}", missing.category)?;
            writeln!(out, "    reason: {}", missing.reason.as_str())?;
        }
    }

    Ok(out)
}

fn render_compact(result: &ExtractionResult) -> Result<String, OutputError> {
    let meta = &result.metadata;
    let mut out = String::new();

    writeln!(out, "metadata:")?;
    writeln!(out, "  tool: {}", scalar(&meta.tool))?;
    writeln!(out, "  version: {}", scalar(&meta.version))?;
    writeln!(out, "  extraction_date: {}", meta.timestamp.format("%Y-%m-%d"))?;
    writeln!(out, "  source_format: {}", scalar(&meta.source_format))?;
    writeln!(out, "  source_variant_count: {}", meta.source_variant_count)?;
    writeln!(out, "  snp_list_version: {}", scalar(&meta.catalog_version))?;
    writeln!(out, "  disclaimer: {}", scalar(SHORT_DISCLAIMER))?;
    write_summary(&mut out, result)?;

    if result.matched.is_empty() {
        writeln!(out, "variants: []")?;
    } else {
        writeln!(out, "variants:")?;
        for variant in &result.matched {
            writeln!(
                out,
                "  - {{rsid: {}, gene: {}, genotype: {}}}",
                scalar(&variant.entry.rsid),
                scalar(&variant.entry.gene),
                scalar(&variant.genotype)
            )?;
        }
    }

    if !result.unmatched.is_empty() {
        let rsids: Vec<String> = result.unmatched.iter().map(|m| scalar(&m.rsid)).collect();
        writeln!(out, "missing_variants: [{}]", rsids.join(", "))?;
    }

    Ok(out)
}

fn render_minimal(result: &ExtractionResult) -> Result<String, OutputError> {
    let meta = &result.metadata;
    let mut out = String::new();

    writeln!(
        out,
        "# {} v{} | {} | {}",
        meta.tool,
        meta.version,
        meta.timestamp.format("%Y-%m-%d"),
        SHORT_DISCLAIMER
    )?;
    writeln!(out, "# rsid,gene,genotype")?;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    for variant in &result.matched {
        writer.write_record([
            variant.entry.rsid.as_str(),
            variant.entry.gene.as_str(),
            variant.genotype.as_str(),
        ])?;
    }
    let rows = writer
        .into_inner()
        .map_err(|e| OutputError::CsvBuffer(e.to_string()))?;
    out.push_str(&String::from_utf8(rows)?);

    if !result.unmatched.is_empty() {
        let rsids: Vec<&str> = result.unmatched.iter().map(|m| m.rsid.as_str()).collect();
        writeln!(out, "# missing: {}", rsids.join(","))?;
    }

    Ok(out)
}

fn write_summary(out: &mut String, result: &ExtractionResult) -> std::fmt::Result {
    let summary = &result.summary;
    writeln!(out, "summary:")?;
    writeln!(out, "  variants_found: {}", summary.found)?;
    writeln!(out, "  variants_no_call: {}", summary.no_call)?;
    writeln!(out, "  variants_missing: {}", summary.missing)?;
    writeln!(out, "  total_in_snp_list: {}", summary.total)
}

/// YAML scalar: plain when unambiguous, double-quoted otherwise
/// Plain scalars a YAML 1.1 reader would load as bool, null or number
fn resolves_to_non_string(value: &str) -> bool {
    const WORDS: &[&str] = &["y", "yes", "n", "no", "true", "false", "on", "off", "null"];
    if WORDS.iter().any(|word| value.eq_ignore_ascii_case(word)) {
        return true;
    }

    let compact: String = value.chars().filter(|&c| c != '_').collect();
    let radix = [("0x", 16), ("0o", 8), ("0b", 2)]
        .iter()
        .find_map(|(prefix, radix)| compact.strip_prefix(prefix).map(|digits| (digits, *radix)));
    if let Some((digits, radix)) = radix {
        if !digits.is_empty() && digits.chars().all(|c| c.is_digit(radix)) {
            return true;
        }
    }

    compact.parse::<f64>().is_ok()
}

fn scalar(value: &str) -> String {
    let plain = value
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphanumeric())
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '/' | '+'));

    if plain && !resolves_to_non_string(value) {
        return value.to_string();
    }

    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(quoted, "\\x{:02x}", c as u32);
            }
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        Category, ExtractionMetadata, ExtractionSummary, MatchedVariant, ReferenceEntry,
        UnmatchedEntry, UnmatchedReason, DISCLAIMER,
    };
    use chrono::{TimeZone, Utc};

    fn entry(rsid: &str, gene: &str, category: Category, annotation: &str) -> ReferenceEntry {
        ReferenceEntry {
            rsid: rsid.to_string(),
            gene: gene.to_string(),
            category,
            annotation: annotation.to_string(),
            sources: vec![],
            risk_allele: None,
            chromosome: None,
            position: None,
        }
    }

    fn sample_result() -> ExtractionResult {
        ExtractionResult {
            metadata: ExtractionMetadata {
                tool: "snp-extractor".to_string(),
                version: "1.0.0".to_string(),
                timestamp: Utc.with_ymd_and_hms(2026, 10, 18, 9, 30, 0).unwrap(),
                source_format: "23andme-v5".to_string(),
                source_variant_count: 5,
                catalog_version: "test-1".to_string(),
                disclaimer: DISCLAIMER.to_string(),
                categories_included: vec![Category::Methylation, Category::Other],
            },
            matched: vec![
                MatchedVariant {
                    entry: entry("rs1801133", "MTHFR", Category::Methylation, "C677T; reduced \"activity\""),
                    genotype: "CT".to_string(),
                    status: MatchStatus::Found,
                },
                MatchedVariant {
                    entry: entry("rs999999", "TEST", Category::Other, "test entry"),
                    genotype: "--".to_string(),
                    status: MatchStatus::NoCall,
                },
            ],
            unmatched: vec![UnmatchedEntry {
                rsid: "rs777777".to_string(),
                gene: "MISSING".to_string(),
                category: Category::Other,
                reason: UnmatchedReason::NotInFile,
            }],
            summary: ExtractionSummary { found: 1, no_call: 1, missing: 1, total: 3 },
        }
    }

    #[test]
    fn test_output_format_extension() {
        assert_eq!(OutputFormat::Detailed.extension(), "yaml");
        assert_eq!(OutputFormat::Compact.extension(), "yaml");
        assert_eq!(OutputFormat::Minimal.extension(), "csv");
        assert_eq!(OutputFormat::Minimal.mime_type(), "text/csv");
    }

    #[test]
    fn test_output_format_parse_and_serde() {
        assert_eq!("Compact".parse::<OutputFormat>().unwrap(), OutputFormat::Compact);
        assert!("parquet".parse::<OutputFormat>().is_err());
        assert_eq!(
            serde_json::to_string(&OutputFormat::Minimal).unwrap(),
            "\"minimal\""
        );
    }

    #[test]
    fn test_detailed_layout() {
        let text = serialize(&sample_result(), OutputFormat::Detailed).unwrap();

        assert!(text.contains("  tool: snp-extractor\n"));
        assert!(text.contains("  extraction_date: \"2026-10-18T09:30:00Z\"\n"));
        assert!(text.contains("  snp_list_version: test-1\n"));
        assert!(text.contains("  categories: [methylation, other]\n"));
        assert!(text.contains("  variants_found: 1\n"));
        assert!(text.contains("  total_in_snp_list: 3\n"));
        assert!(text.contains("    annotation: \"C677T; reduced \\\"activity\\\"\"\n"));
        assert!(text.contains("    genotype: \"--\"\n    category: other\n    annotation: \"test entry\"\n    status: no-call\n"));
        assert!(text.contains("missing_variants:\n  - rsid: rs777777\n"));
        assert!(text.contains("    reason: not-in-file\n"));
        // Found variants carry no status line
        assert_eq!(text.matches("status:").count(), 1);
    }

    #[test]
    fn test_detailed_omits_empty_missing_section() {
        let mut result = sample_result();
        result.unmatched.clear();
        let text = serialize(&result, OutputFormat::Detailed).unwrap();
        assert!(!text.contains("missing_variants"));
    }

    #[test]
    fn test_compact_layout() {
        let text = serialize(&sample_result(), OutputFormat::Compact).unwrap();

        assert!(text.contains("  extraction_date: 2026-10-18\n"));
        assert!(text.contains("  disclaimer: \"Not medical advice.\"\n"));
        assert!(text.contains("  - {rsid: rs1801133, gene: MTHFR, genotype: CT}\n"));
        assert!(text.contains("  - {rsid: rs999999, gene: TEST, genotype: \"--\"}\n"));
        assert!(text.ends_with("missing_variants: [rs777777]\n"));
        assert!(!text.contains("annotation"));
    }

    #[test]
    fn test_minimal_layout() {
        let text = serialize(&sample_result(), OutputFormat::Minimal).unwrap();
        assert_eq!(
            text,
            "# snp-extractor v1.0.0 | 2026-10-18 | Not medical advice.\n\
# rsid,gene,genotype\n\
rs1801133,MTHFR,CT\n\
rs999999,TEST,--\n\
# missing: rs777777\n"
        );
    }

    #[test]
    fn test_minimal_quotes_commas() {
        let mut result = sample_result();
        result.matched[0].entry.gene = "HLA-A,B".to_string();
        result.unmatched.clear();
        let text = serialize(&result, OutputFormat::Minimal).unwrap();
        assert!(text.contains("rs1801133,\"HLA-A,B\",CT\n"));
        assert!(!text.contains("# missing"));
    }

    #[test]
    fn test_deterministic_output() {
        let result = sample_result();
        for format in OutputFormat::ALL {
            assert_eq!(
                serialize(&result, format).unwrap(),
                serialize(&result, format).unwrap()
            );
        }
    }

    #[test]
    fn test_format_sizes_are_ordered() {
        let result = sample_result();
        let minimal = serialize(&result, OutputFormat::Minimal).unwrap().len();
        let compact = serialize(&result, OutputFormat::Compact).unwrap().len();
        let detailed = serialize(&result, OutputFormat::Detailed).unwrap().len();
        assert!(minimal < compact);
        assert!(compact < detailed);
    }

    #[test]
    fn test_empty_result() {
        let mut result = sample_result();
        result.matched.clear();
        let text = serialize(&result, OutputFormat::Compact).unwrap();
        assert!(text.contains("variants: []\n"));
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1024), "1.0 KB");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(1024 * 1024 - 1), "1024.0 KB");
        assert_eq!(format_size(1024 * 1024), "1.0 MB");
        assert_eq!(format_size(5 * 1024 * 1024 + 512 * 1024), "5.5 MB");
    }

    #[test]
    fn test_output_stats() {
        let stats = OutputStats::of("abcde");
        assert_eq!(stats.bytes, 5);
        assert_eq!(stats.size_label, "5 B");
        assert_eq!(stats.approx_tokens, 2);
    }

    #[test]
    fn test_output_filename() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 7).unwrap();
        assert_eq!(
            output_filename(OutputFormat::Minimal, date),
            "genome-snps-minimal-2026-03-07.csv"
        );
        assert_eq!(
            output_filename(OutputFormat::Detailed, date),
            "genome-snps-detailed-2026-03-07.yaml"
        );
    }

    #[test]
    fn test_scalar_quoting() {
        assert_eq!(scalar("rs4680"), "rs4680");
        assert_eq!(scalar("1.0.0"), "1.0.0");
        assert_eq!(scalar("--"), "\"--\"");
        assert_eq!(scalar(""), "\"\"");
        assert_eq!(scalar("a: b"), "\"a: b\"");
        assert_eq!(scalar("line\nbreak"), "\"line\\nbreak\"");

        assert_eq!(scalar("1.0"), "\"1.0\"");
        assert_eq!(scalar("123"), "\"123\"");
        assert_eq!(scalar("1e5"), "\"1e5\"");
        assert_eq!(scalar("0x1F"), "\"0x1F\"");
        assert_eq!(scalar("1_000"), "\"1_000\"");
        assert_eq!(scalar("null"), "\"null\"");
        assert_eq!(scalar("True"), "\"True\"");
        assert_eq!(scalar("yes"), "\"yes\"");
        assert_eq!(scalar("NO"), "\"NO\"");
        assert_eq!(scalar("off"), "\"off\"");
        assert_eq!(scalar("AG"), "AG");
        assert_eq!(scalar("2026.10-free"), "2026.10-free");
    }
}
