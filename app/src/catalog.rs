// ==============================================================================
// catalog.rs - Reference SNP Catalog Loader
// ==============================================================================
// Description: Loads and schema-validates free and premium SNP catalogs
// Author: Matt Barham
// Created: 2026-10-18
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================
// Schema:
//   { version: string, generatedAt: RFC 3339 string, count: integer,
//     variants: [{ rsid, gene, category, annotation, sources[],
//                  riskAllele?, chromosome?, position? }] }
// A count/length mismatch and duplicate rsids are warnings; everything else
// is a fatal CatalogValidationError.
// ==============================================================================

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

use crate::models::{is_valid_rsid, Category, ReferenceCatalog, ReferenceEntry};

/// Free catalog bundled with the binary
pub const FREE_CATALOG_JSON: &str = include_str!("../data/free_catalog.json");

/// Where in the document a validation problem occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Catalog,
    /// Zero-based index into `variants`
    Entry(usize),
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Catalog => f.write_str("catalog"),
            Location::Entry(index) => write!(f, "variant #{}", index),
        }
    }
}

/// Fatal catalog load failure
#[derive(Error, Debug)]
pub enum CatalogValidationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("catalog is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("{location}: missing required field '{field}'")]
    MissingField { location: Location, field: &'static str },

    #[error("{location}: field '{field}' must be {expected}")]
    WrongType {
        location: Location,
        field: &'static str,
        expected: &'static str,
    },

    #[error("{location}: unknown category '{category}'")]
    UnknownCategory { location: Location, category: String },

    #[error("{location}: invalid value for '{field}': {details}")]
    InvalidValue {
        location: Location,
        field: &'static str,
        details: String,
    },
}

/// Non-fatal catalog inconsistency
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogWarning {
    CountMismatch { declared: usize, actual: usize },
    /// Later duplicate dropped; the first entry for an rsid wins
    DuplicateRsid { rsid: String, entry: usize },
}

impl fmt::Display for CatalogWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogWarning::CountMismatch { declared, actual } => write!(
                f,
                "catalog declares {} variants but contains {}",
                declared, actual
            ),
            CatalogWarning::DuplicateRsid { rsid, entry } => {
                write!(f, "duplicate rsid {} at variant #{} ignored", rsid, entry)
            }
        }
    }
}

/// Validated catalog plus load warnings
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedCatalog {
    pub catalog: ReferenceCatalog,
    pub warnings: Vec<CatalogWarning>,
}

/// Load the bundled free catalog
pub fn load_free_catalog() -> Result<LoadedCatalog, CatalogValidationError> {
    parse_catalog(FREE_CATALOG_JSON)
}

/// Load a catalog JSON document from disk
pub async fn load_catalog_file(path: impl AsRef<Path>) -> Result<LoadedCatalog, CatalogValidationError> {
    let text = tokio::fs::read_to_string(path.as_ref()).await?;
    parse_catalog(&text)
}

/// Parse and validate catalog JSON text
pub fn parse_catalog(json: &str) -> Result<LoadedCatalog, CatalogValidationError> {
    let value: Value =
        serde_json::from_str(json).map_err(|e| CatalogValidationError::InvalidJson(e.to_string()))?;
    validate_catalog(&value)
}

/// Validate an already-parsed JSON document against the catalog schema
pub fn validate_catalog(value: &Value) -> Result<LoadedCatalog, CatalogValidationError> {
    let root = value.as_object().ok_or(CatalogValidationError::WrongType {
        location: Location::Catalog,
        field: "(root)",
        expected: "an object",
    })?;

    let version = required_str(root, "version", Location::Catalog)?.to_string();

    let generated_raw = required_str(root, "generatedAt", Location::Catalog)?;
    let generated_at = DateTime::parse_from_rfc3339(generated_raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CatalogValidationError::InvalidValue {
            location: Location::Catalog,
            field: "generatedAt",
            details: e.to_string(),
        })?;

    let count = required_field(root, "count", Location::Catalog)?
        .as_u64()
        .ok_or(CatalogValidationError::WrongType {
            location: Location::Catalog,
            field: "count",
            expected: "a non-negative integer",
        })? as usize;

    let raw_entries = required_field(root, "variants", Location::Catalog)?
        .as_array()
        .ok_or(CatalogValidationError::WrongType {
            location: Location::Catalog,
            field: "variants",
            expected: "an array",
        })?;

    let mut warnings = Vec::new();
    let mut seen = HashSet::new();
    let mut entries = Vec::with_capacity(raw_entries.len());

    for (index, raw) in raw_entries.iter().enumerate() {
        let entry = validate_entry(raw, Location::Entry(index))?;
        if seen.insert(entry.rsid.clone()) {
            entries.push(entry);
        } else {
            warn!("Duplicate rsid {} in catalog {}", entry.rsid, version);
            warnings.push(CatalogWarning::DuplicateRsid {
                rsid: entry.rsid,
                entry: index,
            });
        }
    }

    if count != raw_entries.len() {
        warn!(
            "Catalog {} declares {} variants but contains {}",
            version,
            count,
            raw_entries.len()
        );
        warnings.push(CatalogWarning::CountMismatch {
            declared: count,
            actual: raw_entries.len(),
        });
    }

    info!("Loaded SNP catalog {} ({} entries)", version, entries.len());

    Ok(LoadedCatalog {
        catalog: ReferenceCatalog {
            version,
            generated_at,
            count,
            entries,
        },
        warnings,
    })
}

fn validate_entry(value: &Value, location: Location) -> Result<ReferenceEntry, CatalogValidationError> {
    let obj = value.as_object().ok_or(CatalogValidationError::WrongType {
        location,
        field: "(variant)",
        expected: "an object",
    })?;

    let rsid = required_str(obj, "rsid", location)?;
    if !is_valid_rsid(rsid) || !rsid.to_ascii_lowercase().starts_with("rs") {
        return Err(CatalogValidationError::InvalidValue {
            location,
            field: "rsid",
            details: format!("'{}' is not an rs identifier", rsid),
        });
    }

    let category_raw = required_str(obj, "category", location)?;
    let category: Category = category_raw
        .parse()
        .map_err(|_| CatalogValidationError::UnknownCategory {
            location,
            category: category_raw.to_string(),
        })?;

    let sources = required_field(obj, "sources", location)?
        .as_array()
        .and_then(|items| {
            items
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect::<Option<Vec<String>>>()
        })
        .ok_or(CatalogValidationError::WrongType {
            location,
            field: "sources",
            expected: "an array of strings",
        })?;

    let position = match optional_field(obj, "position") {
        None => None,
        Some(v) => Some(v.as_u64().filter(|p| *p > 0).ok_or(
            CatalogValidationError::WrongType {
                location,
                field: "position",
                expected: "a positive integer",
            },
        )?),
    };

    Ok(ReferenceEntry {
        rsid: rsid.to_ascii_lowercase(),
        gene: required_str(obj, "gene", location)?.to_string(),
        category,
        annotation: required_str(obj, "annotation", location)?.to_string(),
        sources,
        risk_allele: optional_str(obj, "riskAllele", location)?,
        chromosome: optional_str(obj, "chromosome", location)?,
        position,
    })
}

fn required_field<'a>(
    obj: &'a Map<String, Value>,
    field: &'static str,
    location: Location,
) -> Result<&'a Value, CatalogValidationError> {
    optional_field(obj, field).ok_or(CatalogValidationError::MissingField { location, field })
}

/// Absent and explicit `null` are treated alike
fn optional_field<'a>(obj: &'a Map<String, Value>, field: &str) -> Option<&'a Value> {
    obj.get(field).filter(|v| !v.is_null())
}

fn required_str<'a>(
    obj: &'a Map<String, Value>,
    field: &'static str,
    location: Location,
) -> Result<&'a str, CatalogValidationError> {
    required_field(obj, field, location)?
        .as_str()
        .ok_or(CatalogValidationError::WrongType {
            location,
            field,
            expected: "a string",
        })
}

fn optional_str(
    obj: &Map<String, Value>,
    field: &'static str,
    location: Location,
) -> Result<Option<String>, CatalogValidationError> {
    match optional_field(obj, field) {
        None => Ok(None),
        Some(v) => v
            .as_str()
            .map(|s| Some(s.to_string()))
            .ok_or(CatalogValidationError::WrongType {
                location,
                field,
                expected: "a string",
            }),
    }
}
