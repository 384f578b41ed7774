// ==============================================================================
// validator.rs - Input File Validation
// ==============================================================================
// Description: Validates uploaded genome exports (size, type, magic, encoding)
// Author: Matt Barham
// Created: 2025-10-31
// Modified: 2026-10-18
// Version: 2.0.0
// Security: Allowlist-only file types, magic number verification, bounded
//           gzip decompression
// ==============================================================================

use flate2::read::GzDecoder;
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

/// Default upload ceiling
pub const DEFAULT_MAX_FILE_SIZE: u64 = 100 * 1024 * 1024; // 100 MB

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Plain text exports accepted as-is or gzip-compressed
const TEXT_EXTENSIONS: [&str; 3] = ["txt", "csv", "tsv"];

/// Upload rejection reasons
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("File too large: {size} bytes (max: {max} bytes)")]
    TooLarge { size: u64, max: u64 },

    #[error("File is empty")]
    Empty,

    #[error("Invalid filename after sanitization")]
    InvalidFilename,

    #[error("Invalid file type: {0}")]
    InvalidType(String),

    #[error("Magic number mismatch for .{0} file")]
    MagicMismatch(String),

    #[error("Failed to decompress gzip data: {0}")]
    Decompress(String),

    #[error("File is not UTF-8 text")]
    NotText,
}

/// Provenance of an accepted upload
#[derive(Debug, Clone)]
pub struct ValidatedFile {
    pub original_name: String,
    pub safe_name: String,
    pub extension: String,
    /// Size on disk, before decompression
    pub size: u64,
    pub compressed: bool,
    pub hash_sha256: String,
    pub validated_at: chrono::DateTime<chrono::Utc>,
}

/// Accepted upload and its decoded text
#[derive(Debug, Clone)]
pub struct ValidatedUpload {
    pub file: ValidatedFile,
    pub text: String,
}

pub struct FileValidator {
    max_file_size: u64,
}

impl FileValidator {
    pub fn new() -> Self {
        Self::with_max_size(DEFAULT_MAX_FILE_SIZE)
    }

    pub fn with_max_size(max_file_size: u64) -> Self {
        Self { max_file_size }
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    /// Validate and decode a file on disk
    pub async fn validate_upload(&self, file_path: &Path) -> Result<ValidatedUpload, ValidationError> {
        let file_name = file_path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .ok_or(ValidationError::InvalidFilename)?;

        // Size check before reading anything
        let metadata = tokio::fs::metadata(file_path).await?;
        self.check_size(metadata.len())?;

        let bytes = tokio::fs::read(file_path).await?;
        self.validate_bytes(&file_name, &bytes)
    }

    /// Validate and decode an in-memory upload
    pub fn validate_bytes(&self, file_name: &str, bytes: &[u8]) -> Result<ValidatedUpload, ValidationError> {
        info!("Validating file: {}", file_name);

        // 1. Size check
        let size = bytes.len() as u64;
        self.check_size(size)?;
        if bytes.is_empty() {
            return Err(ValidationError::Empty);
        }
        debug!("Size check passed: {} bytes", size);

        // 2. Filename sanitization
        let safe_name = self.sanitize_filename(file_name)?;
        debug!("Sanitized filename: {}", safe_name);

        // 3. Extension check (allowlist)
        let ext = self.get_extension(&safe_name)?;
        debug!("Extension check passed: {}", ext);

        // 4. Magic number verification
        let compressed = bytes.starts_with(&GZIP_MAGIC);
        if ext.ends_with("gz") && !compressed {
            return Err(ValidationError::MagicMismatch(ext));
        }

        // 5. Decode
        let text = if compressed {
            debug!("Decompressing gzip upload");
            self.decompress(bytes)?
        } else {
            String::from_utf8(bytes.to_vec()).map_err(|_| ValidationError::NotText)?
        };
        if text.trim().is_empty() {
            return Err(ValidationError::Empty);
        }

        // 6. Compute SHA-256 hash
        let hash = compute_sha256(bytes);
        debug!("SHA-256: {}", hash);

        Ok(ValidatedUpload {
            file: ValidatedFile {
                original_name: file_name.to_string(),
                safe_name,
                extension: ext,
                size,
                compressed,
                hash_sha256: hash,
                validated_at: chrono::Utc::now(),
            },
            text,
        })
    }

    fn check_size(&self, size: u64) -> Result<(), ValidationError> {
        if size > self.max_file_size {
            return Err(ValidationError::TooLarge {
                size,
                max: self.max_file_size,
            });
        }
        Ok(())
    }

    fn sanitize_filename(&self, name: &str) -> Result<String, ValidationError> {
        // Remove path separators, null bytes, control characters
        let safe = name
            .replace(['/', '\\', '\0'], "_")
            .chars()
            .filter(|c| {
                c.is_ascii_alphanumeric()
                    || *c == '_'
                    || *c == '.'
                    || *c == '-'
            })
            .collect::<String>();

        // Limit length to 255 characters
        let truncated: String = safe.chars().take(255).collect();

        // Must not be empty after sanitization
        if truncated.is_empty() {
            return Err(ValidationError::InvalidFilename);
        }

        Ok(truncated)
    }

    fn get_extension(&self, filename: &str) -> Result<String, ValidationError> {
        let lower = filename.to_lowercase();

        // Compound extensions like .txt.gz
        if let Some(stem) = lower.strip_suffix(".gz") {
            return match stem.rsplit_once('.') {
                Some((_, inner)) if TEXT_EXTENSIONS.contains(&inner) => Ok(format!("{}.gz", inner)),
                _ => Ok("gz".to_string()),
            };
        }

        match lower.rsplit_once('.') {
            Some((_, ext)) if TEXT_EXTENSIONS.contains(&ext) => Ok(ext.to_string()),
            Some((_, ext)) => Err(ValidationError::InvalidType(ext.to_string())),
            None => Err(ValidationError::InvalidType(String::new())),
        }
    }

    /// Inflate at most `max_file_size` bytes of text
    fn decompress(&self, bytes: &[u8]) -> Result<String, ValidationError> {
        let mut decoded = Vec::new();
        GzDecoder::new(bytes)
            .take(self.max_file_size + 1)
            .read_to_end(&mut decoded)
            .map_err(|e| ValidationError::Decompress(e.to_string()))?;

        self.check_size(decoded.len() as u64)?;
        String::from_utf8(decoded).map_err(|_| ValidationError::NotText)
    }
}

impl Default for FileValidator {
    fn default() -> Self {
        Self::new()
    }
}

fn compute_sha256(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
