// ==============================================================================
// config.rs - Extractor Configuration
// ==============================================================================
// Description: Runtime settings loaded from environment variables
// Author: Matt Barham
// Created: 2026-10-18
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================
// Variables (all optional):
//   SNP_LICENSE_SERVICE_URL   license service base URL
//   SNP_LICENSE_TIMEOUT_SECS  per-request timeout in seconds
//   SNP_MAX_FILE_SIZE_MB      upload ceiling in megabytes
//   SNP_OUTPUT_FORMAT         detailed | compact | minimal
//   SNP_CATALOG_PATH          JSON catalog used instead of the bundled one
// ==============================================================================

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::output::OutputFormat;
use crate::validator::DEFAULT_MAX_FILE_SIZE;

pub const DEFAULT_LICENSE_SERVICE_URL: &str = "https://license.snp-extractor.app/api";
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be {expected}, got '{value}'")]
    InvalidValue {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Runtime configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractorConfig {
    pub license_service_url: String,
    pub request_timeout: Duration,
    /// Upload ceiling in bytes
    pub max_file_size: u64,
    pub default_format: OutputFormat,
    pub catalog_path: Option<PathBuf>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            license_service_url: DEFAULT_LICENSE_SERVICE_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            default_format: OutputFormat::Detailed,
            catalog_path: None,
        }
    }
}

impl ExtractorConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let license_service_url = var("SNP_LICENSE_SERVICE_URL")
            .unwrap_or(defaults.license_service_url);

        let request_timeout = match var("SNP_LICENSE_TIMEOUT_SECS") {
            Some(value) => Duration::from_secs(parse_positive("SNP_LICENSE_TIMEOUT_SECS", &value)?),
            None => defaults.request_timeout,
        };

        let max_file_size = match var("SNP_MAX_FILE_SIZE_MB") {
            Some(value) => parse_positive("SNP_MAX_FILE_SIZE_MB", &value)? * 1024 * 1024,
            None => defaults.max_file_size,
        };

        let default_format = match var("SNP_OUTPUT_FORMAT") {
            Some(value) => value.parse().map_err(|_| ConfigError::InvalidValue {
                name: "SNP_OUTPUT_FORMAT",
                expected: "one of detailed, compact, minimal",
                value,
            })?,
            None => defaults.default_format,
        };

        let catalog_path = var("SNP_CATALOG_PATH").map(PathBuf::from);

        Ok(Self {
            license_service_url,
            request_timeout,
            max_file_size,
            default_format,
            catalog_path,
        })
    }
}

fn parse_positive(name: &'static str, value: &str) -> Result<u64, ConfigError> {
    match value.parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::InvalidValue {
            name,
            expected: "a positive integer",
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<ExtractorConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ExtractorConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config, ExtractorConfig::default());
        assert_eq!(config.max_file_size, 100 * 1024 * 1024);
        assert_eq!(config.request_timeout, Duration::from_secs(15));
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("SNP_LICENSE_SERVICE_URL", "http://localhost:8787"),
            ("SNP_LICENSE_TIMEOUT_SECS", "3"),
            ("SNP_MAX_FILE_SIZE_MB", "25"),
            ("SNP_OUTPUT_FORMAT", "Minimal"),
            ("SNP_CATALOG_PATH", "/tmp/premium.json"),
        ])
        .unwrap();

        assert_eq!(config.license_service_url, "http://localhost:8787");
        assert_eq!(config.request_timeout, Duration::from_secs(3));
        assert_eq!(config.max_file_size, 25 * 1024 * 1024);
        assert_eq!(config.default_format, OutputFormat::Minimal);
        assert_eq!(config.catalog_path, Some(PathBuf::from("/tmp/premium.json")));
    }

    #[test]
    fn test_blank_values_use_defaults() {
        let config = load(&[("SNP_OUTPUT_FORMAT", "  "), ("SNP_CATALOG_PATH", "")]).unwrap();
        assert_eq!(config.default_format, OutputFormat::Detailed);
        assert!(config.catalog_path.is_none());
    }

    #[test]
    fn test_invalid_values() {
        let err = load(&[("SNP_LICENSE_TIMEOUT_SECS", "0")]).unwrap_err();
        assert!(err.to_string().contains("SNP_LICENSE_TIMEOUT_SECS"));

        assert!(load(&[("SNP_MAX_FILE_SIZE_MB", "lots")]).is_err());
        assert!(load(&[("SNP_OUTPUT_FORMAT", "parquet")]).is_err());
    }
}
