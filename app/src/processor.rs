// ==============================================================================
// processor.rs - SNP Extraction Pipeline
// ==============================================================================
// Description: Owns the current upload, catalogs and license session and runs
//              validate -> parse -> extract -> render
// Author: Matt Barham
// Created: 2025-10-31
// Modified: 2026-10-18
// Version: 3.0.0
// ==============================================================================

use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::catalog::{load_catalog_file, load_free_catalog, CatalogValidationError, LoadedCatalog};
use crate::config::ExtractorConfig;
use crate::extraction::{ExtractionEngine, ExtractionEstimate};
use crate::license::{HttpLicenseService, LicenseClient, LicenseSession, LicenseState, LicenseStatus};
use crate::models::{CategoryFilter, ExtractionResult, ReferenceCatalog};
use crate::output::{format_size, serialize, OutputError, OutputFormat, OutputStats};
use crate::parsers::{parse_genome, ParseError, ParseErrorKind, ParsedGenome};
use crate::validator::{FileValidator, ValidatedFile, ValidatedUpload, ValidationError};

/// Failures surfaced at the orchestration boundary
#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Catalog(#[from] CatalogValidationError),

    #[error(transparent)]
    Output(#[from] OutputError),

    #[error("License service client setup failed: {0}")]
    LicenseSetup(String),

    #[error("No genome file loaded")]
    NoGenome,

    #[error("No license service configured")]
    NoLicenseService,
}

impl ProcessorError {
    /// Message suitable for showing to the user
    pub fn user_message(&self) -> String {
        match self {
            ProcessorError::Validation(ValidationError::TooLarge { size, max }) => format!(
                "File is too large ({}). The maximum upload size is {}.",
                format_size(*size),
                format_size(*max)
            ),
            ProcessorError::Validation(ValidationError::InvalidType(ext)) => format!(
                "Unsupported file type '.{}'. Upload the raw data .txt file, optionally gzip-compressed.",
                ext
            ),
            ProcessorError::Validation(err) => format!("Could not read the uploaded file: {}.", err),
            ProcessorError::Parse(err) => match err.kind {
                ParseErrorKind::UnsupportedFormat => "Unrecognized file format. Upload a raw data \
export from 23andMe or AncestryDNA."
                    .to_string(),
                ParseErrorKind::NoValidVariants => match &err.details {
                    Some(details) => format!("No valid variants were found in the file ({}).", details),
                    None => "No valid variants were found in the file.".to_string(),
                },
            },
            ProcessorError::Catalog(err) => format!("The SNP list could not be loaded: {}.", err),
            ProcessorError::Output(err) => format!("Could not generate the report: {}.", err),
            ProcessorError::LicenseSetup(_) | ProcessorError::NoLicenseService => {
                "Premium features are unavailable: the license service is not configured.".to_string()
            }
            ProcessorError::NoGenome => "Upload a genome file first.".to_string(),
        }
    }
}

/// Identity of an in-flight upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadTicket {
    generation: u64,
}

/// Current genome upload with its lookup index
#[derive(Debug, Clone)]
pub struct LoadedGenome {
    pub file: ValidatedFile,
    pub parsed: Arc<ParsedGenome>,
    engine: ExtractionEngine,
}

/// Single owner of all mutable extraction state
pub struct SnpProcessor {
    free_catalog: ReferenceCatalog,
    validator: FileValidator,
    upload_generation: u64,
    genome: Option<LoadedGenome>,
    license: LicenseSession,
    license_client: Option<LicenseClient>,
}

impl SnpProcessor {
    pub fn new(free_catalog: ReferenceCatalog, validator: FileValidator) -> Self {
        Self {
            free_catalog,
            validator,
            upload_generation: 0,
            genome: None,
            license: LicenseSession::new(),
            license_client: None,
        }
    }

    /// Processor using the bundled free catalog and default limits
    pub fn with_bundled_catalog() -> Result<Self, ProcessorError> {
        let loaded = load_free_catalog()?;
        Ok(Self::new(log_catalog(loaded), FileValidator::new()))
    }

    /// Processor wired from configuration, including the HTTP license client
    pub async fn from_config(config: &ExtractorConfig) -> Result<Self, ProcessorError> {
        let loaded = match &config.catalog_path {
            Some(path) => {
                info!("Loading SNP list from {:?}", path);
                load_catalog_file(path).await?
            }
            None => load_free_catalog()?,
        };

        let service = HttpLicenseService::new(&config.license_service_url, config.request_timeout)
            .map_err(|e| ProcessorError::LicenseSetup(e.to_string()))?;

        Ok(Self::new(
            log_catalog(loaded),
            FileValidator::with_max_size(config.max_file_size),
        )
        .with_license_client(LicenseClient::new(Arc::new(service))))
    }

    pub fn with_license_client(mut self, client: LicenseClient) -> Self {
        self.license_client = Some(client);
        self
    }

    // --------------------------------------------------------------------------
    // Uploads
    // --------------------------------------------------------------------------

    /// Start a new upload, superseding any in flight
    pub fn begin_upload(&mut self) -> UploadTicket {
        self.upload_generation += 1;
        debug!("Upload {} started", self.upload_generation);
        UploadTicket {
            generation: self.upload_generation,
        }
    }

    /// Apply a finished upload read
    ///
    /// Returns `Ok(None)` when a newer upload has started since `ticket` was
    /// issued; the result is discarded and current state is left untouched.
    /// A failed current upload clears the previous genome.
    pub fn finish_upload(
        &mut self,
        ticket: UploadTicket,
        read: Result<ValidatedUpload, ValidationError>,
    ) -> Result<Option<&LoadedGenome>, ProcessorError> {
        if ticket.generation != self.upload_generation {
            debug!(
                "Discarding superseded upload {} (current {})",
                ticket.generation, self.upload_generation
            );
            return Ok(None);
        }

        self.genome = None;
        let upload = read?;
        let parsed = parse_genome(&upload.text)?;

        if let Some(summary) = parsed.warning_summary() {
            warn!("{}", summary);
        }
        info!(
            "Loaded {} ({} variants, {})",
            upload.file.safe_name,
            parsed.variants.len(),
            format_size(upload.file.size)
        );

        Ok(Some(self.store_genome(upload.file, parsed)))
    }

    /// Validate, read and parse a genome file from disk
    pub async fn load_genome_file(&mut self, path: &Path) -> Result<Option<&LoadedGenome>, ProcessorError> {
        let ticket = self.begin_upload();
        let read = self.validator.validate_upload(path).await;
        self.finish_upload(ticket, read)
    }

    /// Validate and parse an in-memory upload
    pub fn load_genome_bytes(&mut self, file_name: &str, bytes: &[u8]) -> Result<&LoadedGenome, ProcessorError> {
        let ticket = self.begin_upload();
        let read = self.validator.validate_bytes(file_name, bytes);
        self.finish_upload(ticket, read)?
            .ok_or(ProcessorError::NoGenome)
    }

    fn store_genome(&mut self, file: ValidatedFile, parsed: ParsedGenome) -> &LoadedGenome {
        let engine = ExtractionEngine::new(&parsed);
        self.genome.insert(LoadedGenome {
            file,
            parsed: Arc::new(parsed),
            engine,
        })
    }

    pub fn genome(&self) -> Option<&LoadedGenome> {
        self.genome.as_ref()
    }

    pub fn clear_genome(&mut self) {
        self.upload_generation += 1;
        self.genome = None;
    }

    // --------------------------------------------------------------------------
    // Extraction
    // --------------------------------------------------------------------------

    /// Premium catalog when unlocked, else the free catalog
    pub fn active_catalog(&self) -> &ReferenceCatalog {
        self.license.premium_catalog().unwrap_or(&self.free_catalog)
    }

    pub fn is_premium(&self) -> bool {
        self.license.premium_catalog().is_some()
    }

    fn engine(&self) -> Result<&ExtractionEngine, ProcessorError> {
        self.genome
            .as_ref()
            .map(|genome| &genome.engine)
            .ok_or(ProcessorError::NoGenome)
    }

    pub fn extract(&self, filter: &CategoryFilter) -> Result<ExtractionResult, ProcessorError> {
        self.extract_at(filter, Utc::now())
    }

    pub fn extract_at(
        &self,
        filter: &CategoryFilter,
        timestamp: DateTime<Utc>,
    ) -> Result<ExtractionResult, ProcessorError> {
        let result = self
            .engine()?
            .extract_at(self.active_catalog(), filter, timestamp);
        info!(
            "Extraction: {} found, {} no-call, {} missing of {}",
            result.summary.found, result.summary.no_call, result.summary.missing, result.summary.total
        );
        Ok(result)
    }

    pub fn estimate(&self, filter: &CategoryFilter) -> Result<ExtractionEstimate, ProcessorError> {
        Ok(self.engine()?.estimate(self.active_catalog(), filter))
    }

    /// Serialize a result and measure it
    pub fn render(
        &self,
        result: &ExtractionResult,
        format: OutputFormat,
    ) -> Result<(String, OutputStats), ProcessorError> {
        let text = serialize(result, format)?;
        let stats = OutputStats::of(&text);
        debug!(
            "Rendered {} report: {} (~{} tokens)",
            format.as_str(),
            stats.size_label,
            stats.approx_tokens
        );
        Ok((text, stats))
    }

    // --------------------------------------------------------------------------
    // License
    // --------------------------------------------------------------------------

    pub fn license(&self) -> &LicenseSession {
        &self.license
    }

    /// Enter a key, check it and unlock the premium catalog if needed
    pub async fn activate_license(&mut self, key: &str) -> Result<LicenseState, ProcessorError> {
        let client = self
            .license_client
            .clone()
            .ok_or(ProcessorError::NoLicenseService)?;

        if let Some(ticket) = self.license.set_key(key) {
            let result = client.check_license(ticket.key()).await;
            self.license.apply_check(&ticket, result);
        }
        self.fetch_premium(&client).await;
        Ok(self.license.state())
    }

    /// Re-check a stored key, keeping the cached status on network failure
    pub async fn restore_license(
        &mut self,
        key: &str,
        cached: Option<LicenseStatus>,
    ) -> Result<LicenseState, ProcessorError> {
        let client = self
            .license_client
            .clone()
            .ok_or(ProcessorError::NoLicenseService)?;

        if let Some(ticket) = self.license.restore(key, cached) {
            let result = client.check_license(ticket.key()).await;
            self.license.apply_check(&ticket, result);
        }
        self.fetch_premium(&client).await;
        Ok(self.license.state())
    }

    async fn fetch_premium(&mut self, client: &LicenseClient) {
        if let Some(ticket) = self.license.begin_fetch() {
            let result = client.start_session_and_fetch(ticket.key()).await;
            self.license.apply_fetch(&ticket, result);
        }
    }

    pub fn logout_license(&mut self) {
        self.license.logout();
    }
}

fn log_catalog(loaded: LoadedCatalog) -> ReferenceCatalog {
    if !loaded.warnings.is_empty() {
        warn!(
            "SNP list {} loaded with {} warning(s)",
            loaded.catalog.version,
            loaded.warnings.len()
        );
    }
    loaded.catalog
}
