// ==============================================================================
// license/mod.rs - Premium License Sessions
// ==============================================================================
// Description: License service contract, wire types and license outcomes
// Author: Matt Barham
// Created: 2026-10-18
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================
// The license service exposes two calls:
//   POST /check-license     non-consuming status lookup
//   POST /validate-session  consuming; idempotent inside a 24 hour window and
//                           returns the AES-256-GCM encrypted premium catalog
// ==============================================================================

pub mod client;
pub mod crypto;
pub mod memory;
pub mod session;

pub use client::{HttpLicenseService, LicenseClient};
pub use memory::MemoryLicenseService;
pub use session::{ApplyOutcome, LicenseSession, LicenseState, RequestTicket};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::ReferenceCatalog;

/// Request body shared by both license endpoints
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseRequest<'a> {
    pub license_key: &'a str,
}

/// Error codes reported by the license service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireError {
    InvalidToken,
    Exhausted,
    NetworkError,
}

/// Response of POST /check-license
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckLicenseResponse {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sessions_remaining: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_active_session: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<WireError>,
}

/// Response of POST /validate-session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateSessionResponse {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sessions_remaining: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_expires_at: Option<DateTime<Utc>>,
    /// Base64 AES-256-GCM ciphertext (tag appended)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_catalog: Option<String>,
    /// Base64 96-bit IV
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iv: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<WireError>,
}

/// Transport-level failure talking to the license service
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LicenseServiceError {
    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Unexpected HTTP status {0}")]
    Status(u16),

    #[error("Malformed response: {0}")]
    Decode(String),
}

/// License outcome the session state machine branches on
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LicenseError {
    #[error("License key is not valid")]
    Invalid,

    #[error("License has no sessions remaining")]
    Exhausted,

    #[error("License service unreachable: {0}")]
    Network(String),

    #[error("Premium catalog could not be decrypted: {0}")]
    DecryptFailure(String),
}

impl LicenseError {
    pub fn kind(&self) -> &'static str {
        match self {
            LicenseError::Invalid => "invalid",
            LicenseError::Exhausted => "exhausted",
            LicenseError::Network(_) => "network",
            LicenseError::DecryptFailure(_) => "decrypt-failure",
        }
    }

    /// Only transient network failures keep an established session
    pub fn clears_session(&self) -> bool {
        !matches!(self, LicenseError::Network(_))
    }

    pub(crate) fn from_wire(error: WireError) -> Self {
        match error {
            WireError::InvalidToken => LicenseError::Invalid,
            WireError::Exhausted => LicenseError::Exhausted,
            WireError::NetworkError => {
                LicenseError::Network("license service reported a network error".to_string())
            }
        }
    }
}

impl From<LicenseServiceError> for LicenseError {
    fn from(err: LicenseServiceError) -> Self {
        LicenseError::Network(err.to_string())
    }
}

/// Non-consuming license status
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LicenseStatus {
    /// Absent when the service did not report a count
    pub sessions_remaining: Option<u32>,
    pub has_active_session: bool,
    pub session_expires_at: Option<DateTime<Utc>>,
}

impl LicenseStatus {
    /// A key reported at zero sessions with no open window
    pub fn is_exhausted(&self) -> bool {
        self.sessions_remaining == Some(0) && !self.has_active_session
    }
}

/// Result of a successful consuming call
#[derive(Debug, Clone, PartialEq)]
pub struct PremiumGrant {
    pub catalog: ReferenceCatalog,
    pub sessions_remaining: Option<u32>,
    pub session_expires_at: Option<DateTime<Utc>>,
}

/// Remote license service contract
#[async_trait]
pub trait LicenseService: Send + Sync {
    /// Status lookup; never mutates server-side counters
    async fn check_license(&self, key: &str) -> Result<CheckLicenseResponse, LicenseServiceError>;

    /// Start (or reuse) a 24 hour session and return the encrypted catalog
    async fn validate_session(&self, key: &str)
        -> Result<ValidateSessionResponse, LicenseServiceError>;
}

/// Last four characters of a key, for logs
pub fn redact_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 4 {
        return "****".to_string();
    }
    let suffix: String = chars[chars.len() - 4..].iter().collect();
    format!("****{}", suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_response_wire_names() {
        let json = r#"{"valid":true,"sessionsRemaining":4,"hasActiveSession":true,
            "sessionExpiresAt":"2026-10-19T08:00:00Z"}"#;
        let response: CheckLicenseResponse = serde_json::from_str(json).unwrap();
        assert!(response.valid);
        assert_eq!(response.sessions_remaining, Some(4));
        assert_eq!(response.has_active_session, Some(true));
        assert!(response.session_expires_at.is_some());
        assert!(response.error.is_none());
    }

    #[test]
    fn test_wire_error_codes() {
        let response: ValidateSessionResponse =
            serde_json::from_str(r#"{"valid":false,"error":"invalid_token"}"#).unwrap();
        assert_eq!(response.error, Some(WireError::InvalidToken));

        let json = serde_json::to_string(&WireError::NetworkError).unwrap();
        assert_eq!(json, "\"network_error\"");
    }

    #[test]
    fn test_request_body() {
        let body = serde_json::to_value(LicenseRequest { license_key: "ABC" }).unwrap();
        assert_eq!(body, serde_json::json!({"licenseKey": "ABC"}));
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(LicenseError::Invalid.kind(), "invalid");
        assert_eq!(LicenseError::DecryptFailure("x".into()).kind(), "decrypt-failure");
        assert!(!LicenseError::Network("down".into()).clears_session());
        assert!(LicenseError::Exhausted.clears_session());

        let folded: LicenseError = LicenseServiceError::Status(502).into();
        assert_eq!(folded.kind(), "network");
    }

    #[test]
    fn test_redact_key() {
        assert_eq!(redact_key("SNPX-1234-ABCD"), "****ABCD");
        assert_eq!(redact_key("abc"), "****");
    }
}
