// ==============================================================================
// license/client.rs - License Service Client
// ==============================================================================
// Description: HTTP transport and response interpretation for license calls
// Author: Matt Barham
// Created: 2026-10-18
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::crypto::decrypt_catalog;
use super::{
    redact_key, CheckLicenseResponse, LicenseError, LicenseRequest, LicenseService,
    LicenseServiceError, LicenseStatus, PremiumGrant, ValidateSessionResponse,
};

/// License service reached over HTTP
#[derive(Debug, Clone)]
pub struct HttpLicenseService {
    http: reqwest::Client,
    base_url: String,
}

impl HttpLicenseService {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, LicenseServiceError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LicenseServiceError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn post<Resp: DeserializeOwned>(
        &self,
        path: &str,
        key: &str,
    ) -> Result<Resp, LicenseServiceError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("POST {}", url);

        let response = self
            .http
            .post(&url)
            .json(&LicenseRequest { license_key: key })
            .send()
            .await
            .map_err(|e| LicenseServiceError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LicenseServiceError::Transport(e.to_string()))?;

        // Rejections arrive as 4xx with a JSON body carrying the error code
        match serde_json::from_str::<Resp>(&body) {
            Ok(parsed) => Ok(parsed),
            Err(_) if !status.is_success() => Err(LicenseServiceError::Status(status.as_u16())),
            Err(e) => Err(LicenseServiceError::Decode(e.to_string())),
        }
    }
}

#[async_trait]
impl LicenseService for HttpLicenseService {
    async fn check_license(&self, key: &str) -> Result<CheckLicenseResponse, LicenseServiceError> {
        self.post("/check-license", key).await
    }

    async fn validate_session(
        &self,
        key: &str,
    ) -> Result<ValidateSessionResponse, LicenseServiceError> {
        self.post("/validate-session", key).await
    }
}

/// Turns raw service responses into license outcomes
#[derive(Clone)]
pub struct LicenseClient {
    service: Arc<dyn LicenseService>,
}

impl LicenseClient {
    pub fn new(service: Arc<dyn LicenseService>) -> Self {
        Self { service }
    }

    /// Non-consuming status check
    pub async fn check_license(&self, key: &str) -> Result<LicenseStatus, LicenseError> {
        let response = self.service.check_license(key).await.map_err(|e| {
            warn!("License check for {} failed: {}", redact_key(key), e);
            LicenseError::from(e)
        })?;

        if let Some(error) = response.error {
            return Err(LicenseError::from_wire(error));
        }
        if !response.valid {
            return Err(LicenseError::Invalid);
        }

        let status = LicenseStatus {
            sessions_remaining: response.sessions_remaining,
            has_active_session: response.has_active_session.unwrap_or(false),
            session_expires_at: response.session_expires_at,
        };
        info!(
            "License {} valid ({} sessions remaining, active: {})",
            redact_key(key),
            status
                .sessions_remaining
                .map_or_else(|| "unknown".to_string(), |n| n.to_string()),
            status.has_active_session
        );
        Ok(status)
    }

    /// Consuming call: start or reuse a session, then decrypt the premium catalog
    pub async fn start_session_and_fetch(&self, key: &str) -> Result<PremiumGrant, LicenseError> {
        let response = self.service.validate_session(key).await.map_err(|e| {
            warn!("Session start for {} failed: {}", redact_key(key), e);
            LicenseError::from(e)
        })?;

        if let Some(error) = response.error {
            return Err(LicenseError::from_wire(error));
        }
        if !response.valid {
            return Err(LicenseError::Invalid);
        }

        let (ciphertext, iv) = match (&response.encrypted_catalog, &response.iv) {
            (Some(ciphertext), Some(iv)) => (ciphertext, iv),
            _ => {
                return Err(LicenseError::DecryptFailure(
                    "response carried no encrypted catalog".to_string(),
                ))
            }
        };

        let loaded = decrypt_catalog(ciphertext, iv, key)?;
        if !loaded.warnings.is_empty() {
            debug!("Premium catalog has {} warning(s)", loaded.warnings.len());
        }

        info!(
            "Premium catalog {} unlocked ({} entries)",
            loaded.catalog.version,
            loaded.catalog.entries.len()
        );

        Ok(PremiumGrant {
            catalog: loaded.catalog,
            sessions_remaining: response.sessions_remaining,
            session_expires_at: response.session_expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FREE_CATALOG_JSON;
    use crate::license::crypto::encrypt_catalog;
    use crate::license::{LicenseSession, LicenseState};
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const KEY: &str = "SNPX-TEST-0001";

    async fn client_for(server: &MockServer) -> LicenseClient {
        let service = HttpLicenseService::new(server.uri(), Duration::from_secs(5)).unwrap();
        LicenseClient::new(Arc::new(service))
    }

    #[tokio::test]
    async fn test_check_license_valid() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/check-license"))
            .and(body_json(json!({"licenseKey": KEY})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "valid": true,
                "sessionsRemaining": 3,
                "hasActiveSession": false
            })))
            .expect(1)
            .mount(&server)
            .await;

        let status = client_for(&server).await.check_license(KEY).await.unwrap();
        assert_eq!(status.sessions_remaining, Some(3));
        assert!(!status.has_active_session);
        assert!(status.session_expires_at.is_none());
    }

    #[tokio::test]
    async fn test_check_license_rejections() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/check-license"))
            .respond_with(
                ResponseTemplate::new(403)
                    .set_body_json(json!({"valid": false, "error": "exhausted"})),
            )
            .mount(&server)
            .await;

        let err = client_for(&server).await.check_license(KEY).await.unwrap_err();
        assert_eq!(err, LicenseError::Exhausted);
    }

    #[tokio::test]
    async fn test_invalid_without_error_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/check-license"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"valid": false})))
            .mount(&server)
            .await;

        let err = client_for(&server).await.check_license(KEY).await.unwrap_err();
        assert_eq!(err, LicenseError::Invalid);
    }

    #[tokio::test]
    async fn test_valid_without_session_count_keeps_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/check-license"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"valid": true})))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let mut session = LicenseSession::new();
        let ticket = session.set_key(KEY).unwrap();
        let result = client.check_license(ticket.key()).await;

        let status = result.clone().unwrap();
        assert_eq!(status.sessions_remaining, None);
        assert!(!status.is_exhausted());

        session.apply_check(&ticket, result);
        assert_eq!(session.state(), LicenseState::Validated { session_active: false });
        assert!(session.has_key());
    }

    #[tokio::test]
    async fn test_server_error_is_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/check-license"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let err = client_for(&server).await.check_license(KEY).await.unwrap_err();
        assert_eq!(err.kind(), "network");
        assert!(err.to_string().contains("502"));
    }

    #[tokio::test]
    async fn test_unparsable_success_body_is_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/check-license"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = client_for(&server).await.check_license(KEY).await.unwrap_err();
        assert!(matches!(err, LicenseError::Network(_)));
    }

    #[tokio::test]
    async fn test_unreachable_service_is_network() {
        let service = HttpLicenseService::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let client = LicenseClient::new(Arc::new(service));
        let err = client.check_license(KEY).await.unwrap_err();
        assert!(matches!(err, LicenseError::Network(_)));
    }

    #[tokio::test]
    async fn test_fetch_decrypts_catalog() {
        let (ciphertext, iv) = encrypt_catalog(FREE_CATALOG_JSON.as_bytes(), KEY).unwrap();
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/validate-session"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "valid": true,
                "sessionsRemaining": 2,
                "sessionExpiresAt": "2026-10-19T10:00:00Z",
                "encryptedCatalog": ciphertext,
                "iv": iv
            })))
            .expect(1)
            .mount(&server)
            .await;

        let grant = client_for(&server)
            .await
            .start_session_and_fetch(KEY)
            .await
            .unwrap();
        assert_eq!(grant.sessions_remaining, Some(2));
        assert_eq!(grant.catalog.version, "2026.10-free");
        assert!(grant.session_expires_at.is_some());
    }

    #[tokio::test]
    async fn test_fetch_with_wrong_key_is_decrypt_failure() {
        let (ciphertext, iv) = encrypt_catalog(FREE_CATALOG_JSON.as_bytes(), "SNPX-OTHER").unwrap();
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/validate-session"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "valid": true,
                "sessionsRemaining": 2,
                "encryptedCatalog": ciphertext,
                "iv": iv
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .start_session_and_fetch(KEY)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "decrypt-failure");
    }

    #[tokio::test]
    async fn test_fetch_without_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/validate-session"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"valid": true})))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .start_session_and_fetch(KEY)
            .await
            .unwrap_err();
        assert!(matches!(err, LicenseError::DecryptFailure(_)));
    }

    #[tokio::test]
    async fn test_fetch_network_error_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/validate-session"))
            .respond_with(
                ResponseTemplate::new(503)
                    .set_body_json(json!({"valid": false, "error": "network_error"})),
            )
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .start_session_and_fetch(KEY)
            .await
            .unwrap_err();
        assert!(!err.clears_session());
    }
}
