// ==============================================================================
// license/memory.rs - In-Memory License Service
// ==============================================================================
// Description: Local license service with 24 hour session windows
// Author: Matt Barham
// Created: 2026-10-18
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================
// Session rule: if the key's last session started less than 24 hours ago the
// catalog is returned without spending a session; otherwise one session is
// spent and a new 24 hour window starts.
// ==============================================================================

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use super::crypto::encrypt_catalog;
use super::{
    redact_key, CheckLicenseResponse, LicenseService, LicenseServiceError,
    ValidateSessionResponse, WireError,
};

/// Length of one session window
pub const SESSION_WINDOW_HOURS: i64 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LicenseRecord {
    sessions_remaining: u32,
    last_session_start: Option<DateTime<Utc>>,
}

impl LicenseRecord {
    fn window_end(&self) -> Option<DateTime<Utc>> {
        self.last_session_start
            .map(|start| start + Duration::hours(SESSION_WINDOW_HOURS))
    }

    fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.window_end().is_some_and(|end| now < end)
    }
}

/// License service backed by process memory
#[derive(Debug)]
pub struct MemoryLicenseService {
    licenses: Mutex<HashMap<String, LicenseRecord>>,
    catalog_json: String,
    /// Fixed clock; `None` uses the system time
    clock: Mutex<Option<DateTime<Utc>>>,
    offline: AtomicBool,
}

impl MemoryLicenseService {
    /// Create a service that hands out `catalog_json` as the premium catalog
    pub fn new(catalog_json: impl Into<String>) -> Self {
        Self {
            licenses: Mutex::new(HashMap::new()),
            catalog_json: catalog_json.into(),
            clock: Mutex::new(None),
            offline: AtomicBool::new(false),
        }
    }

    /// Register a key with a number of sessions
    pub fn with_license(self, key: &str, sessions: u32) -> Self {
        if let Ok(mut licenses) = self.licenses.lock() {
            licenses.insert(
                key.to_string(),
                LicenseRecord {
                    sessions_remaining: sessions,
                    last_session_start: None,
                },
            );
        }
        self
    }

    /// Pin the service clock
    pub fn set_now(&self, now: DateTime<Utc>) {
        if let Ok(mut clock) = self.clock.lock() {
            *clock = Some(now);
        }
    }

    /// Override when the key's current window started
    pub fn set_last_session_start(&self, key: &str, start: DateTime<Utc>) {
        if let Ok(mut licenses) = self.licenses.lock() {
            if let Some(record) = licenses.get_mut(key) {
                record.last_session_start = Some(start);
            }
        }
    }

    /// Simulate an unreachable service
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn sessions_remaining(&self, key: &str) -> Option<u32> {
        self.licenses
            .lock()
            .ok()?
            .get(key)
            .map(|record| record.sessions_remaining)
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock
            .lock()
            .ok()
            .and_then(|clock| *clock)
            .unwrap_or_else(Utc::now)
    }

    fn connect(&self) -> Result<MutexGuard<'_, HashMap<String, LicenseRecord>>, LicenseServiceError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(LicenseServiceError::Transport(
                "license service is offline".to_string(),
            ));
        }
        self.licenses
            .lock()
            .map_err(|_| LicenseServiceError::Transport("license store unavailable".to_string()))
    }
}

#[async_trait]
impl LicenseService for MemoryLicenseService {
    async fn check_license(&self, key: &str) -> Result<CheckLicenseResponse, LicenseServiceError> {
        let now = self.now();
        let licenses = self.connect()?;

        let Some(record) = licenses.get(key) else {
            return Ok(CheckLicenseResponse {
                valid: false,
                error: Some(WireError::InvalidToken),
                ..Default::default()
            });
        };

        let active = record.is_active(now);
        if !active && record.sessions_remaining == 0 {
            return Ok(CheckLicenseResponse {
                valid: false,
                sessions_remaining: Some(0),
                has_active_session: Some(false),
                error: Some(WireError::Exhausted),
                ..Default::default()
            });
        }

        Ok(CheckLicenseResponse {
            valid: true,
            sessions_remaining: Some(record.sessions_remaining),
            has_active_session: Some(active),
            session_expires_at: if active { record.window_end() } else { None },
            error: None,
        })
    }

    async fn validate_session(
        &self,
        key: &str,
    ) -> Result<ValidateSessionResponse, LicenseServiceError> {
        let now = self.now();
        let mut licenses = self.connect()?;

        let Some(record) = licenses.get_mut(key) else {
            return Ok(ValidateSessionResponse {
                valid: false,
                error: Some(WireError::InvalidToken),
                ..Default::default()
            });
        };

        if record.is_active(now) {
            debug!("Reusing open session for {}", redact_key(key));
        } else if record.sessions_remaining == 0 {
            return Ok(ValidateSessionResponse {
                valid: false,
                sessions_remaining: Some(0),
                error: Some(WireError::Exhausted),
                ..Default::default()
            });
        } else {
            record.sessions_remaining -= 1;
            record.last_session_start = Some(now);
            info!(
                "Started session for {} ({} remaining)",
                redact_key(key),
                record.sessions_remaining
            );
        }

        let (ciphertext, iv) = encrypt_catalog(self.catalog_json.as_bytes(), key)
            .map_err(|e| LicenseServiceError::Transport(e.to_string()))?;

        Ok(ValidateSessionResponse {
            valid: true,
            sessions_remaining: Some(record.sessions_remaining),
            session_expires_at: record.window_end(),
            encrypted_catalog: Some(ciphertext),
            iv: Some(iv),
            error: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FREE_CATALOG_JSON;
    use crate::license::{LicenseClient, LicenseError};
    use chrono::TimeZone;
    use std::sync::Arc;

    const KEY: &str = "SNPX-MEM-0001";

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap()
    }

    fn service(sessions: u32) -> MemoryLicenseService {
        let service = MemoryLicenseService::new(FREE_CATALOG_JSON).with_license(KEY, sessions);
        service.set_now(fixed_now());
        service
    }

    #[tokio::test]
    async fn test_session_within_window_is_not_charged() {
        let service = service(3);
        let start = fixed_now() - Duration::hours(23);
        service.set_last_session_start(KEY, start);

        let response = service.validate_session(KEY).await.unwrap();
        assert!(response.valid);
        assert_eq!(response.sessions_remaining, Some(3));
        assert_eq!(response.session_expires_at, Some(start + Duration::hours(24)));
        assert_eq!(service.sessions_remaining(KEY), Some(3));
    }

    #[tokio::test]
    async fn test_session_after_window_is_charged_once() {
        let service = service(3);
        service.set_last_session_start(KEY, fixed_now() - Duration::hours(25));

        let first = service.validate_session(KEY).await.unwrap();
        assert_eq!(first.sessions_remaining, Some(2));
        assert_eq!(first.session_expires_at, Some(fixed_now() + Duration::hours(24)));

        let second = service.validate_session(KEY).await.unwrap();
        assert_eq!(second.sessions_remaining, Some(2));
        assert_eq!(second.session_expires_at, first.session_expires_at);
    }

    #[tokio::test]
    async fn test_check_does_not_consume() {
        let service = service(2);
        for _ in 0..3 {
            let response = service.check_license(KEY).await.unwrap();
            assert!(response.valid);
            assert_eq!(response.has_active_session, Some(false));
        }
        assert_eq!(service.sessions_remaining(KEY), Some(2));
    }

    #[tokio::test]
    async fn test_exhausted_key() {
        let service = service(0);
        let check = service.check_license(KEY).await.unwrap();
        assert_eq!(check.error, Some(WireError::Exhausted));

        let validate = service.validate_session(KEY).await.unwrap();
        assert_eq!(validate.error, Some(WireError::Exhausted));
    }

    #[tokio::test]
    async fn test_last_session_still_open_at_zero() {
        let service = service(1);
        service.validate_session(KEY).await.unwrap();
        assert_eq!(service.sessions_remaining(KEY), Some(0));

        let check = service.check_license(KEY).await.unwrap();
        assert!(check.valid);
        assert_eq!(check.has_active_session, Some(true));
    }

    #[tokio::test]
    async fn test_unknown_key() {
        let response = service(1).check_license("nope").await.unwrap();
        assert_eq!(response.error, Some(WireError::InvalidToken));
    }

    #[tokio::test]
    async fn test_offline() {
        let service = service(1);
        service.set_offline(true);
        assert!(service.check_license(KEY).await.is_err());
    }

    #[tokio::test]
    async fn test_client_round_trip() {
        let client = LicenseClient::new(Arc::new(service(5)));
        let status = client.check_license(KEY).await.unwrap();
        assert_eq!(status.sessions_remaining, Some(5));

        let grant = client.start_session_and_fetch(KEY).await.unwrap();
        assert_eq!(grant.sessions_remaining, Some(4));
        assert_eq!(grant.catalog.entries.len(), 16);

        let err = client.check_license("wrong").await.unwrap_err();
        assert_eq!(err, LicenseError::Invalid);
    }
}
