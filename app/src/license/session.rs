// ==============================================================================
// license/session.rs - License Session State Machine
// ==============================================================================
// Description: Tracks the current license key, its session and premium catalog
// Author: Matt Barham
// Created: 2026-10-18
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================
// States: NoLicense -> PendingValidation -> Validated | Invalid | Exhausted
//
// Every network request is issued against a RequestTicket that captures the
// key and a generation counter. Each check bumps the generation, so a check
// response for an older ticket is discarded on arrival. A premium fetch is
// only discarded once its key is no longer the current key.
// ==============================================================================

use chrono::{DateTime, Utc};
use std::fmt;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use super::{redact_key, LicenseError, LicenseStatus, PremiumGrant};
use crate::models::ReferenceCatalog;

/// License state as seen by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LicenseState {
    NoLicense,
    PendingValidation,
    Validated { session_active: bool },
    Invalid,
    Exhausted,
}

/// Capture of the key a request was issued for
#[derive(Clone)]
pub struct RequestTicket {
    key: Zeroizing<String>,
    generation: u64,
}

impl fmt::Debug for RequestTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestTicket")
            .field("key", &redact_key(&self.key))
            .field("generation", &self.generation)
            .finish()
    }
}

impl RequestTicket {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Whether a response was applied or discarded as stale
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    Stale,
}

/// Current license session and cached premium catalog
pub struct LicenseSession {
    key: Option<Zeroizing<String>>,
    generation: u64,
    state: LicenseState,
    /// State restored when a pending check fails with a network error
    fallback: LicenseState,
    status: Option<LicenseStatus>,
    premium: Option<ReferenceCatalog>,
    last_error: Option<LicenseError>,
}

impl fmt::Debug for LicenseSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LicenseSession")
            .field("key", &self.key_hint())
            .field("generation", &self.generation)
            .field("state", &self.state)
            .field("status", &self.status)
            .field("premium", &self.premium.as_ref().map(|c| &c.version))
            .finish()
    }
}

impl Default for LicenseSession {
    fn default() -> Self {
        Self::new()
    }
}

impl LicenseSession {
    pub fn new() -> Self {
        Self {
            key: None,
            generation: 0,
            state: LicenseState::NoLicense,
            fallback: LicenseState::NoLicense,
            status: None,
            premium: None,
            last_error: None,
        }
    }

    pub fn state(&self) -> LicenseState {
        self.state
    }

    pub fn status(&self) -> Option<&LicenseStatus> {
        self.status.as_ref()
    }

    pub fn last_error(&self) -> Option<&LicenseError> {
        self.last_error.as_ref()
    }

    pub fn has_key(&self) -> bool {
        self.key.is_some()
    }

    /// Redacted key for display
    pub fn key_hint(&self) -> Option<String> {
        self.key.as_ref().map(|k| redact_key(k))
    }

    /// Decrypted premium catalog for the current key, if fetched
    pub fn premium_catalog(&self) -> Option<&ReferenceCatalog> {
        self.premium.as_ref()
    }

    /// True while a session window is open at `now`
    pub fn session_active_at(&self, now: DateTime<Utc>) -> bool {
        let open = matches!(self.state, LicenseState::Validated { session_active: true });
        let unexpired = self
            .status
            .as_ref()
            .and_then(|s| s.session_expires_at)
            .map_or(true, |expires| expires > now);
        open && unexpired
    }

    /// Enter a new key and return the ticket for its validation check
    ///
    /// Re-entering the current key keeps any cached catalog. An empty key
    /// logs out.
    pub fn set_key(&mut self, key: &str) -> Option<RequestTicket> {
        let key = key.trim();
        if key.is_empty() {
            self.logout();
            return None;
        }

        let same_key = self.key.as_ref().is_some_and(|current| current.as_str() == key);
        if !same_key {
            self.premium = None;
            self.status = None;
            self.key = Some(Zeroizing::new(key.to_string()));
            self.fallback = LicenseState::NoLicense;
        } else {
            self.fallback = self.validated_fallback();
        }

        Some(self.begin_check())
    }

    /// Restore a stored key and its last known status (e.g. at startup)
    ///
    /// A network failure on the resulting check falls back to the restored
    /// status instead of clearing it.
    pub fn restore(&mut self, key: &str, cached: Option<LicenseStatus>) -> Option<RequestTicket> {
        let key = key.trim();
        if key.is_empty() {
            self.logout();
            return None;
        }

        self.key = Some(Zeroizing::new(key.to_string()));
        self.premium = None;
        self.fallback = match &cached {
            Some(status) if !status.is_exhausted() => LicenseState::Validated {
                session_active: status.has_active_session,
            },
            _ => LicenseState::NoLicense,
        };
        self.status = cached;

        Some(self.begin_check())
    }

    /// Re-check the current key without changing it
    pub fn revalidate(&mut self) -> Option<RequestTicket> {
        self.key.as_ref()?;
        self.fallback = self.validated_fallback();
        Some(self.begin_check())
    }

    fn validated_fallback(&self) -> LicenseState {
        match self.state {
            LicenseState::Validated { .. } => self.state,
            LicenseState::PendingValidation => self.fallback,
            _ => LicenseState::NoLicense,
        }
    }

    fn begin_check(&mut self) -> RequestTicket {
        self.generation += 1;
        self.state = LicenseState::PendingValidation;
        self.last_error = None;
        debug!(
            "License check pending for {} (generation {})",
            self.key_hint().unwrap_or_default(),
            self.generation
        );
        self.ticket()
    }

    fn ticket(&self) -> RequestTicket {
        RequestTicket {
            key: self.key.clone().unwrap_or_else(|| Zeroizing::new(String::new())),
            generation: self.generation,
        }
    }

    fn holds_key(&self, ticket: &RequestTicket) -> bool {
        self.key
            .as_ref()
            .is_some_and(|key| key.as_str() == ticket.key())
    }

    /// Checks must match the latest generation so an older check cannot
    /// overwrite a newer one for the same key
    fn is_current(&self, ticket: &RequestTicket) -> bool {
        ticket.generation == self.generation && self.holds_key(ticket)
    }

    /// Apply the result of a non-consuming check
    pub fn apply_check(
        &mut self,
        ticket: &RequestTicket,
        result: Result<LicenseStatus, LicenseError>,
    ) -> ApplyOutcome {
        if !self.is_current(ticket) {
            debug!("Discarding stale license check (generation {})", ticket.generation);
            return ApplyOutcome::Stale;
        }

        match result {
            Ok(status) if status.is_exhausted() => {
                info!("License {} has no sessions remaining", redact_key(ticket.key()));
                self.clear(LicenseState::Exhausted);
            }
            Ok(status) => {
                self.state = LicenseState::Validated {
                    session_active: status.has_active_session,
                };
                self.status = Some(status);
                info!("License state: {:?}", self.state);
            }
            Err(err) => self.apply_error(err),
        }

        ApplyOutcome::Applied
    }

    /// True when the current key is valid but the premium catalog is not cached
    pub fn needs_fetch(&self) -> bool {
        matches!(self.state, LicenseState::Validated { .. }) && self.premium.is_none()
    }

    /// Ticket for the consuming fetch, only when one is needed
    pub fn begin_fetch(&mut self) -> Option<RequestTicket> {
        if !self.needs_fetch() {
            return None;
        }
        self.last_error = None;
        Some(self.ticket())
    }

    /// Apply the result of the consuming fetch
    pub fn apply_fetch(
        &mut self,
        ticket: &RequestTicket,
        result: Result<PremiumGrant, LicenseError>,
    ) -> ApplyOutcome {
        // A grant stays valid across re-checks of the same key
        if !self.holds_key(ticket) {
            debug!("Discarding stale premium fetch (generation {})", ticket.generation);
            return ApplyOutcome::Stale;
        }

        match result {
            Ok(grant) => {
                self.status = Some(LicenseStatus {
                    sessions_remaining: grant.sessions_remaining,
                    has_active_session: true,
                    session_expires_at: grant.session_expires_at,
                });
                self.premium = Some(grant.catalog);
                self.state = LicenseState::Validated { session_active: true };
                info!("Premium session active for {}", redact_key(ticket.key()));
            }
            Err(LicenseError::Network(reason)) => {
                // Transient: keep the validated state and retry later
                warn!("Premium fetch failed, will retry: {}", reason);
                self.last_error = Some(LicenseError::Network(reason));
            }
            Err(err) => self.apply_error(err),
        }

        ApplyOutcome::Applied
    }

    fn apply_error(&mut self, err: LicenseError) {
        match &err {
            LicenseError::Network(reason) => {
                warn!("License service unreachable: {}", reason);
                self.state = self.fallback;
            }
            LicenseError::Invalid => self.clear(LicenseState::Invalid),
            LicenseError::Exhausted => self.clear(LicenseState::Exhausted),
            LicenseError::DecryptFailure(reason) => {
                warn!("Premium catalog rejected: {}", reason);
                self.clear(LicenseState::NoLicense);
            }
        }
        self.last_error = Some(err);
    }

    fn clear(&mut self, state: LicenseState) {
        self.key = None;
        self.status = None;
        self.premium = None;
        self.fallback = LicenseState::NoLicense;
        self.state = state;
    }

    /// Forget the key and everything derived from it
    pub fn logout(&mut self) {
        self.generation += 1;
        self.clear(LicenseState::NoLicense);
        self.last_error = None;
        info!("License cleared");
    }
}
