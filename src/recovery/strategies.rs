//! Built-in recovery strategies.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;

use super::store::{StateStore, StorageArea};
use super::{FallbackAction, FallbackActionType, FallbackPayload, RecoveryStrategy};
use crate::classify::{ErrorContext, StructuredError};
use crate::error::{ErrorKind, ReloginError};

pub const OAUTH_STATE_KEY: &str = "oauth_state";
pub const SESSION_TOKEN_KEY: &str = "next-auth.session-token";
pub const CSRF_TOKEN_KEY: &str = "next-auth.csrf-token";

/// Cookie names cleared on session cleanup.
const AUTH_COOKIE_PATTERN: &str = "(?i)auth|session";

static AUTH_COOKIE_REGEX: OnceLock<Option<Regex>> = OnceLock::new();

fn auth_cookie_pattern() -> Option<&'static Regex> {
    AUTH_COOKIE_REGEX
        .get_or_init(|| Regex::new(AUTH_COOKIE_PATTERN).ok())
        .as_ref()
}

/// Probes a health endpoint; any response at all counts as reachable.
#[derive(Debug, Clone)]
pub struct NetworkProbeRecovery {
    client: reqwest::Client,
    health_url: String,
}

impl NetworkProbeRecovery {
    pub fn new(client: reqwest::Client, health_url: impl Into<String>) -> Self {
        Self {
            client,
            health_url: health_url.into(),
        }
    }
}

#[async_trait]
impl RecoveryStrategy for NetworkProbeRecovery {
    fn can_recover(&self, _error: &StructuredError) -> bool {
        true
    }

    async fn recover(
        &self,
        _error: &StructuredError,
        _context: &ErrorContext,
    ) -> Result<bool, ReloginError> {
        let response = self.client.head(&self.health_url).send().await?;
        tracing::debug!(status = response.status().as_u16(), url = %self.health_url, "health probe answered");
        Ok(true)
    }
}

/// Drops cached OAuth state from local and session storage.
pub struct OAuthStateRecovery {
    store: Arc<dyn StateStore>,
}

impl OAuthStateRecovery {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl RecoveryStrategy for OAuthStateRecovery {
    fn can_recover(&self, error: &StructuredError) -> bool {
        error.kind() == ErrorKind::OauthError
    }

    async fn recover(
        &self,
        _error: &StructuredError,
        _context: &ErrorContext,
    ) -> Result<bool, ReloginError> {
        for area in [StorageArea::Local, StorageArea::Session] {
            if let Err(e) = self.store.remove(area, OAUTH_STATE_KEY) {
                tracing::warn!(area = %area, error = %e, "failed to clear cached oauth state");
            }
        }
        Ok(true)
    }

    fn fallback_action(&self, error: &StructuredError) -> FallbackAction {
        FallbackAction::switch_method(
            "Login failed. Try again or use a different sign-in method.",
            error.provider(),
        )
    }
}

/// Clears session tokens and auth cookies so the next sign-in starts clean.
///
/// Success here does not mean the session is usable again; the fallback still
/// asks for a refresh.
pub struct SessionCleanupRecovery {
    store: Arc<dyn StateStore>,
}

impl SessionCleanupRecovery {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    /// Attempt every removal; returns how many failed.
    fn clear(&self) -> usize {
        let mut failures = 0;
        for area in [StorageArea::Local, StorageArea::Session] {
            for key in [SESSION_TOKEN_KEY, CSRF_TOKEN_KEY] {
                if let Err(e) = self.store.remove(area, key) {
                    tracing::warn!(area = %area, key, error = %e, "failed to clear session state");
                    failures += 1;
                }
            }
        }

        let Some(pattern) = auth_cookie_pattern() else {
            tracing::warn!(pattern = AUTH_COOKIE_PATTERN, "invalid auth cookie pattern");
            return failures + 1;
        };
        let cookies = match self.store.keys(StorageArea::Cookie) {
            Ok(cookies) => cookies,
            Err(e) => {
                tracing::warn!(error = %e, "failed to list cookies");
                return failures + 1;
            }
        };
        let mut removed = 0;
        for name in cookies.iter().filter(|name| pattern.is_match(name)) {
            match self.store.remove(StorageArea::Cookie, name) {
                Ok(()) => removed += 1,
                Err(e) => {
                    tracing::warn!(cookie = %name, error = %e, "failed to clear auth cookie");
                    failures += 1;
                }
            }
        }
        tracing::debug!(removed, "cleared auth cookies");
        failures
    }
}

#[async_trait]
impl RecoveryStrategy for SessionCleanupRecovery {
    fn can_recover(&self, _error: &StructuredError) -> bool {
        true
    }

    async fn recover(
        &self,
        _error: &StructuredError,
        _context: &ErrorContext,
    ) -> Result<bool, ReloginError> {
        let failures = self.clear();
        if failures > 0 {
            tracing::warn!(failures, "session cleanup incomplete");
        }
        Ok(true)
    }

    fn fallback_action(&self, _error: &StructuredError) -> FallbackAction {
        FallbackAction::new(
            FallbackActionType::RefreshPage,
            "Your session has expired. Refresh the page to sign in again.",
        )
        .with_payload(FallbackPayload {
            exclude_provider: None,
            clear_storage: true,
            reload: true,
        })
    }
}

/// Waits out the rate-limit window, then reports success.
#[derive(Debug, Clone, Copy, Default)]
pub struct RateLimitRecovery;

#[async_trait]
impl RecoveryStrategy for RateLimitRecovery {
    fn can_recover(&self, _error: &StructuredError) -> bool {
        true
    }

    async fn recover(
        &self,
        error: &StructuredError,
        _context: &ErrorContext,
    ) -> Result<bool, ReloginError> {
        let secs = error
            .retry_after_seconds
            .unwrap_or(super::DEFAULT_RETRY_AFTER_SECS);
        tracing::debug!(wait_secs = secs, "waiting out rate limit");
        tokio::time::sleep(Duration::from_secs(secs)).await;
        Ok(true)
    }
}

/// The provider is down; nothing to do locally but suggest another method.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProviderUnavailableRecovery;

#[async_trait]
impl RecoveryStrategy for ProviderUnavailableRecovery {
    fn can_recover(&self, _error: &StructuredError) -> bool {
        false
    }

    async fn recover(
        &self,
        _error: &StructuredError,
        _context: &ErrorContext,
    ) -> Result<bool, ReloginError> {
        Ok(false)
    }

    fn fallback_action(&self, error: &StructuredError) -> FallbackAction {
        FallbackAction::switch_method(
            "This sign-in provider is unavailable right now. Please try a different method.",
            error.provider(),
        )
    }
}

/// Silent refresh through the session endpoint; a 2xx means the session is back.
#[derive(Debug, Clone)]
pub struct SessionRefreshRecovery {
    client: reqwest::Client,
    session_url: String,
}

impl SessionRefreshRecovery {
    pub fn new(client: reqwest::Client, session_url: impl Into<String>) -> Self {
        Self {
            client,
            session_url: session_url.into(),
        }
    }
}

#[async_trait]
impl RecoveryStrategy for SessionRefreshRecovery {
    fn can_recover(&self, _error: &StructuredError) -> bool {
        true
    }

    async fn recover(
        &self,
        _error: &StructuredError,
        _context: &ErrorContext,
    ) -> Result<bool, ReloginError> {
        let response = self.client.get(&self.session_url).send().await?;
        let ok = response.status().is_success();
        if !ok {
            tracing::debug!(status = response.status().as_u16(), "session refresh rejected");
        }
        Ok(ok)
    }
}
