//! `AuthErrorHandler`: one object wiring classification, retry, recovery,
//! pattern detection, presentation and analytics together.
//!
//! Construct one per application and share it (it is `Send + Sync`).
//!
//! # Example
//! ```no_run
//! use relogin::classify::ErrorContext;
//! use relogin::config::EngineConfig;
//! use relogin::handler::AuthErrorHandler;
//!
//! # async fn example() -> relogin::error::Result<()> {
//! let handler = AuthErrorHandler::new(EngineConfig::from_env()?)?;
//! let handled = handler.handle("oauth error occurred", ErrorContext::new().with_provider("google"));
//! println!("{}", handled.error.user_message);
//!
//! if !handler.should_retry(&handled.error, "signin:google")
//!     && handler.attempt_recovery(&handled.error, None).await
//! {
//!     println!("recovered; next step: {:?}", handled.fallback.action_type);
//! }
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::analytics::AnalyticsReporter;
use crate::classify::{classify, ErrorContext, RawError, StructuredError};
use crate::config::EngineConfig;
use crate::error::{ReloginError, Severity};
use crate::patterns::{ErrorPatternDetector, PatternReport};
use crate::presentation::{presentation_for, Presentation};
use crate::recovery::{
    FallbackAction, FileStateStore, MemoryStateStore, RecoveryDispatcher, StateStore,
};
use crate::retry::RetryCoordinator;
use crate::util::http::build_client;

/// Everything a caller needs to react to one failure.
#[derive(Debug, Clone, Serialize)]
pub struct HandledError {
    pub error: StructuredError,
    pub presentation: Presentation,
    pub fallback: FallbackAction,
    pub pattern: PatternReport,
}

pub struct AuthErrorHandler {
    config: EngineConfig,
    store: Arc<dyn StateStore>,
    retry: RetryCoordinator,
    recovery: RecoveryDispatcher,
    patterns: ErrorPatternDetector,
    analytics: Arc<AnalyticsReporter>,
}

impl std::fmt::Debug for AuthErrorHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthErrorHandler")
            .field("config", &self.config)
            .field("store", &"..")
            .field("retry", &self.retry)
            .field("recovery", &self.recovery)
            .field("analytics", &self.analytics)
            .finish()
    }
}

impl AuthErrorHandler {
    /// Build every component from `config`.
    ///
    /// Uses a file-backed state store when `config.state_dir` is set, and an
    /// in-memory one otherwise.
    pub fn new(config: EngineConfig) -> Result<Self, ReloginError> {
        let store: Arc<dyn StateStore> = match &config.state_dir {
            Some(dir) => Arc::new(FileStateStore::new(dir.clone())),
            None => Arc::new(MemoryStateStore::new()),
        };
        Self::with_state_store(config, store)
    }

    pub fn with_state_store(
        config: EngineConfig,
        store: Arc<dyn StateStore>,
    ) -> Result<Self, ReloginError> {
        config.validate()?;
        let client = build_client(config.request_timeout())?;

        let recovery = RecoveryDispatcher::with_defaults(
            config.enable_fallback,
            client.clone(),
            config.health_url()?,
            config.session_url()?,
            store.clone(),
        );
        let analytics = Arc::new(AnalyticsReporter::new(
            client,
            config.analytics_url()?,
            config.enable_analytics,
        ));

        Ok(Self {
            retry: RetryCoordinator::new(config.retry_config()),
            recovery,
            patterns: ErrorPatternDetector::new(),
            analytics,
            store,
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state_store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    pub fn retry_coordinator(&self) -> &RetryCoordinator {
        &self.retry
    }

    pub fn recovery(&self) -> &RecoveryDispatcher {
        &self.recovery
    }

    /// Mutable access, e.g. to register custom strategies.
    pub fn recovery_mut(&mut self) -> &mut RecoveryDispatcher {
        &mut self.recovery
    }

    pub fn patterns(&self) -> &ErrorPatternDetector {
        &self.patterns
    }

    pub fn analytics(&self) -> &Arc<AnalyticsReporter> {
        &self.analytics
    }

    /// Classify, log, record and report one failure, and pick the next step.
    ///
    /// A detected pattern's recommendation takes precedence over the per-kind
    /// fallback. Analytics is sent in the background when a runtime is available.
    pub fn handle(&self, raw: impl Into<RawError>, context: ErrorContext) -> HandledError {
        let error = classify(raw, context);
        log_error(&error);

        let provider = error.provider().map(String::from);
        self.patterns.record_error(&error, provider.as_deref());
        let pattern = self.patterns.detect_pattern(provider.as_deref());

        self.analytics.report_detached(error.clone());

        let fallback = pattern
            .recommendation
            .clone()
            .unwrap_or_else(|| self.recovery.fallback_action(&error));

        HandledError {
            presentation: presentation_for(error.kind()),
            error,
            fallback,
            pattern,
        }
    }

    pub fn should_retry(&self, error: &StructuredError, key: &str) -> bool {
        self.retry.should_retry(error, key)
    }

    pub fn reset_retry_attempts(&self, key: &str) {
        self.retry.reset_retry_attempts(key);
    }

    pub async fn execute_retry<F, Fut, T>(&self, key: &str, error: &StructuredError, operation: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        self.retry.execute_retry(key, error, operation).await
    }

    pub async fn execute_retry_with_cancel<F, Fut, T>(
        &self,
        key: &str,
        error: &StructuredError,
        cancel: &CancellationToken,
        operation: F,
    ) -> Result<T, ReloginError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        self.retry
            .execute_retry_with_cancel(key, error, cancel, operation)
            .await
    }

    pub async fn attempt_recovery(
        &self,
        error: &StructuredError,
        context: Option<&ErrorContext>,
    ) -> bool {
        self.recovery.attempt_recovery(error, context).await
    }

    pub fn fallback_action(&self, error: &StructuredError) -> FallbackAction {
        self.recovery.fallback_action(error)
    }

    pub fn detect_pattern(&self, provider: Option<&str>) -> PatternReport {
        self.patterns.detect_pattern(provider)
    }

    pub fn clear_history(&self, provider: Option<&str>) {
        self.patterns.clear_history(provider);
    }

    /// Await a report instead of firing it in the background.
    pub async fn report(&self, error: &StructuredError) {
        self.analytics.report(error).await;
    }
}

fn log_error(error: &StructuredError) {
    let provider = error.provider().unwrap_or("-");
    match error.severity() {
        Severity::Critical => tracing::error!(
            kind = %error.kind(),
            provider,
            error_id = %error.id,
            raw = %error.raw_message,
            "auth error"
        ),
        Severity::High => tracing::warn!(
            kind = %error.kind(),
            provider,
            error_id = %error.id,
            raw = %error.raw_message,
            "auth error"
        ),
        Severity::Medium | Severity::Low => tracing::info!(
            kind = %error.kind(),
            provider,
            error_id = %error.id,
            raw = %error.raw_message,
            "auth error"
        ),
    }
}
