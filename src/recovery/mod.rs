//! Recovery strategy dispatch and fallback actions.

pub mod store;
pub mod strategies;

pub use store::{FileStateStore, MemoryStateStore, StateStore, StorageArea};
pub use strategies::{
    NetworkProbeRecovery, OAuthStateRecovery, ProviderUnavailableRecovery, RateLimitRecovery,
    SessionCleanupRecovery, SessionRefreshRecovery,
};

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use strum::Display;

use crate::classify::{ErrorContext, StructuredError};
use crate::error::{ErrorKind, ReloginError};

/// What the caller should do next when recovery isn't possible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FallbackActionType {
    Retry,
    SwitchMethod,
    Wait,
    RefreshPage,
    ContactSupport,
    Skip,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackPayload {
    /// Provider to leave out when offering alternatives.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_provider: Option<String>,
    #[serde(default)]
    pub clear_storage: bool,
    #[serde(default)]
    pub reload: bool,
}

/// A suggested next step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackAction {
    pub action_type: FallbackActionType,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "duration_ms")]
    pub delay: Option<Duration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<FallbackPayload>,
}

impl FallbackAction {
    pub fn new(action_type: FallbackActionType, message: impl Into<String>) -> Self {
        Self {
            action_type,
            message: message.into(),
            delay: None,
            payload: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_payload(mut self, payload: FallbackPayload) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Suggest another sign-in method, leaving out `provider` if known.
    pub fn switch_method(message: impl Into<String>, provider: Option<&str>) -> Self {
        let action = Self::new(FallbackActionType::SwitchMethod, message);
        match provider {
            Some(provider) => action.with_payload(FallbackPayload {
                exclude_provider: Some(provider.to_string()),
                ..FallbackPayload::default()
            }),
            None => action,
        }
    }

    pub fn contact_support(message: impl Into<String>) -> Self {
        Self::new(FallbackActionType::ContactSupport, message)
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(delay) => serializer.serialize_u64(delay.as_millis() as u64),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}

/// Default rate-limit wait when the error carries no hint.
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// A recovery procedure for one or more error kinds.
#[async_trait]
pub trait RecoveryStrategy: Send + Sync {
    /// Cheap eligibility check.
    fn can_recover(&self, error: &StructuredError) -> bool;

    /// Attempt recovery; `Ok(true)` means the caller may try again.
    async fn recover(
        &self,
        error: &StructuredError,
        context: &ErrorContext,
    ) -> Result<bool, ReloginError>;

    fn fallback_action(&self, error: &StructuredError) -> FallbackAction {
        default_fallback_action(error)
    }
}

/// Routes errors to the strategy registered for their kind.
pub struct RecoveryDispatcher {
    strategies: HashMap<ErrorKind, Arc<dyn RecoveryStrategy>>,
    enabled: bool,
}

impl std::fmt::Debug for RecoveryDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<String> = self.strategies.keys().map(ToString::to_string).collect();
        kinds.sort();
        f.debug_struct("RecoveryDispatcher")
            .field("strategies", &kinds)
            .field("enabled", &self.enabled)
            .finish()
    }
}

impl Default for RecoveryDispatcher {
    fn default() -> Self {
        Self::new(true)
    }
}

impl RecoveryDispatcher {
    /// An empty dispatcher. With `enabled == false`, recovery is never attempted.
    pub fn new(enabled: bool) -> Self {
        Self {
            strategies: HashMap::new(),
            enabled,
        }
    }

    /// A dispatcher with the built-in strategy for every recoverable kind.
    pub fn with_defaults(
        enabled: bool,
        client: reqwest::Client,
        health_url: impl Into<String>,
        session_url: impl Into<String>,
        store: Arc<dyn StateStore>,
    ) -> Self {
        let network: Arc<dyn RecoveryStrategy> =
            Arc::new(NetworkProbeRecovery::new(client.clone(), health_url));
        let rate_limit: Arc<dyn RecoveryStrategy> = Arc::new(RateLimitRecovery);

        let mut dispatcher = Self::new(enabled);
        dispatcher.register_shared(ErrorKind::NetworkError, network.clone());
        dispatcher.register_shared(ErrorKind::TimeoutError, network.clone());
        dispatcher.register_shared(ErrorKind::ConnectionError, network);
        dispatcher.register(ErrorKind::OauthError, OAuthStateRecovery::new(store.clone()));
        dispatcher.register(ErrorKind::SessionExpired, SessionCleanupRecovery::new(store));
        dispatcher.register_shared(ErrorKind::RateLimited, rate_limit.clone());
        dispatcher.register_shared(ErrorKind::TooManyRequests, rate_limit);
        dispatcher.register(ErrorKind::ProviderUnavailable, ProviderUnavailableRecovery);
        dispatcher.register(
            ErrorKind::TokenRefreshFailed,
            SessionRefreshRecovery::new(client, session_url),
        );
        dispatcher
    }

    pub fn register(&mut self, kind: ErrorKind, strategy: impl RecoveryStrategy + 'static) {
        self.strategies.insert(kind, Arc::new(strategy));
    }

    pub fn register_shared(&mut self, kind: ErrorKind, strategy: Arc<dyn RecoveryStrategy>) {
        self.strategies.insert(kind, strategy);
    }

    pub fn has_strategy(&self, kind: ErrorKind) -> bool {
        self.strategies.contains_key(&kind)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Try to recover from `error`.
    ///
    /// Never fails: a missing strategy, a failed eligibility check, an `Err`
    /// or a panic inside the strategy all yield `false`.
    pub async fn attempt_recovery(
        &self,
        error: &StructuredError,
        context: Option<&ErrorContext>,
    ) -> bool {
        if !self.enabled {
            return false;
        }
        let Some(strategy) = self.strategies.get(&error.kind()) else {
            return false;
        };
        if !strategy.can_recover(error) {
            tracing::debug!(kind = %error.kind(), "strategy declined recovery");
            return false;
        }

        let context = context.unwrap_or(&error.context);
        let outcome = AssertUnwindSafe(strategy.recover(error, context))
            .catch_unwind()
            .await;
        match outcome {
            Ok(Ok(recovered)) => {
                tracing::debug!(kind = %error.kind(), recovered, "recovery attempt finished");
                recovered
            }
            Ok(Err(e)) => {
                tracing::warn!(kind = %error.kind(), error = %e, "recovery attempt failed");
                false
            }
            Err(_) => {
                tracing::warn!(kind = %error.kind(), "recovery strategy panicked");
                false
            }
        }
    }

    /// Next step to offer for `error`: the registered strategy's, else the default.
    pub fn fallback_action(&self, error: &StructuredError) -> FallbackAction {
        match self.strategies.get(&error.kind()) {
            Some(strategy) => strategy.fallback_action(error),
            None => default_fallback_action(error),
        }
    }
}

/// Per-kind default fallback.
pub fn default_fallback_action(error: &StructuredError) -> FallbackAction {
    let provider = error.provider();
    match error.kind() {
        ErrorKind::NetworkError | ErrorKind::TimeoutError | ErrorKind::ConnectionError => {
            FallbackAction::new(
                FallbackActionType::Retry,
                "Connection problem. We'll try again in a moment.",
            )
            .with_delay(Duration::from_secs(2))
        }

        ErrorKind::OauthError
        | ErrorKind::OauthCancelled
        | ErrorKind::OauthAccessDenied
        | ErrorKind::OauthInvalidRequest
        | ErrorKind::OauthInvalidGrant
        | ErrorKind::OauthInvalidScope => FallbackAction::switch_method(
            "Try signing in with a different method.",
            provider,
        ),

        ErrorKind::OauthInvalidClient
        | ErrorKind::OauthUnauthorizedClient
        | ErrorKind::ConfigurationError
        | ErrorKind::MissingCredentials
        | ErrorKind::InvalidCallbackUrl
        | ErrorKind::AccountLocked => {
            FallbackAction::contact_support("Please contact support so we can fix this for you.")
        }

        ErrorKind::OauthUnsupportedGrantType => FallbackAction::switch_method(
            "This sign-in method isn't supported. Please choose another one.",
            provider,
        ),

        ErrorKind::SessionExpired | ErrorKind::SessionInvalid | ErrorKind::TokenRefreshFailed => {
            FallbackAction::new(
                FallbackActionType::RefreshPage,
                "Please refresh the page and sign in again.",
            )
            .with_payload(FallbackPayload {
                exclude_provider: None,
                clear_storage: true,
                reload: true,
            })
        }

        ErrorKind::RateLimited | ErrorKind::TooManyRequests => {
            let secs = error
                .retry_after_seconds
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
            FallbackAction::new(
                FallbackActionType::Wait,
                format!("Too many attempts. Please wait {secs} seconds before trying again."),
            )
            .with_delay(Duration::from_secs(secs))
        }

        ErrorKind::ProviderError | ErrorKind::ProviderUnavailable => FallbackAction::switch_method(
            "This sign-in provider is having trouble. Please try a different method.",
            provider,
        ),

        ErrorKind::ProviderMaintenance => FallbackAction::new(
            FallbackActionType::Wait,
            "The sign-in provider is under maintenance. Please try again later.",
        )
        .with_delay(Duration::from_secs(300)),

        ErrorKind::InvalidCredentials => FallbackAction::new(
            FallbackActionType::Retry,
            "Check your credentials and try again.",
        ),

        ErrorKind::TrialExhausted | ErrorKind::AccessDenied | ErrorKind::FeatureUnavailable => {
            FallbackAction::new(FallbackActionType::Skip, error.kind().user_message())
        }

        ErrorKind::UnknownError | ErrorKind::InternalError => FallbackAction::new(
            FallbackActionType::Retry,
            "Something went wrong. Please try again.",
        )
        .with_delay(Duration::from_secs(1)),
    }
}
