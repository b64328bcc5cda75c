//! Authentication error taxonomy.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

/// Classified kind of an authentication failure.
///
/// Retryability and severity are fixed per kind; see [`ErrorKind::is_retryable`]
/// and [`ErrorKind::severity`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    // Connectivity
    NetworkError,
    TimeoutError,
    ConnectionError,

    // OAuth
    OauthError,
    OauthCancelled,
    OauthAccessDenied,
    OauthInvalidRequest,
    OauthInvalidClient,
    OauthInvalidGrant,
    OauthUnauthorizedClient,
    OauthUnsupportedGrantType,
    OauthInvalidScope,

    // Session
    SessionExpired,
    SessionInvalid,
    TokenRefreshFailed,

    // Credentials / throttling
    InvalidCredentials,
    RateLimited,
    TooManyRequests,
    AccountLocked,

    // Provider
    ProviderError,
    ProviderUnavailable,
    ProviderMaintenance,

    // Access
    TrialExhausted,
    AccessDenied,
    FeatureUnavailable,

    // Configuration
    ConfigurationError,
    MissingCredentials,
    InvalidCallbackUrl,

    // Catch-all
    UnknownError,
    InternalError,
}

/// Severity ranking used by the pattern detector and presentation table.
///
/// Ordered: `Low < Medium < High < Critical`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Severity {
    Low = 1,
    Medium = 2,
    High = 3,
    Critical = 4,
}

impl Severity {
    /// Numeric rank, 1 (low) to 4 (critical).
    pub fn rank(self) -> u8 {
        self as u8
    }
}

impl ErrorKind {
    /// Whether errors of this kind may be retried.
    pub fn is_retryable(self) -> bool {
        !matches!(
            self,
            Self::OauthInvalidClient
                | Self::OauthUnauthorizedClient
                | Self::OauthUnsupportedGrantType
                | Self::SessionExpired
                | Self::SessionInvalid
                | Self::InvalidCredentials
                | Self::AccountLocked
                | Self::TrialExhausted
                | Self::AccessDenied
                | Self::FeatureUnavailable
                | Self::ConfigurationError
                | Self::MissingCredentials
                | Self::InvalidCallbackUrl
        )
    }

    pub fn severity(self) -> Severity {
        match self {
            Self::OauthCancelled
            | Self::SessionExpired
            | Self::RateLimited
            | Self::TooManyRequests
            | Self::TrialExhausted => Severity::Low,

            Self::NetworkError
            | Self::TimeoutError
            | Self::ConnectionError
            | Self::OauthError
            | Self::OauthAccessDenied
            | Self::OauthInvalidRequest
            | Self::OauthInvalidGrant
            | Self::OauthInvalidScope
            | Self::SessionInvalid
            | Self::TokenRefreshFailed
            | Self::InvalidCredentials
            | Self::ProviderError
            | Self::ProviderMaintenance
            | Self::AccessDenied
            | Self::FeatureUnavailable
            | Self::UnknownError => Severity::Medium,

            Self::OauthInvalidClient
            | Self::OauthUnauthorizedClient
            | Self::OauthUnsupportedGrantType
            | Self::AccountLocked
            | Self::ProviderUnavailable
            | Self::InternalError => Severity::High,

            Self::ConfigurationError | Self::MissingCredentials | Self::InvalidCallbackUrl => {
                Severity::Critical
            }
        }
    }

    /// Pre-written, user-safe message for this kind.
    pub fn user_message(self) -> &'static str {
        match self {
            Self::NetworkError => {
                "Unable to connect. Please check your internet connection and try again."
            }
            Self::TimeoutError => "The request took too long. Please try again.",
            Self::ConnectionError => "Connection was interrupted. Please try again.",
            Self::OauthError => "Login failed. Please try again or use a different method.",
            Self::OauthCancelled => "Sign-in was cancelled. You can try again whenever you're ready.",
            Self::OauthAccessDenied => {
                "Access was denied. Please try again and grant the necessary permissions."
            }
            Self::OauthInvalidRequest => "The sign-in request was invalid. Please try again.",
            Self::OauthInvalidClient => {
                "This sign-in method is misconfigured. Please contact support."
            }
            Self::OauthInvalidGrant => {
                "Your sign-in link has expired or was already used. Please try again."
            }
            Self::OauthUnauthorizedClient => {
                "This application is not authorized for this sign-in method. Please contact support."
            }
            Self::OauthUnsupportedGrantType => {
                "This sign-in method is not supported. Please use a different method."
            }
            Self::OauthInvalidScope => {
                "The requested permissions are not available. Please try again."
            }
            Self::SessionExpired => "Your session has expired. Please sign in again.",
            Self::SessionInvalid => "Your session is no longer valid. Please sign in again.",
            Self::TokenRefreshFailed => "We couldn't refresh your session. Please try again.",
            Self::InvalidCredentials => {
                "The credentials you entered are incorrect. Please check them and try again."
            }
            Self::RateLimited => "Too many attempts. Please wait a moment before trying again.",
            Self::TooManyRequests => "Too many requests. Please slow down and try again shortly.",
            Self::AccountLocked => "Your account has been locked. Please contact support.",
            Self::ProviderError => {
                "The sign-in provider returned an error. Please try again or use a different method."
            }
            Self::ProviderUnavailable => {
                "The sign-in provider is currently unavailable. Please try a different method."
            }
            Self::ProviderMaintenance => {
                "The sign-in provider is under maintenance. Please try again later."
            }
            Self::TrialExhausted => "Your free trial has ended. Sign in to keep going.",
            Self::AccessDenied => "You don't have permission to access this resource.",
            Self::FeatureUnavailable => "This feature isn't available on your current plan.",
            Self::ConfigurationError => {
                "Sign-in is temporarily unavailable due to a configuration problem. Please contact support."
            }
            Self::MissingCredentials => {
                "Sign-in is not fully set up yet. Please contact support."
            }
            Self::InvalidCallbackUrl => {
                "The sign-in redirect is misconfigured. Please contact support."
            }
            Self::UnknownError => "Something went wrong. Please try again.",
            Self::InternalError => "An unexpected error occurred on our side. Please try again.",
        }
    }

    /// Every kind whose [`is_retryable`](Self::is_retryable) is true.
    pub fn retryable_kinds() -> HashSet<ErrorKind> {
        Self::iter().filter(|kind| kind.is_retryable()).collect()
    }
}
