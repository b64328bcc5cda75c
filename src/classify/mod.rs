//! Error normalizer: turns heterogeneous failures into a [`StructuredError`].
//!
//! Classification never fails. Inputs are inspected in a fixed priority
//! order (message text first, then OAuth error codes, then network markers)
//! and anything unrecognized becomes [`ErrorKind::UnknownError`].

pub mod context;
pub mod raw;

pub use context::{ContextValue, ErrorContext};
pub use raw::{ErrorDetails, OAuthErrorPayload, RawError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{ErrorKind, Severity};

/// The canonical classified error record.
///
/// `kind` and `retryable` are fixed at construction; retryability is always
/// `kind.is_retryable()`.
#[derive(Debug, Clone, Serialize)]
pub struct StructuredError {
    pub id: Uuid,
    kind: ErrorKind,
    pub raw_message: String,
    pub user_message: String,
    retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_seconds: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub context: ErrorContext,
    #[serde(skip)]
    pub details: Option<ErrorDetails>,
}

impl StructuredError {
    /// Build a record of the given kind with the kind's default user message.
    pub fn new(kind: ErrorKind, raw_message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            raw_message: raw_message.into(),
            user_message: kind.user_message().to_string(),
            retryable: kind.is_retryable(),
            retry_after_seconds: None,
            created_at: Utc::now(),
            context: ErrorContext::default(),
            details: None,
        }
    }

    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = context;
        self
    }

    pub fn with_retry_after(mut self, seconds: u64) -> Self {
        self.retry_after_seconds = Some(seconds);
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    pub fn severity(&self) -> Severity {
        self.kind.severity()
    }

    /// Provider named in the context, if any.
    pub fn provider(&self) -> Option<&str> {
        self.context.provider()
    }
}

impl std::fmt::Display for StructuredError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.raw_message)
    }
}

/// Classify a raw failure.
///
/// # Example
/// ```
/// use relogin::classify::{classify, ErrorContext};
/// use relogin::error::ErrorKind;
///
/// let err = classify("oauth error occurred", ErrorContext::default());
/// assert_eq!(err.kind(), ErrorKind::OauthError);
/// assert!(err.is_retryable());
/// ```
pub fn classify(raw: impl Into<RawError>, context: ErrorContext) -> StructuredError {
    let raw = raw.into();
    let probe = Probe::from_raw(&raw);
    let kind = probe.kind();

    let mut error = StructuredError::new(kind, raw.describe()).with_context(context);
    error.retry_after_seconds = probe.retry_after_seconds;
    error.details = raw.into_details();

    tracing::debug!(kind = %kind, retryable = error.is_retryable(), "classified auth error");
    error
}

const NETWORK_MARKER_CODE: &str = "NETWORK_ERROR";
const NETWORK_MARKER_NAME: &str = "NetworkError";

/// Normalized view of the fields classification looks at.
#[derive(Debug, Default)]
struct Probe {
    text: Option<String>,
    name: Option<String>,
    code: Option<String>,
    oauth_code: Option<String>,
    status: Option<u16>,
    /// `status` field of a loose JSON object; consulted after every other probe.
    hinted_status: Option<u16>,
    retry_after_seconds: Option<u64>,
}

impl Probe {
    fn from_raw(raw: &RawError) -> Self {
        match raw {
            RawError::Text(text) => Self {
                text: Some(text.to_lowercase()),
                ..Self::default()
            },
            RawError::Exception {
                name,
                message,
                code,
            } => Self {
                text: Some(message.to_lowercase()),
                name: name.clone(),
                code: code.clone(),
                ..Self::default()
            },
            RawError::OAuth(payload) => Self {
                oauth_code: Some(payload.error.clone()),
                ..Self::default()
            },
            RawError::Status {
                status,
                message,
                retry_after_seconds,
            } => Self {
                text: Some(message.to_lowercase()),
                status: Some(*status),
                retry_after_seconds: *retry_after_seconds,
                ..Self::default()
            },
            RawError::Json(value) => {
                let field = |key: &str| value.get(key).and_then(|v| v.as_str()).map(String::from);
                Self {
                    text: field("message")
                        .or_else(|| value.as_str().map(String::from))
                        .map(|m| m.to_lowercase()),
                    name: field("name"),
                    code: field("code"),
                    oauth_code: field("error"),
                    status: None,
                    hinted_status: value
                        .get("status")
                        .and_then(|v| v.as_u64())
                        .and_then(|s| u16::try_from(s).ok()),
                    retry_after_seconds: value
                        .get("retry_after")
                        .or_else(|| value.get("retryAfter"))
                        .and_then(|v| v.as_u64()),
                }
            }
            RawError::Source(source) => Self {
                text: Some(source.to_string().to_lowercase()),
                ..Self::default()
            },
        }
    }

    fn kind(&self) -> ErrorKind {
        if let Some(kind) = self.status.and_then(kind_for_status) {
            return kind;
        }

        if let Some(text) = &self.text {
            if text.contains("oauth") {
                return ErrorKind::OauthError;
            }
            if text.contains("network") || text.contains("fetch") {
                return ErrorKind::NetworkError;
            }
            if text.contains("session") || text.contains("expired") {
                return ErrorKind::SessionExpired;
            }
        }

        let name_has_timeout = self
            .name
            .as_deref()
            .is_some_and(|n| n.to_lowercase().contains("timeout"));
        let text_has_timeout = self.text.as_deref().is_some_and(|t| t.contains("timeout"));
        if name_has_timeout || text_has_timeout {
            return ErrorKind::TimeoutError;
        }

        if let Some(kind) = self.oauth_code.as_deref().and_then(kind_for_oauth_code) {
            return kind;
        }

        if self.code.as_deref() == Some(NETWORK_MARKER_CODE)
            || self.name.as_deref() == Some(NETWORK_MARKER_NAME)
        {
            return ErrorKind::NetworkError;
        }

        if let Some(kind) = self.hinted_status.and_then(kind_for_status) {
            return kind;
        }

        ErrorKind::UnknownError
    }
}

/// Map an OAuth `error` code to its kind.
pub fn kind_for_oauth_code(code: &str) -> Option<ErrorKind> {
    let kind = match code {
        "access_denied" => ErrorKind::OauthAccessDenied,
        "invalid_request" => ErrorKind::OauthInvalidRequest,
        "invalid_client" => ErrorKind::OauthInvalidClient,
        "invalid_grant" => ErrorKind::OauthInvalidGrant,
        "unauthorized_client" => ErrorKind::OauthUnauthorizedClient,
        "unsupported_grant_type" => ErrorKind::OauthUnsupportedGrantType,
        "invalid_scope" => ErrorKind::OauthInvalidScope,
        "server_error" => ErrorKind::ProviderError,
        "temporarily_unavailable" => ErrorKind::ProviderUnavailable,
        _ => return None,
    };
    Some(kind)
}

/// Map an HTTP status to its kind; unmapped statuses fall through to text inspection.
pub fn kind_for_status(status: u16) -> Option<ErrorKind> {
    let kind = match status {
        401 => ErrorKind::SessionInvalid,
        403 => ErrorKind::AccessDenied,
        408 | 504 => ErrorKind::TimeoutError,
        429 => ErrorKind::RateLimited,
        500 => ErrorKind::InternalError,
        502 => ErrorKind::ProviderError,
        503 => ErrorKind::ProviderUnavailable,
        _ => return None,
    };
    Some(kind)
}
