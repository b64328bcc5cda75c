//! Raw, unclassified error inputs.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// OAuth 2.0 error response payload (RFC 6749 §5.2).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthErrorPayload {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_uri: Option<String>,
}

/// Anything the normalizer can be handed.
///
/// Most callers go through one of the `From` conversions:
/// `&str`/`String` become [`RawError::Text`], `serde_json::Value` becomes
/// [`RawError::Json`], and `reqwest::Error` is mapped by its nature.
#[derive(Debug)]
pub enum RawError {
    /// A bare message.
    Text(String),
    /// A generic error object with a name, message and optional code.
    Exception {
        name: Option<String>,
        message: String,
        code: Option<String>,
    },
    /// An OAuth error response.
    OAuth(OAuthErrorPayload),
    /// An HTTP status failure.
    Status {
        status: u16,
        message: String,
        retry_after_seconds: Option<u64>,
    },
    /// An arbitrary JSON object.
    Json(serde_json::Value),
    /// Any other Rust error; only its display text is inspected.
    Source(Box<dyn StdError + Send + Sync>),
}

impl RawError {
    pub fn exception(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Exception {
            name: Some(name.into()),
            message: message.into(),
            code: None,
        }
    }

    pub fn oauth(error: impl Into<String>, description: Option<&str>) -> Self {
        Self::OAuth(OAuthErrorPayload {
            error: error.into(),
            error_description: description.map(String::from),
            error_uri: None,
        })
    }

    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
            retry_after_seconds: None,
        }
    }

    /// The developer-facing description of this input.
    pub(crate) fn describe(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Exception { name, message, .. } => match name {
                Some(name) if !message.is_empty() => format!("{name}: {message}"),
                Some(name) => name.clone(),
                None => message.clone(),
            },
            Self::OAuth(payload) => match &payload.error_description {
                Some(description) => format!("{}: {description}", payload.error),
                None => payload.error.clone(),
            },
            Self::Status {
                status, message, ..
            } => format!("HTTP {status}: {message}"),
            Self::Json(value) => value
                .get("message")
                .and_then(|m| m.as_str())
                .map(String::from)
                .unwrap_or_else(|| value.to_string()),
            Self::Source(source) => source.to_string(),
        }
    }

    /// Split into the debugging payload kept on the structured error.
    pub(crate) fn into_details(self) -> Option<ErrorDetails> {
        match self {
            Self::Text(_) => None,
            Self::Exception {
                name,
                message,
                code,
            } => Some(ErrorDetails::Payload(serde_json::json!({
                "name": name,
                "message": message,
                "code": code,
            }))),
            Self::OAuth(payload) => serde_json::to_value(payload).ok().map(ErrorDetails::Payload),
            Self::Status {
                status,
                message,
                retry_after_seconds,
            } => Some(ErrorDetails::Payload(serde_json::json!({
                "status": status,
                "message": message,
                "retry_after": retry_after_seconds,
            }))),
            Self::Json(value) => Some(ErrorDetails::Payload(value)),
            Self::Source(source) => Some(ErrorDetails::Source(Arc::from(source))),
        }
    }
}

impl From<&str> for RawError {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for RawError {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<serde_json::Value> for RawError {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(text) => Self::Text(text),
            other => Self::Json(other),
        }
    }
}

impl From<OAuthErrorPayload> for RawError {
    fn from(value: OAuthErrorPayload) -> Self {
        Self::OAuth(value)
    }
}

impl From<Box<dyn StdError + Send + Sync>> for RawError {
    fn from(value: Box<dyn StdError + Send + Sync>) -> Self {
        Self::Source(value)
    }
}

impl From<std::io::Error> for RawError {
    fn from(value: std::io::Error) -> Self {
        use std::io::ErrorKind as Io;
        match value.kind() {
            Io::TimedOut => Self::Exception {
                name: Some("TimeoutError".to_string()),
                message: value.to_string(),
                code: None,
            },
            Io::ConnectionRefused
            | Io::ConnectionReset
            | Io::ConnectionAborted
            | Io::NotConnected => Self::Exception {
                name: Some("NetworkError".to_string()),
                message: value.to_string(),
                code: Some("NETWORK_ERROR".to_string()),
            },
            _ => Self::Source(Box::new(value)),
        }
    }
}

impl From<reqwest::Error> for RawError {
    fn from(value: reqwest::Error) -> Self {
        if let Some(status) = value.status() {
            return Self::Status {
                status: status.as_u16(),
                message: value.to_string(),
                retry_after_seconds: None,
            };
        }
        if value.is_timeout() {
            return Self::Exception {
                name: Some("TimeoutError".to_string()),
                message: value.to_string(),
                code: None,
            };
        }
        if value.is_connect() || value.is_request() {
            return Self::Exception {
                name: Some("NetworkError".to_string()),
                message: value.to_string(),
                code: Some("NETWORK_ERROR".to_string()),
            };
        }
        Self::Source(Box::new(value))
    }
}

/// Original input retained on a [`StructuredError`](super::StructuredError).
///
/// For logs and analytics only; never render this to end users.
#[derive(Clone)]
pub enum ErrorDetails {
    Payload(serde_json::Value),
    Source(Arc<dyn StdError + Send + Sync>),
}

impl fmt::Debug for ErrorDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Payload(value) => f.debug_tuple("Payload").field(value).finish(),
            Self::Source(source) => f.debug_tuple("Source").field(&source.to_string()).finish(),
        }
    }
}
