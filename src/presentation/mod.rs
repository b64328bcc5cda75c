//! Static mapping from error kind to UI presentation hints.

use std::time::Duration;

use serde::Serialize;

use crate::error::{ErrorKind, Severity};

/// How a UI should surface an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Presentation {
    pub severity: Severity,
    pub show_modal: bool,
    pub show_toast: bool,
    pub show_inline: bool,
    pub auto_hide: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hide_after: Option<Duration>,
}

const fn toast(severity: Severity, hide_after_ms: u64) -> Presentation {
    Presentation {
        severity,
        show_modal: false,
        show_toast: true,
        show_inline: false,
        auto_hide: true,
        hide_after: Some(Duration::from_millis(hide_after_ms)),
    }
}

const fn inline(severity: Severity) -> Presentation {
    Presentation {
        severity,
        show_modal: false,
        show_toast: false,
        show_inline: true,
        auto_hide: false,
        hide_after: None,
    }
}

const fn modal(severity: Severity) -> Presentation {
    Presentation {
        severity,
        show_modal: true,
        show_toast: false,
        show_inline: false,
        auto_hide: false,
        hide_after: None,
    }
}

/// Presentation hints for `kind`.
pub const fn presentation_for(kind: ErrorKind) -> Presentation {
    match kind {
        ErrorKind::NetworkError | ErrorKind::ConnectionError => toast(Severity::Medium, 5000),
        ErrorKind::TimeoutError => toast(Severity::Medium, 4000),
        ErrorKind::OauthCancelled => toast(Severity::Low, 3000),
        ErrorKind::RateLimited | ErrorKind::TooManyRequests => toast(Severity::Low, 6000),
        ErrorKind::ProviderMaintenance => toast(Severity::Medium, 8000),

        ErrorKind::OauthError
        | ErrorKind::OauthAccessDenied
        | ErrorKind::OauthInvalidRequest
        | ErrorKind::OauthInvalidGrant
        | ErrorKind::OauthInvalidScope
        | ErrorKind::InvalidCredentials
        | ErrorKind::ProviderError => inline(Severity::Medium),
        ErrorKind::ProviderUnavailable => inline(Severity::High),
        ErrorKind::AccessDenied | ErrorKind::FeatureUnavailable => inline(Severity::Medium),

        ErrorKind::SessionExpired => modal(Severity::Low),
        ErrorKind::SessionInvalid | ErrorKind::TokenRefreshFailed => modal(Severity::Medium),
        ErrorKind::TrialExhausted => modal(Severity::Low),
        ErrorKind::OauthInvalidClient
        | ErrorKind::OauthUnauthorizedClient
        | ErrorKind::OauthUnsupportedGrantType
        | ErrorKind::AccountLocked
        | ErrorKind::InternalError => modal(Severity::High),
        ErrorKind::ConfigurationError
        | ErrorKind::MissingCredentials
        | ErrorKind::InvalidCallbackUrl => modal(Severity::Critical),

        ErrorKind::UnknownError => Presentation {
            severity: Severity::Medium,
            show_modal: false,
            show_toast: true,
            show_inline: true,
            auto_hide: true,
            hide_after: Some(Duration::from_millis(5000)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn table_severity_agrees_with_taxonomy() {
        for kind in ErrorKind::iter() {
            assert_eq!(presentation_for(kind).severity, kind.severity(), "{kind}");
        }
    }

    #[test]
    fn auto_hidden_entries_have_a_timeout() {
        for kind in ErrorKind::iter() {
            let p = presentation_for(kind);
            assert_eq!(p.auto_hide, p.hide_after.is_some(), "{kind}");
        }
    }

    #[test]
    fn critical_errors_block_with_a_modal() {
        let p = presentation_for(ErrorKind::ConfigurationError);
        assert!(p.show_modal);
        assert!(!p.auto_hide);
    }

    #[test]
    fn unknown_error_has_a_default_entry() {
        let p = presentation_for(ErrorKind::UnknownError);
        assert!(p.show_toast);
        assert_eq!(p.hide_after, Some(Duration::from_millis(5000)));
    }
}
