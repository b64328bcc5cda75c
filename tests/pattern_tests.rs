//! Tests for failure pattern detection.

mod common;

use pretty_assertions::assert_eq;

use relogin::error::ErrorKind;
use relogin::patterns::{ErrorPatternDetector, PatternType};
use relogin::recovery::FallbackActionType;

use common::{err, err_for};

#[test]
fn fewer_than_three_errors_is_never_a_pattern() {
    let detector = ErrorPatternDetector::new();
    for _ in 0..2 {
        detector.record_error(&err(ErrorKind::NetworkError), Some("github"));
    }
    let report = detector.detect_pattern(Some("github"));
    assert!(!report.has_pattern);
    assert_eq!(report.pattern_type, None);
    assert_eq!(report.recommendation, None);
}

#[test]
fn three_identical_failures_suggest_switching_provider() {
    let detector = ErrorPatternDetector::new();
    for _ in 0..3 {
        detector.record_error(&err_for(ErrorKind::NetworkError, "github"), Some("github"));
    }

    let report = detector.detect_pattern(Some("github"));

    assert!(report.has_pattern);
    assert_eq!(report.pattern_type, Some(PatternType::RepeatedFailures));
    let action = report.recommendation.expect("recommendation");
    assert_eq!(action.action_type, FallbackActionType::SwitchMethod);
    assert_eq!(
        action.payload.and_then(|p| p.exclude_provider).as_deref(),
        Some("github")
    );
}

#[test]
fn only_the_latest_three_errors_count() {
    let detector = ErrorPatternDetector::new();
    for kind in [
        ErrorKind::ProviderUnavailable,
        ErrorKind::RateLimited,
        ErrorKind::RateLimited,
        ErrorKind::RateLimited,
    ] {
        detector.record_error(&err(kind), None);
    }
    assert_eq!(
        detector.detect_pattern(None).pattern_type,
        Some(PatternType::RepeatedFailures)
    );
}

#[test]
fn rising_severity_escalates_to_support() {
    let detector = ErrorPatternDetector::new();
    for kind in [
        ErrorKind::OauthCancelled,
        ErrorKind::NetworkError,
        ErrorKind::ConfigurationError,
    ] {
        detector.record_error(&err(kind), Some("google"));
    }

    let report = detector.detect_pattern(Some("google"));

    assert!(report.has_pattern);
    assert_eq!(report.pattern_type, Some(PatternType::EscalatingErrors));
    assert_eq!(
        report.recommendation.map(|a| a.action_type),
        Some(FallbackActionType::ContactSupport)
    );
}

#[test]
fn equal_severities_of_different_kinds_still_escalate() {
    let detector = ErrorPatternDetector::new();
    for kind in [
        ErrorKind::NetworkError,
        ErrorKind::TimeoutError,
        ErrorKind::ConnectionError,
    ] {
        detector.record_error(&err(kind), None);
    }
    assert_eq!(
        detector.detect_pattern(None).pattern_type,
        Some(PatternType::EscalatingErrors)
    );
}

#[test]
fn cleared_history_reports_no_pattern() {
    let detector = ErrorPatternDetector::new();
    for _ in 0..3 {
        detector.record_error(&err(ErrorKind::TimeoutError), Some("github"));
    }
    assert!(detector.detect_pattern(Some("github")).has_pattern);

    detector.clear_history(Some("github"));

    assert!(!detector.detect_pattern(Some("github")).has_pattern);
    assert_eq!(detector.history_len(Some("github")), 0);
}

#[test]
fn clearing_without_provider_wipes_every_history() {
    let detector = ErrorPatternDetector::new();
    detector.record_error(&err(ErrorKind::NetworkError), Some("github"));
    detector.record_error(&err(ErrorKind::NetworkError), Some("google"));
    detector.record_error(&err(ErrorKind::NetworkError), None);

    detector.clear_history(None);

    assert_eq!(detector.history_len(Some("github")), 0);
    assert_eq!(detector.history_len(Some("google")), 0);
    assert_eq!(detector.history_len(None), 0);
}

#[test]
fn providers_are_tracked_independently() {
    let detector = ErrorPatternDetector::new();
    for provider in ["github", "google", "github", "google", "github"] {
        detector.record_error(&err(ErrorKind::OauthInvalidGrant), Some(provider));
    }

    assert!(detector.detect_pattern(Some("github")).has_pattern);
    assert!(!detector.detect_pattern(Some("google")).has_pattern);
    assert!(!detector.detect_pattern(None).has_pattern);
}
