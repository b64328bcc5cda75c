//! End-to-end tests for `AuthErrorHandler`.

mod common;

use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use relogin::classify::ErrorContext;
use relogin::error::{ErrorKind, ReloginError, Severity};
use relogin::handler::AuthErrorHandler;
use relogin::patterns::PatternType;
use relogin::recovery::strategies::SESSION_TOKEN_KEY;
use relogin::recovery::{FallbackActionType, FileStateStore, StateStore, StorageArea};

use common::{config_for, Outcome, ScriptedStrategy, UNREACHABLE_BASE_URL};

#[tokio::test]
async fn oauth_failure_is_shown_inline_with_switch_method() {
    let handler = AuthErrorHandler::new(config_for(UNREACHABLE_BASE_URL)).unwrap();

    let handled = handler.handle(
        "oauth error occurred",
        ErrorContext::new().with_provider("google"),
    );

    assert_eq!(handled.error.kind(), ErrorKind::OauthError);
    assert!(handled.error.is_retryable());
    assert!(handled.presentation.show_inline);
    assert!(!handled.presentation.show_modal);
    assert_eq!(handled.presentation.severity, Severity::Medium);
    assert!(!handled.pattern.has_pattern);
    assert_eq!(handled.fallback.action_type, FallbackActionType::SwitchMethod);
    assert_eq!(
        handled
            .fallback
            .payload
            .and_then(|p| p.exclude_provider)
            .as_deref(),
        Some("google")
    );
}

#[tokio::test]
async fn detected_pattern_overrides_per_kind_fallback() {
    let handler = AuthErrorHandler::new(config_for(UNREACHABLE_BASE_URL)).unwrap();
    let context = ErrorContext::new().with_provider("github");

    let first = handler.handle("network down", context.clone());
    assert_eq!(first.fallback.action_type, FallbackActionType::Retry);
    handler.handle("network down", context.clone());
    let third = handler.handle("network down", context);

    assert_eq!(third.pattern.pattern_type, Some(PatternType::RepeatedFailures));
    assert_eq!(third.fallback.action_type, FallbackActionType::SwitchMethod);
    assert_eq!(handler.detect_pattern(Some("github")), third.pattern);

    handler.clear_history(Some("github"));
    assert!(!handler.detect_pattern(Some("github")).has_pattern);
}

#[tokio::test]
async fn network_failure_recovers_once_health_endpoint_answers() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/api/health"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    let handler = AuthErrorHandler::new(config_for(&server.uri())).unwrap();

    let handled = handler.handle("Failed to fetch", ErrorContext::default());

    assert_eq!(handled.error.kind(), ErrorKind::NetworkError);
    assert!(handler.should_retry(&handled.error, "signin"));
    assert!(handler.attempt_recovery(&handled.error, None).await);
}

#[tokio::test]
async fn recovery_is_skipped_when_fallback_is_disabled() {
    let mut config = config_for(UNREACHABLE_BASE_URL);
    config.enable_fallback = false;
    let mut handler = AuthErrorHandler::new(config).unwrap();
    let strategy = ScriptedStrategy::new(true, Outcome::Recovered);
    let calls = strategy.calls();
    handler
        .recovery_mut()
        .register(ErrorKind::InternalError, strategy);

    let handled = handler.handle(json!({"status": 500}), ErrorContext::default());

    assert_eq!(handled.error.kind(), ErrorKind::InternalError);
    assert!(!handler.attempt_recovery(&handled.error, None).await);
    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[tokio::test]
async fn session_cleanup_uses_file_store_from_state_dir() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_for(UNREACHABLE_BASE_URL);
    config.state_dir = Some(dir.path().to_path_buf());
    let handler = AuthErrorHandler::new(config).unwrap();
    let store = handler.state_store();
    store
        .set(StorageArea::Local, SESSION_TOKEN_KEY, "stale")
        .unwrap();
    store
        .set(StorageArea::Cookie, "next-auth.session-token", "stale")
        .unwrap();
    store.set(StorageArea::Cookie, "theme", "dark").unwrap();

    let handled = handler.handle("Session expired", ErrorContext::default());
    assert_eq!(handled.error.kind(), ErrorKind::SessionExpired);
    assert!(handled.presentation.show_modal);
    assert!(handler.attempt_recovery(&handled.error, None).await);

    let reopened = FileStateStore::new(dir.path().to_path_buf());
    assert_eq!(reopened.get(StorageArea::Local, SESSION_TOKEN_KEY).unwrap(), None);
    assert_eq!(
        reopened.keys(StorageArea::Cookie).unwrap(),
        vec!["theme".to_string()]
    );
}

#[tokio::test]
async fn execute_retry_runs_operation_after_backoff() {
    let mut config = config_for(UNREACHABLE_BASE_URL);
    config.retry.base_delay_ms = 10;
    config.retry.max_delay_ms = 50;
    let handler = AuthErrorHandler::new(config).unwrap();
    let handled = handler.handle("request timeout", ErrorContext::default());

    let value = handler
        .execute_retry("signin", &handled.error, || async { "signed in" })
        .await;

    assert_eq!(value, "signed in");
    assert_eq!(handler.retry_coordinator().attempts("signin"), 1);
    handler.reset_retry_attempts("signin");
    assert_eq!(handler.retry_coordinator().attempts("signin"), 0);
}

#[tokio::test]
async fn analytics_is_sent_in_the_background() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/analytics/error"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    let mut config = config_for(&server.uri());
    config.enable_analytics = true;
    let handler = AuthErrorHandler::new(config).unwrap();

    handler.handle("network down", ErrorContext::new().with_provider("github"));

    let mut received = Vec::new();
    for _ in 0..50 {
        received = server.received_requests().await.unwrap_or_default();
        if !received.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(received.len(), 1);
    let body: serde_json::Value = received[0].body_json().unwrap();
    assert_eq!(body["error_type"], "network_error");
    assert_eq!(body["context"]["provider"], "github");
}

#[test]
fn invalid_retry_settings_are_rejected_at_construction() {
    let mut config = config_for(UNREACHABLE_BASE_URL);
    config.retry.backoff_multiplier = 0.5;

    let err = AuthErrorHandler::new(config).unwrap_err();

    assert!(matches!(err, ReloginError::Configuration(_)));
}
