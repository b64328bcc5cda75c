//! Shared test helpers and mock strategies.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use relogin::classify::{ErrorContext, StructuredError};
use relogin::config::EngineConfig;
use relogin::error::{ErrorKind, ReloginError};
use relogin::recovery::RecoveryStrategy;

pub fn err(kind: ErrorKind) -> StructuredError {
    StructuredError::new(kind, format!("test {kind}"))
}

pub fn err_for(kind: ErrorKind, provider: &str) -> StructuredError {
    err(kind).with_context(ErrorContext::new().with_provider(provider))
}

/// Config pointing every endpoint at `base_url`, with analytics off.
pub fn config_for(base_url: &str) -> EngineConfig {
    EngineConfig {
        base_url: base_url.to_string(),
        enable_analytics: false,
        request_timeout_ms: 2_000,
        ..EngineConfig::default()
    }
}

/// An address nothing listens on.
pub const UNREACHABLE_BASE_URL: &str = "http://127.0.0.1:1";

#[derive(Debug, Clone, Copy)]
pub enum Outcome {
    Recovered,
    NotRecovered,
    Fails,
    Panics,
}

/// Strategy with a scripted outcome that counts its calls.
pub struct ScriptedStrategy {
    pub eligible: bool,
    pub outcome: Outcome,
    pub calls: Arc<AtomicUsize>,
}

impl ScriptedStrategy {
    pub fn new(eligible: bool, outcome: Outcome) -> Self {
        Self {
            eligible,
            outcome,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

#[async_trait]
impl RecoveryStrategy for ScriptedStrategy {
    fn can_recover(&self, _error: &StructuredError) -> bool {
        self.eligible
    }

    async fn recover(
        &self,
        _error: &StructuredError,
        _context: &ErrorContext,
    ) -> Result<bool, ReloginError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.outcome {
            Outcome::Recovered => Ok(true),
            Outcome::NotRecovered => Ok(false),
            Outcome::Fails => Err(ReloginError::Storage("disk full".to_string())),
            Outcome::Panics => panic!("strategy blew up"),
        }
    }
}
