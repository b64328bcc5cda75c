//! Detects repeated or escalating failures in short per-provider histories.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use strum::Display;

use crate::classify::StructuredError;
use crate::error::ErrorKind;
use crate::recovery::FallbackAction;

/// History key used when no provider is given.
pub const GLOBAL_KEY: &str = "global";
/// Entries kept per key; the oldest is evicted first.
pub const HISTORY_CAPACITY: usize = 10;
/// Errors considered when looking for a pattern.
const PATTERN_WINDOW: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PatternType {
    RepeatedFailures,
    EscalatingErrors,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatternReport {
    pub has_pattern: bool,
    pub pattern_type: Option<PatternType>,
    pub recommendation: Option<FallbackAction>,
}

impl PatternReport {
    fn none() -> Self {
        Self {
            has_pattern: false,
            pattern_type: None,
            recommendation: None,
        }
    }

    fn found(pattern_type: PatternType, recommendation: FallbackAction) -> Self {
        Self {
            has_pattern: true,
            pattern_type: Some(pattern_type),
            recommendation: Some(recommendation),
        }
    }
}

#[derive(Debug, Default)]
pub struct ErrorPatternDetector {
    histories: Mutex<HashMap<String, VecDeque<StructuredError>>>,
}

impl ErrorPatternDetector {
    pub fn new() -> Self {
        Self::default()
    }

    fn histories(&self) -> MutexGuard<'_, HashMap<String, VecDeque<StructuredError>>> {
        self.histories.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn record_error(&self, error: &StructuredError, provider: Option<&str>) {
        let key = provider.unwrap_or(GLOBAL_KEY);
        let mut histories = self.histories();
        let history = histories.entry(key.to_string()).or_default();
        if history.len() == HISTORY_CAPACITY {
            history.pop_front();
        }
        history.push_back(error.clone());
    }

    pub fn history_len(&self, provider: Option<&str>) -> usize {
        self.histories()
            .get(provider.unwrap_or(GLOBAL_KEY))
            .map_or(0, VecDeque::len)
    }

    /// Kinds recorded for a key, oldest first.
    pub fn recent_kinds(&self, provider: Option<&str>) -> Vec<ErrorKind> {
        self.histories()
            .get(provider.unwrap_or(GLOBAL_KEY))
            .map(|h| h.iter().map(StructuredError::kind).collect())
            .unwrap_or_default()
    }

    pub fn detect_pattern(&self, provider: Option<&str>) -> PatternReport {
        let kinds = self.recent_kinds(provider);
        if kinds.len() < PATTERN_WINDOW {
            return PatternReport::none();
        }
        let window = &kinds[kinds.len() - PATTERN_WINDOW..];

        if window.iter().all(|kind| *kind == window[0]) {
            tracing::debug!(provider, kind = %window[0], "repeated failures detected");
            return PatternReport::found(
                PatternType::RepeatedFailures,
                FallbackAction::switch_method(
                    "This keeps failing. Please try a different sign-in method.",
                    provider,
                ),
            );
        }

        if window
            .windows(2)
            .all(|pair| pair[0].severity() <= pair[1].severity())
        {
            tracing::debug!(provider, "escalating errors detected");
            return PatternReport::found(
                PatternType::EscalatingErrors,
                FallbackAction::contact_support(
                    "Sign-in problems are getting worse. Please contact support.",
                ),
            );
        }

        PatternReport::none()
    }

    /// Clear one key's history, or every history (including global) when `provider` is `None`.
    pub fn clear_history(&self, provider: Option<&str>) {
        let mut histories = self.histories();
        match provider {
            Some(key) => {
                histories.remove(key);
            }
            None => histories.clear(),
        }
    }
}
