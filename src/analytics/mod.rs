//! Best-effort error telemetry.
//!
//! Sends are never retried and never fail the caller: transport errors and
//! non-2xx answers are logged at `warn` and dropped.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::classify::{ErrorContext, StructuredError};

/// Wire body posted to the collection endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsEvent {
    pub error_type: String,
    pub message: String,
    pub context: ErrorContext,
    pub timestamp: DateTime<Utc>,
}

impl From<&StructuredError> for AnalyticsEvent {
    fn from(error: &StructuredError) -> Self {
        Self {
            error_type: error.kind().to_string(),
            message: error.raw_message.clone(),
            context: error.context.clone(),
            timestamp: error.created_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnalyticsReporter {
    client: reqwest::Client,
    endpoint: String,
    enabled: bool,
}

impl AnalyticsReporter {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>, enabled: bool) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            enabled,
        }
    }

    /// A reporter that never sends anything.
    pub fn disabled() -> Self {
        Self::new(reqwest::Client::new(), String::new(), false)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Post `error` to the collection endpoint. Resolves immediately when disabled.
    pub async fn report(&self, error: &StructuredError) {
        if !self.enabled {
            return;
        }
        let event = AnalyticsEvent::from(error);
        match self.client.post(&self.endpoint).json(&event).send().await {
            Ok(response) if response.status().is_success() => {
                tracing::debug!(kind = %event.error_type, "reported auth error");
            }
            Ok(response) => {
                tracing::warn!(
                    kind = %event.error_type,
                    status = response.status().as_u16(),
                    "analytics endpoint rejected error report"
                );
            }
            Err(e) => {
                tracing::warn!(kind = %event.error_type, error = %e, "failed to report auth error");
            }
        }
    }

    /// Fire-and-forget: spawn the send on the current Tokio runtime.
    ///
    /// Returns `None` (and drops the event) when disabled or when called
    /// outside a runtime.
    pub fn report_detached(self: &Arc<Self>, error: StructuredError) -> Option<JoinHandle<()>> {
        if !self.enabled {
            return None;
        }
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                tracing::warn!(kind = %error.kind(), "no async runtime; dropping error report");
                return None;
            }
        };
        let reporter = Arc::clone(self);
        Some(handle.spawn(async move { reporter.report(&error).await }))
    }
}
