//! relogin: authentication error classification and recovery.
//!
//! Turns heterogeneous sign-in failures (plain messages, exception objects,
//! OAuth error payloads, HTTP statuses, transport errors) into one
//! [`StructuredError`](classify::StructuredError), then helps decide what to
//! do about it: retry with backoff, run a recovery procedure, switch sign-in
//! method, or tell the user to contact support.
//!
//! # Quick Start
//!
//! ```no_run
//! use relogin::prelude::*;
//!
//! # async fn example() -> relogin::error::Result<()> {
//! let handler = AuthErrorHandler::new(EngineConfig::load(None)?)?;
//! let ctx = ErrorContext::new().with_provider("github");
//! let handled = handler.handle(RawError::oauth("access_denied", None), ctx);
//!
//! assert_eq!(handled.error.kind(), ErrorKind::OauthAccessDenied);
//! if handler.should_retry(&handled.error, "signin:github") {
//!     handler
//!         .execute_retry("signin:github", &handled.error, || async { /* sign in again */ })
//!         .await;
//! }
//! # Ok(())
//! # }
//! ```

pub mod analytics;
pub mod classify;
pub mod config;
pub mod error;
pub mod handler;
pub mod patterns;
pub mod prelude;
pub mod presentation;
pub mod recovery;
pub mod retry;
pub mod util;
