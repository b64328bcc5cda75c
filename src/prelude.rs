//! Convenience re-exports for common use.

pub use crate::classify::{classify, ErrorContext, RawError, StructuredError};
pub use crate::config::EngineConfig;
pub use crate::error::{ErrorKind, ReloginError, Result, Severity};
pub use crate::handler::{AuthErrorHandler, HandledError};
pub use crate::patterns::{PatternReport, PatternType};
pub use crate::presentation::{presentation_for, Presentation};
pub use crate::recovery::{FallbackAction, FallbackActionType, RecoveryStrategy};
pub use crate::retry::{RetryConfig, RetryCoordinator};
