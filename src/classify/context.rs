//! Open key-value context carried alongside a classified error.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const PROVIDER: &str = "provider";
pub const ACTION: &str = "action";
pub const URL: &str = "url";
pub const USER_AGENT: &str = "user_agent";

/// A scalar context value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContextValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl ContextValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for ContextValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for ContextValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for ContextValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for ContextValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<u32> for ContextValue {
    fn from(value: u32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for ContextValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

/// Caller-supplied context for an error.
///
/// Every field is optional. Consumers must tolerate any key being absent.
///
/// # Example
/// ```
/// use relogin::classify::ErrorContext;
///
/// let ctx = ErrorContext::new()
///     .with_provider("google")
///     .with_action("signin")
///     .with("attempt", 2u32);
/// assert_eq!(ctx.provider(), Some("google"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorContext {
    values: BTreeMap<String, ContextValue>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<ContextValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn with_provider(self, provider: impl Into<String>) -> Self {
        self.with(PROVIDER, provider.into())
    }

    pub fn with_action(self, action: impl Into<String>) -> Self {
        self.with(ACTION, action.into())
    }

    pub fn with_url(self, url: impl Into<String>) -> Self {
        self.with(URL, url.into())
    }

    pub fn with_user_agent(self, user_agent: impl Into<String>) -> Self {
        self.with(USER_AGENT, user_agent.into())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ContextValue>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&ContextValue> {
        self.values.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(ContextValue::as_str)
    }

    pub fn provider(&self) -> Option<&str> {
        self.get_str(PROVIDER)
    }

    pub fn action(&self) -> Option<&str> {
        self.get_str(ACTION)
    }

    pub fn url(&self) -> Option<&str> {
        self.get_str(URL)
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.get_str(USER_AGENT)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ContextValue)> {
        self.values.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_known_keys_have_typed_accessors() {
        let ctx = ErrorContext::new()
            .with_provider("github")
            .with_url("https://app.example.com/login")
            .with_user_agent("test-agent");
        assert_eq!(ctx.provider(), Some("github"));
        assert_eq!(ctx.url(), Some("https://app.example.com/login"));
        assert_eq!(ctx.user_agent(), Some("test-agent"));
        assert_eq!(ctx.action(), None);
    }

    #[test]
    fn non_string_provider_reads_as_missing() {
        let ctx = ErrorContext::new().with(PROVIDER, 7i64);
        assert_eq!(ctx.provider(), None);
    }

    #[test]
    fn serializes_as_flat_json_object() {
        let ctx = ErrorContext::new()
            .with_provider("google")
            .with("retry", true)
            .with("attempt", 2u32);
        let json = serde_json::to_value(&ctx).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"attempt": 2, "provider": "google", "retry": true})
        );
    }
}
