//! Shared HTTP client and endpoint helpers.

use std::time::Duration;

use reqwest::Url;

use crate::error::ReloginError;

/// Build the client used for probes, session refresh and analytics.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client, ReloginError> {
    Ok(reqwest::Client::builder()
        .timeout(timeout)
        .pool_max_idle_per_host(4)
        .build()?)
}

/// Resolve `path` against `base_url`, keeping any path prefix on the base.
pub fn endpoint_url(base_url: &str, path: &str) -> Result<String, ReloginError> {
    let mut base = base_url.trim_end_matches('/').to_string();
    base.push('/');
    let base = Url::parse(&base)
        .map_err(|e| ReloginError::Configuration(format!("invalid base_url {base_url:?}: {e}")))?;
    let joined = base
        .join(path.trim_start_matches('/'))
        .map_err(|e| ReloginError::Configuration(format!("invalid endpoint path {path:?}: {e}")))?;
    Ok(joined.to_string())
}
