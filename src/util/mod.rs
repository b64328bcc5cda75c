//! Utility modules: HTTP client construction and endpoint URLs.

pub mod http;
