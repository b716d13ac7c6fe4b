//! HTTP configuration types.

use std::collections::HashMap;
use std::time::Duration;

/// HTTP configuration applied to every request against the endpoint.
#[derive(Debug, Clone, Default)]
pub struct HttpConfig {
    /// Whole-request timeout
    pub timeout: Option<Duration>,
    /// Connection timeout
    pub connect_timeout: Option<Duration>,
    /// Default headers sent with every request
    pub headers: HashMap<String, String>,
    /// Default query parameters appended to every request
    pub query: Vec<(String, String)>,
    /// User agent string
    pub user_agent: Option<String>,
}

impl HttpConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }
}
