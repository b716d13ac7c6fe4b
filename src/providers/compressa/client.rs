//! Compressa HTTP Client
//!
//! Transport shared by the embeddings and completion providers: bearer auth, default
//! headers and query parameters, timeouts, bounded retries and error classification.

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::config::{API_BASE_ENV, API_KEY_ENV, DEFAULT_BASE_URL};
use crate::error::{LlmError, classify_http_error, error_from_payload};
use crate::retry_api::{RetryOptions, retry_with};
use crate::types::HttpConfig;

/// Resolve the API key: explicit value first, then `COMPRESSA_API_KEY`.
pub fn resolve_api_key(explicit: Option<SecretString>) -> Result<SecretString, LlmError> {
    if let Some(key) = explicit
        && !key.expose_secret().is_empty()
    {
        return Ok(key);
    }
    match std::env::var(API_KEY_ENV) {
        Ok(key) if !key.is_empty() => Ok(SecretString::from(key)),
        _ => Err(LlmError::ConfigurationError(format!(
            "Compressa API key not found; pass `api_key` or set {API_KEY_ENV}"
        ))),
    }
}

/// Resolve the base URL: explicit value, then `COMPRESSA_API_BASE`, then the default.
pub fn resolve_base_url(explicit: Option<String>) -> String {
    explicit
        .filter(|url| !url.is_empty())
        .or_else(|| std::env::var(API_BASE_ENV).ok().filter(|url| !url.is_empty()))
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
}

/// Client for the OpenAI-compatible Compressa API.
#[derive(Clone)]
pub struct CompressaClient {
    http_client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    http_config: HttpConfig,
    retry_options: RetryOptions,
}

impl std::fmt::Debug for CompressaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompressaClient")
            .field("base_url", &self.base_url)
            .field("http_config", &self.http_config)
            .field("max_attempts", &self.retry_options.max_attempts())
            .finish()
    }
}

impl CompressaClient {
    pub fn new(
        api_key: SecretString,
        base_url: impl Into<String>,
        http_config: HttpConfig,
        retry_options: RetryOptions,
    ) -> Result<Self, LlmError> {
        let http_client = Self::build_http_client(&http_config)?;
        Self::with_http_client(api_key, base_url, http_config, retry_options, http_client)
    }

    /// Create a client around a caller-provided `reqwest::Client`.
    pub fn with_http_client(
        api_key: SecretString,
        base_url: impl Into<String>,
        http_config: HttpConfig,
        retry_options: RetryOptions,
        http_client: reqwest::Client,
    ) -> Result<Self, LlmError> {
        let client = Self {
            http_client,
            api_key,
            base_url: base_url.into(),
            http_config,
            retry_options,
        };
        client.validate()?;
        Ok(client)
    }

    /// Resolve credentials from explicit values or the environment, then build.
    pub fn from_settings(
        api_key: Option<SecretString>,
        base_url: Option<String>,
        http_config: HttpConfig,
        retry_options: RetryOptions,
        http_client: Option<reqwest::Client>,
    ) -> Result<Self, LlmError> {
        let api_key = resolve_api_key(api_key)?;
        let base_url = resolve_base_url(base_url);
        match http_client {
            Some(http_client) => {
                Self::with_http_client(api_key, base_url, http_config, retry_options, http_client)
            }
            None => Self::new(api_key, base_url, http_config, retry_options),
        }
    }

    fn validate(&self) -> Result<(), LlmError> {
        if self.api_key.expose_secret().is_empty() {
            return Err(LlmError::ConfigurationError(
                "API key cannot be empty".to_string(),
            ));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(LlmError::ConfigurationError(
                "Base URL must start with http:// or https://".to_string(),
            ));
        }
        Ok(())
    }

    /// Build HTTP client with configuration
    fn build_http_client(http_config: &HttpConfig) -> Result<reqwest::Client, LlmError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = http_config.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(connect_timeout) = http_config.connect_timeout {
            builder = builder.connect_timeout(connect_timeout);
        }
        if let Some(user_agent) = &http_config.user_agent {
            builder = builder.user_agent(user_agent);
        }
        builder
            .build()
            .map_err(|e| LlmError::HttpError(format!("Failed to create HTTP client: {e}")))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn retry_options(&self) -> &RetryOptions {
        &self.retry_options
    }

    fn build_headers(&self) -> Result<reqwest::header::HeaderMap, LlmError> {
        use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};

        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", self.api_key.expose_secret()))
            .map_err(|e| LlmError::ConfigurationError(format!("Invalid API key: {e}")))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        for (key, value) in &self.http_config.headers {
            let name = HeaderName::from_bytes(key.as_bytes()).map_err(|e| {
                LlmError::ConfigurationError(format!("Invalid header name '{key}': {e}"))
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| {
                LlmError::ConfigurationError(format!("Invalid header value '{value}': {e}"))
            })?;
            headers.insert(name, value);
        }
        Ok(headers)
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), endpoint)
    }

    async fn send_once<B: Serialize + ?Sized>(
        &self,
        url: &str,
        headers: &reqwest::header::HeaderMap,
        body: &B,
    ) -> Result<reqwest::Response, LlmError> {
        let response = self
            .http_client
            .post(url)
            .headers(headers.clone())
            .query(&self.http_config.query)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(classify_http_error(status.as_u16(), &error_text));
        }
        Ok(response)
    }

    /// POST a JSON body and decode the JSON response, retrying transient failures.
    ///
    /// A 2xx body carrying an `error` field fails the call without a retry.
    pub async fn post_json<B, R>(&self, endpoint: &str, body: &B) -> Result<R, LlmError>
    where
        B: Serialize + Sync + ?Sized,
        R: DeserializeOwned,
    {
        let url = self.url(endpoint);
        let headers = self.build_headers()?;
        let (url, headers) = (&url, &headers);

        let text = retry_with(
            move || async move {
                let response = self.send_once(url, headers, body).await?;
                Ok(response.text().await?)
            },
            &self.retry_options,
        )
        .await?;

        let json: serde_json::Value = serde_json::from_str(&text).map_err(|e| {
            LlmError::ParseError(format!("Failed to parse {endpoint} response: {e}"))
        })?;
        if let Some(error) = error_from_payload(&json) {
            return Err(error);
        }
        serde_json::from_value(json)
            .map_err(|e| LlmError::ParseError(format!("Unexpected {endpoint} response: {e}")))
    }

    /// POST a JSON body and return the successful response for streaming.
    ///
    /// Only establishing the response is retried; the body is consumed by the caller.
    pub async fn post_stream<B>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<reqwest::Response, LlmError>
    where
        B: Serialize + Sync + ?Sized,
    {
        let url = self.url(endpoint);
        let headers = self.build_headers()?;
        let (url, headers) = (&url, &headers);

        retry_with(
            move || async move { self.send_once(url, headers, body).await },
            &self.retry_options,
        )
        .await
    }
}

#[cfg(test)]
#[allow(unsafe_code)]
mod tests {
    use super::*;

    fn client(base_url: &str) -> Result<CompressaClient, LlmError> {
        CompressaClient::new(
            SecretString::from("test-key"),
            base_url,
            HttpConfig::default().with_header("X-Custom", "1"),
            RetryOptions::from_max_retries(0),
        )
    }

    #[test]
    fn validates_base_url_and_key() {
        assert!(client("https://example.com/v1").is_ok());
        assert!(matches!(
            client("example.com"),
            Err(LlmError::ConfigurationError(_))
        ));
        let empty_key = CompressaClient::new(
            SecretString::from(String::new()),
            "https://example.com",
            HttpConfig::default(),
            RetryOptions::default(),
        );
        assert!(empty_key.is_err());
    }

    #[test]
    fn headers_carry_bearer_and_custom_values() {
        let client = client("https://example.com/v1/").unwrap();
        let headers = client.build_headers().unwrap();
        assert_eq!(headers["authorization"], "Bearer test-key");
        assert_eq!(headers["x-custom"], "1");
        assert_eq!(client.url("embeddings"), "https://example.com/v1/embeddings");
    }

    #[test]
    fn debug_does_not_leak_key() {
        let client = client("https://example.com/v1").unwrap();
        assert!(!format!("{client:?}").contains("test-key"));
    }

    #[test]
    fn resolution_order() {
        unsafe {
            std::env::remove_var(API_KEY_ENV);
            std::env::remove_var(API_BASE_ENV);
        }
        assert!(resolve_api_key(None).is_err());
        assert_eq!(resolve_base_url(None), DEFAULT_BASE_URL);

        unsafe {
            std::env::set_var(API_KEY_ENV, "from-env");
            std::env::set_var(API_BASE_ENV, "http://env:1/v1");
        }
        assert_eq!(resolve_api_key(None).unwrap().expose_secret(), "from-env");
        assert_eq!(
            resolve_api_key(Some(SecretString::from("explicit")))
                .unwrap()
                .expose_secret(),
            "explicit"
        );
        assert_eq!(resolve_base_url(None), "http://env:1/v1");
        assert_eq!(
            resolve_base_url(Some("http://explicit/v1".to_string())),
            "http://explicit/v1"
        );

        unsafe {
            std::env::remove_var(API_KEY_ENV);
            std::env::remove_var(API_BASE_ENV);
        }
    }
}
