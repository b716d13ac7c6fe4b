//! Telemetry and tracing utilities
//!
//! Library code only emits `tracing` events. Applications that want to see them can
//! install a subscriber with [`init_tracing`].
//!
//! ```rust,no_run
//! use siumai_provider_compressa::telemetry::{init_tracing, OutputFormat, TracingConfig};
//!
//! let config = TracingConfig::builder()
//!     .log_level(tracing::Level::DEBUG)
//!     .output_format(OutputFormat::Json)
//!     .build();
//! init_tracing(config).ok();
//! ```

use tracing_subscriber::EnvFilter;

use crate::error::LlmError;

const CRATE_TARGET: &str = "siumai_provider_compressa";

/// Output format for tracing logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    Json,
    /// Flattened JSON events without span context
    JsonCompact,
}

/// Configuration for the tracing subscriber
#[derive(Debug, Clone)]
pub struct TracingConfig {
    pub log_level: tracing::Level,
    pub output_format: OutputFormat,
    /// Let `RUST_LOG` override the level directive
    pub respect_env: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            log_level: tracing::Level::INFO,
            output_format: OutputFormat::Text,
            respect_env: true,
        }
    }
}

impl TracingConfig {
    pub fn builder() -> TracingConfigBuilder {
        TracingConfigBuilder::default()
    }

    pub fn debug() -> Self {
        Self {
            log_level: tracing::Level::DEBUG,
            ..Self::default()
        }
    }

    /// Filter directive applied when `RUST_LOG` is not used.
    pub fn directive(&self) -> String {
        format!(
            "{CRATE_TARGET}={}",
            self.log_level.as_str().to_ascii_lowercase()
        )
    }

    fn env_filter(&self) -> EnvFilter {
        if self.respect_env
            && let Ok(filter) = EnvFilter::try_from_default_env()
        {
            return filter;
        }
        EnvFilter::new(self.directive())
    }
}

/// Builder for [`TracingConfig`]
#[derive(Debug, Default)]
pub struct TracingConfigBuilder {
    log_level: Option<tracing::Level>,
    output_format: Option<OutputFormat>,
    respect_env: Option<bool>,
}

impl TracingConfigBuilder {
    pub fn log_level(mut self, level: tracing::Level) -> Self {
        self.log_level = Some(level);
        self
    }

    /// Set the log level from a string
    pub fn log_level_str(mut self, level: &str) -> Result<Self, LlmError> {
        let level = match level.to_lowercase().as_str() {
            "trace" => tracing::Level::TRACE,
            "debug" => tracing::Level::DEBUG,
            "info" => tracing::Level::INFO,
            "warn" => tracing::Level::WARN,
            "error" => tracing::Level::ERROR,
            _ => {
                return Err(LlmError::ConfigurationError(format!(
                    "Invalid log level: {level}. Valid options: trace, debug, info, warn, error"
                )));
            }
        };
        self.log_level = Some(level);
        Ok(self)
    }

    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = Some(format);
        self
    }

    pub fn respect_env(mut self, respect_env: bool) -> Self {
        self.respect_env = Some(respect_env);
        self
    }

    pub fn build(self) -> TracingConfig {
        TracingConfig {
            log_level: self.log_level.unwrap_or(tracing::Level::INFO),
            output_format: self.output_format.unwrap_or_default(),
            respect_env: self.respect_env.unwrap_or(true),
        }
    }
}

/// Install a global fmt subscriber.
///
/// Fails with a configuration error if a global subscriber is already set.
pub fn init_tracing(config: TracingConfig) -> Result<(), LlmError> {
    let filter = config.env_filter();
    let init_result = match config.output_format {
        OutputFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .try_init(),
        OutputFormat::JsonCompact => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .flatten_event(true)
            .with_current_span(false)
            .try_init(),
        OutputFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init(),
    };

    init_result.map_err(|e| {
        LlmError::ConfigurationError(format!("Failed to initialize tracing subscriber: {e}"))
    })
}
