//! Kernel configuration.

use core::time::Duration;

use thiserror::Error;

/// Environment variable for [`KernelConfig::trace_capacity`].
pub const ENV_TRACE_CAPACITY: &str = "SWITCHYARD_TRACE_CAPACITY";
/// Environment variable for [`KernelConfig::step_timeout`], in milliseconds.
pub const ENV_STEP_TIMEOUT_MS: &str = "SWITCHYARD_STEP_TIMEOUT_MS";
/// Environment variable for [`KernelConfig::expose_error_detail`].
pub const ENV_EXPOSE_ERROR_DETAIL: &str = "SWITCHYARD_EXPOSE_ERROR_DETAIL";
/// Environment variable for [`KernelConfig::rpc_batch_limit`].
pub const ENV_RPC_BATCH_LIMIT: &str = "SWITCHYARD_RPC_BATCH_LIMIT";

/// A configuration value that failed to parse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid value '{value}' for {key}")]
pub struct ConfigError {
    /// The variable name.
    pub key: &'static str,
    /// The rejected value.
    pub value: String,
}

/// Runtime knobs for a [`Kernel`](crate::Kernel).
///
/// # Example
///
/// ```
/// use core::time::Duration;
/// use switchyard_kernel::KernelConfig;
///
/// let config = KernelConfig::default()
///     .with_trace_capacity(256)
///     .with_step_timeout(Duration::from_secs(5));
///
/// assert_eq!(config.trace_capacity(), 256);
/// assert!(!config.expose_error_detail());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelConfig {
    trace_capacity: usize,
    step_timeout: Option<Duration>,
    expose_error_detail: bool,
    rpc_batch_limit: usize,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            trace_capacity: 1024,
            step_timeout: None,
            expose_error_detail: false,
            rpc_batch_limit: 64,
        }
    }
}

impl KernelConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads overrides from `SWITCHYARD_*` environment variables. Unset
    /// variables keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for any value that does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), reading from an arbitrary source.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for any value that does not parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(value) = lookup(ENV_TRACE_CAPACITY) {
            config.trace_capacity = parse(ENV_TRACE_CAPACITY, &value)?;
        }
        if let Some(value) = lookup(ENV_STEP_TIMEOUT_MS) {
            let millis: u64 = parse(ENV_STEP_TIMEOUT_MS, &value)?;
            config.step_timeout = (millis > 0).then(|| Duration::from_millis(millis));
        }
        if let Some(value) = lookup(ENV_EXPOSE_ERROR_DETAIL) {
            config.expose_error_detail = match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" | "" => false,
                _ => {
                    return Err(ConfigError {
                        key: ENV_EXPOSE_ERROR_DETAIL,
                        value,
                    });
                }
            };
        }
        if let Some(value) = lookup(ENV_RPC_BATCH_LIMIT) {
            config.rpc_batch_limit = parse(ENV_RPC_BATCH_LIMIT, &value)?;
        }
        Ok(config)
    }

    /// Sets how many recent traces are kept for correlation-id lookup.
    /// Zero disables the archive.
    #[must_use]
    pub fn with_trace_capacity(mut self, capacity: usize) -> Self {
        self.trace_capacity = capacity;
        self
    }

    /// Sets a per-step timeout. A step exceeding it fails as `INTERNAL`.
    #[must_use]
    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = Some(timeout);
        self
    }

    /// Returns internal error detail to clients. Off by default; only for
    /// local debugging.
    #[must_use]
    pub fn with_expose_error_detail(mut self, expose: bool) -> Self {
        self.expose_error_detail = expose;
        self
    }

    /// Sets the maximum JSON-RPC batch length.
    #[must_use]
    pub fn with_rpc_batch_limit(mut self, limit: usize) -> Self {
        self.rpc_batch_limit = limit;
        self
    }

    /// Archive size.
    #[must_use]
    pub fn trace_capacity(&self) -> usize {
        self.trace_capacity
    }

    /// Per-step timeout, if any.
    #[must_use]
    pub fn step_timeout(&self) -> Option<Duration> {
        self.step_timeout
    }

    /// Whether internal detail reaches clients.
    #[must_use]
    pub fn expose_error_detail(&self) -> bool {
        self.expose_error_detail
    }

    /// Maximum JSON-RPC batch length.
    #[must_use]
    pub fn rpc_batch_limit(&self) -> usize {
        self.rpc_batch_limit
    }
}

fn parse<T: core::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError {
        key,
        value: value.to_string(),
    })
}
