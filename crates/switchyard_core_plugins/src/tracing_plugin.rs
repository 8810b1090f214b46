//! Log output for a kernel and its adapters.
//!
//! [`TracingPlugin`] installs a `tracing-subscriber` registry when the
//! kernel finishes building. Installation waits for `ready()` so that any
//! plugin built earlier can still log through whatever subscriber the host
//! set up, and so a host that already installed one keeps it.
//!
//! # Example
//!
//! ```
//! use switchyard_core_plugins::{TracingFormat, TracingPlugin};
//! use switchyard_kernel::Kernel;
//! use tracing::Level;
//!
//! let kernel = Kernel::builder()
//!     .add_plugins(
//!         TracingPlugin::default()
//!             .with_level(Level::DEBUG)
//!             .with_format(TracingFormat::Compact),
//!     )
//!     .finish()
//!     .expect("kernel should build");
//! # let _ = kernel;
//! ```

use switchyard_kernel::{BuildError, KernelBuilder, Plugin};
use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

// ─────────────────────────────────────────────────────────────────────────────
// TracingFormat
// ─────────────────────────────────────────────────────────────────────────────

/// Tracing output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TracingFormat {
    /// Human-readable multi-line output.
    #[default]
    Pretty,
    /// Single-line output.
    Compact,
    /// One JSON object per event.
    Json,
}

// ─────────────────────────────────────────────────────────────────────────────
// TracingPlugin
// ─────────────────────────────────────────────────────────────────────────────

/// Installs a global `tracing` subscriber.
///
/// # Environment Filter
///
/// `with_env_filter` takes precedence over `with_level`:
///
/// ```
/// use switchyard_core_plugins::TracingPlugin;
///
/// TracingPlugin::default()
///     .with_env_filter("switchyard_kernel=debug,switchyard_transport=info")
/// # ;
/// ```
///
/// An invalid filter string falls back to the configured level.
#[derive(Debug, Clone)]
pub struct TracingPlugin {
    level: Level,
    format: TracingFormat,
    env_filter: Option<String>,
    span_events: bool,
}

impl Default for TracingPlugin {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: TracingFormat::Pretty,
            env_filter: None,
            span_events: false,
        }
    }
}

impl TracingPlugin {
    /// Creates a plugin with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum log level.
    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Sets the output format.
    #[must_use]
    pub fn with_format(mut self, format: TracingFormat) -> Self {
        self.format = format;
        self
    }

    /// Sets a `target=level,...` filter.
    #[must_use]
    pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Emits an event whenever a span (such as `invoke`) is entered or
    /// exited.
    #[must_use]
    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.span_events = enabled;
        self
    }

    /// The configured level.
    #[must_use]
    pub fn level(&self) -> Level {
        self.level
    }

    /// The configured format.
    #[must_use]
    pub fn format(&self) -> TracingFormat {
        self.format
    }

    fn filter(&self) -> EnvFilter {
        match &self.env_filter {
            Some(filter) => {
                EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new(self.level.as_str()))
            }
            None => EnvFilter::new(self.level.as_str()),
        }
    }

    fn span_events(&self) -> FmtSpan {
        if self.span_events {
            FmtSpan::ENTER | FmtSpan::EXIT
        } else {
            FmtSpan::NONE
        }
    }

    /// Installs the subscriber. Returns false if one was already set.
    fn install(&self) -> bool {
        let registry = tracing_subscriber::registry().with(self.filter());
        let layer = tracing_subscriber::fmt::layer().with_span_events(self.span_events());
        let installed = match self.format {
            TracingFormat::Pretty => registry.with(layer.pretty()).try_init(),
            TracingFormat::Compact => registry.with(layer.compact()).try_init(),
            TracingFormat::Json => registry.with(layer.json()).try_init(),
        };
        installed.is_ok()
    }
}

impl Plugin for TracingPlugin {
    fn build(&self, _kernel: &mut KernelBuilder) -> Result<(), BuildError> {
        Ok(())
    }

    fn ready(&self, _kernel: &mut KernelBuilder) -> Result<(), BuildError> {
        if self.install() {
            tracing::info!(level = %self.level, format = ?self.format, "tracing initialized");
        } else {
            tracing::debug!("a global subscriber is already installed");
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "switchyard::tracing"
    }
}
