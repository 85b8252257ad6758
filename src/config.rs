//! Instrumentation settings.
//!
//! # Environment Variables
//!
//! - `CLUTCH_INSPECT` - Comma-separated options, read once per process:
//!   - `unbounded` - Never evict buffered reports while no inspector is
//!     attached
//!   - `capacity=<n>` - Keep at most `n` buffered reports, dropping the oldest
//!   - `retry-ms=<n>` - Poll for an inspector every `n` milliseconds
//!   - `local-only` - Ignore the process-wide inspector handle
//!
//! Unknown options are ignored. Builder methods on
//! [`InstrumentationBuilder`](crate::InstrumentationBuilder) take precedence
//! over the environment.

use core::time::Duration;
use std::sync::OnceLock;

/// Default polling period of the retry timer.
pub const DEFAULT_RETRY_PERIOD: Duration = Duration::from_secs(1);

/// Default number of reports kept while no inspector is attached.
pub const DEFAULT_BUFFER_CAPACITY: usize = 10_000;

/// Smallest accepted retry period.
pub const MIN_RETRY_PERIOD: Duration = Duration::from_millis(1);

/// Settings of an [`Instrumentation`](crate::Instrumentation) context.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct InstrumentationConfig {
    /// How often the retry timer checks for an attached inspector.
    pub retry_period: Duration,
    /// Maximum number of buffered reports, `None` for no bound. A zero bound
    /// is raised to one.
    pub buffer_capacity: Option<usize>,
    /// Whether to fall back to the process-wide inspector handle.
    pub use_global_inspector: bool,
}

impl Default for InstrumentationConfig {
    fn default() -> Self {
        Self {
            retry_period: DEFAULT_RETRY_PERIOD,
            buffer_capacity: Some(DEFAULT_BUFFER_CAPACITY),
            use_global_inspector: true,
        }
    }
}

impl InstrumentationConfig {
    /// The defaults, adjusted by the `CLUTCH_INSPECT` environment variable.
    pub fn from_env() -> Self {
        static CLUTCH_INSPECT: OnceLock<InstrumentationConfig> = OnceLock::new();

        *CLUTCH_INSPECT.get_or_init(|| match std::env::var_os("CLUTCH_INSPECT") {
            Some(var) => Self::parse_options(&var.to_string_lossy()),
            None => Self::default(),
        })
    }

    /// Applies a comma-separated option list on top of the defaults.
    pub fn parse_options(options: &str) -> Self {
        let mut config = Self::default();

        for option in options.split(',').map(str::trim) {
            let (name, value) = match option.split_once('=') {
                Some((name, value)) => (name.trim(), Some(value.trim())),
                None => (option, None),
            };

            if name.eq_ignore_ascii_case("unbounded") {
                config.buffer_capacity = None;
            } else if name.eq_ignore_ascii_case("local-only") {
                config.use_global_inspector = false;
            } else if name.eq_ignore_ascii_case("capacity") {
                if let Some(capacity) = value.and_then(|v| v.parse().ok()) {
                    config.buffer_capacity = Some(capacity);
                }
            } else if name.eq_ignore_ascii_case("retry-ms") {
                if let Some(millis) = value.and_then(|v| v.parse().ok()) {
                    config.retry_period = Duration::from_millis(millis);
                }
            }
        }

        config.normalized()
    }

    pub(crate) fn normalized(mut self) -> Self {
        self.retry_period = self.retry_period.max(MIN_RETRY_PERIOD);
        self.buffer_capacity = self.buffer_capacity.map(|capacity| capacity.max(1));
        self
    }
}
