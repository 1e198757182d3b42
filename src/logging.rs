//! Logging for lifecycle-injector
//!
//! Two layers live here:
//!
//! - [`LogSink`]: the leveled sink every scope owns. It carries a minimum
//!   level and an optional [`Dispatch`]; crate events are filtered by the level
//!   and, when a dispatch is set, delivered to it instead of the global
//!   subscriber. [`App::set_logger`](crate::App::set_logger) and
//!   [`App::set_log_level`](crate::App::set_log_level) configure it.
//! - [`LoggingBuilder`]: one-call setup of a `tracing-subscriber` fmt
//!   subscriber, either installed globally or returned as a [`Dispatch`].
//!
//! # Features
//!
//! - `logging-json` - Use JSON structured output (recommended for production)
//! - `logging-pretty` - Use colorful pretty output (recommended for development)
//!
//! # Example
//!
//! ```rust,ignore
//! use lifecycle_injector::{logging, App};
//! use tracing::level_filters::LevelFilter;
//!
//! // Global subscriber for the whole process
//! logging::init();
//!
//! // Or route one app's events to its own subscriber
//! let app = App::new();
//! app.set_logger(logging::builder().compact().debug().dispatch());
//! app.set_log_level(LevelFilter::WARN);
//! ```

use parking_lot::RwLock;
use tracing::level_filters::LevelFilter;
use tracing::{Dispatch, Level};

/// Target used by every event this crate emits.
pub const TARGET: &str = "lifecycle_injector";

/// Emit a `tracing` event through a [`LogSink`].
macro_rules! di_event {
    ($sink:expr, $level:ident, $($arg:tt)+) => {
        $sink.emit(::tracing::Level::$level, || {
            ::tracing::event!(target: $crate::logging::TARGET, ::tracing::Level::$level, $($arg)+)
        })
    };
}

pub(crate) use di_event;

/// Logger and level a scope emits with.
#[derive(Debug, Clone)]
pub struct LogConfig {
    dispatch: Option<Dispatch>,
    level: LevelFilter,
}

impl LogConfig {
    const DEFAULT: Self = Self {
        dispatch: None,
        level: LevelFilter::TRACE,
    };
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Leveled logging sink owned by each scope.
#[derive(Debug)]
pub struct LogSink {
    config: RwLock<LogConfig>,
}

/// Sink for contexts that are not bound to any scope.
pub(crate) static DETACHED: LogSink = LogSink::detached();

impl LogSink {
    pub(crate) const fn detached() -> Self {
        Self {
            config: parking_lot::const_rwlock(LogConfig::DEFAULT),
        }
    }

    pub(crate) fn new(config: LogConfig) -> Self {
        Self {
            config: RwLock::new(config),
        }
    }

    /// Copy of the current logger and level.
    pub fn snapshot(&self) -> LogConfig {
        self.config.read().clone()
    }

    /// Minimum level that passes this sink.
    pub fn level(&self) -> LevelFilter {
        self.config.read().level
    }

    pub fn has_logger(&self) -> bool {
        self.config.read().dispatch.is_some()
    }

    pub(crate) fn set_level(&self, level: LevelFilter) {
        self.config.write().level = level;
    }

    pub(crate) fn set_dispatch(&self, dispatch: Dispatch) {
        self.config.write().dispatch = Some(dispatch);
    }

    /// Whether an event at `level` passes this sink.
    #[inline]
    pub fn enabled(&self, level: Level) -> bool {
        level <= self.config.read().level
    }

    /// Run `event` if `level` passes, inside the sink's dispatch when one is set.
    pub(crate) fn emit(&self, level: Level, event: impl FnOnce()) {
        let dispatch = {
            let config = self.config.read();
            if level > config.level {
                return;
            }
            config.dispatch.clone()
        };

        match dispatch {
            Some(dispatch) => tracing::dispatcher::with_default(&dispatch, event),
            None => event(),
        }
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::detached()
    }
}

/// Logging format configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// JSON structured logging (production default)
    #[default]
    Json,
    /// Pretty colorful output (development)
    Pretty,
    /// Compact single-line output
    Compact,
}

/// Builder for subscriber configuration
#[derive(Debug, Clone)]
pub struct LoggingBuilder {
    level: Level,
    format: LogFormat,
    target: Option<&'static str>,
    with_file: bool,
    with_line_number: bool,
    with_thread_ids: bool,
    with_thread_names: bool,
}

impl Default for LoggingBuilder {
    fn default() -> Self {
        Self {
            level: Level::DEBUG,
            format: LogFormat::Json,
            target: None,
            with_file: false,
            with_line_number: false,
            with_thread_ids: false,
            with_thread_names: false,
        }
    }
}

impl LoggingBuilder {
    /// Create a new logging builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the minimum log level
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn trace(self) -> Self {
        self.with_level(Level::TRACE)
    }

    pub fn debug(self) -> Self {
        self.with_level(Level::DEBUG)
    }

    pub fn info(self) -> Self {
        self.with_level(Level::INFO)
    }

    pub fn warn(self) -> Self {
        self.with_level(Level::WARN)
    }

    pub fn error(self) -> Self {
        self.with_level(Level::ERROR)
    }

    /// Filter to only show logs from a specific target
    pub fn with_target_filter(mut self, target: &'static str) -> Self {
        self.target = Some(target);
        self
    }

    /// Only show lifecycle-injector logs
    pub fn crate_only(self) -> Self {
        self.with_target_filter(TARGET)
    }

    /// Include file names in log output
    pub fn with_file(mut self) -> Self {
        self.with_file = true;
        self
    }

    /// Include line numbers in log output
    pub fn with_line_number(mut self) -> Self {
        self.with_line_number = true;
        self
    }

    /// Include thread IDs in log output
    pub fn with_thread_ids(mut self) -> Self {
        self.with_thread_ids = true;
        self
    }

    /// Include thread names in log output
    pub fn with_thread_names(mut self) -> Self {
        self.with_thread_names = true;
        self
    }

    /// Use JSON structured logging format
    pub fn json(mut self) -> Self {
        self.format = LogFormat::Json;
        self
    }

    /// Use pretty colorful logging format
    pub fn pretty(mut self) -> Self {
        self.format = LogFormat::Pretty;
        self
    }

    /// Use compact single-line logging format
    pub fn compact(mut self) -> Self {
        self.format = LogFormat::Compact;
        self
    }

    /// Build the configured subscriber as a [`Dispatch`], for
    /// [`App::set_logger`](crate::App::set_logger).
    #[cfg(any(feature = "logging-json", feature = "logging-pretty"))]
    pub fn dispatch(self) -> Dispatch {
        use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

        let filter = match self.target {
            Some(target) => EnvFilter::new(format!("{}={}", target, self.level)),
            None => EnvFilter::new(self.level.to_string()),
        };

        let layer = match self.format {
            #[cfg(feature = "logging-json")]
            LogFormat::Json => fmt::layer()
                .json()
                .with_file(self.with_file)
                .with_line_number(self.with_line_number)
                .with_thread_ids(self.with_thread_ids)
                .with_thread_names(self.with_thread_names)
                .boxed(),
            // Fall back to pretty if json not enabled
            #[cfg(not(feature = "logging-json"))]
            LogFormat::Json => fmt::layer()
                .pretty()
                .with_file(self.with_file)
                .with_line_number(self.with_line_number)
                .with_thread_ids(self.with_thread_ids)
                .with_thread_names(self.with_thread_names)
                .boxed(),
            LogFormat::Pretty => fmt::layer()
                .pretty()
                .with_file(self.with_file)
                .with_line_number(self.with_line_number)
                .with_thread_ids(self.with_thread_ids)
                .with_thread_names(self.with_thread_names)
                .boxed(),
            LogFormat::Compact => fmt::layer()
                .compact()
                .with_file(self.with_file)
                .with_line_number(self.with_line_number)
                .with_thread_ids(self.with_thread_ids)
                .with_thread_names(self.with_thread_names)
                .boxed(),
        };

        Dispatch::new(tracing_subscriber::registry().with(filter).with(layer))
    }

    /// Install the configured subscriber as the global default.
    ///
    /// Requires either `logging-json` or `logging-pretty` feature to be enabled.
    #[cfg(any(feature = "logging-json", feature = "logging-pretty"))]
    pub fn init(self) {
        // A global subscriber may already be installed by the host application
        let _ = tracing::dispatcher::set_global_default(self.dispatch());
    }

    /// Initialize (no-op when subscriber features not available)
    #[cfg(not(any(feature = "logging-json", feature = "logging-pretty")))]
    pub fn init(self) {}
}

/// Create a new logging builder
pub fn builder() -> LoggingBuilder {
    LoggingBuilder::new()
}

/// Initialize logging with default settings
///
/// Uses JSON format if `logging-json` feature is enabled,
/// otherwise uses pretty format if `logging-pretty` is enabled.
pub fn init() {
    #[cfg(feature = "logging-json")]
    builder().json().debug().init();

    #[cfg(all(feature = "logging-pretty", not(feature = "logging-json")))]
    builder().pretty().debug().init();
}

/// Initialize logging for lifecycle-injector only (filters other crates)
pub fn init_crate_only() {
    builder().crate_only().debug().init();
}

#[cfg(test)]
pub(crate) mod test_support {
    use parking_lot::Mutex;
    use std::io;
    use std::sync::Arc;
    use tracing::Dispatch;

    /// In-memory writer collecting formatted events.
    #[derive(Clone, Default)]
    pub(crate) struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Captured {
        pub(crate) fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock()).into_owned()
        }

        pub(crate) fn dispatch(&self) -> Dispatch {
            let sink = self.clone();
            let subscriber = tracing_subscriber::fmt()
                .with_ansi(false)
                .with_max_level(tracing::Level::TRACE)
                .with_writer(move || sink.clone())
                .finish();
            Dispatch::new(subscriber)
        }
    }

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }
}
