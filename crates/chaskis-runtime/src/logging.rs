//! Logging setup for the Chaskis runtime.
//!
//! A single `tracing` subscriber, configured from the `[logging]` section.
//! `RUST_LOG` overrides the configured base level; per-module `filters`
//! are added on top.
//!
//! ```rust,ignore
//! use chaskis_runtime::logging::{LoggingBuilder, SpanEvents};
//!
//! LoggingBuilder::new()
//!     .directive("chaskis_transport=trace")
//!     .span_events(SpanEvents::LIFECYCLE)
//!     .init();
//! ```
//!
//! The dispatch worker opens a `dispatch` span per line (carrying `seq`), so
//! `SpanEvents::LIFECYCLE` shows when each line starts and finishes.

use std::path::{Path, PathBuf};

use tracing::warn;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use crate::config::{LogFormat, LogOutput, LogRotation, LoggingConfig, SpanEventConfig};

const DEFAULT_LOG_FILE: &str = "chaskis.log";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpanEvents {
    pub new: bool,
    pub enter: bool,
    pub exit: bool,
    pub close: bool,
}

impl SpanEvents {
    pub const NONE: Self = Self::of(false, false, false, false);

    /// Creation and close only.
    pub const LIFECYCLE: Self = Self::of(true, false, false, true);

    /// Enter and exit only.
    pub const ACTIVE: Self = Self::of(false, true, true, false);

    pub const FULL: Self = Self::of(true, true, true, true);

    const fn of(new: bool, enter: bool, exit: bool, close: bool) -> Self {
        Self {
            new,
            enter,
            exit,
            close,
        }
    }

    fn to_fmt_span(self) -> FmtSpan {
        [
            (self.new, FmtSpan::NEW),
            (self.enter, FmtSpan::ENTER),
            (self.exit, FmtSpan::EXIT),
            (self.close, FmtSpan::CLOSE),
        ]
        .into_iter()
        .filter(|(on, _)| *on)
        .fold(FmtSpan::NONE, |acc, (_, flag)| acc | flag)
    }
}

impl From<&SpanEventConfig> for SpanEvents {
    fn from(c: &SpanEventConfig) -> Self {
        Self::of(c.new, c.enter, c.exit, c.close)
    }
}

impl From<LogRotation> for Rotation {
    fn from(rotation: LogRotation) -> Self {
        match rotation {
            LogRotation::Never => Rotation::NEVER,
            LogRotation::Hourly => Rotation::HOURLY,
            LogRotation::Daily => Rotation::DAILY,
        }
    }
}

/// Initializes logging from the `[logging]` section.
///
/// Does nothing if a global subscriber is already installed, which lets
/// tests and embedding binaries install their own first.
pub fn init_from_config(config: &LoggingConfig) {
    let _ = LoggingBuilder::from_config(config).try_init();
}

// =============================================================================
// LoggingBuilder
// =============================================================================

/// Builder for the global subscriber.
pub struct LoggingBuilder {
    base_level: tracing::Level,
    targets: Vec<String>,
    span_events: SpanEvents,
    format: LogFormat,
    output: LogOutput,
    show_target: bool,
    thread_ids: bool,
    file_location: bool,
    file_path: Option<PathBuf>,
    rotation: LogRotation,
    max_files: usize,
}

impl Default for LoggingBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LoggingBuilder {
    pub fn new() -> Self {
        Self {
            base_level: tracing::Level::INFO,
            targets: Vec::new(),
            span_events: SpanEvents::NONE,
            format: LogFormat::default(),
            output: LogOutput::default(),
            show_target: true,
            thread_ids: false,
            file_location: false,
            file_path: None,
            rotation: LogRotation::default(),
            max_files: 5,
        }
    }

    /// Mirrors a `[logging]` section.
    pub fn from_config(config: &LoggingConfig) -> Self {
        let targets = config
            .filters
            .iter()
            .map(|(module, level)| format!("{module}={}", level.as_str()))
            .collect();

        Self {
            base_level: config.level.to_tracing_level(),
            targets,
            span_events: (&config.span_events).into(),
            format: config.format,
            output: config.output,
            thread_ids: config.thread_ids,
            file_location: config.file_location,
            file_path: config.file_path.clone(),
            rotation: config.rotation,
            max_files: config.max_files as usize,
            ..Self::new()
        }
    }

    pub fn with_level(mut self, level: tracing::Level) -> Self {
        self.base_level = level;
        self
    }

    /// Adds a filter directive such as `chaskis_framework=debug`.
    pub fn directive(mut self, directive: &str) -> Self {
        self.targets.push(directive.to_owned());
        self
    }

    pub fn span_events(mut self, events: SpanEvents) -> Self {
        self.span_events = events;
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    /// Shows the module path of each event. On by default.
    pub fn with_target(mut self, enabled: bool) -> Self {
        self.show_target = enabled;
        self
    }

    pub fn with_thread_ids(mut self, enabled: bool) -> Self {
        self.thread_ids = enabled;
        self
    }

    /// Includes file names and line numbers.
    pub fn with_file_location(mut self, enabled: bool) -> Self {
        self.file_location = enabled;
        self
    }

    /// Log file for [`LogOutput::File`].
    pub fn file_path(mut self, path: PathBuf) -> Self {
        self.file_path = Some(path);
        self
    }

    pub fn rotation(mut self, rotation: LogRotation, max_files: usize) -> Self {
        self.rotation = rotation;
        self.max_files = max_files;
        self
    }

    /// `RUST_LOG` if set, else the base level; module directives on top.
    fn env_filter(&self) -> EnvFilter {
        let fallback = self.base_level.as_str().to_ascii_lowercase();
        self.targets.iter().fold(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
            |filter, target| match target.parse() {
                Ok(directive) => filter.add_directive(directive),
                Err(e) => {
                    eprintln!("Ignoring invalid log filter '{target}': {e}");
                    filter
                }
            },
        )
    }

    fn rolling_file(&self, path: &Path) -> Option<RollingFileAppender> {
        let directory = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let prefix = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(DEFAULT_LOG_FILE);

        let mut appender = RollingFileAppender::builder()
            .rotation(self.rotation.into())
            .filename_prefix(prefix);
        if self.rotation != LogRotation::Never && self.max_files > 0 {
            appender = appender.max_log_files(self.max_files);
        }
        appender
            .build(directory)
            .inspect_err(|e| eprintln!("Cannot open log file {}: {e}", path.display()))
            .ok()
    }

    /// A formatting layer for `writer` in the configured style.
    fn fmt_layer<W>(&self, writer: W) -> BoxedLayer
    where
        W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    {
        let base = fmt::layer()
            .with_writer(writer)
            .with_span_events(self.span_events.to_fmt_span())
            .with_target(self.show_target)
            .with_thread_ids(self.thread_ids)
            .with_file(self.file_location)
            .with_line_number(self.file_location);

        match self.format {
            LogFormat::Compact => base.compact().boxed(),
            LogFormat::Full => base.boxed(),
            LogFormat::Pretty => base.pretty().boxed(),
            #[cfg(feature = "json-log")]
            LogFormat::Json => base.json().boxed(),
        }
    }

    pub fn init(self) {
        let _ = self.try_init();
    }

    /// Installs the global subscriber.
    pub fn try_init(self) -> Result<(), TryInitError> {
        let mut file_missing = false;
        let layer = match self.output {
            LogOutput::Stdout => self.fmt_layer(std::io::stdout),
            LogOutput::Stderr => self.fmt_layer(std::io::stderr),
            LogOutput::File => match self.file_path.as_deref().and_then(|p| self.rolling_file(p)) {
                Some(appender) => self.fmt_layer(appender),
                None => {
                    file_missing = true;
                    self.fmt_layer(std::io::stdout)
                }
            },
        };

        tracing_subscriber::registry()
            .with(layer)
            .with(self.env_filter())
            .try_init()?;

        if file_missing {
            warn!("Log file unavailable, logging to stdout");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;
    use std::collections::HashMap;

    #[test]
    fn builder_reads_config() {
        let config = LoggingConfig {
            level: LogLevel::Debug,
            thread_ids: true,
            file_location: true,
            filters: HashMap::from([("chaskis_transport".to_string(), LogLevel::Trace)]),
            ..Default::default()
        };
        let builder = LoggingBuilder::from_config(&config);
        assert_eq!(builder.base_level, tracing::Level::DEBUG);
        assert!(builder.thread_ids);
        assert!(builder.file_location);
        assert!(builder.show_target);
        assert_eq!(builder.targets, ["chaskis_transport=trace"]);
    }

    #[test]
    fn span_events_map_to_fmt_span() {
        let span = SpanEvents::LIFECYCLE.to_fmt_span();
        assert_eq!(span, FmtSpan::NEW | FmtSpan::CLOSE);
        assert_eq!(SpanEvents::NONE.to_fmt_span(), FmtSpan::NONE);
        assert_eq!(SpanEvents::ACTIVE.to_fmt_span(), FmtSpan::ACTIVE);
        assert_eq!(SpanEvents::FULL.to_fmt_span(), FmtSpan::FULL);
    }
}
