//! # Logging
//!
//! Installs the global `tracing` subscriber for the playback core and mirrors
//! events to the host through a [`LoggerSink`].
//!
//! Three layers are stacked on the registry:
//!
//! 1. an [`EnvFilter`] built from [`LoggingConfig`],
//! 2. a [`HostSinkLayer`] that turns events into [`LogEntry`] values for the
//!    host,
//! 3. a `fmt` layer writing to stdout in the selected [`LogFormat`].
//!
//! ```ignore
//! use bridge_traits::logging::{ConsoleLogger, LogLevel};
//! use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
//! use std::sync::Arc;
//!
//! init_logging(
//!     LoggingConfig::default()
//!         .with_format(LogFormat::Compact)
//!         .with_level(LogLevel::Debug)
//!         .with_sink(Arc::new(ConsoleLogger::default())),
//! )?;
//! ```
//!
//! ## Redaction
//!
//! Media URLs are usually signed: CDN tokens, policies and signatures travel
//! in the query string. Code that logs a URL passes it through
//! [`redact_url`]. With redaction enabled the host sink additionally masks
//! credential-like fields and any URL-shaped value.

use crate::error::{Error, Result};

use bridge_traits::logging::{LogEntry, LogLevel, LoggerSink};

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::str::FromStr;
use std::sync::Arc;

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::{
    filter::EnvFilter,
    fmt::format::FmtSpan,
    layer::{Context, SubscriberExt},
    registry::LookupSpan,
    util::SubscriberInitExt,
    Layer,
};

/// Crates that follow [`LoggingConfig::level`] when no custom filter is set.
/// Everything else is capped at `warn`.
const PLAYBACK_CRATES: &[&str] = &["bridge_traits", "core_runtime", "core_playback"];

/// Field names whose values never reach the host sink when redaction is on.
const CREDENTIAL_FIELDS: &[&str] = &[
    "token",
    "secret",
    "password",
    "authorization",
    "api_key",
    "cookie",
    "license",
    "signature",
];

const REDACTED: &str = "[REDACTED]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, coloured output for development.
    Pretty,
    /// One JSON object per line.
    Json,
    /// Single-line text.
    Compact,
}

impl Default for LogFormat {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            "compact" => Ok(Self::Compact),
            other => Err(Error::Config(format!("Unknown log format '{other}'"))),
        }
    }
}

#[derive(Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Level applied to the playback crates.
    pub level: LogLevel,
    /// Full `EnvFilter` directive string; replaces the level-based default.
    pub filter: Option<String>,
    /// Mask credentials and signed URLs before entries reach the sink.
    pub redact: bool,
    /// Whether stdout lines show the event target.
    pub show_target: bool,
    /// Record span enter/exit in the `Pretty` format.
    pub span_events: bool,
    pub sink: Option<Arc<dyn LoggerSink>>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: LogLevel::Info,
            filter: None,
            redact: true,
            show_target: true,
            span_events: false,
            sink: None,
        }
    }
}

impl fmt::Debug for LoggingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggingConfig")
            .field("format", &self.format)
            .field("level", &self.level)
            .field("filter", &self.filter)
            .field("redact", &self.redact)
            .field("sink", &self.sink.as_ref().map(|_| "<dyn LoggerSink>"))
            .finish()
    }
}

impl LoggingConfig {
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_filter(mut self, directives: impl Into<String>) -> Self {
        self.filter = Some(directives.into());
        self
    }

    pub fn with_redaction(mut self, redact: bool) -> Self {
        self.redact = redact;
        self
    }

    pub fn with_target(mut self, show: bool) -> Self {
        self.show_target = show;
        self
    }

    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.span_events = enabled;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn LoggerSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// The directive string handed to [`EnvFilter`].
    pub fn directives(&self) -> String {
        if let Some(custom) = &self.filter {
            return custom.clone();
        }
        let level = self.level.as_str().to_ascii_lowercase();
        std::iter::once("warn".to_string())
            .chain(PLAYBACK_CRATES.iter().map(|name| format!("{name}={level}")))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Installs the global subscriber.
///
/// Only the first successful call in a process takes effect.
///
/// # Errors
///
/// - [`Error::Config`] if the filter directives do not parse
/// - [`Error::Logging`] if a global subscriber is already installed
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_new(config.directives())
        .map_err(|e| Error::Config(format!("Invalid log filter: {e}")))?;

    let base = tracing_subscriber::fmt::layer()
        .with_target(config.show_target)
        .with_writer(io::stdout);
    let output = match config.format {
        LogFormat::Pretty => {
            let spans = if config.span_events {
                FmtSpan::ENTER | FmtSpan::CLOSE
            } else {
                FmtSpan::NONE
            };
            base.pretty().with_span_events(spans).boxed()
        }
        LogFormat::Json => base.json().flatten_event(true).boxed(),
        LogFormat::Compact => base.compact().boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(HostSinkLayer::new(config.sink, config.redact))
        .with(output)
        .try_init()
        .map_err(|e| Error::Logging(e.to_string()))
}

/// Converts events into [`LogEntry`] values and hands them to a host sink.
///
/// Delivery is spawned onto the current Tokio runtime when there is one and
/// blocks otherwise.
pub struct HostSinkLayer {
    sink: Option<Arc<dyn LoggerSink>>,
    redact: bool,
}

impl HostSinkLayer {
    pub fn new(sink: Option<Arc<dyn LoggerSink>>, redact: bool) -> Self {
        Self { sink, redact }
    }
}

impl<S> Layer<S> for HostSinkLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let Some(sink) = &self.sink else {
            return;
        };
        let metadata = event.metadata();
        let level = host_level(*metadata.level());
        if level < sink.min_level() {
            return;
        }

        let mut fields = FieldCollector::new(self.redact);
        event.record(&mut fields);

        let message = fields
            .message
            .take()
            .unwrap_or_else(|| metadata.name().to_string());
        let mut entry = LogEntry::new(level, metadata.target(), message);
        entry.fields = fields.values;
        if let Some(span) = ctx.event_span(event) {
            entry = entry.with_span_id(span.name());
        }

        deliver(Arc::clone(sink), entry);
    }
}

fn deliver(sink: Arc<dyn LoggerSink>, entry: LogEntry) {
    match tokio::runtime::Handle::try_current() {
        Ok(runtime) => {
            runtime.spawn(async move {
                if let Err(err) = sink.log(entry).await {
                    eprintln!("host log sink rejected entry: {err}");
                }
            });
        }
        Err(_) => {
            if let Err(err) = futures::executor::block_on(sink.log(entry)) {
                eprintln!("host log sink rejected entry: {err}");
            }
        }
    }
}

fn host_level(level: tracing::Level) -> LogLevel {
    match level {
        tracing::Level::ERROR => LogLevel::Error,
        tracing::Level::WARN => LogLevel::Warn,
        tracing::Level::INFO => LogLevel::Info,
        tracing::Level::DEBUG => LogLevel::Debug,
        tracing::Level::TRACE => LogLevel::Trace,
    }
}

struct FieldCollector {
    redact: bool,
    message: Option<String>,
    values: HashMap<String, String>,
}

impl FieldCollector {
    fn new(redact: bool) -> Self {
        Self {
            redact,
            message: None,
            values: HashMap::new(),
        }
    }

    fn insert(&mut self, field: &Field, value: String) {
        let name = field.name();
        if name == "message" {
            self.message = Some(value);
            return;
        }
        let value = if !self.redact {
            value
        } else if is_credential_field(name) {
            REDACTED.to_string()
        } else {
            redact_url(&value).into_owned()
        };
        self.values.insert(name.to_string(), value);
    }
}

// Numbers and bools arrive through the default `record_*` methods, which
// forward to `record_debug`.
impl Visit for FieldCollector {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, value.to_string());
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.insert(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.insert(field, format!("{value:?}"));
    }
}

fn is_credential_field(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    CREDENTIAL_FIELDS.iter().any(|marker| name.contains(marker))
}

/// Returns `value` unless `field_name` looks like it holds a credential.
///
/// ```
/// use core_runtime::logging::redact_if_sensitive;
///
/// assert_eq!(redact_if_sensitive("drm_license_token", "abc"), "[REDACTED]");
/// assert_eq!(redact_if_sensitive("item_id", "abc"), "abc");
/// ```
pub fn redact_if_sensitive<'a>(field_name: &str, value: &'a str) -> Cow<'a, str> {
    if is_credential_field(field_name) {
        Cow::Borrowed(REDACTED)
    } else {
        Cow::Borrowed(value)
    }
}

/// Drops the query string and fragment of an absolute URL.
///
/// ```
/// use core_runtime::logging::redact_url;
///
/// assert_eq!(
///     redact_url("https://cdn.example.com/live/master.m3u8?hdnts=exp=1~hmac=ab"),
///     "https://cdn.example.com/live/master.m3u8?[REDACTED]"
/// );
/// ```
pub fn redact_url(value: &str) -> Cow<'_, str> {
    if !value.contains("://") {
        return Cow::Borrowed(value);
    }
    match value.split_once(['?', '#']) {
        Some((location, _)) => Cow::Owned(format!("{location}?{REDACTED}")),
        None => Cow::Borrowed(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CapturingSink {
        entries: Mutex<Vec<LogEntry>>,
    }

    #[async_trait]
    impl LoggerSink for CapturingSink {
        async fn log(&self, entry: LogEntry) -> bridge_traits::error::Result<()> {
            self.entries.lock().unwrap().push(entry);
            Ok(())
        }

        fn min_level(&self) -> LogLevel {
            LogLevel::Debug
        }
    }

    fn capture(redact: bool, emit: impl FnOnce()) -> Vec<LogEntry> {
        let sink = Arc::new(CapturingSink::default());
        let layer = HostSinkLayer::new(Some(sink.clone()), redact);
        let subscriber = tracing_subscriber::registry().with(layer);
        tracing::subscriber::with_default(subscriber, emit);
        let entries = sink.entries.lock().unwrap().clone();
        entries
    }

    #[test]
    fn test_default_directives_cover_playback_crates() {
        let directives = LoggingConfig::default()
            .with_level(LogLevel::Debug)
            .directives();
        assert_eq!(
            directives,
            "warn,bridge_traits=debug,core_runtime=debug,core_playback=debug"
        );
    }

    #[test]
    fn test_custom_filter_replaces_defaults() {
        let config = LoggingConfig::default().with_filter("core_playback::seek=trace");
        assert_eq!(config.directives(), "core_playback::seek=trace");
        assert!(EnvFilter::try_new(config.directives()).is_ok());
    }

    #[test]
    fn test_log_format_parsing() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!(" compact ".parse::<LogFormat>().unwrap(), LogFormat::Compact);
        assert!(matches!("xml".parse::<LogFormat>(), Err(Error::Config(_))));
    }

    #[test]
    fn test_redact_url() {
        assert_eq!(redact_url("https://cdn/a.m3u8?token=abc"), "https://cdn/a.m3u8?[REDACTED]");
        assert_eq!(redact_url("https://cdn/a.m3u8#t=10"), "https://cdn/a.m3u8?[REDACTED]");
        assert!(matches!(redact_url("https://cdn/a.m3u8"), Cow::Borrowed(_)));
        assert_eq!(redact_url("what? no url"), "what? no url");
    }

    #[test]
    fn test_sink_receives_redacted_fields() {
        let entries = capture(true, || {
            tracing::info!(
                target: "core_playback::queue",
                item_id = "a",
                url = "https://cdn/a.m3u8?token=abc",
                auth_token = "secret",
                "item inserted"
            );
        });

        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.target, "core_playback::queue");
        assert_eq!(entry.message, "item inserted");
        assert_eq!(entry.fields["item_id"], "a");
        assert_eq!(entry.fields["url"], "https://cdn/a.m3u8?[REDACTED]");
        assert_eq!(entry.fields["auth_token"], "[REDACTED]");
    }

    #[test]
    fn test_sink_keeps_values_without_redaction() {
        let entries = capture(false, || {
            tracing::warn!(url = "https://cdn/a.m3u8?token=abc", attempt = 2, "seek retried");
        });

        assert_eq!(entries[0].fields["url"], "https://cdn/a.m3u8?token=abc");
        assert_eq!(entries[0].fields["attempt"], "2");
        assert_eq!(entries[0].level, LogLevel::Warn);
    }

    #[test]
    fn test_sink_min_level_drops_trace() {
        let entries = capture(true, || {
            tracing::trace!("too chatty");
            tracing::debug!("kept");
        });

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message, "kept");
    }

    #[test]
    fn test_span_name_is_attached() {
        let entries = capture(true, || {
            let span = tracing::info_span!("seek");
            let _entered = span.enter();
            tracing::info!("seek issued");
        });

        assert_eq!(entries[0].span_id.as_deref(), Some("seek"));
    }
}
