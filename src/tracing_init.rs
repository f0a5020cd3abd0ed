//! Bridge from the `tracing` ecosystem into a [`BufferedLogger`].
//!
//! Events are rendered through the same formatter as direct calls. An event
//! carrying an integer `key` field is buffered under that correlation key;
//! other fields are appended to the message as `name=value`.

use std::fmt::{self, Write as _};
use std::sync::Arc;

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::format::CallSite;
use crate::{BufferedLogger, Error, Level, Result};

/// A [`Layer`] that writes `tracing` events through a [`BufferedLogger`].
#[derive(Debug, Clone)]
pub struct LoggerLayer {
    logger: Arc<BufferedLogger>,
}

impl LoggerLayer {
    pub fn new(logger: Arc<BufferedLogger>) -> Self {
        Self { logger }
    }
}

impl<S: Subscriber> Layer<S> for LoggerLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);

        let call_site = CallSite::new(
            metadata.file().unwrap_or_else(|| metadata.target()),
            metadata.line().unwrap_or(0),
        );
        let result = self.logger.log_with_call_site(
            Level::from(*metadata.level()),
            visitor.key,
            call_site,
            format_args!("{}", visitor),
        );
        // Reporting through tracing here would re-enter this layer.
        if let Err(err) = result {
            eprintln!("blocklog: failed to write tracing event: {}", err);
        }
    }
}

#[derive(Default)]
struct EventVisitor {
    key: i64,
    message: String,
    fields: String,
}

impl EventVisitor {
    fn push_field(&mut self, field: &Field, value: fmt::Arguments<'_>) {
        let _ = write!(self.fields, " {}={}", field.name(), value);
    }
}

impl Visit for EventVisitor {
    fn record_i64(&mut self, field: &Field, value: i64) {
        if field.name() == "key" {
            self.key = value;
        } else {
            self.push_field(field, format_args!("{}", value));
        }
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        match i64::try_from(value) {
            Ok(key) if field.name() == "key" => self.key = key,
            _ => self.push_field(field, format_args!("{}", value)),
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            self.push_field(field, format_args!("{}", value));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{:?}", value);
        } else {
            self.push_field(field, format_args!("{:?}", value));
        }
    }
}

impl fmt::Display for EventVisitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.message, self.fields)
    }
}

/// Install a global subscriber that routes `tracing` events into `logger`.
///
/// `RUST_LOG` takes precedence over the logger's own level when choosing
/// which events reach it.
pub fn init_logging(logger: Arc<BufferedLogger>) -> Result<()> {
    let log_spec = effective_log_spec(logger.level());
    let env_filter = EnvFilter::try_new(&log_spec).map_err(|e| Error::Init(e.to_string()))?;

    tracing_subscriber::registry()
        .with(env_filter)
        .with(LoggerLayer::new(logger))
        .try_init()
        .map_err(|e| Error::Init(e.to_string()))?;

    Ok(())
}

/// Determine the effective filter directive for a logger level.
fn effective_log_spec(level: Level) -> String {
    // RUST_LOG takes precedence over everything
    if let Ok(rust_log) = std::env::var("RUST_LOG") {
        if !rust_log.is_empty() {
            return rust_log;
        }
    }
    level.as_directive().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LogConfig;
    use crate::buffer::DIRECT_KEY;
    use tracing_subscriber::Registry;

    fn with_layer(logger: &Arc<BufferedLogger>, f: impl FnOnce()) {
        let subscriber = Registry::default().with(LoggerLayer::new(Arc::clone(logger)));
        tracing::subscriber::with_default(subscriber, f);
    }

    #[test]
    fn test_events_are_rendered_with_call_site() {
        let dir = tempfile::tempdir().unwrap();
        let logger = Arc::new(BufferedLogger::new(LogConfig::new(dir.path(), "test")).unwrap());

        with_layer(&logger, || {
            tracing::warn!(user = "bob", "disk almost full");
        });

        let content = std::fs::read_to_string(dir.path().join("test.log")).unwrap();
        assert!(content.contains("[WARN] disk almost full user=bob tracing_init.rs:"));
    }

    #[test]
    fn test_key_field_buffers_event() {
        let dir = tempfile::tempdir().unwrap();
        let logger = Arc::new(BufferedLogger::new(LogConfig::new(dir.path(), "test")).unwrap());

        with_layer(&logger, || {
            tracing::info!(key = 12u64, "step one");
            tracing::info!(key = 12, "step two");
        });
        assert!(logger.is_buffered(12));

        logger.flush(12).unwrap();
        let content = std::fs::read_to_string(dir.path().join("test.log")).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.first(), Some(&"[Log Begin], [Key=12]"));
        assert!(lines[1].contains("[INFO] step one"));
        assert!(lines[2].contains("[INFO] step two"));
        assert_eq!(lines.last(), Some(&"[Log End], [Key=12]"));
    }

    #[test]
    fn test_negative_key_field_buffers_event() {
        let dir = tempfile::tempdir().unwrap();
        let logger = Arc::new(BufferedLogger::new(LogConfig::new(dir.path(), "test")).unwrap());

        with_layer(&logger, || {
            tracing::info!(key = -3i64, "signed key");
        });
        assert!(logger.is_buffered(-3));
        assert_eq!(logger.buffered_len(), 1);
    }

    #[test]
    fn test_events_above_level_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let logger = Arc::new(BufferedLogger::new(LogConfig::new(dir.path(), "test")).unwrap());

        with_layer(&logger, || {
            tracing::debug!("hidden");
            tracing::trace!("hidden too");
        });
        assert!(!dir.path().join("test.log").exists());
    }

    #[test]
    fn test_direct_key_default() {
        assert_eq!(EventVisitor::default().key, DIRECT_KEY);
    }

    #[test]
    fn test_effective_log_spec_from_level() {
        let prev = std::env::var_os("RUST_LOG");
        unsafe {
            std::env::set_var("RUST_LOG", "");
        }

        assert_eq!(effective_log_spec(Level::Warn), "warn");
        assert_eq!(effective_log_spec(Level::Fatal), "error");
        assert_eq!(effective_log_spec(Level::Stdout), "trace");

        unsafe {
            match prev {
                Some(v) => std::env::set_var("RUST_LOG", v),
                None => std::env::remove_var("RUST_LOG"),
            }
        }
    }

    #[test]
    fn test_init_logging_does_not_panic() {
        let logger = Arc::new(BufferedLogger::stdout());
        // May fail if a global subscriber is already installed, but shouldn't panic
        let result = init_logging(logger);
        assert!(result.is_ok() || matches!(result, Err(Error::Init(_))));
    }
}
