use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Severity of a log record, ordered from least to most verbose.
///
/// A logger configured at a given level emits every record whose level is
/// less than or equal to it, so a logger at `Info` emits `Fatal`, `Error`,
/// `Warn` and `Info` records but drops `Debug` and `Trace`.
///
/// `Stdout` is a sentinel: a logger configured with it emits everything and
/// writes to the standard output stream instead of a file.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Fatal,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
    All,
    Stdout,
}

impl Level {
    /// Whether a record at `self` passes a logger configured at `threshold`.
    pub fn enabled(self, threshold: Level) -> bool {
        self <= threshold
    }

    /// The bracketed tag printed in rendered lines.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Fatal => "FATAL",
            Self::Error => "ERROR",
            Self::Warn => "WARN",
            Self::Info => "INFO",
            Self::Debug => "DEBUG",
            Self::Trace => "TRACE",
            Self::All | Self::Stdout => "LOG",
        }
    }

    /// Closest `EnvFilter` directive for this level.
    pub(crate) fn as_directive(self) -> &'static str {
        match self {
            Self::Fatal | Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace | Self::All | Self::Stdout => "trace",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Level {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fatal" => Ok(Self::Fatal),
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            "all" => Ok(Self::All),
            "stdout" => Ok(Self::Stdout),
            other => Err(Error::Config(format!("unknown log level: {}", other))),
        }
    }
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::ERROR => Self::Error,
            tracing::Level::WARN => Self::Warn,
            tracing::Level::INFO => Self::Info,
            tracing::Level::DEBUG => Self::Debug,
            tracing::Level::TRACE => Self::Trace,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_info_threshold_filters_verbose_levels() {
        for level in [Level::Fatal, Level::Error, Level::Warn, Level::Info] {
            assert!(level.enabled(Level::Info), "{level} should pass INFO");
        }
        for level in [Level::Debug, Level::Trace] {
            assert!(!level.enabled(Level::Info), "{level} should not pass INFO");
        }
    }

    #[test]
    fn test_stdout_threshold_passes_everything() {
        assert!(Level::Trace.enabled(Level::Stdout));
        assert!(Level::All.enabled(Level::Stdout));
    }

    #[test]
    fn test_tags() {
        assert_eq!(Level::Fatal.tag(), "FATAL");
        assert_eq!(Level::Warn.tag(), "WARN");
        assert_eq!(Level::All.tag(), "LOG");
        assert_eq!(Level::Stdout.tag(), "LOG");
    }

    #[test]
    fn test_from_str() {
        assert_eq!("DEBUG".parse::<Level>().unwrap(), Level::Debug);
        assert_eq!(" warning ".parse::<Level>().unwrap(), Level::Warn);
        assert!(matches!("loud".parse::<Level>(), Err(Error::Config(_))));
    }

    #[test]
    fn test_deserialize() {
        let level: Level = serde_yaml::from_str("trace").unwrap();
        assert_eq!(level, Level::Trace);
        let level: Level = serde_yaml::from_str("stdout").unwrap();
        assert_eq!(level, Level::Stdout);
    }

    #[test]
    fn test_from_tracing_level() {
        assert_eq!(Level::from(tracing::Level::ERROR), Level::Error);
        assert_eq!(Level::from(tracing::Level::TRACE), Level::Trace);
    }
}
