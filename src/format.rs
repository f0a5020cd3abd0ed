//! Rendering of a single log record into one line of text.

use std::fmt;
use std::panic::Location;

use once_cell::sync::OnceCell;
use time::{OffsetDateTime, UtcOffset};

use crate::Level;

/// Source location a record was emitted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallSite<'a> {
    pub file: &'a str,
    pub line: u32,
}

impl<'a> CallSite<'a> {
    pub fn new(file: &'a str, line: u32) -> Self {
        Self { file, line }
    }

    /// File name without its directories.
    pub fn file_name(&self) -> &'a str {
        self.file.rsplit(['/', '\\']).next().unwrap_or(self.file)
    }
}

impl From<&'static Location<'static>> for CallSite<'static> {
    fn from(location: &'static Location<'static>) -> Self {
        Self::new(location.file(), location.line())
    }
}

/// A record waiting to be rendered.
#[derive(Debug, Clone, Copy)]
pub struct LogRecord<'a> {
    pub level: Level,
    pub args: fmt::Arguments<'a>,
    pub timestamp: OffsetDateTime,
    pub call_site: CallSite<'a>,
}

impl<'a> LogRecord<'a> {
    /// Create a record stamped with the current local time.
    pub fn new(level: Level, args: fmt::Arguments<'a>, call_site: CallSite<'a>) -> Self {
        Self {
            level,
            args,
            timestamp: now_local(),
            call_site,
        }
    }
}

static LOCAL_OFFSET: OnceCell<UtcOffset> = OnceCell::new();

/// The process's local UTC offset, resolved once.
///
/// The platform may refuse to report the offset once other threads are
/// running, so the first logger resolves it before it spawns any. If it is
/// still unknown, UTC is used for the life of the process.
pub(crate) fn local_offset() -> UtcOffset {
    *LOCAL_OFFSET.get_or_init(|| UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC))
}

/// Current time in the cached local offset.
pub(crate) fn now_local() -> OffsetDateTime {
    OffsetDateTime::now_utc().to_offset(local_offset())
}

/// Render a record as `[YYYY-MM-DD] HH:MM:SS.fffff [TAG] message file:line`.
pub fn render(record: &LogRecord<'_>) -> String {
    let ts = record.timestamp;
    format!(
        "[{:04}-{:02}-{:02}] {:02}:{:02}:{:02}.{:05} [{}] {} {}:{}",
        ts.year(),
        u8::from(ts.month()),
        ts.day(),
        ts.hour(),
        ts.minute(),
        ts.second(),
        ts.nanosecond() / 10_000,
        record.level.tag(),
        record.args,
        record.call_site.file_name(),
        record.call_site.line,
    )
}
