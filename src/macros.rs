//! Leveled logging macros.
//!
//! Each macro takes a logger, a correlation key and `format!`-style
//! arguments, and evaluates to the [`Result`](crate::Result) of
//! [`BufferedLogger::log_at`](crate::BufferedLogger::log_at). The recorded
//! call site is the macro invocation.

/// Log at [`Level::Fatal`](crate::Level::Fatal).
#[macro_export]
macro_rules! fatal {
    ($logger:expr, $key:expr, $($arg:tt)+) => {
        $logger.log_at($crate::Level::Fatal, $key, format_args!($($arg)+))
    };
}

/// Log at [`Level::Error`](crate::Level::Error).
#[macro_export]
macro_rules! error {
    ($logger:expr, $key:expr, $($arg:tt)+) => {
        $logger.log_at($crate::Level::Error, $key, format_args!($($arg)+))
    };
}

/// Log at [`Level::Warn`](crate::Level::Warn).
#[macro_export]
macro_rules! warn {
    ($logger:expr, $key:expr, $($arg:tt)+) => {
        $logger.log_at($crate::Level::Warn, $key, format_args!($($arg)+))
    };
}

/// Log at [`Level::Info`](crate::Level::Info).
#[macro_export]
macro_rules! info {
    ($logger:expr, $key:expr, $($arg:tt)+) => {
        $logger.log_at($crate::Level::Info, $key, format_args!($($arg)+))
    };
}

/// Log at [`Level::Debug`](crate::Level::Debug).
#[macro_export]
macro_rules! debug {
    ($logger:expr, $key:expr, $($arg:tt)+) => {
        $logger.log_at($crate::Level::Debug, $key, format_args!($($arg)+))
    };
}

/// Log at [`Level::Trace`](crate::Level::Trace).
#[macro_export]
macro_rules! trace {
    ($logger:expr, $key:expr, $($arg:tt)+) => {
        $logger.log_at($crate::Level::Trace, $key, format_args!($($arg)+))
    };
}
