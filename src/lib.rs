//! # Blocklog
//!
//! A leveled file logger with rotation and keyed, buffered log blocks.
//!
//! ## Features
//!
//! - File or standard output logging with a level threshold
//! - Automatic log rotation by size (numbered generations) or by day, hour or minute
//! - Lines sharing a correlation key are buffered and written as one block
//! - Blocks that are never flushed expire after a configurable TTL
//! - A `tracing` layer routing events into a logger
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use blocklog::{BufferedLogger, Level, LogConfig, RotationPolicy};
//!
//! let config = LogConfig::new("logs", "orders")
//!     .with_level(Level::Debug)
//!     .with_rotation(RotationPolicy::size(10 * 1024 * 1024, 5))
//!     .with_buffer_ttl(Duration::from_secs(30));
//! let logger = BufferedLogger::new(config)?;
//!
//! blocklog::info!(logger, 0, "service started")?;
//! blocklog::debug!(logger, 42, "order {} received", 42)?;
//! blocklog::debug!(logger, 42, "order {} shipped", 42)?;
//! logger.flush(42)?;
//! logger.close()?;
//! # Ok::<(), blocklog::Error>(())
//! ```

pub mod buffer;
pub mod config;
pub mod error;
pub mod format;
pub mod level;
mod macros;
pub mod registry;
pub mod rotation;
pub mod tracing_init;
pub mod writer;

pub use buffer::{BufferedLogger, DIRECT_KEY};
pub use config::LogConfig;
pub use error::{Error, Result};
pub use format::{CallSite, LogRecord};
pub use level::Level;
pub use registry::LoggerRegistry;
pub use rotation::RotationPolicy;
pub use tracing_init::{LoggerLayer, init_logging};
pub use writer::RotatingFileWriter;
