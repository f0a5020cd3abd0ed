use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Level, Result, RotationPolicy};

/// Configuration of one logger instance.
///
/// Timestamps and rotation windows use the local UTC offset captured when the
/// first logger is created. Where it cannot be determined they are in UTC,
/// and offset changes such as daylight saving are not picked up until restart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Directory holding the log files; empty means the working directory.
    #[serde(default)]
    pub dir: PathBuf,
    /// File name prefix: the current file is `{dir}/{prefix}.log`.
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// Most verbose level that is emitted.
    #[serde(default)]
    pub level: Level,
    /// Log rotation policy
    #[serde(default)]
    pub rotation: RotationPolicy,
    /// How long a keyed buffer may live before the background sweep flushes
    /// it. Zero disables the sweep; keyed buffering and manual flush still work.
    #[serde(default, rename = "buffer_ttl_ms", with = "duration_millis")]
    pub buffer_ttl: Duration,
}

impl LogConfig {
    /// Create a new LogConfig writing `{dir}/{prefix}.log`.
    pub fn new<P: Into<PathBuf>>(dir: P, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            level: Level::default(),
            rotation: RotationPolicy::default(),
            buffer_ttl: Duration::ZERO,
        }
    }

    /// Configuration that writes every record to standard output.
    pub fn stdout() -> Self {
        Self::new("", "").with_level(Level::Stdout)
    }

    /// Set log level
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Set rotation policy
    pub fn with_rotation(mut self, rotation: RotationPolicy) -> Self {
        self.rotation = rotation;
        self
    }

    /// Set the keyed buffer time-to-live
    pub fn with_buffer_ttl(mut self, ttl: Duration) -> Self {
        self.buffer_ttl = ttl;
        self
    }

    /// Path of generation `index`; index 0 is the file currently written.
    pub fn file_path(&self, index: usize) -> PathBuf {
        let name = if index == 0 {
            format!("{}.log", self.prefix)
        } else {
            format!("{}{}.log", self.prefix, index)
        };
        self.dir.join(name)
    }

    /// Path a time-rotated file is renamed to.
    pub fn windowed_path(&self, stamp: &str) -> PathBuf {
        self.dir.join(format!("{}.log.{}", self.prefix, stamp))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Reject policy and threshold combinations that can never work.
    pub fn validate(&self) -> Result<()> {
        if let RotationPolicy::Size {
            max_size,
            max_files,
        } = self.rotation
        {
            if max_size == 0 {
                return Err(Error::Config(
                    "max_size must be greater than zero for size-based rotation".to_string(),
                ));
            }
            if max_files == 0 {
                return Err(Error::Config(
                    "max_files must be at least 1 for size-based rotation".to_string(),
                ));
            }
        }
        Ok(())
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::new("", default_prefix())
    }
}

fn default_prefix() -> String {
    "app".to_string()
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
