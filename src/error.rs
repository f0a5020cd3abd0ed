use thiserror::Error as ThisError;

/// Errors that can occur while configuring or writing logs.
#[derive(ThisError, Debug)]
pub enum Error {
    /// Opening, renaming or writing a log file failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Configuration is invalid.
    #[error("Configuration error: {0}")]
    Config(String),
    /// Installing the tracing bridge failed.
    #[error("Initialization error: {0}")]
    Init(String),
    /// Formatting a rotation window stamp failed.
    #[error("Time error: {0}")]
    Time(#[from] time::error::Format),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
