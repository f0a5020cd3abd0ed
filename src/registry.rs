use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use once_cell::sync::OnceCell;

use crate::{BufferedLogger, LogConfig, Result};

/// Named logger instances, owned by the application.
///
/// Looking up an unknown name yields a shared logger that writes to standard
/// output, so callers always get something usable.
#[derive(Debug, Default)]
pub struct LoggerRegistry {
    loggers: Mutex<HashMap<String, Arc<BufferedLogger>>>,
    default: OnceCell<Arc<BufferedLogger>>,
}

impl LoggerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the logger registered under `name`, creating it from `config`
    /// or, if it already exists, reconfiguring it in place.
    pub fn get_or_create(&self, name: &str, config: LogConfig) -> Result<Arc<BufferedLogger>> {
        let mut loggers = self.loggers();
        if let Some(logger) = loggers.get(name) {
            logger.reconfigure(config)?;
            return Ok(Arc::clone(logger));
        }

        let logger = Arc::new(BufferedLogger::new(config)?);
        loggers.insert(name.to_string(), Arc::clone(&logger));
        tracing::debug!(name, "registered logger");
        Ok(logger)
    }

    /// The logger registered under `name`, or the stdout logger.
    pub fn get(&self, name: &str) -> Arc<BufferedLogger> {
        match self.loggers().get(name) {
            Some(logger) => Arc::clone(logger),
            None => self.get_default(),
        }
    }

    /// Whether a logger is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.loggers().contains_key(name)
    }

    /// The shared stdout logger.
    pub fn get_default(&self) -> Arc<BufferedLogger> {
        Arc::clone(
            self.default
                .get_or_init(|| Arc::new(BufferedLogger::stdout())),
        )
    }

    /// Unregister and close the logger under `name`.
    pub fn remove(&self, name: &str) -> Result<Option<Arc<BufferedLogger>>> {
        let removed = self.loggers().remove(name);
        if let Some(logger) = &removed {
            logger.close()?;
        }
        Ok(removed)
    }

    /// Close every registered logger, continuing past failures.
    pub fn close_all(&self) -> Result<()> {
        let loggers: Vec<Arc<BufferedLogger>> =
            self.loggers().drain().map(|(_, logger)| logger).collect();

        let mut first_err = None;
        for logger in loggers {
            if let Err(err) = logger.close() {
                first_err.get_or_insert(err);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    fn loggers(&self) -> MutexGuard<'_, HashMap<String, Arc<BufferedLogger>>> {
        self.loggers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
