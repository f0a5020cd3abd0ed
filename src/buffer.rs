//! Keyed aggregation of log lines into blocks.
//!
//! Lines logged under the same non-zero correlation key are held in memory
//! and written to the file as one block when the key is flushed, either by
//! the caller or by the background sweep once the block outlives the TTL.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::panic::Location;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::format::{self, CallSite, LogRecord};
use crate::{Level, LogConfig, Result, RotatingFileWriter};

/// Key that bypasses aggregation and writes straight to the file.
pub const DIRECT_KEY: i64 = 0;

/// Upper bound on the time between two sweeps.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Lower bound on the time between two sweeps.
pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(10);

/// How often the sweep wakes for a given TTL.
fn sweep_interval(ttl: Duration) -> Duration {
    ttl.clamp(MIN_SWEEP_INTERVAL, SWEEP_INTERVAL)
}

struct BufferEntry {
    text: String,
    created: Instant,
}

impl BufferEntry {
    fn begin(key: i64, line: &str) -> Self {
        Self {
            text: format!("[Log Begin], [Key={}]\n{}", key, line),
            created: Instant::now(),
        }
    }

    fn finish(mut self, key: i64) -> String {
        self.text.push_str(&format!("\n[Log End], [Key={}]", key));
        self.text
    }
}

/// State shared between a logger and its sweep thread.
struct Shared {
    writer: RotatingFileWriter,
    buffers: Mutex<HashMap<i64, BufferEntry>>,
}

impl Shared {
    fn buffers(&self) -> MutexGuard<'_, HashMap<i64, BufferEntry>> {
        self.buffers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Remove the block for `key` and close it with its end marker.
    fn take(&self, key: i64) -> Option<String> {
        self.buffers().remove(&key).map(|entry| entry.finish(key))
    }

    fn flush(&self, key: i64) -> Result<()> {
        // The map lock is released before the writer lock is taken.
        match self.take(key) {
            Some(block) => self.writer.append(&block),
            None => Ok(()),
        }
    }

    /// Flush every block created at least `ttl` ago.
    fn expire(&self, ttl: Duration) {
        let expired: Vec<(i64, String)> = {
            let mut buffers = self.buffers();
            let keys: Vec<i64> = buffers
                .iter()
                .filter(|(_, entry)| entry.created.elapsed() >= ttl)
                .map(|(key, _)| *key)
                .collect();
            keys.into_iter()
                .filter_map(|key| buffers.remove(&key).map(|entry| (key, entry.finish(key))))
                .collect()
        };

        for (key, block) in expired {
            if let Err(err) = self.writer.append(&block) {
                tracing::warn!(key, error = %err, "failed to flush expired log buffer");
            }
        }
    }

    /// Flush every remaining block, continuing past failures.
    fn drain(&self) -> Result<()> {
        let blocks: Vec<String> = self
            .buffers()
            .drain()
            .map(|(key, entry)| entry.finish(key))
            .collect();

        let mut first_err = None;
        for block in blocks {
            if let Err(err) = self.writer.append(&block) {
                tracing::warn!(error = %err, "failed to flush log buffer during shutdown");
                first_err.get_or_insert(err);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

/// Background thread that expires old blocks.
struct Sweeper {
    signal: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

impl Sweeper {
    fn spawn(shared: Arc<Shared>, ttl: Duration) -> Result<Self> {
        let (signal, stopped) = mpsc::channel::<()>();
        let interval = sweep_interval(ttl);

        let handle = thread::Builder::new()
            .name("blocklog-sweep".to_string())
            .spawn(move || {
                loop {
                    match stopped.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => shared.expire(ttl),
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            })?;

        Ok(Self { signal, handle })
    }

    /// Signal the thread and wait for any in-flight sweep to finish.
    fn stop(self) {
        let _ = self.signal.send(());
        if self.handle.join().is_err() {
            tracing::warn!("log buffer sweep thread panicked");
        }
    }
}

#[derive(Default)]
struct SweepState {
    ttl: Duration,
    sweeper: Option<Sweeper>,
}

/// A leveled logger that writes through a [`RotatingFileWriter`] and groups
/// lines sharing a correlation key into blocks.
///
/// Lines logged with key [`DIRECT_KEY`] are written immediately. Any other key
/// collects lines in memory between a `[Log Begin]` and `[Log End]` marker
/// until [`flush`](Self::flush) is called or the block is older than the
/// configured TTL. After [`close`](Self::close), keyed lines are written at
/// once as single-line blocks.
pub struct BufferedLogger {
    shared: Arc<Shared>,
    sweep: Mutex<SweepState>,
    closed: AtomicBool,
}

impl BufferedLogger {
    /// Create a logger, starting the sweep thread when the TTL is non-zero.
    pub fn new(config: LogConfig) -> Result<Self> {
        config.validate()?;
        let ttl = config.buffer_ttl;

        let logger = Self::unswept(config);
        if !ttl.is_zero() {
            let sweeper = Sweeper::spawn(Arc::clone(&logger.shared), ttl)?;
            *logger.sweep_state() = SweepState {
                ttl,
                sweeper: Some(sweeper),
            };
        }
        Ok(logger)
    }

    /// A logger that writes every record to standard output.
    pub fn stdout() -> Self {
        Self::unswept(LogConfig::stdout())
    }

    fn unswept(config: LogConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                writer: RotatingFileWriter::new(config),
                buffers: Mutex::new(HashMap::new()),
            }),
            sweep: Mutex::new(SweepState::default()),
            closed: AtomicBool::new(false),
        }
    }

    /// The underlying file writer.
    pub fn writer(&self) -> &RotatingFileWriter {
        &self.shared.writer
    }

    /// The configured level threshold.
    pub fn level(&self) -> Level {
        self.shared.writer.level()
    }

    /// Log a record at `level` under `key`.
    ///
    /// Records more verbose than the configured level are dropped.
    #[track_caller]
    pub fn log_at(&self, level: Level, key: i64, args: fmt::Arguments<'_>) -> Result<()> {
        self.log_with_call_site(level, key, Location::caller().into(), args)
    }

    /// Log a record at [`Level::All`], regardless of the configured level.
    #[track_caller]
    pub fn log(&self, key: i64, args: fmt::Arguments<'_>) -> Result<()> {
        self.emit(LogRecord::new(Level::All, args, Location::caller().into()), key)
    }

    /// Log a record attributed to an explicit call site.
    pub fn log_with_call_site(
        &self,
        level: Level,
        key: i64,
        call_site: CallSite<'_>,
        args: fmt::Arguments<'_>,
    ) -> Result<()> {
        if !level.enabled(self.level()) {
            return Ok(());
        }
        self.emit(LogRecord::new(level, args, call_site), key)
    }

    fn emit(&self, record: LogRecord<'_>, key: i64) -> Result<()> {
        let line = format::render(&record);
        if key == DIRECT_KEY {
            return self.shared.writer.append(&line);
        }

        let mut buffers = self.shared.buffers();
        // Checked under the map lock so `close` drains anything inserted
        // before the flag was set. Nothing flushes the map afterwards, so
        // later keyed lines are written as one-line blocks.
        if self.closed.load(Ordering::Acquire) {
            drop(buffers);
            return self.shared.writer.append(&BufferEntry::begin(key, &line).finish(key));
        }

        match buffers.entry(key) {
            // Appending never refreshes the TTL deadline.
            Entry::Occupied(mut entry) => {
                let text = &mut entry.get_mut().text;
                text.push('\n');
                text.push_str(&line);
            }
            Entry::Vacant(entry) => {
                entry.insert(BufferEntry::begin(key, &line));
            }
        }
        Ok(())
    }

    /// Write the block for `key` as a single append. No-op if `key` has
    /// nothing buffered.
    pub fn flush(&self, key: i64) -> Result<()> {
        self.shared.flush(key)
    }

    /// Whether `key` currently has a buffered block.
    pub fn is_buffered(&self, key: i64) -> bool {
        self.shared.buffers().contains_key(&key)
    }

    /// Number of keys currently buffered.
    pub fn buffered_len(&self) -> usize {
        self.shared.buffers().len()
    }

    /// Apply a new configuration, restarting the sweep if the TTL changed.
    pub fn reconfigure(&self, config: LogConfig) -> Result<()> {
        config.validate()?;
        let ttl = config.buffer_ttl;
        self.shared.writer.configure(config);

        let mut sweep = self.sweep_state();
        if sweep.ttl == ttl || self.closed.load(Ordering::Acquire) {
            return Ok(());
        }
        if let Some(sweeper) = sweep.sweeper.take() {
            sweeper.stop();
        }
        sweep.ttl = ttl;
        if !ttl.is_zero() {
            sweep.sweeper = Some(Sweeper::spawn(Arc::clone(&self.shared), ttl)?);
        }
        Ok(())
    }

    /// Stop the sweep, flush every buffered block and close the file.
    ///
    /// Flushing continues past failures; the first one is returned. Calling
    /// `close` again is a no-op.
    pub fn close(&self) -> Result<()> {
        let sweeper = {
            let mut sweep = self.sweep_state();
            if self.closed.swap(true, Ordering::AcqRel) {
                return Ok(());
            }
            sweep.sweeper.take()
        };
        if let Some(sweeper) = sweeper {
            sweeper.stop();
        }

        let result = self.shared.drain();
        self.shared.writer.close();
        result
    }

    fn sweep_state(&self) -> MutexGuard<'_, SweepState> {
        self.sweep.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for BufferedLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferedLogger")
            .field("writer", &self.shared.writer)
            .field("buffered", &self.buffered_len())
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

impl Drop for BufferedLogger {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            tracing::warn!(error = %err, "failed to close logger cleanly");
        }
    }
}
