use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock};

use time::OffsetDateTime;

use crate::format::{local_offset, now_local};
use crate::{Level, LogConfig, Result, RotationPolicy};

/// State of the current log file.
#[derive(Debug, Default)]
struct FileState {
    /// The open file handle, opened lazily on the first append.
    file: Option<File>,
    /// Path `file` was opened under.
    path: Option<PathBuf>,
}

impl FileState {
    fn open(&mut self, path: &Path, truncate: bool) -> io::Result<()> {
        self.close();
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        if truncate {
            file.set_len(0)?;
        }
        self.file = Some(file);
        self.path = Some(path.to_path_buf());
        Ok(())
    }

    fn close(&mut self) {
        self.file = None;
    }
}

/// A line writer that rotates its log file based on size or time window.
///
/// Every append, including any rotation it triggers, happens under one lock,
/// so concurrent callers never interleave bytes within a line.
#[derive(Debug)]
pub struct RotatingFileWriter {
    config: RwLock<LogConfig>,
    state: Mutex<FileState>,
}

impl RotatingFileWriter {
    /// Create a new rotating writer. No file is opened until the first append.
    pub fn new(config: LogConfig) -> Self {
        // Settle the local offset before a logger spawns its sweep thread.
        local_offset();
        Self {
            config: RwLock::new(config),
            state: Mutex::new(FileState::default()),
        }
    }

    /// Replace the configuration. Takes effect on the next append.
    pub fn configure(&self, config: LogConfig) {
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = config;
    }

    /// Snapshot of the current configuration.
    pub fn config(&self) -> LogConfig {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The configured level threshold.
    pub fn level(&self) -> Level {
        self.config.read().unwrap_or_else(PoisonError::into_inner).level
    }

    /// Write `text` followed by a newline, rotating first if needed.
    pub fn append(&self, text: &str) -> Result<()> {
        let config = self.config.read().unwrap_or_else(PoisonError::into_inner);

        let mut line = String::with_capacity(text.len() + 1);
        line.push_str(text);
        line.push('\n');

        if config.level == Level::Stdout {
            io::stdout().lock().write_all(line.as_bytes())?;
            return Ok(());
        }

        let rotated = {
            let mut state = self.lock_state();
            let (file, rotated) = current_file(&config, &mut state)?;
            file.write_all(line.as_bytes())?;
            rotated
        };
        drop(config);

        // Emitted with no lock held: a tracing bridge may route it back here.
        if let Some(path) = rotated {
            tracing::debug!(path = %path.display(), "rotated log file");
        }
        Ok(())
    }

    /// Release the open file handle, if any.
    pub fn close(&self) {
        let mut state = self.lock_state();
        state.close();
        state.path = None;
    }

    fn lock_state(&self) -> MutexGuard<'_, FileState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Resolve the file the next line goes to, rotating first when the policy
/// says the current one is full or belongs to an elapsed window. Also returns
/// where the previous content went if a rotation happened.
fn current_file<'a>(
    config: &LogConfig,
    state: &'a mut FileState,
) -> Result<(&'a mut File, Option<PathBuf>)> {
    let canonical = config.file_path(0);

    let metadata = match state.file.as_ref() {
        Some(file) if state.path.as_deref() == Some(canonical.as_path()) => {
            Some(file.metadata()?)
        }
        _ => None,
    };

    let mut rotated = None;
    match metadata {
        None => {
            create_dir(config.dir())?;
            state.open(&canonical, false)?;
        }
        Some(metadata) => match config.rotation {
            RotationPolicy::Size {
                max_size,
                max_files,
            } => {
                if metadata.len() >= max_size {
                    state.close();
                    shift_generations(config, max_files)?;
                    state.open(&canonical, max_files <= 1)?;
                    rotated = Some(if max_files <= 1 {
                        canonical.clone()
                    } else {
                        config.file_path(1)
                    });
                }
            }
            policy => {
                let now = now_local();
                let modified = OffsetDateTime::from(metadata.modified()?).to_offset(now.offset());
                let current = policy.window_stamp(now)?;
                let written = policy.window_stamp(modified)?;
                if let (Some(current), Some(written)) = (current, written) {
                    if current != written {
                        state.close();
                        let target = config.windowed_path(&written);
                        fs::rename(&canonical, &target)?;
                        state.open(&canonical, false)?;
                        rotated = Some(target);
                    }
                }
            }
        },
    }

    let file = state
        .file
        .as_mut()
        .ok_or_else(|| io::Error::other("log file is not open"))?;
    Ok((file, rotated))
}

/// Move generation `i` to `i + 1` for every kept generation, oldest first,
/// dropping the one that would fall past `max_files - 1`.
fn shift_generations(config: &LogConfig, max_files: usize) -> io::Result<()> {
    if max_files < 2 {
        return Ok(());
    }

    let oldest = config.file_path(max_files - 1);
    if oldest.exists() {
        fs::remove_file(&oldest)?;
    }

    for i in (0..max_files - 1).rev() {
        let from = config.file_path(i);
        if from.exists() {
            fs::rename(&from, config.file_path(i + 1))?;
        }
    }

    Ok(())
}

fn create_dir(dir: &Path) -> io::Result<()> {
    if dir.as_os_str().is_empty() || dir.exists() {
        return Ok(());
    }
    fs::create_dir_all(dir)
}
