//! Line-counted log file with a single rotated backup
//!
//! [`RotatingFile`] is a [`MakeWriter`] for `tracing-subscriber`: every event
//! is buffered by a short-lived writer and appended to the file when the
//! writer drops. Once the file holds `max_lines` lines, the next event first
//! moves it to the backup path (`app.log` becomes `app.old.log`, replacing any
//! previous backup) and starts the new file with a rotation marker.
//!
//! A failed write is reported on stderr and otherwise ignored.

use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing_subscriber::fmt::MakeWriter;

/// First line of a freshly rotated file
pub const ROTATION_MARKER: &str = "--- Log file rotated ---";

/// Backup path for a log file: `app.log` -> `app.old.log`, `app` -> `app.old`
pub fn backup_path_for(path: &Path) -> PathBuf {
    match (path.file_stem(), path.extension()) {
        (Some(stem), Some(ext)) if ext == "log" => {
            let mut name = stem.to_os_string();
            name.push(".old.log");
            path.with_file_name(name)
        }
        _ => {
            let mut name = path.as_os_str().to_os_string();
            name.push(".old");
            PathBuf::from(name)
        }
    }
}

#[derive(Debug)]
struct RotationState {
    line_count: usize,
}

#[derive(Debug)]
pub struct RotatingFile {
    path: PathBuf,
    backup: PathBuf,
    max_lines: usize,
    rotate: bool,
    state: Mutex<RotationState>,
}

impl RotatingFile {
    /// Open (without creating) the log file, counting the lines already in it
    pub fn open(path: impl Into<PathBuf>, max_lines: usize, rotate: bool) -> Self {
        let path = path.into();
        let line_count = count_lines(&path);
        Self {
            backup: backup_path_for(&path),
            path,
            max_lines,
            rotate,
            state: Mutex::new(RotationState { line_count }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_path(&self) -> &Path {
        &self.backup
    }

    pub fn line_count(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .line_count
    }

    /// Append one buffered event, rotating first when the file is full
    fn append(&self, buf: &[u8]) {
        if buf.is_empty() {
            return;
        }
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        if self.rotate && state.line_count >= self.max_lines {
            self.rotate_files(&mut state);
        }

        match self.write_to_file(buf) {
            Ok(()) => state.line_count += line_count_of(buf),
            Err(e) => eprintln!("!!! FAILED TO WRITE TO LOG FILE {}: {e} !!!", self.path.display()),
        }
    }

    fn rotate_files(&self, state: &mut RotationState) {
        // Missing files are fine: no backup yet, or the log was removed
        let _ = fs::remove_file(&self.backup);
        let _ = fs::rename(&self.path, &self.backup);
        state.line_count = 0;

        let marker = format!("{ROTATION_MARKER}\n");
        match self.write_to_file(marker.as_bytes()) {
            Ok(()) => state.line_count += 1,
            Err(e) => eprintln!("!!! FAILED TO WRITE TO LOG FILE {}: {e} !!!", self.path.display()),
        }
    }

    fn write_to_file(&self, buf: &[u8]) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(buf)
    }
}

fn count_lines(path: &Path) -> usize {
    match fs::File::open(path) {
        Ok(file) => BufReader::new(file).lines().count(),
        Err(_) => 0,
    }
}

fn line_count_of(buf: &[u8]) -> usize {
    let newlines = buf.iter().filter(|b| **b == b'\n').count();
    if buf.last() == Some(&b'\n') {
        newlines
    } else {
        newlines + 1
    }
}

/// Buffers one event and appends it on drop
pub struct RotatingFileWriter<'a> {
    file: &'a RotatingFile,
    buf: Vec<u8>,
}

impl Write for RotatingFileWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for RotatingFileWriter<'_> {
    fn drop(&mut self) {
        self.file.append(&self.buf);
    }
}

impl<'a> MakeWriter<'a> for RotatingFile {
    type Writer = RotatingFileWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        RotatingFileWriter {
            file: self,
            buf: Vec::new(),
        }
    }
}
