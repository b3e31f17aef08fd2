//! Size- and date-based rotating log file writer.
//!
//! The active file is `<prefix>-YYYY-MM-DD.log`. When a write would push it
//! past the size limit, writing continues in `<prefix>-YYYY-MM-DD.1.log`,
//! `.2.log` and so on. At UTC midnight a new dated file is opened and files
//! older than the retention window are removed.

use chrono::{DateTime, Days, NaiveDate, Utc};
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::fmt::MakeWriter;

/// Thread-safe rotating writer. Clones share the same underlying file.
#[derive(Clone)]
pub struct RotatingLogWriter {
    inner: Arc<Mutex<RotationState>>,
}

struct RotationState {
    dir: PathBuf,
    prefix: String,
    max_file_size: u64,
    max_files: usize,
    date: NaiveDate,
    index: u32,
    written: u64,
    file: BufWriter<File>,
}

impl RotatingLogWriter {
    /// Open (or create) today's log file in `dir`.
    pub fn new(dir: &Path, prefix: &str, max_file_size: u64, max_files: usize) -> io::Result<Self> {
        Self::open_at(dir, prefix, max_file_size, max_files, Utc::now())
    }

    fn open_at(
        dir: &Path,
        prefix: &str,
        max_file_size: u64,
        max_files: usize,
        now: DateTime<Utc>,
    ) -> io::Result<Self> {
        fs::create_dir_all(dir)?;

        let date = now.date_naive();
        let (index, file, written) = open_with_room(dir, prefix, date, 0, max_file_size)?;

        let state = RotationState {
            dir: dir.to_path_buf(),
            prefix: prefix.to_string(),
            max_file_size,
            max_files,
            date,
            index,
            written,
            file: BufWriter::new(file),
        };
        state.prune()?;

        Ok(Self {
            inner: Arc::new(Mutex::new(state)),
        })
    }

    /// Path of the file currently being written.
    pub fn current_path(&self) -> PathBuf {
        let state = self.inner.lock();
        file_path(&state.dir, &state.prefix, state.date, state.index)
    }

    fn write_at(&self, buf: &[u8], now: DateTime<Utc>) -> io::Result<usize> {
        let mut state = self.inner.lock();
        state.rotate_if_needed(buf.len() as u64, now)?;

        let written = state.file.write(buf)?;
        state.file.flush()?;
        state.written += written as u64;
        Ok(written)
    }
}

impl RotationState {
    fn rotate_if_needed(&mut self, incoming: u64, now: DateTime<Utc>) -> io::Result<()> {
        let today = now.date_naive();

        if today != self.date {
            self.file.flush()?;
            let (index, file, written) =
                open_with_room(&self.dir, &self.prefix, today, 0, self.max_file_size)?;
            self.date = today;
            self.index = index;
            self.written = written;
            self.file = BufWriter::new(file);
            return self.prune();
        }

        if self.max_file_size > 0 && self.written > 0 && self.written + incoming > self.max_file_size
        {
            self.file.flush()?;
            let (index, file, written) = open_with_room(
                &self.dir,
                &self.prefix,
                self.date,
                self.index + 1,
                self.max_file_size,
            )?;
            self.index = index;
            self.written = written;
            self.file = BufWriter::new(file);
        }

        Ok(())
    }

    /// Remove files dated before the retention window.
    fn prune(&self) -> io::Result<()> {
        if self.max_files == 0 {
            return Ok(());
        }

        let keep_days = (self.max_files - 1) as u64;
        let Some(oldest_kept) = self.date.checked_sub_days(Days::new(keep_days)) else {
            return Ok(());
        };

        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if let Some(date) = parse_file_date(&self.prefix, name) {
                if date < oldest_kept {
                    fs::remove_file(entry.path())?;
                }
            }
        }

        Ok(())
    }
}

impl Write for RotatingLogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_at(buf, Utc::now())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.lock().file.flush()
    }
}

impl<'a> MakeWriter<'a> for RotatingLogWriter {
    type Writer = RotatingLogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn file_path(dir: &Path, prefix: &str, date: NaiveDate, index: u32) -> PathBuf {
    let stamp = date.format("%Y-%m-%d");
    if index == 0 {
        dir.join(format!("{prefix}-{stamp}.log"))
    } else {
        dir.join(format!("{prefix}-{stamp}.{index}.log"))
    }
}

/// Open the first file at or after `start` that still has room.
fn open_with_room(
    dir: &Path,
    prefix: &str,
    date: NaiveDate,
    start: u32,
    max_file_size: u64,
) -> io::Result<(u32, File, u64)> {
    let mut index = start;
    loop {
        let path = file_path(dir, prefix, date, index);
        let existing = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        if max_file_size == 0 || existing < max_file_size {
            let file = OpenOptions::new().create(true).append(true).open(&path)?;
            return Ok((index, file, existing));
        }
        index += 1;
    }
}

/// Extract the date from `<prefix>-YYYY-MM-DD[.N].log`.
fn parse_file_date(prefix: &str, name: &str) -> Option<NaiveDate> {
    let rest = name.strip_prefix(prefix)?.strip_prefix('-')?;
    let rest = rest.strip_suffix(".log")?;
    let stamp = rest.get(..10)?;
    let tail = &rest[10..];
    if !(tail.is_empty() || (tail.starts_with('.') && tail[1..].parse::<u32>().is_ok())) {
        return None;
    }
    NaiveDate::parse_from_str(stamp, "%Y-%m-%d").ok()
}
