use chrono::{DateTime, Local};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Append-only file receiving one cursor per line.
pub struct CursorLog {
    path: PathBuf,
    file: File,
}

/// `cursors-YYYYMMDD-HHMMSS.log`
pub fn log_file_name(at: DateTime<Local>) -> String {
    format!("cursors-{}.log", at.format("%Y%m%d-%H%M%S"))
}

impl CursorLog {
    /// Creates `dir` if needed and opens a freshly named log file inside it.
    pub fn create_in(dir: &Path) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        Self::open(&dir.join(log_file_name(Local::now())))
    }

    /// Opens `path` for appending, creating it if missing.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Write for CursorLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}
