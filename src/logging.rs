// Logging Module
//
// Plain-text line sinks. Every worker, connection, and external process gets
// its own file under the log directory; the `log` crate handles everything
// that is not tied to one of those.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use parking_lot::Mutex;

/// Append-only line sink with one file per owner.
pub struct LineLog {
    path: PathBuf,
    file: Mutex<BufWriter<File>>,
}

impl LineLog {
    /// Open (or create) `<dir>/<file_name>`, creating the directory first.
    pub fn create(dir: impl AsRef<Path>, file_name: &str) -> io::Result<Self> {
        fs::create_dir_all(dir.as_ref())?;
        let path = dir.as_ref().join(file_name);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(LineLog {
            path,
            file: Mutex::new(BufWriter::new(file)),
        })
    }

    /// Append one timestamped line. Write failures are reported through the
    /// `log` crate rather than back to the caller; a dead sink must not kill
    /// a worker mid-run.
    pub fn line(&self, message: &str) {
        let mut file = self.file.lock();
        let stamped = format!(
            "[{}] {}",
            Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            message
        );
        if writeln!(file, "{}", stamped).and_then(|_| file.flush()).is_err() {
            log::error!("failed to append to {}: {}", self.path.display(), message);
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Sink for one worker: `worker-<name>.log`.
pub fn worker_log(dir: impl AsRef<Path>, name: &str) -> io::Result<LineLog> {
    LineLog::create(dir, &format!("worker-{}.log", name))
}

/// Sink for one SQL connection: `sql-conn-<name>.log`.
pub fn connection_log(dir: impl AsRef<Path>, name: &str) -> io::Result<LineLog> {
    LineLog::create(dir, &format!("sql-conn-{}.log", name))
}
