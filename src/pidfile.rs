//! PID file bookkeeping.
//!
//! The file holds the supervisor's own pid followed by a newline. It is
//! written once before the first launch and removed once on the way out.
//! Both operations are best-effort: a write failure is logged, a remove
//! failure is ignored.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Create or truncate `path` and write `pid` as decimal plus newline.
pub fn write(path: &Path, pid: u32) -> io::Result<()> {
    std::fs::write(path, format!("{pid}\n"))
}

/// Delete `path`. A missing file is not an error.
pub fn remove(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// Optional PID file owned by the supervisor for its whole lifetime.
///
/// `PidFile::disabled()` turns every operation into a no-op.
#[derive(Debug, Default)]
pub struct PidFile {
    path: Option<PathBuf>,
}

impl PidFile {
    pub fn disabled() -> Self {
        Self { path: None }
    }

    /// Write the current process id to `path` (if any).
    pub fn create(path: Option<PathBuf>) -> Self {
        if let Some(ref p) = path {
            let pid = std::process::id();
            match write(p, pid) {
                Ok(()) => debug!("wrote pid {pid} to {}", p.display()),
                Err(e) => warn!("failed to write pid file {}: {e}", p.display()),
            }
        }
        Self { path }
    }

    /// Remove the file. Safe to call more than once.
    pub fn remove(&self) {
        if let Some(ref p) = self.path {
            let _ = remove(p);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sup.pid");
        write(&path, 4242).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "4242\n");
    }

    #[test]
    fn test_write_truncates_existing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sup.pid");
        std::fs::write(&path, "1234567890 stale contents\n").unwrap();
        write(&path, 7).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "7\n");
    }

    #[test]
    fn test_remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sup.pid");
        write(&path, 1).unwrap();
        remove(&path).unwrap();
        assert!(!path.exists());
        remove(&path).unwrap();
    }

    #[test]
    fn test_write_into_missing_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no/such/dir/sup.pid");
        assert!(write(&path, 1).is_err());
    }

    #[test]
    fn test_pidfile_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sup.pid");

        let pidfile = PidFile::create(Some(path.clone()));
        let expected = format!("{}\n", std::process::id());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), expected);

        pidfile.remove();
        assert!(!path.exists());
        pidfile.remove();
    }

    #[test]
    fn test_pidfile_write_failure_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing/sup.pid");
        let pidfile = PidFile::create(Some(path.clone()));
        assert!(!path.exists());
        pidfile.remove();
    }

    #[test]
    fn test_disabled_is_noop() {
        let pidfile = PidFile::disabled();
        pidfile.remove();
    }
}
