//! Program name → executable path resolution.
//!
//! Mirrors the usual `execvp` lookup rules, minus the shell fallbacks:
//!
//! - A token containing `/` is used as-is (`./foo`, `/usr/bin/foo`).
//! - Otherwise each `PATH` entry is tried in order and the first
//!   `<dir>/<token>` that is an executable regular file wins.
//! - Empty `PATH` segments are skipped.

use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use nix::unistd::{access, AccessFlags};
use tracing::debug;

use crate::error::{Error, Result};

/// Resolve `program` against the process `PATH`.
pub fn resolve(program: &OsStr) -> Result<PathBuf> {
    let search_path = std::env::var_os("PATH");
    resolve_in(program, search_path.as_deref())
}

/// Resolve `program` against an explicit colon-separated search path.
///
/// `search_path = None` behaves like an unset `PATH`: bare names fail.
pub fn resolve_in(program: &OsStr, search_path: Option<&OsStr>) -> Result<PathBuf> {
    if program.as_bytes().contains(&b'/') {
        return Ok(PathBuf::from(program));
    }

    let not_found = || Error::ProgramNotFound(program.to_string_lossy().into_owned());

    let search_path = search_path.ok_or_else(not_found)?;
    search_path
        .as_bytes()
        .split(|b| *b == b':')
        .filter(|dir| !dir.is_empty())
        .map(|dir| Path::new(OsStr::from_bytes(dir)).join(program))
        .find(|candidate| is_executable(candidate))
        .ok_or_else(not_found)
}

fn is_executable(candidate: &Path) -> bool {
    // access(X_OK) also succeeds for searchable directories.
    if !candidate.is_file() {
        return false;
    }
    match access(candidate, AccessFlags::X_OK) {
        Ok(()) => true,
        Err(e) => {
            debug!("skipping {}: {e}", candidate.display());
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    fn make_file(dir: &Path, name: &str, mode: u32) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, "#!/bin/sh\nexit 0\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(mode)).unwrap();
        path
    }

    #[test]
    fn test_literal_path_returned_unchanged() {
        let resolved = resolve_in(OsStr::new("./foo"), Some(OsStr::new("/nonexistent"))).unwrap();
        assert_eq!(resolved, PathBuf::from("./foo"));
    }

    #[test]
    fn test_literal_path_ignores_missing_search_path() {
        let resolved = resolve_in(OsStr::new("/opt/bin/foo"), None).unwrap();
        assert_eq!(resolved, PathBuf::from("/opt/bin/foo"));
    }

    #[test]
    fn test_search_picks_first_executable_match() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        let expected = make_file(b.path(), "foo", 0o755);

        let search = format!("{}:{}", a.path().display(), b.path().display());
        let resolved = resolve_in(OsStr::new("foo"), Some(OsStr::new(&search))).unwrap();
        assert_eq!(resolved, expected);
    }

    #[test]
    fn test_search_order_is_respected() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        let first = make_file(a.path(), "foo", 0o755);
        make_file(b.path(), "foo", 0o755);

        let search = format!("{}:{}", a.path().display(), b.path().display());
        let resolved = resolve_in(OsStr::new("foo"), Some(OsStr::new(&search))).unwrap();
        assert_eq!(resolved, first);
    }

    #[test]
    fn test_skips_non_executable_and_directories() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        let c = tempfile::tempdir().unwrap();
        make_file(a.path(), "foo", 0o644);
        fs::create_dir(b.path().join("foo")).unwrap();
        let expected = make_file(c.path(), "foo", 0o700);

        let search = format!(
            "{}:{}:{}",
            a.path().display(),
            b.path().display(),
            c.path().display()
        );
        let resolved = resolve_in(OsStr::new("foo"), Some(OsStr::new(&search))).unwrap();
        assert_eq!(resolved, expected);
    }

    #[test]
    fn test_empty_segments_skipped() {
        let a = tempfile::tempdir().unwrap();
        let expected = make_file(a.path(), "foo", 0o755);

        let search = format!("::{}:", a.path().display());
        let resolved = resolve_in(OsStr::new("foo"), Some(OsStr::new(&search))).unwrap();
        assert_eq!(resolved, expected);
    }

    #[test]
    fn test_not_found() {
        let a = tempfile::tempdir().unwrap();
        let search = a.path().display().to_string();
        let err = resolve_in(OsStr::new("missing-prog"), Some(OsStr::new(&search))).unwrap_err();
        assert!(matches!(err, Error::ProgramNotFound(ref p) if p == "missing-prog"));
    }

    #[test]
    fn test_no_search_path() {
        let err = resolve_in(OsStr::new("sh"), None).unwrap_err();
        assert!(matches!(err, Error::ProgramNotFound(_)));
    }
}
