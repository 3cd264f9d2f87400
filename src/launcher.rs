//! Child process creation.
//!
//! [`ProgramSpec`] is the immutable exec image (path + argv) built once at
//! startup. [`ForkExec`] turns it into a running child with `fork` + `execv`.
//! The child side only touches async-signal-safe calls: every allocation
//! (C strings, argv pointer array) happens in the parent before `fork`.
//!
//! All signals are blocked across `fork`. The child puts the supervisor's
//! handled signals back to `SIG_DFL` before unblocking, so a SIGTERM forwarded
//! between `fork` and `execv` is not swallowed by an inherited handler.
//! SIGPIPE is reset too: the Rust runtime ignores it in the supervisor, and an
//! ignored disposition would otherwise survive `execv`.

use std::ffi::{CString, OsString};
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use nix::sys::signal::{pthread_sigmask, SigSet, SigmaskHow};
use nix::unistd::{fork, ForkResult, Pid};

use crate::error::{Error, Result};

/// Exit status of a child whose `execv` failed.
pub const EXEC_FAILED_STATUS: i32 = 127;

const EXEC_FAILED_MSG: &[u8] = b"supervisor: exec failed\n";

/// Signals whose disposition the supervisor changes; reset in the child.
const CHILD_DEFAULT_SIGNALS: [libc::c_int; 5] = [
    libc::SIGCHLD,
    libc::SIGINT,
    libc::SIGTERM,
    libc::SIGHUP,
    libc::SIGPIPE,
];

/// Resolved executable plus its argument vector.
///
/// `argv[0]` is always the resolved path.
#[derive(Debug, Clone)]
pub struct ProgramSpec {
    path: PathBuf,
    c_path: CString,
    c_args: Vec<CString>,
}

impl ProgramSpec {
    /// Build a spec from a resolved `path` and the user-supplied argv.
    ///
    /// The first element of `args` (the program token) is replaced by `path`.
    pub fn new(path: PathBuf, args: &[OsString]) -> Result<Self> {
        let c_path = to_cstring(path.as_os_str().as_bytes())?;
        let mut c_args = Vec::with_capacity(args.len().max(1));
        c_args.push(c_path.clone());
        for arg in args.iter().skip(1) {
            c_args.push(to_cstring(arg.as_bytes())?);
        }
        Ok(Self {
            path,
            c_path,
            c_args,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The argv passed to exec, lossily decoded for display.
    pub fn args(&self) -> Vec<String> {
        self.c_args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }
}

fn to_cstring(bytes: &[u8]) -> Result<CString> {
    CString::new(bytes)
        .map_err(|_| Error::InvalidArgument(String::from_utf8_lossy(bytes).into_owned()))
}

/// Starts a new child for a [`ProgramSpec`].
///
/// The supervisor is generic over this so its state machine can be driven
/// without creating real processes.
pub trait Launch {
    /// Create a child running `spec`. `Err` means no process was created.
    fn launch(&mut self, spec: &ProgramSpec) -> Result<Pid>;
}

/// `fork` + `execv` launcher. The child inherits stdio and environment.
#[derive(Debug, Default)]
pub struct ForkExec;

impl Launch for ForkExec {
    fn launch(&mut self, spec: &ProgramSpec) -> Result<Pid> {
        let mut argv: Vec<*const libc::c_char> =
            spec.c_args.iter().map(|a| a.as_ptr()).collect();
        argv.push(std::ptr::null());

        let mut saved = SigSet::empty();
        pthread_sigmask(SigmaskHow::SIG_SETMASK, Some(&SigSet::all()), Some(&mut saved))
            .map_err(Error::Fork)?;

        // SAFETY: the child branch only calls signal, pthread_sigmask, execv,
        // write and _exit, all async-signal-safe, on memory prepared before
        // the fork.
        match unsafe { fork() } {
            Ok(ForkResult::Parent { child }) => {
                let _ = pthread_sigmask(SigmaskHow::SIG_SETMASK, Some(&saved), None);
                Ok(child)
            }
            Ok(ForkResult::Child) => unsafe {
                for sig in CHILD_DEFAULT_SIGNALS {
                    libc::signal(sig, libc::SIG_DFL);
                }
                let _ = pthread_sigmask(SigmaskHow::SIG_SETMASK, Some(&saved), None);
                libc::execv(spec.c_path.as_ptr(), argv.as_ptr());
                libc::write(
                    libc::STDERR_FILENO,
                    EXEC_FAILED_MSG.as_ptr().cast(),
                    EXEC_FAILED_MSG.len(),
                );
                libc::_exit(EXEC_FAILED_STATUS)
            },
            Err(e) => {
                let _ = pthread_sigmask(SigmaskHow::SIG_SETMASK, Some(&saved), None);
                Err(Error::Fork(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::sys::wait::{waitpid, WaitStatus};

    fn os(args: &[&str]) -> Vec<OsString> {
        args.iter().map(OsString::from).collect()
    }

    #[test]
    fn test_argv0_rewritten_to_path() {
        let spec =
            ProgramSpec::new(PathBuf::from("/bin/echo"), &os(&["echo", "a", "b c"])).unwrap();
        assert_eq!(spec.path(), Path::new("/bin/echo"));
        assert_eq!(spec.args(), vec!["/bin/echo", "a", "b c"]);
    }

    #[test]
    fn test_empty_args_still_has_argv0() {
        let spec = ProgramSpec::new(PathBuf::from("/bin/true"), &[]).unwrap();
        assert_eq!(spec.args(), vec!["/bin/true"]);
    }

    #[test]
    fn test_interior_nul_rejected() {
        let err =
            ProgramSpec::new(PathBuf::from("/bin/echo"), &os(&["echo", "a\0b"])).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_launch_and_reap_exit_code() {
        let spec =
            ProgramSpec::new(PathBuf::from("/bin/sh"), &os(&["sh", "-c", "exit 7"])).unwrap();
        let pid = ForkExec.launch(&spec).unwrap();
        assert_eq!(waitpid(pid, None).unwrap(), WaitStatus::Exited(pid, 7));
    }

    #[test]
    fn test_exec_failure_surfaces_as_child_exit() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("not-there");
        let spec = ProgramSpec::new(missing, &os(&["not-there"])).unwrap();
        let pid = ForkExec.launch(&spec).unwrap();
        assert_eq!(
            waitpid(pid, None).unwrap(),
            WaitStatus::Exited(pid, EXEC_FAILED_STATUS)
        );
    }

    #[test]
    fn test_child_does_not_inherit_ignored_sigpipe() {
        // Exits 1 if bit 12 (SIGPIPE) of the SigIgn mask is set.
        let script = "mask=$(sed -n 's/^SigIgn:[[:space:]]*//p' /proc/self/status); \
                      exit $(( (0x$mask >> 12) & 1 ))";
        let spec = ProgramSpec::new(PathBuf::from("/bin/sh"), &os(&["sh", "-c", script])).unwrap();
        let pid = ForkExec.launch(&spec).unwrap();
        assert_eq!(waitpid(pid, None).unwrap(), WaitStatus::Exited(pid, 0));
    }
}
