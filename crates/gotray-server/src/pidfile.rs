//! PID file management for the daemon.
//!
//! The PID file keeps a second daemon from starting and lets the CLI find
//! the running one to deliver control signals.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process;

use tracing::{debug, info, warn};

use crate::config::runtime_path;
use crate::error::{ServerError, ServerResult};
use crate::signals::Signal;

/// PID file manager.
///
/// Creates a PID file on creation and removes it on drop.
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Creates a new PID file at the specified path.
    ///
    /// Returns an error if another instance is already running.
    pub fn create(path: impl Into<PathBuf>) -> ServerResult<Self> {
        let path = path.into();

        if path.exists() {
            match read_pid(&path) {
                Ok(pid) if is_process_running(pid) => {
                    return Err(ServerError::already_running(path.to_string_lossy()));
                }
                Ok(pid) => {
                    warn!(path = %path.display(), pid = pid, "Removing stale PID file");
                    fs::remove_file(&path)?;
                }
                Err(_) => {
                    warn!(path = %path.display(), "Removing invalid PID file");
                    fs::remove_file(&path)?;
                }
            }
        }

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let pid = process::id();
        let mut file = File::create(&path)?;
        writeln!(file, "{}", pid)?;
        file.sync_all()?;

        info!(path = %path.display(), pid = pid, "Created PID file");

        Ok(Self { path })
    }

    /// Returns the path to the PID file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the current process ID.
    pub fn pid(&self) -> u32 {
        process::id()
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        if self.path.exists() {
            if let Err(e) = fs::remove_file(&self.path) {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to remove PID file"
                );
            } else {
                debug!(path = %self.path.display(), "Removed PID file");
            }
        }
    }
}

/// Reads the PID from a file.
///
/// Only PIDs that name a single process are accepted: `0` and values that do
/// not fit a positive `pid_t` would make kill(2) target a process group or
/// every process of the user.
pub fn read_pid(path: &Path) -> ServerResult<u32> {
    let mut file = File::open(path)?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    let contents = contents.trim();
    contents
        .parse::<u32>()
        .ok()
        .filter(|&pid| is_valid_pid(pid))
        .ok_or_else(|| ServerError::config(format!("Invalid PID in file: {}", contents)))
}

#[cfg(unix)]
fn is_valid_pid(pid: u32) -> bool {
    to_pid_t(pid).is_some()
}

#[cfg(not(unix))]
fn is_valid_pid(pid: u32) -> bool {
    pid > 0
}

#[cfg(unix)]
fn to_pid_t(pid: u32) -> Option<libc::pid_t> {
    libc::pid_t::try_from(pid).ok().filter(|&pid| pid > 0)
}

/// Returns the PID of the running daemon, if the file names a live process.
///
/// A missing file or a dead process is `NotRunning`; a file holding an
/// unusable PID is a `Config` error.
pub fn running_pid(path: &Path) -> ServerResult<u32> {
    let pid = match read_pid(path) {
        Ok(pid) => pid,
        Err(ServerError::Io(_)) => return Err(ServerError::not_running(path.to_string_lossy())),
        Err(e) => return Err(e),
    };
    if is_process_running(pid) {
        Ok(pid)
    } else {
        Err(ServerError::not_running(path.to_string_lossy()))
    }
}

/// Delivers `signal` to the daemon recorded in the PID file.
#[cfg(unix)]
pub fn send_signal(path: &Path, signal: Signal) -> ServerResult<u32> {
    let pid = running_pid(path)?;
    let raw = to_pid_t(pid).ok_or_else(|| ServerError::config(format!("Invalid PID: {}", pid)))?;
    // SAFETY: kill(2) has no memory-safety preconditions.
    let rc = unsafe { libc::kill(raw, signal.as_raw()) };
    if rc != 0 {
        return Err(std::io::Error::last_os_error().into());
    }
    debug!(pid = pid, signal = ?signal, "Signal sent");
    Ok(pid)
}

#[cfg(not(unix))]
pub fn send_signal(path: &Path, _signal: Signal) -> ServerResult<u32> {
    Err(ServerError::config(format!(
        "signals are not supported on this platform (pid file {})",
        path.display()
    )))
}

/// Checks if a process with the given PID is running.
#[cfg(unix)]
fn is_process_running(pid: u32) -> bool {
    match to_pid_t(pid) {
        // Signal 0 only checks that the process exists.
        Some(pid) => unsafe { libc::kill(pid, 0) == 0 },
        None => false,
    }
}

#[cfg(not(unix))]
fn is_process_running(_pid: u32) -> bool {
    true
}

/// Returns the default PID file path.
///
/// Uses `$XDG_RUNTIME_DIR/gotray.pid` if available,
/// otherwise falls back to `/tmp/gotray-$UID.pid`.
pub fn default_pid_path() -> PathBuf {
    runtime_path("pid")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn pidfile_create_and_remove() {
        let dir = tempdir().unwrap();
        let pid_path = dir.path().join("test.pid");

        {
            let pidfile = PidFile::create(&pid_path).unwrap();
            assert!(pid_path.exists());
            assert_eq!(pidfile.pid(), process::id());
            assert_eq!(read_pid(&pid_path).unwrap(), process::id());
        }

        assert!(!pid_path.exists());
    }

    #[test]
    fn pidfile_rejects_duplicate() {
        let dir = tempdir().unwrap();
        let pid_path = dir.path().join("test.pid");

        let _pidfile1 = PidFile::create(&pid_path).unwrap();

        let result = PidFile::create(&pid_path);
        assert!(matches!(result, Err(ServerError::AlreadyRunning { .. })));
    }

    #[test]
    fn pidfile_removes_stale() {
        let dir = tempdir().unwrap();
        let pid_path = dir.path().join("test.pid");

        fs::write(&pid_path, "999999999\n").unwrap();

        let pidfile = PidFile::create(&pid_path).unwrap();
        assert_eq!(read_pid(pidfile.path()).unwrap(), process::id());
    }

    #[test]
    fn pidfile_removes_invalid() {
        let dir = tempdir().unwrap();
        let pid_path = dir.path().join("test.pid");

        fs::write(&pid_path, "not-a-pid\n").unwrap();

        let _pidfile = PidFile::create(&pid_path).unwrap();
        assert!(pid_path.exists());
    }

    #[test]
    fn running_pid_finds_live_process() {
        let dir = tempdir().unwrap();
        let pid_path = dir.path().join("test.pid");

        assert!(matches!(
            running_pid(&pid_path),
            Err(ServerError::NotRunning { .. })
        ));

        let _pidfile = PidFile::create(&pid_path).unwrap();
        assert_eq!(running_pid(&pid_path).unwrap(), process::id());
    }

    #[test]
    fn send_signal_without_daemon_fails() {
        let dir = tempdir().unwrap();
        let pid_path = dir.path().join("test.pid");
        fs::write(&pid_path, "999999999\n").unwrap();

        assert!(matches!(
            send_signal(&pid_path, Signal::Silence),
            Err(ServerError::NotRunning { .. })
        ));
    }

    #[test]
    fn rejects_pids_that_are_not_a_single_process() {
        let dir = tempdir().unwrap();
        let pid_path = dir.path().join("test.pid");

        for contents in ["0\n", "4294967295\n", "2147483648\n"] {
            fs::write(&pid_path, contents).unwrap();
            assert!(
                matches!(read_pid(&pid_path), Err(ServerError::Config { .. })),
                "{:?} should be rejected",
                contents
            );
            assert!(matches!(
                running_pid(&pid_path),
                Err(ServerError::Config { .. })
            ));
            assert!(matches!(
                send_signal(&pid_path, Signal::Silence),
                Err(ServerError::Config { .. })
            ));
        }
    }

    #[test]
    fn pidfile_replaces_file_with_unusable_pid() {
        let dir = tempdir().unwrap();
        let pid_path = dir.path().join("test.pid");
        fs::write(&pid_path, "0\n").unwrap();

        let _pidfile = PidFile::create(&pid_path).unwrap();
        assert_eq!(read_pid(&pid_path).unwrap(), process::id());
    }

    #[test]
    fn default_pid_path_format() {
        let path = default_pid_path();
        let path_str = path.to_string_lossy();
        assert!(path_str.contains("gotray"));
        assert!(path_str.ends_with(".pid"));
    }
}
