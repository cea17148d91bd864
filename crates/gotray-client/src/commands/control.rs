//! Commands that talk to a running daemon.

use std::io::Write;
use std::path::Path;

use chrono::Local;

use gotray_server::{ServerError, Signal, StatusFile, running_pid, send_signal};

use crate::error::{ClientError, ClientResult};

/// Prints the health reported by the daemon.
pub fn status(pid_path: &Path, status_path: &Path, json: bool) -> ClientResult<()> {
    let status = read_status(pid_path, status_path)?;
    let mut out = std::io::stdout().lock();
    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&status).map_err(ServerError::from)?)?;
    } else {
        write!(out, "{}", render_status(&status))?;
    }
    Ok(())
}

/// Reads the status file, checking that the daemon that wrote it is alive.
fn read_status(pid_path: &Path, status_path: &Path) -> ClientResult<StatusFile> {
    let pid = running_pid(pid_path)?;
    let status = StatusFile::read(status_path).map_err(|e| {
        ClientError::Daemon(format!(
            "gotray (pid {}) has not published a status file at {}: {}",
            pid,
            status_path.display(),
            e
        ))
    })?;
    if status.pid != pid {
        return Err(ClientError::Daemon(format!(
            "status file {} was written by pid {}, but the running daemon is pid {}",
            status_path.display(),
            status.pid,
            pid
        )));
    }
    Ok(status)
}

/// Renders a status snapshot for the terminal.
pub fn render_status(status: &StatusFile) -> String {
    let mut text = format!("health: {}\n", status.health);
    match status.muted_until {
        Some(until) => text.push_str(&format!(
            "silent until {}\n",
            until.with_timezone(&Local).format("%H:%M")
        )),
        None => text.push_str("notifications on\n"),
    }
    text.push_str(&status.summary());
    text.push('\n');
    text
}

/// Mutes notifications in the running daemon.
pub fn silence(pid_path: &Path) -> ClientResult<()> {
    signal(pid_path, Signal::Silence, "Silenced")
}

/// Unmutes notifications in the running daemon.
pub fn unsilence(pid_path: &Path) -> ClientResult<()> {
    signal(pid_path, Signal::Unsilence, "Unsilenced")
}

/// Asks the running daemon to reload its configuration.
pub fn reload(pid_path: &Path) -> ClientResult<()> {
    signal(pid_path, Signal::Reload, "Reload requested for")
}

fn signal(pid_path: &Path, signal: Signal, verb: &str) -> ClientResult<()> {
    let pid = send_signal(pid_path, signal)?;
    println!("{} gotray (pid {})", verb, pid);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use gotray_core::{ConnectionState, Health};
    use tempfile::tempdir;

    fn sample(muted: bool) -> StatusFile {
        StatusFile {
            health: Health::Partial,
            generated_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            muted_until: muted.then(|| Utc.with_ymd_and_hms(2024, 5, 1, 12, 10, 0).unwrap()),
            pid: std::process::id(),
            endpoints: vec![
                ConnectionState {
                    address: "wss://a/stream?token=1".into(),
                    online: true,
                    last_error: None,
                },
                ConnectionState {
                    address: "wss://b/stream?token=2".into(),
                    online: false,
                    last_error: Some("status=401 error=denied".into()),
                },
            ],
        }
    }

    #[test]
    fn render_unmuted() {
        assert_eq!(
            render_status(&sample(false)),
            "health: partial\nnotifications on\n1/2 connections online\noffline:\n  - wss://b/stream?token=2\n      reason: status=401 error=denied\n"
        );
    }

    #[test]
    fn render_muted_mentions_silence() {
        let rendered = render_status(&sample(true));
        assert!(rendered.lines().nth(1).unwrap().starts_with("silent until "));
    }

    #[test]
    fn status_requires_running_daemon() {
        let dir = tempdir().unwrap();
        let err = read_status(&dir.path().join("gotray.pid"), &dir.path().join("s.json"))
            .unwrap_err();
        assert!(matches!(err, ClientError::Server(ServerError::NotRunning { .. })));
    }

    #[test]
    fn status_reads_file_of_live_daemon() {
        let dir = tempdir().unwrap();
        let pid_path = dir.path().join("gotray.pid");
        let status_path = dir.path().join("gotray.status.json");
        std::fs::write(&pid_path, format!("{}\n", std::process::id())).unwrap();

        let err = read_status(&pid_path, &status_path).unwrap_err();
        assert!(matches!(err, ClientError::Daemon(_)));

        sample(false).write(&status_path).unwrap();
        assert_eq!(read_status(&pid_path, &status_path).unwrap(), sample(false));
    }

    #[test]
    fn status_rejects_foreign_file() {
        let dir = tempdir().unwrap();
        let pid_path = dir.path().join("gotray.pid");
        let status_path = dir.path().join("gotray.status.json");
        std::fs::write(&pid_path, format!("{}\n", std::process::id())).unwrap();

        let mut status = sample(false);
        status.pid = 1;
        status.write(&status_path).unwrap();
        assert!(matches!(
            read_status(&pid_path, &status_path),
            Err(ClientError::Daemon(_))
        ));
    }

    #[test]
    fn silence_without_daemon_fails() {
        let dir = tempdir().unwrap();
        let err = silence(&dir.path().join("gotray.pid")).unwrap_err();
        assert!(matches!(err, ClientError::Server(ServerError::NotRunning { .. })));
    }
}
