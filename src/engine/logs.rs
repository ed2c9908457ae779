//! Engine output forwarding and log file access.
//!
//! While the engine runs, each line it writes to stdout or stderr is handed to
//! the log observer and appended to the engine log file under the working
//! directory. Both streams are drained until EOF, which the engine closes on
//! exit, so the forwarder finishes on its own once the process is gone.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{ChildStderr, ChildStdout};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::telemetry::NotificationHub;

/// Text used when there is no log file to show or export.
pub const NO_LOGS: &str = "No logs available";

/// Prefix of exported log file names.
pub const EXPORT_PREFIX: &str = "vortex_logs_";

/// Forward engine output until both streams close.
pub fn spawn_log_forwarder(
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
    hub: Arc<NotificationHub>,
    log_file: PathBuf,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let sink = Arc::new(Mutex::new(open_log_file(&log_file).await));

        tokio::join!(
            forward_lines(stdout, hub.clone(), sink.clone()),
            forward_lines(stderr, hub, sink),
        );
        trace!("Engine output streams closed");
    })
}

async fn open_log_file(path: &Path) -> Option<File> {
    if let Some(parent) = path.parent()
        && let Err(e) = fs::create_dir_all(parent).await
    {
        debug!("Cannot create log directory {:?}: {}", parent, e);
        return None;
    }

    match OpenOptions::new().create(true).append(true).open(path).await {
        Ok(file) => Some(file),
        Err(e) => {
            debug!("Cannot open engine log {:?}: {}", path, e);
            None
        }
    }
}

async fn forward_lines<R>(
    stream: Option<R>,
    hub: Arc<NotificationHub>,
    sink: Arc<Mutex<Option<File>>>,
) where
    R: AsyncRead + Unpin,
{
    let Some(stream) = stream else {
        return;
    };

    // Engine output is not guaranteed to be UTF-8, so lines are read as bytes
    // and decoded lossily.
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(trim_line_end(&buf));
                hub.emit_log(&line);
                append(&sink, &line).await;
            }
            Err(e) => {
                // Keep the pipe open so the engine never writes into a closed reader.
                debug!("Error reading engine output, discarding the rest: {}", e);
                if let Err(e) = tokio::io::copy(&mut reader, &mut tokio::io::sink()).await {
                    debug!("Discarding engine output failed: {}", e);
                }
                break;
            }
        }
    }
}

fn trim_line_end(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

async fn append(sink: &Mutex<Option<File>>, line: &str) {
    let mut guard = sink.lock().await;
    let Some(file) = guard.as_mut() else {
        return;
    };

    let mut record = String::with_capacity(line.len() + 1);
    record.push_str(line);
    record.push('\n');

    let written = match file.write_all(record.as_bytes()).await {
        Ok(()) => file.flush().await,
        Err(e) => Err(e),
    };
    if let Err(e) = written {
        debug!("Engine log write failed, disabling file sink: {}", e);
        *guard = None;
    }
}

/// Read the engine log file wholesale.
pub async fn read_logs(path: &Path) -> Option<String> {
    match fs::read_to_string(path).await {
        Ok(contents) => Some(contents),
        Err(e) => {
            debug!("No engine log at {:?}: {}", path, e);
            None
        }
    }
}

/// Write `contents` to a timestamped file in `dir` and return its path.
pub async fn export_logs(dir: &Path, contents: &str) -> Option<PathBuf> {
    let path = dir.join(format!(
        "{}{}.txt",
        EXPORT_PREFIX,
        chrono::Utc::now().timestamp()
    ));

    match fs::write(&path, contents).await {
        Ok(()) => Some(path),
        Err(e) => {
            debug!("Failed to export logs to {:?}: {}", path, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_read_missing_logs() {
        let dir = tempdir().unwrap();
        assert!(read_logs(&dir.path().join("logs/mihomo.log")).await.is_none());
    }

    #[tokio::test]
    async fn test_export_writes_timestamped_file() {
        let dir = tempdir().unwrap();
        let path = export_logs(dir.path(), "line one\n").await.unwrap();

        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(EXPORT_PREFIX));
        assert!(name.ends_with(".txt"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "line one\n");
    }

    #[tokio::test]
    async fn test_export_to_missing_dir_fails() {
        let dir = tempdir().unwrap();
        assert!(export_logs(&dir.path().join("nope"), NO_LOGS).await.is_none());
    }

    #[tokio::test]
    async fn test_forward_lines_emits_and_appends() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("logs/mihomo.log");

        let hub = Arc::new(NotificationHub::new());
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        hub.forward_to(tx);

        let sink = Arc::new(Mutex::new(open_log_file(&log_path).await));
        let input: &[u8] = b"first\nsecond\n";
        forward_lines(Some(input), hub, sink).await;

        assert_eq!(
            rx.try_recv().unwrap(),
            crate::telemetry::EngineEvent::Log("first".into())
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            crate::telemetry::EngineEvent::Log("second".into())
        );
        assert_eq!(
            read_logs(&log_path).await.as_deref(),
            Some("first\nsecond\n")
        );
    }

    #[tokio::test]
    async fn test_forward_lines_survives_invalid_utf8() {
        let hub = Arc::new(NotificationHub::new());
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        hub.forward_to(tx);

        let input: &[u8] = b"hello\xff\r\ntick\nlast";
        forward_lines(Some(input), hub, Arc::new(Mutex::new(None))).await;

        let mut lines = Vec::new();
        while let Ok(crate::telemetry::EngineEvent::Log(line)) = rx.try_recv() {
            lines.push(line);
        }
        assert_eq!(lines, vec!["hello\u{fffd}", "tick", "last"]);
    }
}
