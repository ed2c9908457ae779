//! Handle to a running engine process.

use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tracing::{debug, warn};

use super::error::SupervisorError;

/// `CREATE_NO_WINDOW`: keep the engine from opening a console.
#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Build the engine command line.
///
/// The engine runs in `work_dir` with no stdin. Output is piped so it can be
/// forwarded to the log observer.
pub fn engine_command(exe: &Path, work_dir: &Path, config: &Path) -> Command {
    let mut cmd = Command::new(exe);
    cmd.arg("-d")
        .arg(work_dir)
        .arg("-f")
        .arg(config)
        .current_dir(work_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    #[cfg(windows)]
    cmd.creation_flags(CREATE_NO_WINDOW);

    cmd
}

/// Handle to a running engine.
pub struct EngineHandle {
    child: Child,
    pid: Option<u32>,
}

impl EngineHandle {
    /// Spawn the engine.
    pub fn spawn(exe: &Path, work_dir: &Path, config: &Path) -> Result<Self, SupervisorError> {
        let child = engine_command(exe, work_dir, config)
            .spawn()
            .map_err(SupervisorError::SpawnFailed)?;
        let pid = child.id();
        debug!("Spawned engine {:?} (pid {:?})", exe, pid);
        Ok(Self { child, pid })
    }

    /// Take the piped output streams. Only the first call returns them.
    pub fn take_output(&mut self) -> (Option<ChildStdout>, Option<ChildStderr>) {
        (self.child.stdout.take(), self.child.stderr.take())
    }

    /// Check if the engine is still running.
    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Get the exit status if available without blocking.
    pub fn try_wait(&mut self) -> std::io::Result<Option<ExitStatus>> {
        self.child.try_wait()
    }

    /// Kill the engine and wait up to `timeout` for it to exit.
    ///
    /// Returns whether the exit was observed. The handle is consumed either
    /// way; `kill_on_drop` covers a process that outlived the wait.
    pub async fn terminate(mut self, timeout: Duration) -> bool {
        if let Err(e) = self.child.start_kill() {
            // Already reaped or exited on its own.
            debug!("Kill signal not delivered: {}", e);
        }

        match tokio::time::timeout(timeout, self.child.wait()).await {
            Ok(Ok(status)) => {
                debug!("Engine (pid {:?}) exited with {}", self.pid, status);
                true
            }
            Ok(Err(e)) => {
                warn!("Failed to wait for engine exit: {}", e);
                false
            }
            Err(_) => {
                warn!(
                    "Engine (pid {:?}) did not exit within {:?}, releasing handle",
                    self.pid, timeout
                );
                false
            }
        }
    }
}
