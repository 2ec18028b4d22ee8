//! Graceful termination and exit-status decoding shared by agent and
//! terminal processes.

use std::io;
use std::process::ExitStatus;
use std::time::Duration;

use tokio::process::Child;
use tracing::{debug, warn};

/// Ask `child` to stop, then force-kill it if it is still running after
/// `grace`. Returns the final exit status.
///
/// # Errors
///
/// Returns the I/O error from waiting on or killing the child.
pub async fn terminate(child: &mut Child, grace: Duration) -> io::Result<ExitStatus> {
    if let Some(status) = child.try_wait()? {
        return Ok(status);
    }

    send_terminate(child);

    if let Ok(status) = tokio::time::timeout(grace, child.wait()).await {
        return status;
    }

    warn!(pid = child.id(), ?grace, "process ignored terminate signal, force killing");
    child.kill().await?;
    child.wait().await
}

#[cfg(unix)]
fn send_terminate(child: &mut Child) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.id().and_then(|raw| i32::try_from(raw).ok()) else {
        return;
    };
    if let Err(err) = kill(Pid::from_raw(pid), Signal::SIGTERM) {
        debug!(pid, %err, "SIGTERM delivery failed");
    }
}

#[cfg(not(unix))]
fn send_terminate(child: &mut Child) {
    if let Err(err) = child.start_kill() {
        debug!(pid = child.id(), %err, "terminate request failed");
    }
}

/// Split an exit status into `(exit code, signal name)`.
#[must_use]
pub fn exit_parts(status: ExitStatus) -> (Option<i32>, Option<String>) {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        (status.code(), status.signal().map(signal_name))
    }
    #[cfg(not(unix))]
    {
        (status.code(), None)
    }
}

#[cfg(unix)]
fn signal_name(raw: i32) -> String {
    nix::sys::signal::Signal::try_from(raw)
        .map_or_else(|_| format!("SIG{raw}"), |sig| sig.as_str().to_owned())
}
