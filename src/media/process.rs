use std::io::Read;
use std::process::{Child, ExitStatus};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::foundation::error::{RecutError, RecutResult};

/// How often a running child is polled for exit, timeout and interrupts.
pub(crate) const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Read `pipe` to the end on a background thread.
pub(crate) fn drain<R>(mut pipe: R) -> JoinHandle<std::io::Result<Vec<u8>>>
where
    R: Read + Send + 'static,
{
    std::thread::spawn(move || {
        let mut bytes = Vec::new();
        pipe.read_to_end(&mut bytes)?;
        Ok(bytes)
    })
}

/// Collect a drained pipe as text, describing drain failures inline.
pub(crate) fn drained_text(handle: JoinHandle<std::io::Result<Vec<u8>>>) -> String {
    match handle.join() {
        Ok(Ok(bytes)) => String::from_utf8_lossy(&bytes).trim().to_owned(),
        Ok(Err(e)) => format!("<read failed: {e}>"),
        Err(_) => "<drain thread panicked>".to_owned(),
    }
}

/// Kill `child` and reap it. Kill fails harmlessly if it already exited.
pub(crate) fn kill(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

/// Wait for `child` until it exits, `deadline` passes, or `interrupt` returns an error.
///
/// On timeout or interrupt the child is killed and reaped before the error is returned.
pub(crate) fn supervise<F>(
    child: &mut Child,
    what: &str,
    started: Instant,
    timeout: Duration,
    mut interrupt: F,
) -> RecutResult<ExitStatus>
where
    F: FnMut() -> RecutResult<()>,
{
    let stop = loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) => {}
            Err(e) => break RecutError::from(e),
        }
        if started.elapsed() >= timeout {
            break RecutError::stage(format!(
                "{what} timed out after {}s",
                timeout.as_secs_f64()
            ));
        }
        if let Err(e) = interrupt() {
            break e;
        }
        std::thread::sleep(POLL_INTERVAL);
    };
    kill(child);
    tracing::warn!(error = %stop, "{what} stopped early");
    Err(stop)
}

/// Write an executable shell script standing in for an external tool.
#[cfg(all(test, unix))]
pub(crate) fn stub_program(dir: &std::path::Path, name: &str, body: &str) -> std::path::PathBuf {
    use std::os::unix::fs::PermissionsExt as _;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[cfg(test)]
#[path = "../../tests/unit/media/process.rs"]
mod tests;
