use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use sysinfo::{Pid, ProcessesToUpdate, System};

use crate::foundation::error::{RecutError, RecutResult};

/// File name of the liveness marker inside every workspace root.
pub const MARKER_FILE: &str = ".recut-live.json";

/// Crash-recovery record written when a workspace root is created.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LivenessMarker {
    /// Workspace root this marker guards.
    pub root_path: PathBuf,
    /// Process that owns the root.
    pub pid: u32,
    /// Per-run token, unique across concurrent runs in one process.
    pub run_token: uuid::Uuid,
    /// Creation time.
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl LivenessMarker {
    /// Marker for `root` owned by the current process.
    pub fn for_current_process(root: &Path, run_token: uuid::Uuid) -> Self {
        Self {
            root_path: root.to_path_buf(),
            pid: std::process::id(),
            run_token,
            created_at: chrono::Utc::now(),
        }
    }

    /// Write the marker into `root`.
    pub fn write(&self, root: &Path) -> RecutResult<()> {
        let bytes = serde_json::to_vec_pretty(self)?;
        std::fs::write(root.join(MARKER_FILE), bytes)?;
        Ok(())
    }

    /// Read the marker from `root`.
    pub fn read(root: &Path) -> RecutResult<Self> {
        let bytes = std::fs::read(root.join(MARKER_FILE))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| RecutError::serde(format!("corrupt liveness marker: {e}")))
    }
}

/// Return `true` when a process with `pid` currently exists.
pub fn is_pid_alive(pid: u32) -> bool {
    if pid == std::process::id() {
        return true;
    }
    let pid = Pid::from_u32(pid);
    let mut sys = System::new();
    sys.refresh_processes(ProcessesToUpdate::Some(&[pid]));
    sys.process(pid).is_some()
}

/// Remove workspace roots under `base_dir` left behind by crashed runs.
///
/// A directory qualifies when its name starts with `prefix` and either its marker names a
/// dead process, or the marker is missing/corrupt and the directory is older than `grace`.
/// Returns the removed roots.
pub fn sweep_stale(base_dir: &Path, prefix: &str, grace: Duration) -> RecutResult<Vec<PathBuf>> {
    let entries = match std::fs::read_dir(base_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut removed = Vec::new();
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !name.starts_with(prefix) || !entry.file_type()?.is_dir() {
            continue;
        }

        let root = entry.path();
        let stale = match LivenessMarker::read(&root) {
            Ok(marker) => !is_pid_alive(marker.pid),
            Err(_) => older_than(&root, grace),
        };
        if !stale {
            continue;
        }

        match std::fs::remove_dir_all(&root) {
            Ok(()) => {
                tracing::info!(root = %root.display(), "reclaimed stale workspace root");
                removed.push(root);
            }
            Err(e) => {
                tracing::warn!(root = %root.display(), error = %e, "failed to reclaim stale root");
            }
        }
    }
    Ok(removed)
}

fn older_than(path: &Path, grace: Duration) -> bool {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|mtime| SystemTime::now().duration_since(mtime).ok())
        .is_some_and(|age| age >= grace)
}
