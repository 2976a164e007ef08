//! Scoped, reclaimable storage for intermediate pipeline artifacts.
//!
//! One [`ScopedWorkspace`] belongs to one pipeline run. Its root directory is created on the
//! first allocation (after sweeping roots left by crashed runs) and removed by
//! [`ScopedWorkspace::teardown`], which also runs on drop.

/// Liveness marker and stale-root sweep.
pub mod marker;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::foundation::error::{RecutError, RecutResult};
pub use marker::{LivenessMarker, MARKER_FILE, is_pid_alive, sweep_stale};

/// Where and how workspace roots are created.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Parent directory for workspace roots.
    pub base_dir: PathBuf,
    /// Name prefix identifying roots owned by this program.
    pub prefix: String,
    /// Age after which a root without a readable marker counts as stale.
    pub stale_grace_secs: u64,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            base_dir: std::env::temp_dir(),
            prefix: "recut_ws_".to_string(),
            stale_grace_secs: 600,
        }
    }
}

/// Opaque artifact identifier, unique within one workspace.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArtifactHandle(u64);

impl std::fmt::Display for ArtifactHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "artifact#{}", self.0)
    }
}

/// Bookkeeping for one allocated artifact.
#[derive(Clone, Debug)]
pub struct Artifact {
    /// Handle returned by [`ScopedWorkspace::allocate`].
    pub handle: ArtifactHandle,
    /// Current location (moves into the final directory when promoted).
    pub path: PathBuf,
    /// Creation time.
    pub created_at: chrono::DateTime<chrono::Utc>,
    /// Stage currently holding write access.
    pub stage_owner: String,
    /// Promoted to a final output; never reclaimed.
    pub is_final: bool,
    /// Already reclaimed.
    pub released: bool,
}

impl Artifact {
    /// Size on disk in bytes (`0` when the file does not exist yet).
    pub fn size(&self) -> u64 {
        std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
    }
}

/// Outcome of [`ScopedWorkspace::teardown`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TeardownReport {
    /// Non-final artifacts reclaimed by this call.
    pub reclaimed: usize,
    /// Final artifacts left in place.
    pub kept_final: usize,
    /// Whether the root directory was removed by this call.
    pub root_removed: bool,
}

/// Per-run artifact store with guaranteed reclamation.
#[derive(Debug)]
pub struct ScopedWorkspace {
    cfg: WorkspaceConfig,
    run_token: uuid::Uuid,
    final_dir: Option<PathBuf>,
    root: Option<PathBuf>,
    artifacts: BTreeMap<ArtifactHandle, Artifact>,
    next_id: u64,
}

impl ScopedWorkspace {
    /// Create a workspace. Nothing touches the filesystem until the first allocation.
    pub fn new(cfg: WorkspaceConfig) -> Self {
        Self {
            cfg,
            run_token: uuid::Uuid::new_v4(),
            final_dir: None,
            root: None,
            artifacts: BTreeMap::new(),
            next_id: 0,
        }
    }

    /// Directory that receives artifacts promoted by [`ScopedWorkspace::mark_final`].
    pub fn with_final_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.final_dir = Some(dir.into());
        self
    }

    /// Token identifying this run's root.
    pub fn run_token(&self) -> uuid::Uuid {
        self.run_token
    }

    /// Root directory, if created.
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    fn ensure_root(&mut self) -> RecutResult<PathBuf> {
        if let Some(root) = &self.root {
            return Ok(root.clone());
        }

        let grace = Duration::from_secs(self.cfg.stale_grace_secs);
        let swept = sweep_stale(&self.cfg.base_dir, &self.cfg.prefix, grace)?;
        if !swept.is_empty() {
            tracing::info!(count = swept.len(), "swept stale workspace roots");
        }

        let root = self
            .cfg
            .base_dir
            .join(format!("{}{}", self.cfg.prefix, self.run_token.simple()));
        std::fs::create_dir_all(&root).map_err(|e| {
            RecutError::Other(anyhow::anyhow!(
                "failed to create workspace root '{}': {e}",
                root.display()
            ))
        })?;
        LivenessMarker::for_current_process(&root, self.run_token).write(&root)?;
        tracing::debug!(root = %root.display(), "created workspace root");

        self.root = Some(root.clone());
        Ok(root)
    }

    /// Allocate a uniquely named artifact with file extension `kind_hint`, owned by `stage`.
    ///
    /// Only the path is reserved; the owning stage creates the file.
    pub fn allocate(&mut self, kind_hint: &str, stage: &str) -> RecutResult<ArtifactHandle> {
        let root = self.ensure_root()?;
        let handle = ArtifactHandle(self.next_id);
        self.next_id += 1;

        let ext = kind_hint.trim_start_matches('.');
        let name = if ext.is_empty() {
            format!("{:04}-{}", handle.0, sanitize(stage))
        } else {
            format!("{:04}-{}.{ext}", handle.0, sanitize(stage))
        };

        self.artifacts.insert(
            handle,
            Artifact {
                handle,
                path: root.join(name),
                created_at: chrono::Utc::now(),
                stage_owner: stage.to_string(),
                is_final: false,
                released: false,
            },
        );
        Ok(handle)
    }

    fn get(&self, handle: ArtifactHandle) -> RecutResult<&Artifact> {
        self.artifacts
            .get(&handle)
            .ok_or_else(|| RecutError::validation(format!("unknown {handle}")))
    }

    fn get_mut(&mut self, handle: ArtifactHandle) -> RecutResult<&mut Artifact> {
        self.artifacts
            .get_mut(&handle)
            .ok_or_else(|| RecutError::validation(format!("unknown {handle}")))
    }

    /// Artifact metadata.
    pub fn artifact(&self, handle: ArtifactHandle) -> RecutResult<&Artifact> {
        self.get(handle)
    }

    /// Current path of a live artifact.
    pub fn path(&self, handle: ArtifactHandle) -> RecutResult<PathBuf> {
        let a = self.get(handle)?;
        if a.released {
            return Err(RecutError::validation(format!("{handle} was already released")));
        }
        Ok(a.path.clone())
    }

    /// Hand write access for `handle` to `stage`.
    pub fn transfer(&mut self, handle: ArtifactHandle, stage: &str) -> RecutResult<()> {
        let a = self.get_mut(handle)?;
        a.stage_owner = stage.to_string();
        Ok(())
    }

    /// Promote an artifact to a final output, keeping its file name.
    pub fn mark_final(&mut self, handle: ArtifactHandle) -> RecutResult<PathBuf> {
        let name = self
            .get(handle)?
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .ok_or_else(|| RecutError::validation(format!("{handle} has no file name")))?;
        self.mark_final_as(handle, name)
    }

    /// Promote an artifact to a final output named `name` inside the final directory.
    ///
    /// The file moves out of the workspace root so teardown can never remove it.
    pub fn mark_final_as(
        &mut self,
        handle: ArtifactHandle,
        name: impl AsRef<std::ffi::OsStr>,
    ) -> RecutResult<PathBuf> {
        let final_dir = self
            .final_dir
            .clone()
            .ok_or_else(|| RecutError::validation("workspace has no final output directory"))?;
        let a = self.get(handle)?;
        if a.is_final {
            return Ok(a.path.clone());
        }
        if a.released {
            return Err(RecutError::validation(format!("{handle} was already released")));
        }
        if !a.path.is_file() {
            return Err(RecutError::validation(format!(
                "{handle} has no file at '{}'",
                a.path.display()
            )));
        }

        std::fs::create_dir_all(&final_dir)?;
        let dest = final_dir.join(name.as_ref());
        move_file(&a.path, &dest)?;

        let a = self.get_mut(handle)?;
        a.path = dest.clone();
        a.is_final = true;
        tracing::info!(%handle, path = %dest.display(), "promoted final output");
        Ok(dest)
    }

    /// Reclaim an artifact. Releasing twice, or releasing a final output, is a no-op.
    pub fn release(&mut self, handle: ArtifactHandle) -> RecutResult<()> {
        let a = self.get_mut(handle)?;
        if a.released || a.is_final {
            return Ok(());
        }
        remove_if_exists(&a.path)?;
        a.released = true;
        Ok(())
    }

    /// Eagerly reclaim every live non-final artifact except those in `keep`.
    ///
    /// Used under resource pressure. Returns the number reclaimed.
    pub fn reclaim_intermediates(&mut self, keep: &[ArtifactHandle]) -> usize {
        let mut reclaimed = 0;
        for a in self.artifacts.values_mut() {
            if a.released || a.is_final || keep.contains(&a.handle) {
                continue;
            }
            match remove_if_exists(&a.path) {
                Ok(()) => {
                    a.released = true;
                    reclaimed += 1;
                }
                Err(e) => tracing::warn!(handle = %a.handle, error = %e, "reclaim failed"),
            }
        }
        reclaimed
    }

    /// Live (allocated, not released) artifacts, finals included.
    pub fn live_artifacts(&self) -> impl Iterator<Item = &Artifact> {
        self.artifacts.values().filter(|a| !a.released)
    }

    /// Artifacts currently marked final.
    pub fn final_artifacts(&self) -> impl Iterator<Item = &Artifact> {
        self.artifacts.values().filter(|a| a.is_final)
    }

    /// Bytes held by live non-final artifacts.
    pub fn disk_usage(&self) -> u64 {
        self.live_artifacts()
            .filter(|a| !a.is_final)
            .map(Artifact::size)
            .sum()
    }

    /// Reclaim every non-final artifact and remove the root. Safe to call repeatedly.
    pub fn teardown(&mut self) -> RecutResult<TeardownReport> {
        let mut report = TeardownReport {
            reclaimed: self.reclaim_intermediates(&[]),
            kept_final: self.final_artifacts().count(),
            root_removed: false,
        };

        if let Some(root) = self.root.take() {
            match std::fs::remove_dir_all(&root) {
                Ok(()) => report.root_removed = true,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    self.root = Some(root.clone());
                    return Err(RecutError::Other(anyhow::anyhow!(
                        "failed to remove workspace root '{}': {e}",
                        root.display()
                    )));
                }
            }
            tracing::debug!(root = %root.display(), reclaimed = report.reclaimed, "workspace torn down");
        }
        Ok(report)
    }
}

impl Drop for ScopedWorkspace {
    fn drop(&mut self) {
        if let Err(e) = self.teardown() {
            tracing::warn!(error = %e, "workspace teardown on drop failed");
        }
    }
}

fn sanitize(stage: &str) -> String {
    stage
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect()
}

fn remove_if_exists(path: &Path) -> RecutResult<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn move_file(from: &Path, to: &Path) -> RecutResult<()> {
    if std::fs::rename(from, to).is_ok() {
        return Ok(());
    }
    // Cross-device moves fall back to copy + remove.
    std::fs::copy(from, to).map_err(|e| {
        RecutError::Other(anyhow::anyhow!(
            "failed to move '{}' to '{}': {e}",
            from.display(),
            to.display()
        ))
    })?;
    remove_if_exists(from)
}

#[cfg(test)]
#[path = "../../tests/unit/workspace/workspace.rs"]
mod tests;
