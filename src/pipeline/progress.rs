use std::sync::{Arc, RwLock};

use crate::exec::StageKind;
use crate::monitor::{ResourceLevel, ResourceView};

/// Terminal or running status of a pipeline run.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Succeeded,
    Aborted(String),
    Cancelled,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Succeeded | RunStatus::Aborted(_) | RunStatus::Cancelled
        )
    }
}

/// What an external observer sees of a run.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    /// Stage currently executing (or last executed).
    pub stage: Option<StageKind>,
    pub stage_index: usize,
    pub stage_count: usize,
    /// Overall completion in `[0, 1]`.
    pub fraction: f64,
    pub resource_level: ResourceLevel,
    pub status: RunStatus,
}

impl Default for Progress {
    fn default() -> Self {
        Self {
            stage: None,
            stage_index: 0,
            stage_count: StageKind::ALL.len(),
            fraction: 0.0,
            resource_level: ResourceLevel::Normal,
            status: RunStatus::Pending,
        }
    }
}

/// Shared progress cell written by the run and read by observers.
#[derive(Clone, Debug, Default)]
pub struct ProgressHandle {
    inner: Arc<RwLock<Progress>>,
    resources: ResourceView,
}

impl ProgressHandle {
    /// Progress that reports the level seen by `resources`.
    pub fn new(resources: ResourceView) -> Self {
        Self {
            inner: Arc::default(),
            resources,
        }
    }

    pub fn snapshot(&self) -> Progress {
        let mut p = match self.inner.read() {
            Ok(g) => g.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        p.resource_level = self.resources.level();
        p
    }

    fn update(&self, f: impl FnOnce(&mut Progress)) {
        match self.inner.write() {
            Ok(mut g) => f(&mut g),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }

    pub(crate) fn begin_stage(&self, stage: StageKind) {
        self.update(|p| {
            p.stage = Some(stage);
            p.stage_index = stage.index();
            p.fraction = stage.index() as f64 / p.stage_count as f64;
            p.status = RunStatus::Running;
        });
    }

    pub(crate) fn complete_stage(&self, stage: StageKind) {
        self.update(|p| {
            p.fraction = (stage.index() + 1) as f64 / p.stage_count as f64;
        });
    }

    pub(crate) fn finish(&self, status: RunStatus) {
        self.update(|p| {
            if status == RunStatus::Succeeded {
                p.fraction = 1.0;
            }
            p.status = status;
        });
    }
}
