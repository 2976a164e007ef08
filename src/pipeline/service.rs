use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;

use crate::foundation::cancel::CancelToken;
use crate::foundation::error::{RecutError, RecutResult};
use crate::pipeline::orchestrator::{Pipeline, PipelineOutput};
use crate::pipeline::progress::{Progress, ProgressHandle};
use crate::pipeline::settings::Settings;

/// Identifier of a run started through [`PipelineService`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct RunId(uuid::Uuid);

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "run-{}", self.0.simple())
    }
}

/// Terminal result of a run.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    Succeeded { output: PipelineOutput },
    Aborted { reason: String },
    Cancelled,
}

impl From<RecutResult<PipelineOutput>> for RunOutcome {
    fn from(result: RecutResult<PipelineOutput>) -> Self {
        match result {
            Ok(output) => RunOutcome::Succeeded { output },
            Err(RecutError::Cancelled) => RunOutcome::Cancelled,
            Err(e) => RunOutcome::Aborted {
                reason: e.to_string(),
            },
        }
    }
}

struct RunEntry {
    cancel: CancelToken,
    progress: ProgressHandle,
    thread: Option<JoinHandle<RunOutcome>>,
    outcome: Option<RunOutcome>,
}

impl RunEntry {
    /// Collect the outcome if the worker has finished, without blocking.
    fn poll(&mut self) -> Option<RunOutcome> {
        if self.outcome.is_none() && self.thread.as_ref().is_some_and(|t| t.is_finished()) {
            if let Some(t) = self.thread.take() {
                self.outcome = Some(join_outcome(t));
            }
        }
        self.outcome.clone()
    }
}

fn join_outcome(thread: JoinHandle<RunOutcome>) -> RunOutcome {
    thread.join().unwrap_or_else(|_| RunOutcome::Aborted {
        reason: "pipeline worker panicked".to_owned(),
    })
}

/// Registry of concurrent runs, each on its own thread with its own workspace.
pub struct PipelineService {
    pipeline: Arc<Pipeline>,
    runs: Mutex<HashMap<RunId, RunEntry>>,
}

impl std::fmt::Debug for PipelineService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineService")
            .field("runs", &self.lock().len())
            .finish_non_exhaustive()
    }
}

impl PipelineService {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            runs: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<RunId, RunEntry>> {
        match self.runs.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn unknown(id: RunId) -> RecutError {
        RecutError::validation(format!("unknown {id}"))
    }

    /// Validate `settings` and start a run in the background.
    ///
    /// Configuration errors surface here, before any work starts.
    pub fn start_pipeline(&self, input: PathBuf, settings: Settings) -> RecutResult<RunId> {
        settings.validate()?;
        let id = RunId(uuid::Uuid::new_v4());
        let cancel = CancelToken::new();
        let progress = ProgressHandle::new(self.pipeline.resources().clone());

        let pipeline = Arc::clone(&self.pipeline);
        let (worker_cancel, worker_progress) = (cancel.clone(), progress.clone());
        let thread = std::thread::Builder::new()
            .name(format!("recut-{id}"))
            .spawn(move || {
                RunOutcome::from(pipeline.run(&input, &settings, &worker_cancel, &worker_progress))
            })?;
        tracing::info!(%id, "run started");

        self.lock().insert(
            id,
            RunEntry {
                cancel,
                progress,
                thread: Some(thread),
                outcome: None,
            },
        );
        Ok(id)
    }

    pub fn get_progress(&self, id: RunId) -> RecutResult<Progress> {
        self.lock()
            .get(&id)
            .map(|e| e.progress.snapshot())
            .ok_or_else(|| Self::unknown(id))
    }

    /// Request cooperative cancellation. Cancelling a finished run is a no-op.
    pub fn cancel(&self, id: RunId) -> RecutResult<()> {
        let runs = self.lock();
        let entry = runs.get(&id).ok_or_else(|| Self::unknown(id))?;
        entry.cancel.cancel();
        tracing::info!(%id, "cancellation requested");
        Ok(())
    }

    /// The run's outcome, or `None` while it is still running.
    pub fn get_result(&self, id: RunId) -> RecutResult<Option<RunOutcome>> {
        let mut runs = self.lock();
        let entry = runs.get_mut(&id).ok_or_else(|| Self::unknown(id))?;
        Ok(entry.poll())
    }

    /// Block until the run finishes and return its outcome.
    pub fn wait(&self, id: RunId) -> RecutResult<RunOutcome> {
        let thread = {
            let mut runs = self.lock();
            let entry = runs.get_mut(&id).ok_or_else(|| Self::unknown(id))?;
            if let Some(outcome) = &entry.outcome {
                return Ok(outcome.clone());
            }
            entry.thread.take()
        };
        let Some(thread) = thread else {
            return Err(RecutError::validation(format!("{id} is already being awaited")));
        };
        let outcome = join_outcome(thread);
        if let Some(entry) = self.lock().get_mut(&id) {
            entry.outcome = Some(outcome.clone());
        }
        Ok(outcome)
    }

    /// Drop a finished run and return its outcome. Running runs are left untouched.
    pub fn forget(&self, id: RunId) -> RecutResult<RunOutcome> {
        let mut runs = self.lock();
        let entry = runs.get_mut(&id).ok_or_else(|| Self::unknown(id))?;
        let Some(outcome) = entry.poll() else {
            return Err(RecutError::validation(format!("{id} is still running")));
        };
        runs.remove(&id);
        tracing::debug!(%id, "run forgotten");
        Ok(outcome)
    }

    /// Ids of every run tracked by this service.
    pub fn runs(&self) -> Vec<RunId> {
        self.lock().keys().copied().collect()
    }
}

impl Drop for PipelineService {
    fn drop(&mut self) {
        let runs = std::mem::take(&mut *self.lock());
        for (id, mut entry) in runs {
            entry.cancel.cancel();
            if let Some(t) = entry.thread.take() {
                tracing::debug!(%id, "waiting for cancelled run");
                let _ = t.join();
            }
        }
    }
}
