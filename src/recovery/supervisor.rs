use std::time::{Duration, Instant};

use crate::foundation::cancel::CancelToken;
use crate::foundation::error::{RecutError, RecutResult};
use crate::monitor::{ResourceLevel, ResourceView};
use crate::recovery::strategy::{DegradeProfile, DegradeStrategy};
use crate::workspace::{ArtifactHandle, ScopedWorkspace};

/// Retry budget and timing for the degrade ladder.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Attempts per strategy.
    pub max_attempts: u32,
    /// Backoff before a retry after failed attempt `k` is `backoff_base_ms * 2^k`.
    pub backoff_base_ms: u64,
    /// How long a paused stage waits for resources to recover before aborting.
    pub resource_wait_ms: u64,
    /// Poll interval while waiting for resources.
    pub resource_poll_ms: u64,
    /// Pre-emptions tolerated for one stage before giving up.
    pub max_preemptions: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base_ms: 1_000,
            resource_wait_ms: 60_000,
            resource_poll_ms: 250,
            max_preemptions: 5,
        }
    }
}

impl RetryPolicy {
    pub fn validate(&self) -> RecutResult<()> {
        if self.max_attempts == 0 {
            return Err(RecutError::policy("max_attempts must be >= 1"));
        }
        if self.resource_poll_ms == 0 {
            return Err(RecutError::policy("resource_poll_ms must be > 0"));
        }
        Ok(())
    }

    /// Total invocation budget across the whole ladder.
    pub fn budget(&self) -> u32 {
        self.max_attempts
            .saturating_mul(DegradeStrategy::ORDER.len() as u32)
    }

    /// Delay before retrying after failed attempt `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt.min(16)).unwrap_or(u64::MAX);
        Duration::from_millis(self.backoff_base_ms.saturating_mul(factor))
    }

    /// The ordered `(strategy, attempt)` rungs.
    fn ladder(&self) -> Vec<(DegradeStrategy, u32)> {
        DegradeStrategy::ORDER
            .iter()
            .flat_map(|&s| (1..=self.max_attempts).map(move |a| (s, a)))
            .collect()
    }
}

/// Supervisor lifecycle for one stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupervisorState {
    Running,
    /// Moving on to the next strategy.
    Degrading,
    /// Retrying within the current strategy.
    Retrying,
    Succeeded,
    Aborted,
}

/// Result of one attempt, as recorded in the log.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Succeeded,
    Failed(String),
    /// Stopped because resources turned critical; re-run without consuming budget.
    Preempted(String),
    Fatal(String),
}

/// Append-only log entry.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RecoveryAttempt {
    pub strategy: DegradeStrategy,
    /// 1-based attempt within `strategy`.
    pub attempt_number: u32,
    pub stage: String,
    pub outcome: AttemptOutcome,
    pub at: chrono::DateTime<chrono::Utc>,
}

impl RecoveryAttempt {
    pub fn failed(&self) -> bool {
        matches!(
            self.outcome,
            AttemptOutcome::Failed(_) | AttemptOutcome::Fatal(_)
        )
    }
}

/// Tagged result of one supervised step.
#[derive(Debug)]
pub enum StepOutcome<T> {
    Success(T),
    /// Failed but retryable; carries the strategy of the next rung.
    Retry(DegradeStrategy),
    Fatal(RecutError),
}

/// Checked by long-running stage work to stop early.
///
/// Trips on caller cancellation, and for non-critical stages also when the resource
/// level turns critical.
#[derive(Clone, Debug)]
pub struct StageInterrupt {
    cancel: CancelToken,
    resources: ResourceView,
    preemptible: bool,
}

impl StageInterrupt {
    pub fn new(cancel: CancelToken, resources: ResourceView, preemptible: bool) -> Self {
        Self {
            cancel,
            resources,
            preemptible,
        }
    }

    /// Interrupt that only observes `cancel`.
    pub fn cancel_only(cancel: CancelToken) -> Self {
        Self::new(cancel, ResourceView::detached(), false)
    }

    pub fn check(&self) -> RecutResult<()> {
        self.cancel.check()?;
        if self.preemptible && self.resources.level() == ResourceLevel::Critical {
            return Err(RecutError::preempted("resource level critical"));
        }
        Ok(())
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }
}

/// What a supervised operation sees for one attempt.
#[derive(Clone, Debug)]
pub struct AttemptContext {
    pub strategy: DegradeStrategy,
    pub attempt: u32,
    pub profile: DegradeProfile,
    pub interrupt: StageInterrupt,
}

/// Runs one stage at a time through the degrade ladder.
#[derive(Debug)]
pub struct RecoverySupervisor {
    policy: RetryPolicy,
    resources: ResourceView,
    cancel: CancelToken,
    state: SupervisorState,
    log: Vec<RecoveryAttempt>,
}

impl RecoverySupervisor {
    pub fn new(policy: RetryPolicy, resources: ResourceView, cancel: CancelToken) -> Self {
        Self {
            policy,
            resources,
            cancel,
            state: SupervisorState::Running,
            log: Vec::new(),
        }
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    /// Every attempt recorded so far, across all stages.
    pub fn log(&self) -> &[RecoveryAttempt] {
        &self.log
    }

    pub fn into_log(self) -> Vec<RecoveryAttempt> {
        self.log
    }

    /// Classify the result of one invocation.
    pub fn step<T>(result: RecutResult<T>, next: Option<DegradeStrategy>) -> StepOutcome<T> {
        match result {
            Ok(v) => StepOutcome::Success(v),
            Err(e) if e.is_retryable() => match next {
                Some(s) => StepOutcome::Retry(s),
                None => StepOutcome::Fatal(e),
            },
            Err(e) => StepOutcome::Fatal(e),
        }
    }

    /// Run `op` for `stage` under the degrade ladder.
    ///
    /// `critical` stages are never pre-empted mid-flight. `keep` lists artifacts the
    /// aggressive cleanup must not reclaim (typically the stage's input).
    #[tracing::instrument(skip(self, ws, keep, op))]
    pub fn execute<T, F>(
        &mut self,
        stage: &str,
        critical: bool,
        ws: &mut ScopedWorkspace,
        keep: &[ArtifactHandle],
        mut op: F,
    ) -> RecutResult<T>
    where
        F: FnMut(&mut ScopedWorkspace, &AttemptContext) -> RecutResult<T>,
    {
        self.state = SupervisorState::Running;
        let ladder = self.policy.ladder();
        let mut failures = 0u32;
        let mut preemptions = 0u32;

        for (i, &(strategy, attempt)) in ladder.iter().enumerate() {
            if i > 0 {
                let (_, prev_attempt) = ladder[i - 1];
                self.state = if attempt == 1 {
                    SupervisorState::Degrading
                } else {
                    SupervisorState::Retrying
                };
                tracing::info!(%strategy, attempt, "retrying stage");
                if let Err(e) = self.cancel.sleep(self.policy.backoff(prev_attempt)) {
                    return self.abort(e);
                }
            }

            let ctx = AttemptContext {
                strategy,
                attempt,
                profile: strategy.profile(attempt),
                interrupt: StageInterrupt::new(
                    self.cancel.clone(),
                    self.resources.clone(),
                    !critical,
                ),
            };

            let result = loop {
                if let Err(e) = self.cancel.check() {
                    return self.abort(e);
                }
                if let Err(e) = self.ensure_resources(ws, keep) {
                    return self.abort(e);
                }
                match op(ws, &ctx) {
                    Err(RecutError::Preempted(reason)) => {
                        preemptions += 1;
                        tracing::warn!(%strategy, attempt, %reason, "stage pre-empted");
                        self.record(stage, strategy, attempt, AttemptOutcome::Preempted(reason));
                        if preemptions > self.policy.max_preemptions {
                            return self.abort(RecutError::exhausted(format!(
                                "stage {stage} pre-empted {preemptions} times"
                            )));
                        }
                    }
                    other => break other,
                }
            };

            let next = ladder.get(i + 1).map(|&(s, _)| s);
            let detail = result.as_ref().err().map(ToString::to_string);
            match Self::step(result, next) {
                StepOutcome::Success(v) => {
                    self.record(stage, strategy, attempt, AttemptOutcome::Succeeded);
                    self.state = SupervisorState::Succeeded;
                    return Ok(v);
                }
                StepOutcome::Retry(next) => {
                    failures += 1;
                    let msg = detail.unwrap_or_default();
                    tracing::warn!(%strategy, attempt, %next, error = %msg, "stage attempt failed");
                    self.record(stage, strategy, attempt, AttemptOutcome::Failed(msg));
                }
                StepOutcome::Fatal(e) if e.is_retryable() => {
                    failures += 1;
                    self.record(stage, strategy, attempt, AttemptOutcome::Failed(e.to_string()));
                    tracing::error!(attempts = failures, error = %e, "recovery strategies exhausted");
                    return self.abort(RecutError::ProcessingFailure {
                        stage: stage.to_owned(),
                        attempts: failures,
                        cause: Box::new(e),
                    });
                }
                StepOutcome::Fatal(e) => {
                    self.record(stage, strategy, attempt, AttemptOutcome::Fatal(e.to_string()));
                    return self.abort(e);
                }
            }
        }

        // Only reachable with an empty ladder, which validate() rules out.
        self.abort(RecutError::policy("retry ladder is empty"))
    }

    fn ensure_resources(
        &mut self,
        ws: &mut ScopedWorkspace,
        keep: &[ArtifactHandle],
    ) -> RecutResult<()> {
        if self.resources.level() != ResourceLevel::Critical {
            return Ok(());
        }
        let reclaimed = ws.reclaim_intermediates(keep);
        tracing::warn!(reclaimed, "resources critical; paused for cleanup");

        let deadline = Instant::now() + Duration::from_millis(self.policy.resource_wait_ms);
        let poll = Duration::from_millis(self.policy.resource_poll_ms);
        loop {
            if self.resources.level() <= ResourceLevel::Warning {
                tracing::info!("resources recovered; resuming");
                return Ok(());
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(RecutError::exhausted(
                    "resources still critical after cleanup",
                ));
            }
            self.cancel.sleep(poll.min(deadline - now))?;
        }
    }

    fn record(
        &mut self,
        stage: &str,
        strategy: DegradeStrategy,
        attempt: u32,
        outcome: AttemptOutcome,
    ) {
        self.log.push(RecoveryAttempt {
            strategy,
            attempt_number: attempt,
            stage: stage.to_owned(),
            outcome,
            at: chrono::Utc::now(),
        });
    }

    fn abort<T>(&mut self, e: RecutError) -> RecutResult<T> {
        self.state = SupervisorState::Aborted;
        Err(e)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/recovery/supervisor.rs"]
mod tests;
