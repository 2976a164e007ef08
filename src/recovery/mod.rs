//! Degrade-and-retry supervision of individual stage invocations.

pub mod strategy;
pub mod supervisor;

pub use strategy::{DegradeProfile, DegradeStrategy};
pub use supervisor::{
    AttemptContext, AttemptOutcome, RecoveryAttempt, RecoverySupervisor, RetryPolicy,
    StageInterrupt, StepOutcome, SupervisorState,
};
