use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        RecutError::segmentation("x")
            .to_string()
            .contains("segmentation error:")
    );
    assert!(RecutError::policy("x").to_string().contains("policy error:"));
    assert!(
        RecutError::stage("x")
            .to_string()
            .contains("stage execution error:")
    );
    assert!(
        RecutError::exhausted("x")
            .to_string()
            .contains("resources exhausted:")
    );
    assert_eq!(RecutError::Cancelled.to_string(), "cancelled");
}

#[test]
fn only_stage_errors_are_retryable() {
    assert!(RecutError::stage("ffmpeg exited 1").is_retryable());
    assert!(!RecutError::policy("min > max").is_retryable());
    assert!(!RecutError::Cancelled.is_retryable());
    assert!(!RecutError::exhausted("disk").is_retryable());
    assert!(!RecutError::preempted("cpu").is_retryable());
}

#[test]
fn processing_failure_carries_last_cause() {
    let err = RecutError::ProcessingFailure {
        stage: "final_render".to_string(),
        attempts: 12,
        cause: Box::new(RecutError::stage("encoder crashed")),
    };
    let msg = err.to_string();
    assert!(msg.contains("final_render"));
    assert!(msg.contains("12 attempts"));
    assert!(msg.contains("encoder crashed"));
    assert!(err.is_fatal());
    assert!(std::error::Error::source(&err).is_some());
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = RecutError::from(base);
    assert!(err.to_string().contains("boom"));
}
