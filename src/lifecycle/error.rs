use std::time::Duration;
use thiserror::Error;

/// Why a lifecycle hook or feature step did not succeed
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Finalization failed: {0}")]
    FinalizationFailed(String),

    /// A feature step ran past the configured limit.
    #[error("{target} exceeded {}ms during {phase}", .limit.as_millis())]
    Timeout {
        phase: String,
        target: String,
        limit: Duration,
    },

    /// A feature step or hook unwound instead of returning.
    #[error("{target} panicked during {phase}")]
    Panicked { phase: String, target: String },

    #[error("Hook {target} failed: {message}")]
    HookFailed { target: String, message: String },

    /// Application error surfaced from inside a hook.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LifecycleError {
    pub fn init_failed(msg: impl Into<String>) -> Self {
        Self::InitializationFailed(msg.into())
    }

    pub fn finalize_failed(msg: impl Into<String>) -> Self {
        Self::FinalizationFailed(msg.into())
    }

    pub fn timeout(phase: impl Into<String>, target: impl Into<String>, limit: Duration) -> Self {
        Self::Timeout {
            phase: phase.into(),
            target: target.into(),
            limit,
        }
    }

    pub fn panicked(phase: impl Into<String>, target: impl Into<String>) -> Self {
        Self::Panicked {
            phase: phase.into(),
            target: target.into(),
        }
    }

    pub fn hook_failed(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::HookFailed {
            target: target.into(),
            message: message.into(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Pass/fail outcome of a lifecycle hook
pub type HookResult = std::result::Result<(), LifecycleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message() {
        let err = LifecycleError::timeout("initialize", "cache", Duration::from_millis(250));
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "cache exceeded 250ms during initialize");
    }

    #[test]
    fn test_panicked_message() {
        let err = LifecycleError::panicked("finalize", "feature cache");
        assert!(!err.is_timeout());
        assert_eq!(err.to_string(), "feature cache panicked during finalize");
    }

    #[test]
    fn test_application_errors_convert_with_question_mark() {
        fn hook() -> HookResult {
            let write: anyhow::Result<()> = Err(anyhow::anyhow!("disk full"));
            write?;
            Ok(())
        }

        let err = hook().unwrap_err();
        assert!(!err.is_timeout());
        assert_eq!(err.to_string(), "disk full");
    }
}
