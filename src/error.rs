use thiserror::Error;

use crate::lifecycle::LifecycleError;

pub type Result<T> = std::result::Result<T, RuntimeError>;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Dependency not found: {contract}")]
    DependencyNotFound { contract: String },

    #[error("Failed to downcast type: {type_name}")]
    DowncastFailed { type_name: String },

    #[error("Circular dependency detected: {cycle}")]
    CircularDependency { cycle: String },

    #[error("Scope mismatch: {message}")]
    ScopeMismatch { message: String },

    #[error("Activation of {contract} failed")]
    ActivationFailed {
        contract: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Container has been disposed")]
    ContainerDisposed,

    #[error(
        "Ambiguous resolution for {contract}: {first} and {second} share override priority {override_priority} and processing priority {processing_priority}"
    )]
    AmbiguousResolution {
        contract: String,
        first: String,
        second: String,
        override_priority: i32,
        processing_priority: i32,
    },

    #[error("{implementation} is declared as overriding itself for {contract}")]
    SelfOverride {
        contract: String,
        implementation: String,
    },

    #[error("Contract {contract} has more than one definition")]
    DuplicateContractDefinition { contract: String },

    #[error("Feature dependency cycle detected: {cycle}")]
    DependencyCycle { cycle: String },

    #[error("Feature {name} is registered more than once")]
    DuplicateFeature { name: String },

    #[error("Required feature {feature} failed during {phase}")]
    RequiredFeatureFailed {
        feature: String,
        phase: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Behavior {behavior} failed during {phase}")]
    BehaviorFailed {
        behavior: String,
        phase: String,
        #[source]
        source: LifecycleError,
    },

    #[error("Operation cancelled during {phase}")]
    Cancelled { phase: String },

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RuntimeError {
    /// Errors raised before any feature runs: the registry or ordering is unusable.
    pub fn is_resolution_error(&self) -> bool {
        matches!(
            self,
            RuntimeError::AmbiguousResolution { .. }
                | RuntimeError::SelfOverride { .. }
                | RuntimeError::DuplicateContractDefinition { .. }
                | RuntimeError::DependencyCycle { .. }
                | RuntimeError::DuplicateFeature { .. }
        )
    }
}

impl From<serde_json::Error> for RuntimeError {
    fn from(err: serde_json::Error) -> Self {
        RuntimeError::Configuration(err.to_string())
    }
}
