use serde::Serialize;
use std::sync::{Mutex, PoisonError};
use strum_macros::Display;

/// Phase of one bootstrap cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "kebab-case")]
pub enum RuntimeState {
    Created,
    Configuring,
    InitializingFeatures,
    Running,
    FinalizingFeatures,
    Terminated,
    Faulted,
}

impl RuntimeState {
    /// No further lifecycle work happens from this state.
    pub fn is_final(self) -> bool {
        matches!(self, RuntimeState::Terminated | RuntimeState::Faulted)
    }
}

#[derive(Debug)]
pub(crate) struct StateCell {
    state: Mutex<RuntimeState>,
}

impl StateCell {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(RuntimeState::Created),
        }
    }

    pub(crate) fn get(&self) -> RuntimeState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set(&self, next: RuntimeState) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state != next {
            tracing::debug!("Runtime state {} -> {}", *state, next);
            *state = next;
        }
    }
}
