//! Application context
//!
//! The carrier threaded through every lifecycle call. It is a cheap,
//! cloneable handle: the orchestrator, features and behaviors all see the
//! same state.

use super::ShutdownHandle;
use crate::config::AppArgs;
use crate::di::ActivationContainer;
use crate::error::{Result, RuntimeError};
use crate::feature::{FeatureDescriptor, FeatureName};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use uuid::Uuid;

/// Final outcome the application reports to its host process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppResult {
    pub exit_code: i32,
    pub message: Option<String>,
}

impl AppResult {
    pub fn success() -> Self {
        Self::default()
    }

    pub fn failure(exit_code: i32, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

/// The features currently published as active.
///
/// Starts as the full ordered feature list; optional features that fail to
/// initialize are removed.
#[derive(Debug, Default)]
pub struct AppRuntime {
    features: RwLock<Vec<FeatureDescriptor>>,
}

impl AppRuntime {
    pub(crate) fn new(features: Vec<FeatureDescriptor>) -> Self {
        Self {
            features: RwLock::new(features),
        }
    }

    pub fn features(&self) -> Vec<FeatureDescriptor> {
        self.features
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn contains(&self, name: &FeatureName) -> bool {
        self.features
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|f| f.name == *name)
    }

    pub(crate) fn remove(&self, name: &FeatureName) -> bool {
        let mut features = self.features.write().unwrap_or_else(PoisonError::into_inner);
        let before = features.len();
        features.retain(|f| f.name != *name);
        features.len() != before
    }
}

struct ContextInner {
    id: Uuid,
    started_at: DateTime<Utc>,
    args: AppArgs,
    services: Arc<dyn ActivationContainer>,
    shutdown: ShutdownHandle,
    runtime: AppRuntime,
    exception: RwLock<Option<Arc<RuntimeError>>>,
    result: RwLock<AppResult>,
    extensions: DashMap<String, Arc<dyn Any + Send + Sync>>,
}

/// Shared state of one bootstrap cycle.
#[derive(Clone)]
pub struct AppContext {
    inner: Arc<ContextInner>,
}

impl AppContext {
    pub fn new(
        args: AppArgs,
        services: Arc<dyn ActivationContainer>,
        shutdown: ShutdownHandle,
        features: Vec<FeatureDescriptor>,
    ) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                id: Uuid::new_v4(),
                started_at: Utc::now(),
                args,
                services,
                shutdown,
                runtime: AppRuntime::new(features),
                exception: RwLock::new(None),
                result: RwLock::new(AppResult::default()),
                extensions: DashMap::new(),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.inner.started_at
    }

    pub fn args(&self) -> &AppArgs {
        &self.inner.args
    }

    /// The service locator.
    pub fn services(&self) -> &Arc<dyn ActivationContainer> {
        &self.inner.services
    }

    pub fn resolve<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        self.inner.services.as_resolve().get::<T>()
    }

    pub fn resolve_all<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Vec<Arc<T>>> {
        self.inner.services.as_resolve().get_all::<T>()
    }

    /// Handle application code uses to ask the runtime to stop or wake.
    pub fn shutdown_handle(&self) -> &ShutdownHandle {
        &self.inner.shutdown
    }

    pub fn runtime(&self) -> &AppRuntime {
        &self.inner.runtime
    }

    pub fn features(&self) -> Vec<FeatureDescriptor> {
        self.inner.runtime.features()
    }

    pub fn exception(&self) -> Option<Arc<RuntimeError>> {
        self.inner
            .exception
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_exception(&self, error: Arc<RuntimeError>) {
        *self
            .inner
            .exception
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(error);
    }

    /// Keeps the first recorded exception.
    pub(crate) fn record_exception(&self, error: Arc<RuntimeError>) {
        let mut slot = self
            .inner
            .exception
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            *slot = Some(error);
        }
    }

    pub fn result(&self) -> AppResult {
        self.inner
            .result
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_result(&self, result: AppResult) {
        *self
            .inner
            .result
            .write()
            .unwrap_or_else(PoisonError::into_inner) = result;
    }

    /// Store open-ended extension data under `key`.
    pub fn insert_extension<T: Send + Sync + 'static>(&self, key: impl Into<String>, value: T) {
        self.inner.extensions.insert(key.into(), Arc::new(value));
    }

    pub fn extension<T: Send + Sync + 'static>(&self, key: &str) -> Option<Arc<T>> {
        let value = self.inner.extensions.get(key)?;
        Arc::clone(value.value()).downcast::<T>().ok()
    }

    /// A context backed by an empty container, for exercising hooks in isolation.
    #[cfg(test)]
    pub(crate) fn detached() -> Self {
        use crate::di::Container;
        use crate::registry::ContractRegistry;

        Self::new(
            AppArgs::default(),
            Arc::new(Container::new(Arc::new(ContractRegistry::default()))),
            ShutdownHandle::new(),
            Vec::new(),
        )
    }
}

impl fmt::Debug for AppContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppContext")
            .field("id", &self.inner.id)
            .field("started_at", &self.inner.started_at)
            .field("features", &self.inner.runtime.features().len())
            .field("exception", &self.exception().map(|e| e.to_string()))
            .field("result", &self.result())
            .finish()
    }
}
