//! Application Bootstrap
//!
//! [`Application`] is the composition root: it resolves the service
//! registry, orders the features, drives initialization, waits for the
//! shutdown trigger and runs finalization.

use super::{
    AppContext, AppResult, AttendedWait, BehaviorSet, ConsoleAttendant, HookPhase,
    LifecycleBehavior, LifecycleError, OperationResult, RuntimeState, ShutdownAwaiter,
    ShutdownHandle, ShutdownInstruction, StateCell,
};
use crate::config::{AppArgs, RuntimeOptions, WaitMode};
use crate::descriptor::{DescriptorProvider, ServiceDescriptor};
use crate::di::{ActivationContainer, Container};
use crate::error::{Result, RuntimeError};
use crate::feature::{FeatureEntry, FeatureManager, FeatureRegistry};
use crate::registry::ContractRegistry;
use futures::FutureExt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;

/// Builds the activation container from the resolved registry.
pub type ContainerFactory =
    Box<dyn Fn(Arc<ContractRegistry>) -> Result<Arc<dyn ActivationContainer>> + Send + Sync>;

type CleanupHook = Box<dyn FnOnce() -> anyhow::Result<()> + Send>;

/// Bootstrap failed; carries the partially built context when there is one
#[derive(Debug, Error)]
#[error("Bootstrap failed: {error}")]
pub struct BootstrapError {
    #[source]
    pub error: Arc<RuntimeError>,
    pub context: Option<AppContext>,
}

/// How a successful bootstrap call ended
#[derive(Debug)]
pub enum BootstrapOutcome {
    /// An earlier call already configured this application; nothing ran.
    AlreadyConfigured,
    Completed {
        context: AppContext,
        result: OperationResult,
        instruction: ShutdownInstruction,
    },
}

impl BootstrapOutcome {
    pub fn context(&self) -> Option<&AppContext> {
        match self {
            BootstrapOutcome::AlreadyConfigured => None,
            BootstrapOutcome::Completed { context, .. } => Some(context),
        }
    }

    pub fn instruction(&self) -> ShutdownInstruction {
        match self {
            BootstrapOutcome::AlreadyConfigured => ShutdownInstruction::Ignore,
            BootstrapOutcome::Completed { instruction, .. } => *instruction,
        }
    }
}

struct Session {
    context: AppContext,
    options: RuntimeOptions,
    features: FeatureRegistry,
    initialized: Vec<FeatureEntry>,
}

/// Application orchestrator
///
/// # Example
///
/// ```rust,ignore
/// use hostweave::lifecycle::{os_shutdown_token, Application};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let app = Application::builder()
///         .provider(&services())
///         .feature(Arc::new(Storage))
///         .feature(Arc::new(Migrations))
///         .build();
///
///     let outcome = app
///         .bootstrap(AppArgs::parse(std::env::args().skip(1)), &os_shutdown_token())
///         .await?;
///
///     app.shutdown(&CancellationToken::new()).await;
///     Ok(())
/// }
/// ```
pub struct Application {
    descriptors: Mutex<Vec<ServiceDescriptor>>,
    features: Vec<Arc<dyn FeatureManager>>,
    behaviors: BehaviorSet,
    options: RuntimeOptions,
    attendant: Option<Arc<dyn AttendedWait>>,
    container_factory: ContainerFactory,
    cleanup: Mutex<Vec<CleanupHook>>,
    configured: AtomicBool,
    state: StateCell,
    shutdown: ShutdownHandle,
    session: AsyncMutex<Option<Session>>,
    /// Held by the bootstrap call from configuration until it returns.
    in_flight: AsyncMutex<()>,
}

impl Application {
    pub fn builder() -> ApplicationBuilder {
        ApplicationBuilder::new()
    }

    pub fn state(&self) -> RuntimeState {
        self.state.get()
    }

    /// The internal shutdown signal, also reachable through [`AppContext::shutdown_handle`].
    pub fn shutdown_handle(&self) -> &ShutdownHandle {
        &self.shutdown
    }

    /// Configure, initialize and run until a shutdown condition
    ///
    /// Only the first call does any work; later calls return
    /// [`BootstrapOutcome::AlreadyConfigured`]. On `Shutdown` the features are
    /// finalized before returning; on `Ignore` they stay initialized until
    /// [`shutdown`](Self::shutdown).
    ///
    /// # Errors
    ///
    /// Any failure is recorded on the context, logged as fatal and followed
    /// by a forced finalization before it is returned.
    pub async fn bootstrap(
        &self,
        args: AppArgs,
        token: &CancellationToken,
    ) -> std::result::Result<BootstrapOutcome, BootstrapError> {
        if self.configured.swap(true, Ordering::AcqRel) {
            tracing::info!("Application already configured; skipping bootstrap");
            return Ok(BootstrapOutcome::AlreadyConfigured);
        }
        let _in_flight = self.in_flight.lock().await;

        tracing::info!("Bootstrapping application...");
        self.state.set(RuntimeState::Configuring);

        let session = match self.configure(args) {
            Ok(session) => session,
            Err(e) => {
                let error = Arc::new(e);
                tracing::error!(fatal = true, "Configuration failed: {}", error);
                self.run_cleanup_hooks();
                self.state.set(RuntimeState::Faulted);
                return Err(BootstrapError {
                    error,
                    context: None,
                });
            }
        };
        let context = session.context.clone();
        let options = session.options.clone();
        let features = session.features.clone();
        *self.session.lock().await = Some(session);

        match self.run(&context, &options, &features, token).await {
            Ok((result, ShutdownInstruction::Ignore)) => {
                tracing::info!("Shutdown instruction ignored; application keeps running");
                Ok(BootstrapOutcome::Completed {
                    context,
                    result,
                    instruction: ShutdownInstruction::Ignore,
                })
            }
            Ok((result, ShutdownInstruction::Shutdown)) => {
                self.finalize(&CancellationToken::new()).await;
                Ok(BootstrapOutcome::Completed {
                    context,
                    result,
                    instruction: ShutdownInstruction::Shutdown,
                })
            }
            Err(e) => {
                let error = Arc::new(e);
                context.record_exception(Arc::clone(&error));
                if context.result().is_success() {
                    context.set_result(AppResult::failure(1, error.to_string()));
                }
                tracing::error!(fatal = true, "Bootstrap failed: {}", error);

                self.state.set(RuntimeState::Faulted);
                self.finalize(&CancellationToken::new()).await;
                Err(BootstrapError {
                    error,
                    context: Some(context),
                })
            }
        }
    }

    /// Finalize whatever is still initialized and release the container
    ///
    /// Idempotent and infallible: failures are logged, and a call after a
    /// completed or faulted bootstrap only runs outstanding cleanup.
    ///
    /// While a bootstrap is in flight this only requests the shutdown and
    /// waits for that bootstrap to finalize, so it must not be awaited from
    /// inside a feature or behavior; use [`ShutdownHandle::request_shutdown`]
    /// there. If `token` fires first the wait is abandoned.
    pub async fn shutdown(&self, token: &CancellationToken) {
        self.shutdown.request_shutdown();

        let _in_flight = tokio::select! {
            guard = self.in_flight.lock() => guard,
            _ = token.cancelled() => {
                tracing::warn!("Shutdown wait canceled while bootstrap is still running");
                return;
            }
        };
        self.finalize(token).await;
    }

    fn configure(&self, args: AppArgs) -> Result<Session> {
        let options = self.options.clone().apply_args(&args)?;

        let descriptors = std::mem::take(
            &mut *self.descriptors.lock().unwrap_or_else(PoisonError::into_inner),
        );
        let registry = Arc::new(ContractRegistry::resolve(descriptors)?);
        let features = FeatureRegistry::new(self.features.clone())?;
        let services = (self.container_factory)(registry)?;

        let context = AppContext::new(
            args,
            services,
            self.shutdown.clone(),
            features.descriptors(),
        );
        tracing::debug!("Created application context {}", context.id());

        Ok(Session {
            context,
            options,
            features,
            initialized: Vec::new(),
        })
    }

    async fn run(
        &self,
        context: &AppContext,
        options: &RuntimeOptions,
        features: &FeatureRegistry,
        token: &CancellationToken,
    ) -> Result<(OperationResult, ShutdownInstruction)> {
        self.state.set(RuntimeState::InitializingFeatures);
        self.initialize(context, options, features, token).await?;

        self.state.set(RuntimeState::Running);
        tracing::info!("Application running ({} wait)", options.wait_mode);

        let attendant = match options.wait_mode {
            WaitMode::Attended => Some(self.attendant.clone().unwrap_or_else(|| {
                Arc::new(ConsoleAttendant::new(options.quit_command.clone()))
                    as Arc<dyn AttendedWait>
            })),
            WaitMode::Unattended => None,
        };
        let awaiter = ShutdownAwaiter::new(self.shutdown.clone(), options.wait_mode, attendant);
        Ok(awaiter.wait_for_shutdown(token).await)
    }

    async fn initialize(
        &self,
        context: &AppContext,
        options: &RuntimeOptions,
        features: &FeatureRegistry,
        token: &CancellationToken,
    ) -> Result<()> {
        checkpoint(token, "initialize")?;
        tracing::info!("Initializing {} features...", features.len());

        self.behaviors
            .run_forward(HookPhase::BeforeInitialize, None, context, token)
            .await?;

        let mut count = 0;
        for entry in features.iter() {
            checkpoint(token, "initialize")?;

            let descriptor = entry.descriptor();
            tracing::debug!("Initializing feature {}", descriptor.name);

            if let Err(e) = self.initialize_feature(entry, context, options, token).await {
                checkpoint(token, "initialize")?;

                if descriptor.is_required {
                    tracing::error!("Required feature {} failed to initialize: {:#}", descriptor.name, e);
                    return Err(RuntimeError::RequiredFeatureFailed {
                        feature: descriptor.name.to_string(),
                        phase: "initialize".to_string(),
                        source: e,
                    });
                }

                tracing::warn!(
                    "Optional feature {} failed to initialize and was removed: {:#}",
                    descriptor.name,
                    e
                );
                context.runtime().remove(&descriptor.name);
                continue;
            }
            count += 1;
        }

        self.behaviors
            .run_forward(HookPhase::AfterInitialize, None, context, token)
            .await?;

        tracing::info!("Initialization complete ({} of {} features)", count, features.len());
        Ok(())
    }

    async fn initialize_feature(
        &self,
        entry: &FeatureEntry,
        context: &AppContext,
        options: &RuntimeOptions,
        token: &CancellationToken,
    ) -> anyhow::Result<()> {
        let descriptor = entry.descriptor();
        self.behaviors
            .run_forward(HookPhase::BeforeInitialize, Some(descriptor), context, token)
            .await?;

        supervise(
            options,
            "initialize",
            entry,
            entry.manager().initialize(context, token),
        )
        .await?;
        self.track(entry.clone()).await;

        self.behaviors
            .run_forward(HookPhase::AfterInitialize, Some(descriptor), context, token)
            .await?;
        Ok(())
    }

    async fn track(&self, entry: FeatureEntry) {
        if let Some(session) = self.session.lock().await.as_mut() {
            session.initialized.push(entry);
        }
    }

    async fn finalize(&self, token: &CancellationToken) {
        let mut guard = self.session.lock().await;
        let Some(session) = guard.take() else {
            self.run_cleanup_hooks();
            if !self.state.get().is_final() {
                self.state.set(RuntimeState::Terminated);
            }
            return;
        };

        // A faulted bootstrap finalizes without leaving `Faulted`.
        if self.state.get() != RuntimeState::Faulted {
            self.state.set(RuntimeState::FinalizingFeatures);
        }
        let context = &session.context;
        tracing::info!("Finalizing {} features...", session.initialized.len());

        if let Err(e) = self.finalize_features(&session, token).await {
            tracing::error!(fatal = true, "Finalization failed: {}", e);
            context.record_exception(Arc::new(e));
        }

        self.dispose_services(context);
        self.run_cleanup_hooks();

        if context.exception().is_some() {
            self.state.set(RuntimeState::Faulted);
        } else {
            self.state.set(RuntimeState::Terminated);
        }
        tracing::info!("Application shutdown complete");
        drop(guard);
    }

    /// Reverse order; a failing required feature is reported once the rest
    /// have had their chance to finalize.
    async fn finalize_features(&self, session: &Session, token: &CancellationToken) -> Result<()> {
        let context = &session.context;
        self.behaviors
            .run_reverse(HookPhase::BeforeFinalize, None, context, token)
            .await?;

        let mut first_failure = None;
        for entry in session.initialized.iter().rev() {
            checkpoint(token, "finalize")?;

            let descriptor = entry.descriptor();
            tracing::debug!("Finalizing feature {}", descriptor.name);

            if let Err(e) = self.finalize_feature(entry, context, &session.options, token).await {
                if descriptor.is_required {
                    tracing::error!(
                        fatal = true,
                        "Required feature {} failed to finalize: {:#}",
                        descriptor.name,
                        e
                    );
                    first_failure.get_or_insert(RuntimeError::RequiredFeatureFailed {
                        feature: descriptor.name.to_string(),
                        phase: "finalize".to_string(),
                        source: e,
                    });
                } else {
                    tracing::warn!("Optional feature {} failed to finalize: {:#}", descriptor.name, e);
                }
            }
        }

        self.behaviors
            .run_reverse(HookPhase::AfterFinalize, None, context, token)
            .await?;

        match first_failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn finalize_feature(
        &self,
        entry: &FeatureEntry,
        context: &AppContext,
        options: &RuntimeOptions,
        token: &CancellationToken,
    ) -> anyhow::Result<()> {
        let descriptor = entry.descriptor();
        self.behaviors
            .run_reverse(HookPhase::BeforeFinalize, Some(descriptor), context, token)
            .await?;

        let outcome = supervise(
            options,
            "finalize",
            entry,
            entry.manager().finalize(context, token),
        )
        .await;

        self.behaviors
            .run_reverse(HookPhase::AfterFinalize, Some(descriptor), context, token)
            .await?;
        outcome
    }

    fn dispose_services(&self, context: &AppContext) {
        let services = Arc::clone(context.services());
        match panic::catch_unwind(AssertUnwindSafe(|| services.dispose())) {
            Ok(Ok(())) => tracing::debug!("Service container disposed"),
            Ok(Err(e)) => tracing::error!("Service container disposal failed: {:#}", e),
            Err(_) => tracing::error!("Service container disposal panicked"),
        }
    }

    fn run_cleanup_hooks(&self) {
        let hooks = std::mem::take(&mut *self.cleanup.lock().unwrap_or_else(PoisonError::into_inner));
        if hooks.is_empty() {
            return;
        }

        let total = hooks.len();
        let mut failures = 0;
        for hook in hooks.into_iter().rev() {
            match panic::catch_unwind(AssertUnwindSafe(hook)) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::error!("Cleanup hook failed: {:#}", e);
                    failures += 1;
                }
                Err(_) => {
                    tracing::error!("Cleanup hook panicked");
                    failures += 1;
                }
            }
        }
        tracing::debug!("Cleanup complete ({} hooks executed, {} failed)", total, failures);
    }
}

fn default_container(registry: Arc<ContractRegistry>) -> Result<Arc<dyn ActivationContainer>> {
    Ok(Arc::new(Container::new(registry)))
}

fn checkpoint(token: &CancellationToken, phase: &str) -> Result<()> {
    if token.is_cancelled() {
        return Err(RuntimeError::Cancelled {
            phase: phase.to_string(),
        });
    }
    Ok(())
}

/// Run one feature step under the configured time limit; a panic counts
/// as a failure of that step.
async fn supervise<F>(
    options: &RuntimeOptions,
    phase: &str,
    entry: &FeatureEntry,
    operation: F,
) -> anyhow::Result<()>
where
    F: Future<Output = anyhow::Result<()>>,
{
    let guarded = AssertUnwindSafe(operation).catch_unwind().map(|caught| match caught {
        Ok(outcome) => outcome,
        Err(_) => Err(LifecycleError::panicked(phase, format!("feature {}", entry.name())).into()),
    });

    let Some(limit) = options.feature_timeout() else {
        return guarded.await;
    };

    match tokio::time::timeout(limit, guarded).await {
        Ok(outcome) => outcome,
        Err(_) => Err(LifecycleError::timeout(phase, format!("feature {}", entry.name()), limit).into()),
    }
}

/// Builder for [`Application`]
pub struct ApplicationBuilder {
    descriptors: Vec<ServiceDescriptor>,
    features: Vec<Arc<dyn FeatureManager>>,
    behaviors: Vec<Arc<dyn LifecycleBehavior>>,
    options: RuntimeOptions,
    attendant: Option<Arc<dyn AttendedWait>>,
    container_factory: Option<ContainerFactory>,
    cleanup: Vec<CleanupHook>,
}

impl Default for ApplicationBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ApplicationBuilder {
    pub fn new() -> Self {
        Self {
            descriptors: Vec::new(),
            features: Vec::new(),
            behaviors: Vec::new(),
            options: RuntimeOptions::default(),
            attendant: None,
            container_factory: None,
            cleanup: Vec::new(),
        }
    }

    /// Add every descriptor the provider supplies.
    pub fn provider(mut self, provider: &dyn DescriptorProvider) -> Self {
        self.descriptors.extend(provider.descriptors());
        self
    }

    pub fn service(mut self, descriptor: ServiceDescriptor) -> Self {
        self.descriptors.push(descriptor);
        self
    }

    pub fn feature(mut self, manager: Arc<dyn FeatureManager>) -> Self {
        self.features.push(manager);
        self
    }

    pub fn behavior(mut self, behavior: Arc<dyn LifecycleBehavior>) -> Self {
        self.behaviors.push(behavior);
        self
    }

    /// Base options; `bootstrap` arguments are layered on top.
    pub fn options(mut self, options: RuntimeOptions) -> Self {
        self.options = options;
        self
    }

    /// Interactive wait used in attended mode instead of the console.
    pub fn attendant(mut self, attendant: Arc<dyn AttendedWait>) -> Self {
        self.attendant = Some(attendant);
        self
    }

    /// Replace the default [`Container`].
    pub fn container_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(Arc<ContractRegistry>) -> Result<Arc<dyn ActivationContainer>> + Send + Sync + 'static,
    {
        self.container_factory = Some(Box::new(factory));
        self
    }

    /// Run after finalization and container disposal, in reverse registration order.
    pub fn on_cleanup<F>(mut self, hook: F) -> Self
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        self.cleanup.push(Box::new(hook));
        self
    }

    pub fn build(self) -> Application {
        tracing::debug!(
            "Building application ({} descriptors, {} features, {} behaviors)",
            self.descriptors.len(),
            self.features.len(),
            self.behaviors.len()
        );

        Application {
            descriptors: Mutex::new(self.descriptors),
            features: self.features,
            behaviors: BehaviorSet::new(self.behaviors),
            options: self.options,
            attendant: self.attendant,
            container_factory: self
                .container_factory
                .unwrap_or_else(|| Box::new(default_container)),
            cleanup: Mutex::new(self.cleanup),
            configured: AtomicBool::new(false),
            state: StateCell::new(),
            shutdown: ShutdownHandle::new(),
            session: AsyncMutex::new(None),
            in_flight: AsyncMutex::new(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn test_shutdown_before_bootstrap_runs_cleanup_once() {
        let ran = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ran);
        let app = Application::builder()
            .on_cleanup(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .build();
        assert_eq!(app.state(), RuntimeState::Created);

        app.shutdown(&CancellationToken::new()).await;
        app.shutdown(&CancellationToken::new()).await;

        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert_eq!(app.state(), RuntimeState::Terminated);
    }

    #[tokio::test]
    async fn test_container_factory_failure_has_no_context() {
        let app = Application::builder()
            .container_factory(|_| Err(RuntimeError::Configuration("no backing store".into())))
            .build();

        let err = app
            .bootstrap(AppArgs::default(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(err.context.is_none());
        assert!(matches!(err.error.as_ref(), RuntimeError::Configuration(_)));
        assert_eq!(app.state(), RuntimeState::Faulted);
    }

    #[tokio::test]
    async fn test_invalid_argument_overlay_fails_configuration() {
        let app = Application::builder().build();

        let err = app
            .bootstrap(
                AppArgs::parse(["--wait-mode=sometimes"]),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(err.to_string().contains("unknown wait mode"));
    }

    #[tokio::test]
    async fn test_cancelled_token_aborts_initialization() {
        let app = Application::builder().build();
        let token = CancellationToken::new();
        token.cancel();

        let err = app.bootstrap(AppArgs::default(), &token).await.unwrap_err();

        assert!(matches!(err.error.as_ref(), RuntimeError::Cancelled { .. }));
        assert!(err.context.is_some());
        assert_eq!(app.state(), RuntimeState::Faulted);
    }
}
