//! Lifecycle Module
//!
//! Drives one bootstrap cycle: features are initialized in dependency order,
//! the application runs until a shutdown condition, and features are then
//! finalized in reverse.
//!
//! # Lifecycle Phases
//!
//! ```text
//! Created
//!    ↓
//! Configuring            resolve contracts, order features, build container
//!    ↓
//! InitializingFeatures   app BeforeInitialize
//!    ↓                   per feature: BeforeInitialize → initialize → AfterInitialize
//!    ↓                   app AfterInitialize
//! Running                ShutdownAwaiter: external token | ShutdownHandle
//!    ↓                   (Ignore returns to the caller here)
//! FinalizingFeatures     app BeforeFinalize
//!    ↓                   per feature, reverse: BeforeFinalize → finalize → AfterFinalize
//!    ↓                   app AfterFinalize, container dispose, cleanup hooks
//! Terminated
//!
//! Any failure while configuring or initializing → forced finalize → Faulted
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use hostweave::lifecycle::{AppContext, HookResult, LifecycleBehavior};
//! use async_trait::async_trait;
//! use tokio_util::sync::CancellationToken;
//!
//! struct StartupBanner;
//!
//! #[async_trait]
//! impl LifecycleBehavior for StartupBanner {
//!     fn name(&self) -> &str {
//!         "startup-banner"
//!     }
//!
//!     async fn after_initialize(&self, context: &AppContext, _token: &CancellationToken) -> HookResult {
//!         tracing::info!("{} features ready", context.features().len());
//!         Ok(())
//!     }
//! }
//! ```

mod application;
mod context;
mod error;
mod manager;
mod shutdown;
mod state;
mod traits;

pub use application::{
    Application, ApplicationBuilder, BootstrapError, BootstrapOutcome, ContainerFactory,
};
pub use context::{AppContext, AppResult, AppRuntime};
pub use error::{HookResult, LifecycleError};
pub use manager::BehaviorSet;
pub use shutdown::{
    AttendedWait, ConsoleAttendant, OperationResult, ShutdownAwaiter, ShutdownCause,
    ShutdownHandle, ShutdownInstruction, os_shutdown_token, shutdown_signal,
};
pub use state::RuntimeState;
pub(crate) use state::StateCell;
pub use traits::{BehaviorScope, HookPhase, LifecycleBehavior};
