//! # Hostweave
//!
//! A hosting runtime for long-running Rust applications: contract-based
//! service registration with override resolution, dependency-ordered
//! features, lifecycle behaviors and a graceful shutdown awaiter.
//!
//! ## Features
//!
//! - **Override Resolution**: Pick one winner per contract by override and
//!   processing priority, or keep an ordered collection
//! - **Activation Container**: Singleton, per-scope and named-scope lifetimes
//!   behind `Arc<dyn Trait>`
//! - **Feature Ordering**: Dependencies first, priority as a tie-break, true
//!   cycles reported instead of truncated
//! - **Lifecycle Behaviors**: Interceptors around application or per-feature
//!   initialization and finalization
//! - **Shutdown Awaiter**: OS signals and application requests race to end the
//!   run exactly once
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hostweave::prelude::*;
//!
//! pub trait Greeter: Send + Sync {
//!     fn greet(&self) -> String;
//! }
//!
//! pub struct English;
//!
//! impl Greeter for English {
//!     fn greet(&self) -> String {
//!         "hello".to_string()
//!     }
//! }
//!
//! struct Welcome;
//!
//! #[async_trait]
//! impl FeatureManager for Welcome {
//!     fn descriptor(&self) -> FeatureDescriptor {
//!         FeatureDescriptor::new("welcome", "1.0.0").required(true)
//!     }
//!
//!     async fn initialize(&self, context: &AppContext, _token: &CancellationToken) -> anyhow::Result<()> {
//!         let greeter = context.resolve::<dyn Greeter>()?;
//!         tracing::info!("{}", greeter.greet());
//!         context.shutdown_handle().request_shutdown();
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let app = Application::builder()
//!         .service(ServiceDescriptor::instance::<dyn Greeter, English>(Arc::new(English)))
//!         .feature(Arc::new(Welcome))
//!         .build();
//!
//!     match app.bootstrap(AppArgs::parse(std::env::args().skip(1)), &os_shutdown_token()).await {
//!         Ok(outcome) => tracing::info!("Stopped: {:?}", outcome.instruction()),
//!         Err(e) => tracing::error!("{}", e),
//!     }
//!     app.shutdown(&CancellationToken::new()).await;
//! }
//! ```

pub mod config;
pub mod descriptor;
pub mod di;
pub mod error;
pub mod feature;
pub mod lifecycle;
pub mod ordering;
pub mod registry;

// Re-export core types
pub use config::{AppArgs, RuntimeOptions, WaitMode};
pub use descriptor::{DescriptorProvider, Lifetime, ServiceDescriptor};
pub use di::{ActivationContainer, Container, ContainerBuilder, Injectable, Resolve};
pub use error::{Result, RuntimeError};
pub use lifecycle::{AppContext, Application, ShutdownInstruction};
pub use registry::ContractRegistry;

// Re-export commonly used types from dependencies
pub use async_trait::async_trait;
pub use tokio_util::sync::CancellationToken;

/// Prelude module for convenient imports
///
/// ```
/// use hostweave::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::{AppArgs, RuntimeOptions, WaitMode};
    pub use crate::descriptor::{DescriptorProvider, Lifetime, ServiceDescriptor};
    pub use crate::di::{ActivationContainer, Container, ContainerBuilder, Injectable, Resolve};
    pub use crate::error::{Result, RuntimeError};
    pub use crate::feature::{FeatureDescriptor, FeatureManager, FeatureRef};
    pub use crate::lifecycle::{
        AppContext, AppResult, Application, ApplicationBuilder, BehaviorScope, BootstrapError,
        BootstrapOutcome, HookResult, LifecycleBehavior, LifecycleError, OperationResult,
        RuntimeState, ShutdownHandle, ShutdownInstruction, os_shutdown_token,
    };
    pub use async_trait::async_trait;
    pub use std::sync::Arc;
    pub use tokio_util::sync::CancellationToken;
}
