//! Features
//!
//! A feature is a named, versioned unit of initialization and finalization
//! logic. Its [`FeatureManager`] does the work; its [`FeatureDescriptor`]
//! tells the runtime when to call it and what a failure means.
//!
//! # Example
//!
//! ```rust,ignore
//! use hostweave::feature::{FeatureDescriptor, FeatureManager};
//! use hostweave::lifecycle::AppContext;
//! use tokio_util::sync::CancellationToken;
//!
//! struct Migrations;
//!
//! #[async_trait::async_trait]
//! impl FeatureManager for Migrations {
//!     fn descriptor(&self) -> FeatureDescriptor {
//!         FeatureDescriptor::new("migrations", "1.0.0")
//!             .required(true)
//!             .depends_on("storage")
//!     }
//!
//!     async fn initialize(&self, context: &AppContext, _token: &CancellationToken) -> anyhow::Result<()> {
//!         let db = context.resolve::<dyn Database>()?;
//!         db.migrate().await
//!     }
//! }
//! ```

mod descriptor;
mod registry;

pub use descriptor::{FeatureDescriptor, FeatureName, FeatureRef};
pub use registry::{FeatureEntry, FeatureRegistry, order_features};

use crate::lifecycle::AppContext;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Initialization and finalization logic of one feature.
#[async_trait]
pub trait FeatureManager: Send + Sync {
    fn descriptor(&self) -> FeatureDescriptor;

    async fn initialize(&self, context: &AppContext, token: &CancellationToken)
    -> anyhow::Result<()>;

    /// Runs during shutdown, in reverse initialization order.
    async fn finalize(&self, _context: &AppContext, _token: &CancellationToken) -> anyhow::Result<()> {
        Ok(())
    }
}
