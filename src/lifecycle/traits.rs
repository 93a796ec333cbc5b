//! Lifecycle behavior traits
//!
//! A behavior is a stateless interceptor around initialization and
//! finalization, bound either to the whole application or to one feature.

use super::{AppContext, HookResult};
use crate::feature::{FeatureDescriptor, FeatureRef};
use async_trait::async_trait;
use std::fmt;
use strum_macros::Display;
use tokio_util::sync::CancellationToken;

/// Where a behavior applies
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BehaviorScope {
    /// Runs once around the whole initialization / finalization phase.
    Application,
    /// Runs around one feature's initialize / finalize.
    Feature(FeatureRef),
}

impl BehaviorScope {
    pub fn applies_to(&self, feature: &FeatureDescriptor) -> bool {
        match self {
            BehaviorScope::Application => false,
            BehaviorScope::Feature(target) => target.matches(feature),
        }
    }
}

impl fmt::Display for BehaviorScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BehaviorScope::Application => f.write_str("application"),
            BehaviorScope::Feature(target) => write!(f, "feature {target}"),
        }
    }
}

/// The four interception points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum HookPhase {
    BeforeInitialize,
    AfterInitialize,
    BeforeFinalize,
    AfterFinalize,
}

/// Interceptor invoked around initialization and finalization
///
/// Every hook defaults to a no-op, so implement only the ones you need.
///
/// # Example
///
/// ```rust,ignore
/// use hostweave::lifecycle::{AppContext, HookResult, LifecycleBehavior, LifecycleError};
/// use async_trait::async_trait;
///
/// struct RequireConfig;
///
/// #[async_trait]
/// impl LifecycleBehavior for RequireConfig {
///     fn name(&self) -> &str {
///         "require-config"
///     }
///
///     async fn before_initialize(&self, context: &AppContext, _token: &CancellationToken) -> HookResult {
///         if context.args().contains("config") {
///             Ok(())
///         } else {
///             Err(LifecycleError::init_failed("--config is required"))
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait LifecycleBehavior: Send + Sync {
    fn name(&self) -> &str;

    fn scope(&self) -> BehaviorScope {
        BehaviorScope::Application
    }

    /// Lower runs first during initialization and last during finalization.
    fn priority(&self) -> i32 {
        0
    }

    async fn before_initialize(&self, _context: &AppContext, _token: &CancellationToken) -> HookResult {
        Ok(())
    }

    async fn after_initialize(&self, _context: &AppContext, _token: &CancellationToken) -> HookResult {
        Ok(())
    }

    async fn before_finalize(&self, _context: &AppContext, _token: &CancellationToken) -> HookResult {
        Ok(())
    }

    async fn after_finalize(&self, _context: &AppContext, _token: &CancellationToken) -> HookResult {
        Ok(())
    }
}
