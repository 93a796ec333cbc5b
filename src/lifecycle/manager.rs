//! Behavior dispatch
//!
//! Keeps lifecycle behaviors in priority order and runs the ones that apply
//! to a given target, forward for initialization and in reverse for
//! finalization.

use super::{AppContext, BehaviorScope, HookPhase, HookResult, LifecycleBehavior, LifecycleError};
use crate::error::{Result, RuntimeError};
use crate::feature::FeatureDescriptor;
use crate::ordering::{self, Precedence};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Ordered set of lifecycle behaviors
///
/// # Example
///
/// ```rust,ignore
/// let behaviors = BehaviorSet::new(vec![Arc::new(AuditTrail), Arc::new(WarmCache)]);
///
/// behaviors
///     .run_forward(HookPhase::BeforeInitialize, None, &context, &token)
///     .await?;
/// ```
#[derive(Clone, Default)]
pub struct BehaviorSet {
    behaviors: Vec<Arc<dyn LifecycleBehavior>>,
}

impl BehaviorSet {
    /// Sort by priority; equal priorities keep registration order.
    pub fn new(behaviors: Vec<Arc<dyn LifecycleBehavior>>) -> Self {
        let behaviors = match ordering::order_indices(&behaviors, |a, b| {
            Precedence::prefer_by(a.priority(), b.priority())
        }) {
            Ok(permutation) => permutation
                .into_iter()
                .map(|i| Arc::clone(&behaviors[i]))
                .collect(),
            Err(_) => behaviors,
        };
        Self { behaviors }
    }

    /// Behaviors bound to `target`, or application-wide ones when `None`.
    pub fn select(&self, target: Option<&FeatureDescriptor>) -> Vec<Arc<dyn LifecycleBehavior>> {
        self.behaviors
            .iter()
            .filter(|b| match target {
                None => b.scope() == BehaviorScope::Application,
                Some(feature) => b.scope().applies_to(feature),
            })
            .cloned()
            .collect()
    }

    /// Execute hooks in order, stopping at the first failure
    ///
    /// Cancellation is checked before each hook.
    pub async fn run_forward(
        &self,
        phase: HookPhase,
        target: Option<&FeatureDescriptor>,
        context: &AppContext,
        token: &CancellationToken,
    ) -> Result<()> {
        let selected = self.select(target);
        if selected.is_empty() {
            return Ok(());
        }
        tracing::debug!("Calling {} hooks ({})", phase, describe(target));

        for behavior in &selected {
            if token.is_cancelled() {
                return Err(RuntimeError::Cancelled {
                    phase: phase.to_string(),
                });
            }
            invoke(behavior.as_ref(), phase, context, token)
                .await
                .map_err(|e| {
                    tracing::error!("{} failed for {}: {}", phase, behavior.name(), e);
                    RuntimeError::BehaviorFailed {
                        behavior: behavior.name().to_string(),
                        phase: phase.to_string(),
                        source: e,
                    }
                })?;
        }

        tracing::debug!("{} complete ({} hooks executed)", phase, selected.len());
        Ok(())
    }

    /// Execute hooks in **reverse order**, logging failures and continuing
    ///
    /// Returns the number of hooks that failed; only cancellation stops the run.
    pub async fn run_reverse(
        &self,
        phase: HookPhase,
        target: Option<&FeatureDescriptor>,
        context: &AppContext,
        token: &CancellationToken,
    ) -> Result<usize> {
        let selected = self.select(target);
        if selected.is_empty() {
            return Ok(0);
        }
        tracing::debug!("Calling {} hooks ({})", phase, describe(target));

        let mut failures = 0;
        for behavior in selected.iter().rev() {
            if token.is_cancelled() {
                return Err(RuntimeError::Cancelled {
                    phase: phase.to_string(),
                });
            }
            if let Err(e) = invoke(behavior.as_ref(), phase, context, token).await {
                // Log error but continue with other hooks
                tracing::error!("{} failed for {}: {}", phase, behavior.name(), e);
                failures += 1;
            }
        }

        tracing::debug!(
            "{} complete ({} hooks executed, {} failed)",
            phase,
            selected.len(),
            failures
        );
        Ok(failures)
    }

    pub fn len(&self) -> usize {
        self.behaviors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.behaviors.is_empty()
    }
}

/// A hook that panics is reported as a failed hook.
async fn invoke(
    behavior: &dyn LifecycleBehavior,
    phase: HookPhase,
    context: &AppContext,
    token: &CancellationToken,
) -> HookResult {
    let hook = async {
        match phase {
            HookPhase::BeforeInitialize => behavior.before_initialize(context, token).await,
            HookPhase::AfterInitialize => behavior.after_initialize(context, token).await,
            HookPhase::BeforeFinalize => behavior.before_finalize(context, token).await,
            HookPhase::AfterFinalize => behavior.after_finalize(context, token).await,
        }
    };
    match AssertUnwindSafe(hook).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(_) => Err(LifecycleError::panicked(phase.to_string(), behavior.name())),
    }
}

fn describe(target: Option<&FeatureDescriptor>) -> String {
    match target {
        Some(feature) => format!("feature {}", feature.name),
        None => "application".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::FeatureRef;
    use async_trait::async_trait;
    use tokio::sync::RwLock;

    struct Recorder {
        name: &'static str,
        scope: BehaviorScope,
        priority: i32,
        fail: bool,
        log: Arc<RwLock<Vec<String>>>,
    }

    impl Recorder {
        fn new(name: &'static str, log: &Arc<RwLock<Vec<String>>>) -> Self {
            Self {
                name,
                scope: BehaviorScope::Application,
                priority: 0,
                fail: false,
                log: Arc::clone(log),
            }
        }
    }

    #[async_trait]
    impl LifecycleBehavior for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        fn scope(&self) -> BehaviorScope {
            self.scope.clone()
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        async fn before_initialize(&self, _context: &AppContext, _token: &CancellationToken) -> HookResult {
            self.log.write().await.push(format!("init:{}", self.name));
            if self.fail {
                return Err(LifecycleError::init_failed("refused"));
            }
            Ok(())
        }

        async fn before_finalize(&self, _context: &AppContext, _token: &CancellationToken) -> HookResult {
            self.log.write().await.push(format!("fin:{}", self.name));
            if self.fail {
                return Err(LifecycleError::finalize_failed("refused"));
            }
            Ok(())
        }
    }

    fn set(behaviors: Vec<Recorder>) -> BehaviorSet {
        BehaviorSet::new(
            behaviors
                .into_iter()
                .map(|b| Arc::new(b) as Arc<dyn LifecycleBehavior>)
                .collect(),
        )
    }

    #[tokio::test]
    async fn test_forward_then_reverse_order() {
        let log = Arc::new(RwLock::new(Vec::new()));
        let mut late = Recorder::new("late", &log);
        late.priority = 5;
        let behaviors = set(vec![late, Recorder::new("a", &log), Recorder::new("b", &log)]);
        let context = AppContext::detached();
        let token = CancellationToken::new();

        behaviors
            .run_forward(HookPhase::BeforeInitialize, None, &context, &token)
            .await
            .unwrap();
        behaviors
            .run_reverse(HookPhase::BeforeFinalize, None, &context, &token)
            .await
            .unwrap();

        assert_eq!(
            *log.read().await,
            vec!["init:a", "init:b", "init:late", "fin:late", "fin:b", "fin:a"]
        );
    }

    #[tokio::test]
    async fn test_feature_scope_filtering() {
        let log = Arc::new(RwLock::new(Vec::new()));
        let mut cache_only = Recorder::new("cache-only", &log);
        cache_only.scope = BehaviorScope::Feature(FeatureRef::new("Cache"));
        let behaviors = set(vec![Recorder::new("global", &log), cache_only]);

        let cache = FeatureDescriptor::new("cache", "1");
        let queue = FeatureDescriptor::new("queue", "1");
        assert_eq!(behaviors.select(Some(&cache)).len(), 1);
        assert!(behaviors.select(Some(&queue)).is_empty());
        assert_eq!(behaviors.select(None).len(), 1);
    }

    #[tokio::test]
    async fn test_forward_stops_at_first_failure() {
        let log = Arc::new(RwLock::new(Vec::new()));
        let mut broken = Recorder::new("broken", &log);
        broken.fail = true;
        let behaviors = set(vec![broken, Recorder::new("after", &log)]);

        let err = behaviors
            .run_forward(
                HookPhase::BeforeInitialize,
                None,
                &AppContext::detached(),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, RuntimeError::BehaviorFailed { .. }));
        assert_eq!(*log.read().await, vec!["init:broken"]);
    }

    #[tokio::test]
    async fn test_reverse_continues_after_failure() {
        let log = Arc::new(RwLock::new(Vec::new()));
        let mut broken = Recorder::new("broken", &log);
        broken.fail = true;
        let behaviors = set(vec![Recorder::new("first", &log), broken]);

        let failures = behaviors
            .run_reverse(
                HookPhase::BeforeFinalize,
                None,
                &AppContext::detached(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(failures, 1);
        assert_eq!(*log.read().await, vec!["fin:broken", "fin:first"]);
    }

    struct Unwinding;

    #[async_trait]
    impl LifecycleBehavior for Unwinding {
        fn name(&self) -> &str {
            "unwinding"
        }

        async fn before_finalize(&self, _context: &AppContext, _token: &CancellationToken) -> HookResult {
            panic!("hook blew up")
        }
    }

    #[tokio::test]
    async fn test_reverse_counts_panicking_hook_and_continues() {
        let log = Arc::new(RwLock::new(Vec::new()));
        let behaviors = BehaviorSet::new(vec![
            Arc::new(Recorder::new("first", &log)) as Arc<dyn LifecycleBehavior>,
            Arc::new(Unwinding),
        ]);

        let failures = behaviors
            .run_reverse(
                HookPhase::BeforeFinalize,
                None,
                &AppContext::detached(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(failures, 1);
        assert_eq!(*log.read().await, vec!["fin:first"]);
    }

    #[tokio::test]
    async fn test_cancelled_token_stops_forward_run() {
        let log = Arc::new(RwLock::new(Vec::new()));
        let behaviors = set(vec![Recorder::new("never", &log)]);
        let token = CancellationToken::new();
        token.cancel();

        let err = behaviors
            .run_forward(HookPhase::BeforeInitialize, None, &AppContext::detached(), &token)
            .await
            .unwrap_err();

        assert!(matches!(err, RuntimeError::Cancelled { .. }));
        assert!(log.read().await.is_empty());
    }
}
