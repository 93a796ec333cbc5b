use crate::descriptor::{ContractId, ImplId, Instance, Lifetime, ServiceDescriptor};
use crate::di::{ActivationContainer, Resolve, Scope};
use crate::error::{Result, RuntimeError};
use crate::registry::ContractRegistry;
use dashmap::DashMap;
use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

pub(crate) type Disposer = Box<dyn FnOnce() -> anyhow::Result<()> + Send>;

thread_local! {
    static ACTIVATING: RefCell<Vec<ContractId>> = const { RefCell::new(Vec::new()) };
}

/// Pops the activation stack even when the activator fails.
struct ActivationGuard;

impl ActivationGuard {
    fn enter(contract: ContractId) -> Result<Self> {
        ACTIVATING.with(|stack| {
            let mut stack = stack.borrow_mut();
            if let Some(at) = stack.iter().position(|c| *c == contract) {
                let mut chain: Vec<String> = stack[at..].iter().map(|c| c.to_string()).collect();
                chain.push(contract.to_string());
                return Err(RuntimeError::CircularDependency {
                    cycle: chain.join(" -> "),
                });
            }
            stack.push(contract);
            Ok(ActivationGuard)
        })
    }
}

impl Drop for ActivationGuard {
    fn drop(&mut self) {
        ACTIVATING.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// Thread-safe activation container built from a resolved registry.
///
/// Singletons are cached here; scoped lifetimes are cached by the [`Scope`]
/// they were resolved in.
pub struct Container {
    registry: Arc<ContractRegistry>,
    singletons: DashMap<ImplId, Instance>,
    disposers: Mutex<Vec<Disposer>>,
    disposed: AtomicBool,
}

impl Container {
    pub fn new(registry: Arc<ContractRegistry>) -> Self {
        Self {
            registry,
            singletons: DashMap::new(),
            disposers: Mutex::new(Vec::new()),
            disposed: AtomicBool::new(false),
        }
    }

    /// Register a callback run by [`dispose`](ActivationContainer::dispose), in reverse
    /// registration order.
    pub fn on_dispose<F>(&self, disposer: F)
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        self.disposers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(disposer));
    }

    pub fn resolve<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        (self as &dyn Resolve).get::<T>()
    }

    pub fn resolve_all<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Vec<Arc<T>>> {
        (self as &dyn Resolve).get_all::<T>()
    }

    /// Open a scope for `ScopePerRequest` and named-scope lifetimes.
    pub fn create_scope(self: &Arc<Self>, name: Option<&str>) -> Scope {
        Scope::new(Arc::clone(self), name.map(str::to_string))
    }

    pub fn contains<T: ?Sized + 'static>(&self) -> bool {
        self.registry.get_contract::<T>().is_some()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    pub(crate) fn resolve_in(&self, contract: ContractId, scope: Option<&Scope>) -> Result<Instance> {
        let resolved = self.lookup(contract)?;
        let descriptor = resolved
            .single()
            .ok_or_else(|| RuntimeError::DependencyNotFound {
                contract: contract.to_string(),
            })?;
        self.activate(descriptor, scope)
    }

    pub(crate) fn resolve_all_in(
        &self,
        contract: ContractId,
        scope: Option<&Scope>,
    ) -> Result<Vec<Instance>> {
        let resolved = self.lookup(contract)?;
        resolved
            .ordered()
            .iter()
            .map(|descriptor| self.activate(descriptor, scope))
            .collect()
    }

    fn lookup(&self, contract: ContractId) -> Result<&crate::registry::ResolvedContract> {
        if self.is_disposed() {
            return Err(RuntimeError::ContainerDisposed);
        }
        self.registry
            .get(&contract)
            .ok_or_else(|| RuntimeError::DependencyNotFound {
                contract: contract.to_string(),
            })
    }

    fn activate(&self, descriptor: &ServiceDescriptor, scope: Option<&Scope>) -> Result<Instance> {
        let contract = descriptor.contract_id();
        let (Some(id), Some(strategy)) = (descriptor.implementation_id(), descriptor.strategy())
        else {
            return Err(RuntimeError::Internal(format!(
                "{contract} resolved to its own definition"
            )));
        };
        let lifetime = descriptor.lifetime().cloned().unwrap_or_default();

        let (cache, resolver): (&DashMap<ImplId, Instance>, &dyn Resolve) = match (&lifetime, scope)
        {
            (Lifetime::Singleton, _) => (&self.singletons, self),
            (_, None) => {
                return Err(RuntimeError::ScopeMismatch {
                    message: format!("{id} ({lifetime}) cannot be resolved outside a scope"),
                });
            }
            (lifetime, Some(scope)) if !lifetime.admits_scope(scope.name()) => {
                return Err(RuntimeError::ScopeMismatch {
                    message: format!(
                        "{id} ({lifetime}) cannot be resolved in scope {}",
                        scope.name().unwrap_or("<unnamed>")
                    ),
                });
            }
            (_, Some(scope)) => (scope.instances(), scope),
        };

        if let Some(existing) = cache.get(&id) {
            return Ok(Arc::clone(existing.value()));
        }

        let _guard = ActivationGuard::enter(contract)?;
        tracing::debug!("Activating {} for {} ({})", id, contract, lifetime);
        let instance = strategy
            .activate(resolver)
            .map_err(|source| RuntimeError::ActivationFailed {
                contract: contract.to_string(),
                source,
            })?;

        // A concurrent activation may have won; keep the first cached instance.
        Ok(Arc::clone(cache.entry(id).or_insert(instance).value()))
    }
}

impl Resolve for Container {
    fn resolve_instance(&self, contract: ContractId) -> Result<Instance> {
        self.resolve_in(contract, None)
    }

    fn resolve_all_instances(&self, contract: ContractId) -> Result<Vec<Instance>> {
        self.resolve_all_in(contract, None)
    }
}

impl ActivationContainer for Container {
    fn registry(&self) -> &ContractRegistry {
        &self.registry
    }

    fn as_resolve(&self) -> &dyn Resolve {
        self
    }

    fn dispose(&self) -> anyhow::Result<()> {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let disposers: Vec<Disposer> = std::mem::take(
            &mut *self.disposers.lock().unwrap_or_else(PoisonError::into_inner),
        );

        let mut first_error = None;
        for disposer in disposers.into_iter().rev() {
            if let Err(e) = disposer() {
                tracing::error!("Disposer failed: {:#}", e);
                first_error.get_or_insert(e);
            }
        }

        tracing::debug!("Releasing {} singleton instances", self.singletons.len());
        self.singletons.clear();

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
