use crate::descriptor::{ContractId, ImplId, Instance};
use crate::di::{Container, Resolve};
use crate::error::Result;
use dashmap::DashMap;
use std::sync::Arc;

/// A unit of work with its own cache for scoped lifetimes.
///
/// Singletons still come from the root container. Dropping the scope
/// releases its scoped instances.
pub struct Scope {
    container: Arc<Container>,
    name: Option<String>,
    instances: DashMap<ImplId, Instance>,
}

impl Scope {
    pub(crate) fn new(container: Arc<Container>, name: Option<String>) -> Self {
        Self {
            container,
            name,
            instances: DashMap::new(),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn resolve<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        (self as &dyn Resolve).get::<T>()
    }

    pub fn resolve_all<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Vec<Arc<T>>> {
        (self as &dyn Resolve).get_all::<T>()
    }

    pub(crate) fn instances(&self) -> &DashMap<ImplId, Instance> {
        &self.instances
    }
}

impl Resolve for Scope {
    fn resolve_instance(&self, contract: ContractId) -> Result<Instance> {
        self.container.resolve_in(contract, Some(self))
    }

    fn resolve_all_instances(&self, contract: ContractId) -> Result<Vec<Instance>> {
        self.container.resolve_all_in(contract, Some(self))
    }
}
