use crate::descriptor::{ContractId, Instance};
use crate::error::{Result, RuntimeError};
use crate::registry::ContractRegistry;
use std::sync::Arc;

/// Something that hands out activated instances by contract.
///
/// Implemented by [`Container`](super::Container) and [`Scope`](super::Scope).
/// Typed access goes through [`get`](#method.get) and
/// [`get_all`](#method.get_all) on `dyn Resolve`.
pub trait Resolve: Send + Sync {
    /// The single resolved implementation of `contract`.
    fn resolve_instance(&self, contract: ContractId) -> Result<Instance>;

    /// Every surviving implementation of `contract`, best rank first.
    fn resolve_all_instances(&self, contract: ContractId) -> Result<Vec<Instance>>;
}

impl dyn Resolve + '_ {
    pub fn get<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        downcast::<T>(self.resolve_instance(ContractId::of::<T>())?)
    }

    pub fn get_all<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Vec<Arc<T>>> {
        self.resolve_all_instances(ContractId::of::<T>())?
            .into_iter()
            .map(downcast::<T>)
            .collect()
    }
}

/// The container the lifecycle runtime talks to.
///
/// Besides resolving, it exposes the registry it was built from and can be
/// disposed once at the end of shutdown.
pub trait ActivationContainer: Resolve {
    fn registry(&self) -> &ContractRegistry;

    fn as_resolve(&self) -> &dyn Resolve;

    /// Release every cached instance. Called once, during shutdown cleanup.
    fn dispose(&self) -> anyhow::Result<()>;
}

/// Instances for contract `T` always hold an `Arc<T>`.
pub(crate) fn downcast<T: ?Sized + Send + Sync + 'static>(instance: Instance) -> Result<Arc<T>> {
    let wrapper = instance
        .downcast::<Arc<T>>()
        .map_err(|_| RuntimeError::DowncastFailed {
            type_name: std::any::type_name::<T>().to_string(),
        })?;
    Ok(Arc::clone(&*wrapper))
}
