//! Service descriptors
//!
//! A [`ServiceDescriptor`] is the normalized form of one candidate
//! implementation for a contract, or the single definition of the contract
//! itself. Descriptors are plain values: how they were discovered is the
//! business of a [`DescriptorProvider`].
//!
//! # Example
//!
//! ```rust,ignore
//! use hostweave::descriptor::ServiceDescriptor;
//!
//! let descriptors = vec![
//!     ServiceDescriptor::contract::<dyn Greeter>().allow_multiple(false),
//!     ServiceDescriptor::implementation::<dyn Greeter, English>(|g| g as Arc<dyn Greeter>)
//!         .override_priority(10),
//!     ServiceDescriptor::factory::<dyn Greeter, Pirate, _>(|_| Ok(Arc::new(Pirate) as Arc<dyn Greeter>))
//!         .override_priority(5)
//!         .overriding::<English>(),
//! ];
//! ```

mod lifetime;

pub use lifetime::Lifetime;

use crate::di::{Injectable, Resolve};
use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// An activated service. For a contract `C` the erased value is always an `Arc<C>`.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Builds an instance, resolving dependencies through the given resolver.
pub type Activator = Arc<dyn Fn(&dyn Resolve) -> anyhow::Result<Instance> + Send + Sync>;

/// Identity of a Rust type, used for both contracts and implementations.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

/// Identity of the abstraction being satisfied.
pub type ContractId = TypeKey;

/// Identity of one implementation type.
pub type ImplId = TypeKey;

impl TypeKey {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// How an implementation gets instantiated. Exactly one strategy per descriptor.
#[derive(Clone)]
pub enum InstancingStrategy {
    /// Construct the concrete type through its [`Injectable`] impl.
    Type(Activator),
    /// Call a user-supplied factory.
    Factory(Activator),
    /// Hand out a pre-built value.
    Instance(Instance),
}

impl InstancingStrategy {
    pub fn activate(&self, resolver: &dyn Resolve) -> anyhow::Result<Instance> {
        match self {
            InstancingStrategy::Type(activator) | InstancingStrategy::Factory(activator) => {
                activator(resolver)
            }
            InstancingStrategy::Instance(instance) => Ok(Arc::clone(instance)),
        }
    }
}

impl fmt::Debug for InstancingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstancingStrategy::Type(_) => f.write_str("Type"),
            InstancingStrategy::Factory(_) => f.write_str("Factory"),
            InstancingStrategy::Instance(_) => f.write_str("Instance"),
        }
    }
}

#[derive(Clone, Debug)]
pub enum DescriptorKind {
    /// Carries the contract-wide defaults (`allow_multiple`, lifetime).
    Definition,
    Implementation {
        implementation: ImplId,
        strategy: InstancingStrategy,
    },
}

#[derive(Clone, Debug)]
pub struct ServiceDescriptor {
    contract: ContractId,
    kind: DescriptorKind,
    lifetime: Option<Lifetime>,
    allow_multiple: bool,
    processing_priority: i32,
    override_priority: i32,
    overrides: Option<ImplId>,
}

impl ServiceDescriptor {
    fn new(contract: ContractId, kind: DescriptorKind) -> Self {
        Self {
            contract,
            kind,
            lifetime: None,
            allow_multiple: false,
            processing_priority: 0,
            override_priority: 0,
            overrides: None,
        }
    }

    /// The definition descriptor of contract `C`.
    pub fn contract<C: ?Sized + 'static>() -> Self {
        Self::new(ContractId::of::<C>(), DescriptorKind::Definition)
    }

    /// Implementation `I` of contract `C`, built through `I::inject` and cast to `C`.
    pub fn implementation<C, I>(cast: fn(Arc<I>) -> Arc<C>) -> Self
    where
        C: ?Sized + Send + Sync + 'static,
        I: Injectable,
    {
        let activator: Activator = Arc::new(move |resolver: &dyn Resolve| {
            let concrete = Arc::new(I::inject(resolver)?);
            Ok(Arc::new(cast(concrete)) as Instance)
        });
        Self::new(
            ContractId::of::<C>(),
            DescriptorKind::Implementation {
                implementation: ImplId::of::<I>(),
                strategy: InstancingStrategy::Type(activator),
            },
        )
    }

    /// Implementation identified by `I` and produced by `factory`.
    pub fn factory<C, I, F>(factory: F) -> Self
    where
        C: ?Sized + Send + Sync + 'static,
        I: ?Sized + 'static,
        F: Fn(&dyn Resolve) -> anyhow::Result<Arc<C>> + Send + Sync + 'static,
    {
        let activator: Activator =
            Arc::new(move |resolver: &dyn Resolve| Ok(Arc::new(factory(resolver)?) as Instance));
        Self::new(
            ContractId::of::<C>(),
            DescriptorKind::Implementation {
                implementation: ImplId::of::<I>(),
                strategy: InstancingStrategy::Factory(activator),
            },
        )
    }

    /// Implementation identified by `I` backed by a fixed value.
    pub fn instance<C, I>(value: Arc<C>) -> Self
    where
        C: ?Sized + Send + Sync + 'static,
        I: ?Sized + 'static,
    {
        Self::new(
            ContractId::of::<C>(),
            DescriptorKind::Implementation {
                implementation: ImplId::of::<I>(),
                strategy: InstancingStrategy::Instance(Arc::new(value)),
            },
        )
    }

    pub fn with_lifetime(mut self, lifetime: Lifetime) -> Self {
        self.lifetime = Some(lifetime);
        self
    }

    pub fn allow_multiple(mut self, allow: bool) -> Self {
        self.allow_multiple = allow;
        self
    }

    pub fn processing_priority(mut self, priority: i32) -> Self {
        self.processing_priority = priority;
        self
    }

    pub fn override_priority(mut self, priority: i32) -> Self {
        self.override_priority = priority;
        self
    }

    /// Mark this implementation as replacing `Base`.
    pub fn overriding<Base: ?Sized + 'static>(mut self) -> Self {
        self.overrides = Some(ImplId::of::<Base>());
        self
    }

    pub fn contract_id(&self) -> ContractId {
        self.contract
    }

    pub fn kind(&self) -> &DescriptorKind {
        &self.kind
    }

    pub fn is_definition(&self) -> bool {
        matches!(self.kind, DescriptorKind::Definition)
    }

    /// Implementation identity; `None` for a contract definition.
    pub fn implementation_id(&self) -> Option<ImplId> {
        match &self.kind {
            DescriptorKind::Definition => None,
            DescriptorKind::Implementation { implementation, .. } => Some(*implementation),
        }
    }

    pub fn strategy(&self) -> Option<&InstancingStrategy> {
        match &self.kind {
            DescriptorKind::Definition => None,
            DescriptorKind::Implementation { strategy, .. } => Some(strategy),
        }
    }

    /// Declared lifetime, if any. Resolved contracts fill in the definition's default.
    pub fn lifetime(&self) -> Option<&Lifetime> {
        self.lifetime.as_ref()
    }

    pub fn allows_multiple(&self) -> bool {
        self.allow_multiple
    }

    pub fn processing_priority_value(&self) -> i32 {
        self.processing_priority
    }

    pub fn override_priority_value(&self) -> i32 {
        self.override_priority
    }

    pub fn is_override(&self) -> bool {
        self.overrides.is_some()
    }

    pub fn overrides(&self) -> Option<ImplId> {
        self.overrides
    }

    /// Ranking key: lower sorts first.
    pub fn rank(&self) -> (i32, i32) {
        (self.override_priority, self.processing_priority)
    }

    /// Implementation name, or the contract name for a definition.
    pub fn display_name(&self) -> &'static str {
        self.implementation_id()
            .map(|id| id.name())
            .unwrap_or_else(|| self.contract.name())
    }

    pub(crate) fn set_lifetime_default(&mut self, lifetime: &Lifetime) {
        if self.lifetime.is_none() {
            self.lifetime = Some(lifetime.clone());
        }
    }
}

/// Supplies raw descriptors. Discovery (scanning, manifests, plugins) lives behind this.
pub trait DescriptorProvider: Send + Sync {
    fn descriptors(&self) -> Vec<ServiceDescriptor>;
}

impl DescriptorProvider for Vec<ServiceDescriptor> {
    fn descriptors(&self) -> Vec<ServiceDescriptor> {
        self.clone()
    }
}
