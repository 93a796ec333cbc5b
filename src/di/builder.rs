use crate::descriptor::{DescriptorProvider, ServiceDescriptor};
use crate::di::Container;
use crate::di::container::Disposer;
use crate::error::Result;
use crate::registry::ContractRegistry;
use std::sync::Arc;

/// Builder for constructing a dependency injection container
///
/// Collects descriptors, resolves them into a [`ContractRegistry`] and builds
/// the final container. Resolution errors surface from [`build`](Self::build).
///
/// # Example
/// ```rust,ignore
/// let container = ContainerBuilder::new()
///     .add(ServiceDescriptor::instance::<dyn Database, Postgres>(Arc::new(Postgres::new())))
///     .provider(&plugin_descriptors)
///     .build()?;
/// ```
pub struct ContainerBuilder {
    descriptors: Vec<ServiceDescriptor>,
    disposers: Vec<Disposer>,
}

impl ContainerBuilder {
    /// Create a new container builder
    pub fn new() -> Self {
        Self {
            descriptors: Vec::new(),
            disposers: Vec::new(),
        }
    }

    /// Add a single descriptor
    pub fn add(mut self, descriptor: ServiceDescriptor) -> Self {
        self.descriptors.push(descriptor);
        self
    }

    /// Add every descriptor a provider supplies
    pub fn provider(mut self, provider: &dyn DescriptorProvider) -> Self {
        self.descriptors.extend(provider.descriptors());
        self
    }

    /// Run `disposer` when the container is disposed
    pub fn on_dispose<F>(mut self, disposer: F) -> Self
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        self.disposers.push(Box::new(disposer));
        self
    }

    /// Resolve the collected descriptors and build the container
    pub fn build(self) -> Result<Container> {
        let registry = ContractRegistry::resolve(self.descriptors)?;
        let container = Container::new(Arc::new(registry));
        for disposer in self.disposers {
            container.on_dispose(disposer);
        }
        Ok(container)
    }
}

impl Default for ContainerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::di::ActivationContainer;
    use crate::error::RuntimeError;

    trait Mailer: Send + Sync {}
    struct Smtp;
    struct Ses;
    impl Mailer for Smtp {}
    impl Mailer for Ses {}

    #[test]
    fn test_build_from_provider() {
        let provided = vec![ServiceDescriptor::instance::<dyn Mailer, Smtp>(Arc::new(Smtp))];
        let container = ContainerBuilder::new().provider(&provided).build().unwrap();
        assert!(container.contains::<dyn Mailer>());
        assert_eq!(container.registry().len(), 1);
    }

    #[test]
    fn test_build_fails_fast_on_ambiguity() {
        let result = ContainerBuilder::new()
            .add(ServiceDescriptor::instance::<dyn Mailer, Smtp>(Arc::new(Smtp)))
            .add(ServiceDescriptor::instance::<dyn Mailer, Ses>(Arc::new(Ses)))
            .build();
        assert!(matches!(
            result,
            Err(RuntimeError::AmbiguousResolution { .. })
        ));
    }
}
