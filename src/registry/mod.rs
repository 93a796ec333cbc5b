//! Contract registry
//!
//! Turns a flat list of [`ServiceDescriptor`]s into one [`ResolvedContract`]
//! per contract. Resolution is a one-shot, pure computation: it either
//! produces a complete registry or fails without publishing anything.
//!
//! # Resolution rules
//!
//! ```text
//! group by contract
//!   └─ split definition / implementations   (≤ 1 definition)
//!        └─ drop duplicate implementations  (warning)
//!             └─ rank by (override priority, processing priority)
//!                  └─ eliminate every implementation some present override replaces
//!                       ├─ single-valued:   top two ranks equal → ambiguous
//!                       └─ multi-valued:    keep all, stable on ties
//! ```

mod resolver;
mod warning;

pub use resolver::ResolvedContract;
pub use warning::ResolutionWarning;

use crate::descriptor::{ContractId, ServiceDescriptor};
use crate::error::Result;
use std::collections::HashMap;

/// Immutable map from contract to its resolved implementations.
#[derive(Debug, Default)]
pub struct ContractRegistry {
    contracts: HashMap<ContractId, ResolvedContract>,
    declaration_order: Vec<ContractId>,
    warnings: Vec<ResolutionWarning>,
}

impl ContractRegistry {
    /// Resolve every contract in `descriptors`.
    ///
    /// # Errors
    ///
    /// Fails on the first contract that is ambiguous, has a self-referential or
    /// circular override, or carries more than one definition.
    pub fn resolve(descriptors: Vec<ServiceDescriptor>) -> Result<Self> {
        let mut groups: Vec<(ContractId, Vec<ServiceDescriptor>)> = Vec::new();
        let mut index: HashMap<ContractId, usize> = HashMap::new();

        for descriptor in descriptors {
            let contract = descriptor.contract_id();
            let slot = *index.entry(contract).or_insert_with(|| {
                groups.push((contract, Vec::new()));
                groups.len() - 1
            });
            groups[slot].1.push(descriptor);
        }

        let mut registry = ContractRegistry::default();
        for (contract, group) in groups {
            if let Some(resolved) = resolver::resolve_group(contract, group, &mut registry.warnings)? {
                registry.declaration_order.push(contract);
                registry.contracts.insert(contract, resolved);
            }
        }

        for warning in &registry.warnings {
            tracing::warn!("{}", warning);
        }
        tracing::info!(
            "Contract registry resolved ({} contracts, {} warnings)",
            registry.contracts.len(),
            registry.warnings.len()
        );

        Ok(registry)
    }

    pub fn get(&self, contract: &ContractId) -> Option<&ResolvedContract> {
        self.contracts.get(contract)
    }

    pub fn get_contract<C: ?Sized + 'static>(&self) -> Option<&ResolvedContract> {
        self.get(&ContractId::of::<C>())
    }

    /// Resolved contracts in the order they were first declared.
    pub fn contracts(&self) -> impl Iterator<Item = &ResolvedContract> {
        self.declaration_order
            .iter()
            .filter_map(|id| self.contracts.get(id))
    }

    pub fn warnings(&self) -> &[ResolutionWarning] {
        &self.warnings
    }

    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{ImplId, Lifetime};
    use crate::error::RuntimeError;
    use std::sync::Arc;

    trait Store: Send + Sync {}
    trait Plugin: Send + Sync {}
    trait Orphan: Send + Sync {}

    struct A;
    struct B;
    struct C;
    struct D;

    impl Store for A {}
    impl Store for B {}
    impl Store for C {}
    impl Store for D {}
    impl Plugin for A {}
    impl Plugin for B {}
    impl Plugin for C {}

    fn store<I: Store + 'static>(value: I) -> ServiceDescriptor {
        ServiceDescriptor::instance::<dyn Store, I>(Arc::new(value))
    }

    fn plugin<I: Plugin + 'static>(value: I) -> ServiceDescriptor {
        ServiceDescriptor::instance::<dyn Plugin, I>(Arc::new(value))
    }

    fn ids(contract: &ResolvedContract) -> Vec<ImplId> {
        contract
            .ordered()
            .iter()
            .filter_map(|d| d.implementation_id())
            .collect()
    }

    #[test]
    fn test_override_eliminates_base_regardless_of_priority() {
        let registry = ContractRegistry::resolve(vec![
            store(A).override_priority(10),
            store(B).override_priority(5).overriding::<A>(),
        ])
        .unwrap();

        let resolved = registry.get_contract::<dyn Store>().unwrap();
        assert_eq!(resolved.single().unwrap().implementation_id(), Some(ImplId::of::<B>()));
        assert_eq!(ids(resolved), vec![ImplId::of::<B>()]);
        assert_eq!(resolved.eliminated(), &[ImplId::of::<A>()]);
    }

    #[test]
    fn test_override_with_worse_priority_still_wins() {
        let registry = ContractRegistry::resolve(vec![
            store(A).override_priority(1),
            store(B).override_priority(50).overriding::<A>(),
        ])
        .unwrap();

        let resolved = registry.get_contract::<dyn Store>().unwrap();
        assert_eq!(resolved.single().unwrap().implementation_id(), Some(ImplId::of::<B>()));
    }

    #[test]
    fn test_ambiguous_single_contract() {
        let err = ContractRegistry::resolve(vec![
            store(A).override_priority(5),
            store(B).override_priority(5),
        ])
        .unwrap_err();

        match err {
            RuntimeError::AmbiguousResolution { first, second, .. } => {
                assert!(first.ends_with("::A"));
                assert!(second.ends_with("::B"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_processing_priority_breaks_override_tie() {
        let registry = ContractRegistry::resolve(vec![
            store(A).override_priority(5).processing_priority(2),
            store(B).override_priority(5).processing_priority(1),
        ])
        .unwrap();

        let resolved = registry.get_contract::<dyn Store>().unwrap();
        assert_eq!(resolved.single().unwrap().implementation_id(), Some(ImplId::of::<B>()));
    }

    #[test]
    fn test_multiple_allowed_ordering_is_stable() {
        let registry = ContractRegistry::resolve(vec![
            ServiceDescriptor::contract::<dyn Plugin>().allow_multiple(true),
            plugin(A).processing_priority(10),
            plugin(B).processing_priority(5),
            plugin(C).processing_priority(5),
        ])
        .unwrap();

        let resolved = registry.get_contract::<dyn Plugin>().unwrap();
        assert!(resolved.allows_multiple());
        assert_eq!(
            ids(resolved),
            vec![ImplId::of::<B>(), ImplId::of::<C>(), ImplId::of::<A>()]
        );
    }

    #[test]
    fn test_override_chain_collapses_transitively() {
        let registry = ContractRegistry::resolve(vec![
            store(A),
            store(B).overriding::<A>(),
            store(C).overriding::<B>(),
        ])
        .unwrap();

        let resolved = registry.get_contract::<dyn Store>().unwrap();
        assert_eq!(ids(resolved), vec![ImplId::of::<C>()]);
    }

    #[test]
    fn test_diamond_override_tie_is_ambiguous() {
        let err = ContractRegistry::resolve(vec![
            store(A),
            store(B).overriding::<A>(),
            store(C).overriding::<A>(),
        ])
        .unwrap_err();
        assert!(matches!(err, RuntimeError::AmbiguousResolution { .. }));
    }

    #[test]
    fn test_diamond_override_with_distinct_priorities() {
        let registry = ContractRegistry::resolve(vec![
            store(A),
            store(B).override_priority(3).overriding::<A>(),
            store(C).override_priority(1).overriding::<A>(),
        ])
        .unwrap();
        let resolved = registry.get_contract::<dyn Store>().unwrap();
        assert_eq!(resolved.single().unwrap().implementation_id(), Some(ImplId::of::<C>()));
    }

    #[test]
    fn test_self_override_is_rejected() {
        let err = ContractRegistry::resolve(vec![store(A).overriding::<A>()]).unwrap_err();
        assert!(matches!(err, RuntimeError::SelfOverride { .. }));
    }

    #[test]
    fn test_circular_override_is_rejected() {
        let err = ContractRegistry::resolve(vec![
            store(A).overriding::<B>(),
            store(B).overriding::<A>(),
        ])
        .unwrap_err();
        assert!(matches!(err, RuntimeError::Configuration(_)));
    }

    #[test]
    fn test_contract_without_implementations_is_a_warning() {
        let registry = ContractRegistry::resolve(vec![
            ServiceDescriptor::contract::<dyn Orphan>(),
            store(A),
        ])
        .unwrap();

        assert!(registry.get_contract::<dyn Orphan>().is_none());
        assert_eq!(registry.len(), 1);
        assert!(matches!(
            registry.warnings(),
            [ResolutionWarning::NoImplementations { .. }]
        ));
    }

    #[test]
    fn test_duplicate_definition_is_rejected() {
        let err = ContractRegistry::resolve(vec![
            ServiceDescriptor::contract::<dyn Store>(),
            ServiceDescriptor::contract::<dyn Store>(),
            store(A),
        ])
        .unwrap_err();
        assert!(matches!(err, RuntimeError::DuplicateContractDefinition { .. }));
    }

    #[test]
    fn test_duplicate_implementation_is_dropped() {
        let registry = ContractRegistry::resolve(vec![
            store(A).override_priority(1),
            store(A).override_priority(1),
        ])
        .unwrap();

        let resolved = registry.get_contract::<dyn Store>().unwrap();
        assert_eq!(resolved.ordered().len(), 1);
        assert!(matches!(
            registry.warnings(),
            [ResolutionWarning::DuplicateImplementation { .. }]
        ));
    }

    #[test]
    fn test_lifetime_defaults_from_definition() {
        let registry = ContractRegistry::resolve(vec![
            ServiceDescriptor::contract::<dyn Store>().with_lifetime(Lifetime::ScopePerRequest),
            store(A),
            store(D).override_priority(1).overriding::<A>().with_lifetime(Lifetime::Singleton),
        ])
        .unwrap();

        let resolved = registry.get_contract::<dyn Store>().unwrap();
        assert_eq!(resolved.lifetime(), &Lifetime::ScopePerRequest);
        assert_eq!(
            resolved.single().unwrap().lifetime(),
            Some(&Lifetime::Singleton)
        );
    }

    #[test]
    fn test_unknown_override_base_warns() {
        let registry =
            ContractRegistry::resolve(vec![store(A), store(B).override_priority(1).overriding::<C>()])
                .unwrap();

        let resolved = registry.get_contract::<dyn Store>().unwrap();
        assert_eq!(resolved.single().unwrap().implementation_id(), Some(ImplId::of::<A>()));
        assert!(matches!(
            registry.warnings(),
            [ResolutionWarning::UnknownOverrideBase { .. }]
        ));
    }

    #[test]
    fn test_failure_publishes_nothing() {
        let result = ContractRegistry::resolve(vec![
            plugin(A),
            store(A).override_priority(1),
            store(B).override_priority(1),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_contracts_keep_declaration_order() {
        let registry = ContractRegistry::resolve(vec![plugin(A), store(A)]).unwrap();
        let contracts: Vec<_> = registry.contracts().map(|c| c.contract()).collect();
        assert_eq!(
            contracts,
            vec![ContractId::of::<dyn Plugin>(), ContractId::of::<dyn Store>()]
        );
    }
}
