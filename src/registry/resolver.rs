use super::ResolutionWarning;
use crate::descriptor::{ContractId, ImplId, Lifetime, ServiceDescriptor};
use crate::error::{Result, RuntimeError};
use crate::ordering::{self, Precedence};
use std::collections::HashSet;

/// One contract after override resolution.
///
/// Single-valued contracts use [`single`](Self::single); multi-valued ones use
/// [`ordered`](Self::ordered). Both views are always available.
#[derive(Debug, Clone)]
pub struct ResolvedContract {
    contract: ContractId,
    allow_multiple: bool,
    lifetime: Lifetime,
    implementations: Vec<ServiceDescriptor>,
    eliminated: Vec<ImplId>,
}

impl ResolvedContract {
    pub fn contract(&self) -> ContractId {
        self.contract
    }

    pub fn allows_multiple(&self) -> bool {
        self.allow_multiple
    }

    /// Lifetime from the contract definition, `Singleton` when undefined.
    pub fn lifetime(&self) -> &Lifetime {
        &self.lifetime
    }

    /// The winning implementation.
    pub fn single(&self) -> Option<&ServiceDescriptor> {
        self.implementations.first()
    }

    /// Surviving implementations, best rank first.
    pub fn ordered(&self) -> &[ServiceDescriptor] {
        &self.implementations
    }

    /// Implementations removed because an override replaced them.
    pub fn eliminated(&self) -> &[ImplId] {
        &self.eliminated
    }
}

pub(super) fn resolve_group(
    contract: ContractId,
    group: Vec<ServiceDescriptor>,
    warnings: &mut Vec<ResolutionWarning>,
) -> Result<Option<ResolvedContract>> {
    let (definitions, candidates): (Vec<_>, Vec<_>) =
        group.into_iter().partition(ServiceDescriptor::is_definition);

    if definitions.len() > 1 {
        return Err(RuntimeError::DuplicateContractDefinition {
            contract: contract.to_string(),
        });
    }

    let definition = definitions.first();
    let allow_multiple = definition.is_some_and(ServiceDescriptor::allows_multiple);
    let lifetime = definition
        .and_then(|d| d.lifetime().cloned())
        .unwrap_or_default();

    let mut seen = HashSet::new();
    let mut implementations = Vec::with_capacity(candidates.len());
    for mut candidate in candidates {
        let Some(id) = candidate.implementation_id() else {
            continue;
        };
        if !seen.insert(id) {
            warnings.push(ResolutionWarning::DuplicateImplementation {
                contract,
                implementation: id,
            });
            continue;
        }
        if candidate.overrides() == Some(id) {
            return Err(RuntimeError::SelfOverride {
                contract: contract.to_string(),
                implementation: id.to_string(),
            });
        }
        candidate.set_lifetime_default(&lifetime);
        implementations.push(candidate);
    }

    if implementations.is_empty() {
        warnings.push(ResolutionWarning::NoImplementations { contract });
        return Ok(None);
    }

    let ranked = ordering::order(implementations, |a, b| {
        Precedence::prefer_by(a.rank(), b.rank())
    })
    .map_err(|e| RuntimeError::Internal(format!("ranking {contract}: {e}")))?;

    let replaced: HashSet<ImplId> = ranked.iter().filter_map(|d| d.overrides()).collect();
    for descriptor in &ranked {
        if let (Some(base), Some(id)) = (descriptor.overrides(), descriptor.implementation_id()) {
            if !seen.contains(&base) {
                warnings.push(ResolutionWarning::UnknownOverrideBase {
                    contract,
                    implementation: id,
                    base,
                });
            }
        }
    }

    let (eliminated, survivors): (Vec<_>, Vec<_>) = ranked
        .into_iter()
        .partition(|d| d.implementation_id().is_some_and(|id| replaced.contains(&id)));

    if survivors.is_empty() {
        let names: Vec<_> = eliminated.iter().map(|d| d.display_name()).collect();
        return Err(RuntimeError::Configuration(format!(
            "circular override chain for {contract}: {}",
            names.join(", ")
        )));
    }

    if !allow_multiple {
        if let [first, second, ..] = survivors.as_slice() {
            if first.rank() == second.rank() {
                let (override_priority, processing_priority) = first.rank();
                return Err(RuntimeError::AmbiguousResolution {
                    contract: contract.to_string(),
                    first: first.display_name().to_string(),
                    second: second.display_name().to_string(),
                    override_priority,
                    processing_priority,
                });
            }
        }
    }

    let eliminated: Vec<ImplId> = eliminated
        .iter()
        .filter_map(ServiceDescriptor::implementation_id)
        .collect();

    tracing::debug!(
        "Resolved {} ({} active, {} overridden)",
        contract,
        survivors.len(),
        eliminated.len()
    );

    Ok(Some(ResolvedContract {
        contract,
        allow_multiple,
        lifetime,
        implementations: survivors,
        eliminated,
    }))
}
