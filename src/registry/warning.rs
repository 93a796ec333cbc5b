use crate::descriptor::{ContractId, ImplId};
use std::fmt;

/// Non-fatal findings of contract resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionWarning {
    /// The contract was defined but nothing implements it; it is left out of the registry.
    NoImplementations { contract: ContractId },
    /// The same implementation was registered twice; the later one was dropped.
    DuplicateImplementation {
        contract: ContractId,
        implementation: ImplId,
    },
    /// An override names a base that is not registered for the contract.
    UnknownOverrideBase {
        contract: ContractId,
        implementation: ImplId,
        base: ImplId,
    },
}

impl fmt::Display for ResolutionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionWarning::NoImplementations { contract } => {
                write!(f, "Contract {contract} has no implementations and is unusable")
            }
            ResolutionWarning::DuplicateImplementation {
                contract,
                implementation,
            } => write!(
                f,
                "Implementation {implementation} registered more than once for {contract}"
            ),
            ResolutionWarning::UnknownOverrideBase {
                contract,
                implementation,
                base,
            } => write!(
                f,
                "{implementation} overrides {base}, which is not registered for {contract}"
            ),
        }
    }
}
