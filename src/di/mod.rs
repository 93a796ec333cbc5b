//! Activation container
//!
//! The runtime never instantiates services on its own: it hands the resolved
//! [`ContractRegistry`](crate::registry::ContractRegistry) to an
//! [`ActivationContainer`]. [`Container`] is the default one.

mod builder;
mod container;
mod injectable;
mod resolve;
mod scope;

pub use builder::ContainerBuilder;
pub use container::Container;
pub use injectable::Injectable;
pub use resolve::{ActivationContainer, Resolve};
pub use scope::Scope;
