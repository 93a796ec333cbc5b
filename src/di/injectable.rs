use crate::di::Resolve;
use crate::error::Result;

/// Trait for types that can be constructed by the container
///
/// Implement this to register a type with
/// [`ServiceDescriptor::implementation`](crate::descriptor::ServiceDescriptor::implementation).
///
/// # Example
/// ```rust,ignore
/// use hostweave::di::{Injectable, Resolve};
/// use std::sync::Arc;
///
/// trait UserRepository: Send + Sync {}
///
/// pub struct UserService {
///     repository: Arc<dyn UserRepository>,
/// }
///
/// impl Injectable for UserService {
///     fn inject(resolver: &dyn Resolve) -> hostweave::Result<Self> {
///         Ok(Self {
///             repository: resolver.get::<dyn UserRepository>()?,
///         })
///     }
/// }
/// ```
pub trait Injectable: Sized + Send + Sync + 'static {
    /// Create an instance by resolving dependencies from the resolver
    ///
    /// # Errors
    /// Returns an error if any required dependency cannot be resolved.
    fn inject(resolver: &dyn Resolve) -> Result<Self>;
}
