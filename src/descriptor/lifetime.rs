use serde::{Deserialize, Serialize};
use std::fmt;

/// How long an activated instance is reused.
///
/// - **Singleton**: one instance per container, shared by every scope.
/// - **ScopePerRequest**: one instance per [`Scope`](crate::di::Scope); cannot be
///   resolved from the root container.
/// - **ScopedToNamedScope**: one instance per scope carrying the given name; scopes
///   with any other name (or no name) reject the resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Lifetime {
    #[default]
    Singleton,
    ScopePerRequest,
    ScopedToNamedScope(String),
}

impl Lifetime {
    pub fn named(scope: impl Into<String>) -> Self {
        Self::ScopedToNamedScope(scope.into())
    }

    /// Whether instances of this lifetime may live in a scope called `scope_name`.
    pub fn admits_scope(&self, scope_name: Option<&str>) -> bool {
        match self {
            Lifetime::Singleton => true,
            Lifetime::ScopePerRequest => true,
            Lifetime::ScopedToNamedScope(name) => {
                scope_name.is_some_and(|s| s.eq_ignore_ascii_case(name))
            }
        }
    }
}

impl fmt::Display for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lifetime::Singleton => f.write_str("singleton"),
            Lifetime::ScopePerRequest => f.write_str("scope-per-request"),
            Lifetime::ScopedToNamedScope(name) => write!(f, "scoped({name})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_scope_matching() {
        let lifetime = Lifetime::named("Tenant");
        assert!(lifetime.admits_scope(Some("tenant")));
        assert!(!lifetime.admits_scope(Some("request")));
        assert!(!lifetime.admits_scope(None));
        assert!(Lifetime::ScopePerRequest.admits_scope(None));
    }

    #[test]
    fn test_display() {
        assert_eq!(Lifetime::Singleton.to_string(), "singleton");
        assert_eq!(Lifetime::named("job").to_string(), "scoped(job)");
    }
}
