use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Case-insensitive feature identity. Keeps the spelling it was declared with.
#[derive(Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureName(String);

impl FeatureName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn key(&self) -> impl Iterator<Item = u8> + '_ {
        self.0.bytes().map(|b| b.to_ascii_lowercase())
    }
}

impl PartialEq for FeatureName {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Eq for FeatureName {}

impl Hash for FeatureName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for byte in self.key() {
            state.write_u8(byte);
        }
    }
}

impl PartialOrd for FeatureName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FeatureName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(other.key())
    }
}

impl fmt::Debug for FeatureName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

impl fmt::Display for FeatureName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FeatureName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for FeatureName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Metadata of one feature: identity, failure policy and ordering constraints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureDescriptor {
    pub name: FeatureName,
    pub version: String,
    pub is_required: bool,
    pub dependencies: BTreeSet<FeatureName>,
    /// Tie-break among features with no dependency between them; lower first.
    pub processing_priority: i32,
}

impl FeatureDescriptor {
    /// An optional feature with no dependencies.
    pub fn new(name: impl Into<FeatureName>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            is_required: false,
            dependencies: BTreeSet::new(),
            processing_priority: 0,
        }
    }

    pub fn required(mut self, required: bool) -> Self {
        self.is_required = required;
        self
    }

    pub fn depends_on(mut self, name: impl Into<FeatureName>) -> Self {
        self.dependencies.insert(name.into());
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.processing_priority = priority;
        self
    }

    pub fn has_dependency(&self, name: &FeatureName) -> bool {
        self.dependencies.contains(name)
    }
}

/// Points at a feature by name and, optionally, exact version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeatureRef {
    pub name: FeatureName,
    pub version: Option<String>,
}

impl FeatureRef {
    pub fn new(name: impl Into<FeatureName>) -> Self {
        Self {
            name: name.into(),
            version: None,
        }
    }

    pub fn versioned(name: impl Into<FeatureName>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: Some(version.into()),
        }
    }

    pub fn matches(&self, feature: &FeatureDescriptor) -> bool {
        self.name == feature.name
            && self
                .version
                .as_ref()
                .is_none_or(|version| *version == feature.version)
    }
}

impl fmt::Display for FeatureRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{}@{}", self.name, version),
            None => write!(f, "{}", self.name),
        }
    }
}
