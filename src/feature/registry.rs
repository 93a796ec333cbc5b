use super::{FeatureDescriptor, FeatureManager, FeatureName};
use crate::error::{Result, RuntimeError};
use crate::ordering::{self, OrderError, Precedence};
use std::collections::HashSet;
use std::sync::Arc;

/// A feature manager together with the metadata it declared.
#[derive(Clone)]
pub struct FeatureEntry {
    descriptor: FeatureDescriptor,
    manager: Arc<dyn FeatureManager>,
}

impl FeatureEntry {
    pub fn descriptor(&self) -> &FeatureDescriptor {
        &self.descriptor
    }

    pub fn manager(&self) -> &Arc<dyn FeatureManager> {
        &self.manager
    }

    pub fn name(&self) -> &FeatureName {
        &self.descriptor.name
    }
}

/// Feature managers in initialization order.
///
/// Built once at startup. Dependencies always come first; unrelated features
/// go by processing priority, then by registration order.
#[derive(Clone, Default)]
pub struct FeatureRegistry {
    entries: Vec<FeatureEntry>,
    unresolved: Vec<(FeatureName, FeatureName)>,
}

impl FeatureRegistry {
    /// # Errors
    ///
    /// `DuplicateFeature` when two managers share a name, `DependencyCycle` when
    /// dependencies loop.
    pub fn new(managers: Vec<Arc<dyn FeatureManager>>) -> Result<Self> {
        let entries: Vec<FeatureEntry> = managers
            .into_iter()
            .map(|manager| FeatureEntry {
                descriptor: manager.descriptor(),
                manager,
            })
            .collect();

        let descriptors: Vec<FeatureDescriptor> =
            entries.iter().map(|e| e.descriptor.clone()).collect();
        let unresolved = check_descriptors(&descriptors)?;

        let entries = ordering::order(entries, |a, b| compare(&a.descriptor, &b.descriptor))
            .map_err(|e| cycle_error(&descriptors, &e))?;

        tracing::debug!(
            "Feature order: {}",
            entries
                .iter()
                .map(|e| e.name().as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(Self {
            entries,
            unresolved,
        })
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &FeatureEntry> {
        self.entries.iter()
    }

    pub fn descriptors(&self) -> Vec<FeatureDescriptor> {
        self.entries.iter().map(|e| e.descriptor.clone()).collect()
    }

    pub fn get(&self, name: &FeatureName) -> Option<&FeatureEntry> {
        self.entries.iter().find(|e| e.name() == name)
    }

    /// `(feature, missing dependency)` pairs that were ignored.
    pub fn unresolved_dependencies(&self) -> &[(FeatureName, FeatureName)] {
        &self.unresolved
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Order bare descriptors the same way the registry orders managers.
pub fn order_features(features: Vec<FeatureDescriptor>) -> Result<Vec<FeatureDescriptor>> {
    check_descriptors(&features)?;
    ordering::order(features.clone(), compare).map_err(|e| cycle_error(&features, &e))
}

/// Dependencies first; otherwise lower processing priority first.
fn compare(a: &FeatureDescriptor, b: &FeatureDescriptor) -> Precedence {
    if b.has_dependency(&a.name) {
        Precedence::Before
    } else if a.has_dependency(&b.name) {
        Precedence::After
    } else {
        Precedence::prefer_by(a.processing_priority, b.processing_priority)
    }
}

/// Rejects duplicates and self-dependencies; unknown dependency names are
/// logged and ignored.
fn check_descriptors(features: &[FeatureDescriptor]) -> Result<Vec<(FeatureName, FeatureName)>> {
    let mut known = HashSet::new();
    for feature in features {
        if !known.insert(&feature.name) {
            return Err(RuntimeError::DuplicateFeature {
                name: feature.name.to_string(),
            });
        }
    }

    let mut unresolved = Vec::new();
    for feature in features {
        if feature.has_dependency(&feature.name) {
            return Err(RuntimeError::DependencyCycle {
                cycle: format!("{0} -> {0}", feature.name),
            });
        }
        for dependency in &feature.dependencies {
            if !known.contains(dependency) {
                tracing::warn!(
                    "Feature {} depends on unknown feature {}; ignoring the constraint",
                    feature.name,
                    dependency
                );
                unresolved.push((feature.name.clone(), dependency.clone()));
            }
        }
    }
    Ok(unresolved)
}

fn cycle_error(features: &[FeatureDescriptor], error: &OrderError) -> RuntimeError {
    let mut names: Vec<&str> = error
        .cycle
        .iter()
        .filter_map(|&i| features.get(i).map(|f| f.name.as_str()))
        .collect();
    if let Some(first) = names.first().copied() {
        names.push(first);
    }
    RuntimeError::DependencyCycle {
        cycle: names.join(" -> "),
    }
}
