//! Target registry - maps each `Target` to its implementation
//!
//! # Example
//!
//! ```
//! use release_publisher::core::Target;
//! use release_publisher::targets::TargetRegistry;
//!
//! let registry = TargetRegistry::standard();
//! assert!(registry.get(Target::Brew).is_some());
//! assert_eq!(registry.targets().count(), 4);
//! ```

use super::{AptTarget, BrewTarget, IndexTarget, VcsReleaseTarget};
use crate::core::model::{Step, Target};
use crate::core::traits::ReleaseTarget;
use std::collections::BTreeMap;

/// Registry of release target implementations
pub struct TargetRegistry {
    targets: BTreeMap<Target, Box<dyn ReleaseTarget>>,
}

impl Default for TargetRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl TargetRegistry {
    /// Registry with every built-in target
    pub fn standard() -> Self {
        Self::with(vec![
            Box::new(IndexTarget::new()),
            Box::new(VcsReleaseTarget::new()),
            Box::new(AptTarget::new()),
            Box::new(BrewTarget::new()),
        ])
    }

    /// Registry with exactly these implementations
    ///
    /// A later implementation for the same target replaces an earlier one.
    pub fn with(implementations: Vec<Box<dyn ReleaseTarget>>) -> Self {
        let targets = implementations
            .into_iter()
            .map(|implementation| (implementation.target(), implementation))
            .collect();
        Self { targets }
    }

    pub fn get(&self, target: Target) -> Option<&dyn ReleaseTarget> {
        self.targets.get(&target).map(|t| t.as_ref())
    }

    /// Registered targets in run priority order
    pub fn targets(&self) -> impl Iterator<Item = Target> + '_ {
        self.targets.keys().copied()
    }

    /// Steps of `target` in execution order
    pub fn steps_for(&self, target: Target) -> &'static [Step] {
        target.supported_steps()
    }
}
