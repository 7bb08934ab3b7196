//! Fixpoint expansion of conditional feature fragments.

use std::collections::BTreeSet;

use feat_types::{Conditional, Feature, FeatureId, VersionRange};

/// Expands a resolved feature set with the synthetic ids of every
/// conditional whose triggers are satisfied.
///
/// A single pass suffices: the caller is expected to resolve again with the
/// expanded set and, if that second pass installs additional features, stop
/// there rather than expanding a third time (see the module documentation
/// for why nested conditional triggering is out of scope).
#[derive(Clone, Copy, Debug, Default)]
pub struct ConditionalExpander;

impl ConditionalExpander {
    /// Computes the expanded feature id set.
    ///
    /// `installed` is the resolver's first-pass output: every concrete
    /// feature that ended up resolved, paired with its id.
    pub fn expand(initial: &BTreeSet<FeatureId>, installed: &[(FeatureId, Feature)]) -> BTreeSet<FeatureId> {
        let installed_ids: BTreeSet<FeatureId> = installed.iter().map(|(id, _)| id.clone()).collect();
        let mut expanded = initial.clone();

        for (parent_id, feature) in installed {
            for (index, conditional) in feature.conditionals.iter().enumerate() {
                if Self::is_triggered(conditional, &installed_ids) {
                    expanded.insert(Conditional::synthetic_id(parent_id, index));
                }
            }
        }
        expanded
    }

    fn is_triggered(conditional: &Conditional, installed_ids: &BTreeSet<FeatureId>) -> bool {
        conditional.triggers.iter().all(|trigger| {
            let range = VersionRange::since_exclusive(trigger.range().low().clone());
            installed_ids
                .iter()
                .any(|id| id.name() == trigger.name() && range.contains(id.version()))
        })
    }
}
