//! Derived information about the build-target graph: depths, dependents, orders.

use std::collections::{BTreeSet, HashMap, VecDeque};

use itertools::Itertools;
use log::error;

use bsp_types::{BuildTarget, BuildTargetIdentifier};

pub type BuildTargetInfoMap = HashMap<BuildTargetIdentifier, BuildTargetInfo>;

#[derive(Debug, Clone)]
pub struct BuildTargetInfo {
    pub target: BuildTarget,

    /// The length of the longest path from this target to a root (a target on which nothing
    /// depends). Roots have depth 0.
    pub depth: usize,

    /// The inverse of `target.dependencies`: the targets that depend on this one.
    pub dependents: BTreeSet<BuildTargetIdentifier>,
}

/// Build the info map for a workspace's targets: invert the dependency edges and compute
/// depths.
///
/// The dependency relation is an invariant of the build server and must be acyclic; if it is
/// not, the worklist refuses to raise any depth past the target count, which breaks the cycle
/// at its first re-visit instead of looping.
pub fn build_target_info_map(targets: Vec<BuildTarget>) -> BuildTargetInfoMap {
    let mut map: BuildTargetInfoMap = targets
        .into_iter()
        .map(|target| {
            (
                target.id.clone(),
                BuildTargetInfo {
                    target,
                    depth: 0,
                    dependents: BTreeSet::new(),
                },
            )
        })
        .collect();

    let ids: Vec<BuildTargetIdentifier> = map.keys().cloned().collect();
    for id in &ids {
        let dependencies = map[id].target.dependencies.clone();
        for dependency in dependencies {
            match map.get_mut(&dependency) {
                Some(info) => {
                    info.dependents.insert(id.clone());
                }
                None => {
                    error!(
                        "target {} depends on unknown target {}",
                        id.uri, dependency.uri
                    );
                }
            }
        }
    }

    let max_depth = map.len().saturating_sub(1);
    let mut worklist: VecDeque<BuildTargetIdentifier> = ids.into_iter().collect();
    while let Some(id) = worklist.pop_front() {
        // Keyed on the parent's current depth so a diamond converges instead of revisiting.
        let parent_depth = map[&id].depth;
        let dependencies = map[&id].target.dependencies.clone();
        for dependency in dependencies {
            let Some(info) = map.get_mut(&dependency) else {
                continue;
            };
            let candidate = parent_depth + 1;
            if candidate <= info.depth {
                continue;
            }
            if candidate > max_depth {
                error!("dependency cycle through target {}", dependency.uri);
                continue;
            }
            info.depth = candidate;
            worklist.push_back(dependency);
        }
    }

    map
}

/// Reverse topological order: lower-level targets (higher depth) first, ties broken by target
/// URI. Targets unknown to the map sort last among themselves.
pub fn topological_sort(
    map: &BuildTargetInfoMap,
    targets: &[BuildTargetIdentifier],
) -> Vec<BuildTargetIdentifier> {
    targets
        .iter()
        .cloned()
        .sorted_by_key(|id| {
            let depth = map.get(id).map(|info| info.depth).unwrap_or(0);
            (std::cmp::Reverse(depth), id.uri.clone())
        })
        .collect()
}

/// The transitive closure of `dependents` over the given seeds, sorted lexicographically. The
/// seeds themselves are only included when they depend on another seed.
pub fn transitive_dependents(
    map: &BuildTargetInfoMap,
    seeds: &BTreeSet<BuildTargetIdentifier>,
) -> Vec<BuildTargetIdentifier> {
    let mut result: BTreeSet<BuildTargetIdentifier> = BTreeSet::new();
    let mut worklist: VecDeque<&BuildTargetIdentifier> = seeds.iter().collect();
    while let Some(id) = worklist.pop_front() {
        let Some(info) = map.get(id) else {
            continue;
        };
        for dependent in &info.dependents {
            if result.insert(dependent.clone()) {
                worklist.push_back(dependent);
            }
        }
    }
    result.into_iter().collect()
}
