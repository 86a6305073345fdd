//! Dependency graph resolution using topological sort.
//!
//! Builds a directed graph from declared dependencies and produces a load
//! order via Kahn's algorithm (repeatedly remove zero-in-degree nodes). Ties
//! among ready nodes break by discovery order, so repeated runs over the
//! same tree produce identical orders.
//!
//! A dependency naming a plugin that was never validated is not a cycle: the
//! dependent and everything depending on it are excluded as unmet while the
//! rest of the graph still resolves. Nodes left over after Kahn's removal
//! are split into genuine cycle members (nodes that can reach themselves)
//! and plugins that merely depend on a cycle.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use super::manifest::PluginManifest;

/// Why a plugin was excluded from the load order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exclusion {
    /// Member of a dependency cycle; carries every member name.
    Cycle(Vec<String>),

    /// The named dependency (direct or the root of a transitive chain)
    /// cannot be loaded.
    UnmetDependency(String),
}

/// Outcome of dependency resolution.
#[derive(Debug, Default)]
pub struct Resolution {
    /// Topologically sorted names: dependencies before dependents.
    pub order: Vec<String>,

    /// Excluded plugins keyed by name, with the reason.
    pub excluded: HashMap<String, Exclusion>,
}

/// Resolve the load order for a set of validated manifests.
///
/// `manifests` must be in discovery order; that order is the tie-breaker.
pub fn resolve(manifests: &[PluginManifest]) -> Resolution {
    let index: HashMap<&str, usize> = manifests
        .iter()
        .enumerate()
        .map(|(i, m)| (m.name.as_str(), i))
        .collect();

    let mut excluded: HashMap<String, Exclusion> = HashMap::new();

    // Plugins naming a dependency that was never validated are unmet, and so
    // is everything that depends on them.
    for manifest in manifests {
        let Some(missing) = manifest
            .depends_on
            .iter()
            .find(|dep| !index.contains_key(dep.as_str()))
        else {
            continue;
        };
        excluded
            .entry(manifest.name.clone())
            .or_insert_with(|| Exclusion::UnmetDependency(missing.clone()));
        for dependent in dependents_closure(manifests, &manifest.name) {
            excluded
                .entry(dependent)
                .or_insert_with(|| Exclusion::UnmetDependency(manifest.name.clone()));
        }
    }

    // Kahn's algorithm over the remaining nodes.
    let active: Vec<usize> = manifests
        .iter()
        .enumerate()
        .filter(|(_, m)| !excluded.contains_key(&m.name))
        .map(|(i, _)| i)
        .collect();
    let active_set: HashSet<usize> = active.iter().copied().collect();

    let mut in_degree: HashMap<usize, usize> = active.iter().map(|&i| (i, 0)).collect();
    let mut dependents_adj: HashMap<usize, Vec<usize>> = HashMap::new();
    for &i in &active {
        let mut seen = HashSet::new();
        for dep in &manifests[i].depends_on {
            let j = index[dep.as_str()];
            // Duplicate declarations count as one edge.
            if !seen.insert(j) || !active_set.contains(&j) {
                continue;
            }
            if let Some(degree) = in_degree.get_mut(&i) {
                *degree += 1;
            }
            dependents_adj.entry(j).or_default().push(i);
        }
    }

    // Ready nodes pop in discovery order for reproducible builds.
    let mut ready: BinaryHeap<Reverse<usize>> = in_degree
        .iter()
        .filter(|&(_, &degree)| degree == 0)
        .map(|(&i, _)| Reverse(i))
        .collect();

    let mut placed: Vec<usize> = Vec::with_capacity(active.len());
    while let Some(Reverse(i)) = ready.pop() {
        placed.push(i);
        if let Some(dependents) = dependents_adj.get(&i) {
            for &dependent in dependents {
                if let Some(degree) = in_degree.get_mut(&dependent) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push(Reverse(dependent));
                    }
                }
            }
        }
    }

    // Anything left either sits on a cycle or depends on one.
    if placed.len() != active.len() {
        let placed_set: HashSet<usize> = placed.iter().copied().collect();
        let leftover: Vec<usize> = active
            .iter()
            .copied()
            .filter(|i| !placed_set.contains(i))
            .collect();
        classify_leftover(manifests, &index, &leftover, &mut excluded);
    }

    Resolution {
        order: placed
            .into_iter()
            .map(|i| manifests[i].name.clone())
            .collect(),
        excluded,
    }
}

/// Names of every plugin that transitively depends on `root`, in discovery
/// order. `root` itself is not included.
pub fn dependents_closure(manifests: &[PluginManifest], root: &str) -> Vec<String> {
    let mut reverse: HashMap<&str, Vec<&str>> = HashMap::new();
    for manifest in manifests {
        for dep in &manifest.depends_on {
            reverse
                .entry(dep.as_str())
                .or_default()
                .push(manifest.name.as_str());
        }
    }

    let mut found: HashSet<&str> = HashSet::new();
    let mut stack = vec![root];
    while let Some(name) = stack.pop() {
        if let Some(dependents) = reverse.get(name) {
            for &dependent in dependents {
                if found.insert(dependent) {
                    stack.push(dependent);
                }
            }
        }
    }

    manifests
        .iter()
        .filter(|m| found.contains(m.name.as_str()))
        .map(|m| m.name.clone())
        .collect()
}

/// Split Kahn leftovers into cycle members and dependents of a cycle.
fn classify_leftover(
    manifests: &[PluginManifest],
    index: &HashMap<&str, usize>,
    leftover: &[usize],
    excluded: &mut HashMap<String, Exclusion>,
) {
    let leftover_set: HashSet<usize> = leftover.iter().copied().collect();

    // Adjacency restricted to the leftover subgraph: node -> its dependencies.
    let deps_of = |i: usize| -> Vec<usize> {
        manifests[i]
            .depends_on
            .iter()
            .filter_map(|dep| index.get(dep.as_str()).copied())
            .filter(|j| leftover_set.contains(j))
            .collect()
    };

    let reaches = |from: usize, to: usize| -> bool {
        let mut visited = HashSet::new();
        let mut stack = deps_of(from);
        while let Some(i) = stack.pop() {
            if i == to {
                return true;
            }
            if visited.insert(i) {
                stack.extend(deps_of(i));
            }
        }
        false
    };

    let members: Vec<usize> = leftover
        .iter()
        .copied()
        .filter(|&i| reaches(i, i))
        .collect();
    let member_set: HashSet<usize> = members.iter().copied().collect();

    // Group members into distinct cycles: two members share a cycle exactly
    // when each can reach the other.
    let mut assigned: HashSet<usize> = HashSet::new();
    for &i in &members {
        if assigned.contains(&i) {
            continue;
        }
        let group: Vec<usize> = members
            .iter()
            .copied()
            .filter(|&j| i == j || (reaches(i, j) && reaches(j, i)))
            .collect();
        let names: Vec<String> = group.iter().map(|&j| manifests[j].name.clone()).collect();
        for &j in &group {
            assigned.insert(j);
            excluded.insert(manifests[j].name.clone(), Exclusion::Cycle(names.clone()));
        }
    }

    // Everything else depends on a cycle member.
    for &i in leftover {
        if member_set.contains(&i) {
            continue;
        }
        let culprit = deps_of(i)
            .into_iter()
            .next()
            .map(|j| manifests[j].name.clone())
            .unwrap_or_default();
        excluded.insert(
            manifests[i].name.clone(),
            Exclusion::UnmetDependency(culprit),
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::path::Path;

    fn make_plugin(name: &str, deps: &[&str]) -> PluginManifest {
        let deps = deps
            .iter()
            .map(|d| format!("\"{d}\""))
            .collect::<Vec<_>>()
            .join(", ");
        let toml = format!("name = \"{name}\"\ndepends_on = [{deps}]\n");
        PluginManifest::parse_str(&toml, Path::new("plugin_test.toml"), name).unwrap()
    }

    #[test]
    fn no_dependencies_keeps_discovery_order() {
        let plugins = vec![
            make_plugin("c", &[]),
            make_plugin("a", &[]),
            make_plugin("b", &[]),
        ];
        let resolution = resolve(&plugins);
        assert_eq!(resolution.order, vec!["c", "a", "b"]);
        assert!(resolution.excluded.is_empty());
    }

    #[test]
    fn simple_chain() {
        let plugins = vec![
            make_plugin("c", &["b"]),
            make_plugin("b", &["a"]),
            make_plugin("a", &[]),
        ];
        let resolution = resolve(&plugins);
        assert_eq!(resolution.order, vec!["a", "b", "c"]);
    }

    #[test]
    fn diamond_dependency() {
        let plugins = vec![
            make_plugin("a", &["b", "c"]),
            make_plugin("b", &["d"]),
            make_plugin("c", &["d"]),
            make_plugin("d", &[]),
        ];
        let resolution = resolve(&plugins);
        let pos = |name: &str| resolution.order.iter().position(|n| n == name).unwrap();
        assert!(pos("d") < pos("b"));
        assert!(pos("d") < pos("c"));
        assert!(pos("b") < pos("a"));
        assert!(pos("c") < pos("a"));
        // b was discovered before c; equal in-degree breaks by discovery order.
        assert!(pos("b") < pos("c"));
    }

    #[test]
    fn missing_dependency_excludes_only_the_dependent_chain() {
        let plugins = vec![
            make_plugin("a", &["ghost"]),
            make_plugin("b", &["a"]),
            make_plugin("c", &[]),
        ];
        let resolution = resolve(&plugins);
        assert_eq!(resolution.order, vec!["c"]);
        assert_eq!(
            resolution.excluded.get("a"),
            Some(&Exclusion::UnmetDependency("ghost".to_string()))
        );
        assert_eq!(
            resolution.excluded.get("b"),
            Some(&Exclusion::UnmetDependency("a".to_string()))
        );
    }

    #[test]
    fn direct_cycle_is_detected() {
        let plugins = vec![make_plugin("a", &["b"]), make_plugin("b", &["a"])];
        let resolution = resolve(&plugins);
        assert!(resolution.order.is_empty());
        let Exclusion::Cycle(members) = resolution.excluded.get("a").unwrap() else {
            panic!("expected cycle");
        };
        assert_eq!(members, &vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn indirect_cycle_names_all_members_and_spares_the_rest() {
        let plugins = vec![
            make_plugin("a", &["b"]),
            make_plugin("b", &["c"]),
            make_plugin("c", &["a"]),
            make_plugin("d", &[]),
        ];
        let resolution = resolve(&plugins);
        assert_eq!(resolution.order, vec!["d"]);
        for name in ["a", "b", "c"] {
            let Exclusion::Cycle(members) = resolution.excluded.get(name).unwrap() else {
                panic!("expected cycle for {name}");
            };
            assert_eq!(members.len(), 3);
        }
    }

    #[test]
    fn dependent_of_a_cycle_is_unmet_not_cyclic() {
        let plugins = vec![
            make_plugin("a", &["b"]),
            make_plugin("b", &["a"]),
            make_plugin("c", &["a"]),
        ];
        let resolution = resolve(&plugins);
        assert!(matches!(
            resolution.excluded.get("c"),
            Some(Exclusion::UnmetDependency(dep)) if dep == "a"
        ));
        assert!(matches!(
            resolution.excluded.get("a"),
            Some(Exclusion::Cycle(_))
        ));
    }

    #[test]
    fn two_disjoint_cycles_are_reported_separately() {
        let plugins = vec![
            make_plugin("a", &["b"]),
            make_plugin("b", &["a"]),
            make_plugin("x", &["y"]),
            make_plugin("y", &["x"]),
        ];
        let resolution = resolve(&plugins);
        let Exclusion::Cycle(first) = resolution.excluded.get("a").unwrap() else {
            panic!("expected cycle");
        };
        let Exclusion::Cycle(second) = resolution.excluded.get("x").unwrap() else {
            panic!("expected cycle");
        };
        assert_eq!(first, &vec!["a".to_string(), "b".to_string()]);
        assert_eq!(second, &vec!["x".to_string(), "y".to_string()]);
    }

    #[test]
    fn duplicate_dependency_declarations_count_once() {
        let plugins = vec![make_plugin("a", &["b", "b"]), make_plugin("b", &[])];
        let resolution = resolve(&plugins);
        assert_eq!(resolution.order, vec!["b", "a"]);
    }

    #[test]
    fn resolution_is_deterministic() {
        let plugins = vec![
            make_plugin("d", &[]),
            make_plugin("b", &["d"]),
            make_plugin("c", &["d"]),
            make_plugin("a", &["b", "c"]),
        ];
        let first = resolve(&plugins).order;
        for _ in 0..10 {
            assert_eq!(resolve(&plugins).order, first);
        }
    }

    #[test]
    fn dependents_closure_walks_transitively() {
        let plugins = vec![
            make_plugin("base", &[]),
            make_plugin("mid", &["base"]),
            make_plugin("top", &["mid"]),
            make_plugin("other", &[]),
        ];
        assert_eq!(dependents_closure(&plugins, "base"), vec!["mid", "top"]);
        assert!(dependents_closure(&plugins, "other").is_empty());
    }
}
