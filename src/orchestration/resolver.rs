use crate::orchestration::error::ResolveError;
use crate::orchestration::registry::TaskRegistry;
use crate::shared::TaskId;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyCheck {
    pub satisfied: bool,
    /// Declared minus completed, in declaration order.
    pub missing: Vec<TaskId>,
    pub declared: Vec<TaskId>,
}

pub fn check_satisfied(
    registry: &TaskRegistry,
    task_id: &TaskId,
    completed: &BTreeSet<TaskId>,
) -> DependencyCheck {
    let declared = registry.dependencies_of(task_id).to_vec();
    let mut seen = BTreeSet::new();
    let missing: Vec<TaskId> = declared
        .iter()
        .filter(|dep| !completed.contains(*dep) && seen.insert(*dep))
        .cloned()
        .collect();
    DependencyCheck {
        satisfied: missing.is_empty(),
        missing,
        declared,
    }
}

/// Kahn's algorithm restricted to edges with both ends in `task_set`; the
/// smallest ready id is always emitted next, so the order is reproducible.
/// Edges leaving the set are left for gating to enforce at run time.
pub fn order(
    task_set: &BTreeSet<TaskId>,
    dependency_map: &BTreeMap<TaskId, Vec<TaskId>>,
) -> Result<Vec<TaskId>, ResolveError> {
    let mut remaining: BTreeMap<&TaskId, usize> = BTreeMap::new();
    let mut dependents: BTreeMap<&TaskId, Vec<&TaskId>> = BTreeMap::new();

    for task in task_set {
        let local: BTreeSet<&TaskId> = dependency_map
            .get(task)
            .into_iter()
            .flatten()
            .filter(|dep| task_set.contains(*dep))
            .collect();
        remaining.insert(task, local.len());
        for dep in local {
            dependents.entry(dep).or_default().push(task);
        }
    }

    let mut ready: BTreeSet<&TaskId> = remaining
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(task, _)| *task)
        .collect();
    let mut ordered = Vec::with_capacity(task_set.len());

    while let Some(next) = ready.pop_first() {
        ordered.push(next.clone());
        for dependent in dependents.get(next).into_iter().flatten() {
            if let Some(count) = remaining.get_mut(dependent) {
                *count -= 1;
                if *count == 0 {
                    ready.insert(*dependent);
                }
            }
        }
    }

    if ordered.len() < task_set.len() {
        let stuck = remaining
            .into_iter()
            .filter(|(_, count)| *count > 0)
            .map(|(task, _)| task.clone())
            .collect();
        return Err(ResolveError::Cycle { tasks: stuck });
    }
    Ok(ordered)
}
