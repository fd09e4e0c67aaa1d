use crate::config::{Settings, TaskConfig};
use crate::shared::TaskId;
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDescriptor {
    pub id: TaskId,
    pub name: String,
    pub phase: u32,
    /// Declaration order is kept; gating reports missing ids in this order.
    pub depends_on: Vec<TaskId>,
    pub plan_file: PathBuf,
    pub total_steps: u32,
    pub validation_commands: Vec<String>,
}

impl From<&TaskConfig> for TaskDescriptor {
    fn from(task: &TaskConfig) -> Self {
        Self {
            id: task.id.clone(),
            name: task.name.clone(),
            phase: task.id.phase(),
            depends_on: task.depends_on.clone(),
            plan_file: task.plan_file.clone(),
            total_steps: task.total_steps,
            validation_commands: task.validation_commands.clone(),
        }
    }
}

/// Read-only task lookup. Unknown ids have no dependencies.
#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    tasks: BTreeMap<TaskId, TaskDescriptor>,
}

impl TaskRegistry {
    pub fn from_settings(settings: &Settings) -> Self {
        Self::from_descriptors(settings.tasks.iter().map(TaskDescriptor::from))
    }

    pub fn from_descriptors(descriptors: impl IntoIterator<Item = TaskDescriptor>) -> Self {
        Self {
            tasks: descriptors
                .into_iter()
                .map(|descriptor| (descriptor.id.clone(), descriptor))
                .collect(),
        }
    }

    pub fn dependencies_of(&self, task_id: &TaskId) -> &[TaskId] {
        self.tasks
            .get(task_id)
            .map(|task| task.depends_on.as_slice())
            .unwrap_or_default()
    }

    pub fn describe(&self, task_id: &TaskId) -> Option<&TaskDescriptor> {
        self.tasks.get(task_id)
    }

    pub fn contains(&self, task_id: &TaskId) -> bool {
        self.tasks.contains_key(task_id)
    }

    pub fn tasks_in_phase(&self, phase: u32) -> Vec<&TaskDescriptor> {
        self.tasks
            .values()
            .filter(|task| task.phase == phase)
            .collect()
    }

    pub fn dependency_map(&self) -> BTreeMap<TaskId, Vec<TaskId>> {
        self.tasks
            .iter()
            .map(|(id, task)| (id.clone(), task.depends_on.clone()))
            .collect()
    }
}

#[cfg(test)]
pub(crate) fn descriptor(id: &str, depends_on: &[&str]) -> TaskDescriptor {
    let id = TaskId::parse(id).expect("task id");
    TaskDescriptor {
        name: format!("task_{id}"),
        phase: id.phase(),
        plan_file: PathBuf::from(format!("docs/implementation/{id}_plan.md")),
        depends_on: depends_on
            .iter()
            .map(|dep| TaskId::parse(dep).expect("dep id"))
            .collect(),
        total_steps: 3,
        validation_commands: Vec::new(),
        id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_and_dependency_free_tasks_have_no_dependencies() {
        let registry = TaskRegistry::from_descriptors([
            descriptor("1.1", &[]),
            descriptor("1.2", &["1.1"]),
        ]);
        let unknown = TaskId::parse("9.9").expect("id");
        assert!(registry.dependencies_of(&unknown).is_empty());
        assert!(registry
            .dependencies_of(&TaskId::parse("1.1").expect("id"))
            .is_empty());
        assert_eq!(
            registry.dependencies_of(&TaskId::parse("1.2").expect("id")),
            &[TaskId::parse("1.1").expect("id")]
        );
    }

    #[test]
    fn phase_listing_is_sorted_by_id() {
        let registry = TaskRegistry::from_descriptors([
            descriptor("2.3", &[]),
            descriptor("1.1", &[]),
            descriptor("2.1", &[]),
        ]);
        let ids: Vec<_> = registry
            .tasks_in_phase(2)
            .into_iter()
            .map(|task| task.id.as_str())
            .collect();
        assert_eq!(ids, vec!["02_01", "02_03"]);
    }
}
